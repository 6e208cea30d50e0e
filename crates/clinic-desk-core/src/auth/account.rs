//! Configured desk accounts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Desk role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "staff" => Some(Role::Staff),
            "doctor" => Some(Role::Doctor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Whether this role may perform `action`.
    pub fn permits(&self, action: Action) -> bool {
        match action {
            Action::RegisterVisit
            | Action::ViewVisits
            | Action::EditVisit
            | Action::ViewReports
            | Action::Export => true,
            Action::SetStatus => matches!(self, Role::Doctor | Role::Admin),
            Action::DeleteVisit => matches!(self, Role::Staff | Role::Admin),
            Action::ViewAdminOverview => matches!(self, Role::Admin),
        }
    }
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RegisterVisit,
    ViewVisits,
    EditVisit,
    SetStatus,
    DeleteVisit,
    ViewReports,
    ViewAdminOverview,
    Export,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RegisterVisit => "register_visit",
            Action::ViewVisits => "view_visits",
            Action::EditVisit => "edit_visit",
            Action::SetStatus => "set_status",
            Action::DeleteVisit => "delete_visit",
            Action::ViewReports => "view_reports",
            Action::ViewAdminOverview => "view_admin_overview",
            Action::Export => "export",
        }
    }
}

/// A login account. Only the SHA-256 digest of the password is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// Lowercase hex SHA-256 of the password
    pub password_sha256: String,
}

impl Account {
    /// Build an account from a plaintext password (digest only is stored).
    pub fn with_password(
        username: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        password: &str,
    ) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
            role,
            password_sha256: password_digest(password),
        }
    }

    /// Check a plaintext password against the stored digest.
    pub fn verify(&self, password: &str) -> bool {
        password_digest(password) == self.password_sha256.to_lowercase()
    }
}

/// Lowercase hex SHA-256 digest of a password.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}
