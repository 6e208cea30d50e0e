//! Sessions and credential matching.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::account::{Account, Action, Role};
use super::{AuthError, AuthResult};
use crate::models::format_timestamp;

/// The authenticated actor, passed explicitly into every operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// Login instant (RFC 3339)
    pub issued_at: String,
}

impl Session {
    fn for_account(account: &Account, now: DateTime<Utc>) -> Self {
        Self {
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            role: account.role,
            issued_at: format_timestamp(now),
        }
    }

    /// Fail with `Forbidden` unless the session's role permits `action`.
    pub fn authorize(&self, action: Action) -> AuthResult<()> {
        if self.role.permits(action) {
            Ok(())
        } else {
            Err(AuthError::Forbidden {
                role: self.role.as_str().to_string(),
                action: action.as_str().to_string(),
            })
        }
    }

    /// Whether the session is older than `ttl` at `now`.
    ///
    /// An unreadable `issued_at` counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match DateTime::parse_from_rfc3339(&self.issued_at) {
            Ok(issued) => now.signed_duration_since(issued.with_timezone(&Utc)) >= ttl,
            Err(_) => true,
        }
    }

    /// Serialize for host-side caching.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Matches credentials against configured accounts and validates cached sessions.
#[derive(Debug, Clone)]
pub struct Authenticator {
    accounts: Vec<Account>,
    session_ttl: Duration,
}

impl Authenticator {
    /// Create a new authenticator.
    pub fn new(accounts: Vec<Account>, session_ttl: Duration) -> Self {
        Self {
            accounts,
            session_ttl,
        }
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Log in with username and password.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<Session> {
        self.login_at(username, password, Utc::now())
    }

    pub fn login_at(
        &self,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Session> {
        let account = self
            .find(username.trim())
            .filter(|account| account.verify(password))
            .ok_or_else(|| {
                warn!(username, "login rejected");
                AuthError::InvalidCredentials
            })?;

        info!(username = %account.username, role = account.role.as_str(), "login");
        Ok(Session::for_account(account, now))
    }

    /// Accept a cached session if it is still fresh and its account still exists.
    ///
    /// The returned session reflects the account's current role and name.
    pub fn restore(&self, session: &Session) -> AuthResult<Session> {
        self.restore_at(session, Utc::now())
    }

    pub fn restore_at(&self, session: &Session, now: DateTime<Utc>) -> AuthResult<Session> {
        if session.is_expired_at(now, self.session_ttl) {
            return Err(AuthError::SessionExpired);
        }

        let account = self
            .find(&session.username)
            .ok_or_else(|| AuthError::UnknownAccount(session.username.clone()))?;

        Ok(Session {
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            role: account.role,
            issued_at: session.issued_at.clone(),
        })
    }

    fn find(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username == username)
    }
}
