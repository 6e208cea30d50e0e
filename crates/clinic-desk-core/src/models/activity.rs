//! Activity log models.

use serde::{Deserialize, Serialize};

use super::date_key::DateKey;
use super::visit::{now_timestamp, PatientVisit};

/// Kind of action recorded in the activity log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    AddVisit,
    UpdateVisit,
    SetStatus,
    DeleteVisit,
    Login,
    Logout,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::AddVisit => "add_visit",
            ActivityKind::UpdateVisit => "update_visit",
            ActivityKind::SetStatus => "set_status",
            ActivityKind::DeleteVisit => "delete_visit",
            ActivityKind::Login => "login",
            ActivityKind::Logout => "logout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add_visit" => Some(ActivityKind::AddVisit),
            "update_visit" => Some(ActivityKind::UpdateVisit),
            "set_status" => Some(ActivityKind::SetStatus),
            "delete_visit" => Some(ActivityKind::DeleteVisit),
            "login" => Some(ActivityKind::Login),
            "logout" => Some(ActivityKind::Logout),
            _ => None,
        }
    }
}

/// One entry of the activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: String,
    pub kind: ActivityKind,
    /// Acting user
    pub username: String,
    pub visit_id: Option<String>,
    pub patient_number: Option<u32>,
    pub date_key: Option<DateKey>,
    pub timestamp: String,
}

impl Activity {
    /// Activity not tied to a visit (login, logout).
    pub fn new(kind: ActivityKind, username: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            username: username.into(),
            visit_id: None,
            patient_number: None,
            date_key: None,
            timestamp: now_timestamp(),
        }
    }

    /// Activity about a specific visit.
    pub fn for_visit(
        kind: ActivityKind,
        username: impl Into<String>,
        visit: &PatientVisit,
    ) -> Self {
        Self {
            visit_id: Some(visit.id.clone()),
            patient_number: Some(visit.patient_number),
            date_key: Some(visit.date_key),
            ..Self::new(kind, username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitDetails;

    #[test]
    fn test_kind_roundtrip_names() {
        for kind in [
            ActivityKind::AddVisit,
            ActivityKind::UpdateVisit,
            ActivityKind::SetStatus,
            ActivityKind::DeleteVisit,
            ActivityKind::Login,
            ActivityKind::Logout,
        ] {
            assert_eq!(ActivityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ActivityKind::parse("archive"), None);
    }

    #[test]
    fn test_for_visit_copies_visit_reference() {
        let visit = PatientVisit::new(4, "2024-05-01".parse().unwrap(), VisitDetails::new("Ravi"));
        let activity = Activity::for_visit(ActivityKind::DeleteVisit, "desk", &visit);
        assert_eq!(activity.visit_id.as_deref(), Some(visit.id.as_str()));
        assert_eq!(activity.patient_number, Some(4));
        assert_eq!(activity.username, "desk");
    }
}
