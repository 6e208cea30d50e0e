//! Patient visit models.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::date_key::DateKey;

/// Patient gender as recorded at intake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// Visit status, derived from the `completed` flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Pending,
    Completed,
}

impl VisitStatus {
    pub fn from_completed(completed: bool) -> Self {
        if completed {
            VisitStatus::Completed
        } else {
            VisitStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(VisitStatus::Pending),
            "completed" => Some(VisitStatus::Completed),
            _ => None,
        }
    }
}

/// Demographic and clinical fields captured at intake; editable afterward.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisitDetails {
    /// Patient name
    pub name: String,
    /// Age in years
    pub age: Option<u32>,
    /// Contact phone number
    pub phone: String,
    /// Weight in kg
    pub weight_kg: Option<f64>,
    /// Body temperature as entered at the desk
    pub temperature: Option<f64>,
    pub gender: Option<Gender>,
    /// Free-form notes
    pub notes: Option<String>,
}

impl VisitDetails {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Check the fields a visit cannot be stored without.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("patient name is required".into());
        }
        if self.age == Some(0) {
            return Err("age must be positive".into());
        }
        for (label, value) in [("weight", self.weight_kg), ("temperature", self.temperature)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(format!("{} must be a positive number", label));
                }
            }
        }
        Ok(())
    }
}

/// One patient registration event for a calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientVisit {
    /// Storage-assigned UUID
    pub id: String,
    /// Sequential number within `date_key`, starting at 1
    pub patient_number: u32,
    /// Day the visit was registered; never changes
    pub date_key: DateKey,
    /// Creation instant (RFC 3339, UTC, millisecond precision)
    pub timestamp: String,
    /// Visit status flag
    pub completed: bool,
    /// Username of the session that registered the visit
    pub added_by: Option<String>,
    #[serde(flatten)]
    pub details: VisitDetails,
}

impl PatientVisit {
    /// Create a pending visit stamped with the current instant.
    pub fn new(patient_number: u32, date_key: DateKey, details: VisitDetails) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_number,
            date_key,
            timestamp: now_timestamp(),
            completed: false,
            added_by: None,
            details,
        }
    }

    pub fn status(&self) -> VisitStatus {
        VisitStatus::from_completed(self.completed)
    }

    /// Parsed creation instant, if the stored timestamp is well-formed.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Current instant in the canonical timestamp format.
///
/// Fixed precision keeps lexicographic order equal to chronological order.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
