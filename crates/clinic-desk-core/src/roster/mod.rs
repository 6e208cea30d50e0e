//! Day roster: a day's visits in patient-number order.

mod filter;

pub use filter::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::db::{Database, DbError};
use crate::models::{DateKey, PatientVisit};

/// Roster errors.
#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Roster unavailable for {date_key}: ordered: {ordered}; fallback: {fallback}")]
    Unavailable {
        date_key: DateKey,
        ordered: DbError,
        fallback: DbError,
    },
}

pub type RosterResult<T> = Result<T, RosterError>;

/// Total / completed / pending counts for a list of visits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterSummary {
    pub total: u32,
    pub completed: u32,
    pub pending: u32,
}

impl RosterSummary {
    pub fn of(visits: &[PatientVisit]) -> Self {
        let completed = visits.iter().filter(|v| v.completed).count() as u32;
        let total = visits.len() as u32;
        Self {
            total,
            completed,
            pending: total - completed,
        }
    }
}

/// Reads a day's visits for the staff and doctor views.
pub struct Roster<'a> {
    db: &'a Database,
}

impl<'a> Roster<'a> {
    /// Create a new roster reader.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// A day's visits, ascending by patient number.
    ///
    /// Falls back to an unordered read sorted in memory when the ordered
    /// query cannot run.
    pub fn load_day(&self, date_key: &DateKey) -> RosterResult<Vec<PatientVisit>> {
        let ordered = match self.db.list_visits_by_day_ordered(date_key) {
            Ok(visits) => return Ok(visits),
            Err(e) => e,
        };

        warn!(%date_key, error = %ordered, "ordered roster read failed, sorting in memory");

        match self.db.list_visits_by_day(date_key) {
            Ok(mut visits) => {
                visits.sort_by(|a, b| {
                    a.patient_number
                        .cmp(&b.patient_number)
                        .then_with(|| a.timestamp.cmp(&b.timestamp))
                });
                Ok(visits)
            }
            Err(fallback) => Err(RosterError::Unavailable {
                date_key: *date_key,
                ordered,
                fallback,
            }),
        }
    }

    /// A day's visits narrowed by `filter`.
    pub fn load_filtered(
        &self,
        date_key: &DateKey,
        filter: &VisitFilter,
    ) -> RosterResult<Vec<PatientVisit>> {
        Ok(filter.apply(&self.load_day(date_key)?))
    }
}
