//! Visit reports and the admin overview.

mod admin;
mod stats;

pub use admin::*;
pub use stats::*;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{Account, Action, AuthError, Session};
use crate::db::{Database, DbError};
use crate::models::DateKey;

/// Report errors.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Not authorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Invalid range: {start} is after {end}")]
    InvalidRange { start: DateKey, end: DateKey },

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Statistics for an inclusive span of days.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitReport {
    pub start: DateKey,
    pub end: DateKey,
    pub stats: VisitStats,
}

/// Read-only reporting over stored visits.
pub struct Reports<'a> {
    db: &'a Database,
    /// Clinic wall clock, for shift buckets
    utc_offset: FixedOffset,
}

impl<'a> Reports<'a> {
    pub fn new(db: &'a Database, utc_offset: FixedOffset) -> Self {
        Self { db, utc_offset }
    }

    /// Report for a single day.
    pub fn day(&self, session: &Session, date_key: DateKey) -> ReportResult<VisitReport> {
        self.range(session, date_key, date_key)
    }

    /// Report for `start..=end`.
    pub fn range(
        &self,
        session: &Session,
        start: DateKey,
        end: DateKey,
    ) -> ReportResult<VisitReport> {
        session.authorize(Action::ViewReports)?;
        if start > end {
            return Err(ReportError::InvalidRange { start, end });
        }

        let visits = self.db.list_visits_in_range(&start, &end)?;
        Ok(VisitReport {
            start,
            end,
            stats: VisitStats::from_visits(&visits, self.utc_offset),
        })
    }

    /// Admin overview as of `now`.
    pub fn admin_overview(
        &self,
        session: &Session,
        accounts: &[Account],
        period: AdminPeriod,
        now: DateTime<Utc>,
    ) -> ReportResult<AdminOverview> {
        session.authorize(Action::ViewAdminOverview)?;

        let visits = self.db.list_all_visits()?;
        let activities = self.db.list_all_activities()?;
        Ok(AdminOverview::compute(accounts, &visits, &activities, period, now))
    }
}
