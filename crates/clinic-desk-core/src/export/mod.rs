//! Export of day sheets.

mod day_sheet;

pub use day_sheet::*;

use chrono::FixedOffset;
use thiserror::Error;

use crate::auth::{Action, AuthError, Session};
use crate::db::Database;
use crate::models::DateKey;
use crate::roster::{Roster, RosterError, VisitFilter};

/// Export errors.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Not authorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("{0}")]
    Roster(#[from] RosterError),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Day sheet exporter.
pub struct DaySheetExporter<'a> {
    roster: Roster<'a>,
    utc_offset: FixedOffset,
}

impl<'a> DaySheetExporter<'a> {
    /// Exporter writing times on the clinic clock at `utc_offset`.
    pub fn new(db: &'a Database, utc_offset: FixedOffset) -> Self {
        Self {
            roster: Roster::new(db),
            utc_offset,
        }
    }

    /// Export the (optionally filtered) roster for a day.
    pub fn export_day(
        &self,
        session: &Session,
        date_key: DateKey,
        filter: &VisitFilter,
    ) -> ExportResult<DaySheet> {
        session.authorize(Action::Export)?;
        let visits = self.roster.load_filtered(&date_key, filter)?;
        Ok(DaySheet::from_visits(date_key, &visits, self.utc_offset))
    }
}
