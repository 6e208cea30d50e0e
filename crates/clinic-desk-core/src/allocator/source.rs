//! Read capabilities the allocator consumes.

use thiserror::Error;

use crate::db::{Database, DbError, NumberedVisit};
use crate::models::DateKey;

/// Visit source errors.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The store cannot satisfy the requested ordering.
    #[error("Query unsupported: {0}")]
    QueryUnsupported(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl From<DbError> for SourceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::QueryUnsupported(msg) => SourceError::QueryUnsupported(msg),
            other => SourceError::Unavailable(other.to_string()),
        }
    }
}

/// Storage capabilities needed to plan a day's next patient number.
pub trait VisitSource {
    /// All visits of the day, `patient_number` desc then `timestamp` desc.
    fn fetch_by_date_ordered(&self, date_key: &DateKey) -> SourceResult<Vec<NumberedVisit>>;

    /// All visits of the day, no ordering guarantee.
    fn fetch_by_date_unordered(&self, date_key: &DateKey) -> SourceResult<Vec<NumberedVisit>>;
}

impl VisitSource for Database {
    fn fetch_by_date_ordered(&self, date_key: &DateKey) -> SourceResult<Vec<NumberedVisit>> {
        Ok(self.numbers_by_day_ordered(date_key)?)
    }

    fn fetch_by_date_unordered(&self, date_key: &DateKey) -> SourceResult<Vec<NumberedVisit>> {
        Ok(self.numbers_by_day(date_key)?)
    }
}
