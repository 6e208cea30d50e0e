//! Daily sequence allocator.
//!
//! Two-step strategy:
//! 1. Ordered fetch (number desc, timestamp desc) → first row + 1
//! 2. If the ordered fetch fails: unordered fetch → max + 1
//!
//! The allocator only reads. The caller writes the new visit afterward with no
//! lock between the read and the write, so concurrent callers on the same day
//! can be handed the same number.

mod source;

pub use source::*;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::DateKey;

/// Allocation errors.
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error(
        "Allocation failed for {date_key}: ordered read: {ordered}; fallback read: {fallback}"
    )]
    Failed {
        date_key: DateKey,
        ordered: SourceError,
        fallback: SourceError,
    },

    #[error(
        "Allocation failed for {date_key}: fallback read returned no visits \
         but {observed} were counted (ordered read: {ordered})"
    )]
    Inconsistent {
        date_key: DateKey,
        observed: u32,
        ordered: SourceError,
    },

    #[error("No patient numbers left for {date_key}: highest is {highest}")]
    Exhausted { date_key: DateKey, highest: u32 },
}

pub type AllocationResult<T> = Result<T, AllocationError>;

/// Which read produced an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Ordered,
    Fallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Ordered => "ordered",
            Strategy::Fallback => "fallback",
        }
    }
}

/// A successfully planned patient number, tagged with the read that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    /// Ordered read succeeded
    Ordered { patient_number: u32 },
    /// Ordered read failed; unordered read succeeded
    Fallback {
        patient_number: u32,
        /// Why the ordered read was abandoned
        reason: String,
    },
}

impl Allocation {
    pub fn patient_number(&self) -> u32 {
        match self {
            Allocation::Ordered { patient_number } => *patient_number,
            Allocation::Fallback { patient_number, .. } => *patient_number,
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Allocation::Ordered { .. } => Strategy::Ordered,
            Allocation::Fallback { .. } => Strategy::Fallback,
        }
    }
}

/// Computes the next patient number for a day from a point-in-time read.
pub struct SequenceAllocator<'a, S: VisitSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: VisitSource + ?Sized> SequenceAllocator<'a, S> {
    /// Create a new allocator over a visit source.
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Next patient number for `date_key`.
    pub fn next_patient_number(&self, date_key: &DateKey) -> AllocationResult<Allocation> {
        self.allocate(date_key, None)
    }

    /// Like [`next_patient_number`](Self::next_patient_number), but rejects an
    /// empty fallback read when the caller has already counted visits for the day.
    pub fn next_patient_number_checked(
        &self,
        date_key: &DateKey,
        observed_count: u32,
    ) -> AllocationResult<Allocation> {
        self.allocate(date_key, Some(observed_count))
    }

    fn allocate(&self, date_key: &DateKey, observed: Option<u32>) -> AllocationResult<Allocation> {
        let ordered_error = match self.source.fetch_by_date_ordered(date_key) {
            Ok(rows) => {
                // Rows arrive highest number first
                let highest = rows.first().map(|top| top.patient_number);
                let patient_number = successor(date_key, highest)?;
                debug!(%date_key, patient_number, "allocated from ordered read");
                return Ok(Allocation::Ordered { patient_number });
            }
            Err(e) => e,
        };

        warn!(%date_key, error = %ordered_error, "ordered read failed, scanning day unordered");

        let rows = match self.source.fetch_by_date_unordered(date_key) {
            Ok(rows) => rows,
            Err(fallback) => {
                warn!(%date_key, error = %fallback, "fallback read failed, no number allocated");
                return Err(AllocationError::Failed {
                    date_key: *date_key,
                    ordered: ordered_error,
                    fallback,
                });
            }
        };

        if rows.is_empty() {
            if let Some(observed) = observed.filter(|&n| n > 0) {
                warn!(%date_key, observed, "fallback read empty despite counted visits");
                return Err(AllocationError::Inconsistent {
                    date_key: *date_key,
                    observed,
                    ordered: ordered_error,
                });
            }
        }

        let highest = rows.iter().map(|row| row.patient_number).max();
        let patient_number = successor(date_key, highest)?;
        debug!(%date_key, patient_number, "allocated from fallback read");
        Ok(Allocation::Fallback {
            patient_number,
            reason: ordered_error.to_string(),
        })
    }
}

/// `highest + 1`, or 1 for an empty day.
fn successor(date_key: &DateKey, highest: Option<u32>) -> AllocationResult<u32> {
    match highest {
        None => Ok(1),
        Some(highest) => highest.checked_add(1).ok_or_else(|| {
            warn!(%date_key, highest, "patient numbers exhausted");
            AllocationError::Exhausted {
                date_key: *date_key,
                highest,
            }
        }),
    }
}
