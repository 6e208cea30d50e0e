//! Database layer for clinic-desk.

mod activities;
mod schema;
mod visits;

pub use schema::*;
pub use visits::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Query unsupported: {0}")]
    QueryUnsupported(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Whether a named index exists.
    pub fn has_index(&self, name: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fail with `QueryUnsupported` unless the ordered-day index is present.
    pub(crate) fn require_day_index(&self) -> DbResult<()> {
        if self.has_index(DAY_NUMBER_INDEX)? {
            Ok(())
        } else {
            Err(DbError::QueryUnsupported(format!(
                "ordered day query needs index {}",
                DAY_NUMBER_INDEX
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"patient_visits".to_string()));
        assert!(tables.contains(&"activities".to_string()));
    }

    #[test]
    fn test_day_index_required() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.require_day_index().is_ok());

        db.conn()
            .execute_batch("DROP INDEX idx_visits_day_number")
            .unwrap();
        assert!(matches!(
            db.require_day_index(),
            Err(DbError::QueryUnsupported(_))
        ));
    }

    #[test]
    fn test_open_file_backed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        {
            let db = Database::open(&path).unwrap();
            assert!(db.has_index(DAY_NUMBER_INDEX).unwrap());
        }
        // Reopening an existing file keeps the schema intact
        let db = Database::open(&path).unwrap();
        assert!(db.has_index(DAY_NUMBER_INDEX).unwrap());
    }
}
