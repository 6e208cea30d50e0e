//! SQLite schema definition.

/// Composite index backing the ordered per-day queries.
///
/// Ordered day fetches refuse to run without it, the same way a hosted
/// document store rejects a sorted query that lacks a composite index.
pub const DAY_NUMBER_INDEX: &str = "idx_visits_day_number";

/// Complete database schema for clinic-desk.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patient Visits
-- ============================================================================

-- No UNIQUE (date_key, patient_number): daily numbering is best effort and
-- existing data may already carry duplicates.
CREATE TABLE IF NOT EXISTS patient_visits (
    id TEXT PRIMARY KEY,
    patient_number INTEGER NOT NULL CHECK (patient_number > 0),
    date_key TEXT NOT NULL,                      -- YYYY-MM-DD
    timestamp TEXT NOT NULL,                     -- RFC 3339, UTC, millis
    completed INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL,
    age INTEGER,
    phone TEXT NOT NULL DEFAULT '',
    weight_kg REAL,
    temperature REAL,
    gender TEXT CHECK (gender IN ('male', 'female', 'other')),
    notes TEXT,
    added_by TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_visits_day_number
    ON patient_visits(date_key, patient_number DESC, timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_visits_timestamp ON patient_visits(timestamp);

-- ============================================================================
-- Activity Log (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    username TEXT NOT NULL,
    visit_id TEXT,                               -- no FK: deleted visits stay referenced
    patient_number INTEGER,
    date_key TEXT,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_timestamp ON activities(timestamp);
CREATE INDEX IF NOT EXISTS idx_activities_username ON activities(username);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_patient_number_must_be_positive() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO patient_visits (id, patient_number, date_key, timestamp, name)
             VALUES ('a', 0, '2024-01-01', '2024-01-01T00:00:00.000Z', 'X')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_numbers_are_not_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for id in ["a", "b"] {
            let result = conn.execute(
                "INSERT INTO patient_visits (id, patient_number, date_key, timestamp, name)
                 VALUES (?1, 1, '2024-01-01', '2024-01-01T00:00:00.000Z', 'X')",
                [id],
            );
            assert!(result.is_ok());
        }
    }

    #[test]
    fn test_gender_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO patient_visits (id, patient_number, date_key, timestamp, name, gender)
             VALUES ('a', 1, '2024-01-01', '2024-01-01T00:00:00.000Z', 'X', 'unknown')",
            [],
        );
        assert!(result.is_err());
    }
}
