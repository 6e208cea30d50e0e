//! Patient visit database operations.

use rusqlite::{params, OptionalExtension, Params, Row};

use super::{Database, DbError, DbResult};
use crate::models::{DateKey, Gender, PatientVisit, VisitDetails};

const VISIT_COLUMNS: &str = "id, patient_number, date_key, timestamp, completed, name, age, \
     phone, weight_kg, temperature, gender, notes, added_by";

/// The two fields the daily allocator reads from each visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedVisit {
    pub patient_number: u32,
    pub timestamp: String,
}

/// A patient number used by more than one visit on the same day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateNumber {
    pub patient_number: u32,
    pub occurrences: u32,
}

impl Database {
    /// Insert a new visit.
    pub fn insert_visit(&self, visit: &PatientVisit) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patient_visits (
                id, patient_number, date_key, timestamp, completed, name, age,
                phone, weight_kg, temperature, gender, notes, added_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                visit.id,
                visit.patient_number,
                visit.date_key.to_string(),
                visit.timestamp,
                visit.completed,
                visit.details.name,
                visit.details.age,
                visit.details.phone,
                visit.details.weight_kg,
                visit.details.temperature,
                visit.details.gender.map(|g| g.as_str()),
                visit.details.notes,
                visit.added_by,
            ],
        )?;
        Ok(())
    }

    /// Get a visit by ID.
    pub fn get_visit(&self, id: &str) -> DbResult<Option<PatientVisit>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patient_visits WHERE id = ?", VISIT_COLUMNS),
                [id],
                read_visit_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Replace the demographic/clinical fields of a visit.
    ///
    /// Number, day and timestamp are never touched.
    pub fn update_visit_details(&self, id: &str, details: &VisitDetails) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patient_visits SET
                name = ?2,
                age = ?3,
                phone = ?4,
                weight_kg = ?5,
                temperature = ?6,
                gender = ?7,
                notes = ?8,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                id,
                details.name,
                details.age,
                details.phone,
                details.weight_kg,
                details.temperature,
                details.gender.map(|g| g.as_str()),
                details.notes,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Set the completed flag of a visit.
    pub fn set_visit_completed(&self, id: &str, completed: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE patient_visits SET completed = ?2, updated_at = datetime('now') WHERE id = ?1",
            params![id, completed],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a visit.
    pub fn delete_visit(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patient_visits WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Number of visits registered on a day.
    pub fn count_visits_on(&self, date_key: &DateKey) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM patient_visits WHERE date_key = ?",
            [date_key.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Numbers for a day, highest first, newest first among equal numbers.
    pub fn numbers_by_day_ordered(&self, date_key: &DateKey) -> DbResult<Vec<NumberedVisit>> {
        self.require_day_index()?;
        self.query_numbers(
            r#"
            SELECT patient_number, timestamp
            FROM patient_visits
            WHERE date_key = ?
            ORDER BY patient_number DESC, timestamp DESC
            "#,
            date_key,
        )
    }

    /// Numbers for a day in storage order.
    pub fn numbers_by_day(&self, date_key: &DateKey) -> DbResult<Vec<NumberedVisit>> {
        self.query_numbers(
            "SELECT patient_number, timestamp FROM patient_visits WHERE date_key = ?",
            date_key,
        )
    }

    /// Visits of a day in ascending patient-number order.
    pub fn list_visits_by_day_ordered(&self, date_key: &DateKey) -> DbResult<Vec<PatientVisit>> {
        self.require_day_index()?;
        self.query_visits(
            &format!(
                "SELECT {} FROM patient_visits WHERE date_key = ? ORDER BY patient_number ASC",
                VISIT_COLUMNS
            ),
            [date_key.to_string()],
        )
    }

    /// Visits of a day in storage order.
    pub fn list_visits_by_day(&self, date_key: &DateKey) -> DbResult<Vec<PatientVisit>> {
        self.query_visits(
            &format!("SELECT {} FROM patient_visits WHERE date_key = ?", VISIT_COLUMNS),
            [date_key.to_string()],
        )
    }

    /// Visits with `start <= date_key <= end`, ordered by day.
    pub fn list_visits_in_range(
        &self,
        start: &DateKey,
        end: &DateKey,
    ) -> DbResult<Vec<PatientVisit>> {
        self.query_visits(
            &format!(
                r#"
                SELECT {} FROM patient_visits
                WHERE date_key >= ?1 AND date_key <= ?2
                ORDER BY date_key ASC, patient_number ASC
                "#,
                VISIT_COLUMNS
            ),
            params![start.to_string(), end.to_string()],
        )
    }

    /// List all visits.
    pub fn list_all_visits(&self) -> DbResult<Vec<PatientVisit>> {
        self.query_visits(
            &format!(
                "SELECT {} FROM patient_visits ORDER BY date_key ASC, patient_number ASC",
                VISIT_COLUMNS
            ),
            [],
        )
    }

    /// Patient numbers used more than once on a day.
    pub fn find_duplicate_numbers(&self, date_key: &DateKey) -> DbResult<Vec<DuplicateNumber>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT patient_number, COUNT(*)
            FROM patient_visits
            WHERE date_key = ?
            GROUP BY patient_number
            HAVING COUNT(*) > 1
            ORDER BY patient_number
            "#,
        )?;

        let rows = stmt.query_map([date_key.to_string()], |row| {
            Ok(DuplicateNumber {
                patient_number: row.get(0)?,
                occurrences: row.get(1)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn query_numbers(&self, sql: &str, date_key: &DateKey) -> DbResult<Vec<NumberedVisit>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([date_key.to_string()], |row| {
            Ok(NumberedVisit {
                patient_number: row.get(0)?,
                timestamp: row.get(1)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn query_visits<P: Params>(&self, sql: &str, params: P) -> DbResult<Vec<PatientVisit>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_visit_row)?;

        let mut visits = Vec::new();
        for row in rows {
            visits.push(row?.try_into()?);
        }
        Ok(visits)
    }
}

/// Intermediate row struct for database mapping.
struct VisitRow {
    id: String,
    patient_number: u32,
    date_key: String,
    timestamp: String,
    completed: bool,
    name: String,
    age: Option<u32>,
    phone: String,
    weight_kg: Option<f64>,
    temperature: Option<f64>,
    gender: Option<String>,
    notes: Option<String>,
    added_by: Option<String>,
}

fn read_visit_row(row: &Row<'_>) -> rusqlite::Result<VisitRow> {
    Ok(VisitRow {
        id: row.get(0)?,
        patient_number: row.get(1)?,
        date_key: row.get(2)?,
        timestamp: row.get(3)?,
        completed: row.get(4)?,
        name: row.get(5)?,
        age: row.get(6)?,
        phone: row.get(7)?,
        weight_kg: row.get(8)?,
        temperature: row.get(9)?,
        gender: row.get(10)?,
        notes: row.get(11)?,
        added_by: row.get(12)?,
    })
}

impl TryFrom<VisitRow> for PatientVisit {
    type Error = DbError;

    fn try_from(row: VisitRow) -> Result<Self, Self::Error> {
        let date_key: DateKey = row
            .date_key
            .parse()
            .map_err(|_| DbError::Constraint(format!("Invalid date key: {}", row.date_key)))?;
        let gender = row
            .gender
            .map(|g| {
                Gender::parse(&g)
                    .ok_or_else(|| DbError::Constraint(format!("Unknown gender: {}", g)))
            })
            .transpose()?;

        Ok(PatientVisit {
            id: row.id,
            patient_number: row.patient_number,
            date_key,
            timestamp: row.timestamp,
            completed: row.completed,
            added_by: row.added_by,
            details: VisitDetails {
                name: row.name,
                age: row.age,
                phone: row.phone,
                weight_kg: row.weight_kg,
                temperature: row.temperature,
                gender,
                notes: row.notes,
            },
        })
    }
}
