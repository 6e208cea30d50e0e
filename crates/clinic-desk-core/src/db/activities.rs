//! Activity log database operations.

use rusqlite::{params, Params, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Activity, ActivityKind, DateKey};

impl Database {
    /// Append an activity.
    pub fn insert_activity(&self, activity: &Activity) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO activities (
                id, kind, username, visit_id, patient_number, date_key, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                activity.id,
                activity.kind.as_str(),
                activity.username,
                activity.visit_id,
                activity.patient_number,
                activity.date_key.map(|d| d.to_string()),
                activity.timestamp,
            ],
        )?;
        Ok(())
    }

    /// All activities, newest first.
    pub fn list_all_activities(&self) -> DbResult<Vec<Activity>> {
        self.query_activities(
            r#"
            SELECT id, kind, username, visit_id, patient_number, date_key, timestamp
            FROM activities
            ORDER BY timestamp DESC
            "#,
            [],
        )
    }

    fn query_activities<P: Params>(&self, sql: &str, params: P) -> DbResult<Vec<Activity>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_activity_row)?;

        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?.try_into()?);
        }
        Ok(activities)
    }
}

/// Intermediate row struct for database mapping.
struct ActivityRow {
    id: String,
    kind: String,
    username: String,
    visit_id: Option<String>,
    patient_number: Option<u32>,
    date_key: Option<String>,
    timestamp: String,
}

fn read_activity_row(row: &Row<'_>) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        username: row.get(2)?,
        visit_id: row.get(3)?,
        patient_number: row.get(4)?,
        date_key: row.get(5)?,
        timestamp: row.get(6)?,
    })
}

impl TryFrom<ActivityRow> for Activity {
    type Error = DbError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let kind = ActivityKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown activity kind: {}", row.kind)))?;
        let date_key = row
            .date_key
            .map(|d| {
                d.parse::<DateKey>()
                    .map_err(|_| DbError::Constraint(format!("Invalid date key: {}", d)))
            })
            .transpose()?;

        Ok(Activity {
            id: row.id,
            kind,
            username: row.username,
            visit_id: row.visit_id,
            patient_number: row.patient_number,
            date_key,
            timestamp: row.timestamp,
        })
    }
}
