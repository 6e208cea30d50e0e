//! Spreadsheet export of a day's roster.

use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DateKey, PatientVisit};

/// CSV column header.
pub const DAY_SHEET_HEADER: &str =
    "patient_number,name,age,gender,phone,weight_kg,temperature,date,time,status,notes";

/// One row of the day sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySheetRow {
    pub patient_number: u32,
    pub name: String,
    pub age: Option<u32>,
    /// Gender label, "Not specified" when absent
    pub gender: String,
    pub phone: String,
    pub weight_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub date: String,
    /// Registration time of day on the clinic clock (`HH:MM`)
    pub time: String,
    /// "Completed" or "Pending"
    pub status: String,
    pub notes: String,
}

impl DaySheetRow {
    pub fn from_visit(visit: &PatientVisit, utc_offset: FixedOffset) -> Self {
        Self {
            patient_number: visit.patient_number,
            name: visit.details.name.clone(),
            age: visit.details.age,
            gender: visit
                .details
                .gender
                .map_or_else(|| "Not specified".to_string(), |g| capitalize(g.as_str())),
            phone: visit.details.phone.clone(),
            weight_kg: visit.details.weight_kg,
            temperature: visit.details.temperature,
            date: visit.date_key.to_string(),
            time: visit
                .created_at()
                .map(|at| at.with_timezone(&utc_offset).format("%H:%M").to_string())
                .unwrap_or_default(),
            status: capitalize(visit.status().as_str()),
            notes: visit.details.notes.clone().unwrap_or_default(),
        }
    }
}

/// A day's visits ready for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySheet {
    pub date_key: DateKey,
    pub exported_at: String,
    pub rows: Vec<DaySheetRow>,
}

impl DaySheet {
    /// Build a sheet from visits already in display order.
    pub fn from_visits(
        date_key: DateKey,
        visits: &[PatientVisit],
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            date_key,
            exported_at: Utc::now().to_rfc3339(),
            rows: visits
                .iter()
                .map(|visit| DaySheetRow::from_visit(visit, utc_offset))
                .collect(),
        }
    }

    /// Default download name, `patients_<date_key>.csv`.
    pub fn file_name(&self) -> String {
        format!("patients_{}.csv", self.date_key)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str(DAY_SHEET_HEADER);
        csv.push('\n');

        for row in &self.rows {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                row.patient_number,
                escape_csv(&row.name),
                optional(row.age),
                escape_csv(&row.gender),
                escape_csv(&row.phone),
                optional(row.weight_kg),
                optional(row.temperature),
                row.date,
                row.time,
                row.status,
                escape_csv(&row.notes),
            ));
        }

        csv
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape a string for CSV output.
pub(crate) fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
