//! Aggregate statistics over a set of visits.

use chrono::{FixedOffset, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::{Gender, PatientVisit};

/// Height assumed for BMI, since intake does not record one.
pub const DEFAULT_HEIGHT_M: f64 = 1.7;

/// Visit counts per age band (visits without an age are not counted).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgeGroups {
    pub up_to_18: u32,
    pub from_19_to_35: u32,
    pub from_36_to_50: u32,
    pub over_50: u32,
}

/// Visit counts per BMI category.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BmiCategories {
    pub underweight: u32,
    pub normal: u32,
    pub overweight: u32,
    pub obese: u32,
}

/// Shift a visit was registered in, by the clinic's wall-clock hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// 06:00 to 13:59
    Morning,
    /// 14:00 to 21:59
    Evening,
    /// 22:00 to 05:59
    Night,
}

impl Shift {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=13 => Shift::Morning,
            14..=21 => Shift::Evening,
            _ => Shift::Night,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }
}

/// BMI at the default height, rounded to one decimal.
pub fn bmi(weight_kg: f64) -> f64 {
    round1(weight_kg / (DEFAULT_HEIGHT_M * DEFAULT_HEIGHT_M))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Summary statistics for a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisitStats {
    pub total: u32,
    pub male: u32,
    pub female: u32,
    pub other: u32,
    pub completed: u32,
    pub pending: u32,
    pub morning_shift: u32,
    pub evening_shift: u32,
    pub night_shift: u32,
    pub age_groups: AgeGroups,
    pub bmi_categories: BmiCategories,
    /// Mean weight over visits that carry one, 0 when none do
    pub average_weight: f64,
    /// Mean temperature over visits that carry one, 0 when none do
    pub average_temperature: f64,
}

impl VisitStats {
    /// Aggregate `visits`; shifts use creation times shifted by `utc_offset`.
    pub fn from_visits(visits: &[PatientVisit], utc_offset: FixedOffset) -> Self {
        let mut stats = VisitStats {
            total: visits.len() as u32,
            ..Default::default()
        };

        let mut weights = Vec::new();
        let mut temperatures = Vec::new();

        for visit in visits {
            match visit.details.gender {
                Some(Gender::Male) => stats.male += 1,
                Some(Gender::Female) => stats.female += 1,
                Some(Gender::Other) => stats.other += 1,
                None => {}
            }

            if visit.completed {
                stats.completed += 1;
            } else {
                stats.pending += 1;
            }

            if let Some(created) = visit.created_at() {
                match Shift::from_hour(created.with_timezone(&utc_offset).hour()) {
                    Shift::Morning => stats.morning_shift += 1,
                    Shift::Evening => stats.evening_shift += 1,
                    Shift::Night => stats.night_shift += 1,
                }
            }

            match visit.details.age {
                Some(age) if age <= 18 => stats.age_groups.up_to_18 += 1,
                Some(age) if age <= 35 => stats.age_groups.from_19_to_35 += 1,
                Some(age) if age <= 50 => stats.age_groups.from_36_to_50 += 1,
                Some(_) => stats.age_groups.over_50 += 1,
                None => {}
            }

            if let Some(weight) = visit.details.weight_kg.filter(|w| *w > 0.0) {
                weights.push(weight);
                match BmiCategory::from_bmi(bmi(weight)) {
                    BmiCategory::Underweight => stats.bmi_categories.underweight += 1,
                    BmiCategory::Normal => stats.bmi_categories.normal += 1,
                    BmiCategory::Overweight => stats.bmi_categories.overweight += 1,
                    BmiCategory::Obese => stats.bmi_categories.obese += 1,
                }
            }

            if let Some(temperature) = visit.details.temperature.filter(|t| *t > 0.0) {
                temperatures.push(temperature);
            }
        }

        stats.average_weight = mean(&weights);
        stats.average_temperature = mean(&temperatures);
        stats
    }
}

/// Mean rounded to one decimal; 0 for an empty slice.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    round1(values.iter().sum::<f64>() / values.len() as f64)
}
