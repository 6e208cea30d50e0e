//! In-memory filtering of a day's visits.

use serde::{Deserialize, Serialize};

use crate::models::{Gender, PatientVisit, VisitStatus};

/// Search and facet filters applied to a loaded roster.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisitFilter {
    /// Matches name (case-insensitive), phone, or patient number
    pub search: Option<String>,
    pub gender: Option<Gender>,
    pub status: Option<VisitStatus>,
}

impl VisitFilter {
    pub fn matches(&self, visit: &PatientVisit) -> bool {
        self.matches_search(visit)
            && self.gender.map_or(true, |g| visit.details.gender == Some(g))
            && self.status.map_or(true, |s| visit.status() == s)
    }

    fn matches_search(&self, visit: &PatientVisit) -> bool {
        let term = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => term,
            _ => return true,
        };

        visit.details.name.to_lowercase().contains(&term.to_lowercase())
            || visit.details.phone.contains(term)
            || visit.patient_number.to_string().contains(term)
    }

    /// Keep matching visits, preserving order.
    pub fn apply(&self, visits: &[PatientVisit]) -> Vec<PatientVisit> {
        visits.iter().filter(|v| self.matches(v)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VisitDetails;

    fn visit(
        number: u32,
        name: &str,
        phone: &str,
        gender: Option<Gender>,
        completed: bool,
    ) -> PatientVisit {
        let mut details = VisitDetails::new(name);
        details.phone = phone.into();
        details.gender = gender;
        let mut v = PatientVisit::new(number, "2024-05-01".parse().unwrap(), details);
        v.completed = completed;
        v
    }

    fn roster() -> Vec<PatientVisit> {
        vec![
            visit(1, "Asha Patil", "9800000001", Some(Gender::Female), true),
            visit(2, "Ravi Kulkarni", "9822000002", Some(Gender::Male), false),
            visit(12, "Meera Joshi", "9700000012", None, false),
        ]
    }

    fn numbers(visits: &[PatientVisit]) -> Vec<u32> {
        visits.iter().map(|v| v.patient_number).collect()
    }

    #[test]
    fn test_empty_filter_keeps_all() {
        assert_eq!(numbers(&VisitFilter::default().apply(&roster())), vec![1, 2, 12]);

        let blank = VisitFilter {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(blank.apply(&roster()).len(), 3);
    }

    #[test]
    fn test_search_by_name_case_insensitive() {
        let filter = VisitFilter {
            search: Some("ravi".into()),
            ..Default::default()
        };
        assert_eq!(numbers(&filter.apply(&roster())), vec![2]);
    }

    #[test]
    fn test_search_by_phone_and_number() {
        let by_phone = VisitFilter {
            search: Some("9822".into()),
            ..Default::default()
        };
        assert_eq!(numbers(&by_phone.apply(&roster())), vec![2]);

        let by_number = VisitFilter {
            search: Some("12".into()),
            ..Default::default()
        };
        assert_eq!(numbers(&by_number.apply(&roster())), vec![12]);
    }

    #[test]
    fn test_gender_and_status_facets() {
        let female = VisitFilter {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        assert_eq!(numbers(&female.apply(&roster())), vec![1]);

        let pending = VisitFilter {
            status: Some(VisitStatus::Pending),
            ..Default::default()
        };
        assert_eq!(numbers(&pending.apply(&roster())), vec![2, 12]);

        let combined = VisitFilter {
            search: Some("a".into()),
            gender: Some(Gender::Male),
            status: Some(VisitStatus::Pending),
        };
        assert_eq!(numbers(&combined.apply(&roster())), vec![2]);
    }
}
