//! Admin overview across accounts, visits and the activity log.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{Account, Role};
use crate::models::{format_timestamp, Activity, ActivityKind, PatientVisit};

/// Most activity entries an overview carries.
pub const RECENT_ACTIVITY_LIMIT: usize = 100;

/// Trailing window for the admin overview.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdminPeriod {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl AdminPeriod {
    pub fn days(&self) -> u32 {
        match self {
            AdminPeriod::Week => 7,
            AdminPeriod::Month => 30,
            AdminPeriod::Quarter => 90,
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            7 => Some(AdminPeriod::Week),
            30 => Some(AdminPeriod::Month),
            90 => Some(AdminPeriod::Quarter),
            _ => None,
        }
    }

    /// Accepts `7`, `30`, `90` (days) with or without a trailing `d`.
    pub fn parse(s: &str) -> Option<Self> {
        s.trim().trim_end_matches('d').parse().ok().and_then(Self::from_days)
    }
}

/// Per-account activity summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserActivity {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub visits_added: u32,
    pub visits_deleted: u32,
    pub total_activities: u32,
    /// Most recent activity timestamp, if any
    pub last_activity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminOverview {
    pub generated_at: String,
    pub period: AdminPeriod,
    pub total_accounts: u32,
    pub staff_accounts: u32,
    pub doctor_accounts: u32,
    pub admin_accounts: u32,
    pub total_visits: u32,
    pub visits_in_period: u32,
    pub activities_in_period: u32,
    /// Visits in period divided by period length, one decimal
    pub average_visits_per_day: f64,
    pub users: Vec<UserActivity>,
    /// Activities in period, newest first, at most [`RECENT_ACTIVITY_LIMIT`]
    pub recent_activities: Vec<Activity>,
}

impl AdminOverview {
    /// Build the overview as of `now`.
    ///
    /// Period counts include records strictly after `now - period`; per-user
    /// figures cover the whole history.
    pub fn compute(
        accounts: &[Account],
        visits: &[PatientVisit],
        activities: &[Activity],
        period: AdminPeriod,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = now - Duration::days(i64::from(period.days()));
        let role_count = |role: Role| accounts.iter().filter(|a| a.role == role).count() as u32;

        let visits_in_period = visits
            .iter()
            .filter(|v| v.created_at().map_or(false, |at| at > cutoff))
            .count() as u32;
        let mut recent: Vec<(DateTime<Utc>, &Activity)> = activities
            .iter()
            .filter_map(|a| parse_instant(&a.timestamp).map(|at| (at, a)))
            .filter(|(at, _)| *at > cutoff)
            .collect();
        let activities_in_period = recent.len() as u32;
        recent.sort_by(|a, b| b.0.cmp(&a.0));
        let recent_activities = recent
            .into_iter()
            .take(RECENT_ACTIVITY_LIMIT)
            .map(|(_, a)| a.clone())
            .collect();

        let average = f64::from(visits_in_period) / f64::from(period.days());

        let users = accounts
            .iter()
            .map(|account| user_activity(account, visits, activities))
            .collect();

        Self {
            generated_at: format_timestamp(now),
            period,
            total_accounts: accounts.len() as u32,
            staff_accounts: role_count(Role::Staff),
            doctor_accounts: role_count(Role::Doctor),
            admin_accounts: role_count(Role::Admin),
            total_visits: visits.len() as u32,
            visits_in_period,
            activities_in_period,
            average_visits_per_day: (average * 10.0).round() / 10.0,
            users,
            recent_activities,
        }
    }

    /// Pretty-printed JSON export.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn user_activity(
    account: &Account,
    visits: &[PatientVisit],
    activities: &[Activity],
) -> UserActivity {
    let own: Vec<&Activity> = activities
        .iter()
        .filter(|a| a.username == account.username)
        .collect();

    let last_activity = own
        .iter()
        .filter_map(|a| parse_instant(&a.timestamp))
        .max()
        .map(format_timestamp);

    UserActivity {
        username: account.username.clone(),
        display_name: account.display_name.clone(),
        role: account.role,
        visits_added: visits
            .iter()
            .filter(|v| v.added_by.as_deref() == Some(account.username.as_str()))
            .count() as u32,
        visits_deleted: own
            .iter()
            .filter(|a| a.kind == ActivityKind::DeleteVisit)
            .count() as u32,
        total_activities: own.len() as u32,
        last_activity,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
