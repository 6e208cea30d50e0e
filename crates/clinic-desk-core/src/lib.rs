//! Clinic Desk Core Library
//!
//! Local patient intake for a small clinic: the front desk registers visits
//! and gets a per-day patient number, doctors work the day's roster, and
//! admins review activity.
//!
//! # Architecture
//!
//! ```text
//!   Front desk ──► Registry ──► SequenceAllocator ──► ordered read (index)
//!                     │                 │
//!                     │                 └──► unordered read, max + 1 (fallback)
//!                     ▼
//!               patient_visits ◄── Roster / VisitFilter ◄── Doctor view
//!                     │
//!         ┌───────────┼──────────────┐
//!         ▼           ▼              ▼
//!      Reports    Day sheet CSV   Admin overview (+ activity log)
//! ```
//!
//! # Patient numbering
//!
//! Numbers restart at 1 every UTC calendar day. Shift buckets and export
//! times use the clinic's configured UTC offset. Allocation is a
//! point-in-time read followed by a separate write; two desks registering at
//! the same moment can receive the same number, which
//! [`Database::find_duplicate_numbers`] reports after the fact.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage for visits and the activity log
//! - [`models`]: Domain types (PatientVisit, DateKey, Activity)
//! - [`allocator`]: Daily sequence allocator with ordered/fallback reads
//! - [`registry`]: Visit registration, edits, status changes, deletion
//! - [`roster`]: Day listing and filtering
//! - [`reports`]: Visit statistics and admin overview
//! - [`export`]: CSV day sheet
//! - [`auth`]: Accounts, sessions, role checks
//! - [`config`]: Startup configuration
//! - [`logging`]: Tracing subscriber setup

pub mod allocator;
pub mod auth;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod models;
pub mod registry;
pub mod reports;
pub mod roster;

// Re-export commonly used types
pub use allocator::{
    Allocation, AllocationError, SequenceAllocator, SourceError, Strategy, VisitSource,
};
pub use auth::{Account, Action, AuthError, Authenticator, Role, Session};
pub use config::{ClinicConfig, ConfigError};
pub use db::{Database, DbError};
pub use export::{DaySheet, DaySheetExporter};
pub use models::{
    Activity, ActivityKind, DateKey, Gender, PatientVisit, VisitDetails, VisitStatus,
};
pub use registry::{Registration, Registry, RegistryError};
pub use reports::{AdminOverview, AdminPeriod, Reports, VisitReport, VisitStats};
pub use roster::{Roster, RosterSummary, VisitFilter};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::FixedOffset;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<DbError> for ClinicError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => ClinicError::NotFound(what),
            other => ClinicError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::SerializationError(e.to_string())
    }
}

impl From<AuthError> for ClinicError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ClinicError::InvalidCredentials,
            AuthError::SessionExpired | AuthError::UnknownAccount(_) => {
                ClinicError::SessionInvalid(e.to_string())
            }
            AuthError::Forbidden { .. } => ClinicError::Unauthorized(e.to_string()),
        }
    }
}

impl From<AllocationError> for ClinicError {
    fn from(e: AllocationError) -> Self {
        ClinicError::AllocationFailed(e.to_string())
    }
}

impl From<RegistryError> for ClinicError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Unauthorized(e) => e.into(),
            RegistryError::InvalidInput(msg) => ClinicError::InvalidInput(msg),
            RegistryError::Allocation(e) => e.into(),
            RegistryError::Database(e) => e.into(),
            RegistryError::NotFound(id) => ClinicError::NotFound(id),
        }
    }
}

impl From<roster::RosterError> for ClinicError {
    fn from(e: roster::RosterError) -> Self {
        ClinicError::DatabaseError(e.to_string())
    }
}

impl From<reports::ReportError> for ClinicError {
    fn from(e: reports::ReportError) -> Self {
        match e {
            reports::ReportError::Unauthorized(e) => e.into(),
            reports::ReportError::InvalidRange { .. } => {
                ClinicError::InvalidInput(e.to_string())
            }
            reports::ReportError::Database(e) => e.into(),
        }
    }
}

impl From<export::ExportError> for ClinicError {
    fn from(e: export::ExportError) -> Self {
        match e {
            export::ExportError::Unauthorized(e) => e.into(),
            export::ExportError::Roster(e) => e.into(),
        }
    }
}

impl From<ConfigError> for ClinicError {
    fn from(e: ConfigError) -> Self {
        ClinicError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the clinic using `.env` / environment configuration.
#[uniffi::export]
pub fn open_clinic() -> Result<Arc<ClinicCore>, ClinicError> {
    let config = ClinicConfig::from_env()?;
    Ok(Arc::new(ClinicCore::open(&config)?))
}

/// Open an in-memory clinic (for testing).
///
/// `accounts_json` is the same JSON array the accounts file holds.
#[uniffi::export]
pub fn open_clinic_in_memory(
    accounts_json: String,
    session_ttl_hours: u32,
) -> Result<Arc<ClinicCore>, ClinicError> {
    let accounts: Vec<Account> = serde_json::from_str(&accounts_json)?;
    let config = ClinicConfig::new(PathBuf::from(":memory:"), session_ttl_hours, accounts)?;
    Ok(Arc::new(ClinicCore::new(Database::open_in_memory()?, &config)))
}

/// Install the tracing subscriber. Returns false if one was already installed.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) -> bool {
    logging::init(filter.as_deref())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic handle for FFI.
///
/// Every call takes the database lock for its own duration only.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    db: Arc<Mutex<Database>>,
    auth: Authenticator,
    utc_offset: FixedOffset,
}

impl ClinicCore {
    pub fn new(db: Database, config: &ClinicConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            auth: Authenticator::new(config.accounts().to_vec(), config.session_ttl()),
            utc_offset: config.utc_offset(),
        }
    }

    /// Open the configured database file.
    pub fn open(config: &ClinicConfig) -> Result<Self, ClinicError> {
        Ok(Self::new(Database::open(config.database_path())?, config))
    }

    /// Revalidate a host-held session and pick up account changes.
    fn session(&self, session: FfiSession) -> Result<Session, ClinicError> {
        let session: Session = session.try_into()?;
        Ok(self.auth.restore(&session)?)
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Log in with username and password.
    pub fn login(&self, username: String, password: String) -> Result<FfiSession, ClinicError> {
        let session = self.auth.login(&username, &password)?;
        let db = self.db.lock()?;
        db.insert_activity(&Activity::new(ActivityKind::Login, session.username.clone()))?;
        Ok(session.into())
    }

    /// Accept a cached session if still valid.
    pub fn restore_session(&self, session: FfiSession) -> Result<FfiSession, ClinicError> {
        Ok(self.session(session)?.into())
    }

    /// Record a logout. The host drops its cached session.
    pub fn logout(&self, session: FfiSession) -> Result<(), ClinicError> {
        let session = self.session(session)?;
        let db = self.db.lock()?;
        db.insert_activity(&Activity::new(ActivityKind::Logout, session.username))?;
        Ok(())
    }

    // =========================================================================
    // Intake Operations
    // =========================================================================

    /// Number the next registration today would receive.
    pub fn preview_next_number(&self, session: FfiSession) -> Result<FfiAllocation, ClinicError> {
        let session = self.session(session)?;
        let db = self.db.lock()?;
        let allocation = Registry::new(&db).allocate(&session, &DateKey::today())?;
        Ok(allocation.into())
    }

    /// Register a visit for today.
    ///
    /// Allocation and insertion take the lock separately.
    pub fn register_visit(
        &self,
        session: FfiSession,
        details: FfiVisitDetails,
    ) -> Result<FfiRegistration, ClinicError> {
        let session = self.session(session)?;
        let details: VisitDetails = details.try_into()?;
        details.validate().map_err(ClinicError::InvalidInput)?;
        let date_key = DateKey::today();

        let allocation = {
            let db = self.db.lock()?;
            let registry = Registry::new(&db);
            registry.allocate(&session, &date_key)?
        };

        let db = self.db.lock()?;
        let registration = Registry::new(&db).record(&session, date_key, &allocation, details)?;
        Ok(registration.into())
    }

    /// Get a visit by ID.
    pub fn get_visit(
        &self,
        session: FfiSession,
        visit_id: String,
    ) -> Result<Option<FfiPatientVisit>, ClinicError> {
        self.session(session)?.authorize(Action::ViewVisits)?;
        let db = self.db.lock()?;
        Ok(db.get_visit(&visit_id)?.map(|v| v.into()))
    }

    /// A day's visits in patient-number order.
    pub fn list_day(
        &self,
        session: FfiSession,
        date_key: String,
    ) -> Result<Vec<FfiPatientVisit>, ClinicError> {
        self.session(session)?.authorize(Action::ViewVisits)?;
        let date_key = parse_date_key(&date_key)?;
        let db = self.db.lock()?;
        let visits = Roster::new(&db).load_day(&date_key)?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    /// A day's visits narrowed by search, gender and status.
    pub fn filter_day(
        &self,
        session: FfiSession,
        date_key: String,
        filter: FfiVisitFilter,
    ) -> Result<Vec<FfiPatientVisit>, ClinicError> {
        self.session(session)?.authorize(Action::ViewVisits)?;
        let date_key = parse_date_key(&date_key)?;
        let filter: VisitFilter = filter.try_into()?;
        let db = self.db.lock()?;
        let visits = Roster::new(&db).load_filtered(&date_key, &filter)?;
        Ok(visits.into_iter().map(|v| v.into()).collect())
    }

    /// Replace a visit's details.
    pub fn update_visit(
        &self,
        session: FfiSession,
        visit_id: String,
        details: FfiVisitDetails,
    ) -> Result<FfiPatientVisit, ClinicError> {
        let session = self.session(session)?;
        let details: VisitDetails = details.try_into()?;
        let db = self.db.lock()?;
        let visit = Registry::new(&db).update_details(&session, &visit_id, details)?;
        Ok(visit.into())
    }

    /// Mark a visit completed or pending.
    pub fn set_visit_completed(
        &self,
        session: FfiSession,
        visit_id: String,
        completed: bool,
    ) -> Result<FfiPatientVisit, ClinicError> {
        let session = self.session(session)?;
        let db = self.db.lock()?;
        let visit = Registry::new(&db).set_completed(&session, &visit_id, completed)?;
        Ok(visit.into())
    }

    /// Delete a visit.
    pub fn delete_visit(
        &self,
        session: FfiSession,
        visit_id: String,
    ) -> Result<FfiPatientVisit, ClinicError> {
        let session = self.session(session)?;
        let db = self.db.lock()?;
        let visit = Registry::new(&db).delete(&session, &visit_id)?;
        Ok(visit.into())
    }

    /// Today's total / completed / pending counts.
    pub fn today_count(&self, session: FfiSession) -> Result<FfiRosterSummary, ClinicError> {
        self.session(session)?.authorize(Action::ViewVisits)?;
        let db = self.db.lock()?;
        let visits = Roster::new(&db).load_day(&DateKey::today())?;
        Ok(RosterSummary::of(&visits).into())
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    /// Statistics for one day.
    pub fn day_report(
        &self,
        session: FfiSession,
        date_key: String,
    ) -> Result<FfiVisitReport, ClinicError> {
        let session = self.session(session)?;
        let date_key = parse_date_key(&date_key)?;
        let db = self.db.lock()?;
        Ok(Reports::new(&db, self.utc_offset).day(&session, date_key)?.into())
    }

    /// Statistics for an inclusive date range.
    pub fn range_report(
        &self,
        session: FfiSession,
        start: String,
        end: String,
    ) -> Result<FfiVisitReport, ClinicError> {
        let session = self.session(session)?;
        let start = parse_date_key(&start)?;
        let end = parse_date_key(&end)?;
        let db = self.db.lock()?;
        Ok(Reports::new(&db, self.utc_offset).range(&session, start, end)?.into())
    }

    /// Admin overview for the trailing 7, 30 or 90 days, as pretty JSON.
    pub fn admin_overview_json(
        &self,
        session: FfiSession,
        period_days: u32,
    ) -> Result<String, ClinicError> {
        let session = self.session(session)?;
        let period = AdminPeriod::from_days(period_days).ok_or_else(|| {
            ClinicError::InvalidInput(format!("unsupported period: {} days", period_days))
        })?;
        let db = self.db.lock()?;
        let overview = Reports::new(&db, self.utc_offset).admin_overview(
            &session,
            self.auth.accounts(),
            period,
            chrono::Utc::now(),
        )?;
        Ok(overview.to_json()?)
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export a day's (optionally filtered) visits as CSV.
    pub fn export_day_csv(
        &self,
        session: FfiSession,
        date_key: String,
        filter: Option<FfiVisitFilter>,
    ) -> Result<FfiDaySheet, ClinicError> {
        let session = self.session(session)?;
        let date_key = parse_date_key(&date_key)?;
        let filter: VisitFilter = match filter {
            Some(f) => f.try_into()?,
            None => VisitFilter::default(),
        };
        let db = self.db.lock()?;
        let sheet =
            DaySheetExporter::new(&db, self.utc_offset).export_day(&session, date_key, &filter)?;
        Ok(FfiDaySheet {
            file_name: sheet.file_name(),
            csv: sheet.to_csv(),
            row_count: sheet.rows.len() as u32,
        })
    }
}

fn parse_date_key(s: &str) -> Result<DateKey, ClinicError> {
    s.parse()
        .map_err(|e| ClinicError::InvalidInput(format!("date {:?}: {}", s, e)))
}

fn parse_gender(s: Option<String>) -> Result<Option<Gender>, ClinicError> {
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(g) => Gender::parse(g)
            .map(Some)
            .ok_or_else(|| ClinicError::InvalidInput(format!("unknown gender: {}", g))),
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub issued_at: String,
}

impl From<Session> for FfiSession {
    fn from(session: Session) -> Self {
        Self {
            username: session.username,
            display_name: session.display_name,
            role: session.role.as_str().to_string(),
            issued_at: session.issued_at,
        }
    }
}

impl TryFrom<FfiSession> for Session {
    type Error = ClinicError;

    fn try_from(session: FfiSession) -> Result<Self, Self::Error> {
        let role = Role::parse(&session.role)
            .ok_or_else(|| ClinicError::SessionInvalid(format!("unknown role: {}", session.role)))?;
        Ok(Session {
            username: session.username,
            display_name: session.display_name,
            role,
            issued_at: session.issued_at,
        })
    }
}

/// FFI-safe visit details.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitDetails {
    pub name: String,
    pub age: Option<u32>,
    pub phone: String,
    pub weight_kg: Option<f64>,
    pub temperature: Option<f64>,
    pub gender: Option<String>,
    pub notes: Option<String>,
}

impl From<VisitDetails> for FfiVisitDetails {
    fn from(details: VisitDetails) -> Self {
        Self {
            name: details.name,
            age: details.age,
            phone: details.phone,
            weight_kg: details.weight_kg,
            temperature: details.temperature,
            gender: details.gender.map(|g| g.as_str().to_string()),
            notes: details.notes,
        }
    }
}

impl TryFrom<FfiVisitDetails> for VisitDetails {
    type Error = ClinicError;

    fn try_from(details: FfiVisitDetails) -> Result<Self, Self::Error> {
        Ok(VisitDetails {
            gender: parse_gender(details.gender)?,
            name: details.name,
            age: details.age,
            phone: details.phone,
            weight_kg: details.weight_kg,
            temperature: details.temperature,
            notes: details.notes.filter(|n| !n.trim().is_empty()),
        })
    }
}

/// FFI-safe patient visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientVisit {
    pub id: String,
    pub patient_number: u32,
    pub date_key: String,
    pub timestamp: String,
    pub completed: bool,
    pub status: String,
    pub added_by: Option<String>,
    pub details: FfiVisitDetails,
}

impl From<PatientVisit> for FfiPatientVisit {
    fn from(visit: PatientVisit) -> Self {
        Self {
            status: visit.status().as_str().to_string(),
            id: visit.id,
            patient_number: visit.patient_number,
            date_key: visit.date_key.to_string(),
            timestamp: visit.timestamp,
            completed: visit.completed,
            added_by: visit.added_by,
            details: visit.details.into(),
        }
    }
}

/// FFI-safe allocation preview.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAllocation {
    pub patient_number: u32,
    /// "ordered" or "fallback"
    pub strategy: String,
    pub fallback_reason: Option<String>,
}

impl From<Allocation> for FfiAllocation {
    fn from(allocation: Allocation) -> Self {
        Self {
            patient_number: allocation.patient_number(),
            strategy: allocation.strategy().as_str().to_string(),
            fallback_reason: match allocation {
                Allocation::Ordered { .. } => None,
                Allocation::Fallback { reason, .. } => Some(reason),
            },
        }
    }
}

/// FFI-safe registration result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegistration {
    pub visit: FfiPatientVisit,
    pub strategy: String,
}

impl From<Registration> for FfiRegistration {
    fn from(registration: Registration) -> Self {
        Self {
            strategy: registration.strategy.as_str().to_string(),
            visit: registration.visit.into(),
        }
    }
}

/// FFI-safe roster filter. Empty strings mean "any".
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiVisitFilter {
    pub search: Option<String>,
    pub gender: Option<String>,
    pub status: Option<String>,
}

impl TryFrom<FfiVisitFilter> for VisitFilter {
    type Error = ClinicError;

    fn try_from(filter: FfiVisitFilter) -> Result<Self, Self::Error> {
        let status = match filter.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(VisitStatus::parse(s).ok_or_else(|| {
                ClinicError::InvalidInput(format!("unknown status: {}", s))
            })?),
        };
        Ok(VisitFilter {
            search: filter.search,
            gender: parse_gender(filter.gender)?,
            status,
        })
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRosterSummary {
    pub total: u32,
    pub completed: u32,
    pub pending: u32,
}

impl From<RosterSummary> for FfiRosterSummary {
    fn from(summary: RosterSummary) -> Self {
        Self {
            total: summary.total,
            completed: summary.completed,
            pending: summary.pending,
        }
    }
}

/// FFI-safe visit statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitStats {
    pub total: u32,
    pub male: u32,
    pub female: u32,
    pub other: u32,
    pub completed: u32,
    pub pending: u32,
    pub morning_shift: u32,
    pub evening_shift: u32,
    pub night_shift: u32,
    pub age_up_to_18: u32,
    pub age_19_to_35: u32,
    pub age_36_to_50: u32,
    pub age_over_50: u32,
    pub bmi_underweight: u32,
    pub bmi_normal: u32,
    pub bmi_overweight: u32,
    pub bmi_obese: u32,
    pub average_weight: f64,
    pub average_temperature: f64,
}

impl From<VisitStats> for FfiVisitStats {
    fn from(stats: VisitStats) -> Self {
        Self {
            total: stats.total,
            male: stats.male,
            female: stats.female,
            other: stats.other,
            completed: stats.completed,
            pending: stats.pending,
            morning_shift: stats.morning_shift,
            evening_shift: stats.evening_shift,
            night_shift: stats.night_shift,
            age_up_to_18: stats.age_groups.up_to_18,
            age_19_to_35: stats.age_groups.from_19_to_35,
            age_36_to_50: stats.age_groups.from_36_to_50,
            age_over_50: stats.age_groups.over_50,
            bmi_underweight: stats.bmi_categories.underweight,
            bmi_normal: stats.bmi_categories.normal,
            bmi_overweight: stats.bmi_categories.overweight,
            bmi_obese: stats.bmi_categories.obese,
            average_weight: stats.average_weight,
            average_temperature: stats.average_temperature,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitReport {
    pub start: String,
    pub end: String,
    pub stats: FfiVisitStats,
}

impl From<VisitReport> for FfiVisitReport {
    fn from(report: VisitReport) -> Self {
        Self {
            start: report.start.to_string(),
            end: report.end.to_string(),
            stats: report.stats.into(),
        }
    }
}

/// FFI-safe CSV export.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDaySheet {
    pub file_name: String,
    pub csv: String,
    pub row_count: u32,
}
