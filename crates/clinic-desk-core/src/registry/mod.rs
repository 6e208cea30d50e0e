//! Visit registration and maintenance.
//!
//! Registration is allocate-then-insert with nothing held in between: the
//! allocator reads the day, [`Registry::record`] writes the visit afterward.

use thiserror::Error;
use tracing::{info, warn};

use crate::allocator::{
    Allocation, AllocationError, SequenceAllocator, Strategy, VisitSource,
};
use crate::auth::{Action, AuthError, Session};
use crate::db::{Database, DbError, DbResult};
use crate::models::{Activity, ActivityKind, DateKey, PatientVisit, VisitDetails};

/// Registry errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Not authorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Allocation(#[from] AllocationError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Visit not found: {0}")]
    NotFound(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A stored visit and the allocator strategy that numbered it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub visit: PatientVisit,
    pub strategy: Strategy,
}

/// Write path for patient visits.
pub struct Registry<'a> {
    db: &'a Database,
}

impl<'a> Registry<'a> {
    /// Create a new registry.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a visit for today (UTC calendar day).
    pub fn register(
        &self,
        session: &Session,
        details: VisitDetails,
    ) -> RegistryResult<Registration> {
        self.register_on(session, DateKey::today(), details)
    }

    /// Register a visit on a given day.
    ///
    /// Nothing is written when allocation fails.
    pub fn register_on(
        &self,
        session: &Session,
        date_key: DateKey,
        details: VisitDetails,
    ) -> RegistryResult<Registration> {
        details.validate().map_err(RegistryError::InvalidInput)?;
        let allocation = self.allocate(session, &date_key)?;
        self.record(session, date_key, &allocation, details)
    }

    /// Next patient number for a day, without writing anything.
    pub fn allocate(&self, session: &Session, date_key: &DateKey) -> RegistryResult<Allocation> {
        session.authorize(Action::RegisterVisit)?;

        // The desk's running count doubles as a consistency check for the fallback read
        let observed = self.db.count_visits_on(date_key);
        Ok(allocate_with_count(&SequenceAllocator::new(self.db), date_key, observed)?)
    }

    /// Store a visit under a previously allocated number.
    ///
    /// The number is not re-checked; a concurrent writer may have taken it.
    pub fn record(
        &self,
        session: &Session,
        date_key: DateKey,
        allocation: &Allocation,
        details: VisitDetails,
    ) -> RegistryResult<Registration> {
        session.authorize(Action::RegisterVisit)?;
        details.validate().map_err(RegistryError::InvalidInput)?;

        let mut visit = PatientVisit::new(allocation.patient_number(), date_key, details);
        visit.added_by = Some(session.username.clone());
        self.db.insert_visit(&visit)?;
        self.log(session, ActivityKind::AddVisit, &visit)?;

        info!(
            %date_key,
            patient_number = visit.patient_number,
            strategy = allocation.strategy().as_str(),
            user = %session.username,
            "visit registered"
        );

        Ok(Registration {
            visit,
            strategy: allocation.strategy(),
        })
    }

    /// Replace the demographic/clinical fields of a visit.
    pub fn update_details(
        &self,
        session: &Session,
        visit_id: &str,
        details: VisitDetails,
    ) -> RegistryResult<PatientVisit> {
        session.authorize(Action::EditVisit)?;
        details.validate().map_err(RegistryError::InvalidInput)?;

        if !self.db.update_visit_details(visit_id, &details)? {
            return Err(RegistryError::NotFound(visit_id.to_string()));
        }
        let visit = self.fetch(visit_id)?;
        self.log(session, ActivityKind::UpdateVisit, &visit)?;

        info!(visit_id, user = %session.username, "visit updated");
        Ok(visit)
    }

    /// Mark a visit completed or pending.
    pub fn set_completed(
        &self,
        session: &Session,
        visit_id: &str,
        completed: bool,
    ) -> RegistryResult<PatientVisit> {
        session.authorize(Action::SetStatus)?;

        if !self.db.set_visit_completed(visit_id, completed)? {
            return Err(RegistryError::NotFound(visit_id.to_string()));
        }
        let visit = self.fetch(visit_id)?;
        self.log(session, ActivityKind::SetStatus, &visit)?;

        info!(
            visit_id,
            status = visit.status().as_str(),
            user = %session.username,
            "visit status changed"
        );
        Ok(visit)
    }

    /// Delete a visit permanently.
    pub fn delete(&self, session: &Session, visit_id: &str) -> RegistryResult<PatientVisit> {
        session.authorize(Action::DeleteVisit)?;

        let visit = self.fetch(visit_id)?;
        self.db.delete_visit(visit_id)?;
        self.log(session, ActivityKind::DeleteVisit, &visit)?;

        info!(
            visit_id,
            patient_number = visit.patient_number,
            user = %session.username,
            "visit deleted"
        );
        Ok(visit)
    }

    fn fetch(&self, visit_id: &str) -> RegistryResult<PatientVisit> {
        self.db
            .get_visit(visit_id)?
            .ok_or_else(|| RegistryError::NotFound(visit_id.to_string()))
    }

    fn log(
        &self,
        session: &Session,
        kind: ActivityKind,
        visit: &PatientVisit,
    ) -> RegistryResult<()> {
        self.db
            .insert_activity(&Activity::for_visit(kind, session.username.clone(), visit))?;
        Ok(())
    }
}

fn allocate_with_count<S: VisitSource + ?Sized>(
    allocator: &SequenceAllocator<'_, S>,
    date_key: &DateKey,
    observed: DbResult<u32>,
) -> Result<Allocation, AllocationError> {
    match observed {
        Ok(observed) => allocator.next_patient_number_checked(date_key, observed),
        Err(e) => {
            warn!(%date_key, error = %e, "day count failed, allocating unchecked");
            allocator.next_patient_number(date_key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Account, Authenticator, Role};
    use crate::models::Gender;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn session(role: Role) -> Session {
        let auth = Authenticator::new(
            vec![Account::with_password("user", "User", role, "pw")],
            chrono::Duration::hours(24),
        );
        auth.login("user", "pw").unwrap()
    }

    fn day() -> DateKey {
        "2024-05-01".parse().unwrap()
    }

    #[test]
    fn test_register_numbers_sequentially() {
        let db = setup_db();
        let registry = Registry::new(&db);
        let staff = session(Role::Staff);

        let numbers: Vec<u32> = ["A", "B", "C"]
            .iter()
            .map(|name| {
                registry
                    .register_on(&staff, day(), VisitDetails::new(*name))
                    .unwrap()
                    .visit
                    .patient_number
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        // A new day starts over
        let next_day: DateKey = "2024-05-02".parse().unwrap();
        let reg = registry
            .register_on(&staff, next_day, VisitDetails::new("D"))
            .unwrap();
        assert_eq!(reg.visit.patient_number, 1);
        assert_eq!(reg.strategy, Strategy::Ordered);
    }

    #[test]
    fn test_register_records_author_and_activity() {
        let db = setup_db();
        let registry = Registry::new(&db);

        let reg = registry
            .register_on(&session(Role::Staff), day(), VisitDetails::new("Asha"))
            .unwrap();
        assert_eq!(reg.visit.added_by.as_deref(), Some("user"));
        assert_eq!(db.get_visit(&reg.visit.id).unwrap().unwrap(), reg.visit);

        let activities = db.list_all_activities().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].kind, ActivityKind::AddVisit);
        assert_eq!(activities[0].patient_number, Some(1));
    }

    #[test]
    fn test_register_rejects_invalid_details() {
        let db = setup_db();
        let result =
            Registry::new(&db).register_on(&session(Role::Staff), day(), VisitDetails::new(""));
        assert!(matches!(result, Err(RegistryError::InvalidInput(_))));
        assert_eq!(db.count_visits_on(&day()).unwrap(), 0);
    }

    #[test]
    fn test_register_uses_fallback_without_index() {
        let db = setup_db();
        let registry = Registry::new(&db);
        let staff = session(Role::Staff);
        registry.register_on(&staff, day(), VisitDetails::new("A")).unwrap();

        db.conn()
            .execute_batch("DROP INDEX idx_visits_day_number")
            .unwrap();

        let reg = registry.register_on(&staff, day(), VisitDetails::new("B")).unwrap();
        assert_eq!(reg.visit.patient_number, 2);
        assert_eq!(reg.strategy, Strategy::Fallback);
    }

    #[test]
    fn test_failed_count_allocates_unchecked() {
        let db = setup_db();
        db.conn()
            .execute_batch("DROP INDEX idx_visits_day_number")
            .unwrap();
        let allocator = SequenceAllocator::new(&db);

        // An empty fallback read is only trusted when no count contradicts it
        assert!(matches!(
            allocate_with_count(&allocator, &day(), Ok(2)),
            Err(AllocationError::Inconsistent { observed: 2, .. })
        ));

        let count_error = DbError::Constraint("count unavailable".into());
        let allocation = allocate_with_count(&allocator, &day(), Err(count_error)).unwrap();
        assert_eq!(allocation.patient_number(), 1);
        assert_eq!(allocation.strategy(), Strategy::Fallback);
    }

    #[test]
    fn test_update_details() {
        let db = setup_db();
        let registry = Registry::new(&db);
        let staff = session(Role::Staff);
        let reg = registry.register_on(&staff, day(), VisitDetails::new("Asha")).unwrap();

        let mut details = reg.visit.details.clone();
        details.gender = Some(Gender::Female);
        details.age = Some(41);
        let updated = registry.update_details(&staff, &reg.visit.id, details).unwrap();

        assert_eq!(updated.details.age, Some(41));
        assert_eq!(updated.patient_number, reg.visit.patient_number);

        assert!(matches!(
            registry.update_details(&staff, "missing", VisitDetails::new("X")),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_status_change_requires_doctor() {
        let db = setup_db();
        let registry = Registry::new(&db);
        let reg = registry
            .register_on(&session(Role::Staff), day(), VisitDetails::new("Asha"))
            .unwrap();

        assert!(matches!(
            registry.set_completed(&session(Role::Staff), &reg.visit.id, true),
            Err(RegistryError::Unauthorized(_))
        ));

        let visit = registry
            .set_completed(&session(Role::Doctor), &reg.visit.id, true)
            .unwrap();
        assert!(visit.completed);

        let visit = registry
            .set_completed(&session(Role::Doctor), &reg.visit.id, false)
            .unwrap();
        assert!(!visit.completed);
    }

    #[test]
    fn test_delete() {
        let db = setup_db();
        let registry = Registry::new(&db);
        let staff = session(Role::Staff);
        let reg = registry.register_on(&staff, day(), VisitDetails::new("Asha")).unwrap();

        assert!(matches!(
            registry.delete(&session(Role::Doctor), &reg.visit.id),
            Err(RegistryError::Unauthorized(_))
        ));

        let deleted = registry.delete(&staff, &reg.visit.id).unwrap();
        assert_eq!(deleted.id, reg.visit.id);
        assert!(db.get_visit(&reg.visit.id).unwrap().is_none());

        let kinds: Vec<ActivityKind> = db
            .list_all_activities()
            .unwrap()
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert!(kinds.contains(&ActivityKind::DeleteVisit));

        assert!(matches!(
            registry.delete(&staff, &reg.visit.id),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_deleting_top_number_frees_it() {
        let db = setup_db();
        let registry = Registry::new(&db);
        let staff = session(Role::Staff);
        registry.register_on(&staff, day(), VisitDetails::new("A")).unwrap();
        let second = registry.register_on(&staff, day(), VisitDetails::new("B")).unwrap();

        registry.delete(&staff, &second.visit.id).unwrap();

        let third = registry.register_on(&staff, day(), VisitDetails::new("C")).unwrap();
        assert_eq!(third.visit.patient_number, 2);
    }

    #[test]
    fn test_interleaved_allocations_share_a_number() {
        let db = setup_db();
        let registry = Registry::new(&db);
        let staff = session(Role::Staff);

        let first = registry.allocate(&staff, &day()).unwrap();
        let second = registry.allocate(&staff, &day()).unwrap();
        registry.record(&staff, day(), &first, VisitDetails::new("A")).unwrap();
        registry.record(&staff, day(), &second, VisitDetails::new("B")).unwrap();

        let duplicates = db.find_duplicate_numbers(&day()).unwrap();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].patient_number, 1);
        assert_eq!(duplicates[0].occurrences, 2);
    }
}
