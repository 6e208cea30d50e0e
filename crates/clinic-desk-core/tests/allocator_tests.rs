//! Daily numbering integration tests against SQLite.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use clinic_desk_core::allocator::{Allocation, AllocationError, SequenceAllocator, Strategy};
use clinic_desk_core::auth::{Account, Authenticator, Role, Session};
use clinic_desk_core::db::Database;
use clinic_desk_core::models::{DateKey, PatientVisit, VisitDetails};
use clinic_desk_core::registry::Registry;

fn day() -> DateKey {
    "2024-05-01".parse().unwrap()
}

fn seed(db: &Database, date_key: DateKey, numbers: &[u32]) {
    for &n in numbers {
        let details = VisitDetails::new(format!("Patient {}", n));
        db.insert_visit(&PatientVisit::new(n, date_key, details)).unwrap();
    }
}

fn drop_day_index(db: &Database) {
    db.conn()
        .execute_batch("DROP INDEX idx_visits_day_number")
        .unwrap();
}

fn staff_session() -> Session {
    Authenticator::new(
        vec![Account::with_password("desk", "Front Desk", Role::Staff, "pw")],
        chrono::Duration::hours(24),
    )
    .login("desk", "pw")
    .unwrap()
}

#[test]
fn test_empty_day_starts_at_one() {
    let db = Database::open_in_memory().unwrap();
    let allocation = SequenceAllocator::new(&db).next_patient_number(&day()).unwrap();
    assert_eq!(allocation, Allocation::Ordered { patient_number: 1 });

    drop_day_index(&db);
    let allocation = SequenceAllocator::new(&db).next_patient_number(&day()).unwrap();
    assert_eq!(allocation.patient_number(), 1);
    assert_eq!(allocation.strategy(), Strategy::Fallback);
}

#[test]
fn test_contiguous_day() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, day(), &[1, 2, 3, 4, 5]);

    let allocation = SequenceAllocator::new(&db).next_patient_number(&day()).unwrap();
    assert_eq!(allocation, Allocation::Ordered { patient_number: 6 });
}

#[test]
fn test_gaps_use_highest_number() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, day(), &[7, 1, 3]);

    let allocator = SequenceAllocator::new(&db);
    assert_eq!(allocator.next_patient_number(&day()).unwrap().patient_number(), 8);

    drop_day_index(&db);
    assert_eq!(allocator.next_patient_number(&day()).unwrap().patient_number(), 8);
}

#[test]
fn test_other_days_do_not_count() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, day().days_before(1), &[1, 2, 3, 4]);
    seed(&db, day(), &[1]);

    let allocation = SequenceAllocator::new(&db).next_patient_number(&day()).unwrap();
    assert_eq!(allocation.patient_number(), 2);
}

#[test]
fn test_fallback_without_index() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, day(), &[2, 5, 1]);
    drop_day_index(&db);

    match SequenceAllocator::new(&db).next_patient_number(&day()).unwrap() {
        Allocation::Fallback { patient_number, reason } => {
            assert_eq!(patient_number, 6);
            assert!(reason.contains("idx_visits_day_number"), "reason: {}", reason);
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[test]
fn test_repeat_reads_without_write_agree() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, day(), &[1, 2]);
    let allocator = SequenceAllocator::new(&db);

    let first = allocator.next_patient_number(&day()).unwrap();
    let second = allocator.next_patient_number(&day()).unwrap();
    assert_eq!(first, second);
    assert_eq!(db.count_visits_on(&day()).unwrap(), 2);
}

#[test]
fn test_both_reads_failing_allocates_nothing() {
    let db = Database::open_in_memory().unwrap();
    db.conn().execute_batch("DROP TABLE patient_visits").unwrap();

    assert!(matches!(
        SequenceAllocator::new(&db).next_patient_number(&day()),
        Err(AllocationError::Failed { .. })
    ));
}

#[test]
fn test_highest_stored_number_does_not_wrap() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, day(), &[u32::MAX]);

    let allocator = SequenceAllocator::new(&db);
    assert!(matches!(
        allocator.next_patient_number(&day()),
        Err(AllocationError::Exhausted { highest: u32::MAX, .. })
    ));

    drop_day_index(&db);
    assert!(matches!(
        allocator.next_patient_number(&day()),
        Err(AllocationError::Exhausted { highest: u32::MAX, .. })
    ));
    assert_eq!(db.count_visits_on(&day()).unwrap(), 1);
}

#[test]
fn test_empty_fallback_contradicting_count_fails() {
    let db = Database::open_in_memory().unwrap();
    drop_day_index(&db);

    let allocator = SequenceAllocator::new(&db);
    assert!(matches!(
        allocator.next_patient_number_checked(&day(), 3),
        Err(AllocationError::Inconsistent { observed: 3, .. })
    ));
    assert_eq!(allocator.next_patient_number_checked(&day(), 0).unwrap().patient_number(), 1);
}

#[test]
fn test_interleaved_registrations_can_duplicate() {
    let db = Database::open_in_memory().unwrap();
    seed(&db, day(), &[1, 2]);
    let registry = Registry::new(&db);
    let session = staff_session();

    let a = registry.allocate(&session, &day()).unwrap();
    let b = registry.allocate(&session, &day()).unwrap();
    assert_eq!(a.patient_number(), 3);
    assert_eq!(b.patient_number(), 3);

    registry.record(&session, day(), &a, VisitDetails::new("A")).unwrap();
    registry.record(&session, day(), &b, VisitDetails::new("B")).unwrap();

    let duplicates = db.find_duplicate_numbers(&day()).unwrap();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].patient_number, 3);
}

#[test]
fn test_concurrent_desks_can_duplicate() {
    let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["Asha", "Ravi"]
        .into_iter()
        .map(|name| {
            let db = Arc::clone(&db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let session = staff_session();
                let allocation = {
                    let db = db.lock().unwrap();
                    let registry = Registry::new(&db);
                    registry.allocate(&session, &day()).unwrap()
                };

                // Both desks have read the day before either writes
                barrier.wait();

                let db = db.lock().unwrap();
                Registry::new(&db)
                    .record(&session, day(), &allocation, VisitDetails::new(name))
                    .unwrap()
                    .visit
                    .patient_number
            })
        })
        .collect();

    let numbers: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(numbers, vec![1, 1]);

    let db = db.lock().unwrap();
    assert_eq!(db.count_visits_on(&day()).unwrap(), 2);
    assert_eq!(db.find_duplicate_numbers(&day()).unwrap().len(), 1);
}

#[test]
fn test_sequential_registrations_stay_unique() {
    let db = Database::open_in_memory().unwrap();
    let registry = Registry::new(&db);
    let session = staff_session();

    for expected in 1..=20 {
        let reg = registry
            .register_on(&session, day(), VisitDetails::new("Walk-in"))
            .unwrap();
        assert_eq!(reg.visit.patient_number, expected);
    }
    assert!(db.find_duplicate_numbers(&day()).unwrap().is_empty());
}
