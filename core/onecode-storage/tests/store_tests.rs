//! Behavior shared by every `LicenseStore` backend.
//!
//! Each check is written once against `&dyn LicenseStore` and run for
//! both the memory and the SQLite backend.

use chrono::{DateTime, Duration, Utc};
use onecode_storage::{
    timestamp_now, BindOutcome, InsertOutcome, LicenseStore, MemoryStore, SqliteStore,
};
use onecode_types::{LicenseCode, MachineId};
use std::sync::Arc;
use std::thread;

fn code(s: &str) -> LicenseCode {
    LicenseCode::parse(s).unwrap()
}

fn machine(s: &str) -> MachineId {
    MachineId::parse(s).unwrap()
}

fn at(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_750_000_000_000).unwrap() + Duration::seconds(offset_secs)
}

fn backends() -> Vec<Arc<dyn LicenseStore>> {
    vec![
        Arc::new(MemoryStore::new()),
        Arc::new(SqliteStore::open_in_memory().unwrap()),
    ]
}

fn check_insert_if_absent(store: &dyn LicenseStore) {
    let first = store.insert_if_absent(&code("AAA"), at(0)).unwrap();
    assert!(first.is_created());
    assert_eq!(first.record().created_at(), at(0));

    store
        .bind_if_unbound(&code("AAA"), &machine("HW-1"), at(5))
        .unwrap();

    let second = store.insert_if_absent(&code("AAA"), at(10)).unwrap();
    match second {
        InsertOutcome::Existing(record) => {
            assert_eq!(record.created_at(), at(0));
            assert_eq!(record.machine_id(), Some(&machine("HW-1")));
        }
        other => panic!("[{}] expected existing, got {other:?}", store.backend()),
    }
}

fn check_bind_transitions(store: &dyn LicenseStore) {
    assert_eq!(
        store
            .bind_if_unbound(&code("NOPE"), &machine("HW-1"), at(0))
            .unwrap(),
        BindOutcome::Missing
    );

    store.insert_if_absent(&code("BBB"), at(0)).unwrap();
    let bound = store
        .bind_if_unbound(&code("BBB"), &machine("HW-1"), at(1))
        .unwrap();
    let BindOutcome::Bound(record) = bound else {
        panic!("[{}] expected bound", store.backend());
    };
    assert_eq!(record.activated_at(), Some(at(1)));

    let again = store
        .bind_if_unbound(&code("BBB"), &machine("HW-2"), at(2))
        .unwrap();
    let BindOutcome::AlreadyBound(record) = again else {
        panic!("[{}] expected already bound", store.backend());
    };
    assert_eq!(record.machine_id(), Some(&machine("HW-1")));
    assert_eq!(record.activated_at(), Some(at(1)));
}

fn check_clear_binding(store: &dyn LicenseStore) {
    assert!(store.clear_binding(&code("NOPE")).unwrap().is_none());

    store.insert_if_absent(&code("CCC"), at(0)).unwrap();
    store
        .bind_if_unbound(&code("CCC"), &machine("HW-1"), at(1))
        .unwrap();

    let cleared = store.clear_binding(&code("CCC")).unwrap().unwrap();
    assert!(!cleared.is_activated());
    assert!(cleared.activated_at().is_none());

    // idempotent
    let cleared = store.clear_binding(&code("CCC")).unwrap().unwrap();
    assert!(!cleared.is_activated());

    let rebound = store
        .bind_if_unbound(&code("CCC"), &machine("HW-2"), at(3))
        .unwrap();
    assert!(matches!(rebound, BindOutcome::Bound(r) if r.machine_id() == Some(&machine("HW-2"))));
}

fn check_scan_order_and_paging(store: &dyn LicenseStore) {
    store.insert_if_absent(&code("OLD"), at(0)).unwrap();
    store.insert_if_absent(&code("TIE-B"), at(10)).unwrap();
    store.insert_if_absent(&code("TIE-A"), at(10)).unwrap();
    store.insert_if_absent(&code("NEW"), at(20)).unwrap();

    let all: Vec<String> = store
        .scan(0, 100)
        .unwrap()
        .iter()
        .map(|r| r.code().to_string())
        .collect();
    assert_eq!(all, vec!["NEW", "TIE-A", "TIE-B", "OLD"]);

    let page: Vec<String> = store
        .scan(1, 2)
        .unwrap()
        .iter()
        .map(|r| r.code().to_string())
        .collect();
    assert_eq!(page, vec!["TIE-A", "TIE-B"]);

    assert!(store.scan(50, 10).unwrap().is_empty());
}

fn check_delete_and_counts(store: &dyn LicenseStore) {
    for (i, c) in ["D1", "D2", "D3"].iter().enumerate() {
        store.insert_if_absent(&code(c), at(i as i64)).unwrap();
    }
    store
        .bind_if_unbound(&code("D2"), &machine("HW-1"), at(9))
        .unwrap();

    let counts = store.counts().unwrap();
    assert_eq!((counts.total, counts.activated, counts.unused()), (3, 1, 2));

    assert!(store.delete(&code("D2")).unwrap());
    assert!(!store.delete(&code("D2")).unwrap());
    assert!(store.get(&code("D2")).unwrap().is_none());

    let counts = store.counts().unwrap();
    assert_eq!((counts.total, counts.activated, counts.unused()), (2, 0, 2));
}

fn check_concurrent_first_bind(store: Arc<dyn LicenseStore>) {
    store.insert_if_absent(&code("RACE"), at(0)).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .bind_if_unbound(&code("RACE"), &machine(&format!("HW-{i}")), timestamp_now())
                    .unwrap()
            })
        })
        .collect();

    let outcomes: Vec<BindOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            BindOutcome::Bound(r) => r.machine_id().cloned(),
            _ => None,
        })
        .collect();
    assert_eq!(winners.len(), 1, "[{}] exactly one bind wins", store.backend());

    let stored = store.get(&code("RACE")).unwrap().unwrap();
    assert_eq!(stored.machine_id(), Some(&winners[0]));
    for outcome in &outcomes {
        if let BindOutcome::AlreadyBound(r) = outcome {
            assert_eq!(r.machine_id(), Some(&winners[0]));
        }
    }
}

#[test]
fn insert_if_absent_never_overwrites() {
    for store in backends() {
        check_insert_if_absent(store.as_ref());
    }
}

#[test]
fn bind_only_succeeds_on_unbound_records() {
    for store in backends() {
        check_bind_transitions(store.as_ref());
    }
}

#[test]
fn clear_binding_is_idempotent_and_allows_rebind() {
    for store in backends() {
        check_clear_binding(store.as_ref());
    }
}

#[test]
fn scan_is_newest_first_with_stable_ties() {
    for store in backends() {
        check_scan_order_and_paging(store.as_ref());
    }
}

#[test]
fn delete_updates_counts() {
    for store in backends() {
        check_delete_and_counts(store.as_ref());
    }
}

#[test]
fn concurrent_binds_have_one_winner() {
    for store in backends() {
        check_concurrent_first_bind(store);
    }
}

#[test]
fn sqlite_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("binds.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.insert_if_absent(&code("KEEP"), at(0)).unwrap();
        store
            .bind_if_unbound(&code("KEEP"), &machine("HW-7"), at(1))
            .unwrap();
        store.close().unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    let record = store.get(&code("keep")).unwrap().unwrap();
    assert_eq!(record.machine_id(), Some(&machine("HW-7")));
    assert_eq!(record.activated_at(), Some(at(1)));
    assert_eq!(record.created_at(), at(0));
}
