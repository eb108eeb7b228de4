//! Transaction coordination across lifecycle calls.

mod common;

use common::{users, users_ddl, Env};
use recordkit_core::{
    field_values, Asset, AssetError, CommitOutcome, Config, FieldValues, Record, RecordError,
    RecordHooks,
};
use recordkit_driver::{DriverError, Value};
use recordkit_testkit::write_asset;
use std::sync::Arc;

fn user(name: &str) -> FieldValues {
    field_values([("name", Value::from(name)), ("avatar", Value::from(format!("{name}.png")))])
}

/// Each user owns the avatar file named in its `avatar` field.
struct Avatar;

impl RecordHooks for Avatar {
    fn assets(&self, record: &Record) -> Vec<Asset> {
        record
            .get("avatar")
            .and_then(Value::as_str)
            .map(|file| vec![Asset::file(file)])
            .unwrap_or_default()
    }
}

fn env_with_assets() -> Env {
    Env::with_config(&[users_ddl()], |db| Config::default().asset_root(db.asset_dir()))
}

#[test]
fn nested_levels_share_one_physical_transaction() {
    for depth in 1..=5 {
        let mut env = Env::new(&[users_ddl()]);
        let users = users(None);

        for _ in 0..depth {
            env.session.begin_transaction().unwrap();
        }
        env.session.insert(&users, &user("A")).unwrap();
        env.session.fetch_all(&users).unwrap();
        for _ in 0..depth {
            env.session.end_transaction().unwrap();
        }

        assert_eq!(env.probe.begins(), 1, "depth {depth}");
        assert_eq!(env.probe.commits(), 1, "depth {depth}");
        assert_eq!(env.probe.connects(), 1, "depth {depth}");
        assert_eq!(env.session.depth(), 0);
    }
}

#[test]
fn implicit_transaction_closes_after_success() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    env.session.insert(&users, &user("A")).unwrap();
    assert!(!env.session.is_open());
    assert_eq!(env.probe.commits(), 1);
    assert_eq!(env.probe.closes(), 1);
}

#[test]
fn implicit_transaction_closes_after_driver_failure() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    env.probe.fail_next_execute();
    let err = env.session.fetch_all(&users).unwrap_err();
    assert!(matches!(err, RecordError::Driver(DriverError::Injected(_))));
    assert!(!env.session.is_open());
    assert_eq!(env.session.depth(), 0);
    assert_eq!(env.probe.rollbacks(), 1);
    assert_eq!(env.probe.closes(), 1);
}

#[test]
fn explicit_transaction_survives_lifecycle_calls() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    env.session.begin_transaction().unwrap();
    env.session.insert(&users, &user("A")).unwrap();
    env.session.insert(&users, &user("B")).unwrap();
    assert!(env.session.is_open());
    assert_eq!(env.probe.commits(), 0);

    assert!(env.session.end_transaction().unwrap().is_committed());
    assert_eq!(env.db.row_count("users"), 2);
}

#[test]
fn outer_rollback_discards_inner_writes() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    let result = env.session.with_transaction(|s| {
        s.insert(&users, &user("A"))?;
        s.insert(&users, &user("B"))?;
        Err::<(), _>(RecordError::validation("users", "changed my mind"))
    });

    assert!(matches!(result, Err(RecordError::Validation { .. })));
    assert_eq!(env.db.row_count("users"), 0);
    assert!(!env.session.is_open());
}

#[test]
fn driver_failure_in_nested_call_dooms_the_transaction() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    env.session.begin_transaction().unwrap();
    env.session.insert(&users, &user("A")).unwrap();
    env.probe.fail_next_execute();
    assert!(env.session.insert(&users, &user("B")).is_err());
    assert!(env.session.is_rollback_only());

    let err = env.session.count(&users).unwrap_err();
    assert!(matches!(err, RecordError::TransactionAborted { .. }));

    let err = env.session.end_transaction().unwrap_err();
    assert!(matches!(err, RecordError::TransactionAborted { .. }));
    assert_eq!(env.probe.commits(), 0);
    assert_eq!(env.db.row_count("users"), 0);
    assert!(!env.session.is_open());
}

#[test]
fn precondition_failure_in_nested_call_keeps_the_transaction() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    env.session.begin_transaction().unwrap();
    env.session.insert(&users, &user("A")).unwrap();
    assert!(env.session.fetch_by_key(&users, "age", 1u32).is_err());
    assert!(!env.session.is_rollback_only());
    env.session.end_transaction().unwrap();

    assert_eq!(env.db.row_count("users"), 1);
}

#[test]
fn unmatched_end_is_rejected() {
    let mut env = Env::new(&[users_ddl()]);
    let err = env.session.end_transaction().unwrap_err();
    assert!(matches!(err, RecordError::UnmatchedEnd));
    assert!(err.is_precondition());
}

#[test]
fn failed_begin_leaves_the_session_closed() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    env.probe.fail_next_begin();
    assert!(env.session.insert(&users, &user("A")).is_err());
    assert!(!env.session.is_open());
    assert_eq!(env.session.depth(), 0);
    assert_eq!(env.probe.closes(), 1);

    env.session.insert(&users, &user("A")).unwrap();
    assert_eq!(env.db.row_count("users"), 1);
}

#[test]
fn deleted_assets_are_removed_after_commit() {
    let mut env = env_with_assets();
    let users = users(Some(Arc::new(Avatar)));
    let avatar = write_asset(&env.db.asset_dir(), "A.png");
    let mut record = env.session.insert(&users, &user("A")).unwrap();

    env.session.begin_transaction().unwrap();
    env.session.delete(&mut record).unwrap();
    assert_eq!(env.session.pending_assets(), 1);
    assert!(avatar.exists());

    match env.session.end_transaction().unwrap() {
        CommitOutcome::Committed(report) => {
            assert!(report.is_clean());
            assert_eq!(report.removed, vec![avatar.clone()]);
        }
        CommitOutcome::Nested => panic!("expected the outermost end to commit"),
    }
    assert!(!avatar.exists());
}

#[test]
fn implicit_delete_removes_assets() {
    let mut env = env_with_assets();
    let users = users(Some(Arc::new(Avatar)));
    let avatar = write_asset(&env.db.asset_dir(), "A.png");
    let mut record = env.session.insert(&users, &user("A")).unwrap();

    env.session.delete(&mut record).unwrap();
    assert!(!avatar.exists());
    assert!(env.session.take_asset_failures().is_empty());
}

#[test]
fn failed_commit_never_removes_assets() {
    let mut env = env_with_assets();
    let users = users(Some(Arc::new(Avatar)));
    let avatar = write_asset(&env.db.asset_dir(), "A.png");
    let mut record = env.session.insert(&users, &user("A")).unwrap();

    env.session.begin_transaction().unwrap();
    env.session.delete(&mut record).unwrap();
    env.probe.fail_next_commit();

    let err = env.session.end_transaction().unwrap_err();
    assert!(matches!(err, RecordError::CommitFailed { .. }));
    assert!(avatar.exists());
    assert_eq!(env.db.row_count("users"), 1);
    assert!(!env.session.is_open());
}

#[test]
fn rolled_back_delete_never_removes_assets() {
    let mut env = env_with_assets();
    let users = users(Some(Arc::new(Avatar)));
    let avatar = write_asset(&env.db.asset_dir(), "A.png");
    let mut record = env.session.insert(&users, &user("A")).unwrap();

    let result = env.session.with_transaction(|s| {
        s.delete(&mut record)?;
        Err::<(), _>(RecordError::from(DriverError::Closed))
    });

    assert!(result.is_err());
    assert!(avatar.exists());
    assert_eq!(env.db.row_count("users"), 1);
}

#[test]
fn missing_asset_is_reported_without_rollback() {
    let mut env = env_with_assets();
    let users = users(Some(Arc::new(Avatar)));
    let mut record = env.session.insert(&users, &user("A")).unwrap();

    env.session.delete(&mut record).unwrap();

    assert_eq!(env.db.row_count("users"), 0);
    let failures = env.session.take_asset_failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], AssetError::Missing { .. }));
    assert!(failures[0].path().ends_with("A.png"));
}

#[test]
fn stale_copy_delete_queues_no_assets() {
    let mut env = env_with_assets();
    let users = users(Some(Arc::new(Avatar)));
    let avatar = write_asset(&env.db.asset_dir(), "A.png");
    let mut record = env.session.insert(&users, &user("A")).unwrap();
    let mut copy = record.clone();

    env.session.delete(&mut record).unwrap();
    assert!(!avatar.exists());

    env.session.begin_transaction().unwrap();
    let err = env.session.delete(&mut copy).unwrap_err();
    assert!(matches!(err, RecordError::RowMissing { .. }));
    assert_eq!(env.session.pending_assets(), 0);
    assert!(env.session.is_rollback_only());
    assert!(env.session.end_transaction().is_err());

    assert!(env.session.take_asset_failures().is_empty());
}

#[test]
fn statement_cache_is_dropped_with_the_connection() {
    let mut env = Env::new(&[users_ddl()]);
    let users = users(None);

    env.session.begin_transaction().unwrap();
    env.session.insert(&users, &user("A")).unwrap();
    assert!(env.session.statement_cache_len() > 0);
    env.session.end_transaction().unwrap();
    assert_eq!(env.session.statement_cache_len(), 0);

    let prepares = env.probe.prepares();
    env.session.insert(&users, &user("B")).unwrap();
    assert!(env.probe.prepares() > prepares);
}

#[test]
fn shared_session_runs_one_transaction_at_a_time() {
    let env = Env::new(&[users_ddl()]);
    let users = users(None);
    let Env { session, probe, db } = env;
    let shared = session.into_shared();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let shared = Arc::clone(&shared);
            let users = Arc::clone(&users);
            std::thread::spawn(move || {
                let mut session = shared.lock();
                session
                    .with_transaction(|s| {
                        s.insert(&users, &user(&format!("user{i}")))?;
                        s.count(&users)
                    })
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap() >= 1);
    }

    assert_eq!(probe.commits(), 4);
    assert_eq!(db.row_count("users"), 4);
}
