// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-crate end-to-end scenarios: label-derived queue claim/release,
//! ownership races, and the degraded-status fallback, exercised the way
//! a real daemon tick would drive them rather than through any one
//! crate's unit tests in isolation.

use std::sync::Arc;

use ralph_core::test_support::issue_snapshot;
use ralph_core::{DaemonId, FakeClock, StaleReason, TaskStatus};
use ralph_engine::auto_queue::{AutoQueueRunner, BlockedDecision, Confidence, RelationshipProvider};
use ralph_engine::queue::QueueBackend;
use ralph_engine::EngineError;
use ralph_host::{LabelWritePipeline, MockHost};
use ralph_storage::Store;

fn queue_backend() -> (QueueBackend<FakeClock>, Arc<MockHost<FakeClock>>, Store) {
    let clock = FakeClock::new();
    let store = Store::open_in_memory().unwrap();
    let host = Arc::new(MockHost::with_clock(clock.clone()));
    let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock.clone()));
    (QueueBackend::new(store.clone(), host.clone(), pipeline, clock), host, store)
}

/// Scenario 1: claim a queued issue.
#[tokio::test]
async fn claim_queued_issue_moves_labels_and_persists_ownership() {
    let (queue, host, store) = queue_backend();
    host.seed_issue(issue_snapshot("acme/widgets", 100, &["ralph:status:queued"]));
    let daemon = DaemonId::new();

    let outcome = queue.try_claim("acme/widgets", 100, &daemon).await.unwrap();

    assert_eq!(outcome.op_state.status, TaskStatus::Queued);
    assert_eq!(outcome.op_state.daemon_id, Some(daemon.clone()));

    let snap = host.get_issue("acme/widgets", 100).await.unwrap();
    assert!(snap.labels.contains("ralph:status:in-progress"));
    assert!(!snap.labels.contains("ralph:status:queued"));

    let persisted = store.get_task_op_state("acme/widgets", 100).unwrap().unwrap();
    assert_eq!(persisted.daemon_id, Some(daemon));
}

/// Scenario 2: a stale heartbeat is recovered back to `queued`.
#[tokio::test]
async fn stale_ownership_is_recovered_to_queued() {
    let (queue, host, store) = queue_backend();
    host.seed_issue(issue_snapshot("acme/widgets", 7, &["ralph:status:in-progress"]));
    let stale_daemon = DaemonId::new();
    let now_ms = 1_000_000u64;
    let ttl_ms = 60_000u64;

    let path = ralph_core::TaskPath::new("github.com", "acme/widgets", 7);
    let mut op_state = ralph_core::TaskOpState::new(path, TaskStatus::InProgress)
        .claimed_by(stale_daemon.clone(), now_ms - ttl_ms - 1_000);
    op_state.session_id = Some(ralph_core::RunId::from_string("s".to_string()));
    store.record_task_snapshot(&op_state).unwrap();

    let recovered = queue.recover_stale_sweep(ttl_ms, None).unwrap();

    assert_eq!(recovered.len(), 1);
    let (repo, issue_number, reason) = &recovered[0];
    assert_eq!(repo, "acme/widgets");
    assert_eq!(*issue_number, 7);
    assert_eq!(*reason, StaleReason::StaleHeartbeat);

    let persisted = store.get_task_op_state("acme/widgets", 7).unwrap().unwrap();
    assert_eq!(persisted.status, TaskStatus::Queued);
    assert!(persisted.released_at_ms.is_some());
    assert!(persisted.released_reason.unwrap().contains("stale-heartbeat"));
}

/// Scenario 6: a paused issue refuses the claim with no mutation.
#[tokio::test]
async fn paused_issue_refuses_claim_without_mutating_state() {
    let (queue, host, store) = queue_backend();
    host.seed_issue(issue_snapshot("acme/widgets", 42, &["ralph:status:paused"]));
    let daemon = DaemonId::new();

    let err = queue.try_claim("acme/widgets", 42, &daemon).await.unwrap_err();
    match err {
        EngineError::NotClaimable(reason) => assert!(reason.contains("paused")),
        other => panic!("expected NotClaimable, got {other:?}"),
    }

    let snap = host.get_issue("acme/widgets", 42).await.unwrap();
    assert!(snap.labels.contains("ralph:status:paused"));
    assert!(store.get_task_op_state("acme/widgets", 42).unwrap().is_none());
}

/// Scenario 4: the auto-queue runner adds `queued` when a relationship
/// provider reports certain-and-unblocked.
struct AlwaysUnblocked;

#[async_trait::async_trait]
impl RelationshipProvider for AlwaysUnblocked {
    async fn check_blocked(&self, _repo: &str, _issue_number: u64) -> ralph_engine::Result<BlockedDecision> {
        Ok(BlockedDecision { blocked: false, confidence: Confidence::Certain, reasons: Vec::new() })
    }
}

#[tokio::test]
async fn auto_queue_adds_queued_and_removes_blocked_on_certain_unblocked() {
    let clock = FakeClock::new();
    let store = Store::open_in_memory().unwrap();
    let host = Arc::new(MockHost::with_clock(clock.clone()));
    let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock.clone()));

    let snapshot = issue_snapshot("acme/widgets", 9, &["ralph:blocked"]);
    host.seed_issue(snapshot.clone());
    store.record_issue_snapshot(&snapshot).unwrap();

    let runner = AutoQueueRunner::new(store.clone(), pipeline, Arc::new(AlwaysUnblocked), false);
    let changed = runner.tick("acme/widgets", 50, false).await.unwrap();

    assert_eq!(changed, 1);
    let snap = host.get_issue("acme/widgets", 9).await.unwrap();
    assert!(snap.labels.contains("ralph:status:queued"));
    assert!(!snap.labels.contains("ralph:blocked"));
}

/// Scenario 4 (skip half): an `Unknown`-confidence blocked decision is
/// left untouched rather than guessed at.
#[tokio::test]
async fn auto_queue_skips_unknown_confidence_decisions() {
    let clock = FakeClock::new();
    let store = Store::open_in_memory().unwrap();
    let host = Arc::new(MockHost::with_clock(clock.clone()));
    let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock.clone()));

    let snapshot = issue_snapshot("acme/widgets", 11, &["ralph:blocked"]);
    host.seed_issue(snapshot.clone());
    store.record_issue_snapshot(&snapshot).unwrap();

    let runner =
        AutoQueueRunner::new(store.clone(), pipeline, Arc::new(ralph_engine::auto_queue::NullRelationshipProvider), false);
    let changed = runner.tick("acme/widgets", 50, false).await.unwrap();

    assert_eq!(changed, 0);
    let snap = host.get_issue("acme/widgets", 11).await.unwrap();
    assert!(snap.labels.contains("ralph:blocked"));
}

/// Scenario 7: a forward-incompatible schema window still yields a
/// usable, degraded `status --json` snapshot instead of failing outright.
#[test]
fn degraded_status_reports_forward_incompatible_schema() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.sqlite");

    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta(key, value) VALUES ('schema_version', '999');",
        )
        .unwrap();
    }

    let snapshot = ralph_daemon::ipc::degraded_status_snapshot(&db_path);

    assert!(!snapshot.durable_state.ok);
    assert_eq!(snapshot.durable_state.code, "forward_incompatible");
    assert!(!snapshot.durable_state.can_read_state);
    assert!(!snapshot.durable_state.can_write_state);
    assert!(snapshot.durable_state.requires_migration);
    assert!(snapshot.in_progress.is_empty());
    assert!(snapshot.queued.is_empty());
}

/// Scenario 7 (healthy half): a freshly-migrated database reports ok.
#[test]
fn degraded_status_reports_ok_for_a_fresh_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.sqlite");
    let (_store, verdict) = Store::open(&db_path).unwrap();
    assert_eq!(verdict, ralph_storage::SchemaVerdict::ReadableWritable);

    let snapshot = ralph_daemon::ipc::degraded_status_snapshot(&db_path);
    assert!(snapshot.durable_state.ok);
    assert_eq!(snapshot.durable_state.code, "ok");
}

/// Scenario 7 (lock-contended half): a database another process holds
/// an exclusive lock on reports `lock_timeout`, not a hard failure.
#[test]
#[serial_test::serial(probe_busy_timeout_env)]
fn degraded_status_reports_lock_timeout_when_store_is_locked() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("state.sqlite");
    drop(Store::open(&db_path).unwrap());

    let blocker = rusqlite::Connection::open(&db_path).unwrap();
    blocker.pragma_update(None, "locking_mode", "EXCLUSIVE").unwrap();
    blocker.execute_batch("BEGIN; SELECT 1 FROM meta; COMMIT;").unwrap();

    std::env::set_var("RALPH_STATE_DB_PROBE_BUSY_TIMEOUT_MS", "20");
    let snapshot = ralph_daemon::ipc::degraded_status_snapshot(&db_path);
    std::env::remove_var("RALPH_STATE_DB_PROBE_BUSY_TIMEOUT_MS");
    drop(blocker);

    assert!(!snapshot.durable_state.ok);
    assert_eq!(snapshot.durable_state.code, "lock_timeout");
    assert!(!snapshot.durable_state.can_read_state);
    assert!(!snapshot.durable_state.can_write_state);
    assert!(!snapshot.durable_state.requires_migration);
}
