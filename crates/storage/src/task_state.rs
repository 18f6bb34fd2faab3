// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task op-state persistence, including the compare-and-swap primitives
//! that guard ownership transitions against concurrent daemons.

use ralph_core::{DaemonId, RunId, TaskOpState, TaskPath, TaskStatus};

use crate::error::Result;
use crate::store::Store;

fn status_str(status: TaskStatus) -> &'static str {
    status.as_str()
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "queued" => TaskStatus::Queued,
        "starting" => TaskStatus::Starting,
        "in-progress" => TaskStatus::InProgress,
        "waiting-on-pr" => TaskStatus::WaitingOnPr,
        "throttled" => TaskStatus::Throttled,
        "blocked" => TaskStatus::Blocked,
        "escalated" => TaskStatus::Escalated,
        "paused" => TaskStatus::Paused,
        "stopped" => TaskStatus::Stopped,
        _ => TaskStatus::Done,
    }
}

/// Outcome of a compare-and-swap write against `task_op_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasOutcome {
    pub updated: bool,
    pub race_skipped: bool,
}

impl Store {
    /// Upsert a task op-state row, merging non-null fields into any
    /// existing row for the same `(repo, issueNumber)`.
    pub fn record_task_snapshot(&self, state: &TaskOpState) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_op_state
                    (repo, issue_number, status, session_id, worktree_path, worker_id,
                     repo_slot, daemon_id, heartbeat_at_ms, released_at_ms, released_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(repo, issue_number) DO UPDATE SET
                    status = excluded.status,
                    session_id = COALESCE(excluded.session_id, task_op_state.session_id),
                    worktree_path = COALESCE(excluded.worktree_path, task_op_state.worktree_path),
                    worker_id = COALESCE(excluded.worker_id, task_op_state.worker_id),
                    repo_slot = COALESCE(excluded.repo_slot, task_op_state.repo_slot),
                    daemon_id = excluded.daemon_id,
                    heartbeat_at_ms = excluded.heartbeat_at_ms,
                    released_at_ms = excluded.released_at_ms,
                    released_reason = excluded.released_reason",
                rusqlite::params![
                    state.task_path.repo,
                    state.task_path.issue_number as i64,
                    status_str(state.status),
                    state.session_id.as_ref().map(|s| s.to_string()),
                    state.worktree_path,
                    state.worker_id,
                    state.repo_slot,
                    state.daemon_id.as_ref().map(|d| d.to_string()),
                    state.heartbeat_at_ms.map(|v| v as i64),
                    state.released_at_ms.map(|v| v as i64),
                    state.released_reason,
                ],
            )?;
            Ok(())
        })
    }

    /// Every task op-state row, for the stale sweep and the drift
    /// reconciler's per-tick scans.
    pub fn list_task_op_states(&self) -> Result<Vec<TaskOpState>> {
        let keys = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT repo, issue_number FROM task_op_state")?;
            let keys = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })?;
        let mut states = Vec::with_capacity(keys.len());
        for (repo, issue_number) in keys {
            if let Some(state) = self.get_task_op_state(&repo, issue_number)? {
                states.push(state);
            }
        }
        Ok(states)
    }

    pub fn get_task_op_state(&self, repo: &str, issue_number: u64) -> Result<Option<TaskOpState>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT status, session_id, worktree_path, worker_id, repo_slot,
                        daemon_id, heartbeat_at_ms, released_at_ms, released_reason
                 FROM task_op_state WHERE repo = ?1 AND issue_number = ?2",
                rusqlite::params![repo, issue_number as i64],
                |row| {
                    Ok(TaskOpState {
                        task_path: TaskPath::new("github.com", repo, issue_number),
                        status: parse_status(&row.get::<_, String>(0)?),
                        session_id: row.get::<_, Option<String>>(1)?.map(RunId::from_string),
                        worktree_path: row.get(2)?,
                        worker_id: row.get(3)?,
                        repo_slot: row.get(4)?,
                        daemon_id: row.get::<_, Option<String>>(5)?.map(DaemonId::from_string),
                        heartbeat_at_ms: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
                        released_at_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
                        released_reason: row.get(8)?,
                    })
                },
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(crate::error::StorageError::from(other)),
            })
        })
    }

    /// Compare-and-swap status transition: fails closed (`race_skipped`)
    /// if the row's current `daemon_id`/`heartbeat_at_ms` no longer match
    /// what the caller observed.
    pub fn update_task_status_if_ownership_unchanged(
        &self,
        repo: &str,
        issue_number: u64,
        expected_daemon_id: &DaemonId,
        expected_heartbeat_at_ms: Option<u64>,
        status: TaskStatus,
        released_at_ms: Option<u64>,
    ) -> Result<CasOutcome> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE task_op_state
                 SET status = ?1, released_at_ms = ?2
                 WHERE repo = ?3 AND issue_number = ?4
                   AND daemon_id = ?5
                   AND heartbeat_at_ms IS ?6",
                rusqlite::params![
                    status_str(status),
                    released_at_ms.map(|v| v as i64),
                    repo,
                    issue_number as i64,
                    expected_daemon_id.to_string(),
                    expected_heartbeat_at_ms.map(|v| v as i64),
                ],
            )?;
            Ok(CasOutcome { updated: changed > 0, race_skipped: changed == 0 })
        })
    }

    /// CAS delete-or-mark-released: clears ownership fields and records
    /// the release reason, only if ownership still matches.
    pub fn clear_task_op_state(
        &self,
        repo: &str,
        issue_number: u64,
        expected_daemon_id: &DaemonId,
        expected_heartbeat_at_ms: Option<u64>,
        status: TaskStatus,
        released_at_ms: u64,
        released_reason: &str,
    ) -> Result<CasOutcome> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE task_op_state
                 SET status = ?1, daemon_id = NULL, heartbeat_at_ms = NULL,
                     released_at_ms = ?2, released_reason = ?3
                 WHERE repo = ?4 AND issue_number = ?5
                   AND daemon_id = ?6
                   AND heartbeat_at_ms IS ?7",
                rusqlite::params![
                    status_str(status),
                    released_at_ms as i64,
                    released_reason,
                    repo,
                    issue_number as i64,
                    expected_daemon_id.to_string(),
                    expected_heartbeat_at_ms.map(|v| v as i64),
                ],
            )?;
            Ok(CasOutcome { updated: changed > 0, race_skipped: changed == 0 })
        })
    }

    /// Unconditional release, used by operator commands (`pause`/`stop`)
    /// that do not need to respect in-flight ownership.
    pub fn release_task_slot(
        &self,
        repo: &str,
        issue_number: u64,
        status: TaskStatus,
        released_at_ms: u64,
        released_reason: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE task_op_state
                 SET status = ?1, daemon_id = NULL, heartbeat_at_ms = NULL,
                     released_at_ms = ?2, released_reason = ?3
                 WHERE repo = ?4 AND issue_number = ?5",
                rusqlite::params![status_str(status), released_at_ms as i64, released_reason, repo, issue_number as i64],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_core::test_support::claimed_task_op_state;

    #[test]
    fn record_and_fetch_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let daemon = DaemonId::new();
        let state = claimed_task_op_state("acme/widgets", 1, daemon.clone(), 1_000);
        store.record_task_snapshot(&state).unwrap();

        let loaded = store.get_task_op_state("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::InProgress);
        assert_eq!(loaded.daemon_id, Some(daemon));
    }

    #[test]
    fn cas_update_succeeds_when_ownership_matches() {
        let store = Store::open_in_memory().unwrap();
        let daemon = DaemonId::new();
        let state = claimed_task_op_state("acme/widgets", 1, daemon.clone(), 1_000);
        store.record_task_snapshot(&state).unwrap();

        let outcome = store
            .update_task_status_if_ownership_unchanged(
                "acme/widgets",
                1,
                &daemon,
                Some(1_000),
                TaskStatus::WaitingOnPr,
                None,
            )
            .unwrap();
        assert!(outcome.updated);
        assert!(!outcome.race_skipped);
    }

    #[test]
    fn cas_update_fails_closed_on_ownership_mismatch() {
        let store = Store::open_in_memory().unwrap();
        let daemon = DaemonId::new();
        let other = DaemonId::new();
        let state = claimed_task_op_state("acme/widgets", 1, daemon, 1_000);
        store.record_task_snapshot(&state).unwrap();

        let outcome = store
            .update_task_status_if_ownership_unchanged(
                "acme/widgets",
                1,
                &other,
                Some(1_000),
                TaskStatus::WaitingOnPr,
                None,
            )
            .unwrap();
        assert!(!outcome.updated);
        assert!(outcome.race_skipped);
    }

    #[test]
    fn clear_task_op_state_releases_ownership() {
        let store = Store::open_in_memory().unwrap();
        let daemon = DaemonId::new();
        let state = claimed_task_op_state("acme/widgets", 1, daemon.clone(), 1_000);
        store.record_task_snapshot(&state).unwrap();

        let outcome = store
            .clear_task_op_state(
                "acme/widgets",
                1,
                &daemon,
                Some(1_000),
                TaskStatus::Queued,
                2_000,
                "stale-heartbeat",
            )
            .unwrap();
        assert!(outcome.updated);

        let loaded = store.get_task_op_state("acme/widgets", 1).unwrap().unwrap();
        assert!(loaded.daemon_id.is_none());
        assert_eq!(loaded.released_reason.as_deref(), Some("stale-heartbeat"));
    }

    #[test]
    fn release_task_slot_is_unconditional() {
        let store = Store::open_in_memory().unwrap();
        let daemon = DaemonId::new();
        let state = claimed_task_op_state("acme/widgets", 1, daemon, 1_000);
        store.record_task_snapshot(&state).unwrap();

        store
            .release_task_slot("acme/widgets", 1, TaskStatus::Stopped, 5_000, "operator-stop")
            .unwrap();

        let loaded = store.get_task_op_state("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Stopped);
        assert!(loaded.daemon_id.is_none());
    }

    #[test]
    fn list_returns_every_row() {
        let store = Store::open_in_memory().unwrap();
        let daemon = DaemonId::new();
        store.record_task_snapshot(&claimed_task_op_state("acme/widgets", 1, daemon.clone(), 1_000)).unwrap();
        store.record_task_snapshot(&claimed_task_op_state("acme/widgets", 2, daemon, 1_000)).unwrap();

        let all = store.list_task_op_states().unwrap();
        assert_eq!(all.len(), 2);
    }
}
