// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! I/O-performing half of the label-derived queue backend (C5). The
//! pure decisions (`plan_claim`, `status_to_label_delta`,
//! `recover_stale`) live in `ralph_core`; this module fetches live
//! state, applies the resulting label deltas through the write
//! pipeline, and persists the local op-state.

use std::sync::Arc;

use ralph_core::{
    can_act_on_task, plan_claim, recover_stale, status_to_label_delta, Clock, DaemonId, LabelDelta,
    StaleReason, TaskOpState, TaskStatus,
};
use ralph_host::{IssueHost, LabelWritePipeline};
use ralph_storage::Store;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Default ownership TTL: a heartbeat older than this is stale.
pub const DEFAULT_OWNERSHIP_TTL_MS: u64 = 60_000;

/// Outcome of a successful claim or resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub op_state: TaskOpState,
}

/// The I/O-performing half of C5, parameterized over the clock so
/// tests can drive it with `FakeClock`.
pub struct QueueBackend<C: Clock> {
    store: Store,
    host: Arc<dyn IssueHost>,
    pipeline: Arc<LabelWritePipeline<C>>,
    clock: C,
}

impl<C: Clock> QueueBackend<C> {
    pub fn new(store: Store, host: Arc<dyn IssueHost>, pipeline: Arc<LabelWritePipeline<C>>, clock: C) -> Self {
        Self { store, host, pipeline, clock }
    }

    /// Claim a queued task: re-fetch live labels (never the cache),
    /// re-plan, apply the mutation, then persist both the refreshed
    /// label cache and the new op-state.
    pub async fn try_claim(&self, repo: &str, issue_number: u64, daemon_id: &DaemonId) -> Result<ClaimOutcome> {
        let issue = self.host.get_issue(repo, issue_number).await?;
        let plan = plan_claim(&issue.labels);
        if !plan.claimable {
            return Err(EngineError::NotClaimable(
                plan.reason.unwrap_or_else(|| "not claimable".to_string()),
            ));
        }

        self.pipeline.apply(repo, issue_number, &plan.steps, true).await?;

        let mut labels = issue.labels.clone();
        for label in &plan.steps.remove {
            labels.remove(label);
        }
        for label in &plan.steps.add {
            labels.insert(label.clone());
        }
        self.store.record_issue_labels_snapshot(repo, issue_number, &labels)?;

        let now_ms = self.clock.epoch_ms();
        let path = ralph_core::TaskPath::new("github.com", repo, issue_number);
        let op_state = TaskOpState::new(path, TaskStatus::Queued).claimed_by(daemon_id.clone(), now_ms);
        self.store.record_task_snapshot(&op_state)?;

        debug!(repo, issue_number, %daemon_id, "task claimed");
        Ok(ClaimOutcome { op_state })
    }

    /// Resume an already-in-progress task. Refuses if another daemon
    /// owns it with a fresh heartbeat; otherwise takes ownership by
    /// recording a new heartbeat.
    pub async fn resume(&self, repo: &str, issue_number: u64, daemon_id: &DaemonId, ttl_ms: u64) -> Result<ClaimOutcome> {
        let now_ms = self.clock.epoch_ms();
        let existing = self.store.get_task_op_state(repo, issue_number)?;

        if let Some(existing) = &existing {
            if let Some(owner) = &existing.daemon_id {
                if !can_act_on_task(owner, existing.heartbeat_at_ms, daemon_id, now_ms, ttl_ms) {
                    return Err(EngineError::OwnershipConflict(format!(
                        "{repo}#{issue_number} is owned by {owner} with a fresh heartbeat"
                    )));
                }
            }
        }

        let path = ralph_core::TaskPath::new("github.com", repo, issue_number);
        let op_state = TaskOpState::new(path, TaskStatus::InProgress).claimed_by(daemon_id.clone(), now_ms);
        self.store.record_task_snapshot(&op_state)?;
        Ok(ClaimOutcome { op_state })
    }

    /// Record a fresh heartbeat for a task this daemon still owns.
    /// Returns `false` (without writing) if ownership has moved on.
    pub fn heartbeat(&self, repo: &str, issue_number: u64, daemon_id: &DaemonId) -> Result<bool> {
        let now_ms = self.clock.epoch_ms();
        let Some(existing) = self.store.get_task_op_state(repo, issue_number)? else {
            return Ok(false);
        };
        if existing.daemon_id.as_ref() != Some(daemon_id) {
            return Ok(false);
        }
        let outcome = self.store.update_task_status_if_ownership_unchanged(
            repo,
            issue_number,
            daemon_id,
            existing.heartbeat_at_ms,
            existing.status,
            None,
        )?;
        if outcome.updated {
            let refreshed = TaskOpState { heartbeat_at_ms: Some(now_ms), ..existing };
            self.store.record_task_snapshot(&refreshed)?;
        }
        Ok(outcome.updated)
    }

    /// Move a task to a terminal or resting status (`done`, `blocked`,
    /// `throttled`, `escalated`, `waiting-on-pr`, `paused`, `stopped`),
    /// applying the corresponding label delta and releasing the slot
    /// when the status implies the task is no longer active.
    pub async fn update_status(
        &self,
        repo: &str,
        issue_number: u64,
        status: TaskStatus,
        released_reason: Option<&str>,
    ) -> Result<()> {
        let current_labels = self
            .store
            .get_issue_snapshot(repo, issue_number)?
            .map(|s| s.labels)
            .unwrap_or_default();
        let delta = status_to_label_delta(status, &current_labels);
        if !delta.is_empty() {
            self.pipeline.apply(repo, issue_number, &delta, true).await?;
        }

        let mut labels = current_labels;
        for label in &delta.remove {
            labels.remove(label);
        }
        for label in &delta.add {
            labels.insert(label.clone());
        }
        self.store.record_issue_labels_snapshot(repo, issue_number, &labels)?;

        let still_active =
            matches!(status, TaskStatus::Starting | TaskStatus::InProgress | TaskStatus::WaitingOnPr);
        if still_active {
            if let Some(mut existing) = self.store.get_task_op_state(repo, issue_number)? {
                existing.status = status;
                self.store.record_task_snapshot(&existing)?;
            }
            return Ok(());
        }

        let now_ms = self.clock.epoch_ms();
        self.store.release_task_slot(
            repo,
            issue_number,
            status,
            now_ms,
            released_reason.unwrap_or("status-transition"),
        )?;
        Ok(())
    }

    /// Sweep every locally-tracked task op-state and recover any whose
    /// ownership has gone stale, releasing the slot back to `queued`.
    /// Paused during draining for new claims, but this sweep keeps
    /// running so orphaned tasks still surface.
    pub fn recover_stale_sweep(&self, ttl_ms: u64, grace_ms: Option<u64>) -> Result<Vec<(String, u64, StaleReason)>> {
        let now_ms = self.clock.epoch_ms();
        let mut recovered = Vec::new();
        for op_state in self.store.list_task_op_states()? {
            if !matches!(op_state.status, TaskStatus::Starting | TaskStatus::InProgress | TaskStatus::WaitingOnPr) {
                continue;
            }
            let decision = recover_stale(Some(&op_state), now_ms, ttl_ms, grace_ms);
            if !decision.should_recover {
                continue;
            }
            let Some(reason) = decision.reason else { continue };
            let repo = op_state.task_path.repo.clone();
            let issue_number = op_state.task_path.issue_number;
            let Some(daemon_id) = op_state.daemon_id.clone() else { continue };

            let outcome = self.store.clear_task_op_state(
                &repo,
                issue_number,
                &daemon_id,
                op_state.heartbeat_at_ms,
                TaskStatus::Queued,
                now_ms,
                reason.as_str(),
            )?;
            if outcome.updated {
                warn!(repo, issue_number, reason = reason.as_str(), "recovered stale task claim");
                recovered.push((repo, issue_number, reason));
            }
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_core::test_support::issue_snapshot;
    use ralph_core::FakeClock;
    use ralph_host::MockHost;

    fn backend() -> (QueueBackend<FakeClock>, Arc<MockHost<FakeClock>>, Store) {
        let clock = FakeClock::new();
        let store = Store::open_in_memory().unwrap();
        let host = Arc::new(MockHost::with_clock(clock.clone()));
        let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock.clone()));
        (QueueBackend::new(store.clone(), host.clone(), pipeline, clock), host, store)
    }

    #[tokio::test]
    async fn claims_a_queued_task_and_persists_op_state() {
        let (backend, host, store) = backend();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &["ralph:status:queued"]));
        let daemon = DaemonId::new();

        let outcome = backend.try_claim("acme/widgets", 1, &daemon).await.unwrap();
        assert_eq!(outcome.op_state.status, TaskStatus::InProgress);

        let snap = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(snap.labels.contains("ralph:status:in-progress"));
        assert!(!snap.labels.contains("ralph:status:queued"));

        let persisted = store.get_task_op_state("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(persisted.daemon_id, Some(daemon));
    }

    #[tokio::test]
    async fn refuses_to_claim_a_blocked_task() {
        let (backend, host, _store) = backend();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &["ralph:status:paused"]));
        let err = backend.try_claim("acme/widgets", 1, &DaemonId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotClaimable(_)));
    }

    #[tokio::test]
    async fn resume_refuses_when_owner_has_a_fresh_heartbeat() {
        let (backend, _host, store) = backend();
        let owner = DaemonId::new();
        let mut op = TaskOpState::new(ralph_core::TaskPath::new("github.com", "acme/widgets", 1), TaskStatus::InProgress);
        op = op.claimed_by(owner.clone(), 1_000_000);
        store.record_task_snapshot(&op).unwrap();

        let err = backend
            .resume("acme/widgets", 1, &DaemonId::new(), DEFAULT_OWNERSHIP_TTL_MS)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::OwnershipConflict(_)));
    }

    #[tokio::test]
    async fn stale_sweep_recovers_tasks_with_missing_heartbeat() {
        let (backend, _host, store) = backend();
        let owner = DaemonId::new();
        let mut op = TaskOpState::new(ralph_core::TaskPath::new("github.com", "acme/widgets", 1), TaskStatus::InProgress);
        op.daemon_id = Some(owner);
        store.record_task_snapshot(&op).unwrap();

        let recovered = backend.recover_stale_sweep(DEFAULT_OWNERSHIP_TTL_MS, None).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].2, StaleReason::MissingHeartbeat);

        let after = store.get_task_op_state("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Queued);
        assert!(after.daemon_id.is_none());
    }

    #[tokio::test]
    async fn update_status_to_done_releases_the_slot() {
        let (backend, host, store) = backend();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &["ralph:status:in-progress"]));
        store.record_issue_labels_snapshot("acme/widgets", 1, &issue_snapshot("acme/widgets", 1, &["ralph:status:in-progress"]).labels).unwrap();
        let daemon = DaemonId::new();
        let op = TaskOpState::new(ralph_core::TaskPath::new("github.com", "acme/widgets", 1), TaskStatus::InProgress)
            .claimed_by(daemon, 1_000);
        store.record_task_snapshot(&op).unwrap();

        backend.update_status("acme/widgets", 1, TaskStatus::Done, Some("agent-success")).await.unwrap();

        let after = store.get_task_op_state("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(after.status, TaskStatus::Done);
        assert!(after.daemon_id.is_none());
    }
}
