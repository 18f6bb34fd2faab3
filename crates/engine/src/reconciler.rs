// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The drift reconciler (C6): two cooperating loops that keep the
//! remote label set and the local op-state converged, plus the
//! idempotency bookkeeping that bounds how often either direction may
//! rewrite the other.

use std::sync::Arc;

use ralph_core::{
    is_heartbeat_stale, status_to_label_delta, Clock, IdempotencyKey, IdempotencyRecord, IssueSnapshot,
    IssueState, LabelStatus, TaskOpState, TaskStatus,
};
use ralph_host::{IssueHost, LabelWritePipeline};
use ralph_storage::Store;
use tracing::{debug, warn};

use crate::error::Result;

/// Minimum time between two writes carrying the same target label
/// (default 10 min).
pub const DEFAULT_WRITE_COOLDOWN_MS: u64 = 10 * 60 * 1000;
/// Minimum time before an opposite-direction transition is allowed to
/// overwrite a recent one (default 3 min).
pub const DEFAULT_TRANSITION_THROTTLE_MS: u64 = 3 * 60 * 1000;

#[derive(serde::Serialize, serde::Deserialize)]
struct TransitionGuardPayload {
    target: String,
    at_ms: u64,
}

/// Outcome of [`plan_local_status_drift_repair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalDriftDecision {
    Skip(&'static str),
    AlreadyConverged,
    Repair(TaskStatus),
}

fn label_status_to_task_status(status: LabelStatus) -> TaskStatus {
    match status {
        LabelStatus::Done => TaskStatus::Done,
        LabelStatus::InBot | LabelStatus::InProgress => TaskStatus::InProgress,
        LabelStatus::Stopped => TaskStatus::Stopped,
        LabelStatus::Escalated => TaskStatus::Escalated,
        LabelStatus::Paused => TaskStatus::Paused,
        LabelStatus::Queued => TaskStatus::Queued,
        LabelStatus::Throttled => TaskStatus::Throttled,
        LabelStatus::Blocked => TaskStatus::Blocked,
    }
}

/// Decide whether a single issue's local op-state should be repaired
/// to match its host label. The host→local direction is authoritative
/// here; never the reverse.
pub fn plan_local_status_drift_repair(
    issue: &IssueSnapshot,
    op_state: Option<&TaskOpState>,
    now_ms: u64,
    ttl_ms: u64,
) -> LocalDriftDecision {
    if issue.state == IssueState::Closed {
        return LocalDriftDecision::Skip("closed");
    }
    if issue.labels.count_status_labels() != 1 {
        return LocalDriftDecision::Skip("ambiguous-status-label");
    }
    let Some(label) = issue.labels.status_labels().into_iter().next() else {
        return LocalDriftDecision::Skip("ambiguous-status-label");
    };
    let Some(host_status) = ralph_core::labels::parse_status_label(label) else {
        return LocalDriftDecision::Skip("unsupported-host-status");
    };

    let Some(op_state) = op_state else {
        return LocalDriftDecision::Skip("no-local-op-state");
    };

    let local_label_status = op_state.status.to_label_status();
    if local_label_status == host_status {
        return LocalDriftDecision::AlreadyConverged;
    }

    let active_ownership = !is_heartbeat_stale(op_state.heartbeat_at_ms, now_ms, ttl_ms);
    if active_ownership {
        return LocalDriftDecision::Skip("unsafe-active-ownership");
    }

    LocalDriftDecision::Repair(label_status_to_task_status(host_status))
}

/// The two label<->op-state convergence loops, sharing one write
/// pipeline and one durable idempotency guard against thrash.
pub struct Reconciler<C: Clock> {
    store: Store,
    pipeline: Arc<LabelWritePipeline<C>>,
    clock: C,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(store: Store, pipeline: Arc<LabelWritePipeline<C>>, clock: C) -> Self {
        Self { store, pipeline, clock }
    }

    /// One tick of the label reconciler: push local op-state onto the
    /// host label set for every issue not paused/stopped, honoring the
    /// per-issue cooldown and transition-throttle guards.
    pub async fn reconcile_labels_tick(
        &self,
        cooldown_ms: u64,
        transition_throttle_ms: u64,
    ) -> Result<usize> {
        let now_ms = self.clock.epoch_ms();
        let mut written = 0usize;

        for issue in self.store.list_issue_snapshots()? {
            if issue.labels.contains(&LabelStatus::Paused.label())
                || issue.labels.contains(&LabelStatus::Stopped.label())
            {
                continue;
            }
            let Some(op_state) = self.store.get_task_op_state(&issue.repo, issue.number)? else {
                continue;
            };

            let effective_status = if op_state.released_at_ms.is_some() {
                TaskStatus::Queued
            } else {
                op_state.status
            };
            if matches!(effective_status, TaskStatus::Throttled | TaskStatus::Done) {
                continue;
            }

            let delta = status_to_label_delta(effective_status, &issue.labels);
            if delta.is_empty() {
                continue;
            }

            let target = effective_status.to_label_status().label();
            let guard_key = IdempotencyKey::LabelTransition {
                repo: issue.repo.clone(),
                issue_number: issue.number,
            }
            .to_string();

            if let Some(record) = self.store.get_idempotency_payload(&guard_key)? {
                if let Some(payload) = record
                    .payload_json
                    .as_deref()
                    .and_then(|json| serde_json::from_str::<TransitionGuardPayload>(json).ok())
                {
                    let age_ms = now_ms.saturating_sub(payload.at_ms);
                    let same_target = payload.target == target;
                    let throttled = (same_target && age_ms < cooldown_ms)
                        || (!same_target && age_ms < transition_throttle_ms);
                    if throttled {
                        debug!(repo = issue.repo, number = issue.number, target, "label write throttled");
                        continue;
                    }
                }
            }

            self.pipeline.apply(&issue.repo, issue.number, &delta, false).await?;

            let mut labels = issue.labels.clone();
            for label in &delta.remove {
                labels.remove(label);
            }
            for label in &delta.add {
                labels.insert(label.clone());
            }
            self.store.record_issue_labels_snapshot(&issue.repo, issue.number, &labels)?;

            let payload = serde_json::to_string(&TransitionGuardPayload { target: target.clone(), at_ms: now_ms })?;
            self.store.upsert_idempotency_key(&IdempotencyRecord::started(guard_key, "reconciler", now_ms).complete(payload))?;
            written += 1;
        }

        Ok(written)
    }

    /// One tick of the local drift repairer: for each tracked issue,
    /// bring the local op-state into line with the host label when
    /// it's safe to do so.
    pub fn repair_local_drift_tick(&self, ttl_ms: u64) -> Result<(usize, usize)> {
        let now_ms = self.clock.epoch_ms();
        let mut repaired = 0usize;
        let mut race_skipped = 0usize;

        for issue in self.store.list_issue_snapshots()? {
            let op_state = self.store.get_task_op_state(&issue.repo, issue.number)?;
            let decision = plan_local_status_drift_repair(&issue, op_state.as_ref(), now_ms, ttl_ms);
            let LocalDriftDecision::Repair(target_status) = decision else {
                continue;
            };
            let op_state = op_state.expect("repair decision implies an op-state was present");

            match &op_state.daemon_id {
                Some(daemon_id) => {
                    let outcome = self.store.update_task_status_if_ownership_unchanged(
                        &issue.repo,
                        issue.number,
                        daemon_id,
                        op_state.heartbeat_at_ms,
                        target_status,
                        op_state.released_at_ms,
                    )?;
                    if outcome.updated {
                        repaired += 1;
                    } else {
                        race_skipped += 1;
                        warn!(repo = issue.repo, number = issue.number, "local drift repair race-skipped");
                    }
                }
                None => {
                    let repaired_state = TaskOpState { status: target_status, ..op_state };
                    self.store.record_task_snapshot(&repaired_state)?;
                    repaired += 1;
                }
            }
        }

        Ok((repaired, race_skipped))
    }
}
