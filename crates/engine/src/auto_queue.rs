// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The auto-queue runner (C8): for repos opted into `autoQueue`,
//! derives a `queued`/`blocked` label plan from a relationship
//! provider's verdict and applies it through the C6 write pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use ralph_core::{status_to_label_delta, Clock, IssueSnapshot, IssueState, LabelDelta, Labels, TaskStatus};
use ralph_host::LabelWritePipeline;
use ralph_storage::Store;
use tracing::info;

use crate::error::Result;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_MAX_PER_TICK: usize = 50;

/// How confident the relationship provider is in a blocked verdict.
/// `Unknown` must never be treated as either `blocked` or `unblocked`
/// -- the runner skips the issue entirely rather than guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Certain,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedDecision {
    pub blocked: bool,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
}

/// Resolves an issue's blocked-by/closes relationships. The real
/// implementation would walk the host's cross-reference graph; that
/// graph walk is out of scope here, and only the interface, plus a
/// never-guess stub, ship in this crate.
#[async_trait]
pub trait RelationshipProvider: Send + Sync {
    async fn check_blocked(&self, repo: &str, issue_number: u64) -> Result<BlockedDecision>;
}

/// Always reports `Unknown`, so the runner always skips rather than
/// guesses -- the correct default in the absence of a real graph walk.
pub struct NullRelationshipProvider;

#[async_trait]
impl RelationshipProvider for NullRelationshipProvider {
    async fn check_blocked(&self, _repo: &str, _issue_number: u64) -> Result<BlockedDecision> {
        Ok(BlockedDecision { blocked: false, confidence: Confidence::Unknown, reasons: Vec::new() })
    }
}

const SKIP_STATUSES: [&str; 6] = [
    "ralph:status:done",
    "ralph:status:in-bot",
    "ralph:status:in-progress",
    "ralph:status:paused",
    "ralph:status:escalated",
    "ralph:status:stopped",
];

/// Pure decision function: given a relationship verdict and the
/// issue's current labels, compute the label delta (if any) that
/// brings the issue onto `queued` or `blocked`.
pub fn compute_auto_queue_label_plan(decision: &BlockedDecision, current_labels: &Labels) -> Option<LabelDelta> {
    if decision.confidence == Confidence::Unknown {
        return None;
    }
    let target = if decision.blocked { TaskStatus::Blocked } else { TaskStatus::Queued };
    let delta = status_to_label_delta(target, current_labels);
    if delta.is_empty() {
        None
    } else {
        Some(delta)
    }
}

fn eligible(issue: &IssueSnapshot, labeled_only: bool) -> bool {
    if issue.state == IssueState::Closed {
        return false;
    }
    if SKIP_STATUSES.iter().any(|s| issue.labels.contains(s)) {
        return false;
    }
    if labeled_only && !issue.labels.iter().any(|l| l.starts_with("ralph:")) {
        return false;
    }
    true
}

pub struct AutoQueueRunner<C: Clock> {
    store: Store,
    pipeline: Arc<LabelWritePipeline<C>>,
    relationships: Arc<dyn RelationshipProvider>,
    dry_run: bool,
}

impl<C: Clock> AutoQueueRunner<C> {
    pub fn new(
        store: Store,
        pipeline: Arc<LabelWritePipeline<C>>,
        relationships: Arc<dyn RelationshipProvider>,
        dry_run: bool,
    ) -> Self {
        Self { store, pipeline, relationships, dry_run }
    }

    /// One debounced tick: evaluate up to `max_per_tick` eligible open
    /// issues for `repo` and apply any resulting plan. Returns the
    /// number of issues whose label set actually changed.
    pub async fn tick(&self, repo: &str, max_per_tick: usize, labeled_only: bool) -> Result<usize> {
        let mut changed = 0usize;
        let mut considered = 0usize;

        for issue in self.store.list_issue_snapshots()? {
            if issue.repo != repo {
                continue;
            }
            if considered >= max_per_tick {
                break;
            }
            if !eligible(&issue, labeled_only) {
                continue;
            }
            considered += 1;

            let decision = self.relationships.check_blocked(&issue.repo, issue.number).await?;
            let Some(delta) = compute_auto_queue_label_plan(&decision, &issue.labels) else {
                continue;
            };

            if self.dry_run {
                info!(repo = issue.repo, number = issue.number, ?delta, "auto-queue plan (dry run)");
                continue;
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
            changed += 1;
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_core::test_support::issue_snapshot;
    use ralph_core::FakeClock;
    use ralph_host::MockHost;

    struct FixedProvider(BlockedDecision);

    #[async_trait]
    impl RelationshipProvider for FixedProvider {
        async fn check_blocked(&self, _repo: &str, _issue_number: u64) -> Result<BlockedDecision> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn unknown_confidence_never_guesses() {
        let decision = BlockedDecision { blocked: true, confidence: Confidence::Unknown, reasons: vec![] };
        let labels = Labels::from_iter(["some-label"]);
        assert!(compute_auto_queue_label_plan(&decision, &labels).is_none());
    }

    #[test]
    fn certain_unblocked_plans_toward_queued() {
        let decision = BlockedDecision { blocked: false, confidence: Confidence::Certain, reasons: vec![] };
        let labels = Labels::new();
        let delta = compute_auto_queue_label_plan(&decision, &labels).unwrap();
        assert!(delta.add.contains(&"ralph:status:queued".to_string()));
    }

    #[test]
    fn certain_blocked_plans_toward_blocked() {
        let decision = BlockedDecision {
            blocked: true,
            confidence: Confidence::Certain,
            reasons: vec!["blocked-by #2".to_string()],
        };
        let labels = Labels::from_iter(["ralph:status:queued"]);
        let delta = compute_auto_queue_label_plan(&decision, &labels).unwrap();
        assert!(delta.add.contains(&"ralph:status:blocked".to_string()));
        assert!(delta.remove.contains(&"ralph:status:queued".to_string()));
    }

    #[tokio::test]
    async fn tick_skips_paused_issues() {
        let clock = FakeClock::new();
        let store = Store::open_in_memory().unwrap();
        let host = Arc::new(MockHost::with_clock(clock.clone()));
        let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock));
        let snap = issue_snapshot("acme/widgets", 1, &["ralph:status:paused"]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();
        store.record_issue_labels_snapshot(&snap.repo, snap.number, &snap.labels).unwrap();

        let provider = Arc::new(FixedProvider(BlockedDecision {
            blocked: false,
            confidence: Confidence::Certain,
            reasons: vec![],
        }));
        let runner = AutoQueueRunner::new(store, pipeline, provider, false);
        let changed = runner.tick("acme/widgets", DEFAULT_MAX_PER_TICK, false).await.unwrap();
        assert_eq!(changed, 0);
    }

    #[tokio::test]
    async fn tick_queues_an_eligible_issue() {
        let clock = FakeClock::new();
        let store = Store::open_in_memory().unwrap();
        let host = Arc::new(MockHost::with_clock(clock.clone()));
        let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock));
        let snap = issue_snapshot("acme/widgets", 1, &[]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();
        store.record_issue_labels_snapshot(&snap.repo, snap.number, &snap.labels).unwrap();

        let provider = Arc::new(FixedProvider(BlockedDecision {
            blocked: false,
            confidence: Confidence::Certain,
            reasons: vec![],
        }));
        let runner = AutoQueueRunner::new(store, pipeline, provider, false);
        let changed = runner.tick("acme/widgets", DEFAULT_MAX_PER_TICK, false).await.unwrap();
        assert_eq!(changed, 1);

        let live = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(live.labels.contains("ralph:status:queued"));
    }
}
