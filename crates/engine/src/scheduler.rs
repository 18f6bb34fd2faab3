// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler and worker pool (C9): turns queued tasks into running
//! agent sessions within the gate's and throttle's limits, then folds
//! each session's outcome back through the queue backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ralph_core::{
    evaluate_gate, get_throttle_decision, infer_priority_from_labels, select_auto_profile, Clock,
    DaemonId, DaemonMode, Priority, ProfileCandidate, RunId, TaskStatus,
};
use ralph_storage::{AgentRun, PrSnapshot, PrStatus, Store};
use tracing::{info, warn};

use crate::error::Result;
use crate::queue::QueueBackend;

/// A running agent session, as handed back by `AgentAdapter::start_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: String,
}

/// Pull-request metadata an agent reports on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrInfo {
    pub pr_number: u64,
    pub url: String,
    pub head_sha: String,
}

/// How a session ended, as classified by the agent adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    Success { pr: Option<PrInfo>, tokens_used: u64 },
    Blocked { reason: String, tokens_used: u64 },
    Throttled { resume_at_ts: u64, tokens_used: u64 },
    Escalated { reason: String, tokens_used: u64 },
}

/// Starts and polls external coding-agent sessions. The real adapter
/// shells out to (or speaks RPC with) the external agent binary; that
/// integration is out of scope here, and only the interface, plus a
/// never-completes stub, ship in this crate.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    async fn start_session(&self, repo: &str, issue_number: u64, profile: &str) -> Result<SessionHandle>;
    async fn poll(&self, handle: &SessionHandle) -> Result<Option<AgentOutcome>>;
}

/// Starts sessions but never reports completion -- the correct default
/// in the absence of a real agent integration.
pub struct NullAgentAdapter;

#[async_trait]
impl AgentAdapter for NullAgentAdapter {
    async fn start_session(&self, _repo: &str, _issue_number: u64, _profile: &str) -> Result<SessionHandle> {
        Ok(SessionHandle { session_id: format!("null-{}", RunId::new()) })
    }

    async fn poll(&self, _handle: &SessionHandle) -> Result<Option<AgentOutcome>> {
        Ok(None)
    }
}

/// A task ready to be assigned, as fetched from the label-derived queue.
struct QueuedTask {
    repo: String,
    issue_number: u64,
    priority: Priority,
    created_at_ms: u64,
}

pub struct Scheduler<C: Clock> {
    store: Store,
    queue: QueueBackend<C>,
    agent: Arc<dyn AgentAdapter>,
    clock: C,
    daemon_id: DaemonId,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(store: Store, queue: QueueBackend<C>, agent: Arc<dyn AgentAdapter>, clock: C, daemon_id: DaemonId) -> Self {
        Self { store, queue, agent, clock, daemon_id }
    }

    /// Resolve the active profile: the configured name verbatim, or
    /// auto-selection among `candidate_profiles` when `configured`
    /// is `"auto"`.
    pub fn resolve_profile(
        &self,
        configured: &str,
        candidate_profiles: &[&str],
        previous: Option<&str>,
        last_switch_age_ms: Option<u64>,
    ) -> Result<Option<String>> {
        if configured != "auto" {
            return Ok(Some(configured.to_string()));
        }
        let mut candidates = Vec::new();
        for name in candidate_profiles {
            let windows = self.store.load_throttle_windows(name)?;
            candidates.push(ProfileCandidate { name: (*name).to_string(), decision: get_throttle_decision(windows) });
        }
        Ok(select_auto_profile(candidates, previous, last_switch_age_ms))
    }

    /// One scheduling pass: evaluate the gate, fetch queued tasks
    /// globally sorted by priority then creation order then path, and
    /// assign them to free per-repo slots. Returns the number of tasks
    /// newly claimed and started this tick.
    pub async fn tick(
        &self,
        mode: DaemonMode,
        profile: &str,
        repo_concurrency: &HashMap<String, usize>,
        is_shutting_down: bool,
    ) -> Result<usize> {
        let windows = self.store.load_throttle_windows(profile)?;
        let throttle = get_throttle_decision(windows).state;
        let gate = evaluate_gate(mode, throttle, is_shutting_down);
        if !gate.allow_dequeue {
            info!(reason = gate.reason, "scheduler tick skipped: dequeue not allowed");
            return Ok(0);
        }

        let mut queued = Vec::new();
        for issue in self.store.list_issue_snapshots()? {
            if !issue.labels.contains("ralph:status:queued") {
                continue;
            }
            let created_at_ms = self
                .store
                .get_task_op_state(&issue.repo, issue.number)?
                .and_then(|op| op.heartbeat_at_ms)
                .unwrap_or(issue.host_updated_at_ms);
            queued.push(QueuedTask {
                repo: issue.repo.clone(),
                issue_number: issue.number,
                priority: infer_priority_from_labels(&issue.labels),
                created_at_ms,
            });
        }
        queued.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.created_at_ms.cmp(&b.created_at_ms))
                .then_with(|| a.repo.cmp(&b.repo))
                .then_with(|| a.issue_number.cmp(&b.issue_number))
        });

        let mut in_flight: HashMap<String, usize> = HashMap::new();
        for run in self.store.list_open_runs()? {
            *in_flight.entry(run.repo).or_insert(0) += 1;
        }

        let mut started = 0usize;
        for task in queued {
            let cap = repo_concurrency.get(&task.repo).copied().unwrap_or(1);
            let used = in_flight.entry(task.repo.clone()).or_insert(0);
            if *used >= cap {
                continue;
            }

            match self.queue.try_claim(&task.repo, task.issue_number, &self.daemon_id).await {
                Ok(_) => {
                    let handle = self.agent.start_session(&task.repo, task.issue_number, profile).await?;
                    let now_ms = self.clock.epoch_ms();
                    let run = AgentRun {
                        run_id: RunId::new(),
                        repo: task.repo.clone(),
                        issue_number: task.issue_number,
                        session_id: Some(handle.session_id.clone()),
                        profile: profile.to_string(),
                        started_at_ms: now_ms,
                        ended_at_ms: None,
                        outcome: None,
                        tokens_used: 0,
                    };
                    self.store.start_agent_run(&run)?;
                    *used += 1;
                    started += 1;
                }
                Err(err) => {
                    warn!(repo = task.repo, issue_number = task.issue_number, error = %err, "claim failed during scheduling");
                }
            }
        }

        Ok(started)
    }

    /// Poll every in-flight run for completion and fold the outcome
    /// back through the queue backend and run ledger.
    pub async fn poll_completions(&self, profile_window_name: &str) -> Result<usize> {
        let mut completed = 0usize;
        for run in self.store.list_open_runs()? {
            let Some(session_id) = run.session_id.clone() else { continue };
            let handle = SessionHandle { session_id };
            let Some(outcome) = self.agent.poll(&handle).await? else { continue };
            let now_ms = self.clock.epoch_ms();

            let (status, tokens_used, reason) = match &outcome {
                AgentOutcome::Success { tokens_used, pr } => {
                    if let Some(pr) = pr {
                        self.store.record_pr_snapshot(&PrSnapshot {
                            repo: run.repo.clone(),
                            issue_number: run.issue_number,
                            pr_number: pr.pr_number,
                            url: pr.url.clone(),
                            head_sha: pr.head_sha.clone(),
                            status: PrStatus::Open,
                            checks_status: None,
                            created_at_ms: now_ms,
                            updated_at_ms: now_ms,
                        })?;
                    }
                    (TaskStatus::Done, *tokens_used, "agent-success")
                }
                AgentOutcome::Blocked { tokens_used, .. } => (TaskStatus::Blocked, *tokens_used, "agent-blocked"),
                AgentOutcome::Throttled { tokens_used, .. } => (TaskStatus::Throttled, *tokens_used, "agent-throttled"),
                AgentOutcome::Escalated { tokens_used, .. } => (TaskStatus::Escalated, *tokens_used, "agent-escalated"),
            };

            self.store.complete_agent_run(&run.run_id, now_ms, status.as_str(), tokens_used, &run.profile, profile_window_name)?;
            self.queue.update_status(&run.repo, run.issue_number, status, Some(reason)).await?;
            completed += 1;
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_core::test_support::issue_snapshot;
    use ralph_core::FakeClock;
    use ralph_host::{IssueHost, LabelWritePipeline, MockHost};
    use std::sync::Mutex;

    struct ScriptedAdapter {
        outcomes: Mutex<HashMap<String, AgentOutcome>>,
    }

    #[async_trait]
    impl AgentAdapter for ScriptedAdapter {
        async fn start_session(&self, repo: &str, issue_number: u64, _profile: &str) -> Result<SessionHandle> {
            Ok(SessionHandle { session_id: format!("{repo}#{issue_number}") })
        }

        async fn poll(&self, handle: &SessionHandle) -> Result<Option<AgentOutcome>> {
            Ok(self.outcomes.lock().unwrap().remove(&handle.session_id))
        }
    }

    fn scheduler(
        agent: Arc<dyn AgentAdapter>,
    ) -> (Scheduler<FakeClock>, Arc<MockHost<FakeClock>>, Store) {
        let clock = FakeClock::new();
        let store = Store::open_in_memory().unwrap();
        let host = Arc::new(MockHost::with_clock(clock.clone()));
        let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock.clone()));
        let queue = QueueBackend::new(store.clone(), host.clone(), pipeline, clock.clone());
        let scheduler = Scheduler::new(store.clone(), queue, agent, clock, DaemonId::new());
        (scheduler, host, store)
    }

    #[tokio::test]
    async fn tick_skips_dequeue_when_the_gate_is_closed() {
        let (scheduler, host, store) = scheduler(Arc::new(NullAgentAdapter));
        let snap = issue_snapshot("acme/widgets", 1, &["ralph:status:queued"]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();

        let started = scheduler
            .tick(DaemonMode::Paused, "default", &HashMap::new(), false)
            .await
            .unwrap();
        assert_eq!(started, 0);
    }

    #[tokio::test]
    async fn tick_claims_the_highest_priority_queued_task_first() {
        let (scheduler, host, store) = scheduler(Arc::new(NullAgentAdapter));
        let low = issue_snapshot("acme/widgets", 1, &["ralph:status:queued", "ralph:priority:p3"]);
        let high = issue_snapshot("acme/widgets", 2, &["ralph:status:queued", "ralph:priority:p0"]);
        host.seed_issue(low.clone());
        host.seed_issue(high.clone());
        store.record_issue_snapshot(&low).unwrap();
        store.record_issue_snapshot(&high).unwrap();

        let mut caps = HashMap::new();
        caps.insert("acme/widgets".to_string(), 1);
        let started = scheduler.tick(DaemonMode::Running, "default", &caps, false).await.unwrap();
        assert_eq!(started, 1);

        let claimed = host.get_issue("acme/widgets", 2).await.unwrap();
        assert!(claimed.labels.contains("ralph:status:in-progress"));
        let untouched = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(untouched.labels.contains("ralph:status:queued"));
    }

    #[tokio::test]
    async fn tick_respects_the_per_repo_concurrency_cap() {
        let (scheduler, host, store) = scheduler(Arc::new(NullAgentAdapter));
        for n in 1..=3 {
            let snap = issue_snapshot("acme/widgets", n, &["ralph:status:queued"]);
            host.seed_issue(snap.clone());
            store.record_issue_snapshot(&snap).unwrap();
        }

        let mut caps = HashMap::new();
        caps.insert("acme/widgets".to_string(), 2);
        let started = scheduler.tick(DaemonMode::Running, "default", &caps, false).await.unwrap();
        assert_eq!(started, 2);
    }

    #[tokio::test]
    async fn poll_completions_marks_a_successful_run_done_and_records_the_pr() {
        let mut outcomes = HashMap::new();
        outcomes.insert(
            "acme/widgets#1".to_string(),
            AgentOutcome::Success {
                pr: Some(PrInfo { pr_number: 9, url: "https://example.invalid/pr/9".to_string(), head_sha: "abc".to_string() }),
                tokens_used: 500,
            },
        );
        let (scheduler, host, store) = scheduler(Arc::new(ScriptedAdapter { outcomes: Mutex::new(outcomes) }));
        let snap = issue_snapshot("acme/widgets", 1, &["ralph:status:queued"]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();
        store.record_issue_labels_snapshot(&snap.repo, snap.number, &snap.labels).unwrap();
        store
            .ensure_throttle_window(
                "default",
                &ralph_core::ThrottleWindow {
                    name: "weekly".to_string(),
                    hard_cap_tokens: 10_000,
                    used_tokens: 0,
                    window_end_ts: 9_999,
                    next_reset_ts: 9_999,
                },
            )
            .unwrap();

        let mut caps = HashMap::new();
        caps.insert("acme/widgets".to_string(), 1);
        scheduler.tick(DaemonMode::Running, "default", &caps, false).await.unwrap();

        let completed = scheduler.poll_completions("weekly").await.unwrap();
        assert_eq!(completed, 1);

        let live = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(live.labels.contains("ralph:status:done"));
        let pr = store.get_pr_snapshot("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(pr.pr_number, 9);

        let windows = store.load_throttle_windows("default").unwrap();
        assert_eq!(windows[0].used_tokens, 500);
    }

    #[test]
    fn resolve_profile_returns_the_configured_name_verbatim() {
        let (scheduler, _host, _store) = scheduler(Arc::new(NullAgentAdapter));
        let resolved = scheduler.resolve_profile("team-default", &[], None, None).unwrap();
        assert_eq!(resolved, Some("team-default".to_string()));
    }
}
