// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The command-label processor (C7): consumes `ralph:cmd:*` labels
//! exactly once per timeline event, guarded by a durable idempotency
//! key so a crash mid-tick never double-applies an operator command.

use std::sync::Arc;

use ralph_core::labels::parse_cmd_label;
use ralph_core::{
    status_to_label_delta, Clock, CmdLabel, IdempotencyKey, IdempotencyRecord, IssueSnapshot, IssueState,
    LabelDelta, TaskStatus,
};
use ralph_host::{IssueHost, LabelWritePipeline};
use ralph_storage::Store;
use tracing::warn;

use crate::error::Result;

pub const DEFAULT_TICK_MS: u64 = 30_000;
pub const DEFAULT_MAX_PER_TICK: usize = 25;

/// Causality lookups only consider this many of the most recent
/// timeline events. Revisit with a paginated scan bounded by the
/// op-state's startedAt if issues with heavy label churn start losing
/// causality (see Open Question (a)).
const CMD_EVENT_SCAN_LIMIT: usize = 100;

/// The decision recorded against a processed command, for the
/// tracking comment and the idempotency payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
struct CommandResult {
    decision: String,
    reason: String,
}

/// Extract the numeric suffix of a timeline event id (`evt-42` -> 42)
/// for the causality guard's big-integer comparison. Event ids with no
/// numeric suffix sort after every numeric one, so an unparsable id on
/// either side never accidentally wins a causality race.
fn event_ordinal(event_id: &str) -> u128 {
    event_id
        .rsplit(['-', ':']).next()
        .and_then(|digits| digits.parse::<u128>().ok())
        .unwrap_or(u128::MAX)
}

pub struct CommandProcessor<C: Clock> {
    store: Store,
    host: Arc<dyn IssueHost>,
    pipeline: Arc<LabelWritePipeline<C>>,
    clock: C,
}

impl<C: Clock> CommandProcessor<C> {
    pub fn new(store: Store, host: Arc<dyn IssueHost>, pipeline: Arc<LabelWritePipeline<C>>, clock: C) -> Self {
        Self { store, host, pipeline, clock }
    }

    /// Scan up to `max_per_tick` cmd-labeled issues, processing every
    /// recognized `ralph:cmd:*` label on each. Returns the number of
    /// commands processed this tick.
    pub async fn tick(&self, max_per_tick: usize) -> Result<usize> {
        let mut processed = 0usize;
        for issue in self.store.list_issue_snapshots()? {
            if processed >= max_per_tick {
                break;
            }
            let cmd_labels: Vec<String> = issue.labels.cmd_labels().into_iter().map(String::from).collect();
            for cmd_label in cmd_labels {
                if processed >= max_per_tick {
                    break;
                }
                self.process_one(&issue, &cmd_label).await?;
                processed += 1;
            }
        }
        Ok(processed)
    }

    async fn process_one(&self, issue: &IssueSnapshot, cmd_label: &str) -> Result<()> {
        let Some(cmd) = parse_cmd_label(cmd_label) else { return Ok(()) };
        let now_ms = self.clock.epoch_ms();

        let all_events = self.host.list_timeline_events(&issue.repo, issue.number).await?;
        let scan_start = all_events.len().saturating_sub(CMD_EVENT_SCAN_LIMIT);
        let events = &all_events[scan_start..];
        let event_id = events
            .iter()
            .rev()
            .find(|e| e.kind == "labeled" && e.label.as_deref() == Some(cmd_label))
            .map(|e| e.event_id.clone());
        let event_id_str = event_id.clone().unwrap_or_else(|| "unknown".to_string());

        let key = IdempotencyKey::CmdLabel {
            repo: issue.repo.clone(),
            issue_number: issue.number,
            cmd: cmd.as_str().to_string(),
            event_id: event_id_str,
        }
        .to_string();

        let cmd_removal = LabelDelta { add: Vec::new(), remove: vec![cmd_label.to_string()] };

        if let Some(record) = self.store.get_idempotency_payload(&key)? {
            if record.is_completed() {
                let _ = self.pipeline.apply(&issue.repo, issue.number, &cmd_removal, true).await;
                return Ok(());
            }
        } else {
            self.store.record_idempotency_key(&IdempotencyRecord::started(key.clone(), "cmd", now_ms))?;
        }

        if issue.state == IssueState::Closed {
            let _ = self
                .host
                .add_comment(&issue.repo, issue.number, &format!("`{cmd_label}` ignored: issue is closed."))
                .await;
            self.pipeline.apply(&issue.repo, issue.number, &cmd_removal, true).await?;
            self.complete(&key, "refused", "issue is closed", now_ms)?;
            return Ok(());
        }

        let result = match cmd {
            CmdLabel::Satisfy => self.handle_satisfy(issue, &cmd_removal, now_ms).await,
            CmdLabel::Queue => self.handle_queue(issue, events, event_id.as_deref(), &cmd_removal, now_ms).await,
            CmdLabel::Pause => self.handle_release(issue, TaskStatus::Paused, &cmd_removal, "Paused by operator command").await,
            CmdLabel::Stop => self.handle_release(issue, TaskStatus::Stopped, &cmd_removal, "Stopped by operator command").await,
        };

        match result {
            Ok(outcome) => {
                self.complete(&key, &outcome.decision, &outcome.reason, now_ms)?;
                let body = format!(
                    "<!-- ralph:cmd-ack:{key} -->\n`{cmd_label}`: {} ({})",
                    outcome.decision, outcome.reason
                );
                let _ = self.host.add_comment(&issue.repo, issue.number, &body).await;
            }
            Err(err) => {
                warn!(repo = issue.repo, number = issue.number, cmd = cmd.as_str(), error = %err, "command processing failed, will retry next tick");
            }
        }
        Ok(())
    }

    fn complete(&self, key: &str, decision: &str, reason: &str, now_ms: u64) -> Result<()> {
        let payload = serde_json::to_string(&CommandResult { decision: decision.to_string(), reason: reason.to_string() })?;
        self.store.upsert_idempotency_key(&IdempotencyRecord::started(key, "cmd", now_ms).complete(payload))?;
        Ok(())
    }

    async fn handle_satisfy(&self, issue: &IssueSnapshot, cmd_removal: &LabelDelta, now_ms: u64) -> Result<CommandResult> {
        let satisfy_key = IdempotencyKey::Satisfy { repo: issue.repo.clone(), issue_number: issue.number }.to_string();
        if !self.store.has_idempotency_key(&satisfy_key)? {
            self.store.record_idempotency_key(&IdempotencyRecord::started(satisfy_key, "satisfy", now_ms))?;
        }
        self.pipeline.apply(&issue.repo, issue.number, cmd_removal, true).await?;
        Ok(CommandResult { decision: "satisfied".to_string(), reason: "Recorded dependency satisfaction".to_string() })
    }

    async fn handle_queue(
        &self,
        issue: &IssueSnapshot,
        events: &[ralph_host::TimelineEvent],
        queue_event_id: Option<&str>,
        cmd_removal: &LabelDelta,
        now_ms: u64,
    ) -> Result<CommandResult> {
        let live = self.host.get_issue(&issue.repo, issue.number).await?;

        if live.labels.contains("ralph:status:escalated") {
            let escalated_event_id = events
                .iter()
                .rev()
                .find(|e| e.kind == "labeled" && e.label.as_deref() == Some("ralph:status:escalated"))
                .map(|e| e.event_id.as_str());
            if let (Some(q), Some(esc)) = (queue_event_id, escalated_event_id) {
                if event_ordinal(q) <= event_ordinal(esc) {
                    self.pipeline.apply(&issue.repo, issue.number, cmd_removal, true).await?;
                    return Ok(CommandResult {
                        decision: "refused".to_string(),
                        reason: "queue command predates the active escalation".to_string(),
                    });
                }
            }
        }

        let mut delta = status_to_label_delta(TaskStatus::Queued, &live.labels);
        if !delta.add.contains(&"ralph:status:queued".to_string()) {
            delta.add.push("ralph:status:queued".to_string());
        }
        delta.remove.extend(cmd_removal.remove.iter().cloned());

        self.store.release_task_slot(&issue.repo, issue.number, TaskStatus::Queued, now_ms, "cmd:ralph:cmd:queue")?;
        self.pipeline.apply(&issue.repo, issue.number, &delta, true).await?;
        self.refresh_label_cache(issue, &delta)?;
        Ok(CommandResult { decision: "queued".to_string(), reason: "Re-queued by operator command".to_string() })
    }

    async fn handle_release(
        &self,
        issue: &IssueSnapshot,
        status: TaskStatus,
        cmd_removal: &LabelDelta,
        reason: &'static str,
    ) -> Result<CommandResult> {
        let now_ms = self.clock.epoch_ms();
        let mut delta = status_to_label_delta(status, &issue.labels);
        delta.remove.extend(cmd_removal.remove.iter().cloned());

        self.store.release_task_slot(&issue.repo, issue.number, status, now_ms, &format!("cmd:ralph:cmd:{status}"))?;
        self.pipeline.apply(&issue.repo, issue.number, &delta, true).await?;
        self.refresh_label_cache(issue, &delta)?;
        Ok(CommandResult { decision: status.to_string(), reason: reason.to_string() })
    }

    fn refresh_label_cache(&self, issue: &IssueSnapshot, delta: &LabelDelta) -> Result<()> {
        let mut labels = issue.labels.clone();
        for label in &delta.remove {
            labels.remove(label);
        }
        for label in &delta.add {
            labels.insert(label.clone());
        }
        self.store.record_issue_labels_snapshot(&issue.repo, issue.number, &labels)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_core::test_support::issue_snapshot;
    use ralph_core::FakeClock;
    use ralph_host::MockHost;

    fn processor() -> (CommandProcessor<FakeClock>, Arc<MockHost<FakeClock>>, Store) {
        let clock = FakeClock::new();
        let store = Store::open_in_memory().unwrap();
        let host = Arc::new(MockHost::with_clock(clock.clone()));
        let pipeline = Arc::new(LabelWritePipeline::new(host.clone(), clock.clone()));
        (CommandProcessor::new(store.clone(), host.clone(), pipeline, clock), host, store)
    }

    #[tokio::test]
    async fn queue_command_requeues_and_strips_the_cmd_label() {
        let (processor, host, store) = processor();
        let snap = issue_snapshot("acme/widgets", 1, &["ralph:status:paused", "ralph:cmd:queue"]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();
        store.record_issue_labels_snapshot(&snap.repo, snap.number, &snap.labels).unwrap();

        let processed = processor.tick(DEFAULT_MAX_PER_TICK).await.unwrap();
        assert_eq!(processed, 1);

        let live = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(live.labels.contains("ralph:status:queued"));
        assert!(!live.labels.contains("ralph:status:paused"));
        assert!(!live.labels.contains("ralph:cmd:queue"));
    }

    #[tokio::test]
    async fn satisfy_command_records_dependency_satisfaction_without_status_change() {
        let (processor, host, store) = processor();
        let snap = issue_snapshot("acme/widgets", 1, &["ralph:status:blocked", "ralph:cmd:satisfy"]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();
        store.record_issue_labels_snapshot(&snap.repo, snap.number, &snap.labels).unwrap();

        processor.tick(DEFAULT_MAX_PER_TICK).await.unwrap();

        let live = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(live.labels.contains("ralph:status:blocked"));
        assert!(!live.labels.contains("ralph:cmd:satisfy"));
        assert!(store.has_idempotency_key(&IdempotencyKey::Satisfy { repo: "acme/widgets".into(), issue_number: 1 }.to_string()).unwrap());
    }

    #[tokio::test]
    async fn closed_issue_refuses_and_comments() {
        let (processor, host, store) = processor();
        let snap = ralph_core::test_support::closed_issue_snapshot("acme/widgets", 1, &["ralph:cmd:pause"]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();
        store.record_issue_labels_snapshot(&snap.repo, snap.number, &snap.labels).unwrap();

        processor.tick(DEFAULT_MAX_PER_TICK).await.unwrap();

        assert_eq!(host.comments("acme/widgets", 1).len(), 1);
        let live = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(!live.labels.contains("ralph:cmd:pause"));
    }

    #[tokio::test]
    async fn stale_queue_command_is_refused_when_it_predates_escalation() {
        let (processor, host, store) = processor();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &[]));
        // The queue cmd label lands before the escalation in event order.
        host.mutate_issue_labels("acme/widgets", 1, &["ralph:cmd:queue".to_string()], &[]).await.unwrap();
        host.mutate_issue_labels("acme/widgets", 1, &["ralph:status:escalated".to_string()], &[]).await.unwrap();
        let live = host.get_issue("acme/widgets", 1).await.unwrap();
        store.record_issue_snapshot(&live).unwrap();
        store.record_issue_labels_snapshot(&live.repo, live.number, &live.labels).unwrap();

        processor.tick(DEFAULT_MAX_PER_TICK).await.unwrap();

        let after = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(!after.labels.contains("ralph:cmd:queue"));
        assert!(after.labels.contains("ralph:status:escalated"));
        assert!(!after.labels.contains("ralph:status:queued"));
    }

    #[tokio::test]
    async fn completed_command_only_reruns_label_removal() {
        let (processor, host, store) = processor();
        let snap = issue_snapshot("acme/widgets", 1, &["ralph:status:queued", "ralph:cmd:pause"]);
        host.seed_issue(snap.clone());
        store.record_issue_snapshot(&snap).unwrap();
        store.record_issue_labels_snapshot(&snap.repo, snap.number, &snap.labels).unwrap();

        // Simulate a prior tick whose removal step never landed on the
        // host (e.g. a crash between marking completed and the write).
        let key = IdempotencyKey::CmdLabel {
            repo: "acme/widgets".to_string(),
            issue_number: 1,
            cmd: "pause".to_string(),
            event_id: "unknown".to_string(),
        }
        .to_string();
        let payload = serde_json::to_string(&CommandResult {
            decision: "paused".to_string(),
            reason: "Paused by operator command".to_string(),
        })
        .unwrap();
        store
            .upsert_idempotency_key(&IdempotencyRecord::started(key, "cmd", 0).complete(payload))
            .unwrap();

        processor.tick(DEFAULT_MAX_PER_TICK).await.unwrap();

        let after = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(!after.labels.contains("ralph:cmd:pause"));
        assert!(after.labels.contains("ralph:status:queued"));
    }
}
