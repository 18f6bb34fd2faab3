// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::ids::DaemonId;
use crate::issue::IssueSnapshot;
use crate::labels::Labels;
use crate::status::{IssueState, TaskStatus};
use crate::task::{TaskOpState, TaskPath};

pub fn task_path(repo: &str, issue_number: u64) -> TaskPath {
    TaskPath::new("github.com", repo, issue_number)
}

pub fn issue_snapshot(repo: &str, number: u64, labels: &[&str]) -> IssueSnapshot {
    IssueSnapshot {
        repo: repo.to_string(),
        number,
        title: format!("issue {number}"),
        state: IssueState::Open,
        url: format!("https://example.invalid/{repo}/issues/{number}"),
        host_node_id: format!("node-{number}"),
        host_updated_at_ms: 1_000_000,
        labels: Labels::from_iter(labels.iter().copied()),
    }
}

pub fn closed_issue_snapshot(repo: &str, number: u64, labels: &[&str]) -> IssueSnapshot {
    let mut snapshot = issue_snapshot(repo, number, labels);
    snapshot.state = IssueState::Closed;
    snapshot
}

/// An op-state row claimed by `daemon_id` with a fresh heartbeat.
pub fn claimed_task_op_state(
    repo: &str,
    issue_number: u64,
    daemon_id: DaemonId,
    heartbeat_at_ms: u64,
) -> TaskOpState {
    TaskOpState::new(task_path(repo, issue_number), TaskStatus::Queued)
        .claimed_by(daemon_id, heartbeat_at_ms)
}

/// Proptest strategies for core decision-function fuzzing.
pub mod strategies {
    use crate::labels::Labels;
    use crate::priority::Priority;
    use crate::status::TaskStatus;
    use proptest::prelude::*;

    const KNOWN_STATUS_LABELS: [&str; 9] = [
        "ralph:status:done",
        "ralph:status:in-bot",
        "ralph:status:stopped",
        "ralph:status:escalated",
        "ralph:status:paused",
        "ralph:status:in-progress",
        "ralph:status:queued",
        "ralph:status:throttled",
        "ralph:status:blocked",
    ];

    /// An arbitrary (possibly drifted) label set: zero to three status
    /// labels drawn from the known set, to exercise both the happy
    /// path and the multiple-status-label drift case.
    pub fn arb_label_set() -> impl Strategy<Value = Labels> {
        proptest::collection::vec(proptest::sample::select(&KNOWN_STATUS_LABELS[..]), 0..=3)
            .prop_map(|labels| Labels::from_iter(labels.into_iter().map(str::to_string)))
    }

    pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Queued),
            Just(TaskStatus::Starting),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::WaitingOnPr),
            Just(TaskStatus::Throttled),
            Just(TaskStatus::Blocked),
            Just(TaskStatus::Escalated),
            Just(TaskStatus::Paused),
            Just(TaskStatus::Stopped),
            Just(TaskStatus::Done),
        ]
    }

    pub fn arb_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::P0),
            Just(Priority::P1),
            Just(Priority::P2),
            Just(Priority::P3),
            Just(Priority::P4),
        ]
    }
}
