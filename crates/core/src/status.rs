// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task status: the op-state enum, label derivation, and the label
//! delta required to move an issue's label set onto a target status.

use std::fmt;

use crate::labels::{parse_status_label, LabelDelta, LabelStatus, Labels};

/// Op-state status. Superset of [`LabelStatus`]: `Starting` and
/// `WaitingOnPr` are local-only phases that collapse to `InProgress`
/// when written back as a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Queued,
    Starting,
    InProgress,
    WaitingOnPr,
    Throttled,
    Blocked,
    Escalated,
    Paused,
    Stopped,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Starting => "starting",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::WaitingOnPr => "waiting-on-pr",
            TaskStatus::Throttled => "throttled",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Escalated => "escalated",
            TaskStatus::Paused => "paused",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Done => "done",
        }
    }

    /// The [`LabelStatus`] this status is written back as.
    pub fn to_label_status(self) -> LabelStatus {
        match self {
            TaskStatus::Queued => LabelStatus::Queued,
            TaskStatus::Starting | TaskStatus::InProgress | TaskStatus::WaitingOnPr => {
                LabelStatus::InProgress
            }
            TaskStatus::Throttled => LabelStatus::Throttled,
            TaskStatus::Blocked => LabelStatus::Blocked,
            TaskStatus::Escalated => LabelStatus::Escalated,
            TaskStatus::Paused => LabelStatus::Paused,
            TaskStatus::Stopped => LabelStatus::Stopped,
            TaskStatus::Done => LabelStatus::Done,
        }
    }

    fn from_label_status(label: LabelStatus) -> Self {
        match label {
            LabelStatus::Done => TaskStatus::Done,
            LabelStatus::InBot => TaskStatus::InProgress,
            LabelStatus::Stopped => TaskStatus::Stopped,
            LabelStatus::Escalated => TaskStatus::Escalated,
            LabelStatus::Paused => TaskStatus::Paused,
            LabelStatus::InProgress => TaskStatus::InProgress,
            LabelStatus::Queued => TaskStatus::Queued,
            LabelStatus::Throttled => TaskStatus::Throttled,
            LabelStatus::Blocked => TaskStatus::Blocked,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the remote issue is open or closed. A closed issue
/// short-circuits status derivation to `done` regardless of labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// Outcome of deriving status from an issue's current label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFromLabels {
    /// Exactly one recognized status label (or zero, treated as none).
    Resolved(Option<LabelStatus>),
    /// More than one `ralph:status:*` label present: a drift signal.
    Ambiguous(Vec<LabelStatus>),
}

/// Derive status from an issue's labels, per the documented precedence
/// (first match wins) with closed-issue short-circuit to `done`.
pub fn status_from_labels(labels: &Labels, issue_state: IssueState) -> StatusFromLabels {
    if issue_state == IssueState::Closed {
        return StatusFromLabels::Resolved(Some(LabelStatus::Done));
    }

    let present: Vec<LabelStatus> =
        labels.status_labels().into_iter().filter_map(parse_status_label).collect();

    if present.len() > 1 {
        return StatusFromLabels::Ambiguous(present);
    }

    for candidate in LabelStatus::PRECEDENCE {
        if present.contains(&candidate) {
            return StatusFromLabels::Resolved(Some(candidate));
        }
    }
    StatusFromLabels::Resolved(None)
}

/// Compute the label delta required to move `currentLabels` onto `status`,
/// stripping every other known status label.
pub fn status_to_label_delta(status: TaskStatus, current: &Labels) -> LabelDelta {
    let target = status.to_label_status();
    let target_label = target.label();

    let mut remove = Vec::new();
    for candidate in LabelStatus::PRECEDENCE {
        if candidate == target {
            continue;
        }
        let label = candidate.label();
        if current.contains(&label) {
            remove.push(label);
        }
    }

    let add = if current.contains(&target_label) { Vec::new() } else { vec![target_label] };
    LabelDelta { add, remove }
}

/// Result of [`plan_claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPlan {
    pub claimable: bool,
    pub steps: LabelDelta,
    pub reason: Option<String>,
}

/// Plan the label mutation needed to claim a queued task.
pub fn plan_claim(labels: &Labels) -> ClaimPlan {
    const BLOCKING: [LabelStatus; 7] = [
        LabelStatus::Done,
        LabelStatus::InBot,
        LabelStatus::Stopped,
        LabelStatus::Escalated,
        LabelStatus::Paused,
        LabelStatus::Blocked,
        LabelStatus::InProgress,
    ];

    let blocked_by =
        BLOCKING.into_iter().find(|s| labels.contains(&s.label()));
    if let Some(blocker) = blocked_by {
        return ClaimPlan {
            claimable: false,
            steps: LabelDelta::default(),
            reason: Some(format!("blocked by existing {blocker} label")),
        };
    }
    if labels.contains(&LabelStatus::Throttled.label()) {
        return ClaimPlan {
            claimable: false,
            steps: LabelDelta::default(),
            reason: Some("blocked by existing throttled label".to_string()),
        };
    }
    if !labels.contains(&LabelStatus::Queued.label()) {
        return ClaimPlan {
            claimable: false,
            steps: LabelDelta::default(),
            reason: Some("no queued label present".to_string()),
        };
    }

    ClaimPlan {
        claimable: true,
        steps: LabelDelta {
            add: vec![LabelStatus::InProgress.label()],
            remove: vec![LabelStatus::Queued.label()],
        },
        reason: None,
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
