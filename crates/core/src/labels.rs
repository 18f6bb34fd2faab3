// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ralph:*` label taxonomy: parsing, formatting, and the label-set
//! newtype shared by the queue backend, the reconciler, and the command
//! processor.

use std::collections::BTreeSet;
use std::fmt;

pub const STATUS_PREFIX: &str = "ralph:status:";
pub const PRIORITY_PREFIX: &str = "ralph:priority:";
pub const CMD_PREFIX: &str = "ralph:cmd:";

/// An issue's label set, kept sorted so label-mutation signatures
/// (used by the coalescer) are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Labels(BTreeSet<String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_iter(iter: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        self.0.insert(label.into())
    }

    pub fn remove(&mut self, label: &str) -> bool {
        self.0.remove(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All `ralph:status:*` labels currently present, in sorted order.
    pub fn status_labels(&self) -> Vec<&str> {
        self.0.iter().filter(|l| l.starts_with(STATUS_PREFIX)).map(String::as_str).collect()
    }

    pub fn count_status_labels(&self) -> usize {
        self.status_labels().len()
    }

    /// All `ralph:cmd:*` labels currently present.
    pub fn cmd_labels(&self) -> Vec<&str> {
        self.0.iter().filter(|l| l.starts_with(CMD_PREFIX)).map(String::as_str).collect()
    }
}

impl FromIterator<String> for Labels {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.iter().cloned().collect::<Vec<_>>().join(", "))
    }
}

/// One of `ralph:status:*`. Distinct from [`crate::task::TaskStatus`]:
/// the op-state status has additional values (`starting`, `waiting-on-pr`)
/// that never appear as labels and collapse to `InProgress` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelStatus {
    Done,
    InBot,
    Stopped,
    Escalated,
    Paused,
    InProgress,
    Queued,
    Throttled,
    Blocked,
}

impl LabelStatus {
    /// Precedence order used by [`status_from_labels`]: first match wins.
    pub const PRECEDENCE: [LabelStatus; 9] = [
        LabelStatus::Done,
        LabelStatus::InBot,
        LabelStatus::Stopped,
        LabelStatus::Escalated,
        LabelStatus::Paused,
        LabelStatus::InProgress,
        LabelStatus::Queued,
        LabelStatus::Throttled,
        LabelStatus::Blocked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LabelStatus::Done => "done",
            LabelStatus::InBot => "in-bot",
            LabelStatus::Stopped => "stopped",
            LabelStatus::Escalated => "escalated",
            LabelStatus::Paused => "paused",
            LabelStatus::InProgress => "in-progress",
            LabelStatus::Queued => "queued",
            LabelStatus::Throttled => "throttled",
            LabelStatus::Blocked => "blocked",
        }
    }

    pub fn label(self) -> String {
        format!("{STATUS_PREFIX}{}", self.as_str())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::PRECEDENCE.into_iter().find(|v| v.as_str() == s)
    }
}

impl fmt::Display for LabelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a `ralph:status:<x>` label into its [`LabelStatus`], if recognized.
pub fn parse_status_label(label: &str) -> Option<LabelStatus> {
    label.strip_prefix(STATUS_PREFIX).and_then(LabelStatus::parse)
}

/// One of `ralph:cmd:*`, an operator instruction consumed exactly once
/// per label event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CmdLabel {
    Queue,
    Pause,
    Stop,
    Satisfy,
}

impl CmdLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            CmdLabel::Queue => "queue",
            CmdLabel::Pause => "pause",
            CmdLabel::Stop => "stop",
            CmdLabel::Satisfy => "satisfy",
        }
    }

    pub fn label(self) -> String {
        format!("{CMD_PREFIX}{}", self.as_str())
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queue" => Some(CmdLabel::Queue),
            "pause" => Some(CmdLabel::Pause),
            "stop" => Some(CmdLabel::Stop),
            "satisfy" => Some(CmdLabel::Satisfy),
            _ => None,
        }
    }
}

impl fmt::Display for CmdLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a `ralph:cmd:<x>` label into its [`CmdLabel`], if recognized.
pub fn parse_cmd_label(label: &str) -> Option<CmdLabel> {
    label.strip_prefix(CMD_PREFIX).and_then(CmdLabel::parse)
}

/// The add/remove delta computed by a label-derived decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelDelta {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Coalescer signature: `(sorted(add), sorted(remove - add))`.
    pub fn signature(&self) -> (Vec<String>, Vec<String>) {
        let mut add = self.add.clone();
        add.sort();
        add.dedup();
        let mut remove: Vec<String> =
            self.remove.iter().filter(|r| !self.add.contains(r)).cloned().collect();
        remove.sort();
        remove.dedup();
        (add, remove)
    }
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;
