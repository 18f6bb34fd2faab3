// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task priority and the `ralph:priority:*` / legacy `p<n>` inference rule.

use std::fmt;

use crate::labels::Labels;

/// Task priority, ordered most-urgent first so a `Vec<Priority>` sorts
/// into dispatch order with a plain ascending sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
    P4,
}

impl Priority {
    pub const DEFAULT: Priority = Priority::P2;

    fn from_digit(n: u32) -> Option<Self> {
        match n {
            0 => Some(Priority::P0),
            1 => Some(Priority::P1),
            2 => Some(Priority::P2),
            3 => Some(Priority::P3),
            4 => Some(Priority::P4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P0 => "p0-critical",
            Priority::P1 => "p1-high",
            Priority::P2 => "p2-medium",
            Priority::P3 => "p3-low",
            Priority::P4 => "p4-backlog",
        }
    }

    /// The canonical `ralph:priority:p<n>` label for this priority.
    pub fn canonical_label(self) -> String {
        match self {
            Priority::P0 => "ralph:priority:p0".to_string(),
            Priority::P1 => "ralph:priority:p1".to_string(),
            Priority::P2 => "ralph:priority:p2".to_string(),
            Priority::P3 => "ralph:priority:p3".to_string(),
            Priority::P4 => "ralph:priority:p4".to_string(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infer a task's priority from its label set.
///
/// A canonical `ralph:priority:p<n>` label always wins over any legacy
/// `p<n>...` label, regardless of which is more urgent. Absent a canonical
/// label, the most urgent (lowest `n`) legacy label present wins. Absent
/// either, the task defaults to [`Priority::DEFAULT`].
pub fn infer_priority_from_labels(labels: &Labels) -> Priority {
    for label in labels.iter() {
        if let Some(rest) = label.strip_prefix("ralph:priority:p") {
            if let Some(n) = rest.chars().next().and_then(|c| c.to_digit(10)) {
                if let Some(p) = Priority::from_digit(n) {
                    return p;
                }
            }
        }
    }

    let mut best: Option<Priority> = None;
    for label in labels.iter() {
        if let Some(rest) = label.strip_prefix('p') {
            if let Some(n) = rest.chars().next().and_then(|c| c.to_digit(10)) {
                if let Some(p) = Priority::from_digit(n) {
                    if best.map_or(true, |b| p < b) {
                        best = Some(p);
                    }
                }
            }
        }
    }

    best.unwrap_or(Priority::DEFAULT)
}
