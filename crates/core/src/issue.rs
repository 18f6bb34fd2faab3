// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cached mirror of a remote issue, as last synced from the host.

use crate::labels::Labels;
use crate::status::IssueState;

/// Cached mirror of one remote issue.
///
/// Invariant: `labels` contains every label attached on the host as of
/// the last sync tick for this issue; replaced atomically per issue.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IssueSnapshot {
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub state: IssueState,
    pub url: String,
    pub host_node_id: String,
    pub host_updated_at_ms: u64,
    pub labels: Labels,
}

impl IssueSnapshot {
    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: IssueState) -> IssueSnapshot {
        IssueSnapshot {
            repo: "acme/widgets".to_string(),
            number: 7,
            title: "Fix the thing".to_string(),
            state,
            url: "https://example.invalid/acme/widgets/issues/7".to_string(),
            host_node_id: "node-1".to_string(),
            host_updated_at_ms: 1_700_000_000_000,
            labels: Labels::from_iter(["ralph:status:queued"]),
        }
    }

    #[test]
    fn is_open_reflects_state() {
        assert!(snapshot(IssueState::Open).is_open());
        assert!(!snapshot(IssueState::Closed).is_open());
    }
}
