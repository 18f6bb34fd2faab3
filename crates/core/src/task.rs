// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The locally authoritative task op-state record, one row per
//! `(repo, issueNumber)`.

use std::fmt;

use crate::ids::{DaemonId, RunId};
use crate::status::TaskStatus;

/// Canonical task path: `<host>:<repo>#<issueNumber>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TaskPath {
    pub host: String,
    pub repo: String,
    pub issue_number: u64,
}

impl TaskPath {
    pub fn new(host: impl Into<String>, repo: impl Into<String>, issue_number: u64) -> Self {
        Self { host: host.into(), repo: repo.into(), issue_number }
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.host, self.repo, self.issue_number)
    }
}

/// Locally authoritative operational record for one task.
///
/// Invariant: `daemon_id`/`heartbeat_at_ms` are present iff `status`
/// implies active work (`starting`/`in-progress`/`waiting-on-pr`) and
/// `released_at_ms` is absent.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskOpState {
    pub task_path: TaskPath,
    pub status: TaskStatus,
    pub session_id: Option<RunId>,
    pub worktree_path: Option<String>,
    pub worker_id: Option<String>,
    pub repo_slot: Option<u32>,
    pub daemon_id: Option<DaemonId>,
    pub heartbeat_at_ms: Option<u64>,
    pub released_at_ms: Option<u64>,
    pub released_reason: Option<String>,
}

impl TaskOpState {
    pub fn new(task_path: TaskPath, status: TaskStatus) -> Self {
        Self {
            task_path,
            status,
            session_id: None,
            worktree_path: None,
            worker_id: None,
            repo_slot: None,
            daemon_id: None,
            heartbeat_at_ms: None,
            released_at_ms: None,
            released_reason: None,
        }
    }

    /// Whether this record is internally consistent with the
    /// active-ownership invariant.
    pub fn is_well_formed(&self) -> bool {
        let implies_active = matches!(
            self.status,
            TaskStatus::Starting | TaskStatus::InProgress | TaskStatus::WaitingOnPr
        );
        let owned = self.daemon_id.is_some() && self.heartbeat_at_ms.is_some();
        let released = self.released_at_ms.is_some();

        if released {
            return !owned;
        }
        implies_active == owned
    }

    pub fn released(mut self, at_ms: u64, reason: impl Into<String>) -> Self {
        self.daemon_id = None;
        self.heartbeat_at_ms = None;
        self.released_at_ms = Some(at_ms);
        self.released_reason = Some(reason.into());
        self
    }

    pub fn claimed_by(mut self, daemon_id: DaemonId, now_ms: u64) -> Self {
        self.status = TaskStatus::InProgress;
        self.daemon_id = Some(daemon_id);
        self.heartbeat_at_ms = Some(now_ms);
        self.released_at_ms = None;
        self.released_reason = None;
        self
    }
}
