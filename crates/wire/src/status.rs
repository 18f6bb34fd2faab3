// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status snapshot types returned by `Query::Status`.

use serde::{Deserialize, Serialize};

/// Schema-window health, computed by the daemon from its `SchemaVerdict`
/// on open. `status --json` always returns a snapshot, even when the
/// durable store refuses writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurableStateStatus {
    pub ok: bool,
    pub code: String,
    pub can_read_state: bool,
    pub can_write_state: bool,
    pub requires_migration: bool,
}

impl DurableStateStatus {
    pub fn ok() -> Self {
        Self {
            ok: true,
            code: "ok".to_string(),
            can_read_state: true,
            can_write_state: true,
            requires_migration: false,
        }
    }

    pub fn readonly_forward_newer() -> Self {
        Self {
            ok: false,
            code: "readonly_forward_newer".to_string(),
            can_read_state: true,
            can_write_state: false,
            requires_migration: false,
        }
    }

    pub fn forward_incompatible() -> Self {
        Self {
            ok: false,
            code: "forward_incompatible".to_string(),
            can_read_state: false,
            can_write_state: false,
            requires_migration: true,
        }
    }

    /// Another process held the database's exclusive lock past the
    /// probe's busy-timeout window. Transient: no migration is implicated,
    /// the store simply couldn't be examined this time.
    pub fn lock_timeout() -> Self {
        Self {
            ok: false,
            code: "lock_timeout".to_string(),
            can_read_state: false,
            can_write_state: false,
            requires_migration: false,
        }
    }
}


/// One task in the `inProgress`/`queued` snapshot lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskSummary {
    pub repo: String,
    pub issue_number: u64,
    pub status: String,
    pub priority: String,
    #[serde(default)]
    pub daemon_id: Option<String>,
}

/// One profile's throttle window snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThrottleSummary {
    pub profile: String,
    pub state: String,
    #[serde(default)]
    pub resume_at_ts: Option<u64>,
}

/// Full `status --json` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub uptime_secs: u64,
    pub mode: String,
    pub durable_state: DurableStateStatus,
    pub in_progress: Vec<TaskSummary>,
    pub queued: Vec<TaskSummary>,
    pub throttle: Vec<ThrottleSummary>,
}

impl StatusSnapshot {
    /// The degraded snapshot the CLI falls back to when it opens the
    /// durable store directly because no daemon is reachable, or when
    /// the schema window is forward-incompatible.
    pub fn degraded(durable_state: DurableStateStatus) -> Self {
        Self {
            uptime_secs: 0,
            mode: "unknown".to_string(),
            durable_state,
            in_progress: Vec::new(),
            queued: Vec::new(),
            throttle: Vec::new(),
        }
    }
}

/// Summary returned by `Query::Drain`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrainSummary {
    pub mode: String,
    #[serde(default)]
    pub drain_deadline_ms: Option<u64>,
    pub in_flight: usize,
}
