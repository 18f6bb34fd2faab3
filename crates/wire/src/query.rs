// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request envelope and the five operator commands it carries.

use serde::{Deserialize, Serialize};

/// One of the CLI's five operator commands, plus its flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Query {
    /// Read-only snapshot of daemon state.
    Status,
    /// Stop dequeuing; let in-flight sessions finish within the timeout.
    Drain {
        #[serde(default)]
        timeout_secs: Option<u64>,
        #[serde(default)]
        pause_at_checkpoint: bool,
    },
    /// Clear a prior pause/drain and resume normal scheduling.
    Resume,
    /// Re-exec the daemon binary in place.
    Restart {
        #[serde(default)]
        grace_secs: Option<u64>,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        start_cmd: Option<String>,
    },
    /// Re-exec a newly-installed daemon binary in place.
    Upgrade {
        #[serde(default)]
        grace_secs: Option<u64>,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        start_cmd: Option<String>,
        #[serde(default)]
        upgrade_cmd: Option<String>,
    },
}

/// The envelope the CLI sends over the control socket: one query per
/// connection, matching the "connect, send one, read one, exit" shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub query: Query,
}

impl Request {
    pub fn new(query: Query) -> Self {
        Self { query }
    }
}
