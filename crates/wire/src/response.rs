// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response envelope: the corresponding summary payload for each
//! `Query`, or a structured error.

use serde::{Deserialize, Serialize};

use crate::status::{DrainSummary, StatusSnapshot};

/// A structured, serializable error -- mirrors the per-crate error-kind
/// taxonomy so the CLI can render a reason without the wire format
/// carrying a `Box<dyn Error>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireError {
    pub kind: String,
    pub message: String,
}

impl WireError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Status { snapshot: StatusSnapshot },
    Drained { summary: DrainSummary },
    Resumed,
    Restarted,
    Upgraded,
    Error { error: WireError },
}
