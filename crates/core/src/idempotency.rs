// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency keys: structured strings that identify one logical
//! event exactly once.

use std::fmt;

/// Phase of an idempotency record's effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyPhase {
    Started,
    Completed,
}

/// `(key, scope, createdAt, payloadJson)`. A `Completed` payload means
/// the effect has been durably applied and must never be re-applied.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub scope: String,
    pub created_at_ms: u64,
    pub phase: IdempotencyPhase,
    pub payload_json: Option<String>,
}

impl IdempotencyRecord {
    pub fn started(key: impl Into<String>, scope: impl Into<String>, now_ms: u64) -> Self {
        Self {
            key: key.into(),
            scope: scope.into(),
            created_at_ms: now_ms,
            phase: IdempotencyPhase::Started,
            payload_json: None,
        }
    }

    pub fn complete(mut self, payload_json: impl Into<String>) -> Self {
        self.phase = IdempotencyPhase::Completed;
        self.payload_json = Some(payload_json.into());
        self
    }

    pub fn is_completed(&self) -> bool {
        self.phase == IdempotencyPhase::Completed
    }
}

/// A namespaced idempotency key for one of the known key families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyKey {
    /// `ralph:cmd:v1:<repo>#<n>:<cmdLabel>:<eventId>`
    CmdLabel { repo: String, issue_number: u64, cmd: String, event_id: String },
    /// `ralph:satisfy:v1:<repo>#<n>`
    Satisfy { repo: String, issue_number: u64 },
    /// `ralph:label-transition:v1:<repo>#<n>`
    LabelTransition { repo: String, issue_number: u64 },
    /// `watchdog-signature:<repo>#<n>:<stage>`
    WatchdogSignature { repo: String, issue_number: u64, stage: String },
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdempotencyKey::CmdLabel { repo, issue_number, cmd, event_id } => {
                write!(f, "ralph:cmd:v1:{repo}#{issue_number}:{cmd}:{event_id}")
            }
            IdempotencyKey::Satisfy { repo, issue_number } => {
                write!(f, "ralph:satisfy:v1:{repo}#{issue_number}")
            }
            IdempotencyKey::LabelTransition { repo, issue_number } => {
                write!(f, "ralph:label-transition:v1:{repo}#{issue_number}")
            }
            IdempotencyKey::WatchdogSignature { repo, issue_number, stage } => {
                write!(f, "watchdog-signature:{repo}#{issue_number}:{stage}")
            }
        }
    }
}
