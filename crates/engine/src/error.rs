// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the I/O-performing half of the queue, reconciler,
//! command processor, auto-queue runner, and scheduler (C5-C9).

use ralph_host::HostError;
use ralph_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("host error: {0}")]
    Host(#[from] HostError),

    #[error("task not claimable: {0}")]
    NotClaimable(String),

    #[error("ownership conflict: {0}")]
    OwnershipConflict(String),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
