// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's public error boundary.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("could not determine the user's home directory")]
    NoHomeDir,

    #[error("failed to acquire the daemon lock at {0}: another daemon instance is likely running")]
    LockFailed(PathBuf),

    #[error("failed to bind control socket at {path}: {source}")]
    BindFailed { path: PathBuf, #[source] source: std::io::Error },

    #[error("storage error: {0}")]
    Storage(#[from] ralph_storage::StorageError),

    #[error("engine error: {0}")]
    Engine(#[from] ralph_engine::EngineError),

    #[error("wire protocol error: {0}")]
    Wire(#[from] ralph_wire::ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
