// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HostError`: the classification every `IssueHost` call returns into.

#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("transient host error: {0}")]
    Transient(String),

    #[error("rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("fatal host error: {0}")]
    Fatal(String),
}
