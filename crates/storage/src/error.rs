// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the durable state store (C1).

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("schema version {found} is newer than the max this binary can read ({max_readable})")]
    SchemaForwardIncompatible { found: u32, max_readable: u32 },

    #[error("could not acquire the state database lock within the probe timeout")]
    LockTimeout,

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Whether `err` is sqlite reporting that a competing process holds the
/// file lock past the busy-timeout probe window.
pub(crate) fn is_lock_timeout(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(inner.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}
