// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon record + singleton lock: `daemon-registry.json` beside
//! an exclusively-locked lock file. A stale lock (dead pid) may be
//! reclaimed by a new instance.

use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use ralph_core::DaemonId;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRecord {
    pub daemon_id: String,
    pub pid: u32,
    pub started_at_ms: u64,
    pub acquired_at_ms: u64,
    pub token: String,
}

/// Holds the exclusive lock for the process lifetime; dropping this
/// releases it.
pub struct DaemonLock {
    _file: File,
    pub record: DaemonRecord,
}

/// Acquire the singleton daemon lock, writing a fresh registry record.
///
/// A lock held by a process that's no longer alive is reclaimable:
/// `try_lock_exclusive` itself is what detects that (the OS releases
/// flock state when the holding process exits), so a stale lock simply
/// succeeds here without special-casing the dead pid.
pub fn acquire(registry_path: &Path, daemon_id: &DaemonId, now_ms: u64) -> Result<DaemonLock> {
    if let Some(parent) = registry_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let lock_path = lock_path_for(registry_path);
    let file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&lock_path)?;
    file.try_lock_exclusive().map_err(|_| DaemonError::LockFailed(lock_path.clone()))?;

    let record = DaemonRecord {
        daemon_id: daemon_id.to_string(),
        pid: std::process::id(),
        started_at_ms: now_ms,
        acquired_at_ms: now_ms,
        token: ralph_core::RunId::new().to_string(),
    };
    write_atomic(registry_path, &record)?;

    Ok(DaemonLock { _file: file, record })
}

pub fn release(registry_path: &Path) {
    let lock_path = lock_path_for(registry_path);
    let _ = std::fs::remove_file(&lock_path);
    let _ = std::fs::remove_file(registry_path);
}

fn lock_path_for(registry_path: &Path) -> PathBuf {
    registry_path.with_extension("lock")
}

fn write_atomic(path: &Path, record: &DaemonRecord) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, serde_json::to_vec_pretty(record)?)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
