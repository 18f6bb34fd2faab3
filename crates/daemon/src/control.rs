// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control file: JSON, atomically written, polled by the
//! daemon and translated into a `DaemonMode` for C4.

use std::path::Path;

use ralph_core::DaemonMode;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlMode {
    Running,
    Draining,
    Paused,
}

impl From<ControlMode> for DaemonMode {
    fn from(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Running => DaemonMode::Running,
            ControlMode::Draining => DaemonMode::Draining,
            ControlMode::Paused => DaemonMode::Paused,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFile {
    pub mode: ControlMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_timeout_ms: Option<u64>,
    #[serde(default)]
    pub pause_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_at_checkpoint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opencode_profile: Option<String>,
}

impl Default for ControlFile {
    fn default() -> Self {
        Self {
            mode: ControlMode::Running,
            drain_timeout_ms: None,
            pause_requested: false,
            pause_at_checkpoint: None,
            opencode_profile: None,
        }
    }
}

impl ControlFile {
    pub fn read(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomic temp-file + rename write.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
