// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven configuration, read once at startup.

use std::path::PathBuf;

use crate::error::{DaemonError, Result};

const DEFAULT_WRITE_COALESCE_WINDOW_MS: u64 = 250;
const DEFAULT_DB_PROBE_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// `$HOME/.ralph`, overridable only indirectly via `RALPH_STATE_DB_PATH`
    /// for the database file itself.
    pub home_dir: PathBuf,
    pub state_db_path: PathBuf,
    pub control_dir: PathBuf,
    pub registry_path: PathBuf,
    pub control_path: PathBuf,
    pub socket_path: PathBuf,
    pub disable_queue_sweeps: bool,
    pub write_coalesce_window_ms: u64,
    pub opencode_config_dir: Option<PathBuf>,
    pub db_probe_busy_timeout_ms: u64,
}

impl Config {
    /// Resolve configuration from the environment.
    pub fn load() -> Result<Self> {
        let home_dir = home_dir()?;
        let ralph_dir = home_dir.join(".ralph");
        let control_dir = ralph_dir.join("control");

        let state_db_path = std::env::var("RALPH_STATE_DB_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| ralph_dir.join("state.sqlite"));

        let disable_queue_sweeps = env_flag("RALPH_GITHUB_QUEUE_DISABLE_SWEEPS");

        let write_coalesce_window_ms = env_u64("RALPH_GITHUB_WRITE_COALESCE_WINDOW_MS")
            .unwrap_or(DEFAULT_WRITE_COALESCE_WINDOW_MS);

        let opencode_config_dir =
            std::env::var("RALPH_OPENCODE_CONFIG_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from);

        let db_probe_busy_timeout_ms =
            env_u64("RALPH_STATE_DB_PROBE_BUSY_TIMEOUT_MS").unwrap_or(DEFAULT_DB_PROBE_BUSY_TIMEOUT_MS);

        Ok(Self {
            home_dir,
            state_db_path,
            registry_path: control_dir.join("daemon-registry.json"),
            control_path: control_dir.join("control.json"),
            socket_path: control_dir.join("daemon.sock"),
            control_dir,
            disable_queue_sweeps,
            write_coalesce_window_ms,
            opencode_config_dir,
            db_probe_busy_timeout_ms,
        })
    }
}

fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("XDG_STATE_HOME").map(PathBuf::from))
        .or_else(dirs::home_dir)
        .ok_or(DaemonError::NoHomeDir)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
