// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ralph status` — read-only snapshot of daemon state.

use ralph_daemon::Config;
use ralph_wire::{Query, Response, StatusSnapshot};

use crate::client;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

pub async fn run(config: &Config, format: OutputFormat) -> Result<(), ExitError> {
    let snapshot = match client::call(&config.socket_path, Query::Status).await {
        Ok(Response::Status { snapshot }) => snapshot,
        Ok(Response::Error { error }) => return Err(ExitError::operational(error.message)),
        Ok(_) => return Err(ExitError::operational("unexpected response to status query")),
        Err(_) => ralph_daemon::ipc::degraded_status_snapshot(&config.state_db_path),
    };

    print_snapshot(&snapshot, format).map_err(|err| ExitError::operational(err.to_string()))
}

fn print_snapshot(snapshot: &StatusSnapshot, format: OutputFormat) -> anyhow::Result<()> {
    format_or_json(format, snapshot, || {
        println!("mode: {}", snapshot.mode);
        println!("uptime: {}s", snapshot.uptime_secs);
        println!(
            "durable state: {} (read={} write={} migration_required={})",
            snapshot.durable_state.code,
            snapshot.durable_state.can_read_state,
            snapshot.durable_state.can_write_state,
            snapshot.durable_state.requires_migration,
        );
        println!("in progress: {}", snapshot.in_progress.len());
        for task in &snapshot.in_progress {
            println!("  {}#{} [{}] priority={}", task.repo, task.issue_number, task.status, task.priority);
        }
        println!("queued: {}", snapshot.queued.len());
        for task in &snapshot.queued {
            println!("  {}#{} [{}] priority={}", task.repo, task.issue_number, task.status, task.priority);
        }
        for window in &snapshot.throttle {
            println!("throttle[{}]: {}", window.profile, window.state);
        }
    })
}
