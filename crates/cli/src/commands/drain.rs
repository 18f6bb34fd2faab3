// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ralph drain` — stop dequeuing, let in-flight sessions finish.

use ralph_daemon::Config;
use ralph_wire::{Query, Response};

use crate::client;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

pub async fn run(
    config: &Config,
    format: OutputFormat,
    timeout_secs: Option<u64>,
    pause_at_checkpoint: bool,
) -> Result<(), ExitError> {
    let query = Query::Drain { timeout_secs, pause_at_checkpoint };
    match client::call(&config.socket_path, query).await? {
        Response::Drained { summary } => {
            format_or_json(format, &summary, || {
                println!("mode: {}", summary.mode);
                if let Some(deadline) = summary.drain_deadline_ms {
                    println!("drain deadline: {deadline}ms (epoch)");
                }
                println!("in flight: {}", summary.in_flight);
            })
            .map_err(|err| ExitError::operational(err.to_string()))
        }
        Response::Error { error } => Err(ExitError::operational(error.message)),
        _ => Err(ExitError::operational("unexpected response to drain query")),
    }
}
