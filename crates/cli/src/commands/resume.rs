// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ralph resume` — clear a prior pause/drain.

use ralph_daemon::Config;
use ralph_wire::{Query, Response};

use crate::client;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

pub async fn run(config: &Config, format: OutputFormat) -> Result<(), ExitError> {
    match client::call(&config.socket_path, Query::Resume).await? {
        Response::Resumed => {
            let obj = serde_json::json!({ "mode": "running" });
            format_or_json(format, &obj, || println!("resumed")).map_err(|err| ExitError::operational(err.to_string()))
        }
        Response::Error { error } => Err(ExitError::operational(error.message)),
        _ => Err(ExitError::operational("unexpected response to resume query")),
    }
}
