// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ralph upgrade` — re-exec a newly-installed daemon binary in place.

use ralph_daemon::Config;
use ralph_wire::{Query, Response};

use crate::client;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &Config,
    format: OutputFormat,
    grace_secs: Option<u64>,
    force: bool,
    start_cmd: Option<String>,
    upgrade_cmd: Option<String>,
) -> Result<(), ExitError> {
    let query = Query::Upgrade { grace_secs, force, start_cmd, upgrade_cmd };
    match client::call(&config.socket_path, query).await? {
        Response::Upgraded => {
            let obj = serde_json::json!({ "upgraded": true });
            format_or_json(format, &obj, || println!("upgrade acknowledged"))
                .map_err(|err| ExitError::operational(err.to_string()))
        }
        Response::Error { error } => Err(ExitError::operational(error.message)),
        _ => Err(ExitError::operational("unexpected response to upgrade query")),
    }
}
