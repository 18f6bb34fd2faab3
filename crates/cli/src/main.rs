// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ralph`: thin IPC client over the daemon's control socket.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod cli;
mod client;
mod commands;
mod exit_error;
mod output;

use clap::Parser;
use exit_error::ExitError;
use ralph_daemon::Config;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = cli::Cli::parse();
    let format = cli.output_format();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return std::process::ExitCode::from(2);
        }
    };

    let result = match cli.command {
        cli::Command::Status => commands::status::run(&config, format).await,
        cli::Command::Drain { timeout, pause_at_checkpoint } => {
            commands::drain::run(&config, format, timeout, pause_at_checkpoint).await
        }
        cli::Command::Resume => commands::resume::run(&config, format).await,
        cli::Command::Restart { grace, force, start_cmd } => {
            commands::restart::run(&config, format, grace, force, start_cmd).await
        }
        cli::Command::Upgrade { grace, force, start_cmd, upgrade_cmd } => {
            commands::upgrade::run(&config, format, grace, force, start_cmd, upgrade_cmd).await
        }
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(ExitError { code, message }) => {
            eprintln!("{message}");
            std::process::ExitCode::from(code as u8)
        }
    }
}
