// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Argument parsing for the five operator commands.

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "ralph", about = "Operator CLI for the ralph daemon")]
pub struct Cli {
    /// Emit machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Read-only snapshot of daemon state.
    Status,
    /// Stop dequeuing; let in-flight sessions finish within the timeout.
    Drain {
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        pause_at_checkpoint: bool,
    },
    /// Clear a prior pause/drain and resume normal scheduling.
    Resume,
    /// Re-exec the daemon binary in place.
    Restart {
        #[arg(long)]
        grace: Option<u64>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        start_cmd: Option<String>,
    },
    /// Re-exec a newly-installed daemon binary in place.
    Upgrade {
        #[arg(long)]
        grace: Option<u64>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        start_cmd: Option<String>,
        #[arg(long)]
        upgrade_cmd: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_status_with_json_flag() {
        let cli = Cli::parse_from(["ralph", "--json", "status"]);
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.output_format(), OutputFormat::Json);
    }

    #[test]
    fn parses_drain_flags() {
        let cli = Cli::parse_from(["ralph", "drain", "--timeout", "30", "--pause-at-checkpoint"]);
        match cli.command {
            Command::Drain { timeout, pause_at_checkpoint } => {
                assert_eq!(timeout, Some(30));
                assert!(pause_at_checkpoint);
            }
            _ => panic!("expected Drain"),
        }
    }

    #[test]
    fn defaults_to_text_output() {
        let cli = Cli::parse_from(["ralph", "resume"]);
        assert_eq!(cli.output_format(), OutputFormat::Text);
    }
}
