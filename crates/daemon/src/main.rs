// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ralphd`: the long-lived daemon binary.

use ralph_daemon::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return std::process::ExitCode::FAILURE;
        }
    };

    let startup = match ralph_daemon::lifecycle::startup(config).await {
        Ok(startup) => startup,
        Err(err) => {
            tracing::error!(error = %err, "daemon startup failed");
            return std::process::ExitCode::FAILURE;
        }
    };

    let ralph_daemon::lifecycle::StartupResult { context, listener, lock } = startup;

    let loop_handles = ralph_daemon::loops::spawn_all(std::sync::Arc::clone(&context));
    let ipc_context = std::sync::Arc::clone(&context);
    let ipc_handle = tokio::spawn(ralph_daemon::ipc::serve(listener, ipc_context));

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install SIGINT handler, shutting down anyway");
    }
    tracing::info!("received interrupt, shutting down");

    ralph_daemon::lifecycle::shutdown(&context, lock);

    ipc_handle.abort();
    for handle in loop_handles {
        handle.abort();
    }

    std::process::ExitCode::SUCCESS
}
