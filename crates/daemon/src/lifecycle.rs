// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: acquire the singleton lock, open the durable store,
//! bind the control socket, and hand back a ready-to-run `Context`.

use std::sync::Arc;

use ralph_core::{DaemonId, SystemClock};
use ralph_storage::{SchemaVerdict, Store};
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::Context;
use crate::error::{DaemonError, Result};
use crate::registry::{self, DaemonLock};

pub struct StartupResult {
    pub context: Arc<Context>,
    pub listener: UnixListener,
    pub lock: DaemonLock,
}

pub async fn startup(config: Config) -> Result<StartupResult> {
    std::fs::create_dir_all(&config.control_dir)?;
    if let Some(parent) = config.state_db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let daemon_id = DaemonId::new();
    let clock = SystemClock;
    let now_ms = ralph_core::Clock::epoch_ms(&clock);

    let lock = match registry::acquire(&config.registry_path, &daemon_id, now_ms) {
        Ok(lock) => lock,
        Err(err) => return Err(err),
    };

    let (store, verdict) = match Store::open(&config.state_db_path) {
        Ok(ok) => ok,
        Err(err) => {
            registry::release(&config.registry_path);
            return Err(err.into());
        }
    };

    match verdict {
        SchemaVerdict::ReadableWritable => info!("durable state store opened, schema is current"),
        SchemaVerdict::ReadableReadonlyForwardNewer => {
            warn!("durable state store schema is newer than this binary writes; running read-only")
        }
        SchemaVerdict::UnreadableForwardIncompatible { found } => {
            registry::release(&config.registry_path);
            return Err(DaemonError::Storage(ralph_storage::StorageError::SchemaForwardIncompatible {
                found,
                max_readable: ralph_storage::MAX_READABLE,
            }));
        }
        SchemaVerdict::LockTimeout => {
            registry::release(&config.registry_path);
            return Err(DaemonError::Storage(ralph_storage::StorageError::LockTimeout));
        }
    }

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|source| DaemonError::BindFailed { path: config.socket_path.clone(), source })?;

    let context = Arc::new(Context::new(config, store, daemon_id));

    info!(daemon_id = %context.daemon_id, "daemon started");

    Ok(StartupResult { context, listener, lock })
}

/// Release what startup acquired. The lock file's drop releases the
/// flock; this additionally removes the registry record and socket.
pub fn shutdown(context: &Context, lock: DaemonLock) {
    info!("daemon shutting down");
    context.request_shutdown();
    if context.config.socket_path.exists() {
        let _ = std::fs::remove_file(&context.config.socket_path);
    }
    registry::release(&context.config.registry_path);
    drop(lock);
}
