// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-storage: the durable state store (C1). A single `rusqlite`
//! connection per process, the only writer for its database file.

mod error;
mod gates;
mod idempotency;
mod issues;
mod pr_snapshots;
mod runs;
mod schema;
mod store;
mod task_state;
mod throttle_store;

pub use error::{Result, StorageError};
pub use gates::{GateRun, GateRunStatus};
pub use pr_snapshots::{PrSnapshot, PrStatus};
pub use runs::AgentRun;
pub use schema::{SchemaVerdict, MAX_READABLE, MAX_WRITABLE, MIN_READABLE};
pub use store::Store;
pub use task_state::CasOutcome;
