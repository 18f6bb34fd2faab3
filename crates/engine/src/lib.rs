// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-engine: the I/O-performing loops built on `ralph-core`'s pure
//! decisions -- the label-derived queue (C5), the drift reconcilers
//! (C6), the command-label processor (C7), the auto-queue runner (C8),
//! and the scheduler and worker pool (C9).

pub mod auto_queue;
pub mod commands;
pub mod error;
pub mod queue;
pub mod reconciler;
pub mod scheduler;

pub use auto_queue::{
    compute_auto_queue_label_plan, AutoQueueRunner, BlockedDecision, Confidence, NullRelationshipProvider,
    RelationshipProvider,
};
pub use commands::CommandProcessor;
pub use error::{EngineError, Result};
pub use queue::{ClaimOutcome, QueueBackend};
pub use reconciler::{plan_local_status_drift_repair, LocalDriftDecision, Reconciler};
pub use scheduler::{AgentAdapter, AgentOutcome, NullAgentAdapter, PrInfo, Scheduler, SessionHandle};
