// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ralph-core: pure decision logic shared across the orchestrator --
//! IDs, clocks, the `ralph:*` label taxonomy, status derivation,
//! ownership, throttle, and gate evaluation. Nothing in this crate
//! performs I/O.

pub mod clock;
pub mod gate;
pub mod id;
pub mod idempotency;
pub mod ids;
pub mod issue;
pub mod labels;
pub mod ownership;
pub mod priority;
pub mod queue;
pub mod status;
pub mod task;
pub mod throttle;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use gate::{evaluate_gate, DaemonMode, GateDecision};
pub use id::IdBuf;
pub use idempotency::{IdempotencyKey, IdempotencyPhase, IdempotencyRecord};
pub use ids::{DaemonId, RunId};
pub use issue::IssueSnapshot;
pub use labels::{CmdLabel, LabelDelta, LabelStatus, Labels};
pub use ownership::{can_act_on_task, compute_heartbeat_interval_ms, is_heartbeat_stale};
pub use priority::{infer_priority_from_labels, Priority};
pub use queue::{recover_stale, RecoverDecision, StaleReason};
pub use status::{
    plan_claim, status_from_labels, status_to_label_delta, ClaimPlan, IssueState, StatusFromLabels,
    TaskStatus,
};
pub use task::{TaskOpState, TaskPath};
pub use throttle::{
    get_throttle_decision, select_auto_profile, ProfileCandidate, ThrottleDecision,
    ThrottleSnapshot, ThrottleState, ThrottleWindow,
};
