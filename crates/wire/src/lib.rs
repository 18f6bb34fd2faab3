// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon<->CLI communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod query;
mod response;
mod status;
#[allow(clippy::module_inception)]
mod wire;

pub use query::{Query, Request};
pub use response::{Response, WireError};
pub use status::{DrainSummary, DurableStateStatus, StatusSnapshot, TaskSummary, ThrottleSummary};
pub use wire::{
    decode, encode, read_message, read_request, read_response, write_message, write_request, write_response,
    ProtocolError, MAX_FRAME_BYTES,
};

#[cfg(test)]
#[path = "wire_tests.rs"]
mod wire_tests;
