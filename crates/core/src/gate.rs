// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon gate (C4): a pure function combining operator mode,
//! throttle state, and shutdown flag into dequeue/resume/model-send
//! permissions.

use crate::throttle::ThrottleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonMode {
    Running,
    Draining,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub allow_dequeue: bool,
    pub allow_resume: bool,
    pub allow_model_send: bool,
    pub reason: &'static str,
}

impl GateDecision {
    fn all(allow: bool, reason: &'static str) -> Self {
        Self { allow_dequeue: allow, allow_resume: allow, allow_model_send: allow, reason }
    }
}

/// Evaluate the gate. Rules apply in order: shutting down beats paused
/// beats hard throttle beats draining/soft beats running.
pub fn evaluate_gate(
    mode: DaemonMode,
    throttle: ThrottleState,
    is_shutting_down: bool,
) -> GateDecision {
    if is_shutting_down {
        return GateDecision::all(false, "paused");
    }
    if mode == DaemonMode::Paused {
        return GateDecision::all(false, "paused");
    }
    if throttle == ThrottleState::Hard {
        return GateDecision::all(false, "throttled-hard");
    }
    if mode == DaemonMode::Draining {
        return GateDecision {
            allow_dequeue: false,
            allow_resume: true,
            allow_model_send: true,
            reason: "draining",
        };
    }
    if throttle == ThrottleState::Soft {
        return GateDecision {
            allow_dequeue: false,
            allow_resume: true,
            allow_model_send: true,
            reason: "throttled-soft",
        };
    }
    GateDecision::all(true, "running")
}
