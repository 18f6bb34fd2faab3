// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-claim recovery: whether an in-progress task's local op-state
//! should be released back to `queued`.

use crate::ownership::is_heartbeat_stale;
use crate::task::TaskOpState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    MissingOpState,
    MissingSessionId,
    MissingHeartbeat,
    InvalidHeartbeat,
    StaleHeartbeat,
}

impl StaleReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StaleReason::MissingOpState => "missing-op-state",
            StaleReason::MissingSessionId => "missing-session-id",
            StaleReason::MissingHeartbeat => "missing-heartbeat",
            StaleReason::InvalidHeartbeat => "invalid-heartbeat",
            StaleReason::StaleHeartbeat => "stale-heartbeat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverDecision {
    pub should_recover: bool,
    pub reason: Option<StaleReason>,
}

/// Decide whether a claimed task should be recovered (released back to
/// `queued`). `grace_ms` defers recovery of a fresh heartbeat with no
/// `sessionId` for up to that long, to ride out the window between
/// claiming a task and recording the agent session.
pub fn recover_stale(
    op_state: Option<&TaskOpState>,
    now_ms: u64,
    ttl_ms: u64,
    grace_ms: Option<u64>,
) -> RecoverDecision {
    let Some(op_state) = op_state else {
        // Without local op-state we cannot tell a foreign-owned task
        // from an orphaned one: never recover blind.
        return RecoverDecision { should_recover: false, reason: Some(StaleReason::MissingOpState) };
    };

    let Some(hb) = op_state.heartbeat_at_ms else {
        return RecoverDecision { should_recover: true, reason: Some(StaleReason::MissingHeartbeat) };
    };

    if hb > now_ms {
        return RecoverDecision { should_recover: true, reason: Some(StaleReason::InvalidHeartbeat) };
    }

    if is_heartbeat_stale(Some(hb), now_ms, ttl_ms) {
        return RecoverDecision { should_recover: true, reason: Some(StaleReason::StaleHeartbeat) };
    }

    if op_state.session_id.is_none() {
        let age_ms = now_ms.saturating_sub(hb);
        let grace = grace_ms.unwrap_or(0);
        if age_ms >= grace {
            return RecoverDecision {
                should_recover: true,
                reason: Some(StaleReason::MissingSessionId),
            };
        }
    }

    RecoverDecision { should_recover: false, reason: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TaskStatus;
    use crate::task::TaskPath;

    fn path() -> TaskPath {
        TaskPath::new("github.com", "acme/widgets", 1)
    }

    #[test]
    fn missing_op_state_never_recovers() {
        let decision = recover_stale(None, 10_000, 60_000, None);
        assert!(!decision.should_recover);
        assert_eq!(decision.reason, Some(StaleReason::MissingOpState));
    }

    #[test]
    fn missing_heartbeat_recovers() {
        let op = TaskOpState::new(path(), TaskStatus::InProgress);
        let decision = recover_stale(Some(&op), 10_000, 60_000, None);
        assert!(decision.should_recover);
        assert_eq!(decision.reason, Some(StaleReason::MissingHeartbeat));
    }

    #[test]
    fn heartbeat_in_the_future_is_invalid() {
        let mut op = TaskOpState::new(path(), TaskStatus::InProgress);
        op.heartbeat_at_ms = Some(20_000);
        let decision = recover_stale(Some(&op), 10_000, 60_000, None);
        assert_eq!(decision.reason, Some(StaleReason::InvalidHeartbeat));
    }

    #[test]
    fn stale_heartbeat_recovers() {
        let mut op = TaskOpState::new(path(), TaskStatus::InProgress);
        op.heartbeat_at_ms = Some(0);
        let decision = recover_stale(Some(&op), 70_000, 60_000, None);
        assert!(decision.should_recover);
        assert_eq!(decision.reason, Some(StaleReason::StaleHeartbeat));
    }

    #[test]
    fn fresh_heartbeat_without_session_recovers_without_grace() {
        let mut op = TaskOpState::new(path(), TaskStatus::InProgress);
        op.heartbeat_at_ms = Some(9_000);
        let decision = recover_stale(Some(&op), 10_000, 60_000, None);
        assert!(decision.should_recover);
        assert_eq!(decision.reason, Some(StaleReason::MissingSessionId));
    }

    #[test]
    fn fresh_heartbeat_without_session_is_deferred_within_grace() {
        let mut op = TaskOpState::new(path(), TaskStatus::InProgress);
        op.heartbeat_at_ms = Some(9_000);
        let decision = recover_stale(Some(&op), 10_000, 60_000, Some(5_000));
        assert!(!decision.should_recover);
    }

    #[test]
    fn fresh_heartbeat_with_session_never_recovers() {
        use crate::ids::RunId;
        let mut op = TaskOpState::new(path(), TaskStatus::InProgress);
        op.heartbeat_at_ms = Some(9_000);
        op.session_id = Some(RunId::new());
        let decision = recover_stale(Some(&op), 10_000, 60_000, None);
        assert!(!decision.should_recover);
        assert_eq!(decision.reason, None);
    }
}
