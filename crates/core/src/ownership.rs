// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task ownership: heartbeat freshness and the compare-and-swap guard
//! that lets a second daemon steal an orphaned task.

use crate::ids::DaemonId;

/// True when a heartbeat timestamp (`None` counts as missing) is stale
/// relative to `now` and `ttl_ms`.
pub fn is_heartbeat_stale(heartbeat_at_ms: Option<u64>, now_ms: u64, ttl_ms: u64) -> bool {
    match heartbeat_at_ms {
        None => true,
        Some(hb) => now_ms.saturating_sub(hb) > ttl_ms,
    }
}

/// Whether `daemon_id` may act on a task currently owned by
/// `owner_daemon_id` with the given heartbeat.
pub fn can_act_on_task(
    owner_daemon_id: &DaemonId,
    heartbeat_at_ms: Option<u64>,
    daemon_id: &DaemonId,
    now_ms: u64,
    ttl_ms: u64,
) -> bool {
    owner_daemon_id == daemon_id || is_heartbeat_stale(heartbeat_at_ms, now_ms, ttl_ms)
}

/// Heartbeat cadence for a given ownership TTL:
/// `clamp(ttl/3, 2s, min(10s, ttl<=60s ? 10s : 60s))`.
pub fn compute_heartbeat_interval_ms(ttl_ms: u64) -> u64 {
    const MIN_MS: u64 = 2_000;
    const HARD_MAX_MS: u64 = 60_000;

    let soft_cap = if ttl_ms <= 60_000 { 10_000 } else { HARD_MAX_MS };
    let cap = soft_cap.min(HARD_MAX_MS);
    (ttl_ms / 3).clamp(MIN_MS, cap)
}
