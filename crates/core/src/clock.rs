// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction (C1 [AMBIENT]): every staleness check, cooldown,
//! and drain deadline in this workspace is computed against
//! milliseconds-since-epoch, never against a monotonic `Instant` --
//! heartbeats and throttle windows are persisted and compared across
//! process restarts, so the clock this trait exposes only needs to
//! answer "what time is it, as a number I can store."

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time, generic over every engine/daemon
/// component that needs to stamp or compare heartbeats, cooldowns, and
/// throttle windows.
pub trait Clock: Clone + Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;
}

/// Wall-clock time, used by the daemon binary.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Controllable clock for driving reconciler/queue/throttle ticks in
/// tests without sleeping. Starts at a fixed, nonzero epoch so a test
/// asserting on staleness doesn't accidentally start at the epoch.
#[derive(Clone)]
pub struct FakeClock {
    epoch_ms: Arc<Mutex<u64>>,
}

const FAKE_CLOCK_START_MS: u64 = 1_000_000;

impl FakeClock {
    pub fn new() -> Self {
        Self { epoch_ms: Arc::new(Mutex::new(FAKE_CLOCK_START_MS)) }
    }

    /// Move the clock forward, as a tick or a heartbeat TTL elapsing would.
    pub fn advance(&self, duration: Duration) {
        *self.epoch_ms.lock() += duration.as_millis() as u64;
    }

    /// Jump directly to an epoch-millisecond value, for pinning a test to
    /// a specific `heartbeat_at_ms`/`resume_at_ts` boundary.
    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
