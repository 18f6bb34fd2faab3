// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-key log rate limiting: caps repeated identical
//! warnings -- CAS race-skips, label-write backoff entry -- to once
//! per 60s, owned by the shared `Context` rather than a module-level
//! singleton.

use std::collections::HashMap;

use parking_lot::Mutex;

pub const DEFAULT_WINDOW_MS: u64 = 60_000;

#[derive(Default)]
pub struct LogLimiter {
    last_logged_at_ms: Mutex<HashMap<String, u64>>,
}

impl LogLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time `key` is seen, or once `window_ms`
    /// has elapsed since it last returned true.
    pub fn should_log(&self, key: &str, now_ms: u64, window_ms: u64) -> bool {
        let mut last = self.last_logged_at_ms.lock();
        match last.get(key) {
            Some(&at) if now_ms.saturating_sub(at) < window_ms => false,
            _ => {
                last.insert(key.to_string(), now_ms);
                true
            }
        }
    }
}
