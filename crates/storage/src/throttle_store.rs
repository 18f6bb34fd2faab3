// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted `throttle_windows` rows backing the C3 decision functions.
//! Token accounting lives here so a restarted daemon reconstructs the
//! same throttle state; the decision itself is computed in
//! `ralph_core::throttle` over the rows this module returns.

use ralph_core::ThrottleWindow;

use crate::error::Result;
use crate::store::Store;

impl Store {
    pub fn ensure_throttle_window(
        &self,
        profile: &str,
        window: &ThrottleWindow,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO throttle_windows
                    (profile, name, hard_cap_tokens, used_tokens, window_end_ts, next_reset_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(profile, name) DO UPDATE SET
                    hard_cap_tokens = excluded.hard_cap_tokens,
                    window_end_ts = excluded.window_end_ts,
                    next_reset_ts = excluded.next_reset_ts",
                rusqlite::params![
                    profile,
                    window.name,
                    window.hard_cap_tokens as i64,
                    window.used_tokens as i64,
                    window.window_end_ts as i64,
                    window.next_reset_ts as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn reset_throttle_window(&self, profile: &str, name: &str, next_reset_ts: u64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE throttle_windows SET used_tokens = 0, next_reset_ts = ?1
                 WHERE profile = ?2 AND name = ?3",
                rusqlite::params![next_reset_ts as i64, profile, name],
            )?;
            Ok(())
        })
    }

    pub fn load_throttle_windows(&self, profile: &str) -> Result<Vec<ThrottleWindow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, hard_cap_tokens, used_tokens, window_end_ts, next_reset_ts
                 FROM throttle_windows WHERE profile = ?1",
            )?;
            let rows = stmt
                .query_map([profile], |row| {
                    Ok(ThrottleWindow {
                        name: row.get(0)?,
                        hard_cap_tokens: row.get::<_, i64>(1)? as u64,
                        used_tokens: row.get::<_, i64>(2)? as u64,
                        window_end_ts: row.get::<_, i64>(3)? as u64,
                        next_reset_ts: row.get::<_, i64>(4)? as u64,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(name: &str, cap: u64, reset: u64) -> ThrottleWindow {
        ThrottleWindow { name: name.to_string(), hard_cap_tokens: cap, used_tokens: 0, window_end_ts: reset, next_reset_ts: reset }
    }

    #[test]
    fn windows_round_trip_per_profile() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_throttle_window("default", &window("weekly", 1000, 9999)).unwrap();
        store.ensure_throttle_window("default", &window("rolling-5h", 200, 1999)).unwrap();

        let loaded = store.load_throttle_windows("default").unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn reset_clears_usage() {
        let store = Store::open_in_memory().unwrap();
        store.ensure_throttle_window("default", &window("weekly", 1000, 9999)).unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE throttle_windows SET used_tokens = 500 WHERE profile='default' AND name='weekly'",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        store.reset_throttle_window("default", "weekly", 20_000).unwrap();

        let loaded = store.load_throttle_windows("default").unwrap();
        assert_eq!(loaded[0].used_tokens, 0);
        assert_eq!(loaded[0].next_reset_ts, 20_000);
    }
}
