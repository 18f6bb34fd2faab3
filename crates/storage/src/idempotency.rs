// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency key persistence: the primitives the command processor
//! and label-write pipeline use to ensure an effect applies exactly once.

use ralph_core::{IdempotencyPhase, IdempotencyRecord};

use crate::error::Result;
use crate::store::Store;

fn phase_str(phase: IdempotencyPhase) -> &'static str {
    match phase {
        IdempotencyPhase::Started => "started",
        IdempotencyPhase::Completed => "completed",
    }
}

fn parse_phase(s: &str) -> IdempotencyPhase {
    match s {
        "completed" => IdempotencyPhase::Completed,
        _ => IdempotencyPhase::Started,
    }
}

impl Store {
    pub fn has_idempotency_key(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM idempotency_keys WHERE key = ?1",
                [key],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn get_idempotency_payload(&self, key: &str) -> Result<Option<IdempotencyRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT scope, created_at_ms, phase, payload_json FROM idempotency_keys WHERE key = ?1",
                [key],
                |row| {
                    Ok(IdempotencyRecord {
                        key: key.to_string(),
                        scope: row.get(0)?,
                        created_at_ms: row.get::<_, i64>(1)? as u64,
                        phase: parse_phase(&row.get::<_, String>(2)?),
                        payload_json: row.get(3)?,
                    })
                },
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(crate::error::StorageError::from(other)),
            })
        })
    }

    /// Insert the key if absent; returns whether it was newly inserted.
    /// The caller uses a `false` return to detect a concurrent/duplicate
    /// event and skip re-applying the effect.
    pub fn record_idempotency_key(&self, record: &IdempotencyRecord) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO idempotency_keys (key, scope, created_at_ms, phase, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    record.key,
                    record.scope,
                    record.created_at_ms as i64,
                    phase_str(record.phase),
                    record.payload_json,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn upsert_idempotency_key(&self, record: &IdempotencyRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO idempotency_keys (key, scope, created_at_ms, phase, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                    phase = excluded.phase,
                    payload_json = excluded.payload_json",
                rusqlite::params![
                    record.key,
                    record.scope,
                    record.created_at_ms as i64,
                    phase_str(record.phase),
                    record.payload_json,
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_idempotency_key(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM idempotency_keys WHERE key = ?1", [key])?;
            Ok(())
        })
    }
}
