// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable state store (C1): a single `rusqlite` connection, the
//! only writer for its database file.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::{is_lock_timeout, Result, StorageError};
use crate::schema::{open_schema, SchemaVerdict};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Everything that can contend with another process holding the file
/// lock: the journal-mode switch, then the schema probe/migration.
fn open_and_migrate(conn: &mut Connection) -> Result<SchemaVerdict> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    open_schema(conn)
}

fn probe_busy_timeout() -> Duration {
    std::env::var("RALPH_STATE_DB_PROBE_BUSY_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
}

/// The durable state store. Cheaply `Clone`: the connection is shared
/// behind a mutex, matching the "single writer per process" contract --
/// callers serialize through this handle rather than opening their own.
#[derive(Clone)]
pub struct Store {
    conn: std::sync::Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if absent) the state database at `path`, run any
    /// pending migrations, and return the store alongside the schema
    /// verdict observed on open.
    pub fn open(path: &Path) -> Result<(Self, SchemaVerdict)> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(probe_busy_timeout())?;

        let verdict = match open_and_migrate(&mut conn) {
            Ok(verdict) => verdict,
            Err(StorageError::Sqlite(err)) if is_lock_timeout(&err) => SchemaVerdict::LockTimeout,
            Err(other) => return Err(other),
        };
        Ok((Self { conn: std::sync::Arc::new(Mutex::new(conn)) }, verdict))
    }

    /// In-memory store for tests: same schema, no file on disk.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        open_schema(&mut conn)?;
        Ok(Self { conn: std::sync::Arc::new(Mutex::new(conn)) })
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub(crate) fn with_tx<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_opens_with_current_schema() {
        let store = Store::open_in_memory().unwrap();
        let version: u32 = store
            .with_conn(|conn| {
                Ok(conn
                    .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |r| {
                        r.get::<_, String>(0)
                    })
                    .unwrap()
                    .parse()
                    .unwrap())
            })
            .unwrap();
        assert_eq!(version, crate::schema::MAX_WRITABLE);
    }

    #[test]
    fn opening_a_file_backed_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite");
        let (store, verdict) = Store::open(&path).unwrap();
        assert_eq!(verdict, SchemaVerdict::ReadableWritable);
        drop(store);
        let (_store, verdict) = Store::open(&path).unwrap();
        assert_eq!(verdict, SchemaVerdict::ReadableWritable);
    }

    /// Resets the probe-timeout env var on drop, even if the test panics.
    struct ProbeTimeoutGuard;

    impl ProbeTimeoutGuard {
        fn set(ms: &str) -> Self {
            std::env::set_var("RALPH_STATE_DB_PROBE_BUSY_TIMEOUT_MS", ms);
            Self
        }
    }

    impl Drop for ProbeTimeoutGuard {
        fn drop(&mut self) {
            std::env::remove_var("RALPH_STATE_DB_PROBE_BUSY_TIMEOUT_MS");
        }
    }

    #[test]
    #[serial_test::serial(probe_busy_timeout_env)]
    fn lock_held_by_another_connection_surfaces_as_lock_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite");
        drop(Store::open(&path).unwrap());

        let blocker = Connection::open(&path).unwrap();
        blocker.pragma_update(None, "locking_mode", "EXCLUSIVE").unwrap();
        blocker.execute_batch("BEGIN; SELECT 1 FROM meta; COMMIT;").unwrap();

        let _guard = ProbeTimeoutGuard::set("20");
        let (_, verdict) = Store::open(&path).unwrap();
        assert_eq!(verdict, SchemaVerdict::LockTimeout);

        drop(blocker);
    }
}
