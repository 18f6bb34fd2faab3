// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema versioning: the forward-only migration ladder and the
//! schema-window verdict computed on open.

use rusqlite::Connection;

use crate::error::{Result, StorageError};

/// Lowest schema version this binary can still read (read-only).
pub const MIN_READABLE: u32 = 1;
/// Highest schema version this binary can migrate to and write.
pub const MAX_WRITABLE: u32 = CURRENT_SCHEMA_VERSION;
/// Highest schema version this binary can read without writing.
/// Kept one ahead of `MAX_WRITABLE` so a rolled-back binary can still
/// observe (but not corrupt) a database a newer binary upgraded.
pub const MAX_READABLE: u32 = CURRENT_SCHEMA_VERSION + 1;

const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Forward-only numbered migrations, applied in order inside one
/// exclusive transaction on first open at a lower version.
const MIGRATIONS: &[(u32, &str)] = &[(1, include_str!("migrations/0001_init.sql"))];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVerdict {
    ReadableWritable,
    ReadableReadonlyForwardNewer,
    UnreadableForwardIncompatible { found: u32 },
    /// An exclusive lock on the database file could not be acquired
    /// within the busy-timeout probe window (another process is
    /// holding it). Computed by `Store::open`, not `open_schema`: the
    /// probe spans the pragma/journal-mode setup this function doesn't see.
    LockTimeout,
}

fn read_schema_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .map(|v| v.parse::<u32>().unwrap_or(0))
    .or_else(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(0),
        other => Err(StorageError::from(other)),
    })
}

fn write_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO meta(key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [version.to_string()],
    )?;
    Ok(())
}

/// Open-time schema bootstrap: create `meta` if absent, read the current
/// version, compute the verdict, and run any pending migrations when the
/// verdict is `ReadableWritable`.
pub fn open_schema(conn: &mut Connection) -> Result<SchemaVerdict> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
    )?;

    let found = read_schema_version(conn)?;

    if found > MAX_READABLE {
        return Ok(SchemaVerdict::UnreadableForwardIncompatible { found });
    }
    if found > MAX_WRITABLE {
        return Ok(SchemaVerdict::ReadableReadonlyForwardNewer);
    }

    let tx = conn.transaction()?;
    for (version, sql) in MIGRATIONS {
        if *version > found {
            tx.execute_batch(sql)?;
            write_schema_version(&tx, *version)?;
        }
    }
    tx.commit()?;

    Ok(SchemaVerdict::ReadableWritable)
}
