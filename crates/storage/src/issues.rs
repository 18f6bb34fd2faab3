// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue snapshot + label-set persistence.

use ralph_core::{IssueSnapshot, IssueState, Labels};

use crate::error::Result;
use crate::store::Store;

fn state_str(state: IssueState) -> &'static str {
    match state {
        IssueState::Open => "open",
        IssueState::Closed => "closed",
    }
}

fn parse_state(s: &str) -> IssueState {
    match s {
        "closed" => IssueState::Closed,
        _ => IssueState::Open,
    }
}

impl Store {
    /// Upsert the cached issue row (not its labels -- see
    /// [`Store::record_issue_labels_snapshot`] for that).
    pub fn record_issue_snapshot(&self, snapshot: &IssueSnapshot) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO issue_snapshots
                    (repo, number, title, state, url, host_node_id, host_updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(repo, number) DO UPDATE SET
                    title = excluded.title,
                    state = excluded.state,
                    url = excluded.url,
                    host_node_id = excluded.host_node_id,
                    host_updated_at_ms = excluded.host_updated_at_ms",
                rusqlite::params![
                    snapshot.repo,
                    snapshot.number as i64,
                    snapshot.title,
                    state_str(snapshot.state),
                    snapshot.url,
                    snapshot.host_node_id,
                    snapshot.host_updated_at_ms as i64,
                ],
            )?;
            Ok(())
        })
    }

    /// Atomically replace the stored label set for one issue.
    pub fn record_issue_labels_snapshot(
        &self,
        repo: &str,
        number: u64,
        labels: &Labels,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "DELETE FROM issue_labels WHERE repo = ?1 AND number = ?2",
                rusqlite::params![repo, number as i64],
            )?;
            for label in labels.iter() {
                tx.execute(
                    "INSERT INTO issue_labels (repo, number, label) VALUES (?1, ?2, ?3)",
                    rusqlite::params![repo, number as i64, label],
                )?;
            }
            Ok(())
        })
    }

    /// All cached issue snapshots, for the reconciler and auto-queue
    /// runner's per-tick sweeps.
    pub fn list_issue_snapshots(&self) -> Result<Vec<IssueSnapshot>> {
        let keys = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT repo, number FROM issue_snapshots")?;
            let keys = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(keys)
        })?;
        let mut snapshots = Vec::with_capacity(keys.len());
        for (repo, number) in keys {
            if let Some(snapshot) = self.get_issue_snapshot(&repo, number)? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    pub fn get_issue_snapshot(&self, repo: &str, number: u64) -> Result<Option<IssueSnapshot>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT title, state, url, host_node_id, host_updated_at_ms
                     FROM issue_snapshots WHERE repo = ?1 AND number = ?2",
                    rusqlite::params![repo, number as i64],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)? as u64,
                        ))
                    },
                )
                .ok();

            let Some((title, state, url, host_node_id, host_updated_at_ms)) = row else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT label FROM issue_labels WHERE repo = ?1 AND number = ?2",
            )?;
            let labels: Labels = stmt
                .query_map(rusqlite::params![repo, number as i64], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?
                .into_iter()
                .collect();

            Ok(Some(IssueSnapshot {
                repo: repo.to_string(),
                number,
                title,
                state: parse_state(&state),
                url,
                host_node_id,
                host_updated_at_ms,
                labels,
            }))
        })
    }
}
