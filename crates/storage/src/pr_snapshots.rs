// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cached pull-request mirrors (`pr_snapshots`), written by the
//! scheduler on `done`/`waiting-on-pr` and read by `status --json`.

use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PrStatus {
    Open,
    Merged,
    Closed,
}

impl PrStatus {
    fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "open",
            PrStatus::Merged => "merged",
            PrStatus::Closed => "closed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "merged" => PrStatus::Merged,
            "closed" => PrStatus::Closed,
            _ => PrStatus::Open,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PrSnapshot {
    pub repo: String,
    pub issue_number: u64,
    pub pr_number: u64,
    pub url: String,
    pub head_sha: String,
    pub status: PrStatus,
    pub checks_status: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Store {
    pub fn record_pr_snapshot(&self, snapshot: &PrSnapshot) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pr_snapshots
                    (repo, issue_number, pr_number, url, head_sha, status, checks_status,
                     created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(repo, issue_number) DO UPDATE SET
                    pr_number = excluded.pr_number,
                    url = excluded.url,
                    head_sha = excluded.head_sha,
                    status = excluded.status,
                    checks_status = excluded.checks_status,
                    updated_at_ms = excluded.updated_at_ms",
                rusqlite::params![
                    snapshot.repo,
                    snapshot.issue_number as i64,
                    snapshot.pr_number as i64,
                    snapshot.url,
                    snapshot.head_sha,
                    snapshot.status.as_str(),
                    snapshot.checks_status,
                    snapshot.created_at_ms as i64,
                    snapshot.updated_at_ms as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_pr_snapshot(&self, repo: &str, issue_number: u64) -> Result<Option<PrSnapshot>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT pr_number, url, head_sha, status, checks_status, created_at_ms, updated_at_ms
                 FROM pr_snapshots WHERE repo = ?1 AND issue_number = ?2",
                rusqlite::params![repo, issue_number as i64],
                |row| {
                    Ok(PrSnapshot {
                        repo: repo.to_string(),
                        issue_number,
                        pr_number: row.get::<_, i64>(0)? as u64,
                        url: row.get(1)?,
                        head_sha: row.get(2)?,
                        status: PrStatus::parse(&row.get::<_, String>(3)?),
                        checks_status: row.get(4)?,
                        created_at_ms: row.get::<_, i64>(5)? as u64,
                        updated_at_ms: row.get::<_, i64>(6)? as u64,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PrSnapshot {
        PrSnapshot {
            repo: "acme/widgets".to_string(),
            issue_number: 1,
            pr_number: 10,
            url: "https://example.invalid/pr/10".to_string(),
            head_sha: "abc123".to_string(),
            status: PrStatus::Open,
            checks_status: None,
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
        }
    }

    #[test]
    fn round_trips_pr_snapshot() {
        let store = Store::open_in_memory().unwrap();
        store.record_pr_snapshot(&snapshot()).unwrap();
        let loaded = store.get_pr_snapshot("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(loaded.pr_number, 10);
        assert_eq!(loaded.status, PrStatus::Open);
    }

    #[test]
    fn upsert_updates_status_in_place() {
        let store = Store::open_in_memory().unwrap();
        store.record_pr_snapshot(&snapshot()).unwrap();
        let mut merged = snapshot();
        merged.status = PrStatus::Merged;
        merged.updated_at_ms = 2_000;
        store.record_pr_snapshot(&merged).unwrap();

        let loaded = store.get_pr_snapshot("acme/widgets", 1).unwrap().unwrap();
        assert_eq!(loaded.status, PrStatus::Merged);
        assert_eq!(loaded.updated_at_ms, 2_000);
    }
}
