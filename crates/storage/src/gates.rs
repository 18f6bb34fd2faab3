// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate-run rows: one per `runPreflightGate` invocation, feeding the
//! preflight-fail scenario's audit trail.

use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GateRunStatus {
    Pass,
    Fail,
    Skipped,
}

impl GateRunStatus {
    fn as_str(self) -> &'static str {
        match self {
            GateRunStatus::Pass => "pass",
            GateRunStatus::Fail => "fail",
            GateRunStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GateRun {
    pub repo: String,
    pub issue_number: u64,
    pub stage: String,
    pub status: GateRunStatus,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub failure_excerpt: Option<String>,
}

impl Store {
    pub fn record_gate_run(&self, run: &GateRun) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO gate_runs
                    (repo, issue_number, stage, status, started_at_ms, ended_at_ms, failure_excerpt)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    run.repo,
                    run.issue_number as i64,
                    run.stage,
                    run.status.as_str(),
                    run.started_at_ms as i64,
                    run.ended_at_ms as i64,
                    run.failure_excerpt,
                ],
            )?;
            Ok(())
        })
    }

    pub fn last_gate_run(&self, repo: &str, issue_number: u64, stage: &str) -> Result<Option<GateRunStatus>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT status FROM gate_runs
                 WHERE repo = ?1 AND issue_number = ?2 AND stage = ?3
                 ORDER BY ended_at_ms DESC LIMIT 1",
                rusqlite::params![repo, issue_number as i64, stage],
                |row| row.get::<_, String>(0),
            )
            .map(|s| {
                Some(match s.as_str() {
                    "pass" => GateRunStatus::Pass,
                    "skipped" => GateRunStatus::Skipped,
                    _ => GateRunStatus::Fail,
                })
            })
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(crate::error::StorageError::from(other)),
            })
        })
    }
}
