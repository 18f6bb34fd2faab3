// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only `ralph-run` rows: one per agent-session invocation.
//! Feeds token-window accounting (C3) and `agent events`/`agent logs`
//! introspection.

use ralph_core::RunId;

use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AgentRun {
    pub run_id: RunId,
    pub repo: String,
    pub issue_number: u64,
    pub session_id: Option<String>,
    pub profile: String,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    pub outcome: Option<String>,
    pub tokens_used: u64,
}

impl Store {
    pub fn start_agent_run(&self, run: &AgentRun) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO agent_runs
                    (run_id, repo, issue_number, session_id, profile, started_at_ms, tokens_used)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                rusqlite::params![
                    run.run_id.to_string(),
                    run.repo,
                    run.issue_number as i64,
                    run.session_id,
                    run.profile,
                    run.started_at_ms as i64,
                ],
            )?;
            Ok(())
        })
    }

    /// End a run and credit its tokens to the matching throttle window in
    /// the same transaction, so run history and throttle state never drift.
    pub fn complete_agent_run(
        &self,
        run_id: &RunId,
        ended_at_ms: u64,
        outcome: &str,
        tokens_used: u64,
        profile: &str,
        window_name: &str,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE agent_runs SET ended_at_ms = ?1, outcome = ?2, tokens_used = ?3
                 WHERE run_id = ?4",
                rusqlite::params![ended_at_ms as i64, outcome, tokens_used as i64, run_id.to_string()],
            )?;
            tx.execute(
                "UPDATE throttle_windows SET used_tokens = used_tokens + ?1
                 WHERE profile = ?2 AND name = ?3",
                rusqlite::params![tokens_used as i64, profile, window_name],
            )?;
            Ok(())
        })
    }

    /// Every run with no `ended_at_ms` yet, across every repo -- the
    /// scheduler's completion-polling set.
    pub fn list_open_runs(&self) -> Result<Vec<AgentRun>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT run_id, repo, issue_number, session_id, profile, started_at_ms
                 FROM agent_runs WHERE ended_at_ms IS NULL",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(AgentRun {
                        run_id: RunId::from_string(row.get::<_, String>(0)?),
                        repo: row.get(1)?,
                        issue_number: row.get::<_, i64>(2)? as u64,
                        session_id: row.get(3)?,
                        profile: row.get(4)?,
                        started_at_ms: row.get::<_, i64>(5)? as u64,
                        ended_at_ms: None,
                        outcome: None,
                        tokens_used: 0,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_agent_runs(&self, repo: &str, issue_number: u64) -> Result<Vec<AgentRun>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT run_id, session_id, profile, started_at_ms, ended_at_ms, outcome, tokens_used
                 FROM agent_runs WHERE repo = ?1 AND issue_number = ?2 ORDER BY started_at_ms",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![repo, issue_number as i64], |row| {
                    Ok(AgentRun {
                        run_id: RunId::from_string(row.get::<_, String>(0)?),
                        repo: repo.to_string(),
                        issue_number,
                        session_id: row.get(1)?,
                        profile: row.get(2)?,
                        started_at_ms: row.get::<_, i64>(3)? as u64,
                        ended_at_ms: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
                        outcome: row.get(5)?,
                        tokens_used: row.get::<_, i64>(6)? as u64,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
