// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The label-write pipeline: coalescing, per-repo backoff, and
//! compound-mutation-with-fallback. Sits between the reconciler/command
//! processor/auto-queue runner and the [`IssueHost`] boundary, host
//! agnostic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ralph_core::{Clock, LabelDelta};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::HostError;
use crate::host::IssueHost;

const DEFAULT_COALESCE_WINDOW_MS: u64 = 250;

fn coalesce_window_ms() -> u64 {
    std::env::var("RALPH_GITHUB_WRITE_COALESCE_WINDOW_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_COALESCE_WINDOW_MS)
}

type CoalesceKey = (String, u64, Vec<String>, Vec<String>);

fn coalesce_key(repo: &str, number: u64, delta: &LabelDelta) -> CoalesceKey {
    let (add, remove) = delta.signature();
    (repo.to_string(), number, add, remove)
}

enum CoalesceEntry {
    InFlight(broadcast::Sender<Result<(), HostError>>),
    Done { result: Result<(), HostError>, at_ms: u64 },
}

/// Telemetry counters exposed for the daemon's status surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelWriteStats {
    pub merged_requests: u64,
    pub compound_writes: u64,
    pub fallback_writes: u64,
    pub recovered_missing_labels: u64,
}

struct StatsInner(LabelWriteStats);

/// Orchestrates every label write issued against a single [`IssueHost`].
pub struct LabelWritePipeline<C: Clock> {
    host: Arc<dyn IssueHost>,
    clock: C,
    inflight: Mutex<HashMap<CoalesceKey, CoalesceEntry>>,
    blocked_until_ms: Mutex<HashMap<String, u64>>,
    stats: Mutex<StatsInner>,
}

impl<C: Clock> LabelWritePipeline<C> {
    pub fn new(host: Arc<dyn IssueHost>, clock: C) -> Self {
        Self {
            host,
            clock,
            inflight: Mutex::new(HashMap::new()),
            blocked_until_ms: Mutex::new(HashMap::new()),
            stats: Mutex::new(StatsInner(LabelWriteStats::default())),
        }
    }

    pub fn stats(&self) -> LabelWriteStats {
        self.stats.lock().0
    }

    /// Whether `repo` is currently outside a backoff window.
    pub fn can_attempt_label_write(&self, repo: &str) -> bool {
        match self.blocked_until_ms.lock().get(repo) {
            Some(&until) => self.clock.epoch_ms() >= until,
            None => true,
        }
    }

    fn enter_backoff(&self, repo: &str, retry_after_ms: Option<u64>) {
        let delay = retry_after_ms.unwrap_or(60_000);
        let until = self.clock.epoch_ms() + delay;
        self.blocked_until_ms.lock().insert(repo.to_string(), until);
        warn!(repo, delay_ms = delay, "label write backoff engaged");
    }

    /// Apply `delta` to `repo#number`. Non-critical writes within the
    /// coalesce window share a single underlying call; critical writes
    /// (command-label acks, ownership releases) always bypass it.
    pub async fn apply(
        &self,
        repo: &str,
        number: u64,
        delta: &LabelDelta,
        critical: bool,
    ) -> Result<(), HostError> {
        if delta.is_empty() {
            return Ok(());
        }
        if !self.can_attempt_label_write(repo) {
            return Err(HostError::RateLimited { retry_after_ms: None });
        }
        if critical || coalesce_window_ms() == 0 {
            return self.perform(repo, number, delta).await;
        }
        self.apply_coalesced(repo, number, delta).await
    }

    async fn apply_coalesced(
        &self,
        repo: &str,
        number: u64,
        delta: &LabelDelta,
    ) -> Result<(), HostError> {
        let key = coalesce_key(repo, number, delta);
        let window_ms = coalesce_window_ms();
        let now_ms = self.clock.epoch_ms();

        let mut receiver = None;
        let mut leader = false;
        {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(CoalesceEntry::InFlight(tx)) => {
                    receiver = Some(tx.subscribe());
                    self.stats.lock().0.merged_requests += 1;
                }
                Some(CoalesceEntry::Done { result, at_ms }) if now_ms - at_ms < window_ms => {
                    let result = result.clone();
                    self.stats.lock().0.merged_requests += 1;
                    drop(inflight);
                    return result;
                }
                _ => {
                    let (tx, _rx) = broadcast::channel(1);
                    inflight.insert(key.clone(), CoalesceEntry::InFlight(tx));
                    leader = true;
                }
            }
        }

        if let Some(mut rx) = receiver {
            return rx.recv().await.unwrap_or(Err(HostError::Transient(
                "coalesced write sender dropped".to_string(),
            )));
        }
        debug_assert!(leader);

        let result = self.perform(repo, number, delta).await;

        let mut inflight = self.inflight.lock();
        if let Some(CoalesceEntry::InFlight(tx)) = inflight.remove(&key) {
            let _ = tx.send(result.clone());
        }
        inflight.insert(
            key,
            CoalesceEntry::Done { result: result.clone(), at_ms: self.clock.epoch_ms() },
        );
        result
    }

    /// Compound mutation, falling back to per-label REST ops; recovers
    /// once from a `NotFound` by calling `ensure_labels_exist`.
    async fn perform(&self, repo: &str, number: u64, delta: &LabelDelta) -> Result<(), HostError> {
        self.stats.lock().0.compound_writes += 1;
        match self.host.mutate_issue_labels(repo, number, &delta.add, &delta.remove).await {
            Ok(()) => Ok(()),
            Err(HostError::NotFound(_)) => {
                self.stats.lock().0.recovered_missing_labels += 1;
                self.host.ensure_labels_exist(repo, &delta.add).await?;
                match self
                    .host
                    .mutate_issue_labels(repo, number, &delta.add, &delta.remove)
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(_) => self.fallback_per_label(repo, number, delta).await,
                }
            }
            Err(HostError::RateLimited { retry_after_ms }) => {
                self.enter_backoff(repo, retry_after_ms);
                Err(HostError::RateLimited { retry_after_ms })
            }
            Err(_) => self.fallback_per_label(repo, number, delta).await,
        }
    }

    async fn fallback_per_label(&self, repo: &str, number: u64, delta: &LabelDelta) -> Result<(), HostError> {
        self.stats.lock().0.fallback_writes += 1;
        for label in &delta.add {
            if let Err(err) = self.host.add_label(repo, number, label).await {
                if matches!(err, HostError::NotFound(_)) {
                    self.stats.lock().0.recovered_missing_labels += 1;
                    self.host.ensure_labels_exist(repo, std::slice::from_ref(label)).await?;
                    self.host.add_label(repo, number, label).await?;
                } else {
                    return Err(err);
                }
            }
        }
        for label in &delta.remove {
            self.host.remove_label(repo, number, label).await?;
        }
        debug!(repo, number, "label write applied via per-label fallback");
        Ok(())
    }
}
