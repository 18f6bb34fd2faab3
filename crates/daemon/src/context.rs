// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's shared context: one store handle, one host handle, one
//! `LogLimiter`, and the engine components built on top of them, held
//! behind an `Arc` by every spawned timer task.

use std::sync::Arc;

use parking_lot::Mutex;
use ralph_core::{DaemonId, SystemClock};
use ralph_engine::{
    AutoQueueRunner, CommandProcessor, NullAgentAdapter, NullRelationshipProvider, QueueBackend, Reconciler,
    Scheduler,
};
use ralph_host::{IssueHost, LabelWritePipeline, MockHost};
use ralph_storage::Store;
use tokio::sync::watch;

use crate::config::Config;
use crate::control::ControlFile;
use crate::log_limiter::LogLimiter;

pub struct Context {
    pub config: Config,
    pub daemon_id: DaemonId,
    pub clock: SystemClock,
    pub store: Store,
    pub host: Arc<dyn IssueHost>,
    pub pipeline: Arc<LabelWritePipeline<SystemClock>>,
    pub queue: QueueBackend<SystemClock>,
    pub reconciler: Reconciler<SystemClock>,
    pub commands: CommandProcessor<SystemClock>,
    pub auto_queue: AutoQueueRunner<SystemClock>,
    pub scheduler: Scheduler<SystemClock>,
    pub log_limiter: LogLimiter,
    pub control: Mutex<ControlFile>,
    pub start_time: std::time::Instant,
    pub shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl Context {
    /// Build every C1-C9 component from an opened store and a config.
    ///
    /// No production `IssueHost` adapter ships with this crate: the
    /// real platform client is an explicit extension point. `MockHost`
    /// stands in as the default, in-memory host until one is wired in.
    pub fn new(config: Config, store: Store, daemon_id: DaemonId) -> Self {
        let clock = SystemClock;
        let host: Arc<dyn IssueHost> = Arc::new(MockHost::with_clock(clock.clone()));
        let pipeline = Arc::new(LabelWritePipeline::new(Arc::clone(&host), clock.clone()));

        let queue = QueueBackend::new(store.clone(), Arc::clone(&host), Arc::clone(&pipeline), clock.clone());
        let reconciler = Reconciler::new(store.clone(), Arc::clone(&pipeline), clock.clone());
        let commands = CommandProcessor::new(store.clone(), Arc::clone(&host), Arc::clone(&pipeline), clock.clone());
        let auto_queue = AutoQueueRunner::new(
            store.clone(),
            Arc::clone(&pipeline),
            Arc::new(NullRelationshipProvider),
            false,
        );
        let scheduler = Scheduler::new(
            store.clone(),
            QueueBackend::new(store.clone(), Arc::clone(&host), Arc::clone(&pipeline), clock.clone()),
            Arc::new(NullAgentAdapter),
            clock.clone(),
            daemon_id.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            daemon_id,
            clock,
            store,
            host,
            pipeline,
            queue,
            reconciler,
            commands,
            auto_queue,
            scheduler,
            log_limiter: LogLimiter::new(),
            control: Mutex::new(ControlFile::default()),
            start_time: std::time::Instant::now(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
