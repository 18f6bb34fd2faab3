// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer loops spawned from `startup`: each holds only
//! an `Arc<Context>` and a shutdown receiver, and survives a panicking
//! tick by catching it and rescheduling rather than aborting.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use ralph_core::{evaluate_gate, Clock, DaemonMode};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::context::Context;

const RECONCILE_COOLDOWN_MS: u64 = ralph_engine::reconciler::DEFAULT_WRITE_COOLDOWN_MS;
const RECONCILE_THROTTLE_MS: u64 = ralph_engine::reconciler::DEFAULT_TRANSITION_THROTTLE_MS;
const STALE_SWEEP_TTL_MS: u64 = ralph_engine::queue::DEFAULT_OWNERSHIP_TTL_MS;
const STALE_SWEEP_PERIOD: Duration = Duration::from_secs(30);
const RECONCILE_PERIOD: Duration = Duration::from_secs(15);
const CMD_PERIOD: Duration = Duration::from_millis(ralph_engine::commands::DEFAULT_TICK_MS);
const AUTO_QUEUE_PERIOD: Duration = Duration::from_millis(ralph_engine::auto_queue::DEFAULT_DEBOUNCE_MS * 10);
const SCHEDULER_PERIOD: Duration = Duration::from_secs(5);

/// Sleeps for `period`, returning early (`false`) if shutdown fires first.
async fn shutdown_or_sleep(period: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(period) => true,
        _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
    }
}

/// Run `tick` every `period`, catching panics so one bad tick never
/// takes down the daemon process.
async fn run_loop<F, Fut>(name: &'static str, context: Arc<Context>, period: Duration, tick: F)
where
    F: Fn(Arc<Context>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut shutdown_rx = context.shutdown_rx.clone();
    loop {
        let ctx = Arc::clone(&context);
        if let Err(panic) = AssertUnwindSafe(tick(ctx)).catch_unwind().await {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(loop_name = name, panic = message, "loop tick panicked, rescheduling");
        }
        if !shutdown_or_sleep(period, &mut shutdown_rx).await {
            debug!(loop_name = name, "loop stopping for shutdown");
            break;
        }
    }
}

/// Spawn every timer loop the daemon runs, returning their join handles.
pub fn spawn_all(context: Arc<Context>) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    handles.push(tokio::spawn(run_loop("label-reconciler", Arc::clone(&context), RECONCILE_PERIOD, reconcile_labels_tick)));
    handles.push(tokio::spawn(run_loop("local-drift-repair", Arc::clone(&context), STALE_SWEEP_PERIOD, repair_local_drift_tick)));

    if !context.config.disable_queue_sweeps {
        handles.push(tokio::spawn(run_loop("stale-sweep", Arc::clone(&context), STALE_SWEEP_PERIOD, stale_sweep_tick)));
    }

    handles.push(tokio::spawn(run_loop("cmd-processor", Arc::clone(&context), CMD_PERIOD, cmd_processor_tick)));
    handles.push(tokio::spawn(run_loop("auto-queue", Arc::clone(&context), AUTO_QUEUE_PERIOD, auto_queue_tick)));
    handles.push(tokio::spawn(run_loop("scheduler", context, SCHEDULER_PERIOD, scheduler_tick)));

    handles
}

async fn reconcile_labels_tick(context: Arc<Context>) {
    match context.reconciler.reconcile_labels_tick(RECONCILE_COOLDOWN_MS, RECONCILE_THROTTLE_MS).await {
        Ok(count) if count > 0 => debug!(count, "label reconciler wrote status labels"),
        Ok(_) => {}
        Err(err) => log_tick_error(&context, "label-reconciler", &err.to_string()),
    }
}

async fn repair_local_drift_tick(context: Arc<Context>) {
    match context.reconciler.repair_local_drift_tick(STALE_SWEEP_TTL_MS) {
        Ok((repaired, skipped)) if repaired > 0 || skipped > 0 => {
            debug!(repaired, skipped, "local drift repair tick")
        }
        Ok(_) => {}
        Err(err) => log_tick_error(&context, "local-drift-repair", &err.to_string()),
    }
}

async fn stale_sweep_tick(context: Arc<Context>) {
    match context.queue.recover_stale_sweep(STALE_SWEEP_TTL_MS, None) {
        Ok(recovered) if !recovered.is_empty() => {
            warn!(count = recovered.len(), "recovered stale ownership");
        }
        Ok(_) => {}
        Err(err) => log_tick_error(&context, "stale-sweep", &err.to_string()),
    }
}

async fn cmd_processor_tick(context: Arc<Context>) {
    match context.commands.tick(ralph_engine::commands::DEFAULT_MAX_PER_TICK).await {
        Ok(count) if count > 0 => debug!(count, "processed operator commands"),
        Ok(_) => {}
        Err(err) => log_tick_error(&context, "cmd-processor", &err.to_string()),
    }
}

async fn auto_queue_tick(context: Arc<Context>) {
    let repos: std::collections::BTreeSet<String> =
        context.store.list_issue_snapshots().unwrap_or_default().into_iter().map(|issue| issue.repo).collect();
    for repo in repos {
        if let Err(err) = context.auto_queue.tick(&repo, ralph_engine::auto_queue::DEFAULT_MAX_PER_TICK, false).await {
            log_tick_error(&context, "auto-queue", &err.to_string());
        }
    }
}

async fn scheduler_tick(context: Arc<Context>) {
    let mode = {
        let control = context.control.lock();
        DaemonMode::from(control.mode)
    };
    let is_shutting_down = context.is_shutting_down();

    let throttle = ralph_core::get_throttle_decision(context.store.load_throttle_windows("default").unwrap_or_default());
    let gate = evaluate_gate(mode, throttle.state, is_shutting_down);

    if gate.allow_resume {
        if let Err(err) = context.scheduler.poll_completions("default").await {
            log_tick_error(&context, "scheduler-poll", &err.to_string());
        }
    }

    if !context.config.disable_queue_sweeps {
        let repo_concurrency: std::collections::HashMap<String, usize> = context
            .store
            .list_issue_snapshots()
            .unwrap_or_default()
            .into_iter()
            .map(|issue| issue.repo)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(|repo| (repo, 1usize))
            .collect();

        match context.scheduler.tick(mode, "default", &repo_concurrency, is_shutting_down).await {
            Ok(claimed) if claimed > 0 => debug!(claimed, "scheduler claimed tasks"),
            Ok(_) => {}
            Err(err) => log_tick_error(&context, "scheduler-tick", &err.to_string()),
        }
    }
}

fn log_tick_error(context: &Context, loop_name: &str, message: &str) {
    let key = format!("{loop_name}:{message}");
    let now_ms = context.clock.epoch_ms();
    if context.log_limiter.should_log(&key, now_ms, crate::log_limiter::DEFAULT_WINDOW_MS) {
        error!(loop_name, error = message, "loop tick failed");
    }
}
