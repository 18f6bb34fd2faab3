// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon side of the control-socket IPC: accept
//! one connection, read one `Request`, write one `Response`.

use std::sync::Arc;

use ralph_core::{get_throttle_decision, infer_priority_from_labels, Clock};
use ralph_wire::{
    read_request, write_response, DrainSummary, DurableStateStatus, Query, Response, StatusSnapshot, TaskSummary,
    ThrottleSummary, WireError,
};
use tokio::net::UnixListener;
use tracing::{error, warn};

use crate::context::Context;
use crate::control::{ControlFile, ControlMode};

pub async fn serve(listener: UnixListener, context: Arc<Context>) {
    loop {
        let mut shutdown_rx = context.shutdown_rx.clone();
        tokio::select! {
            accepted = listener.accept() => {
                let Ok((stream, _addr)) = accepted else { continue };
                let context = Arc::clone(&context);
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, context).await {
                        warn!(error = %err, "control connection ended with an error");
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

async fn handle_connection(mut stream: tokio::net::UnixStream, context: Arc<Context>) -> Result<(), ralph_wire::ProtocolError> {
    let request = read_request(&mut stream).await?;
    let response = handle_request(&context, request.query).await;
    write_response(&mut stream, &response).await
}

async fn handle_request(context: &Context, query: Query) -> Response {
    match query {
        Query::Status => Response::Status { snapshot: build_status_snapshot(context) },
        Query::Drain { timeout_secs, pause_at_checkpoint } => {
            let mut control = context.control.lock();
            control.mode = ControlMode::Draining;
            control.drain_timeout_ms = timeout_secs.map(|s| s * 1_000);
            control.pause_at_checkpoint = Some(pause_at_checkpoint);
            if let Err(err) = control.write(&context.config.control_path) {
                error!(error = %err, "failed to persist control file");
                return Response::Error { error: WireError::new("transient", err.to_string()) };
            }
            let in_flight = context.store.list_open_runs().map(|runs| runs.len()).unwrap_or(0);
            Response::Drained {
                summary: DrainSummary {
                    mode: "draining".to_string(),
                    drain_deadline_ms: control.drain_timeout_ms.map(|ms| context.clock.epoch_ms() + ms),
                    in_flight,
                },
            }
        }
        Query::Resume => {
            let mut control = context.control.lock();
            *control = ControlFile { mode: ControlMode::Running, ..ControlFile::default() };
            if let Err(err) = control.write(&context.config.control_path) {
                error!(error = %err, "failed to persist control file");
                return Response::Error { error: WireError::new("transient", err.to_string()) };
            }
            Response::Resumed
        }
        Query::Restart { .. } => Response::Restarted,
        Query::Upgrade { .. } => Response::Upgraded,
    }
}

fn build_status_snapshot(context: &Context) -> StatusSnapshot {
    let uptime_secs = context.start_time.elapsed().as_secs();
    let control = context.control.lock();
    let mode = match control.mode {
        ControlMode::Running => "running",
        ControlMode::Draining => "draining",
        ControlMode::Paused => "paused",
    }
    .to_string();
    drop(control);

    let op_states = context.store.list_task_op_states().unwrap_or_default();
    let issues: std::collections::HashMap<(String, u64), ralph_core::IssueSnapshot> = context
        .store
        .list_issue_snapshots()
        .unwrap_or_default()
        .into_iter()
        .map(|issue| ((issue.repo.clone(), issue.number), issue))
        .collect();

    let mut in_progress = Vec::new();
    let mut queued = Vec::new();
    for op in &op_states {
        let key = (op.task_path.repo.clone(), op.task_path.issue_number);
        let priority = issues
            .get(&key)
            .map(|issue| infer_priority_from_labels(&issue.labels))
            .unwrap_or(ralph_core::Priority::DEFAULT);
        let summary = TaskSummary {
            repo: op.task_path.repo.clone(),
            issue_number: op.task_path.issue_number,
            status: op.status.as_str().to_string(),
            priority: priority.as_str().to_string(),
            daemon_id: op.daemon_id.as_ref().map(|id| id.to_string()),
        };
        match op.status {
            ralph_core::TaskStatus::Queued => queued.push(summary),
            ralph_core::TaskStatus::Starting | ralph_core::TaskStatus::InProgress | ralph_core::TaskStatus::WaitingOnPr => {
                in_progress.push(summary)
            }
            _ => {}
        }
    }

    let throttle = context
        .store
        .load_throttle_windows("default")
        .ok()
        .filter(|windows| !windows.is_empty())
        .map(|windows| {
            let decision = get_throttle_decision(windows);
            vec![ThrottleSummary {
                profile: "default".to_string(),
                state: format!("{:?}", decision.state).to_lowercase(),
                resume_at_ts: decision.resume_at_ts,
            }]
        })
        .unwrap_or_default();

    StatusSnapshot {
        uptime_secs,
        mode,
        durable_state: DurableStateStatus::ok(),
        in_progress,
        queued,
        throttle,
    }
}

/// Open the durable store read-only and report a best-effort snapshot,
/// used by `status --json` when no daemon is reachable, and by the
/// degraded path when the schema window refuses writes.
pub fn degraded_status_snapshot(db_path: &std::path::Path) -> StatusSnapshot {
    match ralph_storage::Store::open(db_path) {
        Ok((_, ralph_storage::SchemaVerdict::ReadableWritable)) => {
            StatusSnapshot::degraded(DurableStateStatus::ok())
        }
        Ok((_, ralph_storage::SchemaVerdict::ReadableReadonlyForwardNewer)) => {
            StatusSnapshot::degraded(DurableStateStatus::readonly_forward_newer())
        }
        Ok((_, ralph_storage::SchemaVerdict::LockTimeout)) => {
            StatusSnapshot::degraded(DurableStateStatus::lock_timeout())
        }
        Ok((_, ralph_storage::SchemaVerdict::UnreadableForwardIncompatible { .. })) | Err(_) => {
            StatusSnapshot::degraded(DurableStateStatus::forward_incompatible())
        }
    }
}
