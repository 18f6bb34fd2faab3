// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `IssueHost` trait boundary: issue/label/comment CRUD,
//! timeline events, repo listing. The remote platform's HTTP client
//! internals are out of scope; this crate only defines the interface
//! and its in-memory test double ([`crate::mock::MockHost`]).

use async_trait::async_trait;
use ralph_core::IssueSnapshot;

use crate::error::HostError;

/// One timeline entry on an issue, e.g. a `labeled` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEvent {
    pub event_id: String,
    pub kind: String,
    pub label: Option<String>,
    pub created_at_ms: u64,
}

#[async_trait]
pub trait IssueHost: Send + Sync {
    async fn get_issue(&self, repo: &str, number: u64) -> Result<IssueSnapshot, HostError>;

    async fn list_issues(&self, repo: &str) -> Result<Vec<IssueSnapshot>, HostError>;

    async fn list_repos(&self) -> Result<Vec<String>, HostError>;

    /// Preferred transport: a single compound mutation adding and
    /// removing labels in one call.
    async fn mutate_issue_labels(
        &self,
        repo: &str,
        number: u64,
        add: &[String],
        remove: &[String],
    ) -> Result<(), HostError>;

    /// Per-label fallback when the compound mutation fails.
    async fn add_label(&self, repo: &str, number: u64, label: &str) -> Result<(), HostError>;

    async fn remove_label(&self, repo: &str, number: u64, label: &str) -> Result<(), HostError>;

    /// Recovery step when a mutation fails with `not_found` because a
    /// label does not yet exist on the repo.
    async fn ensure_labels_exist(&self, repo: &str, labels: &[String]) -> Result<(), HostError>;

    async fn add_comment(&self, repo: &str, number: u64, body: &str) -> Result<(), HostError>;

    async fn list_timeline_events(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<TimelineEvent>, HostError>;
}
