// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `MockHost`: an in-memory `IssueHost` test double, backed by a
//! label/comment/event store. Used by every C5-C8 unit and integration
//! test in place of a real platform client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use ralph_core::{Clock, IssueSnapshot, IssueState, Labels, SystemClock};

use crate::error::HostError;
use crate::host::{IssueHost, TimelineEvent};

struct MockIssue {
    snapshot: IssueSnapshot,
    comments: Vec<String>,
    timeline: Vec<TimelineEvent>,
}

struct Inner {
    issues: BTreeMap<(String, u64), MockIssue>,
    known_labels: BTreeMap<String, Vec<String>>,
    next_event_id: u64,
    /// Labels that `ensure_labels_exist` / `mutate_issue_labels` should
    /// fail to find until recovered, keyed by repo.
    missing_labels: BTreeMap<String, Vec<String>>,
}

/// In-memory `IssueHost`. All state lives behind a single mutex; tests
/// run single-threaded against it via `tokio::test`.
pub struct MockHost<C: Clock = SystemClock> {
    clock: C,
    inner: Mutex<Inner>,
}

impl MockHost<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MockHost<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MockHost<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner {
                issues: BTreeMap::new(),
                known_labels: BTreeMap::new(),
                next_event_id: 1,
                missing_labels: BTreeMap::new(),
            }),
        }
    }

    pub fn seed_issue(&self, snapshot: IssueSnapshot) {
        let mut inner = self.inner.lock();
        let repo = snapshot.repo.clone();
        let number = snapshot.number;
        for label in snapshot.labels.iter() {
            inner
                .known_labels
                .entry(repo.clone())
                .or_default()
                .push(label.to_string());
        }
        inner.issues.insert(
            (repo, number),
            MockIssue {
                snapshot,
                comments: Vec::new(),
                timeline: Vec::new(),
            },
        );
    }

    /// Mark a label as absent from the repo's label set so the next
    /// write that references it fails with `HostError::NotFound`.
    pub fn make_label_missing(&self, repo: &str, label: &str) {
        self.inner
            .lock()
            .missing_labels
            .entry(repo.to_string())
            .or_default()
            .push(label.to_string());
    }

    pub fn comments(&self, repo: &str, number: u64) -> Vec<String> {
        self.inner
            .lock()
            .issues
            .get(&(repo.to_string(), number))
            .map(|i| i.comments.clone())
            .unwrap_or_default()
    }

    fn record_event(inner: &mut Inner, repo: &str, number: u64, kind: &str, label: Option<String>, now_ms: u64) {
        let event_id = format!("evt-{}", inner.next_event_id);
        inner.next_event_id += 1;
        if let Some(issue) = inner.issues.get_mut(&(repo.to_string(), number)) {
            issue.timeline.push(TimelineEvent {
                event_id,
                kind: kind.to_string(),
                label,
                created_at_ms: now_ms,
            });
        }
    }
}

#[async_trait]
impl<C: Clock> IssueHost for MockHost<C> {
    async fn get_issue(&self, repo: &str, number: u64) -> Result<IssueSnapshot, HostError> {
        self.inner
            .lock()
            .issues
            .get(&(repo.to_string(), number))
            .map(|i| i.snapshot.clone())
            .ok_or_else(|| HostError::NotFound(format!("{repo}#{number}")))
    }

    async fn list_issues(&self, repo: &str) -> Result<Vec<IssueSnapshot>, HostError> {
        Ok(self
            .inner
            .lock()
            .issues
            .values()
            .filter(|i| i.snapshot.repo == repo)
            .map(|i| i.snapshot.clone())
            .collect())
    }

    async fn list_repos(&self) -> Result<Vec<String>, HostError> {
        let inner = self.inner.lock();
        let mut repos: Vec<String> = inner.issues.keys().map(|(repo, _)| repo.clone()).collect();
        repos.sort();
        repos.dedup();
        Ok(repos)
    }

    async fn mutate_issue_labels(
        &self,
        repo: &str,
        number: u64,
        add: &[String],
        remove: &[String],
    ) -> Result<(), HostError> {
        {
            let inner = self.inner.lock();
            if let Some(missing) = inner.missing_labels.get(repo) {
                if add.iter().any(|l| missing.contains(l)) {
                    return Err(HostError::NotFound(format!("label missing on {repo}")));
                }
            }
        }
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let Some(issue) = inner.issues.get_mut(&(repo.to_string(), number)) else {
            return Err(HostError::NotFound(format!("{repo}#{number}")));
        };
        let mut labels: Vec<String> = issue.snapshot.labels.iter().map(str::to_string).collect();
        labels.retain(|l| !remove.contains(l));
        for l in add {
            if !labels.contains(l) {
                labels.push(l.clone());
            }
        }
        issue.snapshot.labels = Labels::from_iter(labels);
        for l in add {
            Self::record_event(&mut inner, repo, number, "labeled", Some(l.clone()), now_ms);
        }
        for l in remove {
            Self::record_event(&mut inner, repo, number, "unlabeled", Some(l.clone()), now_ms);
        }
        Ok(())
    }

    async fn add_label(&self, repo: &str, number: u64, label: &str) -> Result<(), HostError> {
        self.mutate_issue_labels(repo, number, &[label.to_string()], &[])
            .await
    }

    async fn remove_label(&self, repo: &str, number: u64, label: &str) -> Result<(), HostError> {
        self.mutate_issue_labels(repo, number, &[], &[label.to_string()])
            .await
    }

    async fn ensure_labels_exist(&self, repo: &str, labels: &[String]) -> Result<(), HostError> {
        let mut inner = self.inner.lock();
        if let Some(missing) = inner.missing_labels.get_mut(repo) {
            missing.retain(|l| !labels.contains(l));
        }
        let known = inner.known_labels.entry(repo.to_string()).or_default();
        for l in labels {
            if !known.contains(l) {
                known.push(l.clone());
            }
        }
        Ok(())
    }

    async fn add_comment(&self, repo: &str, number: u64, body: &str) -> Result<(), HostError> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        let Some(issue) = inner.issues.get_mut(&(repo.to_string(), number)) else {
            return Err(HostError::NotFound(format!("{repo}#{number}")));
        };
        issue.comments.push(body.to_string());
        Self::record_event(&mut inner, repo, number, "commented", None, now_ms);
        Ok(())
    }

    async fn list_timeline_events(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<TimelineEvent>, HostError> {
        self.inner
            .lock()
            .issues
            .get(&(repo.to_string(), number))
            .map(|i| i.timeline.clone())
            .ok_or_else(|| HostError::NotFound(format!("{repo}#{number}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_core::test_support::issue_snapshot;

    #[tokio::test]
    async fn seeded_issue_round_trips() {
        let host = MockHost::new();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &[]));

        let snap = host.get_issue("acme/widgets", 1).await.unwrap();
        assert_eq!(snap.number, 1);
        assert_eq!(snap.state, IssueState::Open);
    }

    #[tokio::test]
    async fn mutate_labels_adds_and_removes() {
        let host = MockHost::new();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &[]));

        host.mutate_issue_labels(
            "acme/widgets",
            1,
            &["ralph:status:queued".to_string()],
            &[],
        )
        .await
        .unwrap();
        let snap = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(snap.labels.contains("ralph:status:queued"));

        host.mutate_issue_labels(
            "acme/widgets",
            1,
            &[],
            &["ralph:status:queued".to_string()],
        )
        .await
        .unwrap();
        let snap = host.get_issue("acme/widgets", 1).await.unwrap();
        assert!(!snap.labels.contains("ralph:status:queued"));
    }

    #[tokio::test]
    async fn missing_label_fails_until_ensured() {
        let host = MockHost::new();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &[]));
        host.make_label_missing("acme/widgets", "ralph:status:queued");

        let err = host
            .mutate_issue_labels("acme/widgets", 1, &["ralph:status:queued".to_string()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));

        host.ensure_labels_exist("acme/widgets", &["ralph:status:queued".to_string()])
            .await
            .unwrap();
        host.mutate_issue_labels("acme/widgets", 1, &["ralph:status:queued".to_string()], &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_issue_is_not_found() {
        let host = MockHost::new();
        let err = host.get_issue("acme/widgets", 99).await.unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
    }

    #[tokio::test]
    async fn comment_and_timeline_are_recorded() {
        let host = MockHost::new();
        host.seed_issue(issue_snapshot("acme/widgets", 1, &[]));
        host.add_comment("acme/widgets", 1, "hello").await.unwrap();

        assert_eq!(host.comments("acme/widgets", 1), vec!["hello".to_string()]);
        let timeline = host.list_timeline_events("acme/widgets", 1).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].kind, "commented");
    }
}
