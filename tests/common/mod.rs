//! Common test utilities and fixtures.
//!
//! Provides a fully wired local stack (store, identity, drafts, repository)
//! over a temp directory, plus a scriptable in-memory remote sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use tempfile::TempDir;

use formsync::prelude::*;

pub const DRAFT_WINDOW: Duration = Duration::from_millis(750);

/// A fully wired local stack over a temporary store.
pub struct TestStack {
    // Held so the store directory outlives the stack.
    _dir: TempDir,
    pub store: Arc<LocalStore>,
    pub identity: Arc<IdentityProvider>,
    pub drafts: Arc<DraftManager>,
    pub repo: Arc<SubmissionRepository>,
}

impl TestStack {
    pub fn new() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let store = Arc::new(LocalStore::open(dir.path())?);
        let identity = Arc::new(IdentityProvider::new(Arc::clone(&store)));
        let drafts = Arc::new(DraftManager::new(Arc::clone(&store), DRAFT_WINDOW));
        let repo = Arc::new(SubmissionRepository::new(
            Arc::clone(&store),
            Arc::clone(&identity),
            Arc::clone(&drafts),
        ));
        Ok(Self {
            _dir: dir,
            store,
            identity,
            drafts,
            repo,
        })
    }

    /// Wire a sync engine over this stack with the default retry policy.
    pub fn engine(
        &self,
        sink: Arc<MockSink>,
        connectivity: Connectivity,
    ) -> Arc<SyncEngine<MockSink>> {
        Arc::new(SyncEngine::new(
            Arc::clone(&self.repo),
            sink,
            connectivity,
            RetryPolicy::default(),
        ))
    }
}

pub fn sample_schema() -> FormSchema {
    FormSchema::parse(serde_json::json!({
        "id": "scholarship",
        "title": "Scholarship Application",
        "description": "Apply for a municipal scholarship",
        "fields": [
            { "key": "name", "label": "Full name", "type": "text", "required": true },
            { "key": "email", "label": "Email", "type": "email", "required": true }
        ]
    }))
    .unwrap()
}

pub fn form_data(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// One scripted sink reply.
pub enum Scripted {
    Reply(SinkResponse),
    TransportFailure,
}

/// Scriptable in-memory remote sink.
///
/// Replies are consumed in order; once the script is exhausted every batch
/// is acknowledged in full (the sink's idempotent happy path). Each call
/// records the ids it was asked to deliver.
pub struct MockSink {
    script: Mutex<VecDeque<Scripted>>,
    batches: Mutex<Vec<Vec<String>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            batches: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// A sink whose every reply takes `delay` to arrive.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Queue a reply for the next delivery.
    pub fn push(&self, scripted: Scripted) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(scripted);
        }
    }

    /// Queue a reply that acknowledges exactly these ids.
    pub fn push_success(&self, ids: &[&str]) {
        self.push(Scripted::Reply(SinkResponse {
            success: true,
            synced_count: ids.len(),
            synced_ids: ids.iter().map(|s| s.to_string()).collect(),
            failed_syncs: Vec::new(),
            message: "ok".to_string(),
        }));
    }

    /// Queue a reply that rejects exactly these ids with an error message.
    pub fn push_rejections(&self, rejections: &[(&str, &str)]) {
        self.push(Scripted::Reply(SinkResponse {
            success: true,
            synced_count: 0,
            synced_ids: Vec::new(),
            failed_syncs: rejections
                .iter()
                .map(|(id, error)| FailedSync {
                    submission_id: id.to_string(),
                    error: error.to_string(),
                    can_retry: true,
                })
                .collect(),
            message: "rejected".to_string(),
        }));
    }

    /// Queue a transport failure (sink unreachable).
    pub fn push_transport_failure(&self) {
        self.push(Scripted::TransportFailure);
    }

    /// Number of batches delivered so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Ids in each delivered batch, in delivery order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl RemoteSink for MockSink {
    async fn deliver(&self, batch: &[Submission]) -> Result<SinkResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let ids: Vec<String> = batch.iter().map(|s| s.id.clone()).collect();
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(ids.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::TransportFailure) => Err(TransportError::Timeout),
            // Script exhausted: acknowledge the whole batch.
            None => Ok(SinkResponse {
                success: true,
                synced_count: ids.len(),
                synced_ids: ids,
                failed_syncs: Vec::new(),
                message: "ok".to_string(),
            }),
        }
    }
}
