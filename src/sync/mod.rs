//! Sync engine: delivers pending submissions to the remote sink and
//! reconciles the per-item results back into the store.
//!
//! Delivery is at-least-once; the sink treats a repeated submission id as
//! already satisfied, so a crash between delivery and reconciliation is
//! repaired by the next attempt. At most one sync runs per process at a
//! time, guarded by an atomic in-flight flag.

mod retry;
mod sink;

pub use retry::RetryPolicy;
pub use sink::{FailedSync, HttpSink, RemoteSink, SinkResponse, TransportError};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use crate::logging;
use crate::scheduler::Connectivity;
use crate::submissions::{
    StatusUpdate, Submission, SubmissionError, SubmissionRepository, SyncState,
};

/// What caused a sync attempt. Carried through for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Startup,
    Reconnect,
    Interval,
    AfterSubmit,
    Manual,
}

impl SyncTrigger {
    fn as_str(self) -> &'static str {
        match self {
            SyncTrigger::Startup => "startup",
            SyncTrigger::Reconnect => "reconnect",
            SyncTrigger::Interval => "interval",
            SyncTrigger::AfterSubmit => "after-submit",
            SyncTrigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sync attempt returned without touching the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another sync is already in flight in this process.
    InProgress,
    /// The device is offline; no network attempt was made.
    Offline,
}

/// Result of one sync attempt.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The batch was delivered and reconciled (possibly empty).
    Completed {
        synced_count: usize,
        synced_ids: Vec<String>,
        failed_count: usize,
    },
    /// The attempt was skipped before any network activity.
    Skipped(SkipReason),
    /// The sink was unreachable; candidates are untouched and remain
    /// eligible for the next attempt.
    TransportFailed(TransportError),
    /// The local store failed while selecting or updating records.
    StoreFailed(SubmissionError),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }

    pub fn synced_count(&self) -> usize {
        match self {
            SyncOutcome::Completed { synced_count, .. } => *synced_count,
            _ => 0,
        }
    }
}

/// Delivers eligible submissions to the remote sink in one batch per
/// attempt, then applies the per-item results.
///
/// Constructed once per process and shared by handle; the in-flight guard
/// and timers live here rather than in module globals so independent
/// instances (tests in particular) never share state.
pub struct SyncEngine<S: RemoteSink> {
    repo: Arc<SubmissionRepository>,
    sink: Arc<S>,
    connectivity: Connectivity,
    policy: RetryPolicy,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag on every exit path, panics included.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: RemoteSink> SyncEngine<S> {
    pub fn new(
        repo: Arc<SubmissionRepository>,
        sink: Arc<S>,
        connectivity: Connectivity,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            sink,
            connectivity,
            policy,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Run one sync attempt.
    ///
    /// Returns immediately without network activity when a sync is already
    /// in flight or the device is offline. Otherwise selects the eligible
    /// submissions, delivers them as a single batch, and writes the
    /// per-item results back. A transport failure leaves every candidate
    /// untouched - only explicit per-item rejections move retry counters.
    pub async fn sync_once(&self, trigger: SyncTrigger) -> SyncOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            logging::debug!(trigger = %trigger, "sync skipped: already in progress");
            return SyncOutcome::Skipped(SkipReason::InProgress);
        };

        if !self.connectivity.is_online() {
            logging::debug!(trigger = %trigger, "sync skipped: device offline");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        let submissions = match self.repo.get_all() {
            Ok(subs) => subs,
            Err(e) => {
                logging::error!(trigger = %trigger, error = %e, "sync aborted: store unavailable");
                return SyncOutcome::StoreFailed(e);
            }
        };

        let now = Utc::now();
        let candidates: Vec<Submission> = submissions
            .into_iter()
            .filter(|sub| self.is_candidate(sub, trigger, now))
            .collect();

        if candidates.is_empty() {
            logging::debug!(trigger = %trigger, "nothing to sync");
            return SyncOutcome::Completed {
                synced_count: 0,
                synced_ids: Vec::new(),
                failed_count: 0,
            };
        }

        logging::info!(trigger = %trigger, count = candidates.len(), "delivering submission batch");

        let response = match self.sink.deliver(&candidates).await {
            Ok(response) => response,
            Err(e) => {
                logging::warn!(trigger = %trigger, error = %e, "batch delivery failed at transport level");
                return SyncOutcome::TransportFailed(e);
            }
        };

        self.reconcile(&response)
    }

    /// Candidate selection: `complete`+`pending` always; `failed` when its
    /// backoff window has elapsed, or unconditionally for a manual trigger
    /// (the explicit user-driven retry that rescues records past the
    /// automatic ceiling).
    fn is_candidate(
        &self,
        submission: &Submission,
        trigger: SyncTrigger,
        now: chrono::DateTime<Utc>,
    ) -> bool {
        if submission.is_pending() {
            return true;
        }
        if submission.synced == SyncState::Failed {
            return match trigger {
                SyncTrigger::Manual => true,
                _ => self.policy.eligible(submission, now),
            };
        }
        false
    }

    /// Apply the sink's per-item verdicts to the local records.
    fn reconcile(&self, response: &SinkResponse) -> SyncOutcome {
        let now = Utc::now();
        let mut synced_ids = Vec::with_capacity(response.synced_ids.len());

        for id in &response.synced_ids {
            match self.repo.update_status(id, StatusUpdate::delivered(now)) {
                Ok(_) => synced_ids.push(id.clone()),
                Err(_e) => {
                    // The sink acknowledged an id we no longer hold; nothing
                    // to reconcile for it.
                    logging::warn!(id = %id, error = %_e, "could not mark submission synced");
                }
            }
        }

        let mut failed_count = 0;
        for failed in &response.failed_syncs {
            match self.repo.update_status(
                &failed.submission_id,
                StatusUpdate::rejected(failed.error.clone(), now),
            ) {
                Ok(_sub) => {
                    failed_count += 1;
                    logging::warn!(
                        id = %failed.submission_id,
                        error = %failed.error,
                        retry_count = _sub.retry_count,
                        "submission rejected by sink"
                    );
                }
                Err(_e) => {
                    logging::warn!(id = %failed.submission_id, error = %_e, "could not mark submission failed");
                }
            }
        }

        logging::info!(
            synced = synced_ids.len(),
            failed = failed_count,
            "sync reconciled"
        );

        SyncOutcome::Completed {
            synced_count: synced_ids.len(),
            synced_ids,
            failed_count,
        }
    }
}
