//! Submission record types.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of the submission itself.
///
/// The engine currently only produces [`SubmissionStatus::Complete`] (the
/// user finished filling the form); the variant set is open for future
/// expansion (e.g. partially filled drafts promoted to submissions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Complete,
}

/// Delivery state of a submission.
///
/// Transitions: `pending -> {synced, failed}`, `failed -> {synced, failed}`.
/// `Synced` is terminal; no further delivery attempts are made for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Synced,
    Failed,
}

/// A durable form submission - the unit of durable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Unique id, generated client-side as `{form_id}-{timestamp}-{random}`.
    pub id: String,

    /// Anonymous device identifier of the submitter.
    pub user_id: String,

    // Form metadata, denormalized from the schema at submit time so the
    // record stays self-describing even if the schema cache is evicted.
    pub form_id: String,
    pub form_title: String,
    #[serde(default)]
    pub form_description: String,

    /// The user's responses, in field order.
    pub form_data: IndexMap<String, String>,

    pub status: SubmissionStatus,
    pub synced: SyncState,

    /// Creation timestamp. Immutable.
    pub submitted_at: DateTime<Utc>,

    /// Set on the first successful delivery, never overwritten.
    pub synced_at: Option<DateTime<Utc>>,

    /// Number of explicit per-item rejections from the remote sink.
    /// Never decreases; transport-level failures do not touch it.
    pub retry_count: u32,

    pub last_sync_attempt: Option<DateTime<Utc>>,

    /// Last failure reason reported by the remote sink.
    pub sync_error: Option<String>,
}

impl Submission {
    /// True if this record is eligible for first delivery.
    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Complete && self.synced == SyncState::Pending
    }
}

/// Generate a submission id: `{form_id}-{unix_millis}-{random}`.
///
/// The random suffix guarantees that two submissions created from identical
/// input (even within the same millisecond) never collide.
pub(crate) fn generate_submission_id(form_id: &str, now: DateTime<Utc>) -> String {
    let random: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("{}-{}-{}", form_id, now.timestamp_millis(), random)
}

/// Partial update applied to a submission's delivery state.
///
/// Only the sync engine constructs these; nothing else transitions `synced`
/// or touches the retry bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub synced: Option<SyncState>,
    pub synced_at: Option<DateTime<Utc>>,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub sync_error: Option<Option<String>>,
    pub increment_retry: bool,
}

impl StatusUpdate {
    /// Update for a submission the sink acknowledged as delivered.
    pub fn delivered(at: DateTime<Utc>) -> Self {
        Self {
            synced: Some(SyncState::Synced),
            synced_at: Some(at),
            sync_error: Some(None),
            ..Self::default()
        }
    }

    /// Update for a submission the sink explicitly rejected.
    pub fn rejected(error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            synced: Some(SyncState::Failed),
            last_sync_attempt: Some(at),
            sync_error: Some(Some(error.into())),
            increment_retry: true,
            ..Self::default()
        }
    }

    /// Merge this update into a submission record.
    pub(crate) fn apply(self, submission: &mut Submission) {
        if let Some(synced) = self.synced {
            submission.synced = synced;
        }
        if let Some(at) = self.synced_at {
            // First successful delivery wins; a redundant success report from
            // an idempotent re-delivery must not move the timestamp.
            if submission.synced_at.is_none() {
                submission.synced_at = Some(at);
            }
        }
        if let Some(at) = self.last_sync_attempt {
            submission.last_sync_attempt = Some(at);
        }
        if let Some(error) = self.sync_error {
            submission.sync_error = error;
        }
        if self.increment_retry {
            submission.retry_count += 1;
        }
    }
}
