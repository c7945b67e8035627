//! Backoff policy for failed submissions.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::submissions::{Submission, SyncState};

/// Decides when a failed submission becomes retry-eligible again.
///
/// The schedule is indexed by the record's retry count; past its end the
/// last delay is reused. Once the count reaches the ceiling the record is
/// no longer auto-retried and waits for an explicit user-triggered sync.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
    max_auto_retries: u32,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>, max_auto_retries: u32) -> Self {
        Self {
            delays,
            max_auto_retries,
        }
    }

    pub fn max_auto_retries(&self) -> u32 {
        self.max_auto_retries
    }

    /// Whether a failed record may be included in an automatic sync attempt
    /// at time `now`.
    pub fn eligible(&self, submission: &Submission, now: DateTime<Utc>) -> bool {
        if submission.synced != SyncState::Failed {
            return false;
        }
        if submission.retry_count >= self.max_auto_retries {
            return false;
        }
        match submission.last_sync_attempt {
            // No recorded attempt: retry immediately.
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last);
                elapsed >= self.delay_for(submission.retry_count)
            }
        }
    }

    /// When a failed record next becomes retry-eligible, for passive UI
    /// surfacing. `None` for records that are not failed or have exhausted
    /// automatic retries.
    pub fn next_retry_at(&self, submission: &Submission) -> Option<DateTime<Utc>> {
        if submission.synced != SyncState::Failed
            || submission.retry_count >= self.max_auto_retries
        {
            return None;
        }
        match submission.last_sync_attempt {
            None => Some(Utc::now()),
            Some(last) => Some(last + self.delay_for(submission.retry_count)),
        }
    }

    fn delay_for(&self, retry_count: u32) -> chrono::Duration {
        let delay = self
            .delays
            .get(retry_count as usize)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO);
        chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX)
    }
}

impl Default for RetryPolicy {
    /// 1 min, 5 min, 15 min; three automatic attempts.
    fn default() -> Self {
        Self::new(
            vec![
                Duration::from_secs(60),
                Duration::from_secs(300),
                Duration::from_secs(900),
            ],
            3,
        )
    }
}
