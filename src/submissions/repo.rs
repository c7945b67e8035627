//! Submission repository.

use std::sync::Arc;

use chrono::Utc;

use crate::drafts::DraftManager;
use crate::identity::IdentityProvider;
use crate::logging;
use crate::schemas::FormSchema;
use crate::store::{LocalStore, Partition};

use super::error::SubmissionError;
use super::record::{
    generate_submission_id, StatusUpdate, Submission, SubmissionStatus, SyncState,
};

/// Creates, reads, updates and deletes submission records, enforcing the
/// delivery-state machine along the way.
///
/// `synced` only moves through [`update_status`](Self::update_status), and
/// only the sync engine calls it; everything else treats records as
/// read-only once written.
pub struct SubmissionRepository {
    store: Arc<LocalStore>,
    identity: Arc<IdentityProvider>,
    drafts: Arc<DraftManager>,
}

impl SubmissionRepository {
    pub fn new(
        store: Arc<LocalStore>,
        identity: Arc<IdentityProvider>,
        drafts: Arc<DraftManager>,
    ) -> Self {
        Self {
            store,
            identity,
            drafts,
        }
    }

    /// Create a new submission from a schema and the user's responses.
    ///
    /// Validates that the schema carries an id and title and that the form
    /// data is non-empty, rejecting with
    /// [`SubmissionError::InvalidInput`] before any write. On success the
    /// record is written `complete`/`pending` with a zero retry count, the
    /// form's draft is cleared, and the new id is returned.
    pub fn create(
        &self,
        schema: &FormSchema,
        form_data: indexmap::IndexMap<String, String>,
    ) -> Result<String, SubmissionError> {
        if schema.id.trim().is_empty() || schema.title.trim().is_empty() {
            return Err(SubmissionError::InvalidInput(
                "schema is missing id or title".to_string(),
            ));
        }
        if form_data.is_empty() {
            return Err(SubmissionError::InvalidInput(
                "form data is empty".to_string(),
            ));
        }

        let user_id = self.identity.user_id()?;
        let now = Utc::now();
        let id = generate_submission_id(&schema.id, now);

        let submission = Submission {
            id: id.clone(),
            user_id,
            form_id: schema.id.clone(),
            form_title: schema.title.clone(),
            form_description: schema.description.clone().unwrap_or_default(),
            form_data,
            status: SubmissionStatus::Complete,
            synced: SyncState::Pending,
            submitted_at: now,
            synced_at: None,
            retry_count: 0,
            last_sync_attempt: None,
            sync_error: None,
        };

        self.store.put(Partition::Submissions, &id, &submission)?;
        logging::info!(id = %id, form_id = %schema.id, "submission saved");

        // Completed work must never resurrect from a stale draft. A failure
        // here is non-fatal: the submission itself is already durable.
        if let Err(_e) = self.drafts.clear(&schema.id) {
            logging::warn!(form_id = %schema.id, error = %_e, "failed to clear draft after submit");
        }

        Ok(id)
    }

    /// Fetch a single submission by id.
    pub fn get(&self, id: &str) -> Result<Option<Submission>, SubmissionError> {
        Ok(self.store.get(Partition::Submissions, id)?)
    }

    /// All submissions for a user, newest first by submission time.
    pub fn get_all_for_user(&self, user_id: &str) -> Result<Vec<Submission>, SubmissionError> {
        let mut submissions: Vec<Submission> = self
            .store
            .get_all(Partition::Submissions)?
            .into_iter()
            .filter(|s: &Submission| s.user_id == user_id)
            .collect();
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }

    /// All submissions for the current device's user, newest first.
    pub fn get_all(&self) -> Result<Vec<Submission>, SubmissionError> {
        let user_id = self.identity.user_id()?;
        self.get_all_for_user(&user_id)
    }

    /// Merge a delivery-state update into an existing record.
    ///
    /// Fails with [`SubmissionError::NotFound`] if the id is absent. The
    /// retry counter only ever moves to previous value + 1, driven by the
    /// update's `increment_retry` flag.
    pub fn update_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<Submission, SubmissionError> {
        let mut submission: Submission = self
            .store
            .get(Partition::Submissions, id)?
            .ok_or_else(|| SubmissionError::NotFound(id.to_string()))?;

        update.apply(&mut submission);
        self.store.put(Partition::Submissions, id, &submission)?;
        logging::debug!(id = %id, synced = ?submission.synced, retry_count = submission.retry_count, "submission updated");

        Ok(submission)
    }

    /// Delete a submission. Deleting an absent id succeeds.
    pub fn delete(&self, id: &str) -> Result<(), SubmissionError> {
        self.store.delete(Partition::Submissions, id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::FieldDef;
    use indexmap::IndexMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn repo(dir: &TempDir) -> SubmissionRepository {
        let store = Arc::new(LocalStore::open(dir.path()).unwrap());
        let identity = Arc::new(IdentityProvider::new(Arc::clone(&store)));
        let drafts = Arc::new(DraftManager::new(
            Arc::clone(&store),
            Duration::from_millis(750),
        ));
        SubmissionRepository::new(store, identity, drafts)
    }

    fn schema() -> FormSchema {
        FormSchema {
            id: "permit".to_string(),
            title: "Permit Application".to_string(),
            description: None,
            fields: vec![FieldDef {
                key: "name".to_string(),
                label: "Name".to_string(),
                kind: "text".to_string(),
                required: true,
            }],
        }
    }

    fn form_data() -> IndexMap<String, String> {
        IndexMap::from([("name".to_string(), "Ann".to_string())])
    }

    #[tokio::test]
    async fn test_create_writes_pending_record() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        let id = repo.create(&schema(), form_data()).unwrap();
        let sub = repo.get(&id).unwrap().unwrap();

        assert_eq!(sub.status, SubmissionStatus::Complete);
        assert_eq!(sub.synced, SyncState::Pending);
        assert_eq!(sub.retry_count, 0);
        assert_eq!(sub.form_title, "Permit Application");
        assert!(sub.synced_at.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        let mut bad_schema = schema();
        bad_schema.title = String::new();
        assert!(matches!(
            repo.create(&bad_schema, form_data()),
            Err(SubmissionError::InvalidInput(_))
        ));

        assert!(matches!(
            repo.create(&schema(), IndexMap::new()),
            Err(SubmissionError::InvalidInput(_))
        ));

        // Nothing was written.
        assert!(repo.get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_identical_creates_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        let a = repo.create(&schema(), form_data()).unwrap();
        let b = repo.create(&schema(), form_data()).unwrap();
        assert_ne!(a, b);
        assert_eq!(repo.get_all().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_all_is_newest_first() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        let first = repo.create(&schema(), form_data()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = repo.create(&schema(), form_data()).unwrap();

        let all = repo.get_all().unwrap();
        assert_eq!(all.first().unwrap().id, second);
        assert_eq!(all.get(1).unwrap().id, first);
    }

    #[tokio::test]
    async fn test_update_status_not_found() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        assert!(matches!(
            repo.update_status("missing", StatusUpdate::delivered(Utc::now())),
            Err(SubmissionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);

        let id = repo.create(&schema(), form_data()).unwrap();
        repo.delete(&id).unwrap();
        repo.delete(&id).unwrap();
        assert!(repo.get(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_clears_draft() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalStore::open(dir.path()).unwrap());
        let identity = Arc::new(IdentityProvider::new(Arc::clone(&store)));
        let drafts = Arc::new(DraftManager::new(
            Arc::clone(&store),
            Duration::from_millis(750),
        ));
        let repo =
            SubmissionRepository::new(store, identity, Arc::clone(&drafts));

        // Simulate a persisted draft, then submit the form.
        drafts.record_edit("permit", form_data());
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(drafts.load("permit").unwrap().is_some());

        repo.create(&schema(), form_data()).unwrap();
        assert!(drafts.load("permit").unwrap().is_none());
    }
}
