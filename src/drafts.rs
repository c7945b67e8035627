//! Draft autosave.
//!
//! Captures in-progress form edits and persists them with a debounce so
//! rapid typing coalesces into a single write. Drafts are keyed
//! `draft_{form_id}` in the forms partition: at most one draft per form per
//! device, overwritten on every autosave and deleted once the form is
//! submitted. Draft persistence is best-effort - a failed write is logged
//! and silently retried on the next edit, never surfaced to the user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::logging;
use crate::store::{LocalStore, Partition, StoreError};

const DRAFT_KEY_PREFIX: &str = "draft_";

fn draft_key(form_id: &str) -> String {
    format!("{}{}", DRAFT_KEY_PREFIX, form_id)
}

/// An in-progress form, restored when the user returns to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub form_id: String,
    pub form_data: IndexMap<String, String>,
    pub saved_at: DateTime<Utc>,
}

/// Debounced autosave of in-progress form edits.
pub struct DraftManager {
    store: Arc<LocalStore>,
    window: Duration,
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl DraftManager {
    /// Create a manager with the given debounce window.
    ///
    /// Must be constructed inside a tokio runtime; autosaves are spawned
    /// tasks that fire after the window of inactivity.
    pub fn new(store: Arc<LocalStore>, window: Duration) -> Self {
        Self {
            store,
            window,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an edit to a form, scheduling a debounced save of the full
    /// current form data.
    ///
    /// Edits arriving within the debounce window replace the scheduled save,
    /// so only the last state in the window is persisted. Never blocks and
    /// never fails; a storage error at save time is logged and swallowed.
    pub fn record_edit(&self, form_id: &str, form_data: IndexMap<String, String>) {
        let store = Arc::clone(&self.store);
        let window = self.window;
        let form = form_id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let draft = Draft {
                form_id: form.clone(),
                form_data,
                saved_at: Utc::now(),
            };
            if let Err(_e) = store.put(Partition::Forms, &draft_key(&form), &draft) {
                // Non-fatal: the next edit schedules another save.
                logging::warn!(form_id = %form, error = %_e, "draft autosave failed");
            } else {
                logging::debug!(form_id = %form, "draft autosaved");
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.insert(form_id.to_string(), handle) {
                previous.abort();
            }
        }
    }

    /// Load the saved draft for a form, if any.
    pub fn load(&self, form_id: &str) -> Result<Option<Draft>, StoreError> {
        self.store.get(Partition::Forms, &draft_key(form_id))
    }

    /// Delete the draft for a form and cancel any save still pending for it.
    ///
    /// Called after a successful submission so a stale draft never
    /// resurrects completed work. Idempotent.
    pub fn clear(&self, form_id: &str) -> Result<(), StoreError> {
        self.cancel(form_id);
        self.store.delete(Partition::Forms, &draft_key(form_id))
    }

    /// Cancel a pending autosave for one form. No-op if none is scheduled
    /// or the timer already fired.
    pub fn cancel(&self, form_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.remove(form_id) {
                handle.abort();
            }
        }
    }

    /// Cancel every pending autosave. Safe to call from any state.
    pub fn cancel_all(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            for (_, handle) in pending.drain() {
                handle.abort();
            }
        }
    }
}

impl Drop for DraftManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
