//! Anonymous device identity.
//!
//! Every submission is attributed to a stable anonymous identifier for the
//! current device. The identifier is a UUID v4 generated on first use,
//! persisted in the store's metadata partition, and immutable thereafter.
//! No network calls are involved.

use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use crate::logging;
use crate::store::{LocalStore, StoreError};

const USER_ID_KEY: &str = "user_id";

/// Produces and persists the anonymous identifier for this device.
pub struct IdentityProvider {
    store: Arc<LocalStore>,
    cached: OnceLock<String>,
}

impl IdentityProvider {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            cached: OnceLock::new(),
        }
    }

    /// Return the persisted identifier, generating and persisting a fresh
    /// UUID v4 if none exists yet.
    ///
    /// Idempotent after first creation: repeated calls return the identical
    /// string and perform no further writes.
    pub fn user_id(&self) -> Result<String, StoreError> {
        if let Some(id) = self.cached.get() {
            return Ok(id.clone());
        }

        let id = match self.store.get_meta(USER_ID_KEY)? {
            Some(existing) => existing,
            None => {
                let fresh = Uuid::new_v4().to_string();
                self.store.put_meta(USER_ID_KEY, &fresh)?;
                logging::info!(user_id = %fresh, "created anonymous identity");
                fresh
            }
        };

        // Within this provider the first resolved id wins the cache. Two
        // providers racing the very first creation may each cache their own
        // id while last-write-wins settles the persisted one; a single
        // provider per process never hits this.
        Ok(self.cached.get_or_init(|| id).clone())
    }
}
