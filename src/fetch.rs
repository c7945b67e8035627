//! Read-through schema fetching.
//!
//! Retrieves form schemas and the forms list from the remote schema source,
//! caching every success for offline use and falling back to the cache when
//! the source is unreachable. The submission core itself never fetches;
//! it only consumes parsed [`FormSchema`] values.

use std::time::Duration;

use thiserror::Error;

use crate::logging;
use crate::scheduler::Connectivity;
use crate::schemas::{FormSchema, FormsList, SchemaCache, SchemaError};

const MAX_FETCH_RETRIES: u32 = 3;
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A definitive client error (404, 400, ...) will not heal on retry; only
/// transport-level failures and server errors are worth more attempts.
fn is_transient(status: Option<reqwest::StatusCode>) -> bool {
    !status.is_some_and(|s| s.is_client_error())
}

/// Errors from the schema fetch layer.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("schema source unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("offline and no cached copy of {0}")]
    NotCached(String),
}

/// A fetched value, tagged with whether it came from the network or the
/// local cache.
#[derive(Debug, Clone)]
pub enum Fetched<T> {
    Fresh(T),
    Cached(T),
}

impl<T> Fetched<T> {
    pub fn into_inner(self) -> T {
        match self {
            Fetched::Fresh(value) | Fetched::Cached(value) => value,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Fetched::Cached(_))
    }
}

/// Client for the remote schema source with cache fallback.
pub struct SchemaClient {
    http: reqwest::Client,
    base_url: String,
    cache: SchemaCache,
    connectivity: Connectivity,
}

impl SchemaClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        cache: SchemaCache,
        connectivity: Connectivity,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            connectivity,
        })
    }

    /// Fetch one form's schema (`GET /forms/:id`), retrying transient
    /// failures with a growing delay, then falling back to the cache.
    /// While offline the cache is consulted directly.
    pub async fn form_schema(&self, form_id: &str) -> Result<Fetched<FormSchema>, FetchError> {
        if !self.connectivity.is_online() {
            return self.cached_schema(form_id);
        }

        let url = format!("{}/forms/{}", self.base_url, form_id);
        match self.fetch_json_with_retry(&url).await {
            Ok(value) => {
                let schema = FormSchema::parse(value)?;
                self.cache.save(&schema)?;
                Ok(Fetched::Fresh(schema))
            }
            Err(e) => {
                logging::warn!(form_id = form_id, error = %e, "schema fetch failed, trying cache");
                self.cached_schema(form_id).map_err(|_| e)
            }
        }
    }

    /// Fetch the forms list (`GET /forms`) with the same retry and cache
    /// fallback behavior.
    pub async fn forms_list(&self) -> Result<Fetched<FormsList>, FetchError> {
        if !self.connectivity.is_online() {
            return self.cached_list();
        }

        let url = format!("{}/forms", self.base_url);
        match self.fetch_json_with_retry(&url).await {
            Ok(value) => {
                let list = FormsList::parse(value)?;
                self.cache.save_list(&list)?;
                Ok(Fetched::Fresh(list))
            }
            Err(e) => {
                logging::warn!(error = %e, "forms list fetch failed, trying cache");
                self.cached_list().map_err(|_| e)
            }
        }
    }

    async fn fetch_json_with_retry(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_json(url).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < MAX_FETCH_RETRIES && is_transient(e.status()) => {
                    attempt += 1;
                    logging::debug!(url = url, attempt = attempt, error = %e, "retrying fetch");
                    tokio::time::sleep(FETCH_RETRY_DELAY * attempt).await;
                }
                Err(e) => return Err(FetchError::Transport(e)),
            }
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, reqwest::Error> {
        self.http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    fn cached_schema(&self, form_id: &str) -> Result<Fetched<FormSchema>, FetchError> {
        match self.cache.get(form_id)? {
            Some(schema) => Ok(Fetched::Cached(schema)),
            None => Err(FetchError::NotCached(format!("schema '{}'", form_id))),
        }
    }

    fn cached_list(&self) -> Result<Fetched<FormsList>, FetchError> {
        match self.cache.get_list()? {
            Some(list) => Ok(Fetched::Cached(list)),
            None => Err(FetchError::NotCached("forms list".to_string())),
        }
    }
}
