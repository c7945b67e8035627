//! Offline-first persistence and sync engine for civic-service form
//! submissions.
//!
//! Form data is captured and durably stored locally the moment the user
//! finishes a form, then delivered to a remote sink whenever connectivity
//! allows. Delivery is at-least-once against an idempotent sink, retried
//! with a bounded backoff schedule; local and remote state reconcile
//! without duplication or loss.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use formsync::prelude::*;
//!
//! let config = SyncConfig::default();
//! let store = Arc::new(LocalStore::open(".formsync".as_ref())?);
//! let identity = Arc::new(IdentityProvider::new(Arc::clone(&store)));
//! let drafts = Arc::new(DraftManager::new(Arc::clone(&store), config.draft_debounce()));
//! let repo = Arc::new(SubmissionRepository::new(store, identity, Arc::clone(&drafts)));
//!
//! let connectivity = Connectivity::new(true);
//! let sink = Arc::new(HttpSink::new(&config.api_url, config.request_timeout())?);
//! let engine = Arc::new(SyncEngine::new(
//!     Arc::clone(&repo),
//!     sink,
//!     connectivity.clone(),
//!     config.retry_policy(),
//! ));
//!
//! let scheduler = AutoSyncScheduler::new(engine, connectivity, config.schedule());
//! scheduler.start();
//!
//! // As the user types:
//! // drafts.record_edit("permit", form_data);
//! // On submit:
//! // let id = repo.create(&schema, form_data)?;
//! // scheduler.sync_after_submit();
//! ```

pub mod config;
pub mod drafts;
pub mod fetch;
pub mod identity;
mod logging;
pub mod prelude;
pub mod scheduler;
pub mod schemas;
pub mod store;
pub mod submissions;
pub mod sync;

pub use config::{ConfigError, SyncConfig};
pub use drafts::{Draft, DraftManager};
pub use identity::IdentityProvider;
pub use scheduler::{AutoSyncScheduler, Connectivity, ScheduleConfig};
pub use fetch::{FetchError, Fetched, SchemaClient};
pub use schemas::{FieldDef, FormSchema, FormSummary, FormsList, SchemaCache, SchemaError};
pub use store::{LocalStore, Partition, StoreError};
pub use submissions::{
    StatusUpdate, Submission, SubmissionError, SubmissionRepository, SubmissionStatus, SyncState,
};
pub use sync::{
    FailedSync, HttpSink, RemoteSink, RetryPolicy, SinkResponse, SkipReason, SyncEngine,
    SyncOutcome, SyncTrigger, TransportError,
};
