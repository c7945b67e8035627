//! Convenient re-exports for common usage patterns.
//!
//! This module provides a single import to bring all commonly used types
//! into scope.
//!
//! # Example
//!
//! ```ignore
//! use formsync::prelude::*;
//!
//! let store = Arc::new(LocalStore::open(".formsync".as_ref())?);
//! let id = repo.create(&schema, form_data)?;
//! ```

// Configuration
pub use crate::config::{ConfigError, SyncConfig};

// Storage and identity
pub use crate::identity::IdentityProvider;
pub use crate::store::{LocalStore, Partition, StoreError};

// Schemas and drafts
pub use crate::drafts::{Draft, DraftManager};
pub use crate::fetch::{FetchError, Fetched, SchemaClient};
pub use crate::schemas::{FieldDef, FormSchema, FormSummary, FormsList, SchemaCache, SchemaError};

// Submissions
pub use crate::submissions::{
    StatusUpdate, Submission, SubmissionError, SubmissionRepository, SubmissionStatus, SyncState,
};

// Sync engine and scheduling
pub use crate::scheduler::{AutoSyncScheduler, Connectivity, ScheduleConfig};
pub use crate::sync::{
    FailedSync, HttpSink, RemoteSink, RetryPolicy, SinkResponse, SkipReason, SyncEngine,
    SyncOutcome, SyncTrigger, TransportError,
};
