//! Durable submission records and their repository.
//!
//! A submission is the unit of durable work: it is written locally the
//! moment the user finishes a form and carries its own delivery state
//! (`pending`/`synced`/`failed`) plus the retry bookkeeping the sync engine
//! needs. Exactly one record exists per generated id; the store key equals
//! the id.

mod error;
mod record;
mod repo;

pub use error::SubmissionError;
pub use record::{StatusUpdate, Submission, SubmissionStatus, SyncState};
pub use repo::SubmissionRepository;
