//! # coview-client
//!
//! Client side of shared simulation views: a typed HTTP client for the
//! Coview server, the continuation kept while a visitor signs in to accept
//! an invitation, and an outbox holding comments that could not be posted.

pub mod api;
pub mod continuation;
pub mod error;
pub mod outbox;

pub use api::ApiClient;
pub use continuation::{Continuation, ContinuationStore};
pub use error::ClientError;
pub use outbox::{CommentSink, FlushReport, Outbox, PendingComment, Submission, SyncState};
