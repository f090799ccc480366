//! # coview-store
//!
//! SQLite persistence for shares, invitations, comment threads, reactions,
//! the access log and simulation snapshots.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain
//! model. Callers that live on an async runtime are expected to run these
//! helpers on a blocking thread.

pub mod access_log;
pub mod comments;
pub mod database;
pub mod invitations;
pub mod migrations;
pub mod models;
pub mod reactions;
pub mod shares;
pub mod simulations;
pub mod thread;

mod error;
mod row;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use thread::Thread;
