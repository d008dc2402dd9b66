//! Log storage for received callbacks.
//!
//! Handlers and the forwarder only see the `LogStore` trait. Two
//! implementations share its semantics: `MemoryLogStore` for tests and
//! throwaway runs, and `SqliteLogStore` for a file-backed log that survives
//! restarts.
//!
//! Every operation is a single statement (or a single lock acquisition), so
//! an id returned by `append` is always visible to a later
//! `append_outcome`.

use std::{future::Future, pin::Pin};

pub mod log_records;
pub mod memory;

pub use log_records::{connect, connect_in_memory, migrate, SqliteLogStore};
pub use memory::MemoryLogStore;

use crate::{
    error::Result,
    models::{CallbackMethod, LogId, LogRecord},
};

/// Number of records returned by the "recent" listing.
pub const RECENT_LIMIT: usize = 10;

/// Storage operations for the callback log.
///
/// Listings are ordered newest first by timestamp, ties broken by id.
pub trait LogStore: Send + Sync + 'static {
    /// Inserts a record stamped with the current time.
    ///
    /// The store assigns and returns the identifier.
    fn append(
        &self,
        method: CallbackMethod,
        body: Option<String>,
    ) -> Pin<Box<dyn Future<Output = Result<LogId>> + Send + '_>>;

    /// Returns every record, newest first.
    fn list_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>>> + Send + '_>>;

    /// Returns at most `limit` records, newest first.
    ///
    /// Always a prefix of `list_all`.
    fn list_recent(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>>> + Send + '_>>;

    /// Deletes every record and returns how many were removed.
    fn clear_all(&self) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>>;

    /// Appends a forwarding outcome line to a record's body.
    ///
    /// Applied at most once per record. A record that no longer exists, or
    /// already carries an outcome, is left alone without error.
    fn append_outcome(
        &self,
        id: LogId,
        outcome: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Verifies the store can serve requests.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Joins an outcome onto an existing body.
pub(crate) fn with_outcome(body: Option<&str>, outcome: &str) -> String {
    match body {
        Some(body) => format!("{body}\n{outcome}"),
        None => outcome.to_string(),
    }
}
