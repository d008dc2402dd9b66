//! Core domain types for the hookbench callback service.
//!
//! Holds the log record model, the form payload type, the error taxonomy,
//! the clock abstraction, the log storage layer, and the access filter. The
//! API and forwarding crates build on these types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod error;
pub mod form;
pub mod models;
pub mod storage;
pub mod time;

pub use access::AccessFilter;
pub use error::{CoreError, HookError, Result};
pub use form::FormData;
pub use models::{CallbackMethod, LogId, LogRecord};
pub use storage::{LogStore, MemoryLogStore, SqliteLogStore};
pub use time::{Clock, RealClock, TestClock};
