//! HTTP request handlers for the hookbench API.
//!
//! - `callback` - the GET/POST endpoint callers are pointed at
//! - `logs` - listing and clearing the callback log
//! - `page` - static test page
//! - `health` - storage health probe
//!
//! Error bodies share the `{"error": {"code", "message"}}` shape from
//! `error`, except the callback endpoint, which answers callers in plain
//! text.

pub mod callback;
pub mod error;
pub mod health;
pub mod logs;
pub mod page;

pub use callback::callback;
pub use health::health_check;
pub use logs::{clear_logs, list_logs, list_recent_logs};
pub use page::test_page;
