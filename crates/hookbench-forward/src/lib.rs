//! Outbound HTTP for hookbench.
//!
//! Two independent paths leave the service:
//!
//! - **Forwarding**: after a POST has been logged and answered, its decoded
//!   form is re-encoded and sent to a configured destination by a background
//!   worker. The delivery outcome is written back onto the log record.
//! - **Redirect relaying**: when enabled, a non-local caller's request is
//!   relayed synchronously to another URL and the upstream response is
//!   returned verbatim instead of being handled locally.
//!
//! Neither path retries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod encode;
pub mod error;
pub mod forwarder;
pub mod proxy;

pub use client::{forwardable_headers, ClientConfig, ForwardClient};
pub use encode::encode_first_values;
pub use error::{ForwardError, Result};
pub use forwarder::{outcome_text, ForwardJob, Forwarder};
pub use proxy::{RedirectProxy, RelayedResponse};

/// Default outbound request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
