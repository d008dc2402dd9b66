//! HTTP middleware for request gating.
//!
//! Every request passes the access gate before routing reaches a handler.
//! The gate also records the caller's address for the handlers.

pub mod access;

pub use access::{access_gate, ClientAddr};
