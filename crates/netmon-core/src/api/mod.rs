//! REST API client module for the monitoring server.
//!
//! Requests carry the bearer header set of the current session, renewed
//! on demand by the `SessionManager`.

pub mod client;

pub use client::ApiClient;
