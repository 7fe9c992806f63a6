//! Core library for netmon.
//!
//! Session lifecycle for a network monitoring server's REST API: OAuth2
//! password-grant token acquisition, expiry tracking and renewal, plus the
//! credential, configuration and request plumbing around it.
//!
//! ```ignore
//! use std::sync::Arc;
//! use netmon_core::auth::{ConnectTarget, Credentials, SessionManager};
//! use netmon_core::api::ApiClient;
//!
//! let manager = Arc::new(SessionManager::new()?);
//! let result = manager
//!     .connect(&ConnectTarget::new("nms.example"), Credentials::new("admin", "secret"))
//!     .await?;
//! println!("{result}");
//!
//! let api = ApiClient::new(manager.clone());
//! let devices: serde_json::Value = api.get("/api/v1/devices").await?;
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;

pub use error::{Result, SessionError};
