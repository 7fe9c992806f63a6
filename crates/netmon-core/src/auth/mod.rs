//! Authentication module for the monitoring server's OAuth2 password grant.
//!
//! This module provides:
//! - `SessionManager`: token acquisition, expiry tracking and renewal
//! - `SessionData`: the bearer header set and expiry of one connection
//! - `CredentialResolver` / `Prompt`: credential acquisition, kept apart from the session
//! - `CredentialStore`: Secure OS-level credential storage via keyring
//!
//! Session state lives in memory only and is dropped with the manager.

pub mod credentials;
pub mod manager;
pub mod session;

pub use credentials::{CredentialResolver, CredentialStore, Credentials, Prompt};
pub use manager::{ConnectTarget, ConnectionResult, Protocol, SessionManager, SessionOptions};
pub use session::SessionData;
