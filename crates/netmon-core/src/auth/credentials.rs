use std::fmt;

use anyhow::{Context, Result};
use keyring::Entry;

const SERVICE_NAME: &str = "netmon";

/// Username/password pair for the password grant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of interactively supplied credential parts.
pub trait Prompt {
    fn username(&mut self) -> Result<String>;
    fn password(&mut self, username: &str) -> Result<String>;
}

/// Turns whatever the caller already knows into complete `Credentials`,
/// asking the prompt only for the missing parts.
///
/// Priority: a full credential object, then an explicit username (prompt
/// for the password), then an explicit password (prompt for the username),
/// then prompt for both.
#[derive(Debug, Default, Clone)]
pub struct CredentialResolver {
    credentials: Option<Credentials>,
    username: Option<String>,
    password: Option<String>,
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    pub fn password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn resolve(self, prompt: &mut dyn Prompt) -> Result<Credentials> {
        let credentials = match (self.credentials, self.username, self.password) {
            (Some(credentials), _, _) => credentials,
            (None, Some(username), Some(password)) => Credentials::new(username, password),
            (None, Some(username), None) => {
                let password = prompt.password(&username)?;
                Credentials::new(username, password)
            }
            (None, None, Some(password)) => Credentials::new(prompt.username()?, password),
            (None, None, None) => {
                let username = prompt.username()?;
                let password = prompt.password(&username)?;
                Credentials::new(username, password)
            }
        };

        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(anyhow::anyhow!("Username and password required"));
        }
        Ok(credentials)
    }
}

/// OS keychain storage for passwords, keyed by username and server.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(username: &str, server: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &Self::account(username, server))
            .context("Failed to create keyring entry")
    }

    fn account(username: &str, server: &str) -> String {
        format!("{}@{}", username, server)
    }

    /// Store a password in the OS keychain
    pub fn store(username: &str, server: &str, password: &str) -> Result<()> {
        Self::entry(username, server)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve the password for a username on a server from the OS keychain
    pub fn get_password(username: &str, server: &str) -> Result<String> {
        Self::entry(username, server)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete stored credentials for a username on a server
    pub fn delete(username: &str, server: &str) -> Result<()> {
        Self::entry(username, server)?
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    /// Check if credentials exist for a username on a server
    pub fn has_credentials(username: &str, server: &str) -> bool {
        Self::entry(username, server)
            .and_then(|entry| entry.get_password().map_err(Into::into))
            .is_ok()
    }
}
