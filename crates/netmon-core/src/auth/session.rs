use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::Credentials;
use crate::error::{Result, SessionError};

/// Form body of the password grant.
/// Encoded with `serde_urlencoded` and sent as a raw string body.
#[derive(Serialize)]
pub(crate) struct TokenRequest<'a> {
    grant_type: &'a str,
    username: &'a str,
    password: &'a str,
}

impl<'a> TokenRequest<'a> {
    pub(crate) fn password_grant(credentials: &'a Credentials) -> Self {
        Self {
            grant_type: "password",
            username: credentials.username(),
            password: credentials.password(),
        }
    }
}

/// Token endpoint response as received. Every field is optional so that
/// missing fields can be reported together instead of as a serde error.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    token_type: Option<String>,
    access_token: Option<String>,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

/// A token response with all required fields present.
#[derive(Debug, Clone)]
pub(crate) struct TokenGrant {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_grant(self) -> Result<TokenGrant> {
        let mut missing = Vec::new();
        if self.token_type.as_deref().map_or(true, str::is_empty) {
            missing.push("token_type");
        }
        if self.access_token.as_deref().map_or(true, str::is_empty) {
            missing.push("access_token");
        }
        if self.expires_in.is_none() {
            missing.push("expires_in");
        }

        match (self.token_type, self.access_token, self.expires_in) {
            (Some(token_type), Some(access_token), Some(expires_in)) if missing.is_empty() => {
                Ok(TokenGrant {
                    token_type,
                    access_token,
                    expires_in,
                    refresh_token: self.refresh_token,
                })
            }
            _ => Err(SessionError::IncompleteToken { missing }),
        }
    }
}

/// Authenticated state of one connection.
///
/// Built only from a complete `TokenGrant`, so the `Authorization` header
/// always matches `expiry`.
#[derive(Clone)]
pub struct SessionData {
    pub base_uri: String,
    pub token_uri: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
    pub refresh_token: Option<String>,
    headers: HeaderMap,
    credentials: Option<Credentials>,
}

impl SessionData {
    pub(crate) fn new(
        base_uri: String,
        token_uri: String,
        credentials: Credentials,
        grant: TokenGrant,
        retain_credentials: bool,
    ) -> Result<Self> {
        let issued_at = Utc::now();
        let headers = Self::bearer_headers(&token_uri, &grant)?;
        Ok(Self {
            base_uri,
            token_uri,
            username: credentials.username().to_string(),
            issued_at,
            expiry: expiry_from(issued_at, grant.expires_in),
            refresh_token: grant.refresh_token,
            headers,
            credentials: retain_credentials.then_some(credentials),
        })
    }

    /// Replace the token with a freshly granted one, keeping the target
    /// and retained credentials.
    pub(crate) fn renewed(&self, grant: TokenGrant) -> Result<Self> {
        let issued_at = Utc::now();
        let headers = Self::bearer_headers(&self.token_uri, &grant)?;
        Ok(Self {
            base_uri: self.base_uri.clone(),
            token_uri: self.token_uri.clone(),
            username: self.username.clone(),
            issued_at,
            expiry: expiry_from(issued_at, grant.expires_in),
            refresh_token: grant.refresh_token,
            headers,
            credentials: self.credentials.clone(),
        })
    }

    fn bearer_headers(token_uri: &str, grant: &TokenGrant) -> Result<HeaderMap> {
        let value = format!("{} {}", grant.token_type, grant.access_token);
        let mut authorization =
            HeaderValue::from_str(&value).map_err(|e| SessionError::InvalidTokenResponse {
                uri: token_uri.to_string(),
                message: format!("token is not a valid header value: {}", e),
            })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expiry - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("base_uri", &self.base_uri)
            .field("token_uri", &self.token_uri)
            .field("username", &self.username)
            .field("issued_at", &self.issued_at)
            .field("expiry", &self.expiry)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("retains_credentials", &self.credentials.is_some())
            .finish()
    }
}

/// `issued_at + expires_in`, saturating instead of overflowing on absurd lifetimes.
fn expiry_from(issued_at: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
    let lifetime = i64::try_from(expires_in)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);
    issued_at
        .checked_add_signed(lifetime)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
