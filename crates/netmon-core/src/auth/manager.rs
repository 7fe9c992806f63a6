//! Session lifecycle against the monitoring server's token endpoint.
//!
//! `SessionManager` owns the HTTP client and the in-memory session. A
//! session is created by `connect`, renewed in place by
//! `ensure_valid_session` once its token has expired, and cleared by
//! `disconnect`. Renewal always re-runs the full password grant; a
//! refresh token, when the server sends one, is recorded but not used.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::session::{SessionData, TokenGrant, TokenRequest, TokenResponse};
use super::Credentials;
use crate::error::{Result, SessionError};

// ============================================================================
// Constants
// ============================================================================

/// Default management port of the monitoring server
pub const DEFAULT_PORT: u16 = 9644;

/// Default token endpoint path appended to the base URI
pub const DEFAULT_TOKEN_PATH: &str = "/api/v1/token";

/// Timeout for the TCP reachability probe.
/// Short on purpose: it only tells a dead port from a live one.
const PROBE_TIMEOUT_MS: u64 = 500;

/// HTTP request timeout in seconds for the token endpoint and API calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(SessionError::InvalidProtocol(s.to_string())),
        }
    }
}

/// Where to connect: server, protocol, port and token path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub server: String,
    pub protocol: Protocol,
    pub port: u16,
    pub token_path: String,
}

impl ConnectTarget {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            protocol: Protocol::default(),
            port: DEFAULT_PORT,
            token_path: DEFAULT_TOKEN_PATH.to_string(),
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_token_path(mut self, token_path: impl Into<String>) -> Self {
        self.token_path = token_path.into();
        self
    }

    /// `protocol://server:port`, bracketing IPv6 literals.
    pub fn base_uri(&self) -> String {
        let host = match self.server.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{}]", v6),
            _ => self.server.clone(),
        };
        format!("{}://{}:{}", self.protocol, host, self.port)
    }

    pub fn token_uri(&self) -> String {
        let path = self.token_path.trim();
        if path.is_empty() || path.starts_with('/') {
            format!("{}{}", self.base_uri(), path)
        } else {
            format!("{}/{}", self.base_uri(), path)
        }
    }
}

/// Per-manager behavior. Nothing here is process-wide.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Accept invalid TLS certificates on this manager's client only.
    pub ignore_ssl_errors: bool,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    /// Keep credentials in memory so an expired token can be renewed.
    pub retain_credentials: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ignore_ssl_errors: false,
            probe_timeout: Duration::from_millis(PROBE_TIMEOUT_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retain_credentials: true,
        }
    }
}

/// Summary of a successful `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionResult {
    pub username: String,
    pub base_uri: String,
    pub expiry: DateTime<Utc>,
}

impl From<&SessionData> for ConnectionResult {
    fn from(data: &SessionData) -> Self {
        Self {
            username: data.username.clone(),
            base_uri: data.base_uri.clone(),
            expiry: data.expiry,
        }
    }
}

impl fmt::Display for ConnectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connected to {} as '{}'. Token expires {} UTC",
            self.base_uri,
            self.username,
            self.expiry.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

pub struct SessionManager {
    client: Client,
    options: SessionOptions,
    state: Mutex<Option<SessionData>>,
}

impl SessionManager {
    pub fn new() -> Result<Self> {
        Self::with_options(SessionOptions::default())
    }

    pub fn with_options(options: SessionOptions) -> Result<Self> {
        if options.ignore_ssl_errors {
            warn!("TLS certificate validation disabled for this session");
        }
        let client = Client::builder()
            .timeout(options.request_timeout)
            .danger_accept_invalid_certs(options.ignore_ssl_errors)
            .build()?;

        Ok(Self {
            client,
            options,
            state: Mutex::new(None),
        })
    }

    /// The HTTP client shared with API callers, carrying the same TLS settings.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Authenticate against `target` with already-resolved credentials.
    ///
    /// Resolves the host, probes the port, then runs the password grant.
    /// The session is only replaced once the whole exchange succeeded; on
    /// any error the previous session (if any) stays as it was.
    pub async fn connect(
        &self,
        target: &ConnectTarget,
        credentials: Credentials,
    ) -> Result<ConnectionResult> {
        if target.port == 0 {
            return Err(SessionError::InvalidPort);
        }

        let addrs = resolve(&target.server, target.port).await?;
        probe(&target.server, target.port, &addrs, self.options.probe_timeout).await?;

        let base_uri = target.base_uri();
        let token_uri = target.token_uri();
        info!(uri = %token_uri, username = credentials.username(), "Requesting access token");

        let grant = self.request_token(&token_uri, &credentials).await?;
        let data = SessionData::new(
            base_uri,
            token_uri,
            credentials,
            grant,
            self.options.retain_credentials,
        )?;
        let result = ConnectionResult::from(&data);

        *self.state.lock().await = Some(data);
        info!(base_uri = %result.base_uri, expiry = %result.expiry, "Session established");
        Ok(result)
    }

    /// Return the current bearer header set, renewing an expired token first.
    pub async fn ensure_valid_session(&self) -> Result<HeaderMap> {
        let (_, headers) = self.authorized_request_parts().await?;
        Ok(headers)
    }

    /// Base URI and bearer header set of one and the same session, renewing
    /// an expired token first.
    ///
    /// Both come from a single lock acquisition, so a concurrent `connect`
    /// to another target cannot pair this session's token with its URI.
    /// The lock is held across the renewal round-trip, so callers racing on
    /// an expired token trigger a single token request between them.
    pub async fn authorized_request_parts(&self) -> Result<(String, HeaderMap)> {
        let mut state = self.state.lock().await;
        let session = state.as_mut().ok_or(SessionError::NotConnected)?;

        if !session.is_expired() {
            return Ok((session.base_uri.clone(), session.headers().clone()));
        }

        let credentials = match session.credentials() {
            Some(credentials) => credentials.clone(),
            None => {
                warn!(expiry = %session.expiry, "Session expired without retained credentials");
                return Err(SessionError::SessionExpired {
                    expiry: session.expiry,
                });
            }
        };

        info!(expired_at = %session.expiry, "Access token expired, renewing");
        let grant = self.request_token(&session.token_uri, &credentials).await?;
        *session = session.renewed(grant)?;
        debug!(expiry = %session.expiry, "Access token renewed");

        Ok((session.base_uri.clone(), session.headers().clone()))
    }

    /// Drop the current session. Returns whether one existed.
    pub async fn disconnect(&self) -> bool {
        let had_session = self.state.lock().await.take().is_some();
        if had_session {
            info!("Session cleared");
        }
        had_session
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_some()
    }

    pub async fn base_uri(&self) -> Option<String> {
        self.state.lock().await.as_ref().map(|d| d.base_uri.clone())
    }

    pub async fn expiry(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.as_ref().map(|d| d.expiry)
    }

    pub async fn username(&self) -> Option<String> {
        self.state.lock().await.as_ref().map(|d| d.username.clone())
    }

    /// Refresh token from the last grant. Recorded only; renewal does not use it.
    pub async fn refresh_token(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .as_ref()
            .and_then(|d| d.refresh_token.clone())
    }

    /// Snapshot of the current session, if any.
    pub async fn session(&self) -> Option<SessionData> {
        self.state.lock().await.clone()
    }

    /// POST the password grant and validate the response.
    ///
    /// The body is form-encoded but sent with `Content-Type: application/json`,
    /// which is what the server's token endpoint expects.
    async fn request_token(&self, token_uri: &str, credentials: &Credentials) -> Result<TokenGrant> {
        let body = serde_urlencoded::to_string(TokenRequest::password_grant(credentials)).map_err(
            |e| SessionError::TokenRequest {
                uri: token_uri.to_string(),
                status: None,
                message: format!("Failed to encode credentials: {}", e),
            },
        )?;

        let response = self
            .client
            .post(token_uri)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(uri = token_uri, error = %e, "Token request failed");
                SessionError::TokenRequest {
                    uri: token_uri.to_string(),
                    status: e.status(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(uri = token_uri, error = %e, "Failed to read token response");
            SessionError::TokenRequest {
                uri: token_uri.to_string(),
                status: Some(status),
                message: e.to_string(),
            }
        })?;

        if !status.is_success() {
            let err = SessionError::token_rejected(token_uri, status, &text);
            error!(uri = token_uri, status = %status, "Token request rejected");
            return Err(err);
        }

        let parsed: TokenResponse =
            serde_json::from_str(&text).map_err(|e| SessionError::InvalidTokenResponse {
                uri: token_uri.to_string(),
                message: e.to_string(),
            })?;
        parsed.into_grant().inspect_err(|e| {
            error!(uri = token_uri, error = %e, "Token response incomplete");
        })
    }
}

async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            warn!(host, error = %e, "Host did not resolve");
            SessionError::Resolution {
                host: host.to_string(),
                source: Some(e),
            }
        })?
        .collect();

    if addrs.is_empty() {
        return Err(SessionError::Resolution {
            host: host.to_string(),
            source: None,
        });
    }
    debug!(host, ?addrs, "Host resolved");
    Ok(addrs)
}

/// Best-effort TCP probe: succeeds as soon as any resolved address accepts
/// a connection within `timeout`.
async fn probe(host: &str, port: u16, addrs: &[SocketAddr], timeout: Duration) -> Result<()> {
    for addr in addrs {
        match tokio::time::timeout(timeout, TcpStream::connect(*addr)).await {
            Ok(Ok(_)) => {
                debug!(%addr, "Port reachable");
                return Ok(());
            }
            Ok(Err(e)) => debug!(%addr, error = %e, "Probe connection refused"),
            Err(_) => debug!(%addr, "Probe timed out"),
        }
    }

    warn!(host, port, "Port unreachable");
    Err(SessionError::PortUnreachable {
        host: host.to_string(),
        port,
        timeout,
    })
}
