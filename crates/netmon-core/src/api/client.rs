//! Authenticated JSON requests against the monitoring server's REST API.
//!
//! `ApiClient` asks the session manager for a valid bearer header set
//! before every request and merges it into the outgoing headers. It never
//! connects on its own: without a session every call fails with
//! `SessionError::NotConnected`.

use std::sync::Arc;

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::auth::SessionManager;
use crate::error::{Result, SessionError};

/// Clone is cheap - the session manager is shared.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(Method::POST, path, Some(body)).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let (base_uri, headers) = self.session.authorized_request_parts().await?;
        let url = join_url(&base_uri, path);
        debug!(%method, url = %url, "Sending API request");

        let mut request = self.session.client().request(method, &url).headers(headers);
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = Self::check_response(request.send().await?).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(SessionError::from_status(status, &body))
        }
    }
}

fn join_url(base_uri: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_uri.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
