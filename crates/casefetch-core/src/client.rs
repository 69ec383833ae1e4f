//! Bearer-authenticated requests against the portal.
//!
//! The portal reports an invalid session with a server-error status instead
//! of `401 Unauthorized`. Every 5xx response on a first attempt is therefore
//! treated as session invalidation: the session is refreshed once and the
//! identical request is reissued once. Whatever the retry returns is final.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::PortalConfig;
use crate::error::RequestError;
use crate::session::SessionManager;

/// Method, URL, query and optional JSON body of one portal call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: Method, url: &str) -> Result<Self, RequestError> {
        Ok(Self {
            method,
            url: Url::parse(url)?,
            query: Vec::new(),
            body: None,
        })
    }

    pub fn get(url: &str) -> Result<Self, RequestError> {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Returns `true` if `status` is the portal's "session is no longer valid" signal.
pub fn is_session_invalidated(status: StatusCode) -> bool {
    status.is_server_error()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retry,
}

/// HTTP client that attaches the session token and recovers once from
/// session invalidation.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    session: Arc<SessionManager>,
}

impl AuthenticatedClient {
    pub fn new(session: Arc<SessionManager>, config: &PortalConfig) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, session })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Issues `spec`, re-authenticating and retrying once on invalidation.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Authentication`] if no token could be obtained
    /// - [`RequestError::Transport`] if the request produced no response
    /// - [`RequestError::Upstream`] for any other non-success response,
    ///   including a retry that was invalidated again
    pub async fn send(&self, spec: &RequestSpec) -> Result<reqwest::Response, RequestError> {
        let mut token = self.session.token().await?;
        let mut attempt = Attempt::Initial;

        loop {
            let response = self.issue(spec, &token).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if attempt == Attempt::Initial && is_session_invalidated(status) {
                tracing::info!(%status, url = %spec.url, "Session invalidated, re-authenticating");
                token = self.session.refresh_after(Some(&token)).await?;
                attempt = Attempt::Retry;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, url = %spec.url, ?attempt, "Portal request failed");
            return Err(RequestError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
    }

    async fn issue(&self, spec: &RequestSpec, token: &str) -> Result<reqwest::Response, RequestError> {
        tracing::debug!(method = %spec.method, url = %spec.url, "Portal request");

        let mut req = self
            .http
            .request(spec.method.clone(), spec.url.clone())
            .bearer_auth(token);
        if !spec.query.is_empty() {
            req = req.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T, RequestError> {
        let body = self.send(spec).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| RequestError::Decode {
            url: spec.url.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn get_text(&self, spec: &RequestSpec) -> Result<String, RequestError> {
        Ok(self.send(spec).await?.text().await?)
    }

    pub async fn get_bytes(&self, spec: &RequestSpec) -> Result<Bytes, RequestError> {
        Ok(self.send(spec).await?.bytes().await?)
    }
}
