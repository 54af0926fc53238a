//! Gateway HTTP client: the single path every backend call takes.
//!
//! SYSTEM CONTEXT
//! ==============
//! ```text
//! endpoint binding ──▶ ApiClient::execute ──▶ reqwest ──▶ backend
//!                          │        ▲
//!                  bearer from      │ 401
//!                  SessionStore     ▼
//!                          AuthFailurePolicy
//!                          ├─ Logout:  clear session, Unauthorized
//!                          └─ Refresh: RefreshCoordinator, retry once
//! ```
//!
//! The bearer token is read from the session store at send time for every
//! attempt, never captured when a request is built. Public requests (login,
//! OTP, registration, password reset) carry no token and bypass the 401
//! policy entirely: a 401 there is a business answer, not an expired session.
//!
//! ERROR HANDLING
//! ==============
//! Non-success responses become `ApiError::Api` with the backend's own
//! message. A request is retried at most once, and only after a refresh (or
//! after observing that another request already refreshed the token).

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
use super::types::{RefreshRequest, RefreshResponse};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::session::store::SessionStore;

/// What to do when an authenticated request comes back 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailurePolicy {
    /// Clear the session and fail. The route gate then shows the login flow.
    Logout,
    /// Exchange the refresh token (single-flight) and retry once.
    Refresh,
}

// =============================================================================
// REQUEST
// =============================================================================

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Text { name: String, value: String },
    File { name: String, file_name: String, bytes: Vec<u8> },
}

impl FormField {
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text { name: name.into(), value: value.into() }
    }

    #[must_use]
    pub fn file(name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::File { name: name.into(), file_name: file_name.into(), bytes }
    }
}

#[derive(Debug, Clone)]
enum RequestBody {
    Json(Value),
    /// Rebuilt into a fresh `multipart::Form` for every attempt.
    Form(Vec<FormField>),
}

/// A backend call, described independently of any token.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    public: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, public: false }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append every parameter in `params`.
    #[must_use]
    pub fn query_pairs<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Send `fields` as `multipart/form-data` instead of JSON.
    #[must_use]
    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if `body` cannot be represented as JSON.
    pub fn encode<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Decode(format!("encode request body: {e}")))?;
        Ok(self.json(value))
    }

    /// Send without a bearer token and outside the 401 policy.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.public
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Configured gateway client. Clones share one connection pool, one session
/// store and one refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
    policy: AuthFailurePolicy,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    /// Build a client for `config`, applying its variant's 401 policy.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::HttpClientBuild` if the TLS backend cannot be
    /// initialized.
    pub fn new(config: &ClientConfig, session: SessionStore) -> Result<Self, ApiError> {
        Self::with_policy(config, session, config.variant.auth_failure_policy())
    }

    /// Build a client with an explicit 401 policy.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::new`].
    pub fn with_policy(
        config: &ClientConfig,
        session: SessionStore,
        policy: AuthFailurePolicy,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        let base_url = config.api_url.trim_end_matches('/').to_owned();
        debug!(%base_url, ?policy, "gateway client ready");
        Ok(Self {
            inner: Arc::new(ClientInner { http, base_url, session, policy, refresh: RefreshCoordinator::new() }),
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn policy(&self) -> AuthFailurePolicy {
        self.inner.policy
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Number of refresh exchanges this client has started.
    #[must_use]
    pub fn refresh_exchanges(&self) -> u64 {
        self.inner.refresh.exchanges_started()
    }

    /// Absolute URL for a path relative to the API base.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    /// Send and decode a JSON response.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; see the module docs for the 401 handling.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(&request).await?;
        Ok(response.json::<T>().await?)
    }

    /// Send and return the raw response body, for binary downloads.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn send_bytes(&self, request: ApiRequest) -> Result<Vec<u8>, ApiError> {
        let response = self.execute(&request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Send and discard the response body.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`].
    pub async fn send_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(&request).await?;
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token, joining an
    /// exchange already in flight. A failed exchange clears the session.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when there is no refresh token or the backend rejects
    /// it; `Transport` / `Decode` for the corresponding exchange failures.
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        if self.inner.session.refresh_token().is_none() {
            return Err(ApiError::Unauthorized);
        }
        Ok(self.shared_refresh().await?)
    }

    // -------------------------------------------------------------------------
    // 401 policy
    // -------------------------------------------------------------------------

    async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        if request.public {
            let response = self.dispatch(request, None).await?;
            return into_success(response).await;
        }

        let sent_with = self.inner.session.access_token();
        let response = self.dispatch(request, sent_with.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return into_success(response).await;
        }

        match self.inner.policy {
            AuthFailurePolicy::Logout => {
                warn!(path = %request.path, "request unauthorized; clearing session");
                self.inner.session.logout();
                Err(ApiError::Unauthorized)
            }
            AuthFailurePolicy::Refresh => self.retry_after_refresh(request, sent_with).await,
        }
    }

    async fn retry_after_refresh(&self, request: &ApiRequest, sent_with: Option<String>) -> Result<Response, ApiError> {
        let current = self.inner.session.access_token();
        let token = match current {
            Some(current) if sent_with.as_deref() != Some(current.as_str()) => {
                debug!(path = %request.path, "token changed while request was in flight; retrying");
                current
            }
            _ => {
                if self.inner.session.refresh_token().is_none() {
                    info!(path = %request.path, "request unauthorized without refresh token; clearing session");
                    self.inner.session.logout();
                    return Err(ApiError::Unauthorized);
                }
                match self.shared_refresh().await {
                    Ok(token) => token,
                    Err(failure) => {
                        debug!(path = %request.path, error = %failure, "refresh failed; request unauthorized");
                        return Err(ApiError::Unauthorized);
                    }
                }
            }
        };

        let response = self.dispatch(request, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "retried request unauthorized; giving up");
            return Err(ApiError::Unauthorized);
        }
        into_success(response).await
    }

    async fn shared_refresh(&self) -> RefreshOutcome {
        let http = self.inner.http.clone();
        let url = self.url("auth/refresh/");
        let session = self.inner.session.clone();
        self.inner.refresh.run(move || exchange_refresh_token(http, url, session)).await
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let mut builder = self.inner.http.request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        match &request.body {
            Some(RequestBody::Json(body)) => builder = builder.json(body),
            Some(RequestBody::Form(fields)) => builder = builder.multipart(build_form(fields)?),
            None => {}
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        debug!(method = %request.method, path = %request.path, authenticated = token.is_some(), "sending request");
        Ok(builder.send().await?)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

fn build_form(fields: &[FormField]) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for field in fields {
        form = match field {
            FormField::Text { name, value } => form.text(name.clone(), value.clone()),
            FormField::File { name, file_name, bytes } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str("application/octet-stream")
                    .map_err(|e| ApiError::Decode(format!("encode form field {name}: {e}")))?;
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

async fn into_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await?;
    Err(ApiError::from_response(status.as_u16(), &body))
}

/// One refresh exchange. Runs inside the coordinator's shared future, so the
/// session update and the logout-on-failure happen exactly once.
async fn exchange_refresh_token(http: reqwest::Client, url: String, session: SessionStore) -> RefreshOutcome {
    let Some(refresh_token) = session.refresh_token() else {
        return Err(RefreshFailure::SessionEnded);
    };

    match post_refresh(&http, &url, &refresh_token).await {
        Ok(RefreshResponse { access, refresh }) => {
            let rotated = refresh.is_some();
            if session.apply_refresh(access.clone(), refresh) {
                info!(rotated, "access token refreshed");
                Ok(access)
            } else {
                debug!("session ended before refreshed token landed");
                Err(RefreshFailure::SessionEnded)
            }
        }
        Err(failure) => {
            warn!(error = %failure, "token refresh failed; clearing session");
            session.logout();
            Err(failure)
        }
    }
}

async fn post_refresh(http: &reqwest::Client, url: &str, refresh_token: &str) -> Result<RefreshResponse, RefreshFailure> {
    let response = http
        .post(url)
        .json(&RefreshRequest { refresh: refresh_token })
        .send()
        .await
        .map_err(|e| RefreshFailure::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(RefreshFailure::Rejected(status.as_u16()));
    }
    response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| RefreshFailure::Decode(e.to_string()))
}

impl From<RefreshFailure> for ApiError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Rejected(_) | RefreshFailure::SessionEnded => Self::Unauthorized,
            RefreshFailure::Transport(message) => Self::Transport(message),
            RefreshFailure::Decode(message) => Self::Decode(message),
        }
    }
}
