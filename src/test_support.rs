//! In-process stub of the Lithovolt backend for client tests.
//!
//! Routes mirror the real API paths under `/api`. Protected routes accept a
//! bearer token only if it is in `accepted`; every Authorization header a
//! protected route sees is recorded in arrival order. Unrouted paths echo
//! the request back as JSON so endpoint bindings can be checked for method,
//! path, query and body.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Barrier;

use crate::config::ClientConfig;
use crate::net::client::{ApiClient, AuthFailurePolicy};
use crate::session::store::SessionStore;

pub(crate) const GOOD_PASSWORD: &str = "secret";
pub(crate) const GOOD_REFRESH: &str = "R";
pub(crate) const GOOD_OTP: &str = "123456";

#[derive(Default)]
pub(crate) struct StubState {
    accepted: Mutex<HashSet<String>>,
    seen_auth: Mutex<Vec<Option<String>>>,
    refresh_calls: AtomicUsize,
    refresh_delay: Duration,
    rotate_refresh: AtomicBool,
    withhold_refreshed: AtomicBool,
    hold_rejections: Option<Barrier>,
    rejection_delay: Duration,
}

impl StubState {
    pub(crate) fn accepting(tokens: &[&str]) -> Self {
        let state = Self::default();
        state.accept_all(tokens);
        state
    }

    /// Hold the first `n` rejected requests until all `n` are in flight.
    pub(crate) fn hold_rejections(mut self, n: usize) -> Self {
        self.hold_rejections = Some(Barrier::new(n));
        self
    }

    /// Answer every rejected request only after `delay`.
    pub(crate) fn rejection_delay(mut self, delay: Duration) -> Self {
        self.rejection_delay = delay;
        self
    }

    pub(crate) fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub(crate) fn rotating_refresh(self) -> Self {
        self.rotate_refresh.store(true, Ordering::SeqCst);
        self
    }

    /// Hand out refreshed tokens without ever accepting them.
    pub(crate) fn withholding_refreshed(self) -> Self {
        self.withhold_refreshed.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn accept_all(&self, tokens: &[&str]) {
        let mut accepted = lock(&self.accepted);
        accepted.extend(tokens.iter().map(|t| (*t).to_owned()));
    }

    pub(crate) fn revoke(&self, token: &str) {
        lock(&self.accepted).remove(token);
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Authorization headers seen by protected routes, in arrival order.
    pub(crate) fn seen_auth(&self) -> Vec<Option<String>> {
        lock(&self.seen_auth).clone()
    }
}

pub(crate) struct StubBackend {
    pub(crate) addr: SocketAddr,
    pub(crate) state: Arc<StubState>,
}

impl StubBackend {
    pub(crate) async fn start(state: StubState) -> std::io::Result<Self> {
        let state = Arc::new(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = %e, "stub backend stopped");
            }
        });
        Ok(Self { addr, state })
    }

    pub(crate) fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub(crate) fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_url())
    }

    pub(crate) fn client(&self, session: SessionStore, policy: AuthFailurePolicy) -> Result<ApiClient, crate::ApiError> {
        ApiClient::with_policy(&self.config(), session, policy)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// ROUTES
// =============================================================================

type Shared = State<Arc<StubState>>;

fn router(state: Arc<StubState>) -> Router {
    Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/refresh/", post(refresh))
        .route("/api/auth/otp/send/", post(otp_send))
        .route("/api/auth/otp/verify/", post(otp_verify))
        .route("/api/users/me/", get(me))
        .route("/api/users/update_profile/", patch(update_profile))
        .route("/api/users/wholesaler-applications/", get(echo).post(submit_application))
        .route("/api/orders/{id}/accept/", post(accept_order))
        .route("/api/orders/{id}/invoice/", get(invoice))
        .route("/api/warranty/verify/{serial}/", get(verify_warranty))
        .route("/api/warranty/{id}/certificate/", get(certificate))
        .fallback(echo)
        .with_state(state)
}

fn stub_user(role: &str) -> Value {
    json!({
        "id": 1,
        "email": "dealer@lithovolt.test",
        "role": role,
        "first_name": "Dana",
        "is_verified": true
    })
}

fn token_rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type", "code": "token_not_valid" })),
    )
        .into_response()
}

async fn authorize(state: &StubState, headers: &HeaderMap) -> Result<(), Response> {
    let header = match headers.get(AUTHORIZATION).map(|v| v.to_str()) {
        Some(Ok(value)) => Some(value.to_owned()),
        Some(Err(_)) | None => None,
    };
    lock(&state.seen_auth).push(header.clone());

    let granted = header
        .as_deref()
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| lock(&state.accepted).contains(token));
    if granted {
        return Ok(());
    }
    if let Some(barrier) = &state.hold_rejections {
        barrier.wait().await;
    }
    if !state.rejection_delay.is_zero() {
        tokio::time::sleep(state.rejection_delay).await;
    }
    Err(token_rejected())
}

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    if body["password"] != GOOD_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response();
    }
    state.accept_all(&["A"]);
    Json(json!({ "access": "A", "refresh": GOOD_REFRESH, "user": stub_user("WHOLESALER") })).into_response()
}

async fn refresh(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if !state.refresh_delay.is_zero() {
        tokio::time::sleep(state.refresh_delay).await;
    }
    if body["refresh"] != GOOD_REFRESH {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        )
            .into_response();
    }
    if !state.withhold_refreshed.load(Ordering::SeqCst) {
        state.accept_all(&["B"]);
    }
    if state.rotate_refresh.load(Ordering::SeqCst) {
        Json(json!({ "access": "B", "refresh": "R2" })).into_response()
    } else {
        Json(json!({ "access": "B" })).into_response()
    }
}

async fn otp_send(Json(body): Json<Value>) -> Response {
    if body.get("email").is_none() && body.get("phone").is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "non_field_errors": ["Email or phone is required"] })))
            .into_response();
    }
    Json(json!({ "message": "OTP sent successfully", "otp": null, "expires_in": 10 })).into_response()
}

async fn otp_verify(State(state): Shared, Json(body): Json<Value>) -> Response {
    if body["otp_code"] != GOOD_OTP {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Invalid or expired OTP" }))).into_response();
    }
    state.accept_all(&["A"]);
    Json(json!({ "access": "A", "refresh": GOOD_REFRESH, "user": stub_user("ADMIN") })).into_response()
}

async fn me(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejected) = authorize(&state, &headers).await {
        return rejected;
    }
    let mut user = stub_user("WHOLESALER");
    user["first_name"] = json!("Fresh");
    Json(user).into_response()
}

async fn update_profile(State(state): Shared, headers: HeaderMap, Json(changes): Json<Value>) -> Response {
    if let Err(rejected) = authorize(&state, &headers).await {
        return rejected;
    }
    let mut user = stub_user("WHOLESALER");
    if let (Some(user), Value::Object(changes)) = (user.as_object_mut(), changes) {
        user.extend(changes);
    }
    Json(user).into_response()
}

/// Reflects a multipart submission as `{content_type, fields, files}`.
async fn submit_application(State(state): Shared, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(rejected) = authorize(&state, &headers).await {
        return rejected;
    }
    let content_type = match headers.get(CONTENT_TYPE).map(|v| v.to_str()) {
        Some(Ok(value)) => value.to_owned(),
        Some(Err(_)) | None => String::new(),
    };
    let mut fields = serde_json::Map::new();
    let mut files = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
        };
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(str::to_owned);
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
        };
        match file_name {
            Some(file_name) => files.push(json!({ "name": name, "file_name": file_name, "size": bytes.len() })),
            None => {
                fields.insert(name, json!(String::from_utf8_lossy(&bytes)));
            }
        }
    }
    (
        StatusCode::CREATED,
        Json(json!({ "content_type": content_type, "fields": fields, "files": files, "status": "PENDING" })),
    )
        .into_response()
}

async fn accept_order(State(state): Shared, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if let Err(rejected) = authorize(&state, &headers).await {
        return rejected;
    }
    (StatusCode::BAD_REQUEST, Json(json!({ "error": format!("Order {id} is not pending") }))).into_response()
}

async fn invoice(State(state): Shared, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if let Err(rejected) = authorize(&state, &headers).await {
        return rejected;
    }
    format!("%PDF-1.4 invoice {id}").into_response()
}

async fn verify_warranty(Path(serial): Path<String>) -> Response {
    if serial == "LV-0001" {
        return Json(json!({ "serial_number": serial, "status": "ACTIVE" })).into_response();
    }
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Serial number not found" }))).into_response()
}

async fn certificate(State(state): Shared, headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if let Err(rejected) = authorize(&state, &headers).await {
        return rejected;
    }
    format!("%PDF-1.4 certificate {id}").into_response()
}

/// Catch-all: reflects the request as `{method, path, query, body}`.
/// Everything outside `/api/auth/` (and logout) requires a bearer token.
async fn echo(State(state): Shared, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let public = uri.path().starts_with("/api/auth/") && uri.path() != "/api/auth/logout/";
    if !public {
        if let Err(rejected) = authorize(&state, &headers).await {
            return rejected;
        }
    }
    let body = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => value,
        Err(_) => Value::Null,
    };
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query().unwrap_or_default(),
        "body": body,
    }))
    .into_response()
}
