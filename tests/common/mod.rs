#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{Body, to_bytes};
use axum::extract::{Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use tally::config::{Config, Environment};
use tally::router::{TallyState, tally_router};

pub fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "tally-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    path
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.environment = Environment::Test;
    cfg.secret_key = "integration-test-secret".to_string();
    cfg.encryption_key = "integration-test-encryption-key".to_string();
    cfg.monzo.client_id = "client-id".to_string();
    cfg.monzo.client_secret = "client-secret".to_string();
    cfg.monzo.redirect_uri = "http://localhost:3000/callback".to_string();
    cfg
}

/// Build the full application router over a fresh temp SQLite database.
pub async fn spawn_app(tag: &str) -> (Router, PathBuf) {
    spawn_app_with(tag, test_config()).await
}

pub async fn spawn_app_with(tag: &str, mut cfg: Config) -> (Router, PathBuf) {
    let path = temp_db_path(tag);
    cfg.database_url = format!("sqlite:{}", path.display());
    let db = tally::db::connect(&cfg.database_url)
        .await
        .expect("failed to open test database");
    db.init_schema().await.expect("failed to initialize schema");
    (tally_router(TallyState::new(db, cfg)), path)
}

/// Fire one request at the in-process router and parse the JSON body
/// (`Value::Null` when the body is empty).
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body was not JSON")
    };
    (status, value)
}

pub async fn register(app: &Router, email: &str, password: &str) -> Value {
    let (status, body) = send_json(
        app,
        "POST",
        "/api/v1/auth/register",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body
}

pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let form = format!(
        "username={}&password={}",
        urlencode(email),
        urlencode(password)
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/login")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .expect("failed to build request");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("login request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read login body");
    let body: Value = serde_json::from_slice(&bytes).expect("login body was not JSON");
    body["access_token"]
        .as_str()
        .expect("missing access_token")
        .to_string()
}

pub async fn register_and_login(app: &Router, email: &str, password: &str) -> String {
    register(app, email, password).await;
    login(app, email, password).await
}

fn urlencode(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

// ---- in-process Monzo mock ----

/// Shared knobs for the mock provider: canned accounts and transactions,
/// forced statuses, and the last query string seen on `/transactions`.
#[derive(Clone, Default)]
pub struct MonzoMock {
    pub accounts: Arc<Mutex<Vec<Value>>>,
    pub transactions: Arc<Mutex<Vec<Value>>>,
    token_status: Arc<AtomicU16>,
    resource_status: Arc<AtomicU16>,
    token_calls: Arc<AtomicUsize>,
    pub last_transactions_query: Arc<Mutex<Option<HashMap<String, String>>>>,
}

impl MonzoMock {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.token_status.store(200, Ordering::SeqCst);
        mock.resource_status.store(200, Ordering::SeqCst);
        mock
    }

    pub fn set_token_status(&self, status: u16) {
        self.token_status.store(status, Ordering::SeqCst);
    }

    pub fn set_resource_status(&self, status: u16) {
        self.resource_status.store(status, Ordering::SeqCst);
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn push_account(&self, id: &str, description: &str) {
        self.accounts.lock().unwrap().push(json!({
            "id": id,
            "description": description,
            "created": "2024-01-15T10:00:00Z",
            "type": "uk_retail",
        }));
    }

    pub fn push_transaction(&self, id: &str, amount_minor: i64, created: &str, desc: &str) {
        self.transactions.lock().unwrap().push(json!({
            "id": id,
            "amount": amount_minor,
            "created": created,
            "description": desc,
        }));
    }
}

async fn mock_token(State(mock): State<MonzoMock>) -> Response {
    let n = mock.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let status = mock.token_status.load(Ordering::SeqCst);
    if status != 200 {
        return (
            StatusCode::from_u16(status).expect("bad mock status"),
            "invalid_grant",
        )
            .into_response();
    }
    Json(json!({
        "access_token": format!("acc-tok-{n}"),
        "refresh_token": format!("ref-tok-{n}"),
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn mock_accounts(State(mock): State<MonzoMock>) -> Response {
    let status = mock.resource_status.load(Ordering::SeqCst);
    if status != 200 {
        return (
            StatusCode::from_u16(status).expect("bad mock status"),
            "provider error",
        )
            .into_response();
    }
    let accounts = mock.accounts.lock().unwrap().clone();
    Json(json!({"accounts": accounts})).into_response()
}

async fn mock_transactions(
    State(mock): State<MonzoMock>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    *mock.last_transactions_query.lock().unwrap() = Some(params);
    let status = mock.resource_status.load(Ordering::SeqCst);
    if status != 200 {
        return (
            StatusCode::from_u16(status).expect("bad mock status"),
            "provider error",
        )
            .into_response();
    }
    let transactions = mock.transactions.lock().unwrap().clone();
    Json(json!({"transactions": transactions})).into_response()
}

/// Serve the mock on an ephemeral local port and return its base URL.
pub async fn spawn_monzo_mock(mock: MonzoMock) -> Url {
    let app = Router::new()
        .route("/oauth2/token", post(mock_token))
        .route("/accounts", get(mock_accounts))
        .route("/transactions", get(mock_transactions))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock listener");
    let addr = listener.local_addr().expect("mock listener has no addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server died");
    });
    Url::parse(&format!("http://{addr}")).expect("mock addr not a URL")
}
