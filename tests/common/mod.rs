#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use bank_report_api::auth::{hash_password, Identity, TokenService};
use bank_report_api::database::{Database, DatabaseError, JsonRow, PoolStatus, Statement, Target};
use bank_report_api::{build_app, AppState};

pub const SECRET: &str = "integration-test-secret";

type Responder = Box<dyn Fn(&Statement) -> Result<Vec<JsonRow>, DatabaseError> + Send + Sync>;

/// In-memory stand-in for SQL Server. Every statement goes to `respond`,
/// and every call is recorded.
pub struct FakeDatabase {
    respond: Responder,
    pub status: Mutex<PoolStatus>,
    pub calls: Mutex<Vec<Statement>>,
    executes: AtomicUsize,
}

impl FakeDatabase {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&Statement) -> Result<Vec<JsonRow>, DatabaseError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            status: Mutex::new(PoolStatus::Live),
            calls: Mutex::new(Vec::new()),
            executes: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn execute(&self, statement: &Statement) -> Result<Vec<JsonRow>, DatabaseError> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(statement.clone());
        (self.respond)(statement)
    }

    async fn status(&self) -> PoolStatus {
        *self.status.lock().unwrap()
    }
}

pub fn tokens() -> TokenService {
    TokenService::new(
        SECRET,
        Duration::from_secs(3600),
        Duration::from_secs(7 * 24 * 3600),
    )
}

pub fn state(db: Arc<FakeDatabase>) -> AppState {
    AppState {
        db,
        tokens: Arc::new(tokens()),
        expose_error_details: false,
        secure_cookies: false,
    }
}

pub fn app(db: Arc<FakeDatabase>) -> Router {
    build_app(state(db))
}

pub fn identity(role: &str) -> Identity {
    Identity {
        subject: "17".to_string(),
        name: "Alice".to_string(),
        role: role.to_string(),
    }
}

pub fn access_token(role: &str) -> String {
    let tokens = tokens();
    tokens.issue_access(&identity(role), tokens.access_ttl()).unwrap()
}

pub fn row(value: Value) -> JsonRow {
    value.as_object().cloned().unwrap_or_default()
}

pub fn sql_text(statement: &Statement) -> &str {
    match &statement.target {
        Target::Sql(text) => text.as_ref(),
        Target::Procedure(name) => name.as_ref(),
    }
}

/// `dbo.Users` row for `username` with password `correct`.
pub fn user_row(username: &str, active: bool) -> JsonRow {
    row(json!({
        "UserId": 17,
        "Username": username,
        "DisplayName": "Alice",
        "PasswordHash": hash_password("correct").unwrap(),
        "Role": "admin",
        "IsActive": active,
    }))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: Router, request: Request<Body>) -> Result<TestResponse> {
    let response = app.oneshot(request).await.context("request failed")?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).context("response was not JSON")?
    };
    Ok(TestResponse {
        status,
        headers,
        body,
    })
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
