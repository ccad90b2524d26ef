#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use homebase::backend::MemoryAuth;
use homebase::config::BackendConfig;
use homebase::session::{SessionContext, SessionManager};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const ANON_KEY: &str = "anon-test-key";

/// Session manager that has already resolved `user_id`
pub async fn signed_in(user_id: &str) -> (SessionManager, SessionContext) {
    let manager = SessionManager::start(Arc::new(MemoryAuth::signed_in(user_id)));
    let mut ctx = manager.context();
    ctx.settled().await;
    (manager, ctx)
}

/// Session manager that resolved to nobody
pub async fn anonymous() -> (SessionManager, SessionContext) {
    let manager = SessionManager::start(Arc::new(MemoryAuth::new()));
    let mut ctx = manager.context();
    ctx.settled().await;
    (manager, ctx)
}

/// Access token with the given subject and lifetime
pub fn access_token(sub: &str, ttl_secs: i64) -> String {
    let claims = json!({
        "sub": sub,
        "exp": Utc::now().timestamp() + ttl_secs,
        "aud": "authenticated",
        "jti": uuid::Uuid::new_v4().to_string(),
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"fake-backend"))
        .unwrap_or_default()
}

#[derive(Default)]
pub struct FakeState {
    /// email -> (password, user id)
    pub users: HashMap<String, (String, String)>,
    /// access token -> user id
    pub access: HashMap<String, String>,
    /// refresh token -> user id
    pub refresh: HashMap<String, String>,
    /// table -> rows, newest first
    pub tables: HashMap<String, Vec<Value>>,
    /// function name -> (status, body)
    pub functions: HashMap<String, (u16, Value)>,
    /// "METHOD path" for every request received
    pub requests: Vec<String>,
    pub logouts: usize,
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(|p| p.into_inner())
}

/// In-process stand-in for the hosted backend's auth, REST and function endpoints
pub struct FakeBackend {
    pub port: u16,
    pub base_url: String,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind fake backend")?;

        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/user", get(user))
            .route("/auth/v1/logout", post(logout))
            .route(
                "/rest/v1/:table",
                get(list).post(insert).patch(update).delete(remove),
            )
            .route("/functions/v1/:name", post(function))
            .with_state(state.clone());

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "fake backend stopped");
            }
        });

        Ok(Self {
            port,
            base_url,
            state,
            task,
        })
    }

    pub fn config(&self) -> BackendConfig {
        BackendConfig {
            url: self.base_url.clone(),
            anon_key: ANON_KEY.to_string(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        lock(&self.state)
    }

    pub fn add_user(&self, email: &str, password: &str, user_id: &str) {
        self.state()
            .users
            .insert(email.to_string(), (password.to_string(), user_id.to_string()));
    }

    /// Register tokens as if a sign-in had happened earlier
    pub fn issue(&self, user_id: &str, access: &str, refresh: &str) {
        let mut state = self.state();
        state.access.insert(access.to_string(), user_id.to_string());
        state.refresh.insert(refresh.to_string(), user_id.to_string());
    }

    pub fn set_function(&self, name: &str, status: u16, body: Value) {
        self.state().functions.insert(name.to_string(), (status, body));
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(ANON_KEY)
}

fn issue_tokens(state: &mut FakeState, user_id: &str) -> Value {
    let access = access_token(user_id, 3600);
    let refresh = uuid::Uuid::new_v4().to_string();
    state.access.insert(access.clone(), user_id.to_string());
    state.refresh.insert(refresh.clone(), user_id.to_string());
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 3600,
        "user": { "id": user_id }
    })
}

async fn token(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    state.requests.push("POST /auth/v1/token".to_string());

    let user_id = match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            match state.users.get(email) {
                Some((expected, id)) if expected == password => id.clone(),
                _ => {
                    return error(
                        StatusCode::BAD_REQUEST,
                        json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" }),
                    )
                }
            }
        }
        Some("refresh_token") => {
            let refresh = body["refresh_token"].as_str().unwrap_or_default();
            match state.refresh.remove(refresh) {
                Some(id) => id,
                None => {
                    return error(
                        StatusCode::BAD_REQUEST,
                        json!({ "error": "invalid_grant", "error_description": "Invalid Refresh Token" }),
                    )
                }
            }
        }
        _ => return error(StatusCode::BAD_REQUEST, json!({ "msg": "unsupported grant_type" })),
    };

    Json(issue_tokens(&mut state, &user_id)).into_response()
}

async fn user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    state.requests.push("GET /auth/v1/user".to_string());
    match bearer(&headers).and_then(|t| state.access.get(&t).cloned()) {
        Some(id) => Json(json!({ "id": id, "aud": "authenticated" })).into_response(),
        None => error(StatusCode::UNAUTHORIZED, json!({ "msg": "invalid JWT" })),
    }
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    state.requests.push("POST /auth/v1/logout".to_string());
    if let Some(token) = bearer(&headers) {
        state.access.remove(&token);
    }
    state.logouts += 1;
    StatusCode::NO_CONTENT.into_response()
}

fn matches(row: &Value, query: &HashMap<String, String>) -> bool {
    ["id", "user_id"].iter().all(|column| match query.get(*column) {
        Some(filter) => {
            let wanted = filter.strip_prefix("eq.").unwrap_or(filter);
            row[*column].as_str() == Some(wanted)
        }
        None => true,
    })
}

/// Authenticated caller or a 401 response
fn caller(state: &FakeState, headers: &HeaderMap) -> Result<String, Response> {
    if !has_api_key(headers) {
        return Err(error(StatusCode::UNAUTHORIZED, json!({ "message": "No API key found in request" })));
    }
    bearer(headers)
        .and_then(|t| state.access.get(&t).cloned())
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, json!({ "code": "PGRST301", "message": "JWT expired" })))
}

async fn list(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("GET /rest/v1/{}", table));
    let uid = match caller(&state, &headers) {
        Ok(uid) => uid,
        Err(response) => return response,
    };

    let rows: Vec<Value> = state
        .tables
        .get(&table)
        .map(|rows| {
            rows.iter()
                // Row level security: callers only ever see their own rows
                .filter(|row| row["user_id"].as_str() == Some(uid.as_str()))
                .filter(|row| matches(row, &query))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    Json(Value::Array(rows)).into_response()
}

async fn insert(
    State(state): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("POST /rest/v1/{}", table));
    let uid = match caller(&state, &headers) {
        Ok(uid) => uid,
        Err(response) => return response,
    };
    if body["user_id"].as_str() != Some(uid.as_str()) {
        return error(
            StatusCode::FORBIDDEN,
            json!({ "code": "42501", "message": "new row violates row-level security policy" }),
        );
    }

    let rows = state.tables.entry(table.clone()).or_default();
    if table == "user_secrets"
        && rows
            .iter()
            .any(|row| row["user_id"] == body["user_id"] && row["key"] == body["key"])
    {
        return error(
            StatusCode::CONFLICT,
            json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"user_secrets_user_id_key_key\""
            }),
        );
    }

    let now = Utc::now().to_rfc3339();
    body["id"] = json!(uuid::Uuid::new_v4().to_string());
    body["created_at"] = json!(now);
    body["updated_at"] = json!(now);
    rows.insert(0, body.clone());
    (StatusCode::CREATED, Json(json!([body]))).into_response()
}

async fn update(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("PATCH /rest/v1/{}", table));
    let uid = match caller(&state, &headers) {
        Ok(uid) => uid,
        Err(response) => return response,
    };

    if let (Some(rows), Value::Object(fields)) = (state.tables.get_mut(&table), patch) {
        for row in rows
            .iter_mut()
            .filter(|row| row["user_id"].as_str() == Some(uid.as_str()))
            .filter(|row| matches(row, &query))
        {
            for (k, v) in &fields {
                row[k] = v.clone();
            }
            row["updated_at"] = json!(Utc::now().to_rfc3339());
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn remove(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("DELETE /rest/v1/{}", table));
    let uid = match caller(&state, &headers) {
        Ok(uid) => uid,
        Err(response) => return response,
    };

    if let Some(rows) = state.tables.get_mut(&table) {
        rows.retain(|row| !(row["user_id"].as_str() == Some(uid.as_str()) && matches(row, &query)));
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn function(
    State(state): State<Shared>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = lock(&state);
    state.requests.push(format!("POST /functions/v1/{} {}", name, body));
    if let Err(response) = caller(&state, &headers) {
        return response;
    }

    match state.functions.get(&name) {
        Some((status, reply)) => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(reply.clone())).into_response()
        }
        None => error(StatusCode::NOT_FOUND, json!({ "message": "Function not found" })),
    }
}
