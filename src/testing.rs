//! Stub backend used by the unit tests: a real axum server on an ephemeral port

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Recorded {
    calls: AtomicUsize,
    authorization: Mutex<Option<String>>,
    query: Mutex<Option<String>>,
    path: Mutex<Option<String>>,
}

pub struct StubBackend {
    addr: std::net::SocketAddr,
    recorded: Arc<Recorded>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl StubBackend {
    pub async fn start() -> Self {
        let recorded = Arc::new(Recorded::default());

        let app = Router::new()
            .route("/api/health", get(|| async { Json(json!({ "status": "ok" })) }))
            .route("/api/login/token", post(login))
            .route("/api/login/users/me", get(current_user))
            .route("/api/login/user/isadmin", get(is_admin))
            .route("/api/data/insights", get(echo_query))
            .route("/api/data/index_groups/all", get(|| async { Json(json!([{ "name": "FTSE MIB" }])) }))
            .route("/api/performances-grouped", get(|| async { Json(json!({ "groups": [] })) }))
            .route("/api/performance", get(performance))
            .route("/api/predictions", get(echo_query))
            .route("/api/tasks/daily", get(|| async { Json(json!({ "started": true })) }))
            .route("/echo", post(echo_body))
            .route("/garbage", get(|| async { "<html>not json</html>" }))
            .route("/status/:code", get(status))
            .layer(middleware::from_fn_with_state(recorded.clone(), record));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub backend");
        let addr = listener.local_addr().expect("stub address");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                })
                .await
                .ok();
        });

        Self {
            addr,
            recorded,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.recorded.calls.load(Ordering::SeqCst)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.recorded.authorization.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<String> {
        self.recorded.query.lock().unwrap().clone()
    }

    pub fn last_path(&self) -> Option<String> {
        self.recorded.path.lock().unwrap().clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        (&mut self.handle).await.ok();
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record(State(recorded): State<Arc<Recorded>>, request: Request, next: Next) -> Response {
    recorded.calls.fetch_add(1, Ordering::SeqCst);
    *recorded.authorization.lock().unwrap() = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *recorded.query.lock().unwrap() = request.uri().query().map(str::to_string);
    *recorded.path.lock().unwrap() = Some(request.uri().path().to_string());
    next.run(request).await
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// `alice`/`secret` -> tok123, `admin`/`admin` -> admintok, `slow` answers late,
/// `broken` fails with 500, anything else -> 401
async fn login(body: String) -> Response {
    let fields: Vec<(String, String)> = body
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    match (form_field(&fields, "username"), form_field(&fields, "password")) {
        (Some("alice"), Some("secret")) => {
            Json(json!({ "access_token": "tok123", "token_type": "bearer" })).into_response()
        }
        (Some("admin"), Some("admin")) => {
            Json(json!({ "access_token": "admintok", "token_type": "bearer" })).into_response()
        }
        (Some("broken"), _) => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        (Some("slow"), _) => {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            Json(json!({ "access_token": "slowtok", "token_type": "bearer" })).into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Incorrect username or password" })),
        )
            .into_response(),
    }
}

fn form_field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

async fn current_user(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some("tok123") => Json(json!({
            "id": 1, "username": "alice", "email": "alice@example.com", "is_admin": false
        }))
        .into_response(),
        Some("admintok") => Json(json!({
            "id": 2, "username": "admin", "email": "admin@example.com", "is_admin": true
        }))
        .into_response(),
        Some("noprofile") => (StatusCode::INTERNAL_SERVER_ERROR, "profile store down").into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Could not validate credentials" })),
        )
            .into_response(),
    }
}

async fn is_admin(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some("tok123") | Some("noprofile") => Json(json!(false)).into_response(),
        Some("admintok") => Json(json!({ "is_admin": true })).into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Could not validate credentials" })),
        )
            .into_response(),
    }
}

async fn performance(request: Request) -> Response {
    match request.uri().query() {
        Some(q) if q.contains("code=MISSING") => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Performance not found" })),
        )
            .into_response(),
        Some(q) if q.contains("code=TEAPOT") => {
            (StatusCode::IM_A_TEAPOT, "not an error object").into_response()
        }
        Some(q) => Json(json!({ "query": q })).into_response(),
        None => (StatusCode::UNPROCESSABLE_ENTITY, "missing code").into_response(),
    }
}

async fn echo_query(request: Request) -> Json<Value> {
    Json(json!({ "query": request.uri().query() }))
}

async fn echo_body(headers: HeaderMap, body: Bytes) -> Json<Value> {
    Json(json!({
        "content_type": headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "detail": format!("stub status {}", code) }))).into_response()
}
