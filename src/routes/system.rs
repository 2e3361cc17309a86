use axum::{extract::State, response::Response, routing::get, Router};

use crate::config::endpoints;
use crate::routes::proxy::{forward, ProxyInput, ProxyRoute, ProxyState};

pub const DAILY_TASK: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::DAILY_TASK,
    params: &[],
    cache: None,
};

pub const HEALTH: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::HEALTH,
    params: &[],
    cache: None,
};

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/tasks/daily", get(trigger_daily_task))
        .route("/api/health", get(health_check))
        .with_state(state)
}

/// Avvia il task giornaliero sul backend
#[utoipa::path(
    get,
    path = "/api/tasks/daily",
    responses(
        (status = 200, description = "Task avviato"),
    ),
    tag = "Sistema"
)]
pub async fn trigger_daily_task(State(state): State<ProxyState>, input: ProxyInput) -> Response {
    forward(&state, &DAILY_TASK, input).await
}

/// Health check del backend
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Backend raggiungibile"),
        (status = 500, description = "Backend non raggiungibile", body = crate::models::ErrorResponse),
    ),
    tag = "Sistema"
)]
pub async fn health_check(State(state): State<ProxyState>, input: ProxyInput) -> Response {
    forward(&state, &HEALTH, input).await
}
