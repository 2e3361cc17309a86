//! Route proxy per i dati della dashboard (insights, indici, performance, previsioni)

use axum::{extract::State, response::Response, routing::get, Router};

use crate::config::endpoints;
use crate::routes::proxy::{forward, CachePolicy, ParamMapping, ProxyInput, ProxyRoute, ProxyState};

pub const INSIGHTS: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::INSIGHTS,
    params: &[
        ParamMapping::optional_query("search"),
        ParamMapping::optional_query("skip"),
        ParamMapping::optional_query("limit"),
    ],
    cache: None,
};

pub const INDEX_GROUPS: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::INDEX_GROUPS,
    params: &[],
    cache: None,
};

/// Snapshot raggruppato: un'ora di cache, un giorno di stale-while-revalidate
pub const PERFORMANCES_GROUPED: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::PERFORMANCES_GROUPED,
    params: &[],
    cache: Some(CachePolicy::new(3600, 86400)),
};

pub const PERFORMANCE: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::PERFORMANCE,
    params: &[ParamMapping::required_query("code")],
    cache: None,
};

pub const PERFORMANCE_BY_PATH: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::PERFORMANCE,
    params: &[ParamMapping::path_to_query("code")],
    cache: None,
};

pub const PREDICTIONS: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::PREDICTIONS,
    params: &[ParamMapping::required_query("name")],
    cache: None,
};

pub const PREDICTIONS_BY_PATH: ProxyRoute = ProxyRoute {
    upstream_path: endpoints::PREDICTIONS,
    params: &[ParamMapping::path_to_query("name")],
    cache: None,
};

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/insights", get(get_insights))
        .route("/api/index-groups", get(get_index_groups))
        .route("/api/performances-grouped", get(get_performances_grouped))
        .route("/api/performance", get(get_performance))
        .route("/api/performance/:code", get(get_performance_by_path))
        .route("/api/predictions", get(get_predictions))
        .route("/api/predictions/:name", get(get_predictions_by_path))
        .with_state(state)
}

/// Lista insights
#[utoipa::path(
    get,
    path = "/api/insights",
    params(crate::models::InsightsQuery),
    responses(
        (status = 200, description = "Lista insights dal backend"),
        (status = 500, description = "Errore interno", body = crate::models::ErrorResponse),
    ),
    tag = "Dati"
)]
pub async fn get_insights(State(state): State<ProxyState>, input: ProxyInput) -> Response {
    forward(&state, &INSIGHTS, input).await
}

/// Gruppi di indici
#[utoipa::path(
    get,
    path = "/api/index-groups",
    responses(
        (status = 200, description = "Tutti i gruppi di indici"),
    ),
    tag = "Dati"
)]
pub async fn get_index_groups(State(state): State<ProxyState>, input: ProxyInput) -> Response {
    forward(&state, &INDEX_GROUPS, input).await
}

/// Snapshot delle performance raggruppate (in cache)
#[utoipa::path(
    get,
    path = "/api/performances-grouped",
    responses(
        (status = 200, description = "Snapshot con Cache-Control max-age=3600, stale-while-revalidate=86400"),
    ),
    tag = "Performance"
)]
pub async fn get_performances_grouped(
    State(state): State<ProxyState>,
    input: ProxyInput,
) -> Response {
    forward(&state, &PERFORMANCES_GROUPED, input).await
}

/// Performance di un singolo titolo
#[utoipa::path(
    get,
    path = "/api/performance",
    params(
        ("code" = String, Query, description = "Codice del titolo"),
    ),
    responses(
        (status = 200, description = "Performance del titolo, mai in cache"),
        (status = 400, description = "Parametro code mancante", body = crate::models::ErrorResponse),
    ),
    tag = "Performance"
)]
pub async fn get_performance(State(state): State<ProxyState>, input: ProxyInput) -> Response {
    forward(&state, &PERFORMANCE, input).await
}

/// Performance di un singolo titolo (codice nel path)
#[utoipa::path(
    get,
    path = "/api/performance/{code}",
    params(
        ("code" = String, Path, description = "Codice del titolo"),
    ),
    responses(
        (status = 200, description = "Performance del titolo, mai in cache"),
    ),
    tag = "Performance"
)]
pub async fn get_performance_by_path(
    State(state): State<ProxyState>,
    input: ProxyInput,
) -> Response {
    forward(&state, &PERFORMANCE_BY_PATH, input).await
}

/// Previsioni per serie storica
#[utoipa::path(
    get,
    path = "/api/predictions",
    params(
        ("name" = String, Query, description = "Nome della serie"),
    ),
    responses(
        (status = 200, description = "Bundle di previsioni"),
        (status = 400, description = "Parametro name mancante", body = crate::models::ErrorResponse),
    ),
    tag = "Previsioni"
)]
pub async fn get_predictions(State(state): State<ProxyState>, input: ProxyInput) -> Response {
    forward(&state, &PREDICTIONS, input).await
}

/// Previsioni per serie storica (nome nel path)
#[utoipa::path(
    get,
    path = "/api/predictions/{name}",
    params(
        ("name" = String, Path, description = "Nome della serie"),
    ),
    responses(
        (status = 200, description = "Bundle di previsioni"),
    ),
    tag = "Previsioni"
)]
pub async fn get_predictions_by_path(
    State(state): State<ProxyState>,
    input: ProxyInput,
) -> Response {
    forward(&state, &PREDICTIONS_BY_PATH, input).await
}
