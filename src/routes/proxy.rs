//! Route proxy: forwards browser reads to the backend with per-route cache policy
//!
//! Every exposed route is described by a [`ProxyRoute`] (`upstream_path`,
//! parameter mapping, optional [`CachePolicy`]) and served by [`forward`].

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query},
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::error::{AppError, ErrorKind, GatewayError};
use crate::models::GatewayRequest;
use crate::services::gateway::GatewayClient;

/// Messaggio generico quando il corpo d'errore del backend non e' leggibile
pub const UPSTREAM_FALLBACK_MESSAGE: &str = "Upstream request failed";

/// `Cache-Control` directives attached to a successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age_seconds: u32,
    pub stale_while_revalidate_seconds: u32,
}

impl CachePolicy {
    pub const fn new(max_age_seconds: u32, stale_while_revalidate_seconds: u32) -> Self {
        Self {
            max_age_seconds,
            stale_while_revalidate_seconds,
        }
    }

    pub fn header_value(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.max_age_seconds, self.stale_while_revalidate_seconds
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Path,
    Query,
}

/// Maps one client parameter onto an upstream query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamMapping {
    pub name: &'static str,
    pub source: ParamSource,
    pub upstream: &'static str,
    pub required: bool,
}

impl ParamMapping {
    pub const fn required_query(name: &'static str) -> Self {
        Self {
            name,
            source: ParamSource::Query,
            upstream: name,
            required: true,
        }
    }

    pub const fn optional_query(name: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required_query(name)
        }
    }

    /// Path segment normalized into the query parameter of the same name
    pub const fn path_to_query(name: &'static str) -> Self {
        Self {
            source: ParamSource::Path,
            ..Self::required_query(name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyRoute {
    pub upstream_path: &'static str,
    pub params: &'static [ParamMapping],
    pub cache: Option<CachePolicy>,
}

/// Stato condiviso (sola lettura) delle route proxy
#[derive(Clone)]
pub struct ProxyState {
    pub gateway: GatewayClient,
}

impl ProxyState {
    pub fn new(gateway: GatewayClient) -> Self {
        Self {
            gateway: gateway.with_error_fallback(UPSTREAM_FALLBACK_MESSAGE),
        }
    }
}

/// Everything a proxied request needs from the incoming request
#[derive(Debug, Default)]
pub struct ProxyInput {
    pub path: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub bearer: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ProxyInput
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let path = match Path::<HashMap<String, String>>::from_request_parts(parts, state).await {
            Ok(Path(path)) => path,
            Err(_) => HashMap::new(),
        };

        let Query(query) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Ok(Self {
            path,
            query,
            bearer,
        })
    }
}

/// Validates parameters, calls the backend and shapes the response
pub async fn forward(state: &ProxyState, route: &ProxyRoute, input: ProxyInput) -> Response {
    match proxy(state, route, input).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn proxy(
    state: &ProxyState,
    route: &ProxyRoute,
    input: ProxyInput,
) -> crate::error::Result<Response> {
    let upstream = upstream_request(route, &input)?;

    let body = state
        .gateway
        .request(upstream)
        .await
        .map_err(upstream_error)?;

    let mut response = (StatusCode::OK, Json(body)).into_response();
    if let Some(policy) = route.cache {
        let value = HeaderValue::from_str(&policy.header_value())
            .map_err(|e| AppError::Internal(e.to_string()))?;
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }

    Ok(response)
}

/// Builds the upstream call; a missing required parameter stops here
pub fn upstream_request(
    route: &ProxyRoute,
    input: &ProxyInput,
) -> crate::error::Result<GatewayRequest> {
    let mut request = GatewayRequest::get(route.upstream_path).bearer(input.bearer.clone());

    for mapping in route.params {
        let source = match mapping.source {
            ParamSource::Path => &input.path,
            ParamSource::Query => &input.query,
        };
        let value = source
            .get(mapping.name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());

        if mapping.required && value.is_none() {
            return Err(AppError::BadRequest(format!(
                "Missing required parameter: {}",
                mapping.name
            )));
        }

        request = request.query(mapping.upstream, value);
    }

    Ok(request)
}

fn upstream_error(err: GatewayError) -> AppError {
    match (err.kind, err.status) {
        (ErrorKind::Unauthorized | ErrorKind::BackendError, Some(status)) => {
            match StatusCode::from_u16(status) {
                Ok(status) => AppError::Upstream {
                    status,
                    message: err.message,
                },
                Err(_) => AppError::Internal(format!("Status upstream non valido: {}", status)),
            }
        }
        _ => AppError::Internal(err.to_string()),
    }
}
