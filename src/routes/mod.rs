pub mod data;
pub mod proxy;
pub mod system;

use std::any::Any;

use axum::{
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::AppError;
use crate::middleware::rate_limit::{self, SharedRateLimiter};
use crate::routes::proxy::ProxyState;

/// Router completo del proxy: dati, sistema, rate limiting e cattura dei panic
pub fn create_router(state: ProxyState, limiter: SharedRateLimiter) -> Router {
    Router::new()
        .merge(data::router(state.clone()))
        .merge(system::router(state))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = limiter.clone();
            async move { rate_limit::rate_limit_middleware(limiter, req, next).await }
        }))
        .layer(CatchPanicLayer::custom(panic_response))
}

/// Un panic in un handler diventa la risposta 500 standard invece di chiudere la connessione
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("panic senza messaggio");
    AppError::Internal(format!("panic nel proxy: {}", detail)).into_response()
}
