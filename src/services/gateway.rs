//! API gateway client: the single path every backend call goes through.
//!
//! Requests are resolved against one configured base URL, carry the current
//! credential as a bearer header when one exists, and come back as either the
//! parsed JSON body or a classified [`GatewayError`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::error::{ErrorKind, GatewayError};
use crate::models::{GatewayRequest, Method, RequestBody};
use crate::services::credential_store::CredentialStore;

pub type GatewayResponse = std::result::Result<Value, GatewayError>;

/// Callback invoked when the backend rejects the credential (401/403)
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct GatewayClient {
    base_url: Option<String>,
    http: reqwest::Client,
    credentials: CredentialStore,
    on_unauthorized: Arc<RwLock<Option<UnauthorizedHook>>>,
    error_fallback: Option<String>,
}

impl GatewayClient {
    pub fn new(base_url: Option<&str>, timeout: Duration, credentials: CredentialStore) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Client HTTP con timeout non disponibile: {}", e);
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.and_then(normalize_base_url),
            http,
            credentials,
            on_unauthorized: Arc::new(RwLock::new(None)),
            error_fallback: None,
        }
    }

    /// Message used when an error body carries none; defaults to `HTTP <status>`
    pub fn with_error_fallback(mut self, message: impl Into<String>) -> Self {
        self.error_fallback = Some(message.into());
        self
    }

    pub fn from_config(config: &Config, credentials: CredentialStore) -> Self {
        Self::new(
            config.api_base_url.as_deref(),
            config.request_timeout(),
            credentials,
        )
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Registers the invalidation callback. Shared by every clone of this client.
    pub fn set_unauthorized_hook(&self, hook: UnauthorizedHook) {
        let mut slot = self
            .on_unauthorized
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(hook);
    }

    /// Builds the absolute URL for a backend path
    pub fn resolve(&self, path: &str) -> std::result::Result<Url, GatewayError> {
        let base = self.base_url.as_deref().ok_or_else(|| {
            GatewayError::new(ErrorKind::Misconfigured, "Backend base URL is not configured")
        })?;

        let joined = format!("{}/{}", base, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| {
            GatewayError::validation(format!("Invalid request path '{}': {}", path, e))
        })
    }

    pub async fn request(&self, request: GatewayRequest) -> GatewayResponse {
        let url = self.resolve(&request.path)?;

        let mut builder = self.http.request(to_reqwest_method(request.method), url);

        let query = request.present_query();
        if !query.is_empty() {
            builder = builder.query(&query);
        }

        let token = request
            .bearer
            .clone()
            .or_else(|| self.credentials.get())
            .filter(|token| !token.is_empty());
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            Some(RequestBody::Json(body)) => builder.json(body),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        tracing::debug!("{} {}", request.method.as_str(), request.path);

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    "Backend non raggiungibile per {} {}: {}",
                    request.method.as_str(),
                    request.path,
                    e
                );
                return Err(GatewayError::new(
                    ErrorKind::NetworkUnavailable,
                    format!("Backend unreachable: {}", e),
                ));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return Err(GatewayError::new(
                    ErrorKind::NetworkUnavailable,
                    format!("Response body interrupted: {}", e),
                )
                .with_status(status.as_u16()));
            }
        };

        let result = classify(status, &body, self.error_fallback.as_deref());

        if let Err(err) = &result {
            tracing::warn!(
                "{} {} fallita: {} (status {:?})",
                request.method.as_str(),
                request.path,
                err.kind,
                err.status
            );
            if err.is_unauthorized() && request.signals_unauthorized {
                self.signal_unauthorized();
            }
        }

        result
    }

    /// Like [`request`](Self::request), decoding the body into `T`
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        request: GatewayRequest,
    ) -> std::result::Result<T, GatewayError> {
        let value = self.request(request).await?;
        serde_json::from_value(value).map_err(|e| {
            GatewayError::new(
                ErrorKind::ProtocolError,
                format!("Unexpected response shape: {}", e),
            )
        })
    }

    fn signal_unauthorized(&self) {
        let hook = self
            .on_unauthorized
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(trimmed.to_string()),
        Ok(url) => {
            tracing::error!("Schema URL backend non supportato: {}", url.scheme());
            None
        }
        Err(e) => {
            tracing::error!("URL backend non valido '{}': {}", raw, e);
            None
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Maps a raw HTTP outcome onto the gateway result shape
pub fn classify(status: StatusCode, body: &[u8], fallback: Option<&str>) -> GatewayResponse {
    let code = status.as_u16();

    if status.is_success() {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        return serde_json::from_slice(body).map_err(|e| {
            GatewayError::new(ErrorKind::ProtocolError, format!("Malformed JSON: {}", e))
                .with_status(code)
        });
    }

    let message = extract_error_message(body).unwrap_or_else(|| match fallback {
        Some(fallback) => fallback.to_string(),
        None => format!("HTTP {}", code),
    });

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthorized,
        _ => ErrorKind::BackendError,
    };

    Err(GatewayError::new(kind, message).with_status(code))
}

/// Pulls a human message out of a backend error body (`detail`, `error`, `message`)
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;

    let message = match &value {
        Value::String(message) => Some(message.clone()),
        Value::Object(map) => ["detail", "error", "message"]
            .iter()
            .filter_map(|field| map.get(*field))
            .find_map(message_from_value),
        _ => None,
    };

    message.filter(|message| !message.is_empty())
}

fn message_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(message) => Some(message.clone()),
        // FastAPI validation errors: [{ "msg": ..., "loc": [...] }, ...]
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}
