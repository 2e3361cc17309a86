use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Messaggio fisso per errori non gestiti del proxy
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Classificazione di ogni fallimento del gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credenziale mancante, scaduta o rifiutata (anche login respinto)
    Unauthorized,
    /// Risposta non-2xx con messaggio del backend
    BackendError,
    /// Nessuna risposta ottenuta
    NetworkUnavailable,
    /// Risposta ricevuta ma non JSON valido
    ProtocolError,
    /// Input obbligatorio mancante prima della chiamata
    ValidationError,
    /// URL base del backend non configurato
    Misconfigured,
    /// Credenziale non salvabile sul supporto locale
    StorageUnavailable,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::BackendError => write!(f, "backend_error"),
            ErrorKind::NetworkUnavailable => write!(f, "network_unavailable"),
            ErrorKind::ProtocolError => write!(f, "protocol_error"),
            ErrorKind::ValidationError => write!(f, "validation_error"),
            ErrorKind::Misconfigured => write!(f, "misconfigured"),
            ErrorKind::StorageUnavailable => write!(f, "storage_unavailable"),
        }
    }
}

/// Errore classificato restituito dal gateway. Non viene mai sollevato come panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    /// Testo mostrato all'utente: mai dettagli interni del backend
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Unauthorized => "Login failed, check your credentials",
            _ => "Failed to load data",
        }
    }
}

/// Errori delle route proxy, serializzati come `{ "error": ... }`
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Troppe richieste: {0}")]
    RateLimited(String),

    #[error("Errore interno: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Upstream { status, message } => (*status, message.clone()),
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            AppError::Internal(detail) => {
                tracing::error!("Errore interno proxy: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
