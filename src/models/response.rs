use serde::Serialize;
use utoipa::ToSchema;

/// Envelope uniforme per gli errori del proxy
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
