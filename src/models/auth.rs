//! Authentication-related models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Profilo utente restituito da `/api/login/users/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Risposta dell'endpoint token (OAuth2 password flow)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// `/api/login/user/isadmin` risponde con un booleano nudo oppure con un oggetto
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum AdminFlag {
    Bare(bool),
    Object { is_admin: bool },
}

impl AdminFlag {
    pub fn is_admin(self) -> bool {
        match self {
            AdminFlag::Bare(flag) => flag,
            AdminFlag::Object { is_admin } => is_admin,
        }
    }
}

/// Lifecycle of the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Storage not consulted yet
    Unknown,
    /// No valid credential
    Anonymous,
    /// Credential present, role unresolved
    Authenticated,
    /// Credential present and role known
    Resolved,
}

/// Derived view over the credential handed to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub state: SessionState,
    pub user: Option<User>,
    pub is_admin: bool,
}

impl Session {
    pub fn unknown() -> Self {
        Self {
            state: SessionState::Unknown,
            user: None,
            is_admin: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            state: SessionState::Anonymous,
            ..Self::unknown()
        }
    }

    pub fn authenticated() -> Self {
        Self {
            state: SessionState::Authenticated,
            ..Self::unknown()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated | SessionState::Resolved
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::unknown()
    }
}
