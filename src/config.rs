use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// URL base del backend; senza di esso il gateway rifiuta ogni chiamata
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub rate_limit_per_minute: u32,
    /// File dove persistere il token (se assente il token vive solo in memoria)
    pub credential_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_base_url: None,
            request_timeout_secs: 30,
            rate_limit_per_minute: 300,
            credential_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CRUSCOTTO_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("CRUSCOTTO_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        if let Ok(url) = std::env::var("CRUSCOTTO_API_URL") {
            if !url.trim().is_empty() {
                config.api_base_url = Some(url.trim().to_string());
            }
        }

        if let Ok(timeout) = std::env::var("CRUSCOTTO_REQUEST_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                config.request_timeout_secs = t;
            }
        }

        if let Ok(limit) = std::env::var("CRUSCOTTO_RATE_LIMIT") {
            if let Ok(l) = limit.parse() {
                config.rate_limit_per_minute = l;
            }
        }

        if let Ok(path) = std::env::var("CRUSCOTTO_CREDENTIAL_FILE") {
            config.credential_file = Some(PathBuf::from(path));
        }

        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Endpoint del backend consumati dal gateway e dal proxy
pub mod endpoints {
    pub const LOGIN_TOKEN: &str = "/api/login/token";
    pub const CURRENT_USER: &str = "/api/login/users/me";
    pub const IS_ADMIN: &str = "/api/login/user/isadmin";
    pub const INSIGHTS: &str = "/api/data/insights";
    pub const INDEX_GROUPS: &str = "/api/data/index_groups/all";
    pub const PERFORMANCES_GROUPED: &str = "/api/performances-grouped";
    pub const PERFORMANCE: &str = "/api/performance";
    pub const PREDICTIONS: &str = "/api/predictions";
    pub const DAILY_TASK: &str = "/api/tasks/daily";
    pub const HEALTH: &str = "/api/health";
}
