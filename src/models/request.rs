//! Logical request descriptions, independent from the HTTP transport

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::IntoParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serializzato come JSON con `Content-Type: application/json`
    Json(Value),
    /// Serializzato come `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

/// Richiesta verso il backend. `path` e' sempre relativo all'URL base configurato.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub path: String,
    pub method: Method,
    pub query: Vec<(String, Option<String>)>,
    pub body: Option<RequestBody>,
    /// Credenziale esplicita al posto di quella dello store (usata dal proxy)
    pub bearer: Option<String>,
    /// Se un 401/403 deve invalidare la sessione corrente
    pub signals_unauthorized: bool,
}

impl GatewayRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            query: Vec::new(),
            body: None,
            bearer: None,
            signals_unauthorized: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Aggiunge un parametro di query; i valori assenti non vengono mai serializzati
    pub fn query<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
        self.query
            .push((name.to_string(), value.map(|v| v.to_string())));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = Some(RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        self
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn without_invalidation(mut self) -> Self {
        self.signals_unauthorized = false;
        self
    }

    /// Parametri effettivamente inviati (solo quelli presenti)
    pub fn present_query(&self) -> Vec<(&str, &str)> {
        self.query
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
            .collect()
    }
}

/// Filtri per la lista insights
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InsightsQuery {
    /// Testo da cercare
    pub search: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_query_values_are_dropped() {
        let request = GatewayRequest::get("/api/data/insights")
            .query("search", Some("oil"))
            .query::<u32>("skip", None)
            .query("limit", Some(10));

        assert_eq!(request.present_query(), vec![("search", "oil"), ("limit", "10")]);
    }

    #[test]
    fn test_defaults_signal_unauthorized() {
        let request = GatewayRequest::post("/api/login/token").form(&[("username", "u")]);
        assert!(request.signals_unauthorized);
        assert!(!request.without_invalidation().signals_unauthorized);
    }
}
