//! Typed access to the dashboard read endpoints, through the gateway

use crate::config::endpoints;
use crate::error::GatewayError;
use crate::models::{GatewayRequest, InsightsQuery};
use crate::services::gateway::{GatewayClient, GatewayResponse};

#[derive(Clone)]
pub struct DashboardApi {
    gateway: GatewayClient,
}

impl DashboardApi {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }

    pub async fn insights(&self, query: &InsightsQuery) -> GatewayResponse {
        let request = GatewayRequest::get(endpoints::INSIGHTS)
            .query("search", query.search.as_deref().filter(|s| !s.is_empty()))
            .query("skip", query.skip)
            .query("limit", query.limit);
        self.gateway.request(request).await
    }

    pub async fn index_groups(&self) -> GatewayResponse {
        self.gateway
            .request(GatewayRequest::get(endpoints::INDEX_GROUPS))
            .await
    }

    pub async fn performances_grouped(&self) -> GatewayResponse {
        self.gateway
            .request(GatewayRequest::get(endpoints::PERFORMANCES_GROUPED))
            .await
    }

    pub async fn performance(&self, code: &str) -> GatewayResponse {
        let code = required("code", code)?;
        self.gateway
            .request(GatewayRequest::get(endpoints::PERFORMANCE).query("code", Some(code)))
            .await
    }

    pub async fn predictions(&self, name: &str) -> GatewayResponse {
        let name = required("name", name)?;
        self.gateway
            .request(GatewayRequest::get(endpoints::PREDICTIONS).query("name", Some(name)))
            .await
    }

    pub async fn trigger_daily_task(&self) -> GatewayResponse {
        self.gateway
            .request(GatewayRequest::get(endpoints::DAILY_TASK))
            .await
    }

    pub async fn health(&self) -> GatewayResponse {
        self.gateway
            .request(GatewayRequest::get(endpoints::HEALTH))
            .await
    }
}

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, GatewayError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GatewayError::validation(format!(
            "Missing required parameter: {}",
            name
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::services::credential_store::CredentialStore;
    use crate::testing::StubBackend;
    use std::time::Duration;

    fn api_for(backend: &StubBackend) -> DashboardApi {
        DashboardApi::new(GatewayClient::new(
            Some(&backend.url()),
            Duration::from_secs(5),
            CredentialStore::detached(),
        ))
    }

    #[tokio::test]
    async fn test_missing_code_never_reaches_backend() {
        let backend = StubBackend::start().await;
        let api = api_for(&backend);

        let err = api.performance("  ").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
        let err = api.predictions("").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_insights_only_sends_present_filters() {
        let backend = StubBackend::start().await;
        let api = api_for(&backend);

        let query = InsightsQuery {
            search: Some(String::new()),
            skip: None,
            limit: Some(5),
        };
        let body = api.insights(&query).await.unwrap();
        assert_eq!(body["query"], "limit=5");
    }

    #[tokio::test]
    async fn test_index_groups_list() {
        let backend = StubBackend::start().await;
        let api = api_for(&backend);

        let groups = api.index_groups().await.unwrap();
        assert_eq!(groups[0]["name"], "FTSE MIB");
        assert_eq!(backend.last_path().as_deref(), Some("/api/data/index_groups/all"));
    }

    #[tokio::test]
    async fn test_performance_sends_code_as_query() {
        let backend = StubBackend::start().await;
        let api = api_for(&backend);

        let body = api.performance("ENI").await.unwrap();
        assert_eq!(body["query"], "code=ENI");

        let err = api.performance("MISSING").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::BackendError);
        assert_eq!(err.status, Some(404));
        assert_eq!(err.message, "Performance not found");
    }
}
