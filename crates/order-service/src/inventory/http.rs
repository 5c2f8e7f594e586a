//! HTTP inventory client.

use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use serde::Deserialize;

use super::{InventoryError, InventoryGateway};

#[derive(Debug, Deserialize)]
struct InventoryStatus {
    exists: bool,
}

/// Queries `GET {base_url}/inventories?productId={id}`.
///
/// The response body is `{"exists": bool}`.
#[derive(Debug, Clone)]
pub struct HttpInventoryGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInventoryGateway {
    /// Creates a client whose every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InventoryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a gateway around an existing client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    #[tracing::instrument(skip(self))]
    async fn exists(&self, product_id: ProductId) -> Result<bool, InventoryError> {
        let response = self
            .client
            .get(format!("{}/inventories", self.base_url))
            .query(&[("productId", product_id.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(InventoryError::Status(status.as_u16()));
        }

        let body: InventoryStatus = response.json().await?;
        Ok(body.exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::collections::HashMap;

    async fn inventories(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
        use axum::response::IntoResponse;

        match params.get("productId").map(String::as_str) {
            Some("5") => axum::Json(serde_json::json!({ "exists": true })).into_response(),
            Some("500") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            Some("777") => "not json".into_response(),
            _ => axum::Json(serde_json::json!({ "exists": false })).into_response(),
        }
    }

    async fn spawn_inventory() -> String {
        let app = Router::new().route("/inventories", get(inventories));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_existing_product() {
        let base = spawn_inventory().await;
        let gateway = HttpInventoryGateway::new(base, Duration::from_secs(2)).unwrap();

        assert!(gateway.exists(ProductId::new(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_product() {
        let base = spawn_inventory().await;
        let gateway = HttpInventoryGateway::new(base, Duration::from_secs(2)).unwrap();

        assert!(!gateway.exists(ProductId::new(99)).await.unwrap());
    }

    #[tokio::test]
    async fn test_server_error_is_not_existence() {
        let base = spawn_inventory().await;
        let gateway = HttpInventoryGateway::new(base, Duration::from_secs(2)).unwrap();

        let result = gateway.exists(ProductId::new(500)).await;
        assert!(matches!(result, Err(InventoryError::Status(500))));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_an_error() {
        let base = spawn_inventory().await;
        let gateway = HttpInventoryGateway::new(base, Duration::from_secs(2)).unwrap();

        let result = gateway.exists(ProductId::new(777)).await;
        assert!(matches!(result, Err(InventoryError::Request(_))));
    }

    #[tokio::test]
    async fn test_unreachable_inventory_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway =
            HttpInventoryGateway::new(format!("http://{addr}"), Duration::from_millis(500)).unwrap();
        assert!(gateway.exists(ProductId::new(5)).await.is_err());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let gateway =
            HttpInventoryGateway::with_client(reqwest::Client::new(), "http://inventory:8080/");
        assert_eq!(gateway.base_url(), "http://inventory:8080");
    }
}
