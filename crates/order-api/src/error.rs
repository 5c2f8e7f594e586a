//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use order_service::OrderServiceError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Order service error.
    Order(OrderServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Order(err) => order_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderServiceError) -> (StatusCode, String) {
    match &err {
        OrderServiceError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        OrderServiceError::InvalidOrder(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        OrderServiceError::GatewayUnavailable(_) => {
            (StatusCode::FAILED_DEPENDENCY, err.to_string())
        }
        OrderServiceError::Store(_) | OrderServiceError::MalformedEvent(_) => {
            tracing::error!(error = %err, "order request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        ApiError::Order(err)
    }
}
