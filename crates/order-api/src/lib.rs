//! HTTP API of the order service.
//!
//! Serves order placement and lookup, and runs the two background tasks the
//! service needs: the `orders.shipped` consumer and the outbox relay.

pub mod config;
pub mod error;
pub mod routes;
pub mod workers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use event_bus::EventBus;
use metrics_exporter_prometheus::PrometheusHandle;
use order_service::{InventoryGateway, OrderService, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G, B>(state: Arc<AppState<S, G, B>>, metrics_handle: PrometheusHandle) -> Router
where
    S: OrderStore + 'static,
    G: InventoryGateway + 'static,
    B: EventBus + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, G, B>))
        .route("/orders/{id}", get(routes::orders::get::<S, G, B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wraps an order service into application state.
pub fn create_state<S, G, B>(orders: Arc<OrderService<S, G, B>>) -> Arc<AppState<S, G, B>> {
    Arc::new(AppState { orders })
}
