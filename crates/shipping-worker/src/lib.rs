//! Process hosting the shipping service.
//!
//! Runs the `orders.placed` consumer and the shipment outbox relay, and
//! serves health, metrics and shipment lookups for operators.

pub mod config;
pub mod error;
pub mod routes;
pub mod workers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use event_bus::EventBus;
use metrics_exporter_prometheus::PrometheusHandle;
use shipping_service::{ShipmentStore, ShippingService};
use tower_http::trace::TraceLayer;

use routes::shipments::AppState;

/// Creates the operator router.
pub fn create_app<S, B>(state: Arc<AppState<S, B>>, metrics_handle: PrometheusHandle) -> Router
where
    S: ShipmentStore + 'static,
    B: EventBus + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/shipments/{order_id}",
            get(routes::shipments::get_by_order::<S, B>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}

/// Wraps a shipping service into application state.
pub fn create_state<S, B>(shipping: Arc<ShippingService<S, B>>) -> Arc<AppState<S, B>> {
    Arc::new(AppState { shipping })
}
