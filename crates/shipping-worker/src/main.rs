//! Shipping worker entry point.

use std::sync::Arc;

use event_bus::{EventBus, InMemoryEventBus, PostgresEventBus};
use metrics_exporter_prometheus::PrometheusHandle;
use shipping_service::{
    InMemoryShipmentStore, PostgresShipmentStore, ShipmentStore, ShippingService,
};
use shipping_worker::config::Config;
use shipping_worker::workers::Workers;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve<S, B>(config: Config, store: S, bus: B, metrics_handle: PrometheusHandle)
where
    S: ShipmentStore + Clone + 'static,
    B: EventBus + Clone + 'static,
{
    let service = Arc::new(ShippingService::new(
        store.clone(),
        bus.clone(),
        config.topics().orders_shipped,
    ));

    let workers = Workers::spawn(service.clone(), store, bus, &config);
    let app = shipping_worker::create_app(shipping_worker::create_state(service), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting shipping worker");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    workers.shutdown().await;
    tracing::info!("shipping worker shut down gracefully");
}

async fn connect(config: &Config, url: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_timeout)
        .connect(url)
        .await
        .expect("failed to connect to database")
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.database_url.clone() {
        Some(url) => {
            let pool = connect(&config, &url).await;
            let bus_pool = match config.bus_url() {
                Some(bus_url) if bus_url != url => connect(&config, bus_url).await,
                _ => {
                    tracing::warn!(
                        "BUS_DATABASE_URL not set, keeping the event log in the shipment database"
                    );
                    pool.clone()
                }
            };

            let bus = PostgresEventBus::with_partitions(bus_pool, config.bus_partitions);
            bus.run_migrations()
                .await
                .expect("failed to run bus migrations");
            let store = PostgresShipmentStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run shipment migrations");

            serve(config, store, bus, metrics_handle).await;
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set, using in-memory store and bus; no orders will arrive from other processes"
            );
            let bus = InMemoryEventBus::with_partitions(config.bus_partitions);
            serve(config, InMemoryShipmentStore::new(), bus, metrics_handle).await;
        }
    }
}
