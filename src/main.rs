use axum::{routing::get, Json, Router};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use duka_backend::api::orders::OrdersState;
use duka_backend::api::payments::PaymentsState;
use duka_backend::config::AppConfig;
use duka_backend::database::ledger_repository::IpnLedgerRepository;
use duka_backend::database::order_repository::{OrderRepository, OrderStore};
use duka_backend::database::product_repository::{ProductCatalog, ProductRepository};
use duka_backend::gateway::{PaymentGateway, PesapalClient};
use duka_backend::health::HealthChecker;
use duka_backend::logging::init_tracing;
use duka_backend::services::checkout::CheckoutService;
use duka_backend::services::notification::{EmailNotifier, NotificationSink};
use duka_backend::services::reconciliation::ReconciliationEngine;
use duka_backend::{api, database, health};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "duka-backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {e}");
        anyhow::anyhow!(e)
    })?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.pesapal.environment,
        "Starting duka backend service"
    );

    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e)
        })?;

    database::run_migrations(&db_pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!("Database ready, migrations applied");

    if config.pesapal.ipn_id.is_none() {
        warn!(
            "PESAPAL_IPN_ID is not set; register the IPN channel via \
             POST /api/payments/ipn-registration and restart with the id"
        );
    }

    // Service graph
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(PesapalClient::new(config.pesapal.clone()).map_err(|e| anyhow::anyhow!(e))?);
    let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db_pool.clone()));
    let catalog: Arc<dyn ProductCatalog> = Arc::new(ProductRepository::new(db_pool.clone()));
    let ledger = Arc::new(IpnLedgerRepository::new(
        db_pool.clone(),
        config.pesapal.ledger_reclaim_secs,
    ));
    let notifier: Arc<dyn NotificationSink> = Arc::new(EmailNotifier::new(
        config.email.resend_api_key.clone(),
        config.email.from_address.clone(),
    ));

    let engine = Arc::new(ReconciliationEngine::new(
        gateway.clone(),
        orders.clone(),
        ledger,
        notifier,
    ));
    let checkout = Arc::new(CheckoutService::new(
        catalog,
        orders.clone(),
        gateway.clone(),
        config.checkout.clone(),
        config.pesapal.clone(),
    ));

    let health_checker = Arc::new(HealthChecker::new(db_pool.clone()));

    let orders_state = Arc::new(OrdersState {
        checkout,
        orders: orders.clone(),
    });
    let payments_state = Arc::new(PaymentsState {
        engine,
        gateway,
        orders,
        config: config.pesapal.clone(),
    });

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/health/live", get(health::liveness))
        .with_state(health_checker);

    let app = Router::new()
        .route("/", get(root))
        .merge(health_routes)
        .merge(api::orders_router(orders_state))
        .merge(api::payments_router(payments_state))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
