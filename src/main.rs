use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing::info;

use storefront_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db = Arc::new(
        api::db::establish_connection(&cfg.database_url)
            .await
            .context("failed to connect to the database")?,
    );

    // Init the staging store (Redis)
    let redis_client =
        redis::Client::open(cfg.redis_url.clone()).context("invalid redis url")?;
    let redis_manager = redis_client
        .get_tokio_connection_manager()
        .await
        .context("failed to connect to redis")?;

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Build services
    let cfg = Arc::new(cfg);
    let staging: Arc<dyn api::staging::StagedOrderStore> =
        Arc::new(api::staging::RedisStagedOrderStore::new(
            redis_manager,
            Duration::from_secs(cfg.staging.ttl_secs),
            Duration::from_millis(cfg.staging.timeout_ms),
        ));

    let lookup_timeout = Duration::from_millis(cfg.lookups.timeout_ms);
    let basket = Arc::new(api::clients::HttpBasketClient::new(
        cfg.lookups.basket_url.clone(),
        lookup_timeout,
    )?);
    let catalog = Arc::new(api::clients::HttpCatalogClient::new(
        cfg.lookups.catalog_url.clone(),
        lookup_timeout,
    )?);
    let customers = Arc::new(api::clients::HttpCustomerClient::new(
        cfg.lookups.customer_url.clone(),
        lookup_timeout,
    )?);
    let coupons = Arc::new(api::clients::HttpCouponClient::new(
        cfg.lookups.coupon_url.clone(),
        lookup_timeout,
    )?);
    let routing = Arc::new(api::clients::HttpRouteClient::new(
        cfg.routing.base_url.clone(),
        Duration::from_millis(cfg.routing.timeout_ms),
    )?);

    let orders = Arc::new(api::services::OrderService::new(
        db.clone(),
        event_sender.clone(),
    ));
    let checkout = Arc::new(api::services::CheckoutService::new(
        staging,
        basket,
        catalog,
        customers,
        coupons,
        routing,
        orders.clone(),
        event_sender.clone(),
        cfg.currency.clone(),
    ));

    let state = Arc::new(api::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        services: api::handlers::AppServices { checkout, orders },
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::app_router(state)
        .layer(cors)
        .layer(CompressionLayer::new());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    info!("storefront-api listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

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

    info!("shutdown signal received");
}
