//! SipStream cart service binary.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sipstream_cart::config::Config;
use sipstream_cart::http;
use sipstream_cart::service::CartService;
use sipstream_cart::sink::NatsSink;
use sipstream_cart::store::{PgCartStore, PgCatalog};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let sink = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => NatsSink::new(client),
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable, cart events disabled");
                NatsSink::disabled()
            }
        },
        None => NatsSink::disabled(),
    };

    let service = Arc::new(CartService::new(
        PgCartStore::new(db.clone()),
        PgCatalog::new(db),
        sink,
        config.cart_ttl_days,
    ));
    let app = http::router(service);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("sipstream-cart listening on {addr}");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
