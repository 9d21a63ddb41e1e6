// Main entry point for the scheduler server.

use std::sync::Arc;

use anyhow::{Context, Result};
use scheduler_core::common::SystemClock;
use scheduler_core::domains::mail::GmailSender;
use scheduler_core::domains::reply::GmailReplyDetector;
use scheduler_core::kernel::ServerKernel;
use scheduler_core::server::build_app;
use scheduler_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scheduler_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting email sequence scheduler");

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!("configuration loaded");

    tracing::info!("connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    tracing::info!("database connected");

    tracing::info!("running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!("migrations complete");

    let config = Arc::new(config);
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let mail_sender = Arc::new(GmailSender::new(http_client.clone(), config.clone()));
    let reply_detector = Arc::new(GmailReplyDetector::new(http_client, config.clone()));
    let clock = Arc::new(SystemClock);

    let kernel = ServerKernel::new(pool, mail_sender, reply_detector, clock, config.clone());

    let app = build_app(kernel);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "starting server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
