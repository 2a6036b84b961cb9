//! DomusEye API server.
//!
//! Usage:
//!   cargo run --bin load_data    # seed sample users and listings
//!   cargo run --bin domuseye     # start the server
//!   # Then browse /swagger-ui or use the domuseye-cli client

use std::sync::Arc;
use tokio::net::TcpListener;

use domuseye::auth::TokenIssuer;
use domuseye::config::AppConfig;
use domuseye::imagekit::ImageKit;
use domuseye::llm::HostedModel;
use domuseye::logging;
use domuseye::rest::{create_router, AppState};
use domuseye::storage::Storage;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let _log_guard = logging::init(&config.log)?;

    if config.uses_dev_secret() {
        tracing::warn!("DOMUSEYE_JWT_SECRET is not set; using the development secret");
    }
    if config.llm.api_key.is_none() {
        tracing::warn!("LLM_API_KEY is not set; AI routes will return 500");
    }
    if config.imagekit.private_key.is_none() {
        tracing::warn!("IMAGEKIT_PRIVATE_KEY is not set; media routes will return 500");
    }

    let storage = Arc::new(Storage::open(&config.data_dir)?);
    tracing::info!(data_dir = %config.data_dir.display(), "storage opened");

    let http = reqwest::Client::builder()
        .user_agent(concat!("domuseye/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let state = AppState {
        storage: storage.clone(),
        tokens: Arc::new(TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            config.token_ttl_secs,
        )),
        model: Arc::new(HostedModel::new(config.llm.clone())),
        images: Arc::new(ImageKit::new(http, config.imagekit.clone())),
        max_upload_bytes: config.max_upload_bytes,
    };
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "DomusEye API listening (docs at /swagger-ui)");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let flushed = storage.flush().await?;
    tracing::info!(bytes = flushed, "storage flushed, bye");
    Ok(())
}
