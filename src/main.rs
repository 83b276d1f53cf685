//! Stockpile - Main Entry Point

use std::sync::Arc;

use stockpile::api::routes::create_router;
use stockpile::api::AppState;
use stockpile::auth::{Authenticator, TokenStore};
use stockpile::config::Config;
use stockpile::error::Result;
use stockpile::failures::FailureRecorder;
use stockpile::models::repository::load_repositories;
use stockpile::proxy::{HttpUpstreamClient, ProxyFetcher};
use stockpile::resolver::ContentResolver;
use stockpile::stats::StatsRecorder;
use stockpile::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    telemetry::init_tracing(&config.log_level);
    tracing::info!("Starting Stockpile");

    let repositories =
        load_repositories(&config.repositories_file, &config.storage_path).await?;
    tracing::info!(count = repositories.len(), "Repositories loaded");

    let tokens = Arc::new(TokenStore::load(config.tokens_file.clone()).await?);
    provision_root_token(&tokens).await?;

    let client = Arc::new(HttpUpstreamClient::new()?);
    let resolver = ContentResolver::new(Arc::new(ProxyFetcher::new(client)));

    let state = Arc::new(AppState {
        config: config.clone(),
        repositories,
        authenticator: Authenticator::new(Arc::clone(&tokens)),
        tokens,
        resolver,
        stats: StatsRecorder::new(),
        failures: FailureRecorder::new(),
    });

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(address = %config.bind_address, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Provision a root management token on first boot.
///
/// The generated secret is printed to the log exactly once; only its hash
/// survives in the token file.
async fn provision_root_token(tokens: &Arc<TokenStore>) -> Result<()> {
    if !tokens.is_empty().await {
        return Ok(());
    }
    let secret = TokenStore::generate_secret();
    tokens.create("admin", "/", &secret, true, true).await?;
    tracing::warn!(
        alias = "admin",
        secret = %secret,
        "First boot: management token created. Store this secret now; it will not be shown again"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down");
}
