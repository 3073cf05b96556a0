use std::{net::SocketAddr, sync::Arc};

use tracing::info;
use tracing_subscriber::EnvFilter;

mod acquire;
use acquire::ImageFetcher;
mod catalog;
use catalog::Catalog;
mod error;
mod model;
use model::AspectRatioClassifier;
mod routes;
use routes::AppState;
mod utils;
use utils::get_env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = get_env()?;
    info!("Initializing waste classifier...");

    let state = Arc::new(AppState {
        catalog: Catalog::new(),
        classifier: Arc::new(AspectRatioClassifier::new()),
        fetcher: ImageFetcher::new(&config.ipfs_gateway, config.fetch_timeout)?,
    });

    let app = routes::app(state, config.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Using IPFS gateway {}", config.ipfs_gateway);
    info!("Listening on http://{}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
