// External crates
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;

// Local modules
use stocks_guru::api;
use stocks_guru::built_info;
use stocks_guru::config::ServerConfig;
use stocks_guru::data::{CsvPriceStore, InMemoryRepository, PriceRepository, YahooFinanceFeed};
use stocks_guru::service::{ForecastService, ServiceConfig};
use stocks_guru::util::model_utils::ModelStore;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    info!(
        "stocks-guru {} ({}) starting",
        built_info::PKG_VERSION,
        built_info::PROFILE
    );

    match config.price_store.clone() {
        Some(path) => {
            let store = CsvPriceStore::open(&path)
                .with_context(|| format!("Failed to open price store {}", path.display()))?;
            info!("Stored prices: {}", path.display());
            serve(config, store).await
        }
        None => {
            info!("Stored prices: in memory");
            serve(config, InMemoryRepository::new()).await
        }
    }
}

async fn serve<R: PriceRepository + 'static>(config: ServerConfig, repository: R) -> Result<()> {
    let service = Arc::new(ForecastService::new(
        repository,
        YahooFinanceFeed::new(&config.yahoo_base_url),
        ModelStore::new(&config.model_dir),
        ServiceConfig::with_model_name(&config.model_name),
    ));
    let app = api::router(service, &config.base_route);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!(
        "Listening on {} (models in {}, stocks routes at '{}')",
        config.bind,
        config.model_dir.display(),
        config.base_route
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
}
