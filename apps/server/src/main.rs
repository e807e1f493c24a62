mod api;
mod config;
mod error;

use std::sync::Arc;

use anyhow::Context;
use quotewatch_market_data::{
    ChainConfig, CoinGeckoSource, DexScreenerSource, SourceRegistry,
};

use api::AppState;
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    init_tracing();

    let state = build_state(&config)?;
    let router = api::app_router(state);

    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let mut registry = SourceRegistry::new();

    let api_key = config.coingecko_api_key.clone();
    registry.register("coingecko", move || {
        Arc::new(match &api_key {
            Some(key) => CoinGeckoSource::with_api_key(key.clone()),
            None => CoinGeckoSource::new(),
        })
    });
    registry.register("dexscreener", || Arc::new(DexScreenerSource::new()));

    let priority: Vec<&str> = config.sources.iter().map(String::as_str).collect();
    let chain = registry
        .build_chain(
            &priority,
            ChainConfig {
                cache_max_age: Some(config.cache_max_age),
                ..Default::default()
            },
        )
        .context("failed to build source chain")?;

    Ok(AppState {
        chain: Arc::new(chain),
    })
}
