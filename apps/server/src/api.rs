//! HTTP API over the fallback chain.
//!
//! Exposes the chain's three operations at the ingestion boundary:
//! fetching a value by key, and the health and breaker snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use quotewatch_market_data::{FallbackChain, FeedKey, FeedStatus, HealthRecord, PriceQuote};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<FallbackChain>,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/quotes/{key}", get(get_quote))
        .route("/api/feed/health", get(get_health))
        .route("/api/feed/breakers", get(get_breakers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Fetch the freshest trustworthy value for a key, e.g.
/// `/api/quotes/spot:BTC`.
async fn get_quote(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PriceQuote>, ApiError> {
    let key: FeedKey = key.parse()?;
    let quote = state.chain.fetch(&key).await?;

    // The chain never returns DOWN values; reject defensively anyway
    // rather than persist or serve garbage.
    if quote.status == FeedStatus::Down {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("refusing to serve DOWN value from '{}'", quote.source),
        ));
    }

    Ok(Json(quote))
}

/// Point-in-time health snapshot for every configured source.
async fn get_health(State(state): State<AppState>) -> Json<BTreeMap<String, HealthRecord>> {
    Json(state.chain.health().into_iter().collect())
}

/// Observable breaker state for every configured source.
async fn get_breakers(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    let states = state
        .chain
        .breaker_states()
        .into_iter()
        .map(|(name, state)| (name, state.to_string()))
        .collect();
    Json(states)
}
