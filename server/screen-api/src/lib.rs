//! PR Risk Screen API
//!
//! HTTP service behind the PR risk dashboard. Reads predictions persisted in
//! pr_prediction_results (risk distribution, repo efficiency, top/random PRs,
//! PR detail, 7-day trends) and stores new ones scored by pr-risk.
//! Bind to 127.0.0.1 by default (internal only).

pub mod config;
mod date;
mod error;
mod handlers;
pub mod queries;
mod state;
pub mod types;

use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use handlers::{core_data, health, ingest, pr_detail, time_trend};
pub use state::AppState;

/// Every route the dashboard uses, with CORS open to the frontend.
pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(health))
    .route("/api/screen/core-data", get(core_data))
    .route("/api/screen/pr-detail/:pr_id", get(pr_detail))
    .route("/api/screen/time-trend", get(time_trend))
    .route("/api/predictions", post(ingest))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
