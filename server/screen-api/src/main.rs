//! Binary entrypoint for the screen API.

use clap::Parser;
use sqlx_postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screen_api::{AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "screen_api=info,tower_http=info".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::parse();

  let pool = PgPoolOptions::new()
    .max_connections(config.max_connections)
    .connect(&config.database_url)
    .await?;
  let state = Arc::new(AppState { pool });

  let app = screen_api::router(state);

  let addr = config.addr();
  tracing::info!(%addr, "screen-api listening");

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
