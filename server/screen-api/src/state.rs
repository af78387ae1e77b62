//! Shared handler state.

use sqlx_postgres::PgPool;

pub struct AppState {
  pub pool: PgPool,
}
