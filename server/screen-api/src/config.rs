//! Service configuration from flags or environment.

use clap::Parser;
use std::net::{IpAddr, SocketAddr};

#[derive(Parser, Debug, Clone)]
#[command(name = "screen-api", about = "Dashboard API over persisted PR risk predictions")]
pub struct Config {
  /// PostgreSQL connection string
  #[arg(long, env = "DATABASE_URL")]
  pub database_url: String,

  /// Listen port
  #[arg(long, env = "PORT", default_value_t = 5000)]
  pub port: u16,

  /// Listen address (internal only by default)
  #[arg(long, env = "BIND", default_value = "127.0.0.1")]
  pub bind: IpAddr,

  /// Connection pool size
  #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
  pub max_connections: u32,
}

impl Config {
  pub fn addr(&self) -> SocketAddr {
    SocketAddr::new(self.bind, self.port)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_invalid_port() {
    let err = Config::try_parse_from([
      "screen-api",
      "--database-url",
      "postgres://db/screen",
      "--port",
      "http",
    ]);
    assert!(err.is_err());
  }

  #[test]
  fn flags_override_defaults() {
    let config = Config::try_parse_from([
      "screen-api",
      "--database-url",
      "postgres://db/screen",
      "--port",
      "8080",
      "--bind",
      "0.0.0.0",
    ])
    .unwrap();
    assert_eq!(config.addr().to_string(), "0.0.0.0:8080");
  }
}
