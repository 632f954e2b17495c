//! Environment-driven configuration.

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,
    /// Optional NATS endpoint for best-effort cart events.
    pub nats_url: Option<String>,
    /// HTTP listen port.
    pub port: u16,
    /// Max Postgres pool connections.
    pub max_db_connections: u32,
    /// Days of inactivity before an abandoned cart expires.
    pub cart_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let nats_url = std::env::var("NATS_URL").ok();
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8084".to_string())
            .parse()
            .context("PORT must be a valid u16")?;
        let max_db_connections = std::env::var("MAX_DB_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("MAX_DB_CONNECTIONS must be a valid u32")?;
        let cart_ttl_days = std::env::var("CART_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("CART_TTL_DAYS must be a valid integer")?;
        Ok(Self {
            database_url,
            nats_url,
            port,
            max_db_connections,
            cart_ttl_days,
        })
    }
}
