//! Service configuration, from CLI flags or the environment.

use clap::Parser;
use std::time::Duration;

pub const MEMORY_DATABASE_URL: &str = "memory://";

#[derive(Debug, Clone, Parser)]
#[command(name = "audiophile-checkout", about = "Audiophile cart and checkout service", long_about = None)]
pub struct Config {
    /// `PostgreSQL` connection string, or `memory://` for the in-process store
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Listen port on 0.0.0.0
    #[arg(long, env = "PORT", default_value_t = 8083)]
    pub port: u16,

    /// Connection pool size
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// Seconds to wait for a pooled connection before failing the request
    #[arg(long, env = "DATABASE_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub database_acquire_timeout_secs: u64,

    /// Request deadline in seconds; a request still running is dropped,
    /// rolling back its open transaction
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// NATS server for order notifications
    #[arg(long, env = "NATS_URL")]
    pub nats_url: Option<String>,
}

impl Config {
    /// Load configuration from `.env`, the environment and CLI arguments.
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();
        Self::try_parse()
    }

    pub fn uses_memory_store(&self) -> bool { self.database_url == MEMORY_DATABASE_URL }

    pub fn nats_url(&self) -> Option<&str> { self.nats_url.as_deref().filter(|url| !url.is_empty()) }

    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

    pub fn database_acquire_timeout(&self) -> Duration { Duration::from_secs(self.database_acquire_timeout_secs) }
}
