use std::env;
use std::time::Duration;

const DEFAULT_LEDGER_RPC_URL: &str = "http://127.0.0.1:8899";
const DEFAULT_LEDGER_WS_URL: &str = "ws://127.0.0.1:8900/events";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Inference service
    pub inference_url: String,
    pub inference_api_key: String,
    pub inference_model: String,

    // Settlement ledger
    pub ledger_rpc_url: String,
    pub ledger_ws_url: String,
    // Oracle credentials (optional — without them ledger writes are skipped)
    pub ledger_api_key: Option<String>,
    pub ledger_api_secret: Option<String>,

    // Scheduling
    pub update_interval_minutes: u64,
    pub active_market_threshold_hours: i64,
    pub cache_ttl_minutes: u64,
    pub batch_size: usize,

    // Spike detection
    pub velocity_threshold: f64,
    pub spike_cooldown_ms: u64,

    // Circuit breaker
    pub breaker_threshold: u32,
    pub breaker_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            inference_url: env::var("INFERENCE_URL")
                .map_err(|_| anyhow::anyhow!("INFERENCE_URL must be set"))?,
            inference_api_key: env::var("INFERENCE_API_KEY")
                .map_err(|_| anyhow::anyhow!("INFERENCE_API_KEY must be set"))?,
            inference_model: env::var("INFERENCE_MODEL")
                .unwrap_or_else(|_| "trend-analyst".into()),

            ledger_rpc_url: env::var("LEDGER_RPC_URL")
                .unwrap_or_else(|_| DEFAULT_LEDGER_RPC_URL.into()),
            ledger_ws_url: env::var("LEDGER_WS_URL")
                .unwrap_or_else(|_| DEFAULT_LEDGER_WS_URL.into()),
            ledger_api_key: env::var("LEDGER_API_KEY").ok(),
            ledger_api_secret: env::var("LEDGER_API_SECRET").ok(),

            update_interval_minutes: parse_or("TREND_UPDATE_INTERVAL_MINUTES", 5),
            active_market_threshold_hours: parse_or("TREND_ACTIVE_MARKET_THRESHOLD_HOURS", 1),
            cache_ttl_minutes: parse_or("TREND_CACHE_TTL_MINUTES", 5),
            batch_size: parse_or("TREND_BATCH_SIZE", 5),

            velocity_threshold: parse_or("SPIKE_VELOCITY_THRESHOLD", 5.0),
            spike_cooldown_ms: parse_or("SPIKE_COOLDOWN_MS", 120_000),

            breaker_threshold: parse_or("BREAKER_FAILURE_THRESHOLD", 5),
            breaker_timeout_ms: parse_or("BREAKER_TIMEOUT_MS", 60_000),
        })
    }

    /// Returns true if both oracle credentials for ledger writes are set.
    pub fn has_ledger_auth(&self) -> bool {
        self.ledger_api_key.is_some() && self.ledger_api_secret.is_some()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes * 60)
    }

    pub fn spike_cooldown(&self) -> Duration {
        Duration::from_millis(self.spike_cooldown_ms)
    }

    pub fn breaker_timeout(&self) -> Duration {
        Duration::from_millis(self.breaker_timeout_ms)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
