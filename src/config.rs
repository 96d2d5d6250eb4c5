use std::env;

/// Explicit runtime configuration, injected wherever it is needed — never a
/// hidden global, so tests can construct gateways with their own secrets and
/// lifetimes.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub token_secret: String,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub rate_limit_max_attempts: u64,
    pub rate_limit_window_seconds: u64,
    pub session_sweep_interval_seconds: u64,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            token_secret: required("AUTH_TOKEN_SECRET")?,
            access_token_ttl_seconds: env::var("ACCESS_TOKEN_TTL_SECONDS")
                .unwrap_or_else(|_| "86400".into())
                .parse()?,
            refresh_token_ttl_seconds: env::var("REFRESH_TOKEN_TTL_SECONDS")
                .unwrap_or_else(|_| "2592000".into())
                .parse()?,
            rate_limit_max_attempts: env::var("RATE_LIMIT_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            rate_limit_window_seconds: env::var("RATE_LIMIT_WINDOW_SECONDS")
                .unwrap_or_else(|_| "300".into())
                .parse()?,
            session_sweep_interval_seconds: env::var("SESSION_SWEEP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "3600".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
