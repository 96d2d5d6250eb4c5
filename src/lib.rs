// Library exports for the binary and tests
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use config::Config;
use middleware::rate_limit::RateLimiter;
use services::auth::AuthGateway;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub gateway: Arc<AuthGateway>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}
