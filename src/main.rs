use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::{delete, get, post},
    Extension, Router,
};
use redis::Client as RedisClient;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auction_auth_api::{
    config::Config,
    db,
    middleware::rate_limit::{RateLimiter, RedisRateLimiter},
    routes,
    services::{auth::AuthGateway, session::SessionStore, sweeper},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let redis_client = RedisClient::open(config.redis_url.as_str())?;
    let redis_conn = redis_client.get_multiplexed_async_connection().await?;
    info!("Redis connected");

    let gateway = Arc::new(AuthGateway::new(&config, pool.clone()));
    let rate_limiter: Arc<dyn RateLimiter> = Arc::new(RedisRateLimiter::new(redis_conn));

    sweeper::start(
        SessionStore::new(pool.clone()),
        config.session_sweep_interval_seconds,
    );

    let state = AppState {
        db: pool,
        config: config.clone(),
        gateway: gateway.clone(),
        rate_limiter,
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(Any);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/logout-all", post(routes::auth::logout_all))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/change-password", post(routes::auth::change_password))
        // Sessions
        .route("/sessions", get(routes::sessions::list_sessions))
        .route("/sessions/{id}", delete(routes::sessions::revoke_session))
        .route("/sessions/{id}/flag", post(routes::sessions::flag_session))
        .route("/admin/sessions/sweep", post(routes::sessions::sweep_sessions))
        .layer(Extension(gateway))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("auction auth API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
