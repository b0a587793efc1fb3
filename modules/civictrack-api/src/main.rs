use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, patch, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use civictrack_common::Config;

mod auth;
mod rate_limit;
mod rest;

use auth::JwtService;

/// Room for three 5 MB photos plus the text fields.
const MAX_UPLOAD_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct AppState {
    pub pool: sqlx::PgPool,
    pub jwt: JwtService,
    pub upload_dir: PathBuf,
    pub rate_limiter: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("civictrack=info".parse()?))
        .init();

    let config = Config::from_env()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    info!("Migrations complete");

    let upload_dir = PathBuf::from(&config.upload_dir);
    tokio::fs::create_dir_all(&upload_dir).await?;

    let state = Arc::new(AppState {
        pool,
        jwt: JwtService::new(&config.jwt_secret, "civictrack".to_string()),
        upload_dir,
        rate_limiter: Mutex::new(HashMap::new()),
    });

    let cors = if config.allowed_origins.is_empty() {
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        tower_http::cors::CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    };

    let app = Router::new()
        // Health check
        .route("/health", get(|| async { "ok" }))
        // Public API
        .route("/api/issues", post(rest::issues::api_create_issue))
        .route("/api/issues/nearby", get(rest::issues::api_issues_nearby))
        .route("/api/issues/map", get(rest::issues::api_issues_map))
        .route("/api/issues/{id}", get(rest::issues::api_issue_detail))
        .route("/api/issues/{id}/status-logs", get(rest::issues::api_issue_status_logs))
        .route("/api/issues/{id}/flag", post(rest::issues::api_flag_issue))
        .route("/api/issues/{id}/vote", post(rest::issues::api_vote_issue))
        // Admin API
        .route("/api/admin/issues/flagged", get(rest::admin::api_flagged_issues))
        .route("/api/admin/analytics", get(rest::admin::api_analytics))
        .route("/api/admin/issues/{id}/status", patch(rest::admin::api_set_status))
        .route("/api/admin/issues/{id}/hide", patch(rest::admin::api_hide_issue))
        .route("/api/admin/users/{id}/ban", patch(rest::admin::api_ban_user))
        .route("/api/admin/users/{id}/unban", patch(rest::admin::api_unban_user))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES))
        .with_state(state)
        // CORS
        .layer(cors)
        // No caching: every read re-queries the store
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency only (no query params)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.host, config.port);
    info!("CivicTrack API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
