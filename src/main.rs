mod config;
mod metrics;
mod models;
mod routes;
mod services;

use axum::{routing::get, Router};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::stalker::{build_http_client, HandshakeProber, PortalClient};
use crate::services::xtream::XtreamClient;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub prober: HandshakeProber,
    pub portal: PortalClient,
    pub xtream: XtreamClient,
    pub proxy_http: Client,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let portal_timeout = Duration::from_millis(config.portal_timeout_ms);
        let prime_timeout = Duration::from_millis(config.portal_prime_timeout_ms);

        // Portal-facing client: certificate verification disabled
        let portal_http = build_http_client(portal_timeout)?;

        // No total timeout: proxied bodies may stream indefinitely
        let proxy_http = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_millis(config.proxy_timeout_ms))
            .build()?;

        Ok(Self {
            prober: HandshakeProber::new(portal_http.clone(), portal_timeout, prime_timeout),
            xtream: XtreamClient::new(portal_http.clone(), portal_timeout),
            portal: PortalClient::new(portal_http, portal_timeout),
            proxy_http,
            config,
            start_time: Instant::now(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stalker_gateway=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting Stalker Gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.node_env);
    tracing::info!(
        "Portal timeout: {}ms, handshake deadline: {:?}",
        config.portal_timeout_ms,
        config.handshake_deadline_ms
    );

    let state = Arc::new(AppState::new(config)?);

    // Build router
    let app = Router::new()
        // Health endpoints
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/ready", get(routes::health::ready))
        .route("/live", get(routes::health::live))
        // Stalker portal control endpoint
        .route("/api/stalker", get(routes::stalker::stalker_api))
        // Xtream Codes login
        .route("/api/xtream/login", get(routes::xtream::login))
        // Byte proxy and M3U playlists
        .route("/api/proxy", get(routes::proxy::proxy))
        .route("/api/playlist", get(routes::playlist::get_playlist))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
