use anyhow::anyhow;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entity_dossier_api::config::Config;
use entity_dossier_api::handlers::{self, AppState};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, builds one client per vendor
/// and serves the lookup and screening routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "entity_dossier_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let port = config.port;
    let app_state = Arc::new(AppState::from_config(config)?);
    tracing::info!("✓ Vendor clients initialized (FCA, Companies House, D&B, Bridger)");

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow!("invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        // Entity lookup
        .route("/api/v1/sources/:source/search", get(handlers::search))
        .route("/api/v1/sources/:source/entities/:key", get(handlers::get_dossier))
        // Screening
        .route("/api/v1/screening/person", post(handlers::screen_person))
        .route("/api/v1/screening/entity", post(handlers::screen_entity))
        .route("/api/v1/screening/batch", post(handlers::screen_batch))
        .route(
            "/api/v1/screening/results/:screening_id",
            get(handlers::get_screening),
        )
        .route("/api/v1/screening/lists", get(handlers::screening_lists))
        .layer(
            ServiceBuilder::new()
                // Batches are the largest bodies; 1MB covers the subject limit
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
