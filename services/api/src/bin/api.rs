//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, GeminiAdapter, HttpFetcher, ImageCrateProcessor, S3ObjectStore,
    },
    config::Config,
    error::ApiError,
    reaper::spawn_reaper,
    web::{
        rest::ApiDoc,
        router,
        state::{AppState, Ports},
    },
};
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let object_store = Arc::new(S3ObjectStore::new(&config.storage).await);
    let gemini_client = GeminiAdapter::client_for(&config.gemini_api_base, &config.gemini_api_key);
    let ai_adapter = Arc::new(GeminiAdapter::new(
        gemini_client,
        config.vision_model.clone(),
        config.summary_model.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        Ports {
            trips: db_adapter.clone(),
            items: db_adapter.clone(),
            objects: object_store,
            ledger: db_adapter,
            ai: ai_adapter,
            imaging: Arc::new(ImageCrateProcessor::new()),
            fetcher: Arc::new(HttpFetcher::default()),
        },
        config.ingestion_limits(),
        config.download_cache_entries,
    ));

    // --- 5. Start Background Tasks ---
    let shutdown = CancellationToken::new();
    let reaper = spawn_reaper(
        app_state.deleter.clone(),
        config.reaper_interval,
        shutdown.clone(),
    );

    // --- 6. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = router(app_state)
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = reaper.await {
        tracing::error!("Reaper task ended abnormally: {}", e);
    }
    info!("Server stopped.");
    Ok(())
}
