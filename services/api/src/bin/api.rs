//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        FsBlobStore, LopdfTextExtractor, OpenAiOcrAdapter, PdfiumRasterizer, PgObjectStore,
        TantivySearchIndex,
    },
    config::{Config, StoreBackend},
    error::ApiError,
    web::{
        router,
        state::{AppState, PipelineSettings, Ports},
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use slide_search_core::memory::InMemoryObjectStore;
use slide_search_core::ports::{ObjectStore, SearchIndex};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Object Store ---
    let store: Arc<dyn ObjectStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| ApiError::Internal("DATABASE_URL is required".to_string()))?;
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let pg_store = PgObjectStore::new(db_pool);
            info!("Running database migrations...");
            pg_store.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(pg_store)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory object store; records are lost on shutdown.");
            Arc::new(InMemoryObjectStore::new())
        }
    };

    // --- 3. Blob Store & Search Index ---
    let blobs = Arc::new(FsBlobStore::open(&config.data_dir).await?);
    info!("Storing PDFs in {}", blobs.root().display());

    let index: Arc<dyn SearchIndex> = match &config.index_dir {
        Some(path) => Arc::new(TantivySearchIndex::open_or_create(path)?),
        None => Arc::new(TantivySearchIndex::in_memory()?),
    };

    // --- 4. Document Processing Adapters ---
    let rasterizer = PdfiumRasterizer::new(config.pdfium_library_path.clone(), config.render_width);
    if let Err(e) = rasterizer.check_library() {
        warn!("{}; uploads will fail until Pdfium is available", e);
    }

    let openai_config = OpenAIConfig::new()
        .with_api_base(&config.ocr_api_base)
        .with_api_key(&config.ocr_api_key);
    let ocr_adapter = Arc::new(OpenAiOcrAdapter::new(
        Client::with_config(openai_config),
        config.ocr_model.clone(),
        config.ocr_prompt.clone(),
        config.ocr_timeout,
    ));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        Ports {
            store,
            blobs,
            index: index.clone(),
            rasterizer: Arc::new(rasterizer),
            extractor: Arc::new(LopdfTextExtractor),
            ocr: ocr_adapter,
        },
        PipelineSettings::from(config.as_ref()),
    ));

    let abandoned = app_state.jobs.fail_abandoned().await?;
    if abandoned > 0 {
        warn!("Marked {} interrupted ingestion jobs as failed.", abandoned);
    }

    // A RAM index starts empty and always needs a rebuild.
    if config.reindex_on_start || config.index_dir.is_none() {
        let indexed = app_state.writer.reindex_all().await?;
        info!("Search index rebuilt with {} documents.", indexed);
    }

    // --- 6. Create the Web Router ---
    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new().allow_origin(origin.parse::<HeaderValue>().map_err(|e| {
            ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", origin, e))
        })?),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
    .allow_headers([CONTENT_TYPE]);

    let app = router(app_state.clone()).layer(cors);

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped. Cancelling in-flight ingestions...");
    app_state.jobs.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
