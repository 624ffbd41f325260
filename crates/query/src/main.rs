//! NewsRAG Query Service
//!
//! HTTP API for question answering over the ingested news corpus.
//! Handles:
//! - URL-aware retrieval with inline ingestion of unknown article URLs
//! - Semantic search over chunk embeddings
//! - Grounded answer generation with source citations
//! - Observability (logging, metrics, tracing)

mod answer;
mod generate;
mod handlers;
mod retrieval;

use crate::answer::AnswerService;
use crate::generate::create_generator;
use crate::retrieval::Retriever;
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use newsrag_common::{
    config::AppConfig,
    db::{DbPool, PgStore, Store},
    embeddings::create_embedder,
    metrics::register_metrics,
    VERSION,
};
use newsrag_ingestion::{ChunkingConfig, HttpFetcher, IngestionProcessor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub answer_service: Arc<AnswerService>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting NewsRAG Query Service v{}", VERSION);

    let config = Arc::new(config);

    // Initialize metrics
    register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.ensure_schema(config.embedding.dimension).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db));

    // Initialize embedder and generator
    let embedder = create_embedder(&config.embedding);
    info!(
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    let generator = create_generator(&config.generation);
    info!(model = %generator.model_name(), "Generator initialized");

    // Inline ingestion shares the worker's pipeline
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout())?);
    let processor = Arc::new(IngestionProcessor::new(
        Arc::clone(&store),
        Arc::clone(&embedder),
        fetcher,
        config.ingest.min_paragraph_len,
        ChunkingConfig {
            chunk_size: config.ingest.chunk_size,
            chunk_overlap: config.ingest.chunk_overlap,
        },
    ));

    let retriever = Retriever::new(Arc::clone(&store), embedder, processor);
    let answer_service = Arc::new(AnswerService::new(retriever, generator));

    // Create app state
    let state = AppState {
        config: config.clone(),
        store,
        answer_service,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();
    let timeout = TimeoutLayer::new(state.config.request_timeout());

    let api_routes = Router::new().route("/query", post(handlers::query::query));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
