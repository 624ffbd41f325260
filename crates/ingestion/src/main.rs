//! NewsRAG Ingestion Worker
//!
//! Polls the SQS ingestion queue for article URLs discovered by the
//! upstream feed pollers and runs each through the pipeline:
//! 1. Receives an `IngestionRequest` message
//! 2. Fetches and extracts the article
//! 3. Chunks, embeds, and stores it
//! 4. Deletes the message on success or benign skip

use futures::stream::{self, StreamExt};
use newsrag_common::{
    config::AppConfig,
    db::{DbPool, PgStore, Store},
    embeddings::create_embedder,
    metrics::{register_metrics, METRICS_PREFIX},
    queue::{IngestionRequest, Queue, QueueConfig},
    AppError, VERSION,
};
use newsrag_ingestion::{ChunkingConfig, HttpFetcher, IngestOutcome, IngestionProcessor};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

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

    info!("Starting NewsRAG Ingestion Worker v{}", VERSION);
    register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.ensure_schema(config.embedding.dimension).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db));

    // Initialize embedder
    let embedder = create_embedder(&config.embedding);
    info!(
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout())?);
    let processor = Arc::new(IngestionProcessor::new(
        store,
        embedder,
        fetcher,
        config.ingest.min_paragraph_len,
        ChunkingConfig {
            chunk_size: config.ingest.chunk_size,
            chunk_overlap: config.ingest.chunk_overlap,
        },
    ));

    // Initialize ingestion queue
    let queue = match config.queue.ingestion_queue_url.clone() {
        Some(url) => {
            info!(url = %url, "Connecting to ingestion queue...");
            let queue_config = QueueConfig {
                url,
                visibility_timeout: config.queue.visibility_timeout_secs,
                wait_time_seconds: config.queue.poll_timeout_secs,
                max_messages: config.queue.batch_size,
            };
            Arc::new(Queue::new(queue_config).await?)
        }
        None => {
            warn!("queue.ingestion_queue_url not set, waiting for shutdown signal...");
            tokio::signal::ctrl_c().await?;
            info!("Ingestion worker shutting down");
            return Ok(());
        }
    };

    // Malformed messages go to the dead letter queue when one is configured
    let dlq = match config.queue.dlq_url.clone() {
        Some(url) => {
            info!(url = %url, "Dead letter queue configured");
            let dlq_config = QueueConfig {
                url,
                ..QueueConfig::default()
            };
            Some(Arc::new(Queue::new(dlq_config).await?))
        }
        None => None,
    };

    info!(
        concurrency = config.ingest.worker_concurrency,
        "Ingestion worker ready, starting queue polling..."
    );

    // Circuit breaker state
    let consecutive_failures = Arc::new(AtomicU32::new(0));
    const MAX_FAILURES: u32 = 5;
    const CIRCUIT_BREAK_DURATION: std::time::Duration = std::time::Duration::from_secs(30);

    loop {
        // Circuit breaker check
        if consecutive_failures.load(Ordering::SeqCst) >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures.load(Ordering::SeqCst),
                "Circuit breaker open, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures.store(0, Ordering::SeqCst);
            info!("Circuit breaker reset, resuming...");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            result = queue.receive() => {
                match result {
                    Ok(messages) => {
                        stream::iter(messages)
                            .for_each_concurrent(config.ingest.worker_concurrency, |message| {
                                let queue = Arc::clone(&queue);
                                let processor = Arc::clone(&processor);
                                let consecutive_failures = Arc::clone(&consecutive_failures);
                                let dlq = dlq.clone();
                                async move {
                                    handle_message(
                                        &queue,
                                        &processor,
                                        &consecutive_failures,
                                        dlq.as_deref(),
                                        message,
                                    )
                                    .await;
                                }
                            })
                            .await;
                    }
                    Err(e) => {
                        consecutive_failures.fetch_add(1, Ordering::SeqCst);
                        error!(error = %e, "Failed to receive messages from queue");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!("Ingestion worker shutting down");
    Ok(())
}

async fn handle_message(
    queue: &Queue,
    processor: &IngestionProcessor,
    consecutive_failures: &AtomicU32,
    dlq: Option<&Queue>,
    message: aws_sdk_sqs::types::Message,
) {
    let receipt_handle = match message.receipt_handle.clone() {
        Some(handle) => handle,
        None => {
            warn!("Message without receipt handle, skipping");
            return;
        }
    };

    let request: IngestionRequest = match Queue::parse_message(&message) {
        Ok(request) => request,
        Err(e) => {
            // Malformed messages can never succeed; forward to the DLQ
            // when configured and drop instead of redelivering
            warn!(error = %e, "Dropping malformed queue message");
            metrics::counter!(format!("{}_queue_messages_dropped_total", METRICS_PREFIX))
                .increment(1);
            if let (Some(dlq), Some(body)) = (dlq, message.body.as_deref()) {
                if let Err(e) = dlq.send(body).await {
                    error!(error = %e, "Failed to forward message to dead letter queue");
                }
            }
            if let Err(e) = queue.delete(&receipt_handle).await {
                error!(error = %e, "Failed to delete malformed message");
            }
            return;
        }
    };

    match processor.ingest(&request.source, &request.url).await {
        Ok(outcome) => {
            consecutive_failures.store(0, Ordering::SeqCst);
            if let IngestOutcome::Skipped = outcome {
                info!(url = %request.url, "Article already stored");
            }
            metrics::counter!(format!("{}_queue_messages_processed_total", METRICS_PREFIX))
                .increment(1);
            if let Err(e) = queue.delete(&receipt_handle).await {
                error!(error = %e, "Failed to delete message");
            }
        }
        Err(e) => {
            // Only backend outages should trip the breaker; a single bad
            // article page is not a systemic failure
            if matches!(e, AppError::StoreUnavailable { .. } | AppError::QueueError { .. }) {
                consecutive_failures.fetch_add(1, Ordering::SeqCst);
            }
            error!(
                url = %request.url,
                source = %request.source,
                error = %e,
                "Failed to ingest article"
            );
            // Message stays on the queue for redelivery
        }
    }
}
