//! Metrics and observability utilities
//!
//! Prometheus metric descriptions and recording helpers shared by the
//! ingestion worker and the query service.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all NewsRAG metrics
pub const METRICS_PREFIX: &str = "newsrag";

/// Register all metric descriptions
pub fn register_metrics() {
    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of answered queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Query answering latency in seconds"
    );

    describe_gauge!(
        format!("{}_query_sources_count", METRICS_PREFIX),
        Unit::Count,
        "Number of source articles backing an answer"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_articles_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total articles stored"
    );

    describe_counter!(
        format!("{}_articles_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Total articles skipped as already stored"
    );

    describe_counter!(
        format!("{}_ingestion_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Total ingestion attempts that failed"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Article ingestion latency in seconds"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    // Queue metrics
    describe_counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Total queue messages processed"
    );

    describe_counter!(
        format!("{}_queue_messages_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Total malformed queue messages dropped"
    );

    tracing::info!("Metrics registered");
}

/// Record one answered query. Mode is one of "url_cached", "url_ingested",
/// or "semantic".
pub fn record_query(duration_secs: f64, mode: &str, source_count: usize) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_query_sources_count", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .set(source_count as f64);
}

/// Record one completed ingestion attempt
pub fn record_ingestion(duration_secs: f64, source: &str, outcome: &str, chunk_count: usize) {
    match outcome {
        "stored" => {
            counter!(
                format!("{}_articles_ingested_total", METRICS_PREFIX),
                "source" => source.to_string()
            )
            .increment(1);
            counter!(
                format!("{}_chunks_created_total", METRICS_PREFIX),
                "source" => source.to_string()
            )
            .increment(chunk_count as u64);
        }
        "skipped" => {
            counter!(
                format!("{}_articles_skipped_total", METRICS_PREFIX),
                "source" => source.to_string()
            )
            .increment(1);
        }
        _ => {
            counter!(
                format!("{}_ingestion_failures_total", METRICS_PREFIX),
                "source" => source.to_string(),
                "stage" => outcome.to_string()
            )
            .increment(1);
        }
    }

    histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);
}

/// Record one embedding API call
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}
