//! Query handler

use crate::answer::{QueryResult, SourceRef};
use crate::AppState;
use axum::{extract::State, Json};
use newsrag_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
}

/// Query response
#[derive(Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub processing_time_ms: u64,
}

/// Answer a question over the stored corpus
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let QueryResult { answer, sources } = state.answer_service.answer(&request.query).await?;

    Ok(Json(QueryResponse {
        query: request.query,
        answer,
        sources,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
