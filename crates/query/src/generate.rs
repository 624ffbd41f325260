//! Answer generation abstraction
//!
//! Same seam as the embedder: a Gemini-backed implementation for
//! production and a canned mock for tests.

use async_trait::async_trait;
use newsrag_common::config::GenerationConfig;
use newsrag_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Trait for grounded answer generation
#[async_trait]
pub trait Generate: Send + Sync {
    /// Generate an answer from a system prompt and a user prompt
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Gemini text generation client
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

impl GeminiGenerator {
    /// Create a new Gemini generator; model, endpoint, and timeout come
    /// from the generation configuration section
    pub fn new(api_key: String, config: &GenerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
        }
    }
}

#[async_trait]
impl Generate for GeminiGenerator {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        text: system_prompt.to_string(),
                    },
                    Part {
                        text: user_prompt.to_string(),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::GenerationFailed {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationFailed {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: GenerateResponse =
            response.json().await.map_err(|e| AppError::GenerationFailed {
                message: format!("Failed to parse response: {}", e),
            })?;

        result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AppError::GenerationFailed {
                message: "Empty response".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock generator for tests; echoes a marker plus the user prompt so
/// assertions can see what context the service assembled
pub struct MockGenerator;

#[async_trait]
impl Generate for MockGenerator {
    async fn generate(&self, _system_prompt: &str, user_prompt: &str) -> Result<String> {
        Ok(format!("MOCK ANSWER\n{}", user_prompt))
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

/// Create a generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Arc<dyn Generate> {
    match config.provider.as_str() {
        "gemini" => {
            let key = config.api_key.clone().expect("Gemini API key required");
            Arc::new(GeminiGenerator::new(key, config))
        }
        "mock" => Arc::new(MockGenerator),
        _ => {
            tracing::warn!(provider = %config.provider, "Unknown generation provider, using mock");
            Arc::new(MockGenerator)
        }
    }
}
