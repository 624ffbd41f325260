//! SQS queue integration for ingestion jobs
//!
//! Wraps the SQS client with long polling, visibility handling, and
//! JSON message parsing. Upstream feed pollers enqueue one
//! `IngestionRequest` per discovered article URL.

use crate::errors::{AppError, Result};
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client as SqsClient;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// SQS queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue URL
    pub url: String,
    /// Visibility timeout in seconds
    pub visibility_timeout: i32,
    /// Wait time for long polling (seconds)
    pub wait_time_seconds: i32,
    /// Maximum number of messages per poll
    pub max_messages: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            visibility_timeout: 60,
            wait_time_seconds: 20,
            max_messages: 10,
        }
    }
}

/// SQS queue client wrapper
pub struct Queue {
    client: SqsClient,
    config: QueueConfig,
}

impl Queue {
    /// Create a new queue client from the ambient AWS environment
    pub async fn new(config: QueueConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        Ok(Self { client, config })
    }

    /// Create with an existing SQS client
    pub fn with_client(client: SqsClient, config: QueueConfig) -> Self {
        Self { client, config }
    }

    /// Send a raw message body to the queue. Used by the worker to
    /// forward undeliverable messages to the dead letter queue.
    pub async fn send(&self, body: &str) -> Result<String> {
        let result = self
            .client
            .send_message()
            .queue_url(&self.config.url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to send message: {}", e),
            })?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, "Message sent to queue");

        Ok(message_id)
    }

    /// Receive messages with long polling
    pub async fn receive(&self) -> Result<Vec<Message>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.config.url)
            .max_number_of_messages(self.config.max_messages)
            .visibility_timeout(self.config.visibility_timeout)
            .wait_time_seconds(self.config.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages = result.messages.unwrap_or_default();
        debug!(count = messages.len(), "Received messages from queue");

        Ok(messages)
    }

    /// Delete a message after processing
    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }

    /// Parse a message body as JSON
    pub fn parse_message<T: DeserializeOwned>(message: &Message) -> Result<T> {
        let body = message.body.as_ref().ok_or_else(|| AppError::QueueError {
            message: "Message has no body".to_string(),
        })?;

        serde_json::from_str(body).map_err(|e| AppError::QueueError {
            message: format!("Failed to parse message: {}", e),
        })
    }
}

/// One article to fetch and ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRequest {
    /// Feed or publisher label, e.g. "reuters"
    pub source: String,
    /// Canonical article URL
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_request_roundtrip() {
        let msg = IngestionRequest {
            source: "reuters".to_string(),
            url: "https://news.example/world/story".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: IngestionRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(msg.source, parsed.source);
        assert_eq!(msg.url, parsed.url);
    }

    #[test]
    fn test_parse_message_rejects_bad_json() {
        let message = Message::builder().body("not json").build();
        let err = Queue::parse_message::<IngestionRequest>(&message).unwrap_err();
        assert!(matches!(err, AppError::QueueError { .. }));
    }

    #[test]
    fn test_parse_message_rejects_missing_body() {
        let message = Message::builder().build();
        let err = Queue::parse_message::<IngestionRequest>(&message).unwrap_err();
        assert!(matches!(err, AppError::QueueError { .. }));
    }
}
