//! Seams over the message queue: pull/batch-acknowledge and provisioning
//!
//! The pipeline roles only see [`MessageSource`], and the run
//! coordinator only sees [`QueueProvisioner`]; the real SQS-backed
//! implementations live in `sqs`, and tests substitute mocks.

use crate::pipeline::types::AckToken;
use crate::sqs::ProvisionError;
use async_trait::async_trait;
use std::sync::Arc;

/// Upper bound on messages per receive and tokens per ack batch
pub const MAX_BATCH: usize = 10;

/// One message as delivered by the queue
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[derive(Debug)]
pub enum SourceError {
    Receive(String),
    Acknowledge(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Receive(e) => write!(f, "Receive error: {}", e),
            SourceError::Acknowledge(e) => write!(f, "Acknowledge error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Request up to `max` (at most [`MAX_BATCH`]) messages from the queue
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, SourceError>;

    /// Permanently remove up to [`MAX_BATCH`] delivered messages in one call
    async fn acknowledge_batch(&self, tokens: &[AckToken]) -> Result<(), SourceError>;
}

/// Lifecycle of the ephemeral queue a collection run consumes from
///
/// The url returned by `create_queue` is the teardown handle: once it
/// exists, the coordinator owes exactly one `delete_queue` call on
/// every exit path.
#[async_trait]
pub trait QueueProvisioner: Send + Sync {
    async fn create_queue(&self, queue_name: &str) -> Result<String, ProvisionError>;

    /// Authorize the topic to publish into the queue and subscribe it
    async fn bind_topic(&self, queue_url: &str, topic_arn: &str) -> Result<(), ProvisionError>;

    /// Best-effort deletion; failures are logged, never propagated
    async fn delete_queue(&self, queue_url: &str);

    /// A message source reading from the provisioned queue
    fn source(&self, queue_url: &str) -> Arc<dyn MessageSource>;
}
