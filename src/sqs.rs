//! SQS-backed message source and ephemeral queue provisioning
//!
//! A collection run provisions one queue for its own lifetime: create,
//! authorize the fan-out topic to publish into it, subscribe it to the
//! topic. The run coordinator owns the returned queue url and is
//! responsible for deleting the queue exactly once at teardown.

use crate::pipeline::types::AckToken;
use crate::source::{MessageSource, QueueMessage, QueueProvisioner, SourceError, MAX_BATCH};
use async_trait::async_trait;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, QueueAttributeName};
use std::sync::Arc;

/// Short poll wait so deadline checks stay responsive
const RECEIVE_WAIT_SECONDS: i32 = 1;

#[derive(Debug)]
pub enum ProvisionError {
    CreateQueue(String),
    QueueArn(String),
    Authorize(String),
    Subscribe(String),
}

impl std::fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionError::CreateQueue(e) => write!(f, "Failed to create queue: {}", e),
            ProvisionError::QueueArn(e) => write!(f, "Failed to resolve queue ARN: {}", e),
            ProvisionError::Authorize(e) => write!(f, "Failed to authorize topic: {}", e),
            ProvisionError::Subscribe(e) => write!(f, "Failed to subscribe queue: {}", e),
        }
    }
}

impl std::error::Error for ProvisionError {}

/// Message source backed by a provisioned SQS queue
pub struct SqsMessageSource {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsMessageSource {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl MessageSource for SqsMessageSource {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, SourceError> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max.min(MAX_BATCH) as i32)
            .wait_time_seconds(RECEIVE_WAIT_SECONDS)
            .send()
            .await
            .map_err(|e| SourceError::Receive(e.to_string()))?;

        let mut messages = Vec::new();
        for msg in resp.messages.unwrap_or_default() {
            // A message without an id, handle, or body cannot be
            // acknowledged, so it is not forwarded at all.
            let (Some(message_id), Some(receipt_handle), Some(body)) =
                (msg.message_id, msg.receipt_handle, msg.body)
            else {
                log::warn!("Dropping received message with missing id/handle/body");
                continue;
            };
            messages.push(QueueMessage {
                message_id,
                receipt_handle,
                body,
            });
        }
        Ok(messages)
    }

    async fn acknowledge_batch(&self, tokens: &[AckToken]) -> Result<(), SourceError> {
        let mut request = self
            .client
            .delete_message_batch()
            .queue_url(&self.queue_url);

        for token in tokens {
            let entry = DeleteMessageBatchRequestEntry::builder()
                .id(&token.message_id)
                .receipt_handle(&token.receipt_handle)
                .build()
                .map_err(|e| SourceError::Acknowledge(e.to_string()))?;
            request = request.entries(entry);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| SourceError::Acknowledge(e.to_string()))?;

        if !resp.failed.is_empty() {
            return Err(SourceError::Acknowledge(format!(
                "{} of {} entries failed",
                resp.failed.len(),
                tokens.len()
            )));
        }
        Ok(())
    }
}

/// Create the ephemeral queue; the returned url is the teardown handle
pub async fn create_queue(
    sqs: &aws_sdk_sqs::Client,
    queue_name: &str,
) -> Result<String, ProvisionError> {
    let resp = sqs
        .create_queue()
        .queue_name(queue_name)
        .send()
        .await
        .map_err(|e| ProvisionError::CreateQueue(e.to_string()))?;

    let queue_url = resp
        .queue_url
        .ok_or_else(|| ProvisionError::CreateQueue("no queue url returned".to_string()))?;

    log::info!("✅ Created ephemeral queue: {}", queue_url);
    Ok(queue_url)
}

/// Authorize the topic to publish into the queue and subscribe the queue
pub async fn bind_topic(
    sqs: &aws_sdk_sqs::Client,
    sns: &aws_sdk_sns::Client,
    queue_url: &str,
    topic_arn: &str,
) -> Result<(), ProvisionError> {
    let attrs = sqs
        .get_queue_attributes()
        .queue_url(queue_url)
        .attribute_names(QueueAttributeName::QueueArn)
        .send()
        .await
        .map_err(|e| ProvisionError::QueueArn(e.to_string()))?;

    let queue_arn = attrs
        .attributes
        .and_then(|a| a.get(&QueueAttributeName::QueueArn).cloned())
        .ok_or_else(|| ProvisionError::QueueArn("QueueArn attribute missing".to_string()))?;

    let policy = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "sns.amazonaws.com" },
            "Action": "sqs:SendMessage",
            "Resource": queue_arn,
            "Condition": { "ArnEquals": { "aws:SourceArn": topic_arn } }
        }]
    });

    sqs.set_queue_attributes()
        .queue_url(queue_url)
        .attributes(QueueAttributeName::Policy, policy.to_string())
        .send()
        .await
        .map_err(|e| ProvisionError::Authorize(e.to_string()))?;

    sns.subscribe()
        .topic_arn(topic_arn)
        .protocol("sqs")
        .endpoint(&queue_arn)
        .send()
        .await
        .map_err(|e| ProvisionError::Subscribe(e.to_string()))?;

    log::info!("✅ Queue subscribed to topic: {}", topic_arn);
    Ok(())
}

/// SQS/SNS-backed queue lifecycle
pub struct SqsProvisioner {
    sqs: aws_sdk_sqs::Client,
    sns: aws_sdk_sns::Client,
}

impl SqsProvisioner {
    pub fn new(sqs: aws_sdk_sqs::Client, sns: aws_sdk_sns::Client) -> Self {
        Self { sqs, sns }
    }
}

#[async_trait]
impl QueueProvisioner for SqsProvisioner {
    async fn create_queue(&self, queue_name: &str) -> Result<String, ProvisionError> {
        create_queue(&self.sqs, queue_name).await
    }

    async fn bind_topic(&self, queue_url: &str, topic_arn: &str) -> Result<(), ProvisionError> {
        bind_topic(&self.sqs, &self.sns, queue_url, topic_arn).await
    }

    async fn delete_queue(&self, queue_url: &str) {
        delete_queue(&self.sqs, queue_url).await
    }

    fn source(&self, queue_url: &str) -> Arc<dyn MessageSource> {
        Arc::new(SqsMessageSource::new(self.sqs.clone(), queue_url.to_string()))
    }
}

/// Best-effort queue deletion; the coordinator calls this exactly once
pub async fn delete_queue(sqs: &aws_sdk_sqs::Client, queue_url: &str) {
    match sqs.delete_queue().queue_url(queue_url).send().await {
        Ok(_) => log::info!("✅ Deleted ephemeral queue: {}", queue_url),
        Err(e) => log::error!("❌ Failed to delete queue {}: {}", queue_url, e),
    }
}
