//! Fetcher role - polls the message source and feeds both work queues
//!
//! Every received message is forwarded twice: its payload to the ingest
//! buffer and its ack token to the ack buffer, unconditionally and
//! before any parsing is attempted. Acknowledgment is decoupled from
//! processing success so malformed or duplicate messages never cause
//! unbounded redelivery.

use super::deadline::Deadline;
use super::types::{AckToken, RawEnvelope};
use crate::source::{MessageSource, MAX_BATCH};
use std::sync::Arc;

/// Run one fetcher instance until the deadline expires
pub async fn run_fetcher(
    id: usize,
    source: Arc<dyn MessageSource>,
    ingest_tx: async_channel::Sender<RawEnvelope>,
    ack_tx: async_channel::Sender<AckToken>,
    deadline: Deadline,
) {
    log::info!("🚀 Fetcher {} started", id);
    let mut fetched = 0u64;

    while !deadline.expired() {
        let messages = match source.receive(MAX_BATCH).await {
            Ok(messages) => messages,
            Err(e) => {
                // Transient poll failure: log and keep going
                log::warn!("⚠️  Fetcher {} receive failed: {}", id, e);
                continue;
            }
        };

        for msg in messages {
            let envelope = RawEnvelope { body: msg.body };
            let token = AckToken {
                message_id: msg.message_id,
                receipt_handle: msg.receipt_handle,
            };

            if ingest_tx.send(envelope).await.is_err() {
                log::warn!("⚠️  Fetcher {}: ingest buffer closed, stopping", id);
                return;
            }
            if ack_tx.send(token).await.is_err() {
                log::warn!("⚠️  Fetcher {}: ack buffer closed, stopping", id);
                return;
            }
            fetched += 1;
        }
    }

    log::info!("✅ Fetcher {} done ({} messages forwarded)", id, fetched);
}
