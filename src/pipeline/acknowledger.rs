//! Acknowledger role - batches ack tokens and removes messages at the source
//!
//! Tokens are accumulated into batches of at most ten. A full batch is
//! submitted immediately; whatever is still pending when the run drains
//! is flushed before the role exits, so every forwarded token results
//! in exactly one acknowledgment attempt. Failed batches are logged and
//! never retried; the source may redeliver after its visibility
//! timeout, which dedup on the aggregation side absorbs.

use super::deadline::Deadline;
use super::types::AckToken;
use crate::source::{MessageSource, MAX_BATCH};
use std::sync::Arc;
use std::time::Duration;

/// Idle pause when the ack buffer is momentarily empty
const IDLE_SLEEP: Duration = Duration::from_millis(25);

/// Run one acknowledger instance until the deadline has expired AND the
/// ack buffer is drained
pub async fn run_acknowledger(
    id: usize,
    rx: async_channel::Receiver<AckToken>,
    source: Arc<dyn MessageSource>,
    deadline: Deadline,
) {
    log::info!("🚀 Acknowledger {} started", id);

    let mut batch: Vec<AckToken> = Vec::with_capacity(MAX_BATCH);
    let mut acked = 0u64;

    loop {
        if deadline.expired() && rx.is_empty() {
            break;
        }
        match rx.try_recv() {
            Ok(token) => {
                batch.push(token);
                if batch.len() == MAX_BATCH {
                    acked += submit(id, &source, &mut batch).await;
                }
            }
            Err(_) => tokio::time::sleep(IDLE_SLEEP).await,
        }
    }

    // Final partial batch still pending at loop exit
    if !batch.is_empty() {
        acked += submit(id, &source, &mut batch).await;
    }

    log::info!("✅ Acknowledger {} done ({} messages acked)", id, acked);
}

/// Submit and clear the pending batch; returns how many were acked
async fn submit(id: usize, source: &Arc<dyn MessageSource>, batch: &mut Vec<AckToken>) -> u64 {
    let count = batch.len() as u64;
    let result = source.acknowledge_batch(batch).await;
    batch.clear();

    match result {
        Ok(()) => count,
        Err(e) => {
            // Not retried: the source redelivers after its visibility
            // timeout and the run simply moves on.
            log::warn!("⚠️  Acknowledger {} batch failed: {}", id, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{QueueMessage, SourceError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every submitted batch for inspection
    struct RecordingSource {
        batches: Mutex<Vec<Vec<AckToken>>>,
        fail: bool,
    }

    impl RecordingSource {
        fn new(fail: bool) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl MessageSource for RecordingSource {
        async fn receive(&self, _max: usize) -> Result<Vec<QueueMessage>, SourceError> {
            Ok(Vec::new())
        }

        async fn acknowledge_batch(&self, tokens: &[AckToken]) -> Result<(), SourceError> {
            self.batches.lock().unwrap().push(tokens.to_vec());
            if self.fail {
                Err(SourceError::Acknowledge("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn token(n: usize) -> AckToken {
        AckToken {
            message_id: format!("m{}", n),
            receipt_handle: format!("rh{}", n),
        }
    }

    #[tokio::test]
    async fn batches_capped_at_ten_with_final_partial_flush() {
        let (tx, rx) = async_channel::unbounded();
        for n in 0..23 {
            tx.send(token(n)).await.unwrap();
        }
        drop(tx);

        let source = Arc::new(RecordingSource::new(false));
        let deadline = Deadline::after(Duration::ZERO);
        run_acknowledger(0, rx, source.clone(), deadline).await;

        let batches = source.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 10, 3]);
        assert!(batches.iter().all(|b| b.len() <= MAX_BATCH));

        // No token lost or duplicated across batches
        let total: usize = sizes.iter().sum();
        assert_eq!(total, 23);
    }

    #[tokio::test]
    async fn pending_partial_batch_flushed_at_deadline() {
        let (tx, rx) = async_channel::unbounded();
        for n in 0..7 {
            tx.send(token(n)).await.unwrap();
        }
        drop(tx);

        let source = Arc::new(RecordingSource::new(false));
        run_acknowledger(0, rx, source.clone(), Deadline::after(Duration::ZERO)).await;

        let batches = source.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 7);
    }

    #[tokio::test]
    async fn failed_batches_are_not_retried() {
        let (tx, rx) = async_channel::unbounded();
        for n in 0..12 {
            tx.send(token(n)).await.unwrap();
        }
        drop(tx);

        let source = Arc::new(RecordingSource::new(true));
        run_acknowledger(0, rx, source.clone(), Deadline::after(Duration::ZERO)).await;

        // Both submissions happened exactly once despite failing
        let batches = source.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![10, 2]);
    }
}
