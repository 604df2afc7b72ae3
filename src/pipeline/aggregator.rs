//! Aggregator role - single owner of the accumulator table
//!
//! Exactly one aggregator instance runs per collection. It drains the
//! ingest buffer, parses and validates payloads, buckets events by
//! their own embedded timestamp, and maintains the running averages.
//! No other role ever touches the accumulators, so no locking is
//! needed around them.

use super::deadline::Deadline;
use super::types::{Accumulator, AggregateRecord, BucketKey, RawEnvelope, TelemetryEvent};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Idle pause when the ingest buffer is momentarily empty
const IDLE_SLEEP: Duration = Duration::from_millis(25);

/// What happened to one ingested payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Aggregated,
    Duplicate,
    Unmonitored,
    Malformed,
}

/// Accumulator table plus the monitored-source filter
pub struct EventAggregator {
    monitored: HashSet<String>,
    buckets: HashMap<BucketKey, Accumulator>,
}

impl EventAggregator {
    pub fn new(monitored: HashSet<String>) -> Self {
        Self {
            monitored,
            buckets: HashMap::new(),
        }
    }

    /// Parse, validate, filter, and bucket one raw payload
    ///
    /// Malformed or incomplete payloads and events from unmonitored
    /// sources are dropped; the message was already acknowledged by the
    /// fetcher, so a drop here affects aggregation only.
    pub fn ingest(&mut self, body: &str) -> IngestOutcome {
        let event = match TelemetryEvent::from_envelope(body) {
            Ok(event) => event,
            Err(e) => {
                log::debug!("Dropping malformed envelope: {}", e);
                return IngestOutcome::Malformed;
            }
        };

        if !self.monitored.contains(&event.source_id) {
            return IngestOutcome::Unmonitored;
        }

        match self.buckets.entry(event.bucket_key()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if entry.get_mut().add(&event) {
                    IngestOutcome::Aggregated
                } else {
                    log::debug!(
                        "Duplicate event {} for source {}",
                        event.event_id,
                        event.source_id
                    );
                    IngestOutcome::Duplicate
                }
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(Accumulator::new(&event));
                IngestOutcome::Aggregated
            }
        }
    }

    /// Emit one record per bucket, sorted by (source, minute)
    pub fn into_records(self) -> Vec<AggregateRecord> {
        let mut buckets: Vec<(BucketKey, Accumulator)> = self.buckets.into_iter().collect();
        buckets.sort_by(|a, b| a.0.cmp(&b.0));

        buckets
            .into_iter()
            .map(|(key, acc)| AggregateRecord {
                source_id: key.source_id,
                window_millis: acc.representative_millis,
                average: acc.average(),
            })
            .collect()
    }
}

/// Run the aggregator until the deadline has expired AND the ingest
/// buffer is drained
pub async fn run_aggregator(
    rx: async_channel::Receiver<RawEnvelope>,
    monitored: HashSet<String>,
    deadline: Deadline,
) -> Vec<AggregateRecord> {
    log::info!("🚀 Aggregator started ({} monitored sources)", monitored.len());

    let mut aggregator = EventAggregator::new(monitored);
    let mut aggregated = 0u64;
    let mut dropped = 0u64;

    loop {
        if deadline.expired() && rx.is_empty() {
            break;
        }
        match rx.try_recv() {
            Ok(envelope) => match aggregator.ingest(&envelope.body) {
                IngestOutcome::Aggregated => aggregated += 1,
                _ => dropped += 1,
            },
            // Empty (or closed): yield and re-check the deadline
            Err(_) => tokio::time::sleep(IDLE_SLEEP).await,
        }
    }

    log::info!(
        "✅ Aggregator done ({} aggregated, {} dropped)",
        aggregated,
        dropped
    );
    aggregator.into_records()
}
