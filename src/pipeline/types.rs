//! Core data types for the collection pipeline

use serde::Deserialize;
use std::collections::HashSet;

/// Milliseconds per aggregation bucket (one minute)
pub const BUCKET_MILLIS: i64 = 60_000;

/// As-received message payload, opaque until the aggregator parses it
#[derive(Debug, Clone)]
pub struct RawEnvelope {
    pub body: String,
}

/// Proof-of-delivery handle permitting one acknowledgment per delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckToken {
    pub message_id: String,
    pub receipt_handle: String,
}

/// Outer notification envelope as delivered by the fan-out topic
///
/// Only the inner payload is of interest; everything else in the
/// envelope is ignored.
#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    #[serde(rename = "Message")]
    message: String,
}

/// A single telemetry reading, parsed from the inner notification payload
///
/// All four fields are required; an envelope missing any of them does
/// not produce an event.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "sourceId")]
    pub source_id: String,
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub value: f64,
    #[serde(rename = "timestampMillis")]
    pub timestamp_millis: i64,
}

impl TelemetryEvent {
    /// Parse the outer envelope, then the inner payload
    pub fn from_envelope(body: &str) -> Result<Self, serde_json::Error> {
        let envelope: NotificationEnvelope = serde_json::from_str(body)?;
        serde_json::from_str(&envelope.message)
    }

    /// Bucket key derived from the event's own timestamp (not arrival time)
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey {
            source_id: self.source_id.clone(),
            minute: self.timestamp_millis / BUCKET_MILLIS,
        }
    }
}

/// `(source, minute)` aggregation unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub source_id: String,
    pub minute: i64,
}

/// Running average state for one bucket, owned exclusively by the aggregator
#[derive(Debug)]
pub struct Accumulator {
    pub sum: f64,
    pub count: u64,
    /// Timestamp of the first event observed in this bucket, used to
    /// label the bucket's report row
    pub representative_millis: i64,
    seen_events: HashSet<String>,
}

impl Accumulator {
    pub fn new(first: &TelemetryEvent) -> Self {
        let mut seen_events = HashSet::new();
        seen_events.insert(first.event_id.clone());
        Self {
            sum: first.value,
            count: 1,
            representative_millis: first.timestamp_millis,
            seen_events,
        }
    }

    /// Fold an event into the running average
    ///
    /// Returns false when the event id was already seen in this bucket;
    /// duplicates contribute nothing.
    pub fn add(&mut self, event: &TelemetryEvent) -> bool {
        if !self.seen_events.insert(event.event_id.clone()) {
            return false;
        }
        self.sum += event.value;
        self.count += 1;
        true
    }

    pub fn average(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// One output row: per-source, per-minute average
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub source_id: String,
    pub window_millis: i64,
    pub average: f64,
}
