//! End-to-end pipeline wiring test against a scripted message source
//!
//! Exercises the full fetch -> aggregate -> acknowledge flow through
//! `run_pipeline`: a registry of one monitored source, two usable
//! events in the same minute, one event from an unmonitored source,
//! and one malformed payload. Every delivered message must be
//! acknowledged exactly once regardless of whether it aggregated.

use async_trait::async_trait;
use sensorflow::config::Config;
use sensorflow::pipeline::deadline::Deadline;
use sensorflow::pipeline::types::AckToken;
use sensorflow::runner::run_pipeline;
use sensorflow::source::{MessageSource, QueueMessage, SourceError, MAX_BATCH};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct ScriptedSource {
    pending: Mutex<VecDeque<QueueMessage>>,
    acked: Mutex<Vec<Vec<String>>>,
}

impl ScriptedSource {
    fn new(messages: Vec<QueueMessage>) -> Self {
        Self {
            pending: Mutex::new(messages.into()),
            acked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, SourceError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut pending = self.pending.lock().unwrap();
        let take = max.min(pending.len());
        Ok(pending.drain(..take).collect())
    }

    async fn acknowledge_batch(&self, tokens: &[AckToken]) -> Result<(), SourceError> {
        assert!(tokens.len() <= MAX_BATCH);
        self.acked
            .lock()
            .unwrap()
            .push(tokens.iter().map(|t| t.message_id.clone()).collect());
        Ok(())
    }
}

fn telemetry_message(id: &str, source: &str, event: &str, value: f64, ts: i64) -> QueueMessage {
    let inner = serde_json::json!({
        "sourceId": source,
        "eventId": event,
        "value": value,
        "timestampMillis": ts,
    });
    QueueMessage {
        message_id: id.to_string(),
        receipt_handle: format!("rh-{}", id),
        body: serde_json::json!({ "Message": inner.to_string() }).to_string(),
    }
}

fn test_config(output_path: &str) -> Config {
    Config {
        run_minutes: 1,
        topic_arn: "arn:aws:sns:test".to_string(),
        registry_bucket: "unused".to_string(),
        registry_key: "locations.json".to_string(),
        registry_cache_path: "locations.json".to_string(),
        output_path: output_path.to_string(),
        fetcher_count: 2,
        acker_count: 2,
    }
}

#[tokio::test]
async fn round_trip_monitored_source_averages_and_acks() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.csv");

    let source = Arc::new(ScriptedSource::new(vec![
        telemetry_message("m1", "A", "e1", 4.0, 1700000000000),
        telemetry_message("m2", "A", "e2", 6.0, 1700000001000),
        telemetry_message("m3", "B", "e3", 5.0, 1700000000000),
        QueueMessage {
            message_id: "m4".to_string(),
            receipt_handle: "rh-m4".to_string(),
            body: "definitely not an envelope".to_string(),
        },
    ]));

    let config = test_config(output.to_str().unwrap());
    let monitored: HashSet<String> = ["A".to_string()].into_iter().collect();
    let deadline = Deadline::after(Duration::from_millis(300));

    run_pipeline(&config, source.clone(), monitored, deadline)
        .await
        .unwrap();

    // Exactly one row for A, average (4 + 6) / 2, nothing for B
    let contents = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], "sourceId,timestamp,average");
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("A,"));
    assert!(lines[1].ends_with(",5.0"));

    // All four messages acked exactly once, the malformed and the
    // unmonitored one included
    let acked = source.acked.lock().unwrap();
    let mut ids: Vec<String> = acked.iter().flatten().cloned().collect();
    ids.sort();
    assert_eq!(ids, vec!["m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn empty_source_produces_header_only_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.csv");

    let source = Arc::new(ScriptedSource::new(Vec::new()));
    let config = test_config(output.to_str().unwrap());
    let deadline = Deadline::after(Duration::from_millis(100));

    run_pipeline(&config, source.clone(), HashSet::new(), deadline)
        .await
        .unwrap();

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(contents.trim(), "sourceId,timestamp,average");
    assert!(source.acked.lock().unwrap().is_empty());
}
