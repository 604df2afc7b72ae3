//! Run coordinator - provisioning, role lifecycle, report, teardown
//!
//! Provisioning happens before any role starts. Once a queue handle
//! exists, deletion is attempted exactly once on every exit path,
//! including a panicked role. The report is written after the
//! aggregator completes and before the coordinator returns; if the
//! aggregator itself failed, report emission is skipped.

use crate::config::Config;
use crate::pipeline::acknowledger::run_acknowledger;
use crate::pipeline::aggregator::run_aggregator;
use crate::pipeline::deadline::Deadline;
use crate::pipeline::fetcher::run_fetcher;
use crate::pipeline::types::AggregateRecord;
use crate::registry::{self, RegistryError};
use crate::report;
use crate::source::{MessageSource, QueueProvisioner};
use crate::sqs::{ProvisionError, SqsProvisioner};
use aws_config::BehaviorVersion;
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum RunError {
    Registry(RegistryError),
    Provision(ProvisionError),
    Report(std::io::Error),
    Aggregator(String),
}

impl From<RegistryError> for RunError {
    fn from(err: RegistryError) -> Self {
        RunError::Registry(err)
    }
}

impl From<ProvisionError> for RunError {
    fn from(err: ProvisionError) -> Self {
        RunError::Provision(err)
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        RunError::Report(err)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Registry(e) => write!(f, "Registry error: {}", e),
            RunError::Provision(e) => write!(f, "Provisioning error: {}", e),
            RunError::Report(e) => write!(f, "Report error: {}", e),
            RunError::Aggregator(e) => write!(f, "Aggregator failed: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

/// Execute one full collection run end to end
pub async fn run_collection(config: &Config) -> Result<(), RunError> {
    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3 = aws_sdk_s3::Client::new(&aws_config);
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);
    let sns = aws_sdk_sns::Client::new(&aws_config);

    let locations = registry::fetch_locations(
        &s3,
        &config.registry_bucket,
        &config.registry_key,
        Path::new(&config.registry_cache_path),
    )
    .await?;
    let monitored = registry::monitored_ids(&locations);
    if monitored.is_empty() {
        log::warn!("⚠️  Registry is empty; every event will be dropped");
    }

    let provisioner = SqsProvisioner::new(sqs_client, sns);
    let window = Duration::from_secs(config.run_minutes * 60);
    run_provisioned(config, &provisioner, monitored, window).await
}

/// Provision the ephemeral queue, collect, and tear down
///
/// The queue handle exists from the moment `create_queue` returns, and
/// `delete_queue` is called exactly once on every exit path after that
/// point, whatever `collect` returned. A `create_queue` failure aborts
/// with no teardown owed.
pub async fn run_provisioned(
    config: &Config,
    provisioner: &dyn QueueProvisioner,
    monitored: HashSet<String>,
    window: Duration,
) -> Result<(), RunError> {
    let queue_name = format!("sensorflow-run-{}", Utc::now().timestamp());
    let queue_url = provisioner.create_queue(&queue_name).await?;

    let result = collect(config, provisioner, &queue_url, monitored, window).await;

    provisioner.delete_queue(&queue_url).await;
    result
}

/// Everything between queue creation and teardown
async fn collect(
    config: &Config,
    provisioner: &dyn QueueProvisioner,
    queue_url: &str,
    monitored: HashSet<String>,
    window: Duration,
) -> Result<(), RunError> {
    provisioner.bind_topic(queue_url, &config.topic_arn).await?;

    let source = provisioner.source(queue_url);
    let deadline = Deadline::after(window);

    run_pipeline(config, source, monitored, deadline).await
}

/// Spawn the roles, join them, and emit the report
///
/// Public so the pipeline wiring can run against any `MessageSource`.
pub async fn run_pipeline(
    config: &Config,
    source: Arc<dyn MessageSource>,
    monitored: HashSet<String>,
    deadline: Deadline,
) -> Result<(), RunError> {
    let (ingest_tx, ingest_rx) = async_channel::unbounded();
    let (ack_tx, ack_rx) = async_channel::unbounded();

    let mut fetchers = Vec::with_capacity(config.fetcher_count);
    for id in 0..config.fetcher_count {
        fetchers.push(tokio::spawn(run_fetcher(
            id,
            source.clone(),
            ingest_tx.clone(),
            ack_tx.clone(),
            deadline,
        )));
    }
    // The coordinator holds no senders; the buffers close once the
    // last fetcher exits.
    drop(ingest_tx);
    drop(ack_tx);

    let mut ackers = Vec::with_capacity(config.acker_count);
    for id in 0..config.acker_count {
        ackers.push(tokio::spawn(run_acknowledger(
            id,
            ack_rx.clone(),
            source.clone(),
            deadline,
        )));
    }
    drop(ack_rx);

    let aggregator = tokio::spawn(run_aggregator(ingest_rx, monitored, deadline));

    join_and_report(fetchers, ackers, aggregator, Path::new(&config.output_path)).await
}

/// Join every role and write the report if the aggregator completed
///
/// A crashed fetcher or acknowledger does not abort the run; a crashed
/// aggregator skips report emission entirely.
async fn join_and_report(
    fetchers: Vec<JoinHandle<()>>,
    ackers: Vec<JoinHandle<()>>,
    aggregator: JoinHandle<Vec<AggregateRecord>>,
    output_path: &Path,
) -> Result<(), RunError> {
    for (id, handle) in fetchers.into_iter().enumerate() {
        if let Err(e) = handle.await {
            log::error!("❌ Fetcher {} failed: {}", id, e);
        }
    }
    for (id, handle) in ackers.into_iter().enumerate() {
        if let Err(e) = handle.await {
            log::error!("❌ Acknowledger {} failed: {}", id, e);
        }
    }

    match aggregator.await {
        Ok(records) => {
            report::write_report(output_path, &records)?;
            Ok(())
        }
        Err(e) => {
            log::error!("❌ Aggregator failed, skipping report: {}", e);
            Err(RunError::Aggregator(e.to_string()))
        }
    }
}
