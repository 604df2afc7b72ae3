use dotenv::dotenv;
use log::info;
use sensorflow::config::Config;
use sensorflow::runner;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    info!("🚀 sensorflow collection run");
    info!("   ├─ Window: {} minute(s)", config.run_minutes);
    info!("   ├─ Topic: {}", config.topic_arn);
    info!(
        "   ├─ Registry: s3://{}/{}",
        config.registry_bucket, config.registry_key
    );
    info!(
        "   ├─ Workers: {} fetcher(s), {} acknowledger(s)",
        config.fetcher_count, config.acker_count
    );
    info!("   └─ Output: {}", config.output_path);

    runner::run_collection(&config).await?;

    info!("✅ Collection run complete");
    Ok(())
}
