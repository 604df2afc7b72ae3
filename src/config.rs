use std::env;

/// Runtime configuration loaded from environment variables
///
/// Required:
///   TOPIC_ARN       - SNS topic the ephemeral queue subscribes to
///   REGISTRY_BUCKET - S3 bucket holding the location registry
///
/// Optional (with defaults):
///   RUN_MINUTES         - collection window length (default: 1)
///   REGISTRY_KEY        - registry object key (default: locations.json)
///   REGISTRY_CACHE_PATH - local cache path for the registry (default: locations.json)
///   OUTPUT_PATH         - CSV report path (default: report.csv)
///   FETCHER_COUNT       - fetcher instances (default: 1)
///   ACKER_COUNT         - acknowledger instances (default: 1)
#[derive(Debug, Clone)]
pub struct Config {
    pub run_minutes: u64,
    pub topic_arn: String,
    pub registry_bucket: String,
    pub registry_key: String,
    pub registry_cache_path: String,
    pub output_path: String,
    pub fetcher_count: usize,
    pub acker_count: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let topic_arn = env::var("TOPIC_ARN")
            .map_err(|_| ConfigError::MissingVariable("TOPIC_ARN".to_string()))?;

        let registry_bucket = env::var("REGISTRY_BUCKET")
            .map_err(|_| ConfigError::MissingVariable("REGISTRY_BUCKET".to_string()))?;

        let run_minutes = env::var("RUN_MINUTES")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("RUN_MINUTES must be an integer".to_string()))?;

        if run_minutes == 0 {
            return Err(ConfigError::InvalidValue(
                "RUN_MINUTES must be at least 1".to_string(),
            ));
        }

        let registry_key = env::var("REGISTRY_KEY").unwrap_or_else(|_| "locations.json".to_string());
        let registry_cache_path =
            env::var("REGISTRY_CACHE_PATH").unwrap_or_else(|_| "locations.json".to_string());
        let output_path = env::var("OUTPUT_PATH").unwrap_or_else(|_| "report.csv".to_string());

        let fetcher_count = parse_worker_count("FETCHER_COUNT")?;
        let acker_count = parse_worker_count("ACKER_COUNT")?;

        Ok(Self {
            run_minutes,
            topic_arn,
            registry_bucket,
            registry_key,
            registry_cache_path,
            output_path,
            fetcher_count,
            acker_count,
        })
    }
}

fn parse_worker_count(var: &str) -> Result<usize, ConfigError> {
    let count = env::var(var)
        .unwrap_or_else(|_| "1".to_string())
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} must be an integer", var)))?;

    if count == 0 {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be at least 1",
            var
        )));
    }

    Ok(count)
}
