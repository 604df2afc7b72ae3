//! Location registry - the set of sources to monitor
//!
//! The registry is a JSON array of `{ id, x, y }` objects stored in an
//! object bucket. It is downloaded to a local cache path only when the
//! file is not already present; the coordinates are carried along but
//! only the ids feed the pipeline.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug)]
pub enum RegistryError {
    Download(String),
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err)
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err)
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Download(e) => write!(f, "Registry download error: {}", e),
            RegistryError::Io(e) => write!(f, "Registry IO error: {}", e),
            RegistryError::Parse(e) => write!(f, "Registry parse error: {}", e),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Download the registry if not cached, then parse it
pub async fn fetch_locations(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    cache_path: &Path,
) -> Result<Vec<Location>, RegistryError> {
    maybe_download(s3, bucket, key, cache_path).await?;
    load_locations(cache_path)
}

/// Fetch the object to `cache_path` unless the file already exists
async fn maybe_download(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    cache_path: &Path,
) -> Result<(), RegistryError> {
    if cache_path.is_file() {
        log::info!("Registry '{}' already downloaded", cache_path.display());
        return Ok(());
    }

    log::info!("Downloading registry '{}' from bucket '{}'...", key, bucket);
    let resp = s3
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| RegistryError::Download(e.to_string()))?;

    let bytes = resp
        .body
        .collect()
        .await
        .map_err(|e| RegistryError::Download(e.to_string()))?
        .into_bytes();

    std::fs::write(cache_path, &bytes)?;
    log::info!("Registry download done ({} bytes)", bytes.len());
    Ok(())
}

/// Parse the registry file
pub fn load_locations(path: &Path) -> Result<Vec<Location>, RegistryError> {
    let contents = std::fs::read_to_string(path)?;
    let locations: Vec<Location> = serde_json::from_str(&contents)?;
    Ok(locations)
}

/// The monitored-id set, built once before the pipeline starts
pub fn monitored_ids(locations: &[Location]) -> HashSet<String> {
    locations.iter().map(|l| l.id.clone()).collect()
}
