//! Cloudera Manager API client selection
//!
//! The REST surface differs between Cloudera Manager releases; the client is
//! picked from the version the server reports.

use super::api_client_v7::ApiClientV7;
use async_trait::async_trait;
use probekit_base::http::join_url;
use probekit_base::{Aggregator, CheckError, CheckResult, HttpClient};
use serde::Deserialize;
use tracing::debug;

/// One poll against a Cloudera Manager API version
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Collect everything and report `can_connect`
    async fn collect_data(&self, aggregator: &mut Aggregator) -> CheckResult<()>;
}

#[derive(Debug, Deserialize)]
struct ApiVersionInfo {
    version: Option<String>,
}

/// Major version out of `7.4.4`-like strings
pub fn major_version(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}

/// Ask the server for its version and build the matching client
pub async fn make_api_client(
    http: HttpClient,
    api_url: &str,
    tags: Vec<String>,
) -> CheckResult<Box<dyn ApiClient>> {
    let url = join_url(api_url, "cm/version");
    let value = http.get_json(&url, &[]).await?;
    let info: ApiVersionInfo =
        serde_json::from_value(value).map_err(|e| CheckError::payload(&url, e.to_string()))?;
    let version = info
        .version
        .ok_or_else(|| CheckError::payload(&url, "missing version"))?;
    debug!("Cloudera Manager version: {}", version);

    match major_version(&version) {
        Some(major) if major >= 7 => Ok(Box::new(ApiClientV7::new(http, api_url, tags))),
        _ => Err(CheckError::Config(format!(
            "Cloudera API Client is only supported with Cloudera Manager 7 and above, got {}",
            version
        ))),
    }
}
