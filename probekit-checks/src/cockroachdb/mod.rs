//! CockroachDB check: scrapes the node's Prometheus endpoint

pub mod metrics;

use async_trait::async_trait;
use probekit_base::openmetrics::{OpenMetricsScraper, Sample};
use probekit_base::{Aggregator, Check, CheckError, CheckResult, HttpClient, HttpConfig};
use serde::Deserialize;
use tracing::debug;

pub const CHECK_NAME: &str = "cockroachdb";

#[derive(Debug, Clone, Deserialize)]
pub struct CockroachdbConfig {
    /// Usually `http://<host>:8080/_status/vars`
    #[serde(default, alias = "prometheus_url")]
    pub openmetrics_endpoint: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub http: HttpConfig,
}

/// Release tag carried by the `build_timestamp` series, without its `v`
pub fn version_from_samples(samples: &[Sample]) -> Option<String> {
    samples
        .iter()
        .filter(|s| s.name == "build_timestamp")
        .find_map(|s| s.label("tag"))
        .map(|tag| tag.trim_start_matches('v').to_string())
}

pub struct CockroachdbCheck {
    config: CockroachdbConfig,
}

impl CockroachdbCheck {
    pub fn new(config: CockroachdbConfig) -> CheckResult<Self> {
        if config.openmetrics_endpoint.is_none() {
            return Err(CheckError::Config(
                "openmetrics_endpoint (or prometheus_url) is required".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn endpoint(&self) -> &str {
        self.config.openmetrics_endpoint.as_deref().unwrap_or_default()
    }
}

#[async_trait]
impl Check for CockroachdbCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn namespace(&self) -> &str {
        CHECK_NAME
    }

    fn instance_label(&self) -> String {
        self.endpoint().to_string()
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> CheckResult<()> {
        let http = HttpClient::new(&self.config.http)?;
        let scraper = OpenMetricsScraper::new(
            self.endpoint(),
            "",
            metrics::metric_map(),
            self.config.tags.clone(),
        );
        let samples = scraper.scrape(&http, aggregator).await?;

        match version_from_samples(&samples) {
            Some(version) => aggregator.set_metadata("version", version),
            None => debug!("No build_timestamp tag exposed by {}", scraper.endpoint()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_samples() {
        let samples = vec![
            Sample {
                name: "sql_conns".into(),
                labels: vec![],
                value: 1.0,
            },
            Sample {
                name: "build_timestamp".into(),
                labels: vec![("tag".into(), "v23.1.2".into())],
                value: 1.68e9,
            },
        ];
        assert_eq!(version_from_samples(&samples).as_deref(), Some("23.1.2"));
        assert_eq!(version_from_samples(&samples[..1]), None);
    }

    #[test]
    fn test_endpoint_required() {
        let config: CockroachdbConfig = serde_yaml::from_str("tags: [env:test]").unwrap();
        assert!(matches!(CockroachdbCheck::new(config), Err(CheckError::Config(_))));

        let config: CockroachdbConfig =
            serde_yaml::from_str("prometheus_url: http://localhost:8080/_status/vars").unwrap();
        let check = CockroachdbCheck::new(config).unwrap();
        assert_eq!(check.instance_label(), "http://localhost:8080/_status/vars");
    }
}
