//! GitLab check
//!
//! Health / liveness / readiness probes, the Prometheus endpoints of GitLab
//! and Gitaly, and the GitLab version as metadata.

pub mod common;
pub mod metrics;

pub use common::get_gitlab_version;

use async_trait::async_trait;
use metrics::{metric_map, GITALY_METRICS, GITLAB_METRICS};
use probekit_base::http::join_url;
use probekit_base::normalize::tag;
use probekit_base::openmetrics::OpenMetricsScraper;
use probekit_base::{Aggregator, Check, CheckError, CheckResult, HttpClient, HttpConfig, ServiceCheckStatus};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

pub const CHECK_NAME: &str = "gitlab";

/// Probe endpoint and the service check it reports
const PROBES: &[(&str, &str)] = &[
    ("-/health", "health"),
    ("-/liveness", "liveness"),
    ("-/readiness?all=1", "readiness"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabConfig {
    pub gitlab_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default, alias = "prometheus_url")]
    pub openmetrics_endpoint: Option<String>,
    #[serde(default)]
    pub gitaly_server_endpoint: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub http: HttpConfig,
}

/// `gitlab_host` / `gitlab_port` tags of the configured URL
pub fn gitlab_tags(gitlab_url: &str) -> CheckResult<Vec<String>> {
    let url = Url::parse(gitlab_url)
        .map_err(|e| CheckError::Config(format!("invalid gitlab_url {}: {}", gitlab_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| CheckError::Config(format!("gitlab_url {} has no host", gitlab_url)))?;
    let mut tags = vec![tag("gitlab_host", host)];
    if let Some(port) = url.port_or_known_default() {
        tags.push(tag("gitlab_port", port));
    }
    Ok(tags)
}

/// `<name>_check` entries of a readiness answer: 1 when every item is `ok`
pub fn readiness_checks(body: &Value) -> Vec<(String, f64)> {
    let Some(object) = body.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_suffix("_check")?;
            let items = value.as_array()?;
            let ok = items
                .iter()
                .all(|item| item.get("status").and_then(Value::as_str) == Some("ok"));
            Some((name.to_string(), if ok { 1.0 } else { 0.0 }))
        })
        .collect()
}

pub struct GitlabCheck {
    config: GitlabConfig,
}

impl GitlabCheck {
    pub fn new(config: GitlabConfig) -> Self {
        Self { config }
    }

    async fn probe(
        &self,
        http: &HttpClient,
        path: &str,
        name: &str,
        tags: &[String],
        aggregator: &mut Aggregator,
    ) {
        let url = join_url(&self.config.gitlab_url, path);
        match http.get_status(&url, &[]).await {
            Ok((200, body)) => {
                aggregator.service_check(name, ServiceCheckStatus::Ok, tags, None);
                if name == "readiness" {
                    match serde_json::from_str::<Value>(&body) {
                        Ok(value) => {
                            for (check, value) in readiness_checks(&value) {
                                aggregator.gauge(&format!("readiness.{}", check), value, tags);
                            }
                        }
                        Err(e) => debug!("Readiness answer is not JSON: {}", e),
                    }
                }
            }
            Ok((status, _)) => {
                warn!("GitLab {} probe {} returned HTTP {}", name, url, status);
                aggregator.service_check(
                    name,
                    ServiceCheckStatus::Critical,
                    tags,
                    Some(format!("HTTP {}", status)),
                );
            }
            Err(e) => {
                error!("Exception on GitLab {} probe: {}", name, e);
                aggregator.service_check(name, ServiceCheckStatus::Critical, tags, Some(e.to_string()));
            }
        }
    }
}

#[async_trait]
impl Check for GitlabCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn namespace(&self) -> &str {
        CHECK_NAME
    }

    fn instance_label(&self) -> String {
        self.config.gitlab_url.clone()
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> CheckResult<()> {
        let http = HttpClient::new(&self.config.http)?;
        let mut tags = gitlab_tags(&self.config.gitlab_url)?;
        tags.extend(self.config.tags.iter().cloned());

        let mut scrape_error = None;
        let scrapers = [
            (self.config.openmetrics_endpoint.as_deref(), "", GITLAB_METRICS),
            (self.config.gitaly_server_endpoint.as_deref(), "gitaly", GITALY_METRICS),
        ];
        for (endpoint, prefix, metrics) in scrapers {
            let Some(endpoint) = endpoint else {
                continue;
            };
            let scraper = OpenMetricsScraper::new(endpoint, prefix, metric_map(metrics), tags.clone());
            if let Err(e) = scraper.scrape(&http, aggregator).await {
                scrape_error.get_or_insert(e);
            }
        }

        for (path, name) in PROBES {
            self.probe(&http, path, name, &tags, aggregator).await;
        }

        if let Some(version) =
            get_gitlab_version(&http, &self.config.gitlab_url, self.config.api_token.as_deref()).await
        {
            aggregator.set_metadata("version", version);
        }

        match scrape_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
