//! OpenMetrics / Prometheus text scraping
//!
//! Exposition payloads are parsed with `prometheus_parse`; this module flattens
//! the parsed samples and maps them onto check metric names.

use crate::aggregator::Aggregator;
use crate::error::{CheckError, CheckResult};
use crate::http::HttpClient;
use crate::normalize::tag;
use crate::status::ServiceCheckStatus;
use prometheus_parse::{Scrape, Value};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// One scalar exposition sample, labels sorted by name
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn sorted_labels(sample: &prometheus_parse::Sample) -> Vec<(String, String)> {
    let mut labels: Vec<(String, String)> = sample
        .labels
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    labels.sort();
    labels
}

/// Flatten a parsed scrape into scalar samples.
///
/// Summary quantiles become one sample each with a `quantile` label. Histogram
/// buckets are dropped; their `_sum` and `_count` series stay.
pub fn flatten(scrape: Scrape) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(scrape.samples.len());
    for sample in &scrape.samples {
        if sample.metric.ends_with("_bucket") && sample.labels.get("le").is_some() {
            continue;
        }
        let labels = sorted_labels(sample);
        match &sample.value {
            Value::Counter(v) | Value::Gauge(v) | Value::Untyped(v) => samples.push(Sample {
                name: sample.metric.clone(),
                labels,
                value: *v,
            }),
            Value::Summary(quantiles) => {
                for q in quantiles {
                    let mut labels = labels.clone();
                    labels.push(("quantile".to_string(), q.quantile.to_string()));
                    labels.sort();
                    samples.push(Sample {
                        name: sample.metric.clone(),
                        labels,
                        value: q.count,
                    });
                }
            }
            Value::Histogram(_) => {}
        }
    }
    samples
}

/// Parse a text exposition payload
pub fn parse_exposition(text: &str) -> std::io::Result<Vec<Sample>> {
    let lines = text.lines().map(|s| Ok(s.to_owned()));
    Ok(flatten(Scrape::parse(lines)?))
}

/// Scrapes one endpoint and maps raw metric names to check metrics
#[derive(Debug, Clone)]
pub struct OpenMetricsScraper {
    endpoint: String,
    prefix: String,
    metrics: BTreeMap<String, String>,
    tags: Vec<String>,
}

impl OpenMetricsScraper {
    /// `prefix` sits between the check namespace and mapped names (may be empty)
    pub fn new(
        endpoint: impl Into<String>,
        prefix: impl Into<String>,
        metrics: BTreeMap<String, String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            prefix: prefix.into(),
            metrics,
            tags,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn qualify(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }

    /// Resolve the emitted name for a raw sample name
    fn resolve(&self, raw: &str) -> Option<String> {
        if let Some(renamed) = self.metrics.get(raw) {
            return Some(renamed.clone());
        }
        if raw.ends_with("_bucket") {
            return None;
        }
        for suffix in ["sum", "count"] {
            if let Some(base) = raw.strip_suffix(&format!("_{}", suffix)) {
                if let Some(renamed) = self.metrics.get(base) {
                    return Some(format!("{}.{}", renamed, suffix));
                }
            }
        }
        raw.strip_suffix("_total")
            .and_then(|base| self.metrics.get(base))
            .cloned()
    }

    /// Scrape the endpoint, emit mapped gauges and the health service check.
    ///
    /// Returns every parsed sample so callers can read extra series (build info, versions).
    pub async fn scrape(&self, http: &HttpClient, aggregator: &mut Aggregator) -> CheckResult<Vec<Sample>> {
        let health = self.qualify("openmetrics.health");
        let mut health_tags = self.tags.clone();
        health_tags.push(tag("endpoint", &self.endpoint));

        let text = match http.get_text(&self.endpoint, &[("Accept", "text/plain")]).await {
            Ok(text) => text,
            Err(e) => {
                error!("Exception scraping {}: {}", self.endpoint, e);
                aggregator.service_check(&health, ServiceCheckStatus::Critical, &health_tags, Some(e.to_string()));
                return Err(e);
            }
        };
        let samples = match parse_exposition(&text) {
            Ok(samples) => samples,
            Err(e) => {
                error!("Cannot parse exposition from {}: {}", self.endpoint, e);
                let e = CheckError::payload(&self.endpoint, e.to_string());
                aggregator.service_check(&health, ServiceCheckStatus::Critical, &health_tags, Some(e.to_string()));
                return Err(e);
            }
        };
        aggregator.service_check(&health, ServiceCheckStatus::Ok, &health_tags, None);
        debug!("{} samples from {}", samples.len(), self.endpoint);

        for sample in &samples {
            let Some(name) = self.resolve(&sample.name) else {
                continue;
            };
            let mut tags = self.tags.clone();
            tags.extend(sample.labels.iter().map(|(k, v)| tag(k, v)));
            aggregator.gauge(&self.qualify(&name), sample.value, &tags);
        }

        Ok(samples)
    }
}
