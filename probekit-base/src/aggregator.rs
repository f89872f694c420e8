//! Per-run metric and service-check collection
//!
//! A check never talks to the agent directly: it pushes samples into an
//! [`Aggregator`], and the run is turned into a [`Submission`] once the check
//! returns.

use crate::status::ServiceCheckStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// A gauge sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub tags: Vec<String>,
}

/// A service check sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCheckSample {
    pub name: String,
    pub status: ServiceCheckStatus,
    pub tags: Vec<String>,
    pub message: Option<String>,
}

/// Everything one check run produced (published as JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub run_id: Uuid,
    pub check: String,
    pub instance: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<MetricSample>,
    pub service_checks: Vec<ServiceCheckSample>,
    pub metadata: BTreeMap<String, String>,
    pub error: Option<String>,
}

/// Collects samples for one check run
#[derive(Debug)]
pub struct Aggregator {
    check: String,
    namespace: String,
    metrics: Vec<MetricSample>,
    service_checks: Vec<ServiceCheckSample>,
    metadata: BTreeMap<String, String>,
}

impl Aggregator {
    pub fn new(check: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            namespace: namespace.into(),
            metrics: Vec::new(),
            service_checks: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.namespace, name)
        }
    }

    /// Submit a gauge; non-finite values are dropped
    pub fn gauge(&mut self, name: &str, value: f64, tags: &[String]) {
        let name = self.qualify(name);
        if !value.is_finite() {
            warn!("dropping non-finite value for {}", name);
            return;
        }
        debug!("gauge {} = {} {:?}", name, value, tags);
        self.metrics.push(MetricSample {
            name,
            value,
            tags: tags.to_vec(),
        });
    }

    /// Submit a service check
    pub fn service_check(
        &mut self,
        name: &str,
        status: ServiceCheckStatus,
        tags: &[String],
        message: Option<String>,
    ) {
        let name = self.qualify(name);
        debug!("service_check {} = {} {:?}", name, status, tags);
        self.service_checks.push(ServiceCheckSample {
            name,
            status,
            tags: tags.to_vec(),
            message,
        });
    }

    /// Attach metadata (e.g. the monitored product version) to the run
    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn check_name(&self) -> &str {
        &self.check
    }

    pub fn metrics(&self) -> &[MetricSample] {
        &self.metrics
    }

    pub fn service_checks(&self) -> &[ServiceCheckSample] {
        &self.service_checks
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Close the run
    pub fn into_submission(self, instance: impl Into<String>, error: Option<String>) -> Submission {
        Submission {
            run_id: Uuid::new_v4(),
            check: self.check,
            instance: instance.into(),
            timestamp: Utc::now(),
            metrics: self.metrics,
            service_checks: self.service_checks,
            metadata: self.metadata,
            error,
        }
    }
}
