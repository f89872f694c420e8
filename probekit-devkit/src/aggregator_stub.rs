/*!
Aggregator stub for check tests

Wraps the `Submission` of one check run and records which metrics were
asserted, so a test can finish with `assert_all_metrics_covered()`.
*/

use parking_lot::Mutex;
use probekit_base::{MetricSample, ServiceCheckSample, ServiceCheckStatus, Submission};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct AggregatorStub {
    submission: Arc<Submission>,
    asserted: Arc<Mutex<BTreeSet<usize>>>,
}

fn same_tags(actual: &[String], expected: &[&str]) -> bool {
    let mut a: Vec<&str> = actual.iter().map(String::as_str).collect();
    let mut e: Vec<&str> = expected.to_vec();
    a.sort_unstable();
    e.sort_unstable();
    a == e
}

impl AggregatorStub {
    pub fn new(submission: Submission) -> Self {
        Self {
            submission: Arc::new(submission),
            asserted: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    /// Every metric sample named `name`
    pub fn metrics(&self, name: &str) -> Vec<&MetricSample> {
        self.submission.metrics.iter().filter(|m| m.name == name).collect()
    }

    /// Distinct metric names, sorted
    pub fn metric_names(&self) -> BTreeSet<String> {
        self.submission.metrics.iter().map(|m| m.name.clone()).collect()
    }

    pub fn service_checks(&self, name: &str) -> Vec<&ServiceCheckSample> {
        self.submission
            .service_checks
            .iter()
            .filter(|s| s.name == name)
            .collect()
    }

    /// Assert at least one sample of `name` matches `value` (when given) and
    /// carries exactly `tags` (order-insensitive). Matching samples count as covered.
    pub fn assert_metric(&self, name: &str, value: Option<f64>, tags: &[&str]) {
        let matching: Vec<usize> = self
            .submission
            .metrics
            .iter()
            .enumerate()
            .filter(|(_, m)| m.name == name)
            .filter(|(_, m)| value.map_or(true, |v| (m.value - v).abs() < 1e-9))
            .filter(|(_, m)| same_tags(&m.tags, tags))
            .map(|(i, _)| i)
            .collect();

        if matching.is_empty() {
            let candidates: Vec<String> = self
                .metrics(name)
                .iter()
                .map(|m| format!("  {} {:?}", m.value, m.tags))
                .collect();
            panic!(
                "metric {} (value {:?}, tags {:?}) not found; submitted samples:\n{}",
                name,
                value,
                tags,
                candidates.join("\n")
            );
        }
        self.asserted.lock().extend(matching);
    }

    /// Assert `name` was submitted exactly `count` times (any tags); marks them covered
    pub fn assert_metric_count(&self, name: &str, count: usize) {
        let matching: Vec<usize> = self
            .submission
            .metrics
            .iter()
            .enumerate()
            .filter(|(_, m)| m.name == name)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(matching.len(), count, "unexpected sample count for {}", name);
        self.asserted.lock().extend(matching);
    }

    /// Assert `name` was never submitted
    pub fn assert_no_metric(&self, name: &str) {
        assert!(self.metrics(name).is_empty(), "metric {} should not be submitted", name);
    }

    /// Assert one service check `name` with `status` and exactly `tags`
    pub fn assert_service_check(&self, name: &str, status: ServiceCheckStatus, tags: &[&str]) {
        let found = self
            .service_checks(name)
            .iter()
            .any(|s| s.status == status && same_tags(&s.tags, tags));
        if !found {
            panic!(
                "service check {} {} {:?} not found; submitted: {:?}",
                name,
                status,
                tags,
                self.service_checks(name)
            );
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.submission.metadata.get(key).map(String::as_str)
    }

    /// Fail if any submitted metric sample was never asserted
    pub fn assert_all_metrics_covered(&self) {
        let asserted = self.asserted.lock();
        let uncovered: BTreeSet<&str> = self
            .submission
            .metrics
            .iter()
            .enumerate()
            .filter(|(i, _)| !asserted.contains(i))
            .map(|(_, m)| m.name.as_str())
            .collect();
        assert!(uncovered.is_empty(), "metrics not asserted: {:?}", uncovered);
    }
}
