//! Time-series demultiplexing
//!
//! Query APIs such as Cloudera Manager's `/timeseries` answer a multi-metric
//! query with one flat list of series, grouped by metric in query order and
//! labelled with an entity name. The metric label itself is not reliable (it
//! often echoes the query expression), so the metric is recovered from the
//! position of the group in the query.

use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One series of a query result
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub metric_name: String,
    pub entity_name: String,
    pub values: Vec<f64>,
}

/// entity -> metric -> values
pub type EntityMetrics = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

/// Reassemble a flat series list into per-entity metrics.
///
/// The index into `metric_names` starts at 0 and advances every time a
/// series' `metric_name` differs from the one before it.
pub fn demultiplex<S: AsRef<str>>(series: &[TimeSeries], metric_names: &[S]) -> EntityMetrics {
    let mut result = EntityMetrics::new();
    let mut index = 0usize;
    let mut last_metric: Option<&str> = None;

    for ts in series {
        if let Some(last) = last_metric {
            if last != ts.metric_name {
                index += 1;
            }
        }
        last_metric = Some(ts.metric_name.as_str());

        let Some(metric) = metric_names.get(index) else {
            warn!(
                "time series '{}' has no matching queried metric (position {}), dropping",
                ts.metric_name, index
            );
            continue;
        };

        debug!("ts: {} {} -> {}", ts.entity_name, ts.metric_name, metric.as_ref());
        result
            .entry(ts.entity_name.clone())
            .or_default()
            .entry(metric.as_ref().to_string())
            .or_default()
            .extend(ts.values.iter().copied());
    }

    result
}
