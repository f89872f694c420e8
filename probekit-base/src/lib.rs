//! probekit-base - shared plumbing for API polling checks
//!
//! Every check follows the same shape: call a vendor endpoint, reshape the
//! JSON into flat metric names and tags, hand gauges and service checks to an
//! [`Aggregator`]. This crate provides:
//! - The [`Check`] trait and the one-shot [`run_check`] driver
//! - Metric-name normalization and numeric filtering ([`normalize`])
//! - Time-series demultiplexing ([`timeseries`])
//! - A thin async HTTP client with status handling ([`http`])
//! - An OpenMetrics/Prometheus text scraper ([`openmetrics`])
//! - YAML instance configuration ([`config`])

pub mod aggregator;
pub mod check;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod openmetrics;
pub mod status;
pub mod timeseries;

pub use aggregator::{Aggregator, MetricSample, ServiceCheckSample, Submission};
pub use check::{run_check, Check};
pub use config::{load_check_file, parse_instance, CheckFile};
pub use error::{CheckError, CheckResult};
pub use http::{HttpClient, HttpConfig};
pub use normalize::convert_metric_name;
pub use status::ServiceCheckStatus;
