//! Kafka consumer lag check
//!
//! Compares the broker highwater offset of every monitored partition with the
//! offset each consumer group committed for it.

pub mod client;

pub use client::{KafkaClient, OffsetSource, TopicPartition};

use async_trait::async_trait;
use probekit_base::normalize::tag;
use probekit_base::{Aggregator, Check, CheckError, CheckResult, ServiceCheckStatus};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const CHECK_NAME: &str = "kafka_consumer";
pub const NAMESPACE: &str = "kafka";

/// topic -> partitions; no partitions (or null) means every partition of the topic
pub type TopicPartitions = BTreeMap<String, Option<Vec<i32>>>;

fn default_kafka_timeout() -> f64 {
    5.0
}

/// One or several bootstrap servers
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConnectStr {
    One(String),
    Many(Vec<String>),
}

impl ConnectStr {
    pub fn joined(&self) -> String {
        match self {
            ConnectStr::One(servers) => servers.clone(),
            ConnectStr::Many(servers) => servers.join(","),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConsumerConfig {
    pub kafka_connect_str: ConnectStr,
    /// consumer group -> topics -> partitions
    #[serde(default)]
    pub consumer_groups: BTreeMap<String, TopicPartitions>,
    /// Seconds per broker request
    #[serde(default = "default_kafka_timeout")]
    pub kafka_timeout: f64,
    #[serde(default)]
    pub security_protocol: Option<String>,
    #[serde(default)]
    pub sasl_mechanism: Option<String>,
    #[serde(default)]
    pub sasl_plain_username: Option<String>,
    #[serde(default)]
    pub sasl_plain_password: Option<String>,
    #[serde(default)]
    pub sasl_kerberos_service_name: Option<String>,
    #[serde(default)]
    pub tls_ca_cert: Option<String>,
    #[serde(default)]
    pub tls_cert: Option<String>,
    #[serde(default)]
    pub tls_private_key: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl KafkaConsumerConfig {
    /// librdkafka settings for this instance
    pub fn client_properties(&self) -> Vec<(&'static str, String)> {
        let mut properties = vec![("bootstrap.servers", self.kafka_connect_str.joined())];
        let optional = [
            ("security.protocol", &self.security_protocol),
            ("sasl.mechanism", &self.sasl_mechanism),
            ("sasl.username", &self.sasl_plain_username),
            ("sasl.password", &self.sasl_plain_password),
            ("sasl.kerberos.service.name", &self.sasl_kerberos_service_name),
            ("ssl.ca.location", &self.tls_ca_cert),
            ("ssl.certificate.location", &self.tls_cert),
            ("ssl.key.location", &self.tls_private_key),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                properties.push((key, value.clone()));
            }
        }
        properties
    }
}

/// Offsets read in one poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OffsetSnapshot {
    pub highwater: BTreeMap<TopicPartition, i64>,
    /// consumer group -> committed offsets
    pub consumer: BTreeMap<String, BTreeMap<TopicPartition, i64>>,
}

/// Read highwater and committed offsets for every configured group.
///
/// A partition whose highwater offset cannot be read is skipped; the poll
/// fails only when none could be read.
pub fn collect_offsets(
    source: &dyn OffsetSource,
    groups: &BTreeMap<String, TopicPartitions>,
) -> CheckResult<OffsetSnapshot> {
    let mut snapshot = OffsetSnapshot::default();
    let mut group_partitions: BTreeMap<&str, Vec<TopicPartition>> = BTreeMap::new();
    let mut all_partitions = BTreeSet::new();

    for (group, topics) in groups {
        let mut partitions = Vec::new();
        for (topic, configured) in topics {
            let ids = match configured {
                Some(ids) if !ids.is_empty() => ids.clone(),
                _ => source.partitions(topic)?,
            };
            partitions.extend(ids.into_iter().map(|id| (topic.clone(), id)));
        }
        all_partitions.extend(partitions.iter().cloned());
        group_partitions.insert(group, partitions);
    }

    let mut last_error = None;
    for (topic, partition) in &all_partitions {
        match source.highwater_offset(topic, *partition) {
            Ok(offset) => {
                snapshot.highwater.insert((topic.clone(), *partition), offset);
            }
            Err(e) => {
                warn!("Skipping {}/{}: {}", topic, partition, e);
                last_error = Some(e);
            }
        }
    }
    if snapshot.highwater.is_empty() {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    for (group, partitions) in group_partitions {
        let committed = source.committed_offsets(group, &partitions)?;
        debug!("group {} committed offsets: {:?}", group, committed);
        snapshot.consumer.insert(group.to_string(), committed);
    }
    Ok(snapshot)
}

fn partition_tags(base: &[String], topic: &str, partition: i32) -> Vec<String> {
    let mut tags = base.to_vec();
    tags.push(tag("topic", topic));
    tags.push(tag("partition", partition));
    tags
}

/// Emit broker offsets, consumer offsets and lag
pub fn report_offsets(snapshot: &OffsetSnapshot, tags: &[String], aggregator: &mut Aggregator) {
    for ((topic, partition), offset) in &snapshot.highwater {
        aggregator.gauge("broker_offset", *offset as f64, &partition_tags(tags, topic, *partition));
    }

    for (group, offsets) in &snapshot.consumer {
        for ((topic, partition), offset) in offsets {
            let mut group_tags = partition_tags(tags, topic, *partition);
            group_tags.push(tag("consumer_group", group));
            aggregator.gauge("consumer_offset", *offset as f64, &group_tags);

            let Some(highwater) = snapshot.highwater.get(&(topic.clone(), *partition)) else {
                debug!("No highwater offset for {}/{}, lag of {} skipped", topic, partition, group);
                continue;
            };
            let lag = highwater - offset;
            if lag < 0 {
                warn!(
                    "Consumer group {} is ahead of the broker on {}/{} (lag {}); the broker may have been reset",
                    group, topic, partition, lag
                );
            }
            aggregator.gauge("consumer_lag", lag as f64, &group_tags);
        }
    }
}

pub struct KafkaConsumerCheck {
    config: KafkaConsumerConfig,
    timeout: Duration,
}

impl KafkaConsumerCheck {
    pub fn new(config: KafkaConsumerConfig) -> CheckResult<Self> {
        if config.kafka_connect_str.joined().trim().is_empty() {
            return Err(CheckError::Config("kafka_connect_str is empty".to_string()));
        }
        if config.consumer_groups.is_empty() {
            return Err(CheckError::Config("consumer_groups is required".to_string()));
        }
        if let Some((group, _)) = config.consumer_groups.iter().find(|(_, topics)| topics.is_empty()) {
            return Err(CheckError::Config(format!(
                "consumer group {} lists no topic",
                group
            )));
        }
        let timeout = Duration::try_from_secs_f64(config.kafka_timeout)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| CheckError::Config(format!("invalid kafka_timeout {}", config.kafka_timeout)))?;
        Ok(Self { config, timeout })
    }
}

#[async_trait]
impl Check for KafkaConsumerCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn namespace(&self) -> &str {
        NAMESPACE
    }

    fn instance_label(&self) -> String {
        self.config.kafka_connect_str.joined()
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> CheckResult<()> {
        let properties = self.config.client_properties();
        let groups = self.config.consumer_groups.clone();
        let timeout = self.timeout;

        let result = tokio::task::spawn_blocking(move || {
            let client = KafkaClient::new(properties, timeout)?;
            collect_offsets(&client, &groups)
        })
        .await
        .unwrap_or_else(|e| Err(CheckError::Broker(format!("offset collection task failed: {}", e))));

        match result {
            Ok(snapshot) => {
                aggregator.service_check("can_connect", ServiceCheckStatus::Ok, &self.config.tags, None);
                report_offsets(&snapshot, &self.config.tags, aggregator);
                Ok(())
            }
            Err(e) => {
                error!("Cannot read offsets from {}: {}", self.instance_label(), e);
                aggregator.service_check(
                    "can_connect",
                    ServiceCheckStatus::Critical,
                    &self.config.tags,
                    Some(e.to_string()),
                );
                Err(e)
            }
        }
    }
}
