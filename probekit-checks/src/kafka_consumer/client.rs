//! Offset lookups against the Kafka cluster
//!
//! librdkafka calls block; callers run them on a blocking thread.

use probekit_base::{CheckError, CheckResult};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::{Offset, TopicPartitionList};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// `(topic, partition)`
pub type TopicPartition = (String, i32);

/// Where broker highwater marks and committed group offsets come from
pub trait OffsetSource {
    /// Partition ids of `topic`
    fn partitions(&self, topic: &str) -> CheckResult<Vec<i32>>;

    fn highwater_offset(&self, topic: &str, partition: i32) -> CheckResult<i64>;

    /// Committed offsets of `group`; partitions without a commit are left out
    fn committed_offsets(
        &self,
        group: &str,
        partitions: &[TopicPartition],
    ) -> CheckResult<BTreeMap<TopicPartition, i64>>;
}

fn broker_error(what: &str, e: KafkaError) -> CheckError {
    CheckError::Broker(format!("{}: {}", what, e))
}

pub struct KafkaClient {
    properties: Vec<(&'static str, String)>,
    timeout: Duration,
    metadata_consumer: BaseConsumer,
}

impl KafkaClient {
    /// `properties` are librdkafka settings (`bootstrap.servers`, `security.protocol`, ...)
    pub fn new(properties: Vec<(&'static str, String)>, timeout: Duration) -> CheckResult<Self> {
        let metadata_consumer = Self::consumer(&properties, "probekit-offsets")?;
        Ok(Self {
            properties,
            timeout,
            metadata_consumer,
        })
    }

    fn consumer(properties: &[(&'static str, String)], group: &str) -> CheckResult<BaseConsumer> {
        let mut config = ClientConfig::new();
        for (key, value) in properties {
            config.set(*key, value.as_str());
        }
        config
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .create::<BaseConsumer>()
            .map_err(|e| CheckError::Config(format!("cannot create Kafka client: {}", e)))
    }
}

impl OffsetSource for KafkaClient {
    fn partitions(&self, topic: &str) -> CheckResult<Vec<i32>> {
        let metadata = self
            .metadata_consumer
            .fetch_metadata(Some(topic), self.timeout)
            .map_err(|e| broker_error(&format!("metadata for topic {}", topic), e))?;
        let partitions: Vec<i32> = metadata
            .topics()
            .iter()
            .filter(|t| t.name() == topic)
            .flat_map(|t| t.partitions().iter().map(|p| p.id()))
            .collect();
        debug!("topic {} partitions: {:?}", topic, partitions);
        Ok(partitions)
    }

    fn highwater_offset(&self, topic: &str, partition: i32) -> CheckResult<i64> {
        let (_, high) = self
            .metadata_consumer
            .fetch_watermarks(topic, partition, self.timeout)
            .map_err(|e| broker_error(&format!("watermarks for {}/{}", topic, partition), e))?;
        Ok(high)
    }

    fn committed_offsets(
        &self,
        group: &str,
        partitions: &[TopicPartition],
    ) -> CheckResult<BTreeMap<TopicPartition, i64>> {
        let consumer = Self::consumer(&self.properties, group)?;
        let mut list = TopicPartitionList::new();
        for (topic, partition) in partitions {
            list.add_partition(topic, *partition);
        }

        let committed = consumer
            .committed_offsets(list, self.timeout)
            .map_err(|e| broker_error(&format!("committed offsets of group {}", group), e))?;

        let mut offsets = BTreeMap::new();
        for element in committed.elements() {
            match element.offset() {
                Offset::Offset(offset) => {
                    offsets.insert((element.topic().to_string(), element.partition()), offset);
                }
                other => debug!(
                    "group {} has no commit for {}/{}: {:?}",
                    group,
                    element.topic(),
                    element.partition(),
                    other
                ),
            }
        }
        Ok(offsets)
    }
}
