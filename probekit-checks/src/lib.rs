/*!
Vendor API checks

Each check polls one vendor management API (or a Kafka cluster) and turns the answers into
normalized gauges and service checks through a [`probekit_base::Aggregator`]:

- [`cloudera`]: Cloudera Manager clusters, hosts and roles
- [`openstack_controller`]: Keystone, Nova and Neutron
- [`gitlab`]: GitLab probes and Prometheus endpoints
- [`cockroachdb`]: CockroachDB node metrics
- [`kafka_consumer`]: Kafka consumer group offsets and lag

[`registry::build_check`] builds a check from its conf.d name and instance.
*/

pub mod cloudera;
pub mod cockroachdb;
pub mod gitlab;
pub mod kafka_consumer;
pub mod openstack_controller;
pub mod registry;

pub use registry::{build_check, CHECK_NAMES};
