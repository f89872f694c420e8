//! Check lookup by conf.d name

use crate::cloudera::{ClouderaCheck, ClouderaConfig};
use crate::cockroachdb::{CockroachdbCheck, CockroachdbConfig};
use crate::gitlab::{GitlabCheck, GitlabConfig};
use crate::kafka_consumer::{KafkaConsumerCheck, KafkaConsumerConfig};
use crate::openstack_controller::{OpenstackConfig, OpenstackControllerCheck};
use probekit_base::{parse_instance, Check, CheckError, CheckResult};

/// Every check this crate provides
pub const CHECK_NAMES: &[&str] = &[
    crate::cloudera::CHECK_NAME,
    crate::cockroachdb::CHECK_NAME,
    crate::gitlab::CHECK_NAME,
    crate::kafka_consumer::CHECK_NAME,
    crate::openstack_controller::CHECK_NAME,
];

/// Build the check `name` for one configured instance
pub fn build_check(name: &str, instance: &serde_yaml::Value) -> CheckResult<Box<dyn Check>> {
    let check: Box<dyn Check> = match name {
        crate::cloudera::CHECK_NAME => {
            Box::new(ClouderaCheck::new(parse_instance::<ClouderaConfig>(instance)?))
        }
        crate::cockroachdb::CHECK_NAME => {
            Box::new(CockroachdbCheck::new(parse_instance::<CockroachdbConfig>(instance)?)?)
        }
        crate::gitlab::CHECK_NAME => Box::new(GitlabCheck::new(parse_instance::<GitlabConfig>(instance)?)),
        crate::kafka_consumer::CHECK_NAME => {
            Box::new(KafkaConsumerCheck::new(parse_instance::<KafkaConsumerConfig>(instance)?)?)
        }
        crate::openstack_controller::CHECK_NAME => Box::new(OpenstackControllerCheck::new(
            parse_instance::<OpenstackConfig>(instance)?,
        )),
        other => {
            return Err(CheckError::Config(format!(
                "unknown check {} (available: {})",
                other,
                CHECK_NAMES.join(", ")
            )))
        }
    };
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(yaml: &str) -> serde_yaml::Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_build_known_checks() {
        let check = build_check(
            "cloudera",
            &instance("api_url: http://cm:7180/api/v48\nworkload_username: u\nworkload_password: p"),
        )
        .unwrap();
        assert_eq!(check.name(), "cloudera");
        assert_eq!(check.namespace(), "cloudera");

        let check = build_check(
            "openstack_controller",
            &instance("keystone_server_url: http://ks:5000\nusername: admin\npassword: pw"),
        )
        .unwrap();
        assert_eq!(check.name(), "openstack_controller");
        assert_eq!(check.namespace(), "openstack");

        let check = build_check("gitlab", &instance("gitlab_url: http://localhost:8086")).unwrap();
        assert_eq!(check.instance_label(), "http://localhost:8086");

        let check = build_check(
            "kafka_consumer",
            &instance("kafka_connect_str: localhost:9092\nconsumer_groups:\n  my_consumer:\n    marvel: [0]"),
        )
        .unwrap();
        assert_eq!(check.namespace(), "kafka");
        assert_eq!(check.instance_label(), "localhost:9092");
    }

    #[test]
    fn test_build_check_errors() {
        assert!(matches!(
            build_check("mystery", &instance("{}")),
            Err(CheckError::Config(_))
        ));
        // missing workload credentials
        assert!(matches!(
            build_check("cloudera", &instance("api_url: http://cm:7180/api/v48")),
            Err(CheckError::Config(_))
        ));
        // no consumer groups
        assert!(matches!(
            build_check("kafka_consumer", &instance("kafka_connect_str: localhost:9092")),
            Err(CheckError::Config(_))
        ));
    }

    #[test]
    fn test_check_names_are_buildable_names() {
        assert_eq!(CHECK_NAMES.len(), 5);
        assert!(CHECK_NAMES.contains(&"kafka_consumer"));
        assert!(CHECK_NAMES.contains(&"cockroachdb"));
    }
}
