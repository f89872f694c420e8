use crate::aggregator::{Aggregator, Submission};
use crate::error::CheckResult;
use async_trait::async_trait;
use tracing::{error, info};

/// A polling unit that collects metrics from one external system
#[async_trait]
pub trait Check: Send {
    /// Check name, as used for conf.d files and submission topics
    fn name(&self) -> &str;

    /// Prefix for every metric and service check name
    fn namespace(&self) -> &str;

    /// Short label identifying the configured target
    fn instance_label(&self) -> String;

    /// Run one poll
    async fn check(&mut self, aggregator: &mut Aggregator) -> CheckResult<()>;
}

/// Run `check` once and close the run.
///
/// A failing check is logged and its error recorded in the submission; any
/// samples it emitted before failing are kept.
pub async fn run_check(check: &mut dyn Check) -> Submission {
    let mut aggregator = Aggregator::new(check.name(), check.namespace());
    let instance = check.instance_label();

    info!("Running check {} ({})", check.name(), instance);
    let error = match check.check(&mut aggregator).await {
        Ok(()) => None,
        Err(e) => {
            error!("Check {} failed for {}: {}", check.name(), instance, e);
            Some(e.to_string())
        }
    };

    let submission = aggregator.into_submission(instance, error);
    info!(
        "Check {} done: {} metrics, {} service checks",
        submission.check,
        submission.metrics.len(),
        submission.service_checks.len()
    );
    submission
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use crate::status::ServiceCheckStatus;

    struct Flaky {
        fail: bool,
    }

    #[async_trait]
    impl Check for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn namespace(&self) -> &str {
            "flaky"
        }

        fn instance_label(&self) -> String {
            "test".to_string()
        }

        async fn check(&mut self, aggregator: &mut Aggregator) -> CheckResult<()> {
            aggregator.gauge("before", 1.0, &[]);
            if self.fail {
                aggregator.service_check("can_connect", ServiceCheckStatus::Critical, &[], None);
                return Err(CheckError::Auth("denied".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_check_ok() {
        let mut check = Flaky { fail: false };
        let submission = run_check(&mut check).await;
        assert!(submission.error.is_none());
        assert_eq!(submission.metrics[0].name, "flaky.before");
    }

    #[tokio::test]
    async fn test_run_check_keeps_partial_results_on_error() {
        let mut check = Flaky { fail: true };
        let submission = run_check(&mut check).await;
        assert_eq!(submission.error.as_deref(), Some("authentication failed: denied"));
        assert_eq!(submission.metrics.len(), 1);
        assert_eq!(submission.service_checks[0].status, ServiceCheckStatus::Critical);
    }
}
