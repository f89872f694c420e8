//! Cloudera Manager check
//!
//! Polls the Cloudera Manager REST API for cluster and host health and the
//! cluster / host / role time series.

mod api_client;
mod api_client_v7;
mod entity_status;
mod metrics;

pub use api_client::{major_version, make_api_client, ApiClient};
pub use api_client_v7::build_query;
pub use entity_status::entity_status;
pub use metrics::Category;

use async_trait::async_trait;
use probekit_base::{Aggregator, Check, CheckError, CheckResult, HttpClient, HttpConfig, ServiceCheckStatus};
use serde::Deserialize;
use tracing::error;

pub const CHECK_NAME: &str = "cloudera";

#[derive(Debug, Clone, Deserialize)]
pub struct ClouderaConfig {
    /// Base URL including the API version, e.g. `http://cm:7180/api/v48`
    pub api_url: String,
    pub workload_username: String,
    pub workload_password: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub http: HttpConfig,
}

pub struct ClouderaCheck {
    config: ClouderaConfig,
    client: Option<Box<dyn ApiClient>>,
}

impl ClouderaCheck {
    pub fn new(config: ClouderaConfig) -> Self {
        Self { config, client: None }
    }

    async fn client(&mut self) -> CheckResult<&dyn ApiClient> {
        if self.client.is_none() {
            let http = HttpClient::new(&self.config.http)?.with_basic_auth(
                self.config.workload_username.clone(),
                self.config.workload_password.clone(),
            );
            let client = make_api_client(http, &self.config.api_url, self.config.tags.clone()).await?;
            self.client = Some(client);
        }
        self.client
            .as_deref()
            .ok_or_else(|| CheckError::Config("Cloudera API client not initialised".to_string()))
    }
}

#[async_trait]
impl Check for ClouderaCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn namespace(&self) -> &str {
        CHECK_NAME
    }

    fn instance_label(&self) -> String {
        self.config.api_url.clone()
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> CheckResult<()> {
        let tags = self.config.tags.clone();
        let client = match self.client().await {
            Ok(client) => client,
            Err(e) => {
                error!("Cannot create Cloudera API client: {}", e);
                aggregator.service_check(
                    "can_connect",
                    ServiceCheckStatus::Critical,
                    &tags,
                    Some(e.to_string()),
                );
                return Err(e);
            }
        };
        client.collect_data(aggregator).await
    }
}
