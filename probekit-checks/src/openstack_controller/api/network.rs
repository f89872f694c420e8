//! Neutron (network) REST client

use super::object_at;
use probekit_base::http::join_url;
use probekit_base::normalize::numeric_fields;
use probekit_base::{CheckResult, HttpClient};
use std::collections::BTreeMap;
use tracing::debug;

pub struct NetworkRest {
    http: HttpClient,
    endpoint: String,
    token: String,
}

impl NetworkRest {
    pub fn new(http: HttpClient, endpoint: &str, token: &str) -> Self {
        debug!("network endpoint: {}", endpoint);
        Self {
            http,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        }
    }

    /// Round trip to the endpoint root, in milliseconds
    pub async fn get_response_time(&self) -> CheckResult<f64> {
        let (_, elapsed) = self
            .http
            .get_json_timed(&self.endpoint, &[("X-Auth-Token", self.token.as_str())])
            .await?;
        Ok(elapsed.as_secs_f64() * 1000.0)
    }

    pub async fn get_quotas(&self, project_id: &str) -> CheckResult<BTreeMap<String, f64>> {
        let url = join_url(&self.endpoint, &format!("v2.0/quotas/{}", project_id));
        let response = self.http.get_json(&url, &[("X-Auth-Token", self.token.as_str())]).await?;
        Ok(numeric_fields(object_at(&url, &response, "/quota")?))
    }
}
