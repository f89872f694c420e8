//! Nova (compute) REST client

use super::{array_at, id_string, object_at, str_field};
use probekit_base::http::join_url;
use probekit_base::normalize::{lenient_numeric_fields, numeric_fields, prefixed_numeric_fields};
use probekit_base::{CheckError, CheckResult, HttpClient};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const NOVA_MICROVERSION_HEADER: &str = "X-OpenStack-Nova-API-Version";

/// Load averages out of an `uptime` line:
/// ` 16:53:48 up 1 day, 21:34,  3 users,  load average: 0.04, 0.14, 0.19`
///
/// Returns `None` unless exactly three averages parse.
pub fn load_averages_from_uptime(uptime: &str) -> Option<[f64; 3]> {
    let (_, tail) = uptime.trim().split_once("load average:")?;
    let values = tail
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    match values.as_slice() {
        [one, five, fifteen] => Some([*one, *five, *fifteen]),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotaSet {
    pub id: String,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeService {
    pub binary: String,
    pub is_up: bool,
    pub host: Option<String>,
    pub status: Option<String>,
    pub service_id: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerMetrics {
    pub name: String,
    pub status: String,
    pub hypervisor_hostname: Option<String>,
    pub flavor_name: Option<String>,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlavorMetrics {
    pub name: String,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HypervisorMetrics {
    pub name: String,
    pub state: Option<String>,
    pub hypervisor_type: String,
    pub status: String,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OsAggregate {
    pub name: String,
    pub availability_zone: Option<String>,
    pub hosts: Vec<String>,
}

pub struct ComputeRest {
    http: HttpClient,
    endpoint: String,
    token: String,
    microversion: Option<String>,
}

impl ComputeRest {
    pub fn new(http: HttpClient, endpoint: &str, token: &str, microversion: Option<&str>) -> Self {
        debug!("compute endpoint: {}", endpoint);
        Self {
            http,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
            microversion: microversion.map(str::to_string),
        }
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("X-Auth-Token", self.token.as_str())];
        if let Some(version) = &self.microversion {
            headers.push((NOVA_MICROVERSION_HEADER, version.as_str()));
        }
        headers
    }

    async fn get(&self, path: &str) -> CheckResult<(String, Value)> {
        let url = join_url(&self.endpoint, path);
        let value = self.http.get_json(&url, &self.headers()).await?;
        Ok((url, value))
    }

    /// Round trip to the endpoint root, in milliseconds
    pub async fn get_response_time(&self) -> CheckResult<f64> {
        let (_, elapsed) = self.http.get_json_timed(&self.endpoint, &self.headers()).await?;
        Ok(elapsed.as_secs_f64() * 1000.0)
    }

    pub async fn get_limits(&self, project_id: &str) -> CheckResult<BTreeMap<String, f64>> {
        let (url, response) = self.get(&format!("limits?tenant_id={}", project_id)).await?;
        Ok(numeric_fields(object_at(&url, &response, "/limits/absolute")?))
    }

    pub async fn get_quota_set(&self, project_id: &str) -> CheckResult<QuotaSet> {
        let (url, response) = self.get(&format!("os-quota-sets/{}", project_id)).await?;
        let quota_set = object_at(&url, &response, "/quota_set")?;
        let id = quota_set
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| CheckError::payload(&url, "quota set without id"))?;
        Ok(QuotaSet {
            id,
            metrics: numeric_fields(quota_set),
        })
    }

    pub async fn get_services(&self) -> CheckResult<Vec<ComputeService>> {
        let (url, response) = self.get("os-services").await?;
        let services = array_at(&url, &response, "/services")?
            .iter()
            .filter_map(Value::as_object)
            .map(|service| {
                let state = str_field(service, "state");
                let status = str_field(service, "status");
                let is_down = state.as_deref() == Some("down");
                let is_enabled = status.as_deref() == Some("enabled");
                ComputeService {
                    binary: str_field(service, "binary").unwrap_or_default().replace('-', "_"),
                    is_up: !(is_down && is_enabled),
                    host: str_field(service, "host"),
                    status,
                    service_id: service.get("id").and_then(id_string),
                    state,
                }
            })
            .collect();
        Ok(services)
    }

    pub async fn get_servers(&self, project_id: &str) -> CheckResult<BTreeMap<String, ServerMetrics>> {
        let (url, response) = self.get(&format!("servers/detail?project_id={}", project_id)).await?;
        let mut servers = BTreeMap::new();
        for server in array_at(&url, &response, "/servers")?.iter().filter_map(Value::as_object) {
            let Some(server_id) = server.get("id").and_then(id_string) else {
                continue;
            };
            let mut entry = ServerMetrics {
                name: str_field(server, "name").unwrap_or_default(),
                status: str_field(server, "status").unwrap_or_default().to_lowercase(),
                hypervisor_hostname: str_field(server, "OS-EXT-SRV-ATTR:hypervisor_hostname"),
                flavor_name: None,
                metrics: BTreeMap::new(),
            };

            if let Some(flavor) = server.get("flavor").and_then(Value::as_object).filter(|f| !f.is_empty()) {
                match flavor.get("id").and_then(id_string) {
                    Some(flavor_id) => {
                        let resolved = self.get_flavor(&flavor_id).await?;
                        entry.flavor_name = Some(resolved.name);
                        entry
                            .metrics
                            .extend(resolved.metrics.into_iter().map(|(k, v)| (format!("flavor.{}", k), v)));
                    }
                    None => {
                        entry.flavor_name = str_field(flavor, "original_name");
                        entry.metrics.extend(prefixed_numeric_fields("flavor", flavor));
                    }
                }
            }

            match self.get_server_diagnostics(&server_id).await {
                Ok(diagnostics) => entry.metrics.extend(diagnostics),
                Err(e) => info!(
                    "Could not query the server diagnostics endpoint for server {}, perhaps it is a bare metal machine: {}",
                    server_id, e
                ),
            }
            servers.insert(server_id, entry);
        }
        Ok(servers)
    }

    /// Diagnostics of one server; `disk_details` / `cpu_details` entries
    /// share their keys, so the last entry of each list wins.
    async fn get_server_diagnostics(&self, server_id: &str) -> CheckResult<BTreeMap<String, f64>> {
        let (_, response) = self.get(&format!("servers/{}/diagnostics", server_id)).await?;
        let mut metrics = BTreeMap::new();
        let Some(diagnostics) = response.as_object() else {
            return Ok(metrics);
        };
        for details in ["disk_details", "cpu_details"] {
            if let Some(entries) = diagnostics.get(details).and_then(Value::as_array) {
                for entry in entries.iter().filter_map(Value::as_object) {
                    metrics.extend(prefixed_numeric_fields(details, entry));
                }
            }
        }
        metrics.extend(numeric_fields(diagnostics));
        Ok(metrics)
    }

    pub async fn get_flavors(&self) -> CheckResult<BTreeMap<String, FlavorMetrics>> {
        let (url, response) = self.get("flavors/detail").await?;
        let mut flavors = BTreeMap::new();
        for flavor in array_at(&url, &response, "/flavors")?.iter().filter_map(Value::as_object) {
            let Some(id) = flavor.get("id").and_then(id_string) else {
                continue;
            };
            flavors.insert(
                id,
                FlavorMetrics {
                    name: str_field(flavor, "name").unwrap_or_default(),
                    metrics: numeric_fields(flavor),
                },
            );
        }
        Ok(flavors)
    }

    /// Single flavor; string fields holding integers count as metrics
    async fn get_flavor(&self, flavor_id: &str) -> CheckResult<FlavorMetrics> {
        let (url, response) = self.get(&format!("flavors/{}", flavor_id)).await?;
        let flavor = object_at(&url, &response, "/flavor")?;
        Ok(FlavorMetrics {
            name: str_field(flavor, "name").unwrap_or_default(),
            metrics: lenient_numeric_fields(flavor),
        })
    }

    pub async fn get_hypervisors(&self) -> CheckResult<BTreeMap<String, HypervisorMetrics>> {
        let (url, response) = self.get("os-hypervisors/detail?with_servers=true").await?;
        let mut hypervisors = BTreeMap::new();
        for hypervisor in array_at(&url, &response, "/hypervisors")?.iter().filter_map(Value::as_object) {
            let Some(id) = hypervisor.get("id").and_then(id_string) else {
                continue;
            };
            let mut metrics = numeric_fields(hypervisor);

            let load_averages = match str_field(hypervisor, "uptime").filter(|u| !u.is_empty()) {
                Some(uptime) => load_averages_from_uptime(&uptime),
                None => self.get_hypervisor_uptime(&id).await.as_deref().and_then(load_averages_from_uptime),
            };
            if let Some(averages) = load_averages {
                for (minutes, value) in [1, 5, 15].iter().zip(averages) {
                    metrics.insert(format!("load_{}", minutes), value);
                }
            }

            hypervisors.insert(
                id,
                HypervisorMetrics {
                    name: str_field(hypervisor, "hypervisor_hostname").unwrap_or_default(),
                    state: str_field(hypervisor, "state"),
                    hypervisor_type: str_field(hypervisor, "hypervisor_type").unwrap_or_default(),
                    status: str_field(hypervisor, "status").unwrap_or_default(),
                    metrics,
                },
            );
        }
        Ok(hypervisors)
    }

    /// `uptime` text of a hypervisor from the dedicated endpoint; only a 2xx
    /// answer is used, anything else is logged and ignored.
    async fn get_hypervisor_uptime(&self, hypervisor_id: &str) -> Option<String> {
        let url = join_url(&self.endpoint, &format!("os-hypervisors/{}/uptime", hypervisor_id));
        match self.http.get_status(&url, &self.headers()).await {
            Ok((status, body)) if (200..300).contains(&status) => {
                debug!("response uptime: {}", body);
                let value: Value = match serde_json::from_str(&body) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Invalid uptime response for hypervisor {}: {}", hypervisor_id, e);
                        return None;
                    }
                };
                value
                    .pointer("/hypervisor/uptime")
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .map(str::to_string)
            }
            Ok((status, _)) => {
                debug!("uptime for hypervisor {} returned HTTP {}", hypervisor_id, status);
                None
            }
            Err(e) => {
                info!(
                    "Could not query the uptime for hypervisor {}, perhaps it is a bare metal: {}",
                    hypervisor_id, e
                );
                None
            }
        }
    }

    pub async fn get_os_aggregates(&self) -> CheckResult<BTreeMap<String, OsAggregate>> {
        let (url, response) = self.get("os-aggregates").await?;
        let mut aggregates = BTreeMap::new();
        for aggregate in array_at(&url, &response, "/aggregates")?.iter().filter_map(Value::as_object) {
            let Some(id) = aggregate.get("id").and_then(id_string) else {
                continue;
            };
            aggregates.insert(id, aggregate_from(aggregate));
        }
        Ok(aggregates)
    }
}

fn aggregate_from(aggregate: &Map<String, Value>) -> OsAggregate {
    OsAggregate {
        name: str_field(aggregate, "name").unwrap_or_default(),
        availability_zone: str_field(aggregate, "availability_zone"),
        hosts: aggregate
            .get("hosts")
            .and_then(Value::as_array)
            .map(|hosts| hosts.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_averages_from_uptime() {
        let uptime = " 16:53:48 up 1 day, 21:34,  3 users,  load average: 0.04, 0.14, 0.19\n";
        assert_eq!(load_averages_from_uptime(uptime), Some([0.04, 0.14, 0.19]));
    }

    #[test]
    fn test_load_averages_need_three_values() {
        assert_eq!(load_averages_from_uptime("load average: 0.04, 0.14"), None);
        assert_eq!(load_averages_from_uptime("load average: a, b, c"), None);
        assert_eq!(load_averages_from_uptime("up 3 days"), None);
    }

    #[test]
    fn test_aggregate_from() {
        let value = json!({"id": 1, "name": "my-aggregate", "availability_zone": "london", "hosts": ["compute", 3]});
        let aggregate = aggregate_from(value.as_object().unwrap());
        assert_eq!(aggregate.name, "my-aggregate");
        assert_eq!(aggregate.availability_zone.as_deref(), Some("london"));
        assert_eq!(aggregate.hosts, vec!["compute".to_string()]);

        let value = json!({"id": 2, "name": "no-zone", "availability_zone": null});
        let aggregate = aggregate_from(value.as_object().unwrap());
        assert_eq!(aggregate.availability_zone, None);
        assert!(aggregate.hosts.is_empty());
    }

    fn has_load_averages(hypervisor: &HypervisorMetrics) -> bool {
        hypervisor.metrics.keys().any(|k| k.starts_with("load_"))
    }

    #[tokio::test]
    async fn test_hypervisor_uptime_sources() {
        let mut server = mockito::Server::new_async().await;
        let hypervisors = json!({"hypervisors": [
            {
                "id": 2,
                "hypervisor_hostname": "inline",
                "hypervisor_type": "QEMU",
                "status": "enabled",
                "state": "up",
                "vcpus": 4,
                "uptime": " 08:32:11 up 93 days, 18:25, 12 users,  load average: 0.20, 0.12, 0.09\n"
            },
            {"id": 3, "hypervisor_hostname": "bare-metal", "status": "enabled", "state": "up", "vcpus": 8},
            {"id": 4, "hypervisor_hostname": "remote", "status": "enabled", "state": "up", "vcpus": 2}
        ]});
        let _detail = server
            .mock("GET", "/compute/v2.1/os-hypervisors/detail?with_servers=true")
            .with_body(hypervisors.to_string())
            .create_async()
            .await;
        let inline = server
            .mock("GET", "/compute/v2.1/os-hypervisors/2/uptime")
            .expect(0)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/compute/v2.1/os-hypervisors/3/uptime")
            .with_status(404)
            .create_async()
            .await;
        let _remote = server
            .mock("GET", "/compute/v2.1/os-hypervisors/4/uptime")
            .with_body(json!({"hypervisor": {"id": 4, "uptime": " 10:00:00 up 1 day, load average: 1.50, 1.25, 1.00"}}).to_string())
            .create_async()
            .await;

        let http = HttpClient::new(&Default::default()).unwrap();
        let compute = ComputeRest::new(http, &format!("{}/compute/v2.1", server.url()), "token", None);
        let hypervisors = compute.get_hypervisors().await.unwrap();

        let inline_hv = &hypervisors["2"];
        assert_eq!(inline_hv.metrics["load_1"], 0.20);
        assert_eq!(inline_hv.metrics["load_5"], 0.12);
        assert_eq!(inline_hv.metrics["load_15"], 0.09);
        inline.assert_async().await;

        let bare_metal = &hypervisors["3"];
        assert!(!has_load_averages(bare_metal));
        assert_eq!(bare_metal.metrics["vcpus"], 8.0);

        let remote = &hypervisors["4"];
        assert_eq!(remote.metrics["load_1"], 1.50);
        assert_eq!(remote.metrics["load_15"], 1.00);
    }
}
