//! Cloudera Manager 7 REST client
//!
//! Walks clusters -> hosts -> roles and turns the time-series endpoint
//! answers into `cloudera.<category>.<metric>` gauges.

use super::api_client::ApiClient;
use super::entity_status::entity_status;
use super::metrics::Category;
use async_trait::async_trait;
use probekit_base::http::{join_url, with_query};
use probekit_base::normalize::tag;
use probekit_base::timeseries::{demultiplex, TimeSeries};
use probekit_base::{Aggregator, CheckError, CheckResult, HttpClient, ServiceCheckStatus};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct ApiList<T> {
    #[serde(default)]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiEntityTag {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCluster {
    name: Option<String>,
    entity_status: Option<String>,
    #[serde(default)]
    tags: Vec<ApiEntityTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiHost {
    host_id: Option<String>,
    entity_status: Option<String>,
    #[serde(default)]
    tags: Vec<ApiEntityTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<ApiTimeSeries>,
}

#[derive(Debug, Deserialize)]
struct ApiTimeSeries {
    metadata: ApiTimeSeriesMetadata,
    #[serde(default)]
    data: Vec<ApiTimeSeriesData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTimeSeriesMetadata {
    metric_name: String,
    entity_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiTimeSeriesData {
    value: Option<f64>,
}

fn entity_tags(tags: &[ApiEntityTag]) -> Vec<String> {
    tags.iter().map(|t| tag(&t.name, &t.value)).collect()
}

/// `SELECT last(a),last(b) WHERE <filter> AND category=<CATEGORY>`
pub fn build_query(category: Category, filter: &str) -> String {
    let metric_names = category
        .metrics()
        .iter()
        .map(|m| format!("last({})", m))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "SELECT {} WHERE {} AND category={}",
        metric_names,
        filter,
        category.query_name()
    )
}

pub struct ApiClientV7 {
    http: HttpClient,
    api_url: String,
    tags: Vec<String>,
}

impl ApiClientV7 {
    pub fn new(http: HttpClient, api_url: &str, tags: Vec<String>) -> Self {
        Self {
            http,
            api_url: api_url.to_string(),
            tags,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> CheckResult<T> {
        let url = with_query(&join_url(&self.api_url, path), params)?;
        let value = self.http.get_json(&url, &[]).await?;
        serde_json::from_value(value).map_err(|e| CheckError::payload(&url, e.to_string()))
    }

    async fn collect_clusters(&self, aggregator: &mut Aggregator) -> CheckResult<()> {
        let clusters: ApiList<ApiCluster> = self
            .get("clusters", &[("clusterType", "any"), ("view", "full")])
            .await?;
        debug!("read_clusters_response: {} clusters", clusters.items.len());
        for cluster in &clusters.items {
            self.collect_cluster(cluster, aggregator).await?;
        }
        Ok(())
    }

    async fn collect_cluster(&self, cluster: &ApiCluster, aggregator: &mut Aggregator) -> CheckResult<()> {
        debug!("cluster: {:?}", cluster);
        let status = entity_status(cluster.entity_status.as_deref());

        let mut tags = self.tags.clone();
        if let Some(name) = &cluster.name {
            tags.push(tag("cloudera_cluster", name));
        }
        tags.extend(entity_tags(&cluster.tags));
        aggregator.service_check("cluster.health", status, &tags, None);

        if let Some(name) = &cluster.name {
            let filter = format!("clusterName=\"{}\"", name);
            self.collect_query_time_series(Category::Cluster, &filter, &self.tags, aggregator)
                .await?;
            self.collect_cluster_hosts(name, aggregator).await?;
        }
        Ok(())
    }

    async fn collect_cluster_hosts(&self, cluster_name: &str, aggregator: &mut Aggregator) -> CheckResult<()> {
        let path = format!("clusters/{}/hosts", cluster_name);
        let hosts: ApiList<ApiHost> = self.get(&path, &[("view", "full")]).await?;
        debug!("list_hosts_response: {} hosts", hosts.items.len());
        for host in &hosts.items {
            self.collect_cluster_host(host, aggregator).await?;
        }
        Ok(())
    }

    async fn collect_cluster_host(&self, host: &ApiHost, aggregator: &mut Aggregator) -> CheckResult<()> {
        debug!("host: {:?}", host);
        let Some(host_id) = &host.host_id else {
            return Ok(());
        };
        let status = entity_status(host.entity_status.as_deref());

        let mut tags = self.tags.clone();
        tags.extend(entity_tags(&host.tags));

        let filter = format!("hostId=\"{}\"", host_id);
        self.collect_query_time_series(Category::Host, &filter, &tags, aggregator)
            .await?;
        self.collect_query_time_series(Category::Role, &filter, &self.tags, aggregator)
            .await?;

        debug!("host.health tags: {:?}", tags);
        aggregator.service_check("host.health", status, &tags, None);
        Ok(())
    }

    async fn collect_query_time_series(
        &self,
        category: Category,
        filter: &str,
        tags: &[String],
        aggregator: &mut Aggregator,
    ) -> CheckResult<()> {
        let query = build_query(category, filter);
        debug!("query: {}", query);
        let response: ApiList<ApiTimeSeriesResponse> = self.get("timeseries", &[("query", &query)]).await?;

        for item in &response.items {
            let series: Vec<TimeSeries> = item
                .time_series
                .iter()
                .map(|ts| TimeSeries {
                    metric_name: ts.metadata.metric_name.clone(),
                    entity_name: ts.metadata.entity_name.clone(),
                    values: ts.data.iter().filter_map(|d| d.value).collect(),
                })
                .collect();

            for (entity, metrics) in demultiplex(&series, category.metrics()) {
                let mut metric_tags = tags.to_vec();
                metric_tags.push(tag(&format!("cloudera_{}", category.as_str()), &entity));
                for (metric, values) in metrics {
                    let full_metric_name = format!("{}.{}", category.as_str(), metric);
                    for value in values {
                        aggregator.gauge(&full_metric_name, value, &metric_tags);
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ApiClient for ApiClientV7 {
    async fn collect_data(&self, aggregator: &mut Aggregator) -> CheckResult<()> {
        let result = self.collect_clusters(aggregator).await;
        match &result {
            Ok(()) => aggregator.service_check("can_connect", ServiceCheckStatus::Ok, &self.tags, None),
            Err(e) => {
                error!("Exception: {}", e);
                aggregator.service_check(
                    "can_connect",
                    ServiceCheckStatus::Critical,
                    &self.tags,
                    Some(e.to_string()),
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query() {
        let query = build_query(Category::Cluster, "clusterName=\"c1\"");
        assert!(query.starts_with("SELECT last(cpu_percent_across_hosts),last(total_read_bytes_rate_across_disks),"));
        assert!(query.ends_with(" WHERE clusterName=\"c1\" AND category=CLUSTER"));
    }

    #[test]
    fn test_api_list_items_default_to_empty() {
        let clusters: ApiList<ApiCluster> = serde_json::from_str("{}").unwrap();
        assert!(clusters.items.is_empty());

        let hosts: ApiList<ApiHost> =
            serde_json::from_str(r#"{"items": [{"hostId": "h1", "hostname": "node1"}]}"#).unwrap();
        assert_eq!(hosts.items.len(), 1);
        assert_eq!(hosts.items[0].host_id.as_deref(), Some("h1"));
    }
}
