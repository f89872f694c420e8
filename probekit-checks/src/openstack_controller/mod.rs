//! OpenStack controller check
//!
//! Authenticates against Keystone, then walks every project the user can
//! scope to and collects Nova and Neutron metrics through the endpoints of
//! the project's service catalog.

pub mod api;

use api::compute::ComputeRest;
use api::keystone::{find_endpoint, KeystoneRest, Project, ProjectAuth};
use api::network::NetworkRest;
use async_trait::async_trait;
use probekit_base::normalize::tag;
use probekit_base::{Aggregator, Check, CheckResult, HttpClient, HttpConfig, ServiceCheckStatus};
use serde::Deserialize;
use tracing::{debug, error, warn};

pub const CHECK_NAME: &str = "openstack_controller";
pub const NAMESPACE: &str = "openstack";

fn default_domain_id() -> String {
    "default".to_string()
}

fn default_endpoint_interface() -> String {
    "public".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenstackConfig {
    pub keystone_server_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_domain_id")]
    pub domain_id: String,
    /// Sent as `X-OpenStack-Nova-API-Version` when set
    #[serde(default)]
    pub nova_microversion: Option<String>,
    #[serde(default = "default_endpoint_interface")]
    pub endpoint_interface: String,
    #[serde(default)]
    pub endpoint_region_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub http: HttpConfig,
}

pub struct OpenstackControllerCheck {
    config: OpenstackConfig,
}

impl OpenstackControllerCheck {
    pub fn new(config: OpenstackConfig) -> Self {
        Self { config }
    }

    fn base_tags(&self) -> Vec<String> {
        let mut tags = self.config.tags.clone();
        tags.push(tag("keystone_server", &self.config.keystone_server_url));
        tags
    }

    async fn authorize(&self, keystone: &KeystoneRest) -> CheckResult<(String, Vec<Project>)> {
        let token = keystone
            .authorize_user(&self.config.username, &self.config.password, &self.config.domain_id)
            .await?;
        let projects = keystone.get_auth_projects(&token).await?;
        debug!("projects: {:?}", projects);
        Ok((token, projects))
    }

    async fn collect_project(
        &self,
        http: &HttpClient,
        auth: &ProjectAuth,
        project: &Project,
        aggregator: &mut Aggregator,
    ) {
        let mut tags = self.base_tags();
        tags.push(tag("project_id", &project.id));
        tags.push(tag("project_name", &project.name));

        let interface = self.config.endpoint_interface.as_str();
        let region = self.config.endpoint_region_id.as_deref();

        match find_endpoint(&auth.catalog, "compute", interface, region) {
            Some(endpoint) => {
                let compute = ComputeRest::new(
                    http.clone(),
                    &endpoint,
                    &auth.token,
                    self.config.nova_microversion.as_deref(),
                );
                let result = collect_compute(&compute, project, &tags, aggregator).await;
                report_api_up(aggregator, "nova.api.up", &tags, result);
            }
            None => warn!("No compute endpoint in the catalog of project {}", project.id),
        }

        match find_endpoint(&auth.catalog, "network", interface, region) {
            Some(endpoint) => {
                let network = NetworkRest::new(http.clone(), &endpoint, &auth.token);
                let result = collect_network(&network, project, &tags, aggregator).await;
                report_api_up(aggregator, "neutron.api.up", &tags, result);
            }
            None => debug!("No network endpoint in the catalog of project {}", project.id),
        }
    }
}

fn report_api_up(aggregator: &mut Aggregator, name: &str, tags: &[String], result: CheckResult<()>) {
    match result {
        Ok(()) => aggregator.service_check(name, ServiceCheckStatus::Ok, tags, None),
        Err(e) => {
            error!("Exception while reporting {}: {}", name, e);
            aggregator.service_check(name, ServiceCheckStatus::Critical, tags, Some(e.to_string()));
        }
    }
}

fn with_tags(base: &[String], extra: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut tags = base.to_vec();
    tags.extend(extra);
    tags
}

async fn collect_compute(
    compute: &ComputeRest,
    project: &Project,
    tags: &[String],
    aggregator: &mut Aggregator,
) -> CheckResult<()> {
    let response_time = compute.get_response_time().await?;
    aggregator.gauge("nova.response_time", response_time, tags);

    for (name, value) in compute.get_limits(&project.id).await? {
        aggregator.gauge(&format!("nova.limits.{}", name), value, tags);
    }

    let quota_set = compute.get_quota_set(&project.id).await?;
    let quota_tags = with_tags(tags, [tag("quota_id", &quota_set.id)]);
    for (name, value) in &quota_set.metrics {
        aggregator.gauge(&format!("nova.quota_set.{}", name), *value, &quota_tags);
    }

    for service in compute.get_services().await? {
        let mut service_tags = with_tags(tags, [tag("service_name", &service.binary)]);
        service_tags.extend(service.service_id.as_ref().map(|v| tag("service_id", v)));
        service_tags.extend(service.host.as_ref().map(|v| tag("service_host", v)));
        service_tags.extend(service.status.as_ref().map(|v| tag("service_status", v)));
        service_tags.extend(service.state.as_ref().map(|v| tag("service_state", v)));
        aggregator.gauge("nova.service.up", if service.is_up { 1.0 } else { 0.0 }, &service_tags);
    }

    for (id, server) in compute.get_servers(&project.id).await? {
        let mut server_tags = with_tags(
            tags,
            [
                tag("server_id", &id),
                tag("server_name", &server.name),
                tag("server_status", &server.status),
            ],
        );
        server_tags.extend(server.hypervisor_hostname.as_ref().map(|v| tag("hypervisor", v)));
        server_tags.extend(server.flavor_name.as_ref().map(|v| tag("flavor_name", v)));
        for (name, value) in &server.metrics {
            aggregator.gauge(&format!("nova.server.{}", name), *value, &server_tags);
        }
    }

    for (id, flavor) in compute.get_flavors().await? {
        let flavor_tags = with_tags(tags, [tag("flavor_id", &id), tag("flavor_name", &flavor.name)]);
        for (name, value) in &flavor.metrics {
            aggregator.gauge(&format!("nova.flavor.{}", name), *value, &flavor_tags);
        }
    }

    let aggregates = compute.get_os_aggregates().await?;
    for (id, hypervisor) in compute.get_hypervisors().await? {
        let mut hypervisor_tags = with_tags(
            tags,
            [
                tag("hypervisor_id", &id),
                tag("hypervisor", &hypervisor.name),
                tag("hypervisor_type", &hypervisor.hypervisor_type),
                tag("status", &hypervisor.status),
            ],
        );
        hypervisor_tags.extend(hypervisor.state.as_ref().map(|v| tag("state", v)));
        for aggregate in aggregates.values().filter(|a| a.hosts.contains(&hypervisor.name)) {
            hypervisor_tags.push(tag("aggregate", &aggregate.name));
            hypervisor_tags.extend(aggregate.availability_zone.as_ref().map(|v| tag("availability_zone", v)));
        }

        let up = hypervisor.state.as_deref() == Some("up");
        aggregator.gauge("nova.hypervisor.up", if up { 1.0 } else { 0.0 }, &hypervisor_tags);
        for (name, value) in &hypervisor.metrics {
            aggregator.gauge(&format!("nova.hypervisor.{}", name), *value, &hypervisor_tags);
        }
    }
    Ok(())
}

async fn collect_network(
    network: &NetworkRest,
    project: &Project,
    tags: &[String],
    aggregator: &mut Aggregator,
) -> CheckResult<()> {
    let response_time = network.get_response_time().await?;
    aggregator.gauge("neutron.response_time", response_time, tags);

    for (name, value) in network.get_quotas(&project.id).await? {
        aggregator.gauge(&format!("neutron.quotas.{}", name), value, tags);
    }
    Ok(())
}

#[async_trait]
impl Check for OpenstackControllerCheck {
    fn name(&self) -> &str {
        CHECK_NAME
    }

    fn namespace(&self) -> &str {
        NAMESPACE
    }

    fn instance_label(&self) -> String {
        self.config.keystone_server_url.clone()
    }

    async fn check(&mut self, aggregator: &mut Aggregator) -> CheckResult<()> {
        let http = HttpClient::new(&self.config.http)?;
        let keystone = KeystoneRest::new(http.clone(), &self.config.keystone_server_url);
        let tags = self.base_tags();

        let (token, projects) = match self.authorize(&keystone).await {
            Ok(auth) => auth,
            Err(e) => {
                error!("Exception while authorizing against {}: {}", keystone.endpoint(), e);
                aggregator.service_check(
                    "keystone.api.up",
                    ServiceCheckStatus::Critical,
                    &tags,
                    Some(e.to_string()),
                );
                aggregator.gauge("controller", 0.0, &tags);
                return Err(e);
            }
        };
        aggregator.service_check("keystone.api.up", ServiceCheckStatus::Ok, &tags, None);
        aggregator.gauge("controller", 1.0, &tags);

        for project in &projects {
            match keystone.authorize_project(&token, &project.id).await {
                Ok(auth) => self.collect_project(&http, &auth, project, aggregator).await,
                Err(e) => error!("Could not authorize project {}: {}", project.id, e),
            }
        }
        Ok(())
    }
}
