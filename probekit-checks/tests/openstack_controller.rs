use mockito::{Matcher, Mock};
use probekit_base::{run_check, HttpConfig, ServiceCheckStatus};
use probekit_checks::openstack_controller::{OpenstackConfig, OpenstackControllerCheck};
use probekit_devkit::{AggregatorStub, FixtureLoader, MockApi};
use serde_json::json;

const PROJECT_ID: &str = "1e6e233e637d4d55a50a62b63398ad15";

fn config(api: &MockApi) -> OpenstackConfig {
    OpenstackConfig {
        keystone_server_url: format!("{}/identity", api.url()),
        username: "admin".to_string(),
        password: "password".to_string(),
        domain_id: "default".to_string(),
        nova_microversion: None,
        endpoint_interface: "public".to_string(),
        endpoint_region_id: None,
        tags: vec!["env:test".to_string()],
        http: HttpConfig::default(),
    }
}

async fn mock_keystone(api: &mut MockApi) -> Vec<Mock> {
    let unscoped = api.fixtures().read("openstack_controller/keystone/unscoped.json").unwrap();
    let project = api
        .fixtures()
        .read("openstack_controller/keystone/project.json")
        .unwrap()
        .replace("{base_url}", &api.url());

    let projects = api.fixtures().read("openstack_controller/keystone/projects.json").unwrap();

    let mut mocks = Vec::new();
    mocks.push(
        api.server()
            .mock("POST", "/identity/v3/auth/tokens")
            .match_body(Matcher::PartialJson(json!({
                "auth": {"identity": {"methods": ["password"], "password": {"user": {"name": "admin"}}}}
            })))
            .with_status(201)
            .with_header("X-Subject-Token", "token_unscoped")
            .with_body(unscoped)
            .create_async()
            .await,
    );
    mocks.push(
        api.server()
            .mock("POST", "/identity/v3/auth/tokens")
            .match_body(Matcher::PartialJson(json!({
                "auth": {"scope": {"project": {"id": PROJECT_ID}}}
            })))
            .with_status(201)
            .with_header("X-Subject-Token", "token_project")
            .with_body(project)
            .create_async()
            .await,
    );
    mocks.push(
        api.server()
            .mock("GET", "/identity/v3/auth/projects")
            .match_header("X-Auth-Token", "token_unscoped")
            .with_body(projects)
            .create_async()
            .await,
    );
    mocks
}

/// Compute and network endpoints; `failing` answers HTTP 500 instead
async fn mock_services(api: &mut MockApi, failing: Option<&str>) -> Vec<Mock> {
    let limits = format!("/compute/v2.1/limits?tenant_id={}", PROJECT_ID);
    let quota_set = format!("/compute/v2.1/os-quota-sets/{}", PROJECT_ID);
    let servers = format!("/compute/v2.1/servers/detail?project_id={}", PROJECT_ID);
    let quotas = format!("/networking/v2.0/quotas/{}", PROJECT_ID);
    let routes: Vec<(&str, &str)> = vec![
        ("/compute/v2.1", "compute/root.json"),
        (limits.as_str(), "compute/limits.json"),
        (quota_set.as_str(), "compute/quota_set.json"),
        ("/compute/v2.1/os-services", "compute/services.json"),
        (servers.as_str(), "compute/servers.json"),
        ("/compute/v2.1/servers/server-1/diagnostics", "compute/diagnostics.json"),
        ("/compute/v2.1/flavors/c1", "compute/flavor.json"),
        ("/compute/v2.1/flavors/detail", "compute/flavors.json"),
        ("/compute/v2.1/os-aggregates", "compute/aggregates.json"),
        ("/compute/v2.1/os-hypervisors/detail?with_servers=true", "compute/hypervisors.json"),
        ("/compute/v2.1/os-hypervisors/2/uptime", "compute/uptime.json"),
        ("/networking", "network/root.json"),
        (quotas.as_str(), "network/quotas.json"),
    ];

    let mut mocks = Vec::new();
    for (path, fixture) in routes {
        let mock = if failing == Some(path) {
            api.status("GET", path, 500).await
        } else {
            api.fixture("GET", path, &format!("openstack_controller/{}", fixture))
                .await
                .unwrap()
        };
        mocks.push(mock);
    }
    // bare metal servers have no diagnostics
    mocks.push(api.status("GET", "/compute/v2.1/servers/server-2/diagnostics", 404).await);
    mocks
}

fn with(base: &[String], extra: &[&str]) -> Vec<String> {
    base.iter()
        .cloned()
        .chain(extra.iter().map(|t| t.to_string()))
        .collect()
}

fn refs(tags: &[String]) -> Vec<&str> {
    tags.iter().map(String::as_str).collect()
}

#[tokio::test]
async fn test_collects_keystone_nova_and_neutron() {
    let mut api = mock_api().await;
    let _keystone = mock_keystone(&mut api).await;
    let _services = mock_services(&mut api, None).await;

    let mut check = OpenstackControllerCheck::new(config(&api));
    let aggregator = AggregatorStub::new(run_check(&mut check).await);
    assert_eq!(aggregator.submission().error, None);

    let keystone_tag = format!("keystone_server:{}/identity", api.url());
    let base = vec!["env:test".to_string(), keystone_tag];
    let project_tag = format!("project_id:{}", PROJECT_ID);
    let project = with(&base, &[project_tag.as_str(), "project_name:admin"]);

    aggregator.assert_metric("openstack.controller", Some(1.0), &refs(&base));
    aggregator.assert_service_check("openstack.keystone.api.up", ServiceCheckStatus::Ok, &refs(&base));
    aggregator.assert_service_check("openstack.nova.api.up", ServiceCheckStatus::Ok, &refs(&project));
    aggregator.assert_service_check("openstack.neutron.api.up", ServiceCheckStatus::Ok, &refs(&project));

    aggregator.assert_metric("openstack.nova.response_time", None, &refs(&project));
    aggregator.assert_metric("openstack.neutron.response_time", None, &refs(&project));

    for (name, value) in [
        ("max_image_meta", 128.0),
        ("max_total_cores", 20.0),
        ("max_total_ram_size", 51200.0),
        ("total_cores_used", 1.0),
        ("total_ram_used", 2048.0),
    ] {
        aggregator.assert_metric(&format!("openstack.nova.limits.{}", name), Some(value), &refs(&project));
    }

    let quota_tag = format!("quota_id:{}", PROJECT_ID);
    let quota = with(&project, &[quota_tag.as_str()]);
    for (name, value) in [("cores", 20.0), ("instances", 10.0), ("key_pairs", 100.0), ("ram", 51200.0)] {
        aggregator.assert_metric(&format!("openstack.nova.quota_set.{}", name), Some(value), &refs(&quota));
    }

    let scheduler = with(
        &project,
        &[
            "service_name:nova_scheduler",
            "service_id:1",
            "service_host:controller",
            "service_status:enabled",
            "service_state:up",
        ],
    );
    let compute = with(
        &project,
        &[
            "service_name:nova_compute",
            "service_id:2",
            "service_host:compute1",
            "service_status:enabled",
            "service_state:down",
        ],
    );
    aggregator.assert_metric("openstack.nova.service.up", Some(1.0), &refs(&scheduler));
    aggregator.assert_metric("openstack.nova.service.up", Some(0.0), &refs(&compute));

    let web = with(
        &project,
        &[
            "server_id:server-1",
            "server_name:web-1",
            "server_status:active",
            "hypervisor:host1",
            "flavor_name:m1.small",
        ],
    );
    for (name, value) in [
        ("flavor.vcpus", 1.0),
        ("flavor.ram", 2048.0),
        ("flavor.disk", 20.0),
        ("flavor.os_flv_ext_data:ephemeral", 0.0),
        ("flavor.swap", 0.0),
        ("flavor.rxtx_factor", 1.0),
        ("cpu_details.id", 0.0),
        ("cpu_details.time", 17300000000.0),
        ("cpu_details.utilisation", 15.0),
        ("disk_details.errors_count", 1.0),
        ("disk_details.read_bytes", 262144.0),
        ("disk_details.read_requests", 112.0),
        ("disk_details.write_bytes", 5778432.0),
        ("disk_details.write_requests", 488.0),
        ("memory", 512.0),
        ("memory_actual", 512.0),
        ("num_cpus", 1.0),
        ("uptime", 46664.0),
    ] {
        aggregator.assert_metric(&format!("openstack.nova.server.{}", name), Some(value), &refs(&web));
    }

    let db = with(
        &project,
        &[
            "server_id:server-2",
            "server_name:db-1",
            "server_status:shutoff",
            "hypervisor:host1",
            "flavor_name:m1.tiny",
        ],
    );
    for (name, value) in [
        ("flavor.vcpus", 1.0),
        ("flavor.ram", 512.0),
        ("flavor.disk", 1.0),
        ("flavor.ephemeral", 0.0),
        ("flavor.swap", 0.0),
    ] {
        aggregator.assert_metric(&format!("openstack.nova.server.{}", name), Some(value), &refs(&db));
    }

    let flavor = with(&project, &["flavor_id:c1", "flavor_name:m1.small"]);
    for (name, value) in [
        ("disk", 20.0),
        ("os_flv_ext_data:ephemeral", 0.0),
        ("ram", 2048.0),
        ("rxtx_factor", 1.0),
        ("vcpus", 1.0),
    ] {
        aggregator.assert_metric(&format!("openstack.nova.flavor.{}", name), Some(value), &refs(&flavor));
    }

    let hypervisor = with(
        &project,
        &[
            "hypervisor_id:2",
            "hypervisor:host1",
            "hypervisor_type:QEMU",
            "status:enabled",
            "state:up",
            "aggregate:my-aggregate",
            "availability_zone:london",
        ],
    );
    for (name, value) in [
        ("up", 1.0),
        ("id", 2.0),
        ("current_workload", 0.0),
        ("memory_mb", 8192.0),
        ("memory_mb_used", 512.0),
        ("running_vms", 1.0),
        ("vcpus", 2.0),
        ("vcpus_used", 1.0),
        ("load_1", 0.20),
        ("load_5", 0.12),
        ("load_15", 0.09),
    ] {
        aggregator.assert_metric(&format!("openstack.nova.hypervisor.{}", name), Some(value), &refs(&hypervisor));
    }

    for (name, value) in [
        ("floatingip", 50.0),
        ("network", 100.0),
        ("port", 500.0),
        ("rbac_policy", 10.0),
        ("router", 10.0),
        ("security_group", 10.0),
        ("security_group_rule", 100.0),
        ("subnet", 100.0),
        ("subnetpool", -1.0),
    ] {
        aggregator.assert_metric(&format!("openstack.neutron.quotas.{}", name), Some(value), &refs(&project));
    }

    aggregator.assert_all_metrics_covered();
}

#[tokio::test]
async fn test_keystone_auth_failure() {
    let mut api = mock_api().await;
    let _auth = api.status("POST", "/identity/v3/auth/tokens", 401).await;

    let mut check = OpenstackControllerCheck::new(config(&api));
    let aggregator = AggregatorStub::new(run_check(&mut check).await);

    let keystone_tag = format!("keystone_server:{}/identity", api.url());
    let base = ["env:test", keystone_tag.as_str()];
    assert!(aggregator.submission().error.as_deref().unwrap().contains("401"));
    aggregator.assert_service_check("openstack.keystone.api.up", ServiceCheckStatus::Critical, &base);
    aggregator.assert_metric("openstack.controller", Some(0.0), &base);
    aggregator.assert_all_metrics_covered();
}

#[tokio::test]
async fn test_compute_failure_keeps_network_metrics() {
    let mut api = mock_api().await;
    let _keystone = mock_keystone(&mut api).await;
    let _services = mock_services(&mut api, Some("/compute/v2.1/os-services")).await;

    let mut check = OpenstackControllerCheck::new(config(&api));
    let aggregator = AggregatorStub::new(run_check(&mut check).await);

    let keystone_tag = format!("keystone_server:{}/identity", api.url());
    let project_tag = format!("project_id:{}", PROJECT_ID);
    let project = ["env:test", keystone_tag.as_str(), project_tag.as_str(), "project_name:admin"];

    aggregator.assert_service_check("openstack.nova.api.up", ServiceCheckStatus::Critical, &project);
    aggregator.assert_service_check("openstack.neutron.api.up", ServiceCheckStatus::Ok, &project);
    // collected before the failing request
    aggregator.assert_metric_count("openstack.nova.limits.max_total_cores", 1);
    aggregator.assert_no_metric("openstack.nova.service.up");
    aggregator.assert_no_metric("openstack.nova.hypervisor.up");
    aggregator.assert_metric("openstack.neutron.quotas.port", Some(500.0), &project);
}

#[tokio::test]
async fn test_nova_microversion_header() {
    let mut api = mock_api().await;
    let _keystone = mock_keystone(&mut api).await;
    let body = api.fixtures().read("openstack_controller/compute/root.json").unwrap();
    let root = api
        .server()
        .mock("GET", "/compute/v2.1")
        .match_header("X-OpenStack-Nova-API-Version", "2.93")
        .match_header("X-Auth-Token", "token_project")
        .with_body(body)
        .expect(1)
        .create_async()
        .await;

    let mut config = config(&api);
    config.nova_microversion = Some("2.93".to_string());
    let mut check = OpenstackControllerCheck::new(config);
    let aggregator = AggregatorStub::new(run_check(&mut check).await);

    root.assert_async().await;
    aggregator.assert_metric_count("openstack.nova.response_time", 1);
}

async fn mock_api() -> MockApi {
    MockApi::start(FixtureLoader::for_crate(env!("CARGO_MANIFEST_DIR"))).await
}
