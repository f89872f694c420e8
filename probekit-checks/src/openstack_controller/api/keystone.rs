//! Keystone (identity v3) client: password auth, project listing, catalog

use super::{array_at, id_string, object_at, str_field};
use probekit_base::http::join_url;
use probekit_base::{CheckError, CheckResult, HttpClient};
use serde_json::{json, Value};
use tracing::debug;

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub url: String,
    pub interface: String,
    pub region_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub service_type: String,
    pub name: String,
    pub endpoints: Vec<Endpoint>,
}

/// Token scoped to one project, with the service catalog it unlocks
#[derive(Debug, Clone)]
pub struct ProjectAuth {
    pub token: String,
    pub catalog: Vec<CatalogEntry>,
}

/// URL of the `service_type` endpoint matching interface and (optional) region
pub fn find_endpoint(
    catalog: &[CatalogEntry],
    service_type: &str,
    interface: &str,
    region_id: Option<&str>,
) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == service_type)
        .flat_map(|entry| entry.endpoints.iter())
        .find(|endpoint| {
            endpoint.interface == interface
                && region_id.map_or(true, |region| endpoint.region_id.as_deref() == Some(region))
        })
        .map(|endpoint| endpoint.url.clone())
}

fn parse_catalog(url: &str, response: &Value) -> CheckResult<Vec<CatalogEntry>> {
    let mut catalog = Vec::new();
    for entry in array_at(url, response, "/token/catalog")? {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let endpoints = entry
            .get("endpoints")
            .and_then(Value::as_array)
            .map(|endpoints| {
                endpoints
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|e| {
                        Some(Endpoint {
                            url: str_field(e, "url")?,
                            interface: str_field(e, "interface")?,
                            region_id: str_field(e, "region_id"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        catalog.push(CatalogEntry {
            service_type: str_field(entry, "type").unwrap_or_default(),
            name: str_field(entry, "name").unwrap_or_default(),
            endpoints,
        });
    }
    Ok(catalog)
}

pub struct KeystoneRest {
    http: HttpClient,
    endpoint: String,
}

impl KeystoneRest {
    pub fn new(http: HttpClient, endpoint: &str) -> Self {
        debug!("keystone endpoint: {}", endpoint);
        Self {
            http,
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_auth(&self, body: &Value) -> CheckResult<(String, Value)> {
        let url = join_url(&self.endpoint, "v3/auth/tokens");
        let (response, headers) = self.http.post_json(&url, body, &[]).await?;
        let token = headers
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CheckError::Auth(format!("no {} header from {}", SUBJECT_TOKEN_HEADER, url)))?;
        Ok((token.to_string(), response))
    }

    /// Unscoped password authentication; returns the token
    pub async fn authorize_user(&self, username: &str, password: &str, domain_id: &str) -> CheckResult<String> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": username,
                            "domain": {"id": domain_id},
                            "password": password,
                        }
                    }
                }
            }
        });
        let (token, _) = self.post_auth(&body).await?;
        Ok(token)
    }

    /// Projects the token's user can scope to
    pub async fn get_auth_projects(&self, token: &str) -> CheckResult<Vec<Project>> {
        let url = join_url(&self.endpoint, "v3/auth/projects");
        let response = self.http.get_json(&url, &[("X-Auth-Token", token)]).await?;
        let projects = array_at(&url, &response, "/projects")?
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|p| {
                Some(Project {
                    id: p.get("id").and_then(id_string)?,
                    name: str_field(p, "name").unwrap_or_default(),
                })
            })
            .collect();
        Ok(projects)
    }

    /// Re-scope `token` to `project_id`
    pub async fn authorize_project(&self, token: &str, project_id: &str) -> CheckResult<ProjectAuth> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["token"],
                    "token": {"id": token}
                },
                "scope": {"project": {"id": project_id}}
            }
        });
        let (token, response) = self.post_auth(&body).await?;
        let url = join_url(&self.endpoint, "v3/auth/tokens");
        object_at(&url, &response, "/token")?;
        let catalog = parse_catalog(&url, &response)?;
        Ok(ProjectAuth { token, catalog })
    }
}
