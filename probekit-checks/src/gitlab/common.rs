use probekit_base::http::{join_url, with_query};
use probekit_base::HttpClient;
use serde_json::Value;
use tracing::{debug, warn};

/// GitLab version as reported by `/api/v4/version`.
///
/// The endpoint needs an API token: without one no request is made.
/// Failures are logged and yield `None`.
pub async fn get_gitlab_version(http: &HttpClient, url: &str, api_token: Option<&str>) -> Option<String> {
    let token = match api_token {
        Some(token) if !token.is_empty() => token,
        _ => {
            debug!("No API token configured, skipping GitLab version collection");
            return None;
        }
    };

    let endpoint = join_url(url, "api/v4/version");
    let result = match with_query(&endpoint, &[("access_token", token)]) {
        Ok(versioned) => http.get_json(&versioned, &[]).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => {
            let version = response.get("version").and_then(Value::as_str).map(str::to_string);
            debug!("GitLab version: {:?}", version);
            version
        }
        Err(e) => {
            warn!("GitLab version could not be retrieved from {}: {}", endpoint, e);
            None
        }
    }
}
