//! Async HTTP client shared by checks
//!
//! Wraps `reqwest::Client` with the instance-level options (timeout, TLS
//! verification, basic auth, extra headers) and turns non-2xx responses into
//! [`CheckError::Status`].

use crate::error::{CheckError, CheckResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

fn default_timeout() -> f64 {
    10.0
}

fn default_tls_verify() -> bool {
    true
}

/// HTTP options accepted by every instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            tls_verify: default_tls_verify(),
            username: None,
            password: None,
            headers: BTreeMap::new(),
        }
    }
}

/// HTTP client configured for one instance
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    basic_auth: Option<(String, Option<String>)>,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> CheckResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CheckError::Config(format!("invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CheckError::Config(format!("invalid header value for {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let timeout = Duration::try_from_secs_f64(config.timeout)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| {
                CheckError::Config(format!("timeout must be a positive number of seconds, got {}", config.timeout))
            })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .default_headers(headers)
            .user_agent(concat!("probekit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckError::Config(format!("cannot build HTTP client: {}", e)))?;

        let basic_auth = config
            .username
            .clone()
            .map(|user| (user, config.password.clone()));

        Ok(Self { client, basic_auth })
    }

    /// Use basic auth for every request
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), Some(password.into())));
        self
    }

    fn request(&self, method: reqwest::Method, url: &str, headers: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some((user, pass)) = &self.basic_auth {
            builder = builder.basic_auth(user, pass.as_ref());
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder
    }

    async fn send(&self, url: &str, builder: reqwest::RequestBuilder) -> CheckResult<reqwest::Response> {
        let response = builder.send().await.map_err(|source| CheckError::Http {
            url: url.to_string(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(CheckError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    async fn read_json(url: &str, response: reqwest::Response) -> CheckResult<Value> {
        let body = response.text().await.map_err(|source| CheckError::Http {
            url: url.to_string(),
            source,
        })?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| CheckError::payload(url, format!("invalid JSON: {}", e)))?;
        debug!("response from {}: {}", url, value);
        Ok(value)
    }

    /// GET a JSON document
    pub async fn get_json(&self, url: &str, headers: &[(&str, &str)]) -> CheckResult<Value> {
        let (value, _) = self.get_json_timed(url, headers).await?;
        Ok(value)
    }

    /// GET a JSON document and report how long the request took
    pub async fn get_json_timed(&self, url: &str, headers: &[(&str, &str)]) -> CheckResult<(Value, Duration)> {
        let started = Instant::now();
        let response = self.send(url, self.request(reqwest::Method::GET, url, headers)).await?;
        let elapsed = started.elapsed();
        let value = Self::read_json(url, response).await?;
        Ok((value, elapsed))
    }

    /// GET a text document
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> CheckResult<String> {
        let response = self.send(url, self.request(reqwest::Method::GET, url, headers)).await?;
        response.text().await.map_err(|source| CheckError::Http {
            url: url.to_string(),
            source,
        })
    }

    /// GET without failing on the status: returns `(status, body)`
    pub async fn get_status(&self, url: &str, headers: &[(&str, &str)]) -> CheckResult<(u16, String)> {
        let response = self
            .request(reqwest::Method::GET, url, headers)
            .send()
            .await
            .map_err(|source| CheckError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|source| CheckError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok((status, body))
    }

    /// POST a JSON body; returns the JSON answer and the response headers
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: &[(&str, &str)],
    ) -> CheckResult<(Value, HeaderMap)> {
        let builder = self.request(reqwest::Method::POST, url, headers).json(body);
        let response = self.send(url, builder).await?;
        let response_headers = response.headers().clone();
        let value = Self::read_json(url, response).await?;
        Ok((value, response_headers))
    }
}

/// Join `path` onto `base` with exactly one `/` between them
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Append URL-encoded query parameters to `url`
pub fn with_query(url: &str, params: &[(&str, &str)]) -> CheckResult<String> {
    let mut parsed =
        Url::parse(url).map_err(|e| CheckError::Config(format!("invalid URL {}: {}", url, e)))?;
    if !params.is_empty() {
        parsed.query_pairs_mut().extend_pairs(params);
    }
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://h/api/v48/", "/clusters"), "http://h/api/v48/clusters");
        assert_eq!(join_url("http://h", "limits"), "http://h/limits");
    }

    #[test]
    fn test_with_query_encodes() {
        let url = with_query("http://h/timeseries", &[("query", "SELECT last(a) WHERE x=\"y\"")]).unwrap();
        assert!(url.starts_with("http://h/timeseries?query=SELECT+last%28a%29"));
        assert!(with_query("not a url", &[]).is_err());
    }

    #[test]
    fn test_invalid_config() {
        let config = HttpConfig {
            timeout: 0.0,
            ..HttpConfig::default()
        };
        assert!(matches!(HttpClient::new(&config), Err(CheckError::Config(_))));

        let mut config = HttpConfig::default();
        config.headers.insert("bad header".into(), "v".into());
        assert!(matches!(HttpClient::new(&config), Err(CheckError::Config(_))));
    }

    #[test]
    fn test_unrepresentable_timeout_is_config_error() {
        for raw in ["timeout: .inf", "timeout: .nan", "timeout: -1", "timeout: 1.0e300"] {
            let config: HttpConfig = serde_yaml::from_str(raw).unwrap();
            assert!(
                matches!(HttpClient::new(&config), Err(CheckError::Config(_))),
                "{}",
                raw
            );
        }
        let config: HttpConfig = serde_yaml::from_str("timeout: 2.5").unwrap();
        assert!(HttpClient::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_get_json_and_status_errors() {
        let mut server = Server::new_async().await;
        let ok = server
            .mock("GET", "/ok")
            .match_header("x-auth-token", "t0k")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"version": "7.4.4"}"#)
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let value = client
            .get_json(&join_url(&server.url(), "ok"), &[("X-Auth-Token", "t0k")])
            .await
            .unwrap();
        assert_eq!(value["version"], "7.4.4");

        let err = client.get_json(&join_url(&server.url(), "missing"), &[]).await.unwrap_err();
        assert!(matches!(err, CheckError::Status { status: 404, .. }));

        let (status, _) = client.get_status(&join_url(&server.url(), "missing"), &[]).await.unwrap();
        assert_eq!(status, 404);

        ok.assert_async().await;
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn test_basic_auth_and_post() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/auth/tokens")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .match_body(mockito::Matcher::PartialJson(json!({"auth": {"methods": ["password"]}})))
            .with_status(201)
            .with_header("X-Subject-Token", "abc")
            .with_body(r#"{"token": {}}"#)
            .create_async()
            .await;

        let client = HttpClient::new(&HttpConfig::default())
            .unwrap()
            .with_basic_auth("user", "pass");
        let (body, headers) = client
            .post_json(
                &join_url(&server.url(), "/v3/auth/tokens"),
                &json!({"auth": {"methods": ["password"]}}),
                &[],
            )
            .await
            .unwrap();

        assert!(body["token"].is_object());
        assert_eq!(headers.get("x-subject-token").unwrap(), "abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_json_is_payload_error() {
        let mut server = Server::new_async().await;
        let _m = server.mock("GET", "/text").with_body("not json").create_async().await;

        let client = HttpClient::new(&HttpConfig::default()).unwrap();
        let err = client.get_json(&join_url(&server.url(), "text"), &[]).await.unwrap_err();
        assert!(matches!(err, CheckError::Payload { .. }));
    }
}
