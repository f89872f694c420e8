/*!
Mock vendor API for check tests

A mockito server that serves JSON fixtures. Paths may carry a query string
(`/limits?tenant_id=p1`): the path part must match exactly, each query pair
must be present.

Mocks are removed when the returned `Mock` is dropped, keep them alive for
the duration of the test.
*/

use crate::fixtures::FixtureLoader;
use anyhow::Result;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::Value;

pub struct MockApi {
    server: ServerGuard,
    fixtures: FixtureLoader,
}

/// Path matcher tolerant to how the server splits path and query
fn path_matcher(path: &str) -> Matcher {
    Matcher::Regex(format!("^{}(\\?.*)?$", regex::escape(path)))
}

fn query_matcher(query: &str) -> Matcher {
    let pairs: Vec<Matcher> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Matcher::UrlEncoded(key.to_string(), value.to_string())
        })
        .collect();
    Matcher::AllOf(pairs)
}

impl MockApi {
    pub async fn start(fixtures: FixtureLoader) -> Self {
        Self {
            server: Server::new_async().await,
            fixtures,
        }
    }

    /// Base URL of the mock server (no trailing slash)
    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn fixtures(&self) -> &FixtureLoader {
        &self.fixtures
    }

    /// Direct access for mocks that need custom matchers
    pub fn server(&mut self) -> &mut ServerGuard {
        &mut self.server
    }

    fn route(&mut self, method: &str, path_and_query: &str) -> Mock {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };
        let mock = self.server.mock(method, path_matcher(path));
        match query {
            Some(query) => mock.match_query(query_matcher(query)),
            None => mock,
        }
    }

    /// Serve `body` as JSON
    pub async fn json(&mut self, method: &str, path: &str, body: &Value) -> Mock {
        self.route(method, path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Serve a fixture file as JSON
    pub async fn fixture(&mut self, method: &str, path: &str, fixture: &str) -> Result<Mock> {
        let body = self.fixtures.read(fixture)?;
        Ok(self
            .route(method, path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await)
    }

    /// Serve a plain-text body
    pub async fn text(&mut self, method: &str, path: &str, body: &str) -> Mock {
        self.route(method, path)
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body(body)
            .create_async()
            .await
    }

    /// Answer with a bare status code
    pub async fn status(&mut self, method: &str, path: &str, status: usize) -> Mock {
        self.route(method, path).with_status(status).create_async().await
    }
}
