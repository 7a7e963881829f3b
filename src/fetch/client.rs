//! Default HTTP transport built on reqwest
//!
//! This module handles:
//! - Building the HTTP client with the configured user agent and timeouts
//! - Bounded redirect following
//! - Body size limits
//! - Error classification into [`FetchError`]

use crate::config::HttpConfig;
use crate::fetch::{FetchError, FetchRequest, HttpFetcher, HttpResponse};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{redirect::Policy, Client, RequestBuilder};
use std::collections::BTreeMap;
use std::time::Instant;

/// [`HttpFetcher`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl ReqwestFetcher {
    /// Builds a fetcher from the HTTP configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use site_audit::config::HttpConfig;
    /// use site_audit::fetch::ReqwestFetcher;
    ///
    /// let fetcher = ReqwestFetcher::new(&HttpConfig::default()).unwrap();
    /// ```
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn send(
        &self,
        url: &str,
        builder: RequestBuilder,
        request: &FetchRequest,
    ) -> Result<HttpResponse, FetchError> {
        let mut builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let started = Instant::now();
        let mut response = builder.send().await.map_err(|e| classify_error(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = collect_headers(response.headers());

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| classify_error(url, e))?
        {
            let remaining = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                tracing::debug!(
                    "Body of {} truncated at {} bytes",
                    final_url,
                    self.max_body_bytes
                );
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            final_url,
            headers,
            body,
            elapsed: started.elapsed(),
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, request: &FetchRequest) -> Result<HttpResponse, FetchError> {
        tracing::debug!("GET {}", url);
        self.send(url, self.client.get(url), request).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        request: &FetchRequest,
    ) -> Result<HttpResponse, FetchError> {
        tracing::debug!("POST {}", url);
        self.send(url, self.client.post(url).json(body), request)
            .await
    }
}

/// Builds an HTTP client with the configured identity and limits
///
/// Redirects are followed automatically up to `max_redirects` hops; exceeding
/// the limit (or looping) surfaces as [`FetchError::RedirectLimit`].
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a reqwest error onto the transport error taxonomy
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if error.is_timeout() {
        FetchError::Timeout { url }
    } else if error.is_redirect() {
        FetchError::RedirectLimit { url }
    } else if error.is_connect() {
        FetchError::Connect {
            url,
            message: error.to_string(),
        }
    } else {
        FetchError::Transport {
            url,
            message: error.to_string(),
        }
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        collected
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> HttpConfig {
        HttpConfig {
            user_agent: "TestAudit/1.0".to_string(),
            max_redirects: 2,
            max_body_bytes: 2048,
            ..HttpConfig::default()
        }
    }

    fn request() -> FetchRequest {
        FetchRequest::new(Duration::from_secs(5))
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&test_config()).is_ok());
    }

    #[tokio::test]
    async fn test_get_returns_status_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header("user-agent", "TestAudit/1.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .insert_header("server", "nginx")
                    .set_body_string("<title>Hi</title>"),
            )
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new(&test_config()).unwrap();
        let resp = fetcher
            .get(&format!("{}/", server.uri()), &request())
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("server"), Some("nginx"));
        assert_eq!(resp.text(), "<title>Hi</title>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new(&test_config()).unwrap();
        let resp = fetcher
            .get(&format!("{}/missing", server.uri()), &request())
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert!(!resp.is_success());
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/c"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/d"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new(&test_config()).unwrap();
        let err = fetcher
            .get(&format!("{}/a", server.uri()), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RedirectLimit { .. }));
    }

    #[tokio::test]
    async fn test_redirect_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new(&test_config()).unwrap();
        let resp = fetcher
            .get(&format!("{}/old", server.uri()), &request())
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.final_url.ends_with("/new"));
    }

    #[tokio::test]
    async fn test_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(10_000)))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new(&test_config()).unwrap();
        let resp = fetcher
            .get(&format!("{}/big", server.uri()), &request())
            .await
            .unwrap();
        assert_eq!(resp.body.len(), 2048);
    }

    #[tokio::test]
    async fn test_post_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/lookup"))
            .and(body_json(serde_json::json!({"q": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let fetcher = ReqwestFetcher::new(&test_config()).unwrap();
        let resp = fetcher
            .post_json(
                &format!("{}/lookup", server.uri()),
                &serde_json::json!({"q": 1}),
                &request(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let fetcher = ReqwestFetcher::new(&test_config()).unwrap();
        let err = fetcher
            .get("http://127.0.0.1:1/", &request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Connect { .. } | FetchError::Transport { .. }
        ));
    }
}
