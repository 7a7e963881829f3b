//! HTTP transport boundary
//!
//! The analyzer never talks to `reqwest` directly. Everything that leaves the
//! process (the page fetch and every provider call) goes through the
//! [`HttpFetcher`] trait, so hosts can plug in their own transport and tests
//! can point providers at mock servers.

mod client;

pub use client::ReqwestFetcher;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failures
///
/// A non-2xx response is not a transport failure; it comes back as an
/// [`HttpResponse`] and callers decide what the status means to them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Empty response body from {url}")]
    EmptyBody { url: String },

    #[error("Invalid response body from {url}: {message}")]
    InvalidBody { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

/// Per-request options
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Total time allowed for the request, including the body
    pub timeout: Duration,

    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A received HTTP response
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// URL after redirects
    pub final_url: String,

    /// Response headers, names lowercased; repeated headers are joined with ", "
    pub headers: BTreeMap<String, String>,

    /// Raw body bytes (possibly truncated to the configured maximum)
    pub body: Vec<u8>,

    /// Time from sending the request until the body was read
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decodes the body as text, replacing invalid UTF-8 sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::InvalidBody {
            url: self.final_url.clone(),
            message: e.to_string(),
        })
    }

    /// Converts a non-2xx response into a [`FetchError::Status`]
    pub fn error_for_status(self) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                url: self.final_url,
                status: self.status,
            })
        }
    }
}

/// The HTTP collaborator consumed by the analyzer and every provider
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Issues a GET request, following redirects up to the transport limit
    async fn get(&self, url: &str, request: &FetchRequest) -> Result<HttpResponse, FetchError>;

    /// Issues a POST request with a JSON body
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        request: &FetchRequest,
    ) -> Result<HttpResponse, FetchError>;
}
