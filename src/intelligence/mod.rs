//! External intelligence gateway
//!
//! Adapters around third-party services that know things about a site which
//! the page itself cannot tell: certificate quality, threat reputation,
//! technology stack and load performance. Each capability can be toggled on
//! its own, and every provider call goes through the same guard:
//!
//! 1. the provider cache is consulted (keyed by a hash of the subject, with a
//!    longer lifetime than analysis results),
//! 2. the provider's sliding-window rate limit is checked; when it is reached
//!    the call is skipped, not retried,
//! 3. the call runs under the provider's timeout.
//!
//! Failures stay inside the capability's record. SSL and reputation failures
//! surface as errors on the analysis; technology and performance only ever add
//! information.

pub mod performance;
pub mod ratelimit;
pub mod reputation;
pub mod ssl;
pub mod technology;
pub mod tls;

pub use performance::PerformanceRecord;
pub use ratelimit::RateLimiter;
pub use reputation::{ReputationRecord, SafeBrowsingVerdict, VirusTotalVerdict};
pub use ssl::SslRecord;
pub use technology::{Technology, TechnologyRecord, SECURITY_HEADERS};
pub use tls::{CertificateInfo, RustlsProbe, TlsProbe};

use crate::cache::{provider_key, CacheStore};
use crate::config::{Config, ProviderConfig, ProvidersConfig, ReputationBlend};
use crate::fetch::{FetchError, HttpFetcher, HttpResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a provider could not contribute
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0}: provider disabled")]
    Disabled(String),

    #[error("{0}: rate limit reached")]
    RateLimited(String),

    #[error("{0}: no API key configured")]
    MissingApiKey(String),

    #[error("{0}: timed out")]
    Timeout(String),

    #[error("{provider}: HTTP {status}")]
    Http { provider: String, status: u16 },

    #[error("{provider}: {message}")]
    Fetch { provider: String, message: String },

    #[error("{provider}: invalid response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("TLS handshake with {host} failed: {message}")]
    Tls { host: String, message: String },

    #[error("{provider}: assessment not ready ({status})")]
    NotReady { provider: String, status: String },
}

impl ProviderError {
    /// True when the provider was never configured to run
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, ProviderError::Disabled(_) | ProviderError::MissingApiKey(_))
    }
}

/// Independently togglable intelligence checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub ssl: bool,
    pub reputation: bool,
    pub technology: bool,
    pub performance: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            ssl: true,
            reputation: true,
            technology: true,
            performance: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.ssl || self.reputation || self.technology || self.performance
    }
}

/// Results of the requested capabilities; unrequested ones stay `None`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntelligenceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation: Option<ReputationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<TechnologyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceRecord>,
}

impl IntelligenceRecord {
    pub fn is_empty(&self) -> bool {
        self.ssl.is_none()
            && self.reputation.is_none()
            && self.technology.is_none()
            && self.performance.is_none()
    }
}

/// The analyzed page as seen by the gateway
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub url: &'a Url,
    pub response: &'a HttpResponse,
}

/// Runs intelligence capabilities against external providers
pub struct IntelligenceGateway {
    fetcher: Arc<dyn HttpFetcher>,
    cache: Arc<dyn CacheStore>,
    tls_probe: Arc<dyn TlsProbe>,
    limiter: RateLimiter,
    providers: ProvidersConfig,
    blend: ReputationBlend,
    cache_ttl: Duration,
    handshake_timeout: Duration,
}

impl IntelligenceGateway {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn HttpFetcher>,
        cache: Arc<dyn CacheStore>,
        tls_probe: Arc<dyn TlsProbe>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            tls_probe,
            limiter: RateLimiter::new(),
            providers: config.providers.clone(),
            blend: config.scoring.reputation_blend,
            cache_ttl: config.cache.intelligence_ttl(),
            handshake_timeout: config.http.timeout(),
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Runs every requested capability concurrently
    ///
    /// `budget` bounds each capability as a whole (including fallbacks); a
    /// capability that runs out of budget is reported as unavailable while the
    /// others keep their results.
    pub async fn analyze(
        &self,
        page: PageContext<'_>,
        capabilities: Capabilities,
        budget: Duration,
    ) -> IntelligenceRecord {
        let (ssl, reputation, technology, performance) = tokio::join!(
            async {
                if !capabilities.ssl {
                    return None;
                }
                Some(
                    tokio::time::timeout(budget, self.analyze_ssl(page.url))
                        .await
                        .unwrap_or_else(|_| SslRecord::failed("ssl", "analysis budget exhausted")),
                )
            },
            async {
                if !capabilities.reputation {
                    return None;
                }
                tokio::time::timeout(budget, self.analyze_reputation(page.url))
                    .await
                    .unwrap_or_else(|_| {
                        Some(ReputationRecord::unavailable("analysis budget exhausted"))
                    })
            },
            async {
                if !capabilities.technology {
                    return None;
                }
                Some(
                    tokio::time::timeout(budget, self.analyze_technology(page))
                        .await
                        .unwrap_or_else(|_| TechnologyRecord::from_page(page)),
                )
            },
            async {
                if !capabilities.performance {
                    return None;
                }
                Some(
                    tokio::time::timeout(budget, self.analyze_performance(page))
                        .await
                        .unwrap_or_else(|_| PerformanceRecord::from_page(page)),
                )
            },
        );

        IntelligenceRecord {
            ssl,
            reputation,
            technology,
            performance,
        }
    }

    /// Runs one provider call behind the cache, the rate limiter and the timeout
    ///
    /// Only successful answers are cached.
    async fn call_provider<T, Fut>(
        &self,
        provider: &'static str,
        config: &ProviderConfig,
        subject: &str,
        call: Fut,
    ) -> Result<T, ProviderError>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if !config.enabled {
            return Err(ProviderError::Disabled(provider.to_string()));
        }

        let key = provider_key(provider, subject);
        match self.cache.get(&key) {
            Ok(Some(entry)) => match serde_json::from_slice(&entry.payload) {
                Ok(value) => {
                    tracing::debug!("{} answer for {} served from cache", provider, subject);
                    return Ok(value);
                }
                Err(e) => tracing::warn!("Discarding unreadable {} cache entry: {}", provider, e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Provider cache lookup failed for {}: {}", provider, e),
        }

        if !self
            .limiter
            .try_acquire(provider, config.rate_limit, config.rate_window())
        {
            return Err(ProviderError::RateLimited(provider.to_string()));
        }

        let value = tokio::time::timeout(config.timeout(), call)
            .await
            .map_err(|_| ProviderError::Timeout(provider.to_string()))??;

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(&key, &bytes, self.cache_ttl) {
                    tracing::warn!("Failed to cache {} answer: {}", provider, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize {} answer: {}", provider, e),
        }

        Ok(value)
    }
}

/// Maps a transport outcome onto provider errors and decodes a JSON body
fn decode_response<T: DeserializeOwned>(
    provider: &str,
    result: Result<HttpResponse, FetchError>,
) -> Result<T, ProviderError> {
    let response = result.map_err(|e| match e {
        FetchError::Timeout { .. } => ProviderError::Timeout(provider.to_string()),
        other => ProviderError::Fetch {
            provider: provider.to_string(),
            message: other.to_string(),
        },
    })?;

    if response.status == 429 {
        return Err(ProviderError::RateLimited(provider.to_string()));
    }
    if !response.is_success() {
        return Err(ProviderError::Http {
            provider: provider.to_string(),
            status: response.status,
        });
    }

    response.json().map_err(|e| ProviderError::InvalidResponse {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}
