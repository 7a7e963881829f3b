//! Analysis orchestrator
//!
//! Sequences one analysis: validate the URL, consult the cache, fetch the
//! page once, run the extractors and the intelligence gateway side by side,
//! score, recommend, backfill, and cache the result when nothing failed.

use crate::analyzer::fallback::{ConfigFallback, FallbackProvider};
use crate::analyzer::options::AnalysisOptions;
use crate::analyzer::result::{AnalysisResult, ErrorEntry, ResultSource};
use crate::analyzer::single_flight::SingleFlight;
use crate::cache::{analysis_key, open_cache, CacheStore};
use crate::config::{validate, Config};
use crate::extract::{extract_all, ExtractionBundle, ExtractionError, ExtractorSelection};
use crate::fetch::{FetchError, FetchRequest, HttpFetcher, HttpResponse, ReqwestFetcher};
use crate::intelligence::{IntelligenceGateway, IntelligenceRecord, PageContext, RustlsProbe, TlsProbe};
use crate::scoring::{generate_recommendations, CategoryRecord, ScoreCategory, ScoringEngine};
use crate::url::{normalize_url, validate_url};
use crate::AuditError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A result, either freshly built or still in its cached serialized form
enum Resolved {
    Cached(Vec<u8>, ResultSource),
    Fresh(AnalysisResult),
}

/// Analyzes single URLs
///
/// # Example
///
/// ```no_run
/// use site_audit::{AnalysisOptions, Analyzer, Config};
///
/// # async fn run() -> site_audit::Result<()> {
/// let analyzer = Analyzer::new(Config::default())?;
/// let result = analyzer.analyze("https://example.com", &AnalysisOptions::quick()).await?;
/// println!("{} ({})", result.overall_score, result.overall_grade);
/// # Ok(())
/// # }
/// ```
pub struct Analyzer {
    config: Arc<Config>,
    fetcher: Arc<dyn HttpFetcher>,
    cache: Arc<dyn CacheStore>,
    gateway: IntelligenceGateway,
    engine: ScoringEngine,
    fallback: Arc<dyn FallbackProvider>,
    flights: Option<SingleFlight>,
}

/// Builds an [`Analyzer`] with injected collaborators
pub struct AnalyzerBuilder {
    config: Config,
    fetcher: Option<Arc<dyn HttpFetcher>>,
    cache: Option<Arc<dyn CacheStore>>,
    tls_probe: Option<Arc<dyn TlsProbe>>,
    fallback: Option<Arc<dyn FallbackProvider>>,
}

impl AnalyzerBuilder {
    pub fn fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn tls_probe(mut self, probe: Arc<dyn TlsProbe>) -> Self {
        self.tls_probe = Some(probe);
        self
    }

    pub fn fallback(mut self, fallback: Arc<dyn FallbackProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Validates the configuration and fills unset collaborators with defaults
    pub fn build(self) -> Result<Analyzer, AuditError> {
        validate(&self.config)?;
        let engine = ScoringEngine::new(&self.config.scoring)?;

        let fetcher: Arc<dyn HttpFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::new(&self.config.http)?),
        };
        let cache = match self.cache {
            Some(cache) => cache,
            None => open_cache(&self.config.cache)?,
        };
        let tls_probe: Arc<dyn TlsProbe> = match self.tls_probe {
            Some(probe) => probe,
            None => Arc::new(RustlsProbe::new()),
        };
        let fallback: Arc<dyn FallbackProvider> = match self.fallback {
            Some(fallback) => fallback,
            None => Arc::new(ConfigFallback::new(self.config.fallback.clone())),
        };

        let gateway = IntelligenceGateway::new(&self.config, fetcher.clone(), cache.clone(), tls_probe);
        let flights = self.config.cache.single_flight.then(SingleFlight::new);

        Ok(Analyzer {
            config: Arc::new(self.config),
            fetcher,
            cache,
            gateway,
            engine,
            fallback,
            flights,
        })
    }
}

impl Analyzer {
    /// Creates an analyzer with the default transport, cache and TLS probe
    pub fn new(config: Config) -> Result<Self, AuditError> {
        Self::builder(config).build()
    }

    pub fn builder(config: Config) -> AnalyzerBuilder {
        AnalyzerBuilder {
            config,
            fetcher: None,
            cache: None,
            tls_probe: None,
            fallback: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn intelligence(&self) -> &IntelligenceGateway {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Analyzes `url`
    ///
    /// Only a malformed URL is an error. Fetch, extraction and provider
    /// failures are reported in [`AnalysisResult::errors`].
    pub async fn analyze(
        &self,
        url: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, AuditError> {
        self.analyze_with_source(url, options)
            .await
            .map(|(result, _)| result)
    }

    /// Like [`Analyzer::analyze`], also telling where the result came from
    pub async fn analyze_with_source(
        &self,
        url: &str,
        options: &AnalysisOptions,
    ) -> Result<(AnalysisResult, ResultSource), AuditError> {
        match self.resolve(url, options).await? {
            Resolved::Cached(payload, source) => Ok((serde_json::from_slice(&payload)?, source)),
            Resolved::Fresh(result) => Ok((result, ResultSource::Fresh)),
        }
    }

    /// Analyzes `url` and returns the serialized result
    ///
    /// A cache hit returns the stored bytes unchanged.
    pub async fn analyze_json(
        &self,
        url: &str,
        options: &AnalysisOptions,
    ) -> Result<Vec<u8>, AuditError> {
        match self.resolve(url, options).await? {
            Resolved::Cached(payload, _) => Ok(payload),
            Resolved::Fresh(result) => Ok(serde_json::to_vec(&result)?),
        }
    }

    async fn resolve(&self, url: &str, options: &AnalysisOptions) -> Result<Resolved, AuditError> {
        let started = Instant::now();
        let target = validate_url(url).map_err(|e| AuditError::InvalidInput(e.to_string()))?;
        let normalized = normalize_url(url).map_err(|e| AuditError::InvalidInput(e.to_string()))?;
        let key = analysis_key(normalized.as_str(), &options.canonical());

        if !options.use_cache {
            return Ok(Resolved::Fresh(
                self.run(url, &target, &normalized, options, started).await,
            ));
        }

        if let Some(payload) = self.cached(&key) {
            tracing::info!("Serving {} from cache", normalized);
            return Ok(Resolved::Cached(payload, ResultSource::Cache));
        }

        let _flight = match &self.flights {
            Some(flights) => {
                let guard = flights.acquire(&key).await;
                // another caller may have finished while we waited
                if let Some(payload) = self.cached(&key) {
                    tracing::debug!("{} completed by a concurrent analysis", normalized);
                    return Ok(Resolved::Cached(payload, ResultSource::Cache));
                }
                Some(guard)
            }
            None => None,
        };

        let result = self.run(url, &target, &normalized, options, started).await;

        if result.has_errors() {
            if result.errors_for("fetch").next().is_some() {
                if let Some(payload) = self.stale(&key) {
                    tracing::warn!("Fetch of {} failed; serving stale analysis", normalized);
                    return Ok(Resolved::Cached(payload, ResultSource::Stale));
                }
            }
            tracing::debug!("Not caching {}: {} error(s)", normalized, result.errors.len());
            return Ok(Resolved::Fresh(result));
        }

        let ttl = options
            .cache_duration
            .unwrap_or_else(|| self.config.cache.analysis_ttl());
        match serde_json::to_vec(&result) {
            Ok(payload) => {
                if let Err(e) = self.cache.set(&key, &payload, ttl) {
                    tracing::warn!("Failed to cache analysis of {}: {}", normalized, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize analysis of {}: {}", normalized, e),
        }

        Ok(Resolved::Fresh(result))
    }

    /// Runs the pipeline; never fails, every problem lands in `errors`
    async fn run(
        &self,
        url: &str,
        target: &Url,
        normalized: &Url,
        options: &AnalysisOptions,
        started: Instant,
    ) -> AnalysisResult {
        let budget = options.timeout.unwrap_or_else(|| self.config.http.timeout());
        let mut result = AnalysisResult::new(url, normalized.as_str(), self.engine.scale().grade_for(0));

        tracing::info!("Analyzing {}", target);
        let response = match self.fetch_page(target, budget).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Could not fetch {}: {}", target, e);
                result.errors.push(ErrorEntry::fetch(e.to_string()));
                result.analysis_time_ms = elapsed_ms(started);
                return result;
            }
        };

        // relative references resolve against the page after redirects
        let page_url = Url::parse(&response.final_url).unwrap_or_else(|_| target.clone());

        let html = response.text();
        let selection = options.extractors();
        let extraction_url = page_url.clone();
        let (extraction, intelligence) = tokio::join!(
            tokio::task::spawn_blocking(move || extract_all(&html, &extraction_url, selection)),
            async {
                if options.intelligence.any() {
                    self.gateway
                        .analyze(
                            PageContext {
                                url: &page_url,
                                response: &response,
                            },
                            options.intelligence,
                            budget,
                        )
                        .await
                } else {
                    IntelligenceRecord::default()
                }
            }
        );

        let bundle = extraction.unwrap_or_else(|e| {
            tracing::warn!("Extraction task for {} failed: {}", page_url, e);
            failed_bundle(selection, &e.to_string())
        });

        let mut records = Vec::new();
        collect(bundle.metadata, ScoreCategory::Metadata, CategoryRecord::Metadata, &mut records, &mut result.errors);
        collect(bundle.contact, ScoreCategory::Contact, CategoryRecord::Contact, &mut records, &mut result.errors);
        collect(bundle.social, ScoreCategory::Social, CategoryRecord::Social, &mut records, &mut result.errors);
        collect(bundle.feeds, ScoreCategory::Feeds, CategoryRecord::Feeds, &mut records, &mut result.errors);

        result.errors.extend(provider_errors(&intelligence));
        if !intelligence.is_empty() {
            records.push(CategoryRecord::Intelligence(intelligence));
        }

        let scorecard = self.engine.score(&records);
        result.recommendations = generate_recommendations(&records, &scorecard, self.engine.config());
        result.component_scores = scorecard
            .component_scores
            .iter()
            .map(|(category, score)| (category.as_str().to_string(), *score))
            .collect();
        result.components = scorecard.components;
        result.overall_score = scorecard.overall_score;
        result.overall_grade = scorecard.overall_grade;

        for record in records {
            match record {
                CategoryRecord::Metadata(mut metadata) => {
                    self.fallback.apply(&mut metadata, &page_url);
                    result.metadata = Some(metadata);
                }
                CategoryRecord::Contact(contact) => result.contact = Some(contact),
                CategoryRecord::Social(social) => result.social = Some(social),
                CategoryRecord::Feeds(feeds) => result.set_feeds(feeds),
                CategoryRecord::Intelligence(intelligence) => result.intelligence = intelligence,
            }
        }

        result.analysis_time_ms = elapsed_ms(started);
        tracing::info!(
            "Analyzed {} in {}ms: {} ({}), {} recommendation(s), {} error(s)",
            target,
            result.analysis_time_ms,
            result.overall_score,
            result.overall_grade,
            result.recommendations.len(),
            result.errors.len()
        );
        result
    }

    /// Fetches the page once; non-2xx and empty bodies count as failures
    async fn fetch_page(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let response = self
            .fetcher
            .get(url.as_str(), &FetchRequest::new(timeout))
            .await?
            .error_for_status()?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::EmptyBody {
                url: response.final_url,
            });
        }
        Ok(response)
    }

    fn cached(&self, key: &str) -> Option<Vec<u8>> {
        match self.cache.get(key) {
            Ok(entry) => entry.map(|entry| entry.payload),
            Err(e) => {
                tracing::warn!("Cache lookup failed: {}", e);
                None
            }
        }
    }

    fn stale(&self, key: &str) -> Option<Vec<u8>> {
        match self.cache.get_stale(key) {
            Ok(entry) => entry.map(|entry| entry.payload),
            Err(e) => {
                tracing::warn!("Stale cache lookup failed: {}", e);
                None
            }
        }
    }
}

/// Moves a successful extraction into `records`, a failed one into `errors`
fn collect<T>(
    slot: Option<Result<T, ExtractionError>>,
    category: ScoreCategory,
    wrap: fn(T) -> CategoryRecord,
    records: &mut Vec<CategoryRecord>,
    errors: &mut Vec<ErrorEntry>,
) {
    match slot {
        Some(Ok(record)) => records.push(wrap(record)),
        Some(Err(e)) => {
            tracing::warn!("{} extraction failed: {}", category, e);
            errors.push(ErrorEntry::extraction(category, e.to_string()));
        }
        None => {}
    }
}

fn failed_bundle(selection: ExtractorSelection, message: &str) -> ExtractionBundle {
    fn failed<T>(selected: bool, message: &str) -> Option<Result<T, ExtractionError>> {
        selected.then(|| {
            Err(ExtractionError::InvalidPattern {
                pattern: "extraction task".to_string(),
                message: message.to_string(),
            })
        })
    }
    ExtractionBundle {
        metadata: failed(selection.metadata, message),
        contact: failed(selection.contact, message),
        social: failed(selection.social, message),
        feeds: failed(selection.feeds, message),
    }
}

/// SSL and reputation failures are errors; technology and performance only add
fn provider_errors(record: &IntelligenceRecord) -> Vec<ErrorEntry> {
    let mut errors = Vec::new();
    if let Some(message) = record.ssl.as_ref().and_then(|ssl| ssl.error.as_ref()) {
        errors.push(ErrorEntry::provider(ScoreCategory::Ssl, message.clone()));
    }
    if let Some(message) = record.reputation.as_ref().and_then(|r| r.error.as_ref()) {
        errors.push(ErrorEntry::provider(ScoreCategory::Reputation, message.clone()));
    }
    errors
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::result::ErrorKind;
    use crate::intelligence::{ReputationRecord, SslRecord};

    #[test]
    fn test_provider_errors_cover_ssl_and_reputation_only() {
        let record = IntelligenceRecord {
            ssl: Some(SslRecord::failed("tls-handshake", "connection refused")),
            reputation: Some(ReputationRecord::unavailable("safe-browsing: rate limit reached")),
            ..IntelligenceRecord::default()
        };
        let errors = provider_errors(&record);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].category, "ssl");
        assert_eq!(errors[1].category, "reputation");
        assert!(errors.iter().all(|e| e.kind == ErrorKind::ProviderUnavailable));

        assert!(provider_errors(&IntelligenceRecord::default()).is_empty());
    }

    #[test]
    fn test_failed_bundle_marks_selected_categories() {
        let bundle = failed_bundle(
            ExtractorSelection {
                feeds: false,
                ..ExtractorSelection::default()
            },
            "task panicked",
        );
        assert!(matches!(bundle.metadata, Some(Err(_))));
        assert!(matches!(bundle.contact, Some(Err(_))));
        assert!(matches!(bundle.social, Some(Err(_))));
        assert!(bundle.feeds.is_none());
    }

    #[test]
    fn test_collect_routes_errors() {
        let mut records = Vec::new();
        let mut errors = Vec::new();
        collect(
            Some(Err(ExtractionError::InvalidSelector {
                selector: "a[[".to_string(),
                message: "bad".to_string(),
            })),
            ScoreCategory::Social,
            CategoryRecord::Social,
            &mut records,
            &mut errors,
        );
        assert!(records.is_empty());
        assert_eq!(errors[0].category, "social");
        assert_eq!(errors[0].kind, ErrorKind::ExtractionFailure);
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let mut config = Config::default();
        config.providers.pagespeed.rate_limit = 0;
        assert!(matches!(Analyzer::new(config), Err(AuditError::Config(_))));
    }
}
