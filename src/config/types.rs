use crate::scoring::{default_grade_thresholds, CategoryThresholds, CategoryWeights};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Site-Audit
///
/// Every table is optional; an empty file yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub providers: ProvidersConfig,
    pub scoring: ScoringConfig,
    pub fallback: FallbackConfig,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total timeout for fetching the analyzed page (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Maximum number of redirects followed for one fetch
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Response bodies larger than this are truncated
    #[serde(rename = "max-body-bytes")]
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!(
                "SiteAudit/{} (+https://github.com/site-audit/site-audit)",
                env!("CARGO_PKG_VERSION")
            ),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 5,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Which cache store backs the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Path to the SQLite database file (sqlite backend only)
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Lifetime of a cached analysis (seconds)
    #[serde(rename = "analysis-ttl-secs")]
    pub analysis_ttl_secs: u64,

    /// Lifetime of cached provider answers (seconds)
    #[serde(rename = "intelligence-ttl-secs")]
    pub intelligence_ttl_secs: u64,

    /// Collapse concurrent identical analyses into one pipeline run
    #[serde(rename = "single-flight")]
    pub single_flight: bool,

    /// Entry cap of the memory backend
    #[serde(rename = "max-entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            database_path: "./site-audit-cache.db".to_string(),
            analysis_ttl_secs: 24 * 60 * 60,
            intelligence_ttl_secs: 3 * 24 * 60 * 60,
            single_flight: true,
            max_entries: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub fn analysis_ttl(&self) -> Duration {
        Duration::from_secs(self.analysis_ttl_secs)
    }

    pub fn intelligence_ttl(&self) -> Duration {
        Duration::from_secs(self.intelligence_ttl_secs)
    }
}

/// Settings shared by every external intelligence provider
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub enabled: bool,

    #[serde(rename = "api-key")]
    pub api_key: Option<String>,

    /// Overrides the provider's public endpoint
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Calls allowed per rate window
    #[serde(rename = "rate-limit")]
    pub rate_limit: u32,

    #[serde(rename = "rate-window-secs")]
    pub rate_window_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            timeout_secs: 20,
            rate_limit: 10,
            rate_window_secs: 60,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    /// Returns the configured API key, ignoring blank values
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Returns the configured base URL or the provider default
    pub fn base_url<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
    }
}

/// External intelligence providers
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Qualys SSL Labs certificate grading
    #[serde(rename = "ssl-labs")]
    pub ssl_labs: ProviderConfig,

    /// Google Safe Browsing lookup (requires an API key)
    #[serde(rename = "safe-browsing")]
    pub safe_browsing: ProviderConfig,

    /// VirusTotal domain report (requires an API key)
    pub virustotal: ProviderConfig,

    /// BuiltWith technology lookup (requires an API key)
    pub builtwith: ProviderConfig,

    /// Google PageSpeed Insights
    pub pagespeed: ProviderConfig,
}

/// Ideal and acceptable character-length bands for a text field
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LengthRange {
    #[serde(rename = "ideal-min")]
    pub ideal_min: usize,
    #[serde(rename = "ideal-max")]
    pub ideal_max: usize,
    #[serde(rename = "acceptable-min")]
    pub acceptable_min: usize,
    #[serde(rename = "acceptable-max")]
    pub acceptable_max: usize,
}

impl LengthRange {
    pub fn is_ideal(&self, len: usize) -> bool {
        (self.ideal_min..=self.ideal_max).contains(&len)
    }

    pub fn is_acceptable(&self, len: usize) -> bool {
        (self.acceptable_min..=self.acceptable_max).contains(&len)
    }
}

/// Blend weights for the reputation providers
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReputationBlend {
    #[serde(rename = "safe-browsing")]
    pub safe_browsing: f64,
    pub virustotal: f64,
}

impl Default for ReputationBlend {
    fn default() -> Self {
        Self {
            safe_browsing: 0.6,
            virustotal: 0.4,
        }
    }
}

/// Points per metadata signal, out of 100
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetadataPoints {
    /// Title or description inside its ideal length band
    #[serde(rename = "length-ideal")]
    pub length_ideal: u32,
    /// Inside the acceptable band only
    #[serde(rename = "length-acceptable")]
    pub length_acceptable: u32,
    /// Present but outside both bands
    #[serde(rename = "length-poor")]
    pub length_poor: u32,
    pub canonical: u32,
    /// Shared proportionally over `open-graph-fields`
    #[serde(rename = "open-graph")]
    pub open_graph: u32,
    #[serde(rename = "open-graph-fields")]
    pub open_graph_fields: Vec<String>,
    #[serde(rename = "twitter-card")]
    pub twitter_card: u32,
    pub language: u32,
    pub indexable: u32,
    pub favicon: u32,
}

impl Default for MetadataPoints {
    fn default() -> Self {
        Self {
            length_ideal: 25,
            length_acceptable: 15,
            length_poor: 5,
            canonical: 10,
            open_graph: 20,
            open_graph_fields: ["title", "description", "image", "url", "type"]
                .map(String::from)
                .to_vec(),
            twitter_card: 5,
            language: 5,
            indexable: 5,
            favicon: 5,
        }
    }
}

/// Points per kind of contact detail found
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContactPoints {
    pub email: u32,
    pub phone: u32,
    pub address: u32,
    pub form: u32,
    pub hours: u32,
}

impl Default for ContactPoints {
    fn default() -> Self {
        Self {
            email: 25,
            phone: 25,
            address: 20,
            form: 20,
            hours: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SocialPoints {
    /// Per profile on a known platform
    pub platform: u32,
    /// Per `sameAs` link on an unknown host
    pub other: u32,
}

impl Default for SocialPoints {
    fn default() -> Self {
        Self {
            platform: 20,
            other: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedPoints {
    /// At least one feed
    pub present: u32,
    /// Several feeds, or both RSS and Atom
    pub variety: u32,
    /// Every feed carries a title
    pub titled: u32,
}

impl Default for FeedPoints {
    fn default() -> Self {
        Self {
            present: 60,
            variety: 20,
            titled: 20,
        }
    }
}

/// Certificate scoring tiers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SslPoints {
    /// A valid, unexpired certificate
    pub valid: u32,
    /// Expiry further away than `comfortable-days`
    #[serde(rename = "expiry-comfortable")]
    pub expiry_comfortable: u32,
    /// Expiry within `comfortable-days` but at least `near-days` away
    #[serde(rename = "expiry-near")]
    pub expiry_near: u32,
    /// Expiry date not reported
    #[serde(rename = "expiry-unknown")]
    pub expiry_unknown: u32,
    #[serde(rename = "comfortable-days")]
    pub comfortable_days: i64,
    #[serde(rename = "near-days")]
    pub near_days: i64,
    #[serde(rename = "strong-key")]
    pub strong_key: u32,
    #[serde(rename = "weak-key")]
    pub weak_key: u32,
    /// Minimum EC key size counted as strong
    #[serde(rename = "ec-strong-bits")]
    pub ec_strong_bits: u32,
    /// Minimum RSA (or unknown algorithm) key size counted as strong
    #[serde(rename = "rsa-strong-bits")]
    pub rsa_strong_bits: u32,
    /// Minimum key size counted as weak rather than worthless
    #[serde(rename = "weak-bits")]
    pub weak_bits: u32,
    /// Points by first letter of the SSL Labs grade
    pub grades: BTreeMap<String, u32>,
    /// Points by negotiated protocol when no grade is known
    pub protocols: BTreeMap<String, u32>,
    /// Any protocol missing from `protocols`
    #[serde(rename = "other-protocol")]
    pub other_protocol: u32,
}

impl Default for SslPoints {
    fn default() -> Self {
        Self {
            valid: 40,
            expiry_comfortable: 20,
            expiry_near: 10,
            expiry_unknown: 10,
            comfortable_days: 30,
            near_days: 7,
            strong_key: 15,
            weak_key: 5,
            ec_strong_bits: 256,
            rsa_strong_bits: 2048,
            weak_bits: 1024,
            grades: [("A", 25), ("B", 15), ("C", 10)]
                .into_iter()
                .map(|(grade, points)| (grade.to_string(), points))
                .collect(),
            protocols: [("TLSv1.3", 25), ("TLS 1.3", 25), ("TLSv1.2", 20), ("TLS 1.2", 20)]
                .into_iter()
                .map(|(protocol, points)| (protocol.to_string(), points))
                .collect(),
            other_protocol: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TechnologyPoints {
    /// Any technology identified
    pub detected: u32,
    /// Per security header present
    #[serde(rename = "security-header")]
    pub security_header: u32,
}

impl Default for TechnologyPoints {
    fn default() -> Self {
        Self {
            detected: 40,
            security_header: 10,
        }
    }
}

/// Response time strictly below `under-ms` scores `score`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ResponseTimeBucket {
    #[serde(rename = "under-ms")]
    pub under_ms: u64,
    pub score: u8,
}

/// Performance score from the measured response time
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PerformancePoints {
    /// Ascending by `under-ms`; the first matching bucket wins
    pub buckets: Vec<ResponseTimeBucket>,
    /// Score when slower than every bucket
    pub slowest: u8,
}

impl Default for PerformancePoints {
    fn default() -> Self {
        Self {
            buckets: [(200, 100), (500, 85), (1000, 70), (2000, 50), (4000, 30)]
                .into_iter()
                .map(|(under_ms, score)| ResponseTimeBucket { under_ms, score })
                .collect(),
            slowest: 10,
        }
    }
}

/// Point allocation tables, one per category
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    pub metadata: MetadataPoints,
    pub contact: ContactPoints,
    pub social: SocialPoints,
    pub feeds: FeedPoints,
    pub ssl: SslPoints,
    pub technology: TechnologyPoints,
    pub performance: PerformancePoints,
}

/// Scoring constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: CategoryWeights,

    /// Minimum score for each of the 13 letter grades
    #[serde(rename = "grade-thresholds")]
    pub grade_thresholds: BTreeMap<String, u8>,

    #[serde(rename = "title-length")]
    pub title_length: LengthRange,

    #[serde(rename = "description-length")]
    pub description_length: LengthRange,

    /// A category scoring below its threshold contributes recommendations
    #[serde(rename = "recommendation-thresholds")]
    pub recommendation_thresholds: CategoryThresholds,

    #[serde(rename = "reputation-blend")]
    pub reputation_blend: ReputationBlend,

    /// Points each signal earns inside its category
    pub points: PointsConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: CategoryWeights::default(),
            grade_thresholds: default_grade_thresholds(),
            title_length: LengthRange {
                ideal_min: 30,
                ideal_max: 60,
                acceptable_min: 10,
                acceptable_max: 70,
            },
            description_length: LengthRange {
                ideal_min: 120,
                ideal_max: 160,
                acceptable_min: 70,
                acceptable_max: 200,
            },
            recommendation_thresholds: CategoryThresholds::default(),
            reputation_blend: ReputationBlend::default(),
            points: PointsConfig::default(),
        }
    }
}

/// Default texts used when a page lacks its own
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}
