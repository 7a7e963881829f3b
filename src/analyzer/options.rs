//! Per-request analysis options

use crate::extract::ExtractorSelection;
use crate::intelligence::Capabilities;
use crate::AuditError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// What one analysis should cover and how it may use the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub include_metadata: bool,
    pub include_contact: bool,
    pub include_social: bool,
    pub include_feeds: bool,

    /// Intelligence capabilities to request
    pub intelligence: Capabilities,

    /// Read and write the analysis cache
    pub use_cache: bool,

    /// Lifetime of the cached result; the configured analysis TTL when `None`
    pub cache_duration: Option<Duration>,

    /// Page fetch timeout and per-capability budget; the HTTP timeout when `None`
    pub timeout: Option<Duration>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_contact: true,
            include_social: true,
            include_feeds: true,
            intelligence: Capabilities::all(),
            use_cache: true,
            cache_duration: None,
            timeout: None,
        }
    }
}

impl AnalysisOptions {
    /// Lower-latency profile: no intelligence providers and no feed discovery
    pub fn quick() -> Self {
        Self {
            include_feeds: false,
            intelligence: Capabilities::none(),
            ..Self::default()
        }
    }

    /// Reads options from named toggles
    ///
    /// Booleans accept JSON `true`/`false`; `cache_duration` and `timeout` are
    /// seconds. Keys not listed here are ignored. Anything else about a known
    /// key (wrong type, negative duration) is rejected.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, AuditError> {
        let mut options = Self::default();

        for (key, value) in map {
            match key.as_str() {
                "include_metadata" => options.include_metadata = flag(key, value)?,
                "include_contact" => options.include_contact = flag(key, value)?,
                "include_social" => options.include_social = flag(key, value)?,
                "include_feeds" => options.include_feeds = flag(key, value)?,
                "include_intelligence_ssl" => options.intelligence.ssl = flag(key, value)?,
                "include_intelligence_reputation" => {
                    options.intelligence.reputation = flag(key, value)?
                }
                "include_intelligence_technology" => {
                    options.intelligence.technology = flag(key, value)?
                }
                "include_intelligence_performance" => {
                    options.intelligence.performance = flag(key, value)?
                }
                "use_cache" => options.use_cache = flag(key, value)?,
                "cache_duration" => options.cache_duration = Some(seconds(key, value)?),
                "timeout" => options.timeout = Some(seconds(key, value)?),
                other => tracing::debug!("Ignoring unknown analysis option '{}'", other),
            }
        }

        Ok(options)
    }

    /// Which extractors run for these options
    pub fn extractors(&self) -> ExtractorSelection {
        ExtractorSelection {
            metadata: self.include_metadata,
            contact: self.include_contact,
            social: self.include_social,
            feeds: self.include_feeds,
        }
    }

    /// Sorted-key serialization of the options that shape the result
    ///
    /// Cache controls and the timeout are left out: they change how a result
    /// is obtained, not what it contains.
    pub fn canonical(&self) -> String {
        let toggles = BTreeMap::from([
            ("include_metadata", self.include_metadata),
            ("include_contact", self.include_contact),
            ("include_social", self.include_social),
            ("include_feeds", self.include_feeds),
            ("include_intelligence_ssl", self.intelligence.ssl),
            ("include_intelligence_reputation", self.intelligence.reputation),
            ("include_intelligence_technology", self.intelligence.technology),
            ("include_intelligence_performance", self.intelligence.performance),
        ]);
        let fields: Vec<String> = toggles
            .iter()
            .map(|(key, enabled)| format!("\"{}\":{}", key, enabled))
            .collect();
        format!("{{{}}}", fields.join(","))
    }
}

fn flag(key: &str, value: &Value) -> Result<bool, AuditError> {
    value
        .as_bool()
        .ok_or_else(|| AuditError::InvalidInput(format!("option '{}' must be a boolean", key)))
}

fn seconds(key: &str, value: &Value) -> Result<Duration, AuditError> {
    value
        .as_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            AuditError::InvalidInput(format!(
                "option '{}' must be a non-negative number of seconds",
                key
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_from_map_reads_known_keys() {
        let options = AnalysisOptions::from_map(&map(json!({
            "include_feeds": false,
            "include_intelligence_ssl": false,
            "use_cache": false,
            "cache_duration": 3600,
            "timeout": 2.5,
            "render_template": "compact"
        })))
        .unwrap();

        assert!(!options.include_feeds);
        assert!(options.include_metadata);
        assert!(!options.intelligence.ssl);
        assert!(options.intelligence.reputation);
        assert!(!options.use_cache);
        assert_eq!(options.cache_duration, Some(Duration::from_secs(3600)));
        assert_eq!(options.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_from_map_rejects_wrong_types() {
        let err = AnalysisOptions::from_map(&map(json!({"use_cache": "yes"}))).unwrap_err();
        assert!(matches!(err, AuditError::InvalidInput(_)));

        let err = AnalysisOptions::from_map(&map(json!({"timeout": -1}))).unwrap_err();
        assert!(matches!(err, AuditError::InvalidInput(_)));
    }

    #[test]
    fn test_from_map_rejects_unrepresentable_durations() {
        let err = AnalysisOptions::from_map(&map(json!({"cache_duration": 1e30}))).unwrap_err();
        assert!(matches!(err, AuditError::InvalidInput(_)));
    }

    #[test]
    fn test_quick_profile() {
        let quick = AnalysisOptions::quick();
        assert!(!quick.include_feeds);
        assert!(!quick.intelligence.any());
        assert!(quick.include_metadata && quick.include_contact && quick.include_social);
    }

    #[test]
    fn test_canonical_is_sorted_and_ignores_cache_controls() {
        let options = AnalysisOptions::default();
        let canonical = options.canonical();
        assert!(canonical.starts_with("{\"include_contact\":true,\"include_feeds\":true"));

        let uncached = AnalysisOptions {
            use_cache: false,
            cache_duration: Some(Duration::from_secs(5)),
            timeout: Some(Duration::from_secs(1)),
            ..options
        };
        assert_eq!(uncached.canonical(), canonical);
    }

    #[test]
    fn test_canonical_differs_with_categories() {
        let base = AnalysisOptions::default();
        let mut fewer = base;
        fewer.intelligence.performance = false;
        assert_ne!(base.canonical(), fewer.canonical());
        assert_ne!(base.canonical(), AnalysisOptions::quick().canonical());
    }
}
