use crate::config::types::{
    CacheBackend, CacheConfig, Config, HttpConfig, LengthRange, PointsConfig, ProviderConfig,
    ScoringConfig,
};
use crate::scoring::{GradeScale, ScoreCategory};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_cache_config(&config.cache)?;
    validate_provider("ssl-labs", &config.providers.ssl_labs)?;
    validate_provider("safe-browsing", &config.providers.safe_browsing)?;
    validate_provider("virustotal", &config.providers.virustotal)?;
    validate_provider("builtwith", &config.providers.builtwith)?;
    validate_provider("pagespeed", &config.providers.pagespeed)?;
    validate_scoring_config(&config.scoring)?;
    Ok(())
}

/// Validates HTTP transport configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    if config.max_body_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_body_bytes must be >= 1024, got {}",
            config.max_body_bytes
        )));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.backend == CacheBackend::Sqlite && config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty for the sqlite cache backend".to_string(),
        ));
    }

    if config.max_entries == 0 {
        return Err(ConfigError::Validation(
            "max_entries must be >= 1".to_string(),
        ));
    }

    if config.analysis_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "analysis_ttl_secs must be >= 1".to_string(),
        ));
    }

    if config.intelligence_ttl_secs < config.analysis_ttl_secs {
        return Err(ConfigError::Validation(format!(
            "intelligence_ttl_secs ({}) must not be shorter than analysis_ttl_secs ({})",
            config.intelligence_ttl_secs, config.analysis_ttl_secs
        )));
    }

    Ok(())
}

/// Validates one provider table
fn validate_provider(name: &str, config: &ProviderConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &config.base_url {
        let url = Url::parse(base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base_url for {}: {}", name, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "base_url for {} must be http or https, got '{}'",
                name, base_url
            )));
        }
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "{}: timeout_secs must be >= 1",
            name
        )));
    }

    if config.rate_limit == 0 || config.rate_window_secs == 0 {
        return Err(ConfigError::Validation(format!(
            "{}: rate_limit and rate_window_secs must be >= 1",
            name
        )));
    }

    Ok(())
}

/// Validates scoring constants
fn validate_scoring_config(config: &ScoringConfig) -> Result<(), ConfigError> {
    let mut total = 0.0;
    for category in ScoreCategory::ALL {
        let weight = config.weights.get(category);
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::Validation(format!(
                "weight for {} must be a non-negative number, got {}",
                category, weight
            )));
        }
        total += weight;
    }
    if total <= 0.0 {
        return Err(ConfigError::Validation(
            "at least one category weight must be positive".to_string(),
        ));
    }

    // Builds the scale, which checks completeness and ordering
    GradeScale::from_thresholds(&config.grade_thresholds)?;

    validate_length_range("title_length", &config.title_length)?;
    validate_length_range("description_length", &config.description_length)?;

    for category in ScoreCategory::ALL {
        let threshold = config.recommendation_thresholds.get(category);
        if threshold > 100 {
            return Err(ConfigError::Validation(format!(
                "recommendation threshold for {} must be <= 100, got {}",
                category, threshold
            )));
        }
    }

    let blend = &config.reputation_blend;
    if blend.safe_browsing < 0.0
        || blend.virustotal < 0.0
        || !blend.safe_browsing.is_finite()
        || !blend.virustotal.is_finite()
        || blend.safe_browsing + blend.virustotal <= 0.0
    {
        return Err(ConfigError::Validation(
            "reputation_blend weights must be non-negative with a positive sum".to_string(),
        ));
    }

    validate_points(&config.points)?;

    Ok(())
}

/// Validates the point tables that cannot be checked by their types alone
fn validate_points(points: &PointsConfig) -> Result<(), ConfigError> {
    let ssl = &points.ssl;
    if ssl.near_days > ssl.comfortable_days {
        return Err(ConfigError::Validation(format!(
            "ssl near-days ({}) must not exceed comfortable-days ({})",
            ssl.near_days, ssl.comfortable_days
        )));
    }

    let performance = &points.performance;
    if performance
        .buckets
        .windows(2)
        .any(|pair| pair[0].under_ms >= pair[1].under_ms)
    {
        return Err(ConfigError::Validation(
            "performance buckets must be in ascending under-ms order".to_string(),
        ));
    }
    let too_high = performance
        .buckets
        .iter()
        .map(|bucket| bucket.score)
        .chain([performance.slowest])
        .find(|score| *score > 100);
    if let Some(score) = too_high {
        return Err(ConfigError::Validation(format!(
            "performance scores must be <= 100, got {}",
            score
        )));
    }

    Ok(())
}

/// Validates a length band: acceptable_min <= ideal_min <= ideal_max <= acceptable_max
fn validate_length_range(name: &str, range: &LengthRange) -> Result<(), ConfigError> {
    if range.acceptable_min > range.ideal_min
        || range.ideal_min > range.ideal_max
        || range.ideal_max > range.acceptable_max
    {
        return Err(ConfigError::Validation(format!(
            "{} must satisfy acceptable_min <= ideal_min <= ideal_max <= acceptable_max",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_excessive_redirects_rejected() {
        let mut config = Config::default();
        config.http.max_redirects = 50;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_intelligence_ttl_must_outlive_analysis_ttl() {
        let mut config = Config::default();
        config.cache.analysis_ttl_secs = 100;
        config.cache.intelligence_ttl_secs = 50;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_max_entries_rejected() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_sqlite_backend_requires_path() {
        let mut config = Config::default();
        config.cache.backend = CacheBackend::Sqlite;
        config.cache.database_path = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_provider_base_url() {
        let mut config = Config::default();
        config.providers.pagespeed.base_url = Some("not a url".to_string());
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.providers.pagespeed.base_url = Some("ftp://example.com".to_string());
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = Config::default();
        config.providers.virustotal.rate_limit = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = Config::default();
        config.scoring.weights.social = -0.1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let mut config = Config::default();
        config.scoring.weights = crate::scoring::CategoryWeights::zero();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_incomplete_grade_table_rejected() {
        let mut config = Config::default();
        config.scoring.grade_thresholds.remove("B+");
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_length_range_rejected() {
        let mut config = Config::default();
        config.scoring.title_length.ideal_min = 80;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unordered_performance_buckets_rejected() {
        let mut config = Config::default();
        config.scoring.points.performance.buckets.reverse();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_ssl_expiry_days_rejected() {
        let mut config = Config::default();
        config.scoring.points.ssl.near_days = 60;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_reputation_blend_needs_positive_sum() {
        let mut config = Config::default();
        config.scoring.reputation_blend.safe_browsing = 0.0;
        config.scoring.reputation_blend.virustotal = 0.0;
        assert!(validate(&config).is_err());
    }
}
