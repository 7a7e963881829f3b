use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_audit::config::load_config;
///
/// let config = load_config(Path::new("site-audit.toml")).unwrap();
/// println!("Analysis TTL: {}s", config.cache.analysis_ttl_secs);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that reports can be matched to the settings that
/// produced them.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[http]
user-agent = "TestAudit/1.0"
timeout-secs = 15
max-redirects = 3

[cache]
backend = "sqlite"
database-path = "./cache.db"
analysis-ttl-secs = 3600
intelligence-ttl-secs = 7200

[providers.safe-browsing]
api-key = "sb-key"
rate-limit = 5

[scoring.weights]
metadata = 0.5
social = 0.0

[fallback]
title = "Untitled site"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.http.user_agent, "TestAudit/1.0");
        assert_eq!(config.http.timeout_secs, 15);
        assert_eq!(config.http.max_redirects, 3);
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        assert_eq!(config.cache.analysis_ttl_secs, 3600);
        assert_eq!(config.providers.safe_browsing.api_key(), Some("sb-key"));
        assert_eq!(config.providers.safe_browsing.rate_limit, 5);
        assert!(config.providers.virustotal.api_key().is_none());
        assert_eq!(config.scoring.weights.metadata, 0.5);
        assert_eq!(config.scoring.weights.social, 0.0);
        // Unspecified weights keep their defaults
        assert_eq!(config.scoring.weights.contact, 0.15);
        assert_eq!(config.fallback.title.as_deref(), Some("Untitled site"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.http.max_redirects, 5);
        assert_eq!(config.scoring.grade_thresholds.len(), 13);
        assert!(config.cache.single_flight);
    }

    #[test]
    fn test_point_tables_override_defaults() {
        let config = parse_config(
            r#"
[scoring.points.contact]
email = 40

[scoring.points.ssl.grades]
A = 30

[[scoring.points.performance.buckets]]
under-ms = 800
score = 100
"#,
        )
        .unwrap();

        let points = &config.scoring.points;
        assert_eq!(points.contact.email, 40);
        assert_eq!(points.contact.phone, 25);
        assert_eq!(points.ssl.grades.get("A"), Some(&30));
        assert_eq!(points.ssl.grades.len(), 1);
        assert_eq!(points.performance.buckets.len(), 1);
        assert_eq!(points.performance.slowest, 10);
        assert_eq!(points.metadata.open_graph_fields.len(), 5);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/site-audit.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[cache]
analysis-ttl-secs = 0
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
