//! Cache key derivation
//!
//! Keys are SHA-256 digests, so equal inputs always give equal keys and
//! different URLs or option sets do not collide in practice.

use sha2::{Digest, Sha256};

/// Key of an analysis result
///
/// `normalized_url` must already be normalized and `canonical_options` must be
/// a canonical (sorted-key) serialization of the effective options.
pub fn analysis_key(normalized_url: &str, canonical_options: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_options.as_bytes());
    format!("analysis:{}", hex::encode(hasher.finalize()))
}

/// Key of a provider answer about `subject` (a host or URL)
pub fn provider_key(provider: &str, subject: &str) -> String {
    format!(
        "intel:{}:{}",
        provider,
        hex::encode(Sha256::digest(subject.as_bytes()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_key_is_deterministic() {
        let a = analysis_key("https://example.com/", r#"{"include_feeds":true}"#);
        let b = analysis_key("https://example.com/", r#"{"include_feeds":true}"#);
        assert_eq!(a, b);
        assert!(a.starts_with("analysis:"));
        assert_eq!(a.len(), "analysis:".len() + 64);
    }

    #[test]
    fn test_analysis_key_depends_on_both_inputs() {
        let base = analysis_key("https://example.com/", r#"{"include_feeds":true}"#);
        assert_ne!(base, analysis_key("https://example.com/", r#"{"include_feeds":false}"#));
        assert_ne!(base, analysis_key("https://example.org/", r#"{"include_feeds":true}"#));
        // the separator keeps the boundary between url and options
        assert_ne!(analysis_key("ab", "c"), analysis_key("a", "bc"));
    }

    #[test]
    fn test_encoded_query_gets_its_own_key() {
        let options = r#"{"include_feeds":true}"#;
        let encoded = crate::url::normalize_url("https://example.com/search?a=1%26b%3D2").unwrap();
        let split = crate::url::normalize_url("https://example.com/search?a=1&b=2").unwrap();
        assert_ne!(
            analysis_key(encoded.as_str(), options),
            analysis_key(split.as_str(), options)
        );
    }

    #[test]
    fn test_provider_keys_are_namespaced() {
        assert_ne!(
            provider_key("virustotal", "example.com"),
            provider_key("builtwith", "example.com")
        );
        assert!(provider_key("ssl-labs", "example.com").starts_with("intel:ssl-labs:"));
    }
}
