/// Checks if a host matches a wildcard host pattern
///
/// Two pattern forms are supported:
/// 1. Exact: `"facebook.com"` matches only `"facebook.com"`
/// 2. Wildcard: `"*.facebook.com"` matches the bare domain and any subdomain
///    (`"facebook.com"`, `"m.facebook.com"`, `"web.facebook.com"`)
///
/// Comparison is ASCII case-insensitive, and a trailing root dot on the host
/// (`"facebook.com."`) is ignored.
///
/// # Examples
///
/// ```
/// use site_audit::url::host_matches;
///
/// assert!(host_matches("*.facebook.com", "m.facebook.com"));
/// assert!(host_matches("*.facebook.com", "Facebook.com"));
/// assert!(!host_matches("*.facebook.com", "notfacebook.com"));
/// ```
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == pattern
    }
}

/// Returns true if the host matches any pattern in the list
pub fn host_matches_any(patterns: &[&str], host: &str) -> bool {
    patterns.iter().any(|pattern| host_matches(pattern, host))
}
