//! Integration tests for the analyzer
//!
//! These tests use wiremock to serve pages and provider APIs and run the full
//! pipeline end-to-end: fetch, extraction, intelligence, scoring and caching.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use site_audit::cache::{CacheStore, MemoryCache};
use site_audit::config::Config;
use site_audit::intelligence::reputation::SAFE_BROWSING;
use site_audit::intelligence::{CertificateInfo, ProviderError, TlsProbe};
use site_audit::{AnalysisOptions, AnalysisResult, Analyzer, AuditError, ResultSource};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXAMPLE_PAGE: &str = r#"<html><head><title>Home</title>
<link type="application/rss+xml" href="/feed.xml"></head>
<body><a href="mailto:info@example.com">Mail</a>
<a href="tel:+14155551234">Call</a></body></html>"#;

/// Probe answering with a trusted certificate, without touching the network
struct FixedProbe;

#[async_trait]
impl TlsProbe for FixedProbe {
    async fn probe(
        &self,
        host: &str,
        _port: u16,
        _timeout: Duration,
    ) -> Result<CertificateInfo, ProviderError> {
        Ok(CertificateInfo {
            verified: true,
            verification_error: None,
            subject: Some(format!("CN={}", host)),
            issuer: Some("CN=Test CA".to_string()),
            not_after: Utc::now() + ChronoDuration::days(120),
            key_algorithm: Some("EC".to_string()),
            key_size: Some(256),
            protocol: Some("TLSv1.3".to_string()),
        })
    }
}

/// Configuration with every remote provider disabled and pointed at `base`
fn test_config(base: &str) -> Config {
    let mut config = Config::default();
    config.http.timeout_secs = 5;
    for provider in [
        &mut config.providers.ssl_labs,
        &mut config.providers.safe_browsing,
        &mut config.providers.virustotal,
        &mut config.providers.builtwith,
        &mut config.providers.pagespeed,
    ] {
        provider.enabled = false;
        provider.base_url = Some(base.to_string());
        provider.timeout_secs = 5;
    }
    config
}

fn analyzer(config: Config) -> Analyzer {
    Analyzer::builder(config)
        .cache(Arc::new(MemoryCache::new()))
        .tls_probe(Arc::new(FixedProbe))
        .build()
        .expect("Failed to build analyzer")
}

async fn serve_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

fn options(value: serde_json::Value) -> AnalysisOptions {
    AnalysisOptions::from_map(value.as_object().expect("options must be an object"))
        .expect("Failed to read options")
}

#[tokio::test]
async fn test_example_page() {
    let server = MockServer::start().await;
    serve_page(&server, "/", EXAMPLE_PAGE).await;
    let analyzer = analyzer(test_config(&server.uri()));

    let result = analyzer
        .analyze(&format!("{}/", server.uri()), &AnalysisOptions::quick())
        .await
        .unwrap();

    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    let metadata = result.metadata.unwrap();
    assert_eq!(metadata.title.as_deref(), Some("Home"));
    assert!(metadata.description.is_none());

    let contact = result.contact.unwrap();
    assert_eq!(contact.emails, vec!["info@example.com"]);
    assert_eq!(contact.phones[0].formatted, "(415) 555-1234");

    // quick profile skips feed discovery
    assert!(result.feeds.is_none());
    assert!(result.intelligence.is_empty());
}

#[tokio::test]
async fn test_feeds_resolve_against_page_url() {
    let server = MockServer::start().await;
    serve_page(&server, "/", EXAMPLE_PAGE).await;
    let analyzer = analyzer(test_config(&server.uri()));

    let result = analyzer
        .analyze(
            &format!("{}/", server.uri()),
            &options(serde_json::json!({
                "include_intelligence_ssl": false,
                "include_intelligence_reputation": false,
                "include_intelligence_technology": false,
                "include_intelligence_performance": false
            })),
        )
        .await
        .unwrap();

    assert_eq!(result.feeds, Some(vec![format!("{}/feed.xml", server.uri())]));
    assert_eq!(result.feed_details.as_ref().map(|feeds| feeds.len()), Some(1));
    assert!(result.score_for(site_audit::ScoreCategory::Feeds).is_some());
}

#[tokio::test]
async fn test_social_profiles_from_anchors_and_structured_data() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/",
        r#"<html><head><title>Acme</title>
        <script type="application/ld+json">
        {"@type":"Organization","sameAs":["https://twitter.com/acme","https://facebook.com/acme"]}
        </script></head>
        <body><a href="https://facebook.com/acme">Facebook</a></body></html>"#,
    )
    .await;
    let analyzer = analyzer(test_config(&server.uri()));

    let result = analyzer
        .analyze(&format!("{}/", server.uri()), &AnalysisOptions::quick())
        .await
        .unwrap();

    let social = result.social.unwrap();
    assert_eq!(social.profiles.len(), 2);
    assert_eq!(social.get("facebook").unwrap().username, "acme");
    assert_eq!(social.get("twitter").unwrap().username, "acme");
}

#[tokio::test]
async fn test_invalid_url_is_rejected() {
    let analyzer = analyzer(test_config("http://127.0.0.1:1"));

    for url in ["not a url", "ftp://example.com/", "https://"] {
        let err = analyzer
            .analyze(url, &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidInput(_)), "{} gave {:?}", url, err);
    }
}

#[tokio::test]
async fn test_fetch_failure_yields_zero_report_and_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let analyzer = analyzer(test_config(&server.uri()));

    let (result, source) = analyzer
        .analyze_with_source(&format!("{}/missing", server.uri()), &AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(source, ResultSource::Fresh);
    assert_eq!(result.overall_score, 0);
    assert_eq!(result.overall_grade.as_str(), "F");
    assert!(result.component_scores.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, "fetch");
    assert!(result.errors[0].message.contains("404"));
    assert_eq!(analyzer.cache().len().unwrap(), 0);
}

#[tokio::test]
async fn test_empty_body_is_a_fetch_failure() {
    let server = MockServer::start().await;
    serve_page(&server, "/", "  \n").await;
    let analyzer = analyzer(test_config(&server.uri()));

    let result = analyzer
        .analyze(&format!("{}/", server.uri()), &AnalysisOptions::quick())
        .await
        .unwrap();
    assert_eq!(result.errors[0].category, "fetch");
    assert!(result.metadata.is_none());
}

#[tokio::test]
async fn test_second_call_returns_identical_cached_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXAMPLE_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    let analyzer = analyzer(test_config(&server.uri()));
    let url = format!("{}/", server.uri());
    let quick = AnalysisOptions::quick();

    let first = analyzer.analyze_json(&url, &quick).await.unwrap();
    let second = analyzer.analyze_json(&url, &quick).await.unwrap();
    assert_eq!(first, second);

    let (_, source) = analyzer.analyze_with_source(&url, &quick).await.unwrap();
    assert_eq!(source, ResultSource::Cache);
}

#[tokio::test]
async fn test_different_options_miss_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXAMPLE_PAGE))
        .expect(2)
        .mount(&server)
        .await;
    let analyzer = analyzer(test_config(&server.uri()));
    let url = format!("{}/", server.uri());

    let quick = AnalysisOptions::quick();
    let with_feeds = AnalysisOptions {
        include_feeds: true,
        ..quick
    };

    let (_, first) = analyzer.analyze_with_source(&url, &quick).await.unwrap();
    let (result, second) = analyzer.analyze_with_source(&url, &with_feeds).await.unwrap();
    assert_eq!(first, ResultSource::Fresh);
    assert_eq!(second, ResultSource::Fresh);
    assert!(result.feeds.is_some());
}

#[tokio::test]
async fn test_no_cache_option_bypasses_the_store() {
    let server = MockServer::start().await;
    serve_page(&server, "/", EXAMPLE_PAGE).await;
    let analyzer = analyzer(test_config(&server.uri()));

    let uncached = AnalysisOptions {
        use_cache: false,
        ..AnalysisOptions::quick()
    };
    analyzer
        .analyze(&format!("{}/", server.uri()), &uncached)
        .await
        .unwrap();
    assert_eq!(analyzer.cache().len().unwrap(), 0);
}

#[tokio::test]
async fn test_stale_result_served_when_page_goes_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EXAMPLE_PAGE))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let analyzer = analyzer(test_config(&server.uri()));
    let url = format!("{}/", server.uri());

    // expires immediately, but stays readable as a stale entry
    let short_lived = AnalysisOptions {
        cache_duration: Some(Duration::ZERO),
        ..AnalysisOptions::quick()
    };
    let (fresh, source) = analyzer.analyze_with_source(&url, &short_lived).await.unwrap();
    assert_eq!(source, ResultSource::Fresh);

    let (stale, source) = analyzer.analyze_with_source(&url, &short_lived).await.unwrap();
    assert_eq!(source, ResultSource::Stale);
    assert_eq!(stale.overall_score, fresh.overall_score);
    assert!(stale.errors.is_empty());
}

#[tokio::test]
async fn test_disabled_ssl_and_rate_limited_reputation() {
    let server = MockServer::start().await;
    serve_page(&server, "/", EXAMPLE_PAGE).await;

    let mut config = test_config(&server.uri());
    config.providers.safe_browsing.enabled = true;
    config.providers.safe_browsing.api_key = Some("test-key".to_string());
    config.providers.safe_browsing.rate_limit = 1;
    let analyzer = analyzer(config);

    // use up the only call in the window
    assert!(analyzer
        .intelligence()
        .rate_limiter()
        .try_acquire(SAFE_BROWSING, 1, Duration::from_secs(60)));

    let result = analyzer
        .analyze(
            &format!("{}/", server.uri()),
            &options(serde_json::json!({"include_intelligence_ssl": false})),
        )
        .await
        .unwrap();

    assert!(result.intelligence.ssl.is_none());
    let reputation = result.intelligence.reputation.as_ref().unwrap();
    assert!(reputation.error.as_ref().unwrap().contains("rate limit"));
    assert!(reputation.risk_score.is_none());

    assert!(!result.component_scores.contains_key("ssl"));
    assert!(!result.component_scores.contains_key("reputation"));
    assert!(result.component_scores.contains_key("metadata"));
    assert!(result.component_scores.contains_key("technology"));

    let weight_sum: f64 = result.components.iter().map(|c| c.weight).sum();
    assert!((weight_sum - 1.0).abs() < 1e-9);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, "reputation");

    // results with errors are not cached
    let (_, source) = analyzer
        .analyze_with_source(
            &format!("{}/", server.uri()),
            &options(serde_json::json!({"include_intelligence_ssl": false})),
        )
        .await
        .unwrap();
    assert_eq!(source, ResultSource::Fresh);
}

#[tokio::test]
async fn test_full_analysis_with_local_intelligence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html lang="en"><head><title>Acme Widgets and Gadgets for Every Home</title>
                    <meta name="generator" content="WordPress 6.4">
                    <link rel="stylesheet" href="/wp-content/themes/acme/style.css"></head>
                    <body><a href="mailto:sales@acme.test">Sales</a></body></html>"#,
                )
                .insert_header("strict-transport-security", "max-age=31536000"),
        )
        .mount(&server)
        .await;
    let analyzer = analyzer(test_config(&server.uri()));

    let result: AnalysisResult = analyzer
        .analyze(&format!("{}/", server.uri()), &AnalysisOptions::default())
        .await
        .unwrap();

    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);

    let ssl = result.intelligence.ssl.as_ref().unwrap();
    assert!(ssl.valid);
    assert_eq!(ssl.provider, "tls-handshake");

    let technology = result.intelligence.technology.as_ref().unwrap();
    assert!(technology.technologies.iter().any(|t| t.name == "WordPress"));
    assert_eq!(technology.security_headers.get("strict-transport-security"), Some(&true));

    let performance = result.intelligence.performance.as_ref().unwrap();
    assert_eq!(performance.provider, "response-time");

    // no reputation provider is configured
    assert!(result.intelligence.reputation.is_none());

    for category in ["metadata", "contact", "ssl", "technology", "performance"] {
        assert!(result.component_scores.contains_key(category), "missing {}", category);
    }
    assert!(result.overall_score <= 100);

    // recommendations come highest priority first
    let priorities: Vec<_> = result.recommendations.iter().map(|r| r.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(priorities, sorted);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("intelligence").is_some());
}
