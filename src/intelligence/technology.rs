//! Technology stack and security header audit
//!
//! Fingerprints run locally over the fetched page and its response headers.
//! BuiltWith, when a key is configured, adds what it knows; its failure only
//! leaves a warning.

use crate::extract::ExtractionError;
use crate::fetch::{FetchRequest, HttpResponse};
use crate::intelligence::{decode_response, IntelligenceGateway, PageContext, ProviderError};
use crate::url::bare_domain;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const BUILTWITH: &str = "builtwith";
pub const FINGERPRINTS: &str = "fingerprints";
const BUILTWITH_DEFAULT_BASE: &str = "https://api.builtwith.com";

/// Response headers audited for presence
pub const SECURITY_HEADERS: [&str; 6] = [
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
];

/// A detected technology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Where the evidence came from: `html`, `header`, `meta` or `builtwith`
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TechnologyRecord {
    pub technologies: Vec<Technology>,
    /// Presence of each audited security header
    pub security_headers: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub providers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TechnologyRecord {
    /// Local detection only
    pub fn from_page(page: PageContext<'_>) -> Self {
        let mut record = Self {
            security_headers: audit_security_headers(page.response),
            server: page.response.header("server").map(str::to_string),
            providers: vec![FINGERPRINTS.to_string()],
            ..Self::default()
        };
        match fingerprint(page.response) {
            Ok(found) => found.into_iter().for_each(|tech| record.merge(tech)),
            Err(e) => record.warnings.push(e.to_string()),
        }
        record
    }

    /// Adds a technology; a later sighting only fills in a missing version
    pub fn merge(&mut self, tech: Technology) {
        match self
            .technologies
            .iter_mut()
            .find(|known| known.name.eq_ignore_ascii_case(&tech.name))
        {
            Some(known) => {
                if known.version.is_none() {
                    known.version = tech.version;
                }
            }
            None => self.technologies.push(tech),
        }
    }

    pub fn missing_security_headers(&self) -> Vec<&'static str> {
        SECURITY_HEADERS
            .iter()
            .copied()
            .filter(|h| !self.security_headers.get(*h).copied().unwrap_or(false))
            .collect()
    }
}

/// Where a fingerprint looks
#[derive(Debug, Clone, Copy)]
enum Evidence {
    Html,
    Header(&'static str),
    Generator,
}

struct Fingerprint {
    name: &'static str,
    category: &'static str,
    evidence: Evidence,
    /// Capture group 1, when present, is the version
    regex: Regex,
}

const FINGERPRINT_TABLE: &[(&str, &str, Evidence, &str)] = &[
    ("WordPress", "cms", Evidence::Html, r"/wp-(?:content|includes)/"),
    ("WordPress", "cms", Evidence::Generator, r"WordPress\s*([\d.]+)?"),
    ("Drupal", "cms", Evidence::Html, r"Drupal\.settings|/sites/default/files/"),
    ("Drupal", "cms", Evidence::Header("x-generator"), r"Drupal\s*(\d+)?"),
    ("Joomla", "cms", Evidence::Generator, r"Joomla!?\s*([\d.]+)?"),
    ("Ghost", "cms", Evidence::Generator, r"Ghost\s*([\d.]+)?"),
    ("Shopify", "ecommerce", Evidence::Html, r"cdn\.shopify\.com|Shopify\.theme"),
    ("Wix", "site-builder", Evidence::Html, r"static\.wixstatic\.com"),
    ("Squarespace", "site-builder", Evidence::Html, r"static1\.squarespace\.com"),
    ("Next.js", "framework", Evidence::Html, r"__NEXT_DATA__|/_next/static/"),
    ("Next.js", "framework", Evidence::Header("x-powered-by"), r"Next\.js\s*([\d.]+)?"),
    ("React", "javascript", Evidence::Html, r"data-reactroot|react(?:-dom)?(?:\.production)?(?:\.min)?\.js"),
    ("Vue.js", "javascript", Evidence::Html, r#"data-v-[0-9a-f]{8}|vue(?:\.runtime)?(?:\.min)?\.js"#),
    ("Angular", "javascript", Evidence::Html, r#"ng-version="([\d.]+)""#),
    ("jQuery", "javascript", Evidence::Html, r"jquery[.-]?(\d+\.\d+(?:\.\d+)?)?(?:\.min)?\.js"),
    ("Bootstrap", "ui", Evidence::Html, r"bootstrap(?:\.bundle)?(?:\.min)?\.(?:css|js)"),
    ("Google Analytics", "analytics", Evidence::Html, r"google-analytics\.com/(?:ga|analytics)\.js|googletagmanager\.com/gtag/js"),
    ("Google Tag Manager", "analytics", Evidence::Html, r"googletagmanager\.com/gtm\.js"),
    ("Cloudflare", "cdn", Evidence::Header("server"), r"cloudflare"),
    ("Cloudflare", "cdn", Evidence::Header("cf-ray"), r"."),
    ("Amazon CloudFront", "cdn", Evidence::Header("x-amz-cf-id"), r"."),
    ("Vercel", "hosting", Evidence::Header("server"), r"Vercel"),
    ("Nginx", "web-server", Evidence::Header("server"), r"nginx(?:/([\d.]+))?"),
    ("Apache", "web-server", Evidence::Header("server"), r"Apache(?:/([\d.]+))?"),
    ("PHP", "language", Evidence::Header("x-powered-by"), r"PHP(?:/([\d.]+))?"),
    ("Express", "framework", Evidence::Header("x-powered-by"), r"Express"),
    ("ASP.NET", "framework", Evidence::Header("x-powered-by"), r"ASP\.NET"),
];

static FINGERPRINTS_COMPILED: LazyLock<Result<Vec<Fingerprint>, ExtractionError>> =
    LazyLock::new(|| {
        FINGERPRINT_TABLE
            .iter()
            .map(|(name, category, evidence, pattern)| {
                Ok(Fingerprint {
                    name: *name,
                    category: *category,
                    evidence: *evidence,
                    regex: Regex::new(&format!("(?i){}", pattern)).map_err(|e| {
                        ExtractionError::InvalidPattern {
                            pattern: pattern.to_string(),
                            message: e.to_string(),
                        }
                    })?,
                })
            })
            .collect()
    });

static GENERATOR: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name=["']generator["'][^>]*content=["']([^"']+)["']"#).ok()
});

fn fingerprint(response: &HttpResponse) -> Result<Vec<Technology>, ExtractionError> {
    let fingerprints = FINGERPRINTS_COMPILED.as_ref().map_err(Clone::clone)?;
    let html = response.text();
    let generator = GENERATOR
        .as_ref()
        .and_then(|re| re.captures(&html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let mut found = Vec::new();
    for print in fingerprints {
        let (haystack, source) = match print.evidence {
            Evidence::Html => (Some(html.as_str()), "html"),
            Evidence::Header(name) => (response.header(name), "header"),
            Evidence::Generator => (generator.as_deref(), "meta"),
        };
        let Some(caps) = haystack.and_then(|text| print.regex.captures(text)) else {
            continue;
        };
        found.push(Technology {
            name: print.name.to_string(),
            category: print.category.to_string(),
            version: caps.get(1).map(|m| m.as_str().to_string()),
            source: source.to_string(),
        });
    }
    Ok(found)
}

pub fn audit_security_headers(response: &HttpResponse) -> BTreeMap<String, bool> {
    SECURITY_HEADERS
        .iter()
        .map(|name| {
            let present = response
                .header(name)
                .is_some_and(|value| !value.trim().is_empty());
            (name.to_string(), present)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BuiltWithResponse {
    #[serde(default)]
    results: Vec<BuiltWithResult>,
    #[serde(default)]
    errors: Vec<BuiltWithError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BuiltWithResult {
    result: BuiltWithPaths,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BuiltWithPaths {
    #[serde(default)]
    paths: Vec<BuiltWithPath>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BuiltWithPath {
    #[serde(default)]
    technologies: Vec<BuiltWithTechnology>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BuiltWithTechnology {
    name: String,
    #[serde(default)]
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BuiltWithError {
    #[serde(default)]
    message: String,
}

impl IntelligenceGateway {
    pub(crate) async fn analyze_technology(&self, page: PageContext<'_>) -> TechnologyRecord {
        let mut record = TechnologyRecord::from_page(page);

        let Some(host) = bare_domain(page.url) else {
            return record;
        };
        match self.builtwith(&host).await {
            Ok(technologies) => {
                record.providers.push(BUILTWITH.to_string());
                technologies.into_iter().for_each(|tech| record.merge(tech));
            }
            Err(e) if e.is_unconfigured() => {}
            Err(e) => {
                tracing::debug!("BuiltWith lookup failed: {}", e);
                record.warnings.push(e.to_string());
            }
        }

        tracing::debug!(
            "Detected {} technologies on {}",
            record.technologies.len(),
            host
        );
        record
    }

    async fn builtwith(&self, domain: &str) -> Result<Vec<Technology>, ProviderError> {
        let config = &self.providers.builtwith;
        if !config.enabled {
            return Err(ProviderError::Disabled(BUILTWITH.to_string()));
        }
        let key = config
            .api_key()
            .ok_or_else(|| ProviderError::MissingApiKey(BUILTWITH.to_string()))?;
        let endpoint = format!(
            "{}/v21/api.json?KEY={}&LOOKUP={}",
            config.base_url(BUILTWITH_DEFAULT_BASE),
            key,
            domain
        );

        self.call_provider(BUILTWITH, config, domain, async {
            let result = self
                .fetcher
                .get(&endpoint, &FetchRequest::new(config.timeout()))
                .await;
            let response: BuiltWithResponse = decode_response(BUILTWITH, result)?;
            if let Some(error) = response.errors.first() {
                return Err(ProviderError::InvalidResponse {
                    provider: BUILTWITH.to_string(),
                    message: error.message.clone(),
                });
            }
            Ok(response
                .results
                .into_iter()
                .flat_map(|r| r.result.paths)
                .flat_map(|p| p.technologies)
                .map(|t| Technology {
                    name: t.name,
                    category: t.tag.unwrap_or_else(|| "other".to_string()).to_lowercase(),
                    version: None,
                    source: BUILTWITH.to_string(),
                })
                .collect())
        })
        .await
    }
}
