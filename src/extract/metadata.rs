//! Page metadata: title, description, canonical URL, social cards and friends

use crate::extract::document::{collapse_whitespace, PageDocument};
use crate::extract::feeds::discover_feeds;
use crate::extract::structured::schema_types;
use crate::extract::{selector, ExtractionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata declared by a page
///
/// Fields the page does not declare stay empty. The analyzer may backfill a
/// few of them from configured defaults afterwards; those are listed in
/// `fallback_fields`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    pub canonical_url: Option<String>,

    /// `og:*` properties keyed without the prefix
    pub open_graph: BTreeMap<String, String>,

    /// `twitter:*` card fields keyed without the prefix
    pub twitter: BTreeMap<String, String>,

    pub robots: Option<String>,

    /// False when the robots directives contain `noindex`
    pub indexable: bool,

    pub language: Option<String>,
    pub charset: Option<String>,
    pub viewport: Option<String>,
    pub author: Option<String>,
    pub generator: Option<String>,

    /// Declared icon, or the conventional `/favicon.ico` reference
    pub favicon: Option<String>,
    pub favicon_declared: bool,

    pub h1: Option<String>,
    pub feed_links: Vec<String>,
    pub schema_types: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_fields: Vec<String>,
}

impl MetadataRecord {
    /// True when the page declared anything worth scoring
    pub fn has_data(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.canonical_url.is_some()
            || !self.open_graph.is_empty()
            || !self.twitter.is_empty()
            || self.language.is_some()
    }
}

/// `<meta>` values keyed by lowercased `name`, `property` or `http-equiv`
struct MetaTags(BTreeMap<String, String>);

impl MetaTags {
    fn collect(document: &PageDocument) -> Result<Self, ExtractionError> {
        let meta_selector = selector("meta")?;
        let mut tags = BTreeMap::new();

        for meta in document.select(&meta_selector) {
            let element = meta.value();
            let Some(content) = element.attr("content").map(collapse_whitespace) else {
                continue;
            };
            if content.is_empty() {
                continue;
            }

            let keys = [
                element.attr("name").map(str::to_string),
                element.attr("property").map(str::to_string),
                element.attr("http-equiv").map(|v| format!("http-equiv:{}", v)),
            ];
            for key in keys.into_iter().flatten() {
                tags.entry(key.trim().to_ascii_lowercase())
                    .or_insert_with(|| content.clone());
            }
        }
        Ok(Self(tags))
    }

    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), value.clone()))
            })
            .collect()
    }
}

/// Extracts page metadata
pub fn extract_metadata(document: &PageDocument) -> Result<MetadataRecord, ExtractionError> {
    let meta = MetaTags::collect(document)?;

    let robots = meta.get("robots");
    let indexable = !robots
        .as_deref()
        .is_some_and(|r| r.to_ascii_lowercase().contains("noindex"));

    let keywords: Vec<String> = meta
        .get("keywords")
        .map(|k| {
            k.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let canonical_url = document
        .first_attr(r#"link[rel="canonical"]"#, "href")?
        .and_then(|href| document.resolve(&href))
        .map(|url| url.to_string());

    let language = document
        .first_attr("html[lang]", "lang")?
        .or_else(|| meta.get("http-equiv:content-language"));

    let charset = document
        .first_attr("meta[charset]", "charset")?
        .or_else(|| {
            meta.get("http-equiv:content-type")
                .and_then(|ct| charset_from_content_type(&ct))
        });

    let declared_icon = document
        .first_attr(r#"link[rel~="icon"]"#, "href")?
        .and_then(|href| document.resolve(&href));
    let favicon_declared = declared_icon.is_some();
    let favicon = declared_icon
        .or_else(|| document.url().join("/favicon.ico").ok())
        .map(|url| url.to_string());

    let feed_links: Vec<String> = discover_feeds(document)?
        .iter()
        .map(|feed| feed.url.clone())
        .collect();

    Ok(MetadataRecord {
        title: document.first_text("title")?,
        description: meta.get("description"),
        keywords,
        canonical_url,
        open_graph: meta.with_prefix("og:"),
        twitter: meta.with_prefix("twitter:"),
        robots,
        indexable,
        language,
        charset,
        viewport: meta.get("viewport"),
        author: meta.get("author"),
        generator: meta.get("generator"),
        favicon,
        favicon_declared,
        h1: document.first_text("h1")?,
        feed_links,
        schema_types: schema_types(document.json_ld()),
        fallback_fields: Vec::new(),
    })
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn metadata(html: &str) -> MetadataRecord {
        let doc = PageDocument::parse(html, &Url::parse("https://example.com/about").unwrap());
        extract_metadata(&doc).unwrap()
    }

    #[test]
    fn test_full_head() {
        let record = metadata(
            r#"<html lang="en-US"><head>
            <meta charset="utf-8">
            <title>  Acme   Widgets </title>
            <meta name="Description" content="We make widgets.">
            <meta name="keywords" content="widgets, gadgets, ,tools">
            <meta name="viewport" content="width=device-width">
            <meta name="generator" content="WordPress 6.4">
            <link rel="canonical" href="/about/">
            <meta property="og:title" content="Acme">
            <meta property="og:image" content="https://example.com/og.png">
            <meta name="twitter:card" content="summary">
            <link rel="shortcut icon" href="/static/icon.png">
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            <script type="application/ld+json">{"@type":"Organization"}</script>
            </head><body><h1>Widgets</h1></body></html>"#,
        );

        assert_eq!(record.title.as_deref(), Some("Acme Widgets"));
        assert_eq!(record.description.as_deref(), Some("We make widgets."));
        assert_eq!(record.keywords, vec!["widgets", "gadgets", "tools"]);
        assert_eq!(record.canonical_url.as_deref(), Some("https://example.com/about/"));
        assert_eq!(record.open_graph.get("title").map(String::as_str), Some("Acme"));
        assert_eq!(record.open_graph.len(), 2);
        assert_eq!(record.twitter.get("card").map(String::as_str), Some("summary"));
        assert_eq!(record.language.as_deref(), Some("en-US"));
        assert_eq!(record.charset.as_deref(), Some("utf-8"));
        assert_eq!(record.generator.as_deref(), Some("WordPress 6.4"));
        assert_eq!(record.favicon.as_deref(), Some("https://example.com/static/icon.png"));
        assert!(record.favicon_declared);
        assert_eq!(record.h1.as_deref(), Some("Widgets"));
        assert_eq!(record.feed_links, vec!["https://example.com/feed.xml"]);
        assert_eq!(record.schema_types, vec!["Organization"]);
        assert!(record.indexable);
        assert!(record.has_data());
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let record = metadata("<html><body><p>Just text</p></body></html>");
        assert!(record.title.is_none());
        assert!(record.description.is_none());
        assert!(record.open_graph.is_empty());
        assert!(!record.favicon_declared);
        assert_eq!(record.favicon.as_deref(), Some("https://example.com/favicon.ico"));
        assert!(!record.has_data());
    }

    #[test]
    fn test_robots_noindex() {
        let record = metadata(r#"<meta name="robots" content="NOINDEX, follow">"#);
        assert_eq!(record.robots.as_deref(), Some("NOINDEX, follow"));
        assert!(!record.indexable);
    }

    #[test]
    fn test_charset_from_http_equiv() {
        let record = metadata(
            r#"<meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-1">"#,
        );
        assert_eq!(record.charset.as_deref(), Some("ISO-8859-1"));
    }
}
