//! Syndication feed discovery

use crate::extract::document::{collapse_whitespace, PageDocument};
use crate::extract::{selector, ExtractionError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Rss,
    Atom,
    Json,
}

impl FeedKind {
    /// Maps a `<link type>` MIME type onto a feed kind
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/rss+xml" | "application/rdf+xml" => Some(FeedKind::Rss),
            "application/atom+xml" => Some(FeedKind::Atom),
            "application/feed+json" => Some(FeedKind::Json),
            _ => None,
        }
    }
}

/// A discovered feed reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedLink {
    /// Absolute URL, resolved against the page's base URL
    pub url: String,
    pub kind: FeedKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Feeds declared by a page, de-duplicated by absolute URL
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedRecord(pub Vec<FeedLink>);

impl FeedRecord {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeedLink> {
        self.0.iter()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.0.iter().map(|feed| feed.url.as_str()).collect()
    }
}

/// Scans `<link>` tags with feed MIME types
pub fn discover_feeds(document: &PageDocument) -> Result<FeedRecord, ExtractionError> {
    let link_selector = selector("link[href][type]")?;

    let mut seen = HashSet::new();
    let mut feeds = Vec::new();

    for link in document.select(&link_selector) {
        let element = link.value();
        let Some(kind) = element.attr("type").and_then(FeedKind::from_mime) else {
            continue;
        };
        let Some(url) = element.attr("href").and_then(|href| document.resolve(href)) else {
            continue;
        };

        let url = url.to_string();
        if !seen.insert(url.clone()) {
            continue;
        }

        let title = element
            .attr("title")
            .map(collapse_whitespace)
            .filter(|title| !title.is_empty());
        feeds.push(FeedLink { url, kind, title });
    }

    Ok(FeedRecord(feeds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn feeds(html: &str) -> FeedRecord {
        let doc = PageDocument::parse(html, &Url::parse("https://example.com/blog/").unwrap());
        discover_feeds(&doc).unwrap()
    }

    #[test]
    fn test_relative_feed_is_resolved() {
        let record = feeds(r#"<link type="application/rss+xml" href="/feed.xml">"#);
        assert_eq!(record.urls(), vec!["https://example.com/feed.xml"]);
        assert_eq!(record.0[0].kind, FeedKind::Rss);
    }

    #[test]
    fn test_kinds_titles_and_duplicates() {
        let record = feeds(
            r#"<link rel="alternate" type="application/atom+xml" title=" Posts " href="atom.xml">
            <link rel="alternate" type="Application/RSS+XML; charset=utf-8" href="https://example.com/blog/atom.xml">
            <link rel="alternate" type="application/feed+json" href="feed.json">
            <link rel="stylesheet" type="text/css" href="style.css">"#,
        );
        assert_eq!(record.len(), 2);
        assert_eq!(record.0[0].kind, FeedKind::Atom);
        assert_eq!(record.0[0].title.as_deref(), Some("Posts"));
        assert_eq!(record.0[1].url, "https://example.com/blog/feed.json");
        assert_eq!(record.0[1].kind, FeedKind::Json);
    }

    #[test]
    fn test_unresolvable_href_is_skipped() {
        let record = feeds(r#"<link type="application/rss+xml" href="javascript:void(0)">"#);
        assert!(record.is_empty());
    }

    #[test]
    fn test_serializes_as_list() {
        let record = feeds(r#"<link type="application/rss+xml" href="/feed.xml">"#);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"url": "https://example.com/feed.xml", "kind": "rss"}])
        );
    }
}
