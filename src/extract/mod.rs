//! Extraction engine
//!
//! Every extractor reads the same parsed [`PageDocument`] and produces one
//! category record. Extractors are pure functions of the document: they never
//! touch the network and never fail on malformed markup. A missing field is a
//! valid result (an empty list or `None`), not an error.
//!
//! Field-level extraction is driven by ordered [`PatternSet`]s, so which source
//! wins for a given field (markup, structured data or a free-text heuristic) is
//! declared in one place and can be tested pattern by pattern.

pub mod contact;
pub mod document;
pub mod feeds;
pub mod metadata;
pub mod patterns;
pub mod social;
pub mod structured;

pub use contact::{
    extract_contact, BusinessHours, ContactForm, ContactRecord, PhoneNumber, PostalAddress,
};
pub use document::PageDocument;
pub use feeds::{discover_feeds, FeedKind, FeedLink, FeedRecord};
pub use metadata::{extract_metadata, MetadataRecord};
pub use patterns::{
    Candidate, ExtractionPattern, Matcher, PatternMatch, PatternPriority, PatternSet,
    StaticPatterns,
};
pub use social::{extract_social, match_profile, SocialProfile, SocialRecord};

use scraper::Selector;
use thiserror::Error;
use url::Url;

/// Failures local to one extractor
///
/// These only arise from broken static pattern tables; markup problems never
/// produce an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Compiles a CSS selector, reporting failures as [`ExtractionError`]
pub fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// Which extractors to run over a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorSelection {
    pub metadata: bool,
    pub contact: bool,
    pub social: bool,
    pub feeds: bool,
}

impl Default for ExtractorSelection {
    fn default() -> Self {
        Self {
            metadata: true,
            contact: true,
            social: true,
            feeds: true,
        }
    }
}

/// Per-category extraction outcomes; `None` means the extractor was not selected
#[derive(Debug, Default)]
pub struct ExtractionBundle {
    pub metadata: Option<Result<MetadataRecord, ExtractionError>>,
    pub contact: Option<Result<ContactRecord, ExtractionError>>,
    pub social: Option<Result<SocialRecord, ExtractionError>>,
    pub feeds: Option<Result<FeedRecord, ExtractionError>>,
}

/// Parses `html` once and runs every selected extractor over it
///
/// Each extractor's error stays in its own slot; one failing extractor never
/// prevents the others from running.
pub fn extract_all(html: &str, url: &Url, selection: ExtractorSelection) -> ExtractionBundle {
    let document = PageDocument::parse(html, url);

    let bundle = ExtractionBundle {
        metadata: selection.metadata.then(|| extract_metadata(&document)),
        contact: selection.contact.then(|| extract_contact(&document)),
        social: selection.social.then(|| extract_social(&document)),
        feeds: selection.feeds.then(|| discover_feeds(&document)),
    };

    tracing::debug!(
        "Extracted {} (metadata: {}, contact: {}, social: {}, feeds: {})",
        url,
        outcome(&bundle.metadata),
        outcome(&bundle.contact),
        outcome(&bundle.social),
        outcome(&bundle.feeds)
    );

    bundle
}

fn outcome<T>(slot: &Option<Result<T, ExtractionError>>) -> &'static str {
    match slot {
        None => "skipped",
        Some(Ok(_)) => "ok",
        Some(Err(_)) => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_selector_reports_invalid_css() {
        assert!(selector("a[href]").is_ok());
        let err = selector("a[[").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidSelector { .. }));
    }

    #[test]
    fn test_selection_skips_extractors() {
        let selection = ExtractorSelection {
            feeds: false,
            social: false,
            ..ExtractorSelection::default()
        };
        let bundle = extract_all("<title>Home</title>", &url(), selection);
        assert!(bundle.metadata.is_some());
        assert!(bundle.contact.is_some());
        assert!(bundle.social.is_none());
        assert!(bundle.feeds.is_none());
    }

    #[test]
    fn test_malformed_html_yields_empty_records() {
        let bytes = b"<html><head><title>Bro\xffken<body><div><a href='mailto:'>x<p><table><tr>";
        let html = String::from_utf8_lossy(bytes);
        let bundle = extract_all(&html, &url(), ExtractorSelection::default());

        let contact = bundle.contact.unwrap().unwrap();
        assert!(contact.emails.is_empty());
        assert!(contact.phones.is_empty());

        let social = bundle.social.unwrap().unwrap();
        assert!(social.is_empty());

        let feeds = bundle.feeds.unwrap().unwrap();
        assert!(feeds.is_empty());

        let metadata = bundle.metadata.unwrap().unwrap();
        assert!(metadata.description.is_none());
    }

    #[test]
    fn test_example_page() {
        let html = r#"<html><head><title>Home</title>
            <link type="application/rss+xml" href="/feed.xml"></head>
            <body><a href="mailto:info@example.com">Mail</a>
            <a href="tel:+14155551234">Call</a></body></html>"#;
        let bundle = extract_all(html, &url(), ExtractorSelection::default());

        let metadata = bundle.metadata.unwrap().unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Home"));
        assert!(metadata.description.is_none());

        let contact = bundle.contact.unwrap().unwrap();
        assert_eq!(contact.emails, vec!["info@example.com"]);
        assert_eq!(contact.phones[0].formatted, "(415) 555-1234");

        let feeds = bundle.feeds.unwrap().unwrap();
        assert_eq!(feeds.urls(), vec!["https://example.com/feed.xml"]);
    }
}
