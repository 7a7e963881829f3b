//! Parsed view of the fetched page shared by every extractor

use crate::extract::structured::collect_json_ld;
use crate::extract::{selector, ExtractionError};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

/// Elements whose text is never visible to a reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A fetched HTML page, parsed once and read by all extractors
///
/// Parsing is lenient: html5ever recovers from unclosed tags, stray markup and
/// replacement characters, so construction never fails.
pub struct PageDocument {
    url: Url,
    base_url: Url,
    html: Html,
    text: String,
    json_ld: Vec<Value>,
}

impl PageDocument {
    /// Parses `html` as the document found at `url`
    pub fn parse(html: &str, url: &Url) -> Self {
        let document = Html::parse_document(html);
        let base_url = declared_base(&document, url).unwrap_or_else(|| url.clone());
        let text = visible_text(&document);
        let json_ld = collect_json_ld(&document);

        Self {
            url: url.clone(),
            base_url,
            html: document,
            text,
            json_ld,
        }
    }

    /// The URL the document was fetched from (after redirects)
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL relative references resolve against (`<base href>` aware)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Visible text content, whitespace-collapsed
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed JSON-LD blocks, with arrays and `@graph` containers flattened
    pub fn json_ld(&self) -> &[Value] {
        &self.json_ld
    }

    /// Selects elements with a CSS selector
    pub fn select<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> {
        self.html.select(selector)
    }

    /// Returns the first non-empty attribute value matched by `css`
    pub fn first_attr(&self, css: &str, attr: &str) -> Result<Option<String>, ExtractionError> {
        let selector = selector(css)?;
        Ok(self
            .html
            .select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string))
    }

    /// Returns the trimmed text of the first element matched by `css` with any text
    pub fn first_text(&self, css: &str) -> Result<Option<String>, ExtractionError> {
        let selector = selector(css)?;
        Ok(self
            .html
            .select(&selector)
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|text| !text.is_empty()))
    }

    /// Resolves a reference against the base URL
    ///
    /// Returns None for empty references, fragments, non-HTTP schemes and
    /// anything that does not resolve to an HTTP(S) URL.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let lowered = href.to_ascii_lowercase();
        if lowered.starts_with("javascript:")
            || lowered.starts_with("mailto:")
            || lowered.starts_with("tel:")
            || lowered.starts_with("data:")
        {
            return None;
        }

        match self.base_url.join(href) {
            Ok(resolved) if resolved.scheme() == "http" || resolved.scheme() == "https" => {
                Some(resolved)
            }
            _ => None,
        }
    }
}

/// Reads `<base href>` when it resolves to an HTTP(S) URL
fn declared_base(document: &Html, url: &Url) -> Option<Url> {
    let base_selector = Selector::parse("base[href]").ok()?;
    let href = document
        .select(&base_selector)
        .next()?
        .value()
        .attr("href")?;
    let resolved = url.join(href.trim()).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Collects text nodes that are not inside script/style-like containers
fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> PageDocument {
        PageDocument::parse(html, &Url::parse("https://example.com/blog/post").unwrap())
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let doc = page(
            r#"<html><head><title>T</title><style>p{color:red}</style></head>
            <body><p>Hello   <b>world</b></p><script>var x = "hidden";</script></body></html>"#,
        );
        assert_eq!(doc.text(), "Hello world");
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let doc = page("<html></html>");
        assert_eq!(
            doc.resolve("/feed.xml").unwrap().as_str(),
            "https://example.com/feed.xml"
        );
        assert_eq!(
            doc.resolve("other").unwrap().as_str(),
            "https://example.com/blog/other"
        );
        assert_eq!(
            doc.resolve("//cdn.example.net/a").unwrap().as_str(),
            "https://cdn.example.net/a"
        );
    }

    #[test]
    fn test_resolve_rejects_non_http() {
        let doc = page("<html></html>");
        assert!(doc.resolve("mailto:a@b.com").is_none());
        assert!(doc.resolve("JavaScript:void(0)").is_none());
        assert!(doc.resolve("#top").is_none());
        assert!(doc.resolve("   ").is_none());
        assert!(doc.resolve("ftp://example.com/file").is_none());
    }

    #[test]
    fn test_base_href_is_honored() {
        let doc = page(r#"<html><head><base href="https://static.example.com/root/"></head></html>"#);
        assert_eq!(
            doc.resolve("feed.xml").unwrap().as_str(),
            "https://static.example.com/root/feed.xml"
        );
    }

    #[test]
    fn test_first_attr_and_text() {
        let doc = page(
            r#"<html><head><meta name="description" content="  "><meta name="description" content="Real"></head>
            <body><h1> </h1><h1>  Main   heading </h1></body></html>"#,
        );
        assert_eq!(
            doc.first_attr("meta[name=description]", "content").unwrap(),
            Some("Real".to_string())
        );
        assert_eq!(
            doc.first_text("h1").unwrap(),
            Some("Main heading".to_string())
        );
    }

    #[test]
    fn test_malformed_markup_does_not_panic() {
        let doc = page("<html><body><div><p>unclosed <a href='/x'>link<table><tr><td>cell");
        assert!(doc.text().contains("unclosed"));
        assert!(doc.text().contains("cell"));
    }
}
