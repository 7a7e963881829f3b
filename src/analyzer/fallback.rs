//! Default texts for pages that lack their own
//!
//! Applied only when the result is assembled, after scoring: a missing title
//! still costs points and still yields a recommendation.

use crate::config::FallbackConfig;
use crate::extract::MetadataRecord;
use crate::url::bare_domain;
use url::Url;

/// Supplies default title, description and image for a page
pub trait FallbackProvider: Send + Sync {
    fn title(&self, url: &Url) -> Option<String>;
    fn description(&self, url: &Url) -> Option<String>;
    fn image(&self, url: &Url) -> Option<String>;

    /// Fills empty fields and lists the backfilled ones in `fallback_fields`
    fn apply(&self, metadata: &mut MetadataRecord, url: &Url) {
        if metadata.title.is_none() {
            if let Some(title) = self.title(url) {
                metadata.title = Some(title);
                metadata.fallback_fields.push("title".to_string());
            }
        }
        if metadata.description.is_none() {
            if let Some(description) = self.description(url) {
                metadata.description = Some(description);
                metadata.fallback_fields.push("description".to_string());
            }
        }
        if !metadata.open_graph.contains_key("image") {
            if let Some(image) = self.image(url) {
                metadata.open_graph.insert("image".to_string(), image);
                metadata.fallback_fields.push("image".to_string());
            }
        }
    }
}

/// Fallbacks from the `[fallback]` configuration table
///
/// Without a configured title the bare domain stands in.
#[derive(Debug, Clone, Default)]
pub struct ConfigFallback {
    config: FallbackConfig,
}

impl ConfigFallback {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }
}

impl FallbackProvider for ConfigFallback {
    fn title(&self, url: &Url) -> Option<String> {
        self.config.title.clone().or_else(|| bare_domain(url))
    }

    fn description(&self, _url: &Url) -> Option<String> {
        self.config.description.clone()
    }

    fn image(&self, url: &Url) -> Option<String> {
        let image = self.config.image.as_deref()?;
        // relative images resolve against the analyzed page
        url.join(image).ok().map(String::from)
    }
}
