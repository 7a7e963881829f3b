//! The analysis report handed back to callers
//!
//! Field names and nesting are consumed by downstream renderers, so they stay
//! stable: `metadata`, `contact`, `social`, `feeds` (a list of absolute URLs),
//! `intelligence` (also read as `api_analysis`), `component_scores`,
//! `overall_score`, `overall_grade`, `recommendations`, `errors`.

use crate::extract::{ContactRecord, FeedRecord, MetadataRecord, SocialRecord};
use crate::intelligence::IntelligenceRecord;
use crate::scoring::{Grade, Recommendation, ScoreCategory, ScoreComponent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a returned result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Computed by this call
    Fresh,
    /// Unexpired cache entry
    Cache,
    /// Expired cache entry served because the page could not be fetched
    Stale,
}

/// Category-local failure classes recorded in [`AnalysisResult::errors`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FetchFailure,
    ExtractionFailure,
    ProviderUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::FetchFailure => "fetch failure",
            ErrorKind::ExtractionFailure => "extraction failure",
            ErrorKind::ProviderUnavailable => "provider unavailable",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// `fetch` or a [`ScoreCategory`] name
    pub category: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorEntry {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self {
            category: "fetch".to_string(),
            kind: ErrorKind::FetchFailure,
            message: message.into(),
        }
    }

    pub fn extraction(category: ScoreCategory, message: impl Into<String>) -> Self {
        Self {
            category: category.as_str().to_string(),
            kind: ErrorKind::ExtractionFailure,
            message: message.into(),
        }
    }

    pub fn provider(category: ScoreCategory, message: impl Into<String>) -> Self {
        Self {
            category: category.as_str().to_string(),
            kind: ErrorKind::ProviderUnavailable,
            message: message.into(),
        }
    }
}

/// Everything one analysis produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// URL as requested
    pub url: String,
    pub normalized_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social: Option<SocialRecord>,
    /// Absolute feed URLs in discovery order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeds: Option<Vec<String>>,
    /// Kind and title of each feed in `feeds`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_details: Option<FeedRecord>,

    #[serde(default, alias = "api_analysis", skip_serializing_if = "IntelligenceRecord::is_empty")]
    pub intelligence: IntelligenceRecord,

    /// Scores of the categories that produced data, keyed by category name
    pub component_scores: BTreeMap<String, u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ScoreComponent>,
    pub overall_score: u8,
    pub overall_grade: Grade,

    /// Highest priority first
    pub recommendations: Vec<Recommendation>,
    pub errors: Vec<ErrorEntry>,

    pub analysis_time_ms: u64,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// An unscored result for `url`
    pub fn new(url: &str, normalized_url: &str, grade: Grade) -> Self {
        Self {
            url: url.to_string(),
            normalized_url: normalized_url.to_string(),
            metadata: None,
            contact: None,
            social: None,
            feeds: None,
            feed_details: None,
            intelligence: IntelligenceRecord::default(),
            component_scores: BTreeMap::new(),
            components: Vec::new(),
            overall_score: 0,
            overall_grade: grade,
            recommendations: Vec::new(),
            errors: Vec::new(),
            analysis_time_ms: 0,
            analyzed_at: Utc::now(),
        }
    }

    /// Stores discovered feeds as the URL list plus their details
    pub fn set_feeds(&mut self, feeds: FeedRecord) {
        self.feeds = Some(feeds.urls().into_iter().map(str::to_string).collect());
        self.feed_details = Some(feeds);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn score_for(&self, category: ScoreCategory) -> Option<u8> {
        self.component_scores.get(category.as_str()).copied()
    }

    /// Errors recorded against one category
    pub fn errors_for<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a ErrorEntry> {
        self.errors.iter().filter(move |e| e.category == category)
    }
}
