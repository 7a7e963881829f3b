//! Scoring and grading engine
//!
//! Each category record is scored independently (0-100), the active
//! categories' weights are renormalized to sum to 1.0, and the weighted mean is
//! rounded and mapped onto a letter grade. A category that produced no data is
//! excluded from both the numerator and the denominator rather than scored as
//! zero.
//!
//! # Example
//!
//! ```
//! use site_audit::config::ScoringConfig;
//! use site_audit::extract::SocialRecord;
//! use site_audit::scoring::{CategoryRecord, ScoringEngine};
//!
//! let engine = ScoringEngine::new(&ScoringConfig::default()).unwrap();
//! let card = engine.score(&[CategoryRecord::Social(SocialRecord::default())]);
//! assert_eq!(card.overall_score, 0);
//! assert!(card.component_scores.is_empty());
//! ```

mod categories;
mod grade;
mod recommendations;
mod weights;

pub use categories::{
    evaluate, score_contact, score_feeds, score_metadata, score_performance, score_reputation,
    score_social, score_ssl, score_technology, CategoryScore,
};
pub use grade::{default_grade_thresholds, Grade, GradeScale};
pub use recommendations::{generate_recommendations, Priority, Recommendation};
pub use weights::{CategoryThresholds, CategoryWeights};

use crate::config::ScoringConfig;
use crate::extract::{ContactRecord, FeedRecord, MetadataRecord, SocialRecord};
use crate::intelligence::IntelligenceRecord;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scored dimension of the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Metadata,
    Contact,
    Social,
    Feeds,
    Ssl,
    Reputation,
    Technology,
    Performance,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 8] = [
        ScoreCategory::Metadata,
        ScoreCategory::Contact,
        ScoreCategory::Social,
        ScoreCategory::Feeds,
        ScoreCategory::Ssl,
        ScoreCategory::Reputation,
        ScoreCategory::Technology,
        ScoreCategory::Performance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreCategory::Metadata => "metadata",
            ScoreCategory::Contact => "contact",
            ScoreCategory::Social => "social",
            ScoreCategory::Feeds => "feeds",
            ScoreCategory::Ssl => "ssl",
            ScoreCategory::Reputation => "reputation",
            ScoreCategory::Technology => "technology",
            ScoreCategory::Performance => "performance",
        }
    }
}

impl fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One category's extraction output, as handed to the scoring engine
#[derive(Debug, Clone)]
pub enum CategoryRecord {
    Metadata(MetadataRecord),
    Contact(ContactRecord),
    Social(SocialRecord),
    Feeds(FeedRecord),
    Intelligence(IntelligenceRecord),
}

/// A category's contribution to the overall score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub category: ScoreCategory,
    /// Weight after renormalization over the active categories
    pub weight: f64,
    /// Weight as configured
    pub configured_weight: f64,
    pub raw_score: u8,
    pub grade: Grade,
}

/// Output of one scoring pass
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub components: Vec<ScoreComponent>,
    pub component_scores: BTreeMap<ScoreCategory, u8>,
    pub overall_score: u8,
    pub overall_grade: Grade,
    /// Every evaluated category, including those without data
    pub evaluated: Vec<CategoryScore>,
}

/// Scores category records under a fixed configuration
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    scale: GradeScale,
}

impl ScoringEngine {
    pub fn new(config: &ScoringConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            scale: GradeScale::from_thresholds(&config.grade_thresholds)?,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn scale(&self) -> &GradeScale {
        &self.scale
    }

    /// Scores every record and folds the results into an overall grade
    pub fn score(&self, records: &[CategoryRecord]) -> Scorecard {
        let evaluated: Vec<CategoryScore> = records
            .iter()
            .flat_map(|record| evaluate(record, &self.config))
            .collect();

        let component_scores: BTreeMap<ScoreCategory, u8> = evaluated
            .iter()
            .filter_map(|entry| entry.score.map(|score| (entry.category, score)))
            .collect();

        let active: Vec<ScoreCategory> = component_scores.keys().copied().collect();
        let normalized = self.config.weights.normalized(&active);

        let weighted: f64 = normalized
            .iter()
            .map(|(category, weight)| weight * f64::from(component_scores[category]))
            .sum();
        let overall_score = weighted.round().clamp(0.0, 100.0) as u8;

        let components = component_scores
            .iter()
            .map(|(category, score)| ScoreComponent {
                category: *category,
                weight: normalized.get(category).copied().unwrap_or(0.0),
                configured_weight: self.config.weights.get(*category),
                raw_score: *score,
                grade: self.scale.grade_for(*score),
            })
            .collect();

        tracing::debug!(
            "Scored {} active categories: overall {} ({})",
            active.len(),
            overall_score,
            self.scale.grade_for(overall_score)
        );

        Scorecard {
            components,
            component_scores,
            overall_score,
            overall_grade: self.scale.grade_for(overall_score),
            evaluated,
        }
    }
}
