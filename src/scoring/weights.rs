//! Category weights and recommendation thresholds

use crate::scoring::ScoreCategory;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Configured weight of each category in the overall score
///
/// Weights need not sum to 1; they are renormalized over the categories that
/// actually produced data.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CategoryWeights {
    pub metadata: f64,
    pub contact: f64,
    pub social: f64,
    pub feeds: f64,
    pub ssl: f64,
    pub reputation: f64,
    pub technology: f64,
    pub performance: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            metadata: 0.30,
            contact: 0.15,
            social: 0.20,
            feeds: 0.10,
            ssl: 0.10,
            reputation: 0.07,
            technology: 0.03,
            performance: 0.05,
        }
    }
}

impl CategoryWeights {
    /// All weights zero
    pub fn zero() -> Self {
        Self {
            metadata: 0.0,
            contact: 0.0,
            social: 0.0,
            feeds: 0.0,
            ssl: 0.0,
            reputation: 0.0,
            technology: 0.0,
            performance: 0.0,
        }
    }

    pub fn get(&self, category: ScoreCategory) -> f64 {
        match category {
            ScoreCategory::Metadata => self.metadata,
            ScoreCategory::Contact => self.contact,
            ScoreCategory::Social => self.social,
            ScoreCategory::Feeds => self.feeds,
            ScoreCategory::Ssl => self.ssl,
            ScoreCategory::Reputation => self.reputation,
            ScoreCategory::Technology => self.technology,
            ScoreCategory::Performance => self.performance,
        }
    }

    /// Renormalizes the weights of `active` so they sum to 1.0
    ///
    /// Categories with a zero weight drop out. Returns an empty map when no
    /// active category carries any weight.
    pub fn normalized(&self, active: &[ScoreCategory]) -> BTreeMap<ScoreCategory, f64> {
        let weighted: Vec<(ScoreCategory, f64)> = active
            .iter()
            .map(|category| (*category, self.get(*category)))
            .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
            .collect();

        let total: f64 = weighted.iter().map(|(_, weight)| weight).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }

        weighted
            .into_iter()
            .map(|(category, weight)| (category, weight / total))
            .collect()
    }
}

/// Per-category score below which recommendations are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CategoryThresholds {
    pub metadata: u8,
    pub contact: u8,
    pub social: u8,
    pub feeds: u8,
    pub ssl: u8,
    pub reputation: u8,
    pub technology: u8,
    pub performance: u8,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            metadata: 80,
            contact: 70,
            social: 60,
            feeds: 50,
            ssl: 90,
            reputation: 90,
            technology: 60,
            performance: 70,
        }
    }
}

impl CategoryThresholds {
    pub fn get(&self, category: ScoreCategory) -> u8 {
        match category {
            ScoreCategory::Metadata => self.metadata,
            ScoreCategory::Contact => self.contact,
            ScoreCategory::Social => self.social,
            ScoreCategory::Feeds => self.feeds,
            ScoreCategory::Ssl => self.ssl,
            ScoreCategory::Reputation => self.reputation,
            ScoreCategory::Technology => self.technology,
            ScoreCategory::Performance => self.performance,
        }
    }
}
