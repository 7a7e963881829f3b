//! Letter grades

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The 13 letter grades, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

impl Grade {
    pub const ALL: [Grade; 13] = [
        Grade::APlus,
        Grade::A,
        Grade::AMinus,
        Grade::BPlus,
        Grade::B,
        Grade::BMinus,
        Grade::CPlus,
        Grade::C,
        Grade::CMinus,
        Grade::DPlus,
        Grade::D,
        Grade::DMinus,
        Grade::F,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::DMinus => "D-",
            Grade::F => "F",
        }
    }

    fn default_minimum(&self) -> u8 {
        match self {
            Grade::APlus => 97,
            Grade::A => 93,
            Grade::AMinus => 90,
            Grade::BPlus => 87,
            Grade::B => 83,
            Grade::BMinus => 80,
            Grade::CPlus => 77,
            Grade::C => 73,
            Grade::CMinus => 70,
            Grade::DPlus => 67,
            Grade::D => 63,
            Grade::DMinus => 60,
            Grade::F => 0,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The default grade table as it appears in configuration
pub fn default_grade_thresholds() -> BTreeMap<String, u8> {
    Grade::ALL
        .iter()
        .map(|grade| (grade.as_str().to_string(), grade.default_minimum()))
        .collect()
}

/// Ordered minimum-score table mapping a score onto a grade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeScale {
    /// `(grade, minimum)` best grade first, minimums strictly descending
    bands: Vec<(Grade, u8)>,
}

impl Default for GradeScale {
    fn default() -> Self {
        Self {
            bands: Grade::ALL
                .iter()
                .map(|grade| (*grade, grade.default_minimum()))
                .collect(),
        }
    }
}

impl GradeScale {
    /// Builds a scale from the configured thresholds
    ///
    /// All 13 grades must be present with strictly descending minimums, and
    /// `F` must start at 0 so every score maps onto a grade.
    pub fn from_thresholds(thresholds: &BTreeMap<String, u8>) -> Result<Self, ConfigError> {
        for key in thresholds.keys() {
            if !Grade::ALL.iter().any(|grade| grade.as_str() == key) {
                return Err(ConfigError::Validation(format!(
                    "unknown grade '{}' in grade-thresholds",
                    key
                )));
            }
        }

        let mut bands = Vec::with_capacity(Grade::ALL.len());
        for grade in Grade::ALL {
            let minimum = thresholds.get(grade.as_str()).copied().ok_or_else(|| {
                ConfigError::Validation(format!("grade-thresholds is missing grade '{}'", grade))
            })?;
            if minimum > 100 {
                return Err(ConfigError::Validation(format!(
                    "grade '{}' threshold {} exceeds 100",
                    grade, minimum
                )));
            }
            if let Some((previous, previous_min)) = bands.last() {
                if minimum >= *previous_min {
                    return Err(ConfigError::Validation(format!(
                        "grade '{}' threshold {} must be below '{}' threshold {}",
                        grade, minimum, previous, previous_min
                    )));
                }
            }
            bands.push((grade, minimum));
        }

        if bands.last().map(|(_, minimum)| *minimum) != Some(0) {
            return Err(ConfigError::Validation(
                "grade 'F' threshold must be 0".to_string(),
            ));
        }

        Ok(Self { bands })
    }

    /// Returns the highest grade whose minimum does not exceed `score`
    pub fn grade_for(&self, score: u8) -> Grade {
        self.bands
            .iter()
            .find(|(_, minimum)| score >= *minimum)
            .map(|(grade, _)| *grade)
            .unwrap_or(Grade::F)
    }

    pub fn minimum(&self, grade: Grade) -> Option<u8> {
        self.bands
            .iter()
            .find(|(g, _)| *g == grade)
            .map(|(_, minimum)| *minimum)
    }
}
