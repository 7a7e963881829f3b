//! Ordered extraction patterns
//!
//! An [`ExtractionPattern`] pairs a matcher (CSS selector, regular expression
//! or JSON-LD key) with a post-processing function that validates and
//! normalizes each raw candidate. A [`PatternSet`] runs its patterns in
//! priority order and keeps the first source that produced each distinct
//! value.

use crate::extract::document::{collapse_whitespace, PageDocument};
use crate::extract::structured::find_values;
use crate::extract::{selector, ExtractionError};
use regex::Regex;
use scraper::Selector;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A pattern table compiled on first use and shared for the process lifetime
pub type StaticPatterns<T> = LazyLock<Result<PatternSet<T>, ExtractionError>>;

/// Forces a static pattern table, surfacing a compile failure as an error
pub fn load<T>(
    table: &'static StaticPatterns<T>,
) -> Result<&'static PatternSet<T>, ExtractionError> {
    LazyLock::force(table).as_ref().map_err(Clone::clone)
}

/// Confidence class of a pattern's source, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternPriority {
    /// Explicit markup such as `mailto:` links or `<meta>` tags
    Markup,
    /// JSON-LD structured data
    StructuredData,
    /// Free-text heuristics over the visible page text
    Heuristic,
}

/// How a pattern locates raw candidates in a document
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Elements matched by a CSS selector; yields `attr` when set, otherwise the element text
    Selector {
        selector: Selector,
        attr: Option<&'static str>,
    },
    /// Capture `group` of every match over the visible text
    Regex { regex: Regex, group: usize },
    /// Every JSON-LD value stored under this key, arrays expanded
    JsonLd(&'static str),
}

/// A raw value found by a matcher, before post-processing
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Text(String),
    Json(Value),
}

impl Candidate {
    /// Returns the candidate as text when it is a string
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Candidate::Text(text) => Some(text),
            Candidate::Json(Value::String(text)) => Some(text),
            Candidate::Json(_) => None,
        }
    }
}

/// Validates and normalizes one candidate
pub type PostProcess<T> = fn(&Candidate, &PageDocument) -> Option<T>;

/// One way of finding values for a field
pub struct ExtractionPattern<T> {
    /// Identifier used in logs and tests
    pub name: &'static str,
    /// The field this pattern fills (e.g. `email`)
    pub field: &'static str,
    pub priority: PatternPriority,
    pub matcher: Matcher,
    pub post_process: PostProcess<T>,
}

impl<T> ExtractionPattern<T> {
    pub fn selector(
        name: &'static str,
        field: &'static str,
        css: &str,
        attr: Option<&'static str>,
        post_process: PostProcess<T>,
    ) -> Result<Self, ExtractionError> {
        Ok(Self {
            name,
            field,
            priority: PatternPriority::Markup,
            matcher: Matcher::Selector {
                selector: selector(css)?,
                attr,
            },
            post_process,
        })
    }

    pub fn regex(
        name: &'static str,
        field: &'static str,
        pattern: &str,
        group: usize,
        post_process: PostProcess<T>,
    ) -> Result<Self, ExtractionError> {
        let regex = Regex::new(pattern).map_err(|e| ExtractionError::InvalidPattern {
            pattern: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            field,
            priority: PatternPriority::Heuristic,
            matcher: Matcher::Regex { regex, group },
            post_process,
        })
    }

    pub fn json_ld(
        name: &'static str,
        field: &'static str,
        key: &'static str,
        post_process: PostProcess<T>,
    ) -> Self {
        Self {
            name,
            field,
            priority: PatternPriority::StructuredData,
            matcher: Matcher::JsonLd(key),
            post_process,
        }
    }

    /// Overrides the priority implied by the matcher kind
    pub fn with_priority(mut self, priority: PatternPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Raw candidates in document order
    pub fn candidates(&self, document: &PageDocument) -> Vec<Candidate> {
        match &self.matcher {
            Matcher::Selector { selector, attr } => document
                .select(selector)
                .filter_map(|element| match attr {
                    Some(attr) => element.value().attr(attr).map(|v| v.trim().to_string()),
                    None => Some(collapse_whitespace(&element.text().collect::<String>())),
                })
                .filter(|value| !value.is_empty())
                .map(Candidate::Text)
                .collect(),
            Matcher::Regex { regex, group } => regex
                .captures_iter(document.text())
                .filter_map(|caps| caps.get(*group))
                .map(|m| Candidate::Text(m.as_str().to_string()))
                .collect(),
            Matcher::JsonLd(key) => {
                let mut candidates = Vec::new();
                for value in find_values(document.json_ld(), key) {
                    match value {
                        Value::Array(items) => {
                            candidates.extend(items.iter().cloned().map(Candidate::Json))
                        }
                        other => candidates.push(Candidate::Json(other.clone())),
                    }
                }
                candidates
            }
        }
    }

    /// Post-processed values in document order, invalid candidates dropped
    pub fn apply(&self, document: &PageDocument) -> Vec<T> {
        self.candidates(document)
            .iter()
            .filter_map(|candidate| (self.post_process)(candidate, document))
            .collect()
    }
}

/// A value together with the pattern that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch<T> {
    pub value: T,
    pub pattern: &'static str,
    pub priority: PatternPriority,
}

/// Patterns for one field, evaluated highest priority first
pub struct PatternSet<T> {
    patterns: Vec<ExtractionPattern<T>>,
}

impl<T> PatternSet<T> {
    /// Builds a set; patterns of equal priority keep their declared order
    pub fn new(mut patterns: Vec<ExtractionPattern<T>>) -> Self {
        patterns.sort_by_key(|pattern| pattern.priority);
        Self { patterns }
    }

    pub fn patterns(&self) -> &[ExtractionPattern<T>] {
        &self.patterns
    }

    pub fn pattern(&self, name: &str) -> Option<&ExtractionPattern<T>> {
        self.patterns.iter().find(|pattern| pattern.name == name)
    }

    /// Runs every pattern and keeps the first occurrence of each distinct value
    ///
    /// Values are compared through `key`, so two spellings of the same address
    /// collapse to whichever source reported it first.
    pub fn run<K, F>(&self, document: &PageDocument, key: F) -> Vec<PatternMatch<T>>
    where
        K: Eq + std::hash::Hash,
        F: Fn(&T) -> K,
    {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        for pattern in &self.patterns {
            let found = pattern.apply(document);
            if !found.is_empty() {
                tracing::debug!(
                    "Pattern {} ({}) produced {} value(s)",
                    pattern.name,
                    pattern.field,
                    found.len()
                );
            }
            for value in found {
                if seen.insert(key(&value)) {
                    matches.push(PatternMatch {
                        value,
                        pattern: pattern.name,
                        priority: pattern.priority,
                    });
                }
            }
        }
        matches
    }

    /// Returns the value of the highest-priority pattern that matched anything
    pub fn first(&self, document: &PageDocument) -> Option<PatternMatch<T>> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .apply(document)
                .into_iter()
                .next()
                .map(|value| PatternMatch {
                    value,
                    pattern: pattern.name,
                    priority: pattern.priority,
                })
        })
    }
}
