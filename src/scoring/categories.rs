//! Point allocation per category
//!
//! Every function returns an integer score in `0..=100`. Point values, length
//! bands, tiers and buckets all come from [`ScoringConfig`].

use crate::config::{
    ContactPoints, FeedPoints, LengthRange, MetadataPoints, PerformancePoints, PointsConfig,
    ScoringConfig, SocialPoints, SslPoints, TechnologyPoints,
};
use crate::extract::{ContactRecord, FeedKind, FeedRecord, MetadataRecord, SocialRecord};
use crate::intelligence::{
    IntelligenceRecord, PerformanceRecord, ReputationRecord, SslRecord, TechnologyRecord,
    SECURITY_HEADERS,
};
use crate::scoring::{CategoryRecord, ScoreCategory};

/// Score for one category; `None` when the category produced no usable data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryScore {
    pub category: ScoreCategory,
    pub score: Option<u8>,
}

impl CategoryScore {
    fn new(category: ScoreCategory, score: Option<u8>) -> Self {
        Self { category, score }
    }
}

/// Scores a record, one entry per category it carries
///
/// Intelligence capabilities that were not requested are omitted; requested
/// ones that failed are reported without a score.
pub fn evaluate(record: &CategoryRecord, config: &ScoringConfig) -> Vec<CategoryScore> {
    let points = &config.points;
    match record {
        CategoryRecord::Metadata(metadata) => vec![CategoryScore::new(
            ScoreCategory::Metadata,
            metadata.has_data().then(|| score_metadata(metadata, config)),
        )],
        CategoryRecord::Contact(contact) => vec![CategoryScore::new(
            ScoreCategory::Contact,
            (!contact.is_empty()).then(|| score_contact(contact, &points.contact)),
        )],
        CategoryRecord::Social(social) => vec![CategoryScore::new(
            ScoreCategory::Social,
            (!social.is_empty()).then(|| score_social(social, &points.social)),
        )],
        CategoryRecord::Feeds(feeds) => vec![CategoryScore::new(
            ScoreCategory::Feeds,
            (!feeds.is_empty()).then(|| score_feeds(feeds, &points.feeds)),
        )],
        CategoryRecord::Intelligence(intelligence) => evaluate_intelligence(intelligence, points),
    }
}

fn evaluate_intelligence(record: &IntelligenceRecord, points: &PointsConfig) -> Vec<CategoryScore> {
    let mut scores = Vec::new();
    if let Some(ssl) = &record.ssl {
        scores.push(CategoryScore::new(
            ScoreCategory::Ssl,
            ssl.error.is_none().then(|| score_ssl(ssl, &points.ssl)),
        ));
    }
    if let Some(reputation) = &record.reputation {
        scores.push(CategoryScore::new(
            ScoreCategory::Reputation,
            score_reputation(reputation),
        ));
    }
    if let Some(technology) = &record.technology {
        scores.push(CategoryScore::new(
            ScoreCategory::Technology,
            technology
                .error
                .is_none()
                .then(|| score_technology(technology, &points.technology)),
        ));
    }
    if let Some(performance) = &record.performance {
        scores.push(CategoryScore::new(
            ScoreCategory::Performance,
            score_performance(performance, &points.performance),
        ));
    }
    scores
}

/// Points for a text field against its length bands
fn length_points(value: Option<&str>, range: &LengthRange, points: &MetadataPoints) -> u32 {
    let Some(value) = value else {
        return 0;
    };
    let len = value.chars().count();
    if range.is_ideal(len) {
        points.length_ideal
    } else if range.is_acceptable(len) {
        points.length_acceptable
    } else {
        points.length_poor
    }
}

pub fn score_metadata(record: &MetadataRecord, config: &ScoringConfig) -> u8 {
    let table = &config.points.metadata;
    let mut points = length_points(record.title.as_deref(), &config.title_length, table);
    points += length_points(record.description.as_deref(), &config.description_length, table);

    if record.canonical_url.is_some() {
        points += table.canonical;
    }

    if !table.open_graph_fields.is_empty() {
        let og_present = table
            .open_graph_fields
            .iter()
            .filter(|field| record.open_graph.contains_key(field.as_str()))
            .count() as u32;
        points += og_present * table.open_graph / table.open_graph_fields.len() as u32;
    }

    if record.twitter.contains_key("card") {
        points += table.twitter_card;
    }
    if record.language.is_some() {
        points += table.language;
    }
    if record.indexable {
        points += table.indexable;
    }
    if record.favicon_declared {
        points += table.favicon;
    }

    clamp(points)
}

pub fn score_contact(record: &ContactRecord, table: &ContactPoints) -> u8 {
    let earned = [
        (!record.emails.is_empty(), table.email),
        (!record.phones.is_empty(), table.phone),
        (!record.addresses.is_empty(), table.address),
        (!record.forms.is_empty(), table.form),
        (!record.hours.is_empty(), table.hours),
    ];
    clamp(earned.iter().filter(|(found, _)| *found).map(|(_, points)| points).sum())
}

/// Known platforms and unknown profile links earn different amounts
pub fn score_social(record: &SocialRecord, table: &SocialPoints) -> u8 {
    clamp(
        table.platform * record.profiles.len() as u32 + table.other * record.other.len() as u32,
    )
}

pub fn score_feeds(record: &FeedRecord, table: &FeedPoints) -> u8 {
    if record.is_empty() {
        return 0;
    }

    let mut points = table.present;
    let has_rss = record.iter().any(|feed| feed.kind == FeedKind::Rss);
    let has_atom = record.iter().any(|feed| feed.kind == FeedKind::Atom);
    if record.len() >= 2 || (has_rss && has_atom) {
        points += table.variety;
    }
    if record.iter().all(|feed| feed.title.is_some()) {
        points += table.titled;
    }
    clamp(points)
}

/// Validity, expiry headroom, key strength, then grade or protocol
pub fn score_ssl(record: &SslRecord, table: &SslPoints) -> u8 {
    if !record.valid || record.days_until_expiry.is_some_and(|days| days < 0) {
        return 0;
    }

    let mut points = table.valid;

    points += match record.days_until_expiry {
        Some(days) if days > table.comfortable_days => table.expiry_comfortable,
        Some(days) if days >= table.near_days => table.expiry_near,
        Some(_) => 0,
        None => table.expiry_unknown,
    };

    let algorithm = record.key_algorithm.as_deref().unwrap_or("RSA");
    let strong_bits = if algorithm.eq_ignore_ascii_case("EC") {
        table.ec_strong_bits
    } else {
        table.rsa_strong_bits
    };
    points += match record.key_size {
        Some(bits) if bits >= strong_bits => table.strong_key,
        Some(bits) if bits >= table.weak_bits => table.weak_key,
        _ => 0,
    };

    points += match (record.grade.as_deref(), record.protocol.as_deref()) {
        (Some(grade), _) => grade
            .get(..1)
            .and_then(|letter| table.grades.get(letter))
            .copied()
            .unwrap_or(0),
        (None, Some(protocol)) => table
            .protocols
            .get(protocol)
            .copied()
            .unwrap_or(table.other_protocol),
        (None, None) => 0,
    };

    clamp(points)
}

/// `100 - risk`; `None` when no provider answered
pub fn score_reputation(record: &ReputationRecord) -> Option<u8> {
    if record.error.is_some() {
        return None;
    }
    record.risk_score.map(|risk| 100u8.saturating_sub(risk.min(100)))
}

/// A detected stack plus points per security header present
pub fn score_technology(record: &TechnologyRecord, table: &TechnologyPoints) -> u8 {
    let mut points = if record.technologies.is_empty() {
        0
    } else {
        table.detected
    };
    points += table.security_header
        * SECURITY_HEADERS
            .iter()
            .filter(|header| record.security_headers.get(**header).copied().unwrap_or(false))
            .count() as u32;
    clamp(points)
}

/// The Lighthouse score when known, otherwise a response-time bucket
pub fn score_performance(record: &PerformanceRecord, table: &PerformancePoints) -> Option<u8> {
    if record.error.is_some() {
        return None;
    }
    if let Some(score) = record.score {
        return Some(score.min(100));
    }
    record.response_time_ms.map(|ms| {
        table
            .buckets
            .iter()
            .find(|bucket| ms < bucket.under_ms)
            .map(|bucket| bucket.score)
            .unwrap_or(table.slowest)
            .min(100)
    })
}

fn clamp(points: u32) -> u8 {
    points.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseTimeBucket;
    use std::collections::BTreeMap;

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    fn points() -> PointsConfig {
        PointsConfig::default()
    }

    #[test]
    fn test_metadata_complete_page() {
        let record = MetadataRecord {
            title: Some("Acme Widgets - Quality widgets since 1999".to_string()),
            description: Some("x".repeat(140)),
            canonical_url: Some("https://example.com/".to_string()),
            open_graph: points()
                .metadata
                .open_graph_fields
                .iter()
                .map(|f| (f.clone(), "v".to_string()))
                .collect(),
            twitter: BTreeMap::from([("card".to_string(), "summary".to_string())]),
            language: Some("en".to_string()),
            indexable: true,
            favicon_declared: true,
            ..MetadataRecord::default()
        };
        assert_eq!(score_metadata(&record, &config()), 100);
    }

    #[test]
    fn test_metadata_title_only() {
        let record = MetadataRecord {
            title: Some("Home".to_string()),
            indexable: true,
            ..MetadataRecord::default()
        };
        // short title 5 + indexable 5
        assert_eq!(score_metadata(&record, &config()), 10);
    }

    #[test]
    fn test_metadata_points_follow_config() {
        let record = MetadataRecord {
            title: Some("Home".to_string()),
            indexable: true,
            ..MetadataRecord::default()
        };
        let mut config = config();
        config.points.metadata.length_poor = 12;
        config.points.metadata.indexable = 30;
        assert_eq!(score_metadata(&record, &config), 42);
    }

    #[test]
    fn test_title_length_bands() {
        let range = config().title_length;
        let table = points().metadata;
        assert_eq!(length_points(Some("t".repeat(45).as_str()), &range, &table), 25);
        assert_eq!(length_points(Some("t".repeat(20).as_str()), &range, &table), 15);
        assert_eq!(length_points(Some("t".repeat(90).as_str()), &range, &table), 5);
        assert_eq!(length_points(None, &range, &table), 0);
    }

    #[test]
    fn test_social_is_capped() {
        let mut record = SocialRecord::default();
        record.other = (0..30).map(|i| format!("https://other{}.test/", i)).collect();
        assert_eq!(score_social(&record, &points().social), 100);
    }

    #[test]
    fn test_ssl_tiers() {
        let base = SslRecord {
            valid: true,
            days_until_expiry: Some(20),
            key_algorithm: Some("EC".to_string()),
            key_size: Some(256),
            protocol: Some("TLSv1.2".to_string()),
            ..SslRecord::new("tls-handshake")
        };
        let table = points().ssl;
        assert_eq!(score_ssl(&base, &table), 40 + 10 + 15 + 20);

        let graded = SslRecord {
            grade: Some("B+".to_string()),
            ..base.clone()
        };
        assert_eq!(score_ssl(&graded, &table), 40 + 10 + 15 + 15);

        let expired = SslRecord {
            days_until_expiry: Some(-3),
            ..base.clone()
        };
        assert_eq!(score_ssl(&expired, &table), 0);

        let invalid = SslRecord {
            valid: false,
            ..base
        };
        assert_eq!(score_ssl(&invalid, &table), 0);
    }

    #[test]
    fn test_reputation_inverts_risk() {
        let record = ReputationRecord {
            risk_score: Some(30),
            ..ReputationRecord::default()
        };
        assert_eq!(score_reputation(&record), Some(70));
        assert_eq!(score_reputation(&ReputationRecord::default()), None);
    }

    #[test]
    fn test_technology_headers() {
        let mut record = TechnologyRecord::default();
        record.security_headers = SECURITY_HEADERS
            .iter()
            .take(3)
            .map(|h| (h.to_string(), true))
            .collect();
        assert_eq!(score_technology(&record, &points().technology), 30);
    }

    #[test]
    fn test_performance_buckets() {
        let at = |ms| PerformanceRecord {
            response_time_ms: Some(ms),
            ..PerformanceRecord::new("response-time")
        };
        let table = points().performance;
        assert_eq!(score_performance(&at(150), &table), Some(100));
        assert_eq!(score_performance(&at(200), &table), Some(85));
        assert_eq!(score_performance(&at(1500), &table), Some(50));
        assert_eq!(score_performance(&at(9000), &table), Some(10));

        let lighthouse = PerformanceRecord {
            score: Some(73),
            response_time_ms: Some(9000),
            ..PerformanceRecord::new("pagespeed")
        };
        assert_eq!(score_performance(&lighthouse, &table), Some(73));
    }

    #[test]
    fn test_performance_buckets_from_config() {
        let table = PerformancePoints {
            buckets: vec![ResponseTimeBucket {
                under_ms: 10_000,
                score: 90,
            }],
            slowest: 0,
        };
        let at = |ms| PerformanceRecord {
            response_time_ms: Some(ms),
            ..PerformanceRecord::new("response-time")
        };
        assert_eq!(score_performance(&at(9000), &table), Some(90));
        assert_eq!(score_performance(&at(12_000), &table), Some(0));
    }
}
