//! Rule-based recommendations
//!
//! A category contributes recommendations only when its score falls below its
//! configured threshold. Categories that were requested but produced no data
//! count as zero for this purpose. Recommendations are not de-duplicated across
//! categories and come back highest priority first.

use crate::config::{ScoringConfig, SslPoints};
use crate::extract::{ContactRecord, FeedRecord, MetadataRecord, SocialRecord};
use crate::intelligence::{
    IntelligenceRecord, PerformanceRecord, ReputationRecord, SslRecord, TechnologyRecord,
    SECURITY_HEADERS,
};
use crate::scoring::{CategoryRecord, ScoreCategory, Scorecard};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: ScoreCategory,
    pub priority: Priority,
    pub title: String,
    pub detail: String,
}

impl Recommendation {
    fn new(category: ScoreCategory, priority: Priority, title: &str, detail: impl Into<String>) -> Self {
        Self {
            category,
            priority,
            title: title.to_string(),
            detail: detail.into(),
        }
    }
}

/// Builds the prioritized recommendation list for a scored analysis
pub fn generate_recommendations(
    records: &[CategoryRecord],
    scorecard: &Scorecard,
    config: &ScoringConfig,
) -> Vec<Recommendation> {
    let below = |category: ScoreCategory| -> bool {
        let score = scorecard.component_scores.get(&category).copied().unwrap_or(0);
        score < config.recommendation_thresholds.get(category)
    };

    let mut recommendations = Vec::new();
    for record in records {
        match record {
            CategoryRecord::Metadata(metadata) if below(ScoreCategory::Metadata) => {
                metadata_rules(metadata, config, &mut recommendations)
            }
            CategoryRecord::Contact(contact) if below(ScoreCategory::Contact) => {
                contact_rules(contact, &mut recommendations)
            }
            CategoryRecord::Social(social) if below(ScoreCategory::Social) => {
                social_rules(social, &mut recommendations)
            }
            CategoryRecord::Feeds(feeds) if below(ScoreCategory::Feeds) => {
                feed_rules(feeds, &mut recommendations)
            }
            CategoryRecord::Intelligence(intelligence) => {
                intelligence_rules(intelligence, scorecard, config, &below, &mut recommendations)
            }
            _ => {}
        }
    }

    // Stable, so equal priorities keep category order
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

fn metadata_rules(record: &MetadataRecord, config: &ScoringConfig, out: &mut Vec<Recommendation>) {
    let category = ScoreCategory::Metadata;

    if !record.indexable {
        out.push(Recommendation::new(
            category,
            Priority::Critical,
            "Allow search engines to index the page",
            "The robots directives contain noindex, so the page is excluded from search results.",
        ));
    }

    let title_range = &config.title_length;
    match record.title.as_deref() {
        None => out.push(Recommendation::new(
            category,
            Priority::High,
            "Add a page title",
            "The page has no <title>; search results and browser tabs have nothing to show.",
        )),
        Some(title) if !title_range.is_ideal(title.chars().count()) => {
            out.push(Recommendation::new(
                category,
                Priority::Medium,
                "Adjust the page title length",
                format!(
                    "The title is {} characters; aim for {}-{}.",
                    title.chars().count(),
                    title_range.ideal_min,
                    title_range.ideal_max
                ),
            ))
        }
        Some(_) => {}
    }

    let description_range = &config.description_length;
    match record.description.as_deref() {
        None => out.push(Recommendation::new(
            category,
            Priority::High,
            "Add a meta description",
            "Search engines fall back to arbitrary page text without one.",
        )),
        Some(description) if !description_range.is_ideal(description.chars().count()) => {
            out.push(Recommendation::new(
                category,
                Priority::Medium,
                "Adjust the meta description length",
                format!(
                    "The description is {} characters; aim for {}-{}.",
                    description.chars().count(),
                    description_range.ideal_min,
                    description_range.ideal_max
                ),
            ))
        }
        Some(_) => {}
    }

    if record.canonical_url.is_none() {
        out.push(Recommendation::new(
            category,
            Priority::Medium,
            "Declare a canonical URL",
            "A <link rel=\"canonical\"> prevents duplicate-content dilution.",
        ));
    }

    let missing_og: Vec<&str> = config
        .points
        .metadata
        .open_graph_fields
        .iter()
        .map(String::as_str)
        .filter(|field| !record.open_graph.contains_key(*field))
        .collect();
    if !missing_og.is_empty() {
        out.push(Recommendation::new(
            category,
            Priority::Medium,
            "Complete the Open Graph tags",
            format!("Missing og:{}.", missing_og.join(", og:")),
        ));
    }

    if !record.twitter.contains_key("card") {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "Add a Twitter card",
            "A twitter:card meta tag controls how shared links are rendered.",
        ));
    }
    if record.language.is_none() {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "Declare the page language",
            "Set the lang attribute on the <html> element.",
        ));
    }
    if !record.favicon_declared {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "Declare a favicon",
            "Add a <link rel=\"icon\"> so browsers and bookmarks show your brand.",
        ));
    }
}

fn contact_rules(record: &ContactRecord, out: &mut Vec<Recommendation>) {
    let category = ScoreCategory::Contact;

    match (record.emails.is_empty(), record.phones.is_empty()) {
        (true, true) => out.push(Recommendation::new(
            category,
            Priority::High,
            "Publish a way to reach you",
            "No email address or phone number was found on the page.",
        )),
        (true, false) => out.push(Recommendation::new(
            category,
            Priority::Medium,
            "Publish a contact email",
            "Add a mailto: link so visitors can write to you.",
        )),
        (false, true) => out.push(Recommendation::new(
            category,
            Priority::Medium,
            "Publish a phone number",
            "Add a tel: link so mobile visitors can call with one tap.",
        )),
        (false, false) => {}
    }

    if record.addresses.is_empty() {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "Show a postal address",
            "Mark it up as a schema.org PostalAddress for the best results.",
        ));
    }
    if record.forms.is_empty() {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "Offer a contact form",
            "A form lowers the barrier for visitors who do not use email.",
        ));
    }
    if record.hours.is_empty() {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "List your business hours",
            "Opening hours help visitors decide when to call or visit.",
        ));
    }
}

fn social_rules(record: &SocialRecord, out: &mut Vec<Recommendation>) {
    let category = ScoreCategory::Social;
    if record.profiles.is_empty() {
        out.push(Recommendation::new(
            category,
            Priority::High,
            "Link your social profiles",
            "No profile on a major social platform is linked from the page.",
        ));
    } else if record.profiles.len() < 3 {
        out.push(Recommendation::new(
            category,
            Priority::Medium,
            "Expand your social presence",
            format!(
                "Only {} platform(s) linked: {}.",
                record.profiles.len(),
                record.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        ));
    }
}

fn feed_rules(record: &FeedRecord, out: &mut Vec<Recommendation>) {
    let category = ScoreCategory::Feeds;
    if record.is_empty() {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "Offer an RSS or Atom feed",
            "Declare it with <link rel=\"alternate\" type=\"application/rss+xml\">.",
        ));
    } else if record.iter().any(|feed| feed.title.is_none()) {
        out.push(Recommendation::new(
            category,
            Priority::Low,
            "Title your feed links",
            "Feed readers use the link title when subscribing.",
        ));
    }
}

fn intelligence_rules(
    record: &IntelligenceRecord,
    scorecard: &Scorecard,
    config: &ScoringConfig,
    below: &dyn Fn(ScoreCategory) -> bool,
    out: &mut Vec<Recommendation>,
) {
    // Capabilities that failed carry no evidence to base advice on
    let scored = |category: ScoreCategory| scorecard.component_scores.contains_key(&category);

    if let Some(ssl) = &record.ssl {
        if scored(ScoreCategory::Ssl) && below(ScoreCategory::Ssl) {
            ssl_rules(ssl, &config.points.ssl, out);
        }
    }
    if let Some(reputation) = &record.reputation {
        if scored(ScoreCategory::Reputation) && below(ScoreCategory::Reputation) {
            reputation_rules(reputation, out);
        }
    }
    if let Some(technology) = &record.technology {
        if scored(ScoreCategory::Technology) && below(ScoreCategory::Technology) {
            technology_rules(technology, out);
        }
    }
    if let Some(performance) = &record.performance {
        if scored(ScoreCategory::Performance) && below(ScoreCategory::Performance) {
            performance_rules(performance, scorecard, out);
        }
    }
}

fn ssl_rules(record: &SslRecord, tiers: &SslPoints, out: &mut Vec<Recommendation>) {
    let category = ScoreCategory::Ssl;
    let days = record.days_until_expiry;

    if !record.valid || days.is_some_and(|d| d < 0) {
        out.push(Recommendation::new(
            category,
            Priority::Critical,
            "Fix the TLS certificate",
            "The certificate is invalid or expired; browsers will warn visitors away.",
        ));
        return;
    }

    match days {
        Some(d) if d < tiers.near_days => out.push(Recommendation::new(
            category,
            Priority::Critical,
            "Renew the TLS certificate now",
            format!("The certificate expires in {} day(s).", d),
        )),
        Some(d) if d <= tiers.comfortable_days => out.push(Recommendation::new(
            category,
            Priority::High,
            "Renew the TLS certificate soon",
            format!("The certificate expires in {} days.", d),
        )),
        _ => {}
    }

    let weak_key = match (record.key_algorithm.as_deref(), record.key_size) {
        (Some(algorithm), Some(bits)) if algorithm.eq_ignore_ascii_case("EC") => {
            bits < tiers.ec_strong_bits
        }
        (_, Some(bits)) => bits < tiers.rsa_strong_bits,
        _ => false,
    };
    if weak_key {
        out.push(Recommendation::new(
            category,
            Priority::High,
            "Use a stronger certificate key",
            format!(
                "Issue the certificate with at least a {}-bit RSA or {}-bit EC key.",
                tiers.rsa_strong_bits, tiers.ec_strong_bits
            ),
        ));
    }

    let poor_grade = record
        .grade
        .as_deref()
        .is_some_and(|grade| !grade.starts_with('A'));
    let old_protocol = record.grade.is_none()
        && record
            .protocol
            .as_deref()
            .is_some_and(|protocol| !protocol.contains("1.3"));
    if poor_grade || old_protocol {
        out.push(Recommendation::new(
            category,
            Priority::Medium,
            "Harden the TLS configuration",
            "Disable legacy protocols and weak ciphers; prefer TLS 1.3.",
        ));
    }
}

fn reputation_rules(record: &ReputationRecord, out: &mut Vec<Recommendation>) {
    let Some(risk) = record.risk_score else {
        return;
    };
    let (priority, title) = if risk >= 50 {
        (Priority::Critical, "Resolve security flags on the domain")
    } else {
        (Priority::High, "Review reputation warnings for the domain")
    };
    let mut detail = format!("Combined risk score is {}/100.", risk);
    if !record.threats.is_empty() {
        detail.push_str(&format!(" Reported threats: {}.", record.threats.join(", ")));
    }
    out.push(Recommendation::new(ScoreCategory::Reputation, priority, title, detail));
}

fn technology_rules(record: &TechnologyRecord, out: &mut Vec<Recommendation>) {
    let missing: Vec<&str> = SECURITY_HEADERS
        .iter()
        .copied()
        .filter(|header| !record.security_headers.get(*header).copied().unwrap_or(false))
        .collect();
    if missing.is_empty() {
        return;
    }

    let priority = if missing.contains(&"strict-transport-security") {
        Priority::High
    } else {
        Priority::Medium
    };
    out.push(Recommendation::new(
        ScoreCategory::Technology,
        priority,
        "Add security headers",
        format!("Missing: {}.", missing.join(", ")),
    ));
}

fn performance_rules(record: &PerformanceRecord, scorecard: &Scorecard, out: &mut Vec<Recommendation>) {
    let score = scorecard
        .component_scores
        .get(&ScoreCategory::Performance)
        .copied()
        .unwrap_or(0);
    let priority = if score < 50 {
        Priority::High
    } else {
        Priority::Medium
    };

    let detail = match (record.score, record.response_time_ms) {
        (Some(lighthouse), _) => format!("Lighthouse performance score is {}.", lighthouse),
        (None, Some(ms)) => format!("The page took {} ms to respond.", ms),
        (None, None) => "The page is slow to load.".to_string(),
    };
    out.push(Recommendation::new(
        ScoreCategory::Performance,
        priority,
        "Improve page speed",
        detail,
    ));
}
