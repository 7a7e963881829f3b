//! Social profile discovery
//!
//! A platform table maps host patterns to a profile-path regex (with the
//! username in capture group 1) and a canonical URL template. Anchors and
//! JSON-LD `sameAs` entries are both checked; the first hit per platform wins.

use crate::extract::document::PageDocument;
use crate::extract::patterns::{load, Candidate, ExtractionPattern, PatternSet, StaticPatterns};
use crate::extract::ExtractionError;
use crate::url::host_matches_any;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use url::Url;

/// Path segments that are platform features rather than accounts
const RESERVED_USERNAMES: &[&str] = &[
    "sharer", "sharer.php", "share", "share.php", "intent", "home", "login", "signup", "hashtag",
    "search", "explore", "watch", "about", "privacy", "legal", "policies", "help", "settings",
    "dialog", "plugins", "tr", "i", "p", "pin",
];

struct PlatformSpec {
    name: &'static str,
    hosts: &'static [&'static str],
    /// Matched against the URL path; group 1 is the username
    path: &'static str,
    /// `{username}` and `{path}` (the whole matched path) are substituted
    template: &'static str,
}

const PLATFORM_SPECS: &[PlatformSpec] = &[
    PlatformSpec {
        name: "facebook",
        hosts: &["*.facebook.com", "fb.com", "*.fb.me"],
        path: r"^/(?:pg/)?([A-Za-z0-9.\-]{2,})/?$",
        template: "https://www.facebook.com/{username}",
    },
    PlatformSpec {
        name: "twitter",
        hosts: &["*.twitter.com", "*.x.com"],
        path: r"^/([A-Za-z0-9_]{1,15})/?$",
        template: "https://twitter.com/{username}",
    },
    PlatformSpec {
        name: "instagram",
        hosts: &["*.instagram.com"],
        path: r"^/([A-Za-z0-9_.]{1,30})/?$",
        template: "https://www.instagram.com/{username}",
    },
    PlatformSpec {
        name: "linkedin",
        hosts: &["*.linkedin.com"],
        path: r"^/(?:company|in|school)/([A-Za-z0-9_.%\-]+)/?$",
        template: "https://www.linkedin.com{path}",
    },
    PlatformSpec {
        name: "youtube",
        hosts: &["*.youtube.com"],
        path: r"^/(?:c/|channel/|user/|@)([A-Za-z0-9_.\-]+)/?$",
        template: "https://www.youtube.com{path}",
    },
    PlatformSpec {
        name: "github",
        hosts: &["github.com", "www.github.com"],
        path: r"^/([A-Za-z0-9\-]{1,39})/?$",
        template: "https://github.com/{username}",
    },
    PlatformSpec {
        name: "tiktok",
        hosts: &["*.tiktok.com"],
        path: r"^/@([A-Za-z0-9_.]{2,24})/?$",
        template: "https://www.tiktok.com/@{username}",
    },
    PlatformSpec {
        name: "pinterest",
        hosts: &["*.pinterest.com"],
        path: r"^/([A-Za-z0-9_]{3,30})/?$",
        template: "https://www.pinterest.com/{username}",
    },
];

struct Platform {
    spec: &'static PlatformSpec,
    path: Regex,
}

static PLATFORMS: LazyLock<Result<Vec<Platform>, ExtractionError>> = LazyLock::new(|| {
    PLATFORM_SPECS
        .iter()
        .map(|spec| {
            let path = Regex::new(spec.path).map_err(|e| ExtractionError::InvalidPattern {
                pattern: spec.name.to_string(),
                message: e.to_string(),
            })?;
            Ok(Platform { spec, path })
        })
        .collect()
});

/// A profile on a known platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProfile {
    /// Canonical profile URL
    pub url: String,
    pub username: String,
}

/// Social presence found on a page, keyed by platform name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocialRecord {
    #[serde(flatten)]
    pub profiles: BTreeMap<String, SocialProfile>,

    /// Structured-data profile links on hosts outside the platform table
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<String>,
}

impl SocialRecord {
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty() && self.other.is_empty()
    }

    pub fn get(&self, platform: &str) -> Option<&SocialProfile> {
        self.profiles.get(platform)
    }
}

/// One social link, before grouping by platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialLink {
    Known {
        platform: &'static str,
        profile: SocialProfile,
    },
    Other(String),
}

static SOCIAL_PATTERNS: StaticPatterns<SocialLink> = LazyLock::new(|| {
    Ok(PatternSet::new(vec![
        ExtractionPattern::selector("anchor_href", "social", "a[href]", Some("href"), link_from_anchor)?,
        ExtractionPattern::json_ld("structured_same_as", "social", "sameAs", link_from_same_as),
    ]))
});

/// Extracts social profiles, one per platform
pub fn extract_social(document: &PageDocument) -> Result<SocialRecord, ExtractionError> {
    PLATFORMS.as_ref().map_err(Clone::clone)?;

    let matches = load(&SOCIAL_PATTERNS)?.run(document, |link| match link {
        SocialLink::Known { platform, .. } => platform.to_string(),
        SocialLink::Other(url) => format!("other:{}", url),
    });

    let mut record = SocialRecord::default();
    for m in matches {
        match m.value {
            SocialLink::Known { platform, profile } => {
                record.profiles.insert(platform.to_string(), profile);
            }
            SocialLink::Other(url) => record.other.push(url),
        }
    }
    Ok(record)
}

/// Matches a URL against the platform table
pub fn match_profile(url: &Url) -> Option<(&'static str, SocialProfile)> {
    let host = url.host_str()?;
    let platforms = PLATFORMS.as_ref().ok()?;
    let platform = platforms
        .iter()
        .find(|platform| host_matches_any(platform.spec.hosts, host))?;

    let captures = platform.path.captures(url.path())?;
    let username = captures.get(1)?.as_str();
    if RESERVED_USERNAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(username))
    {
        return None;
    }

    let path = captures.get(0)?.as_str().trim_end_matches('/');
    let canonical = platform
        .spec
        .template
        .replace("{username}", username)
        .replace("{path}", path);

    Some((
        platform.spec.name,
        SocialProfile {
            url: canonical,
            username: username.to_string(),
        },
    ))
}

fn is_platform_host(url: &Url) -> bool {
    let (Some(host), Ok(platforms)) = (url.host_str(), PLATFORMS.as_ref()) else {
        return false;
    };
    platforms
        .iter()
        .any(|platform| host_matches_any(platform.spec.hosts, host))
}

fn link_from_anchor(candidate: &Candidate, document: &PageDocument) -> Option<SocialLink> {
    let url = document.resolve(candidate.as_text()?)?;
    match_profile(&url).map(|(platform, profile)| SocialLink::Known { platform, profile })
}

fn link_from_same_as(candidate: &Candidate, _: &PageDocument) -> Option<SocialLink> {
    let url = Url::parse(candidate.as_text()?.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    match match_profile(&url) {
        Some((platform, profile)) => Some(SocialLink::Known { platform, profile }),
        // Platform pages that are not profiles (share dialogs, posts) are noise
        None if is_platform_host(&url) => None,
        None => Some(SocialLink::Other(url.to_string())),
    }
}
