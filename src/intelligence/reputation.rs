//! Threat reputation
//!
//! Both providers need API keys. Without any configured provider the
//! capability is simply absent from the analysis. When at least one answers,
//! the risk score is the weighted sum of the answering providers' risks under
//! their fixed blend weights, capped at 100. A provider that did not answer
//! contributes nothing.

use crate::fetch::FetchRequest;
use crate::intelligence::{decode_response, IntelligenceGateway, ProviderError};
use crate::url::bare_domain;
use serde::{Deserialize, Serialize};
use url::Url;

pub const SAFE_BROWSING: &str = "safe-browsing";
pub const VIRUSTOTAL: &str = "virustotal";
const SAFE_BROWSING_DEFAULT_BASE: &str = "https://safebrowsing.googleapis.com";
const VIRUSTOTAL_DEFAULT_BASE: &str = "https://www.virustotal.com";

const THREAT_TYPES: &[&str] = &[
    "MALWARE",
    "SOCIAL_ENGINEERING",
    "UNWANTED_SOFTWARE",
    "POTENTIALLY_HARMFUL_APPLICATION",
];

/// Safe Browsing lookup outcome
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafeBrowsingVerdict {
    /// Threat types the URL is listed under; empty when clean
    pub threats: Vec<String>,
}

impl SafeBrowsingVerdict {
    pub fn risk(&self) -> u8 {
        if self.threats.is_empty() {
            0
        } else {
            100
        }
    }
}

/// VirusTotal engine tallies for the domain
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VirusTotalVerdict {
    pub malicious: u32,
    pub suspicious: u32,
    pub harmless: u32,
    pub undetected: u32,
    /// The domain has no report yet
    pub unknown: bool,
}

impl VirusTotalVerdict {
    /// 25 per malicious and 10 per suspicious verdict, capped at 100
    pub fn risk(&self) -> u8 {
        25u32
            .saturating_mul(self.malicious)
            .saturating_add(10u32.saturating_mul(self.suspicious))
            .min(100) as u8
    }
}

/// Blended reputation of the analyzed URL
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReputationRecord {
    /// Providers that answered
    pub providers: Vec<String>,
    /// 0 (clean) to 100 (known bad)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_browsing: Option<SafeBrowsingVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virustotal: Option<VirusTotalVerdict>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub threats: Vec<String>,
    /// Failures of individual providers that did not prevent a verdict
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Set when no configured provider answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReputationRecord {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SafeBrowsingResponse {
    #[serde(default)]
    matches: Vec<SafeBrowsingMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafeBrowsingMatch {
    threat_type: String,
}

#[derive(Debug, Deserialize)]
struct VirusTotalResponse {
    data: VirusTotalData,
}

#[derive(Debug, Deserialize)]
struct VirusTotalData {
    attributes: VirusTotalAttributes,
}

#[derive(Debug, Deserialize)]
struct VirusTotalAttributes {
    last_analysis_stats: VirusTotalVerdict,
}

/// Weighted sum of `(weight, risk)` pairs under fixed weights, capped at 100
fn blend(contributions: &[(f64, u8)]) -> Option<u8> {
    if contributions.is_empty() {
        return None;
    }
    let risk: f64 = contributions
        .iter()
        .map(|(w, r)| w.max(0.0) * f64::from(*r))
        .sum();
    Some(risk.round().clamp(0.0, 100.0) as u8)
}

impl IntelligenceGateway {
    /// `None` when no reputation provider is configured
    pub(crate) async fn analyze_reputation(&self, url: &Url) -> Option<ReputationRecord> {
        let sb_config = &self.providers.safe_browsing;
        let vt_config = &self.providers.virustotal;
        let sb_configured = sb_config.enabled && sb_config.api_key().is_some();
        let vt_configured = vt_config.enabled && vt_config.api_key().is_some();
        if !sb_configured && !vt_configured {
            tracing::debug!("No reputation provider configured");
            return None;
        }

        let (safe_browsing, virustotal) = tokio::join!(
            async {
                if sb_configured {
                    Some(self.safe_browsing(url).await)
                } else {
                    None
                }
            },
            async {
                match bare_domain(url) {
                    Some(domain) if vt_configured => Some(self.virustotal(&domain).await),
                    _ => None,
                }
            },
        );

        let mut record = ReputationRecord::default();
        let mut contributions = Vec::new();
        let mut failures = Vec::new();

        match safe_browsing {
            Some(Ok(verdict)) => {
                contributions.push((self.blend.safe_browsing, verdict.risk()));
                record.threats.extend(verdict.threats.iter().cloned());
                record.providers.push(SAFE_BROWSING.to_string());
                record.safe_browsing = Some(verdict);
            }
            Some(Err(e)) => failures.push(e.to_string()),
            None => {}
        }
        match virustotal {
            Some(Ok(verdict)) => {
                contributions.push((self.blend.virustotal, verdict.risk()));
                if verdict.malicious > 0 {
                    record
                        .threats
                        .push(format!("{} engines flag the domain as malicious", verdict.malicious));
                }
                record.providers.push(VIRUSTOTAL.to_string());
                record.virustotal = Some(verdict);
            }
            Some(Err(e)) => failures.push(e.to_string()),
            None => {}
        }

        record.risk_score = blend(&contributions);
        if record.risk_score.is_none() {
            tracing::info!("Reputation unavailable for {}: {}", url, failures.join("; "));
            record.error = Some(failures.join("; "));
        } else {
            record.warnings = failures;
        }
        Some(record)
    }

    async fn safe_browsing(&self, url: &Url) -> Result<SafeBrowsingVerdict, ProviderError> {
        let config = &self.providers.safe_browsing;
        let key = config
            .api_key()
            .ok_or_else(|| ProviderError::MissingApiKey(SAFE_BROWSING.to_string()))?;
        let endpoint = format!(
            "{}/v4/threatMatches:find?key={}",
            config.base_url(SAFE_BROWSING_DEFAULT_BASE),
            key
        );
        let body = serde_json::json!({
            "client": {
                "clientId": "site-audit",
                "clientVersion": env!("CARGO_PKG_VERSION"),
            },
            "threatInfo": {
                "threatTypes": THREAT_TYPES,
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{"url": url.as_str()}],
            }
        });

        self.call_provider(SAFE_BROWSING, config, url.as_str(), async {
            let result = self
                .fetcher
                .post_json(&endpoint, &body, &FetchRequest::new(config.timeout()))
                .await;
            let response: SafeBrowsingResponse = decode_response(SAFE_BROWSING, result)?;
            let mut threats: Vec<String> =
                response.matches.into_iter().map(|m| m.threat_type).collect();
            threats.sort();
            threats.dedup();
            Ok(SafeBrowsingVerdict { threats })
        })
        .await
    }

    async fn virustotal(&self, domain: &str) -> Result<VirusTotalVerdict, ProviderError> {
        let config = &self.providers.virustotal;
        let key = config
            .api_key()
            .ok_or_else(|| ProviderError::MissingApiKey(VIRUSTOTAL.to_string()))?;
        let endpoint = format!(
            "{}/api/v3/domains/{}",
            config.base_url(VIRUSTOTAL_DEFAULT_BASE),
            domain
        );

        self.call_provider(VIRUSTOTAL, config, domain, async {
            let result = self
                .fetcher
                .get(&endpoint, &FetchRequest::new(config.timeout()).header("x-apikey", key))
                .await;
            match decode_response::<VirusTotalResponse>(VIRUSTOTAL, result) {
                Ok(response) => Ok(response.data.attributes.last_analysis_stats),
                Err(ProviderError::Http { status: 404, .. }) => Ok(VirusTotalVerdict {
                    unknown: true,
                    ..VirusTotalVerdict::default()
                }),
                Err(e) => Err(e),
            }
        })
        .await
    }
}
