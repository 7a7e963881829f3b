//! Certificate assessment
//!
//! SSL Labs is asked first; when it is unavailable, disabled, rate limited or
//! still assessing the host, a direct handshake fills in what it can (no
//! letter grade, but validity, expiry, key strength and protocol).

use crate::intelligence::{decode_response, CertificateInfo, IntelligenceGateway, ProviderError};
use crate::fetch::FetchRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

pub const SSL_LABS: &str = "ssl-labs";
pub const TLS_HANDSHAKE: &str = "tls-handshake";
const SSL_LABS_DEFAULT_BASE: &str = "https://api.ssllabs.com/api/v3";

/// Certificate and transport security of the analyzed host
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SslRecord {
    /// Which source produced the record
    pub provider: String,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_until_expiry: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    /// Set when no source could assess the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SslRecord {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            ..Self::default()
        }
    }

    pub fn failed(provider: &str, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(provider)
        }
    }

    pub fn from_certificate(info: CertificateInfo, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            valid: info.verified,
            issuer: info.issuer,
            subject: info.subject,
            not_after: Some(info.not_after),
            key_algorithm: info.key_algorithm,
            key_size: info.key_size,
            protocol: info.protocol,
            validation_error: info.verification_error,
            ..Self::new(TLS_HANDSHAKE)
        };
        record.refresh_expiry(now);
        record
    }

    /// Recomputes the days left before `not_after`; an expired certificate is invalid
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) {
        if let Some(not_after) = self.not_after {
            let days = (not_after - now).num_days();
            self.days_until_expiry = Some(days);
            if not_after < now {
                self.valid = false;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabsHost {
    status: String,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    endpoints: Vec<LabsEndpoint>,
    #[serde(default)]
    certs: Vec<LabsCert>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabsEndpoint {
    #[serde(default)]
    grade: Option<String>,
    #[serde(default)]
    details: Option<LabsDetails>,
}

#[derive(Debug, Deserialize)]
struct LabsDetails {
    #[serde(default)]
    protocols: Vec<LabsProtocol>,
}

#[derive(Debug, Deserialize)]
struct LabsProtocol {
    name: String,
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabsCert {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    issuer_subject: Option<String>,
    /// Milliseconds since the epoch
    #[serde(default)]
    not_after: Option<i64>,
    #[serde(default)]
    key_alg: Option<String>,
    #[serde(default)]
    key_size: Option<u32>,
    /// Bit flags; zero means trusted
    #[serde(default)]
    issues: u32,
}

impl LabsHost {
    fn into_record(self) -> Result<SslRecord, ProviderError> {
        if self.status != "READY" {
            return Err(ProviderError::NotReady {
                provider: SSL_LABS.to_string(),
                status: self.status_message.unwrap_or(self.status),
            });
        }

        // the worst endpoint grade stands for the host
        let grade = self
            .endpoints
            .iter()
            .filter_map(|e| e.grade.clone())
            .max_by(|a, b| grade_rank(a).cmp(&grade_rank(b)));
        let protocol = self
            .endpoints
            .iter()
            .filter_map(|e| e.details.as_ref())
            .flat_map(|d| d.protocols.iter())
            .max_by(|a, b| a.version.cmp(&b.version))
            .map(|p| format!("{}v{}", p.name, p.version));

        let leaf = self.certs.into_iter().next().ok_or_else(|| ProviderError::InvalidResponse {
            provider: SSL_LABS.to_string(),
            message: "assessment lists no certificates".to_string(),
        })?;

        Ok(SslRecord {
            valid: leaf.issues == 0,
            grade,
            issuer: leaf.issuer_subject,
            subject: leaf.subject,
            not_after: leaf.not_after.and_then(DateTime::<Utc>::from_timestamp_millis),
            key_algorithm: leaf.key_alg,
            key_size: leaf.key_size,
            protocol,
            validation_error: (leaf.issues != 0)
                .then(|| format!("certificate issues flagged ({:#x})", leaf.issues)),
            ..SslRecord::new(SSL_LABS)
        })
    }
}

/// Orders grades from best to worst; `T` and `M` (trust and mismatch) are worst
fn grade_rank(grade: &str) -> u8 {
    match grade {
        "A+" => 0,
        "A" => 1,
        "A-" => 2,
        "B" => 3,
        "C" => 4,
        "D" => 5,
        "E" => 6,
        "F" => 7,
        _ => 8,
    }
}

impl IntelligenceGateway {
    pub(crate) async fn analyze_ssl(&self, url: &Url) -> SslRecord {
        let Some(host) = url.host_str() else {
            return SslRecord::failed(TLS_HANDSHAKE, "URL has no host");
        };
        let port = if url.scheme() == "https" {
            url.port_or_known_default().unwrap_or(443)
        } else {
            443
        };

        match self.ssl_labs(host).await {
            Ok(mut record) => {
                record.refresh_expiry(Utc::now());
                return record;
            }
            Err(e) if e.is_unconfigured() => {}
            Err(e) => tracing::debug!("{}; falling back to a direct handshake", e),
        }

        match self.tls_probe.probe(host, port, self.handshake_timeout).await {
            Ok(info) => SslRecord::from_certificate(info, Utc::now()),
            Err(e) => {
                tracing::info!("SSL assessment of {} failed: {}", host, e);
                SslRecord::failed(TLS_HANDSHAKE, e.to_string())
            }
        }
    }

    async fn ssl_labs(&self, host: &str) -> Result<SslRecord, ProviderError> {
        let config = &self.providers.ssl_labs;
        let endpoint = format!(
            "{}/analyze?host={}&fromCache=on&maxAge=72&all=done",
            config.base_url(SSL_LABS_DEFAULT_BASE),
            host
        );
        self.call_provider(SSL_LABS, config, host, async {
            let mut request = FetchRequest::new(config.timeout());
            if let Some(email) = config.api_key() {
                request = request.header("email", email);
            }
            let result = self.fetcher.get(&endpoint, &request).await;
            decode_response::<LabsHost>(SSL_LABS, result)?.into_record()
        })
        .await
    }
}
