//! Load performance
//!
//! PageSpeed Insights supplies a Lighthouse score and lab metrics. Without
//! it, the record falls back to what the page fetch itself measured.

use crate::fetch::FetchRequest;
use crate::intelligence::{decode_response, IntelligenceGateway, PageContext, ProviderError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PAGESPEED: &str = "pagespeed";
pub const RESPONSE_TIME: &str = "response-time";
const PAGESPEED_DEFAULT_BASE: &str = "https://www.googleapis.com";

/// Lighthouse audits copied into [`PerformanceRecord::metrics`]
const LAB_METRICS: &[&str] = &[
    "first-contentful-paint",
    "largest-contentful-paint",
    "total-blocking-time",
    "cumulative-layout-shift",
    "speed-index",
    "interactive",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub provider: String,
    /// Lighthouse performance score (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PerformanceRecord {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            ..Self::default()
        }
    }

    /// Measurements taken while fetching the page
    pub fn from_page(page: PageContext<'_>) -> Self {
        Self {
            response_time_ms: Some(page.response.elapsed.as_millis() as u64),
            page_size_bytes: Some(page.response.body.len() as u64),
            ..Self::new(RESPONSE_TIME)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSpeedResponse {
    lighthouse_result: LighthouseResult,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    categories: LighthouseCategories,
    #[serde(default)]
    audits: BTreeMap<String, LighthouseAudit>,
}

#[derive(Debug, Deserialize)]
struct LighthouseCategories {
    performance: LighthouseCategory,
}

#[derive(Debug, Deserialize)]
struct LighthouseCategory {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LighthouseAudit {
    #[serde(default)]
    numeric_value: Option<f64>,
}

impl PageSpeedResponse {
    fn into_record(self) -> Result<PerformanceRecord, ProviderError> {
        let score = self
            .lighthouse_result
            .categories
            .performance
            .score
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: PAGESPEED.to_string(),
                message: "no performance score".to_string(),
            })?;

        let metrics = LAB_METRICS
            .iter()
            .filter_map(|name| {
                self.lighthouse_result
                    .audits
                    .get(*name)
                    .and_then(|audit| audit.numeric_value)
                    .map(|value| (name.to_string(), value))
            })
            .collect();

        Ok(PerformanceRecord {
            score: Some((score * 100.0).round().clamp(0.0, 100.0) as u8),
            metrics,
            ..PerformanceRecord::new(PAGESPEED)
        })
    }
}

impl IntelligenceGateway {
    pub(crate) async fn analyze_performance(&self, page: PageContext<'_>) -> PerformanceRecord {
        let measured = PerformanceRecord::from_page(page);

        match self.pagespeed(page.url.as_str()).await {
            Ok(mut record) => {
                record.response_time_ms = measured.response_time_ms;
                record.page_size_bytes = measured.page_size_bytes;
                record
            }
            Err(e) if e.is_unconfigured() => measured,
            Err(e) => {
                tracing::debug!("PageSpeed unavailable, using response time: {}", e);
                PerformanceRecord {
                    warnings: vec![e.to_string()],
                    ..measured
                }
            }
        }
    }

    async fn pagespeed(&self, url: &str) -> Result<PerformanceRecord, ProviderError> {
        let config = &self.providers.pagespeed;
        let mut endpoint = format!(
            "{}/pagespeedonline/v5/runPagespeed?url={}&strategy=mobile&category=performance",
            config.base_url(PAGESPEED_DEFAULT_BASE),
            encode_query(url)
        );
        if let Some(key) = config.api_key() {
            endpoint.push_str("&key=");
            endpoint.push_str(key);
        }

        self.call_provider(PAGESPEED, config, url, async {
            let result = self
                .fetcher
                .get(&endpoint, &FetchRequest::new(config.timeout()))
                .await;
            decode_response::<PageSpeedResponse>(PAGESPEED, result)?.into_record()
        })
        .await
    }
}

fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
