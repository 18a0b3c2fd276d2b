//! Core Web Vitals through the PageSpeed Insights v5 API.

use crate::error::{Result, ScanError};
use crate::measure::{PageMeasurer, round2};
use crate::result::{Device, MeasurementResult, Metric};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const PAGESPEED_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
pub const DEFAULT_CATEGORIES: &[&str] = &["performance", "best-practices", "seo", "accessibility"];

const MS_PER_SECOND: f64 = 1000.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Where each metric lives in the API response and how to scale it.
const METRIC_SOURCES: &[(Metric, &str, f64)] = &[
    // Field data, kept in milliseconds
    (Metric::Fid, "/loadingExperience/metrics/FIRST_INPUT_DELAY_MS/percentile", 1.0),
    (Metric::Inp, "/loadingExperience/metrics/INTERACTION_TO_NEXT_PAINT/percentile", 1.0),
    (
        Metric::Ttfb,
        "/loadingExperience/metrics/EXPERIMENTAL_TIME_TO_FIRST_BYTE/percentile",
        1.0 / MS_PER_SECOND,
    ),
    // Lab data
    (
        Metric::Fcp,
        "/lighthouseResult/audits/first-contentful-paint/numericValue",
        1.0 / MS_PER_SECOND,
    ),
    (
        Metric::Lcp,
        "/lighthouseResult/audits/largest-contentful-paint/numericValue",
        1.0 / MS_PER_SECOND,
    ),
    (Metric::Cls, "/lighthouseResult/audits/cumulative-layout-shift/numericValue", 1.0),
    (
        Metric::SpeedIndex,
        "/lighthouseResult/audits/speed-index/numericValue",
        1.0 / MS_PER_SECOND,
    ),
    (
        Metric::Tti,
        "/lighthouseResult/audits/interactive/numericValue",
        1.0 / MS_PER_SECOND,
    ),
    (
        Metric::Tbt,
        "/lighthouseResult/audits/total-blocking-time/numericValue",
        1.0 / MS_PER_SECOND,
    ),
    (
        Metric::PageSize,
        "/lighthouseResult/audits/total-byte-weight/numericValue",
        1.0 / BYTES_PER_MB,
    ),
    // Category scores, 0..1 scaled to 0..100
    (Metric::PerformanceScore, "/lighthouseResult/categories/performance/score", 100.0),
    (Metric::AccessibilityScore, "/lighthouseResult/categories/accessibility/score", 100.0),
    (Metric::BestPracticesScore, "/lighthouseResult/categories/best-practices/score", 100.0),
    (Metric::SeoScore, "/lighthouseResult/categories/seo/score", 100.0),
];

pub struct PageSpeedMeasurer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    locale: String,
    categories: Vec<String>,
}

impl PageSpeedMeasurer {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(api_key, 60)
    }

    pub fn with_timeout(api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: PAGESPEED_ENDPOINT.to_string(),
            api_key,
            locale: "en".to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    fn query_params(&self, url: &str, device: Device) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("url", url.to_string()),
            ("strategy", device.as_str().to_string()),
            ("locale", self.locale.clone()),
        ];
        if let Some(ref key) = self.api_key {
            params.push(("key", key.clone()));
        }
        for category in &self.categories {
            params.push(("category", category.clone()));
        }
        params
    }
}

/// Pull every known metric out of a `runPagespeed` response body.
pub fn extract_metrics(url: &str, device: Device, body: &Value) -> Result<MeasurementResult> {
    if let Some(message) = body
        .pointer("/lighthouseResult/runtimeError/message")
        .and_then(Value::as_str)
    {
        return Err(ScanError::Measurement(format!("Lighthouse runtime error: {}", message)));
    }

    let mut result = MeasurementResult::new(url.to_string(), device);
    for (metric, pointer, scale) in METRIC_SOURCES {
        let value = body
            .pointer(pointer)
            .and_then(Value::as_f64)
            .map(|v| round2(v * scale));
        result.set(*metric, value);
    }
    Ok(result)
}

#[async_trait]
impl PageMeasurer for PageSpeedMeasurer {
    async fn measure(&self, url: &str, device: Device) -> Result<MeasurementResult> {
        debug!("PageSpeed request for {} ({})", url, device);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(url, device))
            .header("Cache-Control", "no-cache, no-store, must-revalidate")
            .header("Pragma", "no-cache")
            .header("Expires", "0")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await?;
        extract_metrics(url, device, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_converts_units() {
        let body = json!({
            "loadingExperience": {
                "metrics": {
                    "FIRST_INPUT_DELAY_MS": { "percentile": 120 },
                    "EXPERIMENTAL_TIME_TO_FIRST_BYTE": { "percentile": 950 }
                }
            },
            "lighthouseResult": {
                "audits": {
                    "first-contentful-paint": { "numericValue": 1534.2 },
                    "total-byte-weight": { "numericValue": 2097152.0 },
                    "cumulative-layout-shift": { "numericValue": 0.034 }
                },
                "categories": {
                    "performance": { "score": 0.87 }
                }
            }
        });

        let result = extract_metrics("https://example.com/", Device::Mobile, &body).unwrap();
        assert_eq!(result.value(Metric::Fid), Some(120.0));
        assert_eq!(result.value(Metric::Ttfb), Some(0.95));
        assert_eq!(result.value(Metric::Fcp), Some(1.53));
        assert_eq!(result.value(Metric::PageSize), Some(2.0));
        assert_eq!(result.value(Metric::Cls), Some(0.03));
        assert_eq!(result.value(Metric::PerformanceScore), Some(87.0));
        assert_eq!(result.value(Metric::Inp), None);
        assert_eq!(result.value(Metric::SeoScore), None);
        assert_eq!(result.device, Device::Mobile);
    }

    #[test]
    fn test_runtime_error_fails_measurement() {
        let body = json!({
            "lighthouseResult": {
                "runtimeError": { "code": "NO_FCP", "message": "The page did not paint" }
            }
        });
        assert!(matches!(
            extract_metrics("https://example.com/", Device::Desktop, &body),
            Err(ScanError::Measurement(_))
        ));
    }

    #[test]
    fn test_query_params_repeat_category() {
        let measurer = PageSpeedMeasurer::new(Some("k".to_string())).unwrap();
        let params = measurer.query_params("https://example.com/", Device::Desktop);
        let categories: Vec<_> = params.iter().filter(|(name, _)| *name == "category").collect();
        assert_eq!(categories.len(), 4);
        assert!(params.contains(&("strategy", "desktop".to_string())));
        assert!(params.contains(&("key", "k".to_string())));
    }
}
