use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Device profile a page is measured under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    Mobile,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desktop" => Ok(Device::Desktop),
            "mobile" => Ok(Device::Mobile),
            other => Err(format!("unknown device '{}'", other)),
        }
    }
}

/// A single performance metric. Time metrics are stored in seconds unless
/// the label says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    LoadTime,
    Fcp,
    Lcp,
    Cls,
    Tbt,
    Fid,
    Inp,
    Ttfb,
    SpeedIndex,
    Tti,
    PageSize,
    PerformanceScore,
    AccessibilityScore,
    BestPracticesScore,
    SeoScore,
}

impl Metric {
    pub const ALL: [Metric; 15] = [
        Metric::LoadTime,
        Metric::Fcp,
        Metric::Lcp,
        Metric::Cls,
        Metric::Tbt,
        Metric::Fid,
        Metric::Inp,
        Metric::Ttfb,
        Metric::SpeedIndex,
        Metric::Tti,
        Metric::PageSize,
        Metric::PerformanceScore,
        Metric::AccessibilityScore,
        Metric::BestPracticesScore,
        Metric::SeoScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::LoadTime => "load_time",
            Metric::Fcp => "fcp",
            Metric::Lcp => "lcp",
            Metric::Cls => "cls",
            Metric::Tbt => "tbt",
            Metric::Fid => "fid",
            Metric::Inp => "inp",
            Metric::Ttfb => "ttfb",
            Metric::SpeedIndex => "speed_index",
            Metric::Tti => "tti",
            Metric::PageSize => "page_size",
            Metric::PerformanceScore => "performance_score",
            Metric::AccessibilityScore => "accessibility_score",
            Metric::BestPracticesScore => "best_practices_score",
            Metric::SeoScore => "seo_score",
        }
    }

    /// Column header used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::LoadTime => "Total Page Load Time in seconds",
            Metric::Fcp => "First Contentful Paint (FCP) in seconds",
            Metric::Lcp => "Largest Contentful Paint (s)",
            Metric::Cls => "Cumulative Layout Shift",
            Metric::Tbt => "Total Blocking Time (s)",
            Metric::Fid => "First Input Delay (ms)",
            Metric::Inp => "Interaction to Next Paint (ms)",
            Metric::Ttfb => "Time to First Byte (s)",
            Metric::SpeedIndex => "Speed Index (s)",
            Metric::Tti => "Time to Interactive (s)",
            Metric::PageSize => "Page Size (MB)",
            Metric::PerformanceScore => "Performance Score",
            Metric::AccessibilityScore => "Accessibility Score",
            Metric::BestPracticesScore => "Best Practices Score",
            Metric::SeoScore => "SEO Score",
        }
    }

    /// Short human name used in summary titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::LoadTime => "Page Load Time",
            Metric::Fcp => "First Contentful Paint",
            Metric::Lcp => "Largest Contentful Paint",
            Metric::Cls => "Cumulative Layout Shift",
            Metric::Tbt => "Total Blocking Time",
            Metric::Fid => "First Input Delay",
            Metric::Inp => "Interaction to Next Paint",
            Metric::Ttfb => "Time to First Byte",
            Metric::SpeedIndex => "Speed Index",
            Metric::Tti => "Time to Interactive",
            Metric::PageSize => "Page Size",
            Metric::PerformanceScore => "Performance Score",
            Metric::AccessibilityScore => "Accessibility Score",
            Metric::BestPracticesScore => "Best Practices Score",
            Metric::SeoScore => "SEO Score",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// One unit of work handed to the scheduler: a filtered URL plus the
/// devices it must be measured under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementJob {
    pub url: String,
    pub devices: Vec<Device>,
}

impl MeasurementJob {
    pub fn new(url: impl Into<String>, devices: Vec<Device>) -> Self {
        Self {
            url: url.into(),
            devices,
        }
    }

    pub fn for_urls(urls: &[String], devices: &[Device]) -> Vec<MeasurementJob> {
        urls.iter()
            .map(|url| MeasurementJob::new(url.clone(), devices.to_vec()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub url: String,
    pub device: Device,
    pub metrics: BTreeMap<Metric, Option<f64>>,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl MeasurementResult {
    pub fn new(url: String, device: Device) -> Self {
        Self {
            url,
            device,
            metrics: BTreeMap::new(),
            status_code: None,
            error: None,
        }
    }

    /// A result whose metrics are all absent, recorded when measuring failed.
    pub fn with_error(url: String, device: Device, error: String) -> Self {
        Self {
            url,
            device,
            metrics: BTreeMap::new(),
            status_code: None,
            error: Some(error),
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        self.metrics.insert(metric, value);
    }

    /// Value of `metric`, `None` when it was not obtained.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied().flatten()
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
