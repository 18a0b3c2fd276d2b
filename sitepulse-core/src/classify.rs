//! Red/amber/green rating of measured values against fixed per-metric cut
//! points.

use serde::{Deserialize, Serialize};
use sitepulse_scanner::{MeasurementResult, Metric};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    Good,
    Moderate,
    Poor,
    NotAvailable,
}

impl Rating {
    /// Ratings that come from an actual value, best first.
    pub const LIVE: [Rating; 3] = [Rating::Good, Rating::Moderate, Rating::Poor];

    pub fn rag_label(&self) -> &'static str {
        match self {
            Rating::Good => "Green",
            Rating::Moderate => "Amber",
            Rating::Poor => "Red",
            Rating::NotAvailable => "N/A",
        }
    }

    /// Cell fill used in reports, as 0xRRGGBB.
    pub fn fill_color(&self) -> u32 {
        match self {
            Rating::Good => 0x92D050,
            Rating::Moderate => 0xFFC000,
            Rating::Poor => 0xFF0000,
            Rating::NotAvailable => 0xD9D9D9,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rag_label())
    }
}

/// Which side of each cut point a value must fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutStyle {
    /// Good below `good`, moderate below `moderate`. Cut points belong to the
    /// worse bucket.
    Below,
    /// Good up to and including `good`, moderate up to and including
    /// `moderate`.
    AtMost,
    /// Higher is better: good from `good` up, moderate from `moderate` up.
    AtLeast,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub good: f64,
    pub moderate: f64,
    pub style: CutStyle,
}

impl Thresholds {
    const fn new(good: f64, moderate: f64, style: CutStyle) -> Self {
        Self {
            good,
            moderate,
            style,
        }
    }

    pub fn rate(&self, value: f64) -> Rating {
        if !value.is_finite() {
            return Rating::NotAvailable;
        }
        let (is_good, is_moderate) = match self.style {
            CutStyle::Below => (value < self.good, value < self.moderate),
            CutStyle::AtMost => (value <= self.good, value <= self.moderate),
            CutStyle::AtLeast => (value >= self.good, value >= self.moderate),
        };
        if is_good {
            Rating::Good
        } else if is_moderate {
            Rating::Moderate
        } else {
            Rating::Poor
        }
    }
}

pub fn thresholds(metric: Metric) -> Thresholds {
    use CutStyle::*;
    match metric {
        Metric::LoadTime => Thresholds::new(3.0, 5.0, Below),
        Metric::Fcp => Thresholds::new(1.8, 3.0, AtMost),
        Metric::Lcp => Thresholds::new(2.5, 4.0, AtMost),
        Metric::Cls => Thresholds::new(0.1, 0.25, AtMost),
        Metric::Tbt => Thresholds::new(0.2, 0.6, AtMost),
        Metric::Fid => Thresholds::new(100.0, 300.0, AtMost),
        Metric::Inp => Thresholds::new(200.0, 500.0, AtMost),
        Metric::Ttfb => Thresholds::new(0.8, 1.8, AtMost),
        Metric::SpeedIndex => Thresholds::new(3.4, 5.8, AtMost),
        Metric::Tti => Thresholds::new(3.8, 7.3, AtMost),
        Metric::PageSize => Thresholds::new(1.0, 3.0, AtMost),
        Metric::PerformanceScore
        | Metric::AccessibilityScore
        | Metric::BestPracticesScore
        | Metric::SeoScore => Thresholds::new(90.0, 50.0, AtLeast),
    }
}

/// Rate one value. An absent value is always `NotAvailable`.
pub fn classify(metric: Metric, value: Option<f64>) -> Rating {
    match value {
        Some(v) => thresholds(metric).rate(v),
        None => Rating::NotAvailable,
    }
}

fn unit_suffix(metric: Metric) -> &'static str {
    match metric {
        Metric::Fid | Metric::Inp => "ms",
        Metric::PageSize => "MB",
        Metric::Cls
        | Metric::PerformanceScore
        | Metric::AccessibilityScore
        | Metric::BestPracticesScore
        | Metric::SeoScore => "",
        _ => "s",
    }
}

/// Summary row label, e.g. `Green (< 3s)` or `Amber (3s to < 5s)`.
pub fn bucket_label(metric: Metric, rating: Rating) -> String {
    let t = thresholds(metric);
    let unit = unit_suffix(metric);
    let good = format!("{}{}", t.good, unit);
    let moderate = format!("{}{}", t.moderate, unit);
    let range = match (t.style, rating) {
        (_, Rating::NotAvailable) => return rating.rag_label().to_string(),
        (CutStyle::Below, Rating::Good) => format!("< {}", good),
        (CutStyle::Below, Rating::Moderate) => format!("{} to < {}", good, moderate),
        (CutStyle::Below, Rating::Poor) => format!(">= {}", moderate),
        (CutStyle::AtMost, Rating::Good) => format!("<= {}", good),
        (CutStyle::AtMost, Rating::Moderate) => format!("> {} to <= {}", good, moderate),
        (CutStyle::AtMost, Rating::Poor) => format!("> {}", moderate),
        (CutStyle::AtLeast, Rating::Good) => format!(">= {}", good),
        (CutStyle::AtLeast, Rating::Moderate) => format!("{} to < {}", moderate, good),
        (CutStyle::AtLeast, Rating::Poor) => format!("< {}", moderate),
    };
    format!("{} ({})", rating.rag_label(), range)
}

/// A measurement together with the rating of each reported metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub result: MeasurementResult,
    pub ratings: BTreeMap<Metric, Rating>,
}

impl ClassifiedRecord {
    pub fn new(result: MeasurementResult, metrics: &[Metric]) -> Self {
        let ratings = metrics
            .iter()
            .map(|m| (*m, classify(*m, result.value(*m))))
            .collect();
        Self { result, ratings }
    }

    pub fn rating(&self, metric: Metric) -> Rating {
        self.ratings
            .get(&metric)
            .copied()
            .unwrap_or(Rating::NotAvailable)
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.result.value(metric)
    }
}

pub fn classify_results(results: Vec<MeasurementResult>, metrics: &[Metric]) -> Vec<ClassifiedRecord> {
    results
        .into_iter()
        .map(|r| ClassifiedRecord::new(r, metrics))
        .collect()
}

/// Bucket counts for one metric across a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingSummary {
    pub metric: Metric,
    pub good: usize,
    pub moderate: usize,
    pub poor: usize,
    pub not_available: usize,
}

impl RatingSummary {
    /// Every record, including those without a value.
    pub fn total(&self) -> usize {
        self.good + self.moderate + self.poor + self.not_available
    }

    pub fn count(&self, rating: Rating) -> usize {
        match rating {
            Rating::Good => self.good,
            Rating::Moderate => self.moderate,
            Rating::Poor => self.poor,
            Rating::NotAvailable => self.not_available,
        }
    }

    pub fn percentage(&self, rating: Rating) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.count(rating) as f64 / total as f64 * 100.0
        }
    }
}

pub fn summarize<'a, I>(records: I, metric: Metric) -> RatingSummary
where
    I: IntoIterator<Item = &'a ClassifiedRecord>,
{
    let mut summary = RatingSummary {
        metric,
        good: 0,
        moderate: 0,
        poor: 0,
        not_available: 0,
    };
    for record in records {
        match classify(metric, record.value(metric)) {
            Rating::Good => summary.good += 1,
            Rating::Moderate => summary.moderate += 1,
            Rating::Poor => summary.poor += 1,
            Rating::NotAvailable => summary.not_available += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_time_boundaries() {
        assert_eq!(classify(Metric::LoadTime, Some(2.999)), Rating::Good);
        assert_eq!(classify(Metric::LoadTime, Some(3.0)), Rating::Moderate);
        assert_eq!(classify(Metric::LoadTime, Some(4.99)), Rating::Moderate);
        assert_eq!(classify(Metric::LoadTime, Some(5.0)), Rating::Poor);
    }

    #[test]
    fn test_upper_inclusive_boundaries() {
        assert_eq!(classify(Metric::Fcp, Some(1.8)), Rating::Good);
        assert_eq!(classify(Metric::Fcp, Some(3.0)), Rating::Moderate);
        assert_eq!(classify(Metric::Fcp, Some(3.01)), Rating::Poor);
        assert_eq!(classify(Metric::Cls, Some(0.1)), Rating::Good);
        assert_eq!(classify(Metric::Inp, Some(500.0)), Rating::Moderate);
    }

    #[test]
    fn test_scores_rate_higher_as_better() {
        assert_eq!(classify(Metric::PerformanceScore, Some(90.0)), Rating::Good);
        assert_eq!(classify(Metric::SeoScore, Some(50.0)), Rating::Moderate);
        assert_eq!(classify(Metric::AccessibilityScore, Some(49.0)), Rating::Poor);
    }

    #[test]
    fn test_non_finite_is_not_available() {
        assert_eq!(classify(Metric::Lcp, Some(f64::NAN)), Rating::NotAvailable);
        assert_eq!(classify(Metric::Lcp, Some(f64::INFINITY)), Rating::NotAvailable);
    }

    #[test]
    fn test_bucket_labels() {
        assert_eq!(bucket_label(Metric::LoadTime, Rating::Good), "Green (< 3s)");
        assert_eq!(
            bucket_label(Metric::LoadTime, Rating::Moderate),
            "Amber (3s to < 5s)"
        );
        assert_eq!(bucket_label(Metric::LoadTime, Rating::Poor), "Red (>= 5s)");
        assert_eq!(bucket_label(Metric::Lcp, Rating::Good), "Green (<= 2.5s)");
        assert_eq!(
            bucket_label(Metric::PerformanceScore, Rating::Moderate),
            "Amber (50 to < 90)"
        );
        assert_eq!(bucket_label(Metric::Fid, Rating::Poor), "Red (> 300ms)");
    }
}
