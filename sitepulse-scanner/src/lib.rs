pub mod browser;
pub mod error;
pub mod filter;
pub mod measure;
pub mod pagespeed;
pub mod result;
pub mod scheduler;
pub mod sitemap;

pub use browser::BrowserMeasurer;
pub use error::ScanError;
pub use filter::{FilterDecision, FilterStats, filter_url, filter_urls, filter_urls_with_stats};
pub use measure::PageMeasurer;
pub use pagespeed::PageSpeedMeasurer;
pub use result::{Device, MeasurementJob, MeasurementResult, Metric};
pub use scheduler::{MeasurementScheduler, ProgressCallback};
pub use sitemap::{ResolveReport, SitemapNode, SitemapResolver};
