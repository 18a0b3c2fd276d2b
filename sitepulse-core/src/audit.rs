use crate::classify::{ClassifiedRecord, RatingSummary, classify_results, summarize};
use crate::config::{AuditConfig, ConfigError, MeasureMode};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use sitepulse_scanner::filter::{filter_urls_with_stats, segment_distribution};
use sitepulse_scanner::{
    BrowserMeasurer, Device, MeasurementJob, MeasurementScheduler, Metric, PageMeasurer,
    PageSpeedMeasurer, ScanError, SitemapResolver,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AuditError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Scanner setup failed: {0}")]
    Scan(#[from] ScanError),
}

/// Everything a finished run produced, ready for reporting.
#[derive(Debug, Clone)]
pub struct AuditRun {
    pub sitemap_url: String,
    pub project_name: String,
    pub mode: MeasureMode,
    pub devices: Vec<Device>,
    /// Report columns, in order.
    pub metrics: Vec<Metric>,
    pub primary_metric: Metric,
    pub records: Vec<ClassifiedRecord>,
    pub discovered: usize,
    pub filtered: usize,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl AuditRun {
    pub fn records_for(&self, device: Device) -> Vec<&ClassifiedRecord> {
        self.records
            .iter()
            .filter(|r| r.result.device == device)
            .collect()
    }

    /// Primary metric buckets for one device.
    pub fn summary(&self, device: Device) -> RatingSummary {
        summarize(self.records_for(device), self.primary_metric)
    }

    pub fn elapsed_minutes(&self) -> f64 {
        (self.elapsed.as_secs_f64() / 60.0 * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone)]
pub enum AuditOutcome {
    /// Nothing to measure: the sitemap yielded no URLs, or none survived
    /// filtering.
    NoData { discovered: usize },
    Completed(AuditRun),
}

/// Build the measurer the configured mode asks for.
pub fn build_measurer(config: &AuditConfig) -> Result<Arc<dyn PageMeasurer>, AuditError> {
    match config.mode {
        MeasureMode::Browser => {
            let mut measurer = BrowserMeasurer::with_timeout(config.request_timeout_secs)?
                .with_settle_delay(config.settle_delay());
            if let Some(ref chrome) = config.chrome_executable {
                debug!("Using Chrome at {}", chrome.display());
                measurer = measurer.with_chrome_executable(chrome.clone());
            }
            Ok(Arc::new(measurer))
        }
        MeasureMode::PageSpeed => {
            if config.pagespeed.api_key.is_none() {
                warn!("No PageSpeed API key configured; requests will be heavily rate limited");
            }
            let measurer = PageSpeedMeasurer::with_timeout(
                config.pagespeed.api_key.clone(),
                config.measure_timeout_secs,
            )?
            .with_locale(config.pagespeed.locale.clone())
            .with_categories(config.pagespeed.categories.clone());
            Ok(Arc::new(measurer))
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

fn measurement_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Discover, filter, measure and classify the pages of one sitemap.
pub async fn execute_audit(
    config: &AuditConfig,
    measurer: Arc<dyn PageMeasurer>,
    show_progress: bool,
) -> Result<AuditOutcome, AuditError> {
    config.validate()?;
    let started_at = Local::now();
    let clock = Instant::now();

    let discovery = show_progress.then(|| spinner("Resolving sitemap..."));
    let resolver = SitemapResolver::with_settings(&config.user_agent, config.request_timeout_secs)?;
    let report = resolver.resolve_with_report(&config.sitemap_url).await;
    if let Some(pb) = discovery {
        pb.finish_and_clear();
    }

    info!(
        "Discovered {} URLs from {} sitemaps ({} failed)",
        report.urls.len(),
        report.sitemaps_fetched,
        report.sitemaps_failed
    );
    if report.urls.is_empty() {
        warn!("No URLs found in sitemap {}", config.sitemap_url);
        return Ok(AuditOutcome::NoData { discovered: 0 });
    }

    let mut discovered: Vec<String> = report.urls.into_iter().collect();
    discovered.sort();

    debug!("URL distribution by path segments:");
    for (segments, count) in segment_distribution(&discovered) {
        debug!("  {} segment(s): {} URLs", segments, count);
    }

    let (filtered, stats) = filter_urls_with_stats(&discovered);
    info!(
        "Kept {} of {} URLs ({} root, {} one segment)",
        filtered.len(),
        discovered.len(),
        stats.root,
        stats.single_segment
    );
    if filtered.is_empty() {
        warn!("No URLs with 0 or 1 path segments to measure");
        return Ok(AuditOutcome::NoData {
            discovered: discovered.len(),
        });
    }

    let devices = config.devices();
    let jobs = MeasurementJob::for_urls(&filtered, &devices);

    let mut scheduler = MeasurementScheduler::new(config.concurrency())
        .with_chunk_delay(config.chunk_delay())
        .with_device_delay(config.device_delay())
        .with_timeout(config.measure_timeout());
    if let Some(size) = config.chunk_size() {
        scheduler = scheduler.with_chunk_size(size);
    }
    debug!(
        "Scheduling {} jobs on {} device(s) across {} workers",
        jobs.len(),
        devices.len(),
        scheduler.concurrency()
    );

    let bar = show_progress.then(|| measurement_bar(jobs.len()));
    if let Some(ref pb) = bar {
        let pb = pb.clone();
        scheduler = scheduler.with_progress_callback(Arc::new(move |_idx: usize, url: String| {
            pb.set_message(url);
            pb.inc(1);
        }));
    }

    let results = scheduler.run(jobs, measurer).await;
    if let Some(pb) = bar {
        pb.finish_with_message("Measurement complete");
    }

    let metrics = config.mode.metrics();
    let records = classify_results(results, &metrics);

    Ok(AuditOutcome::Completed(AuditRun {
        sitemap_url: config.sitemap_url.clone(),
        project_name: config.project_name.clone(),
        mode: config.mode,
        devices,
        metrics,
        primary_metric: config.mode.primary_metric(),
        records,
        discovered: discovered.len(),
        filtered: filtered.len(),
        started_at,
        elapsed: clock.elapsed(),
    }))
}
