//! Page-load timing from a headless Chrome instance.

use crate::error::{Result, ScanError};
use crate::measure::{PageMeasurer, round2};
use crate::result::{Device, MeasurementResult, Metric};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// A plain object expression, evaluated and returned by value
const PERFORMANCE_SCRIPT: &str = r#"({
    navigationStart: window.performance.timing.navigationStart,
    loadEventEnd: window.performance.timing.loadEventEnd,
    fcp: (performance.getEntriesByName('first-contentful-paint')[0] || {}).startTime || null
})"#;

/// Raw values read from the page's performance API, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTiming {
    pub navigation_start: Option<f64>,
    pub load_event_end: Option<f64>,
    pub fcp: Option<f64>,
}

impl PageTiming {
    /// Navigation start to load event end, in seconds.
    pub fn load_time(&self) -> Option<f64> {
        match (self.navigation_start, self.load_event_end) {
            (Some(start), Some(end)) if start > 0.0 && end > 0.0 && end >= start => {
                Some(round2((end - start) / 1000.0))
            }
            _ => None,
        }
    }

    /// First contentful paint, in seconds.
    pub fn first_contentful_paint(&self) -> Option<f64> {
        self.fcp.filter(|v| *v > 0.0).map(|v| round2(v / 1000.0))
    }
}

pub struct BrowserMeasurer {
    client: Client,
    settle_delay: Duration,
    chrome_executable: Option<PathBuf>,
}

impl BrowserMeasurer {
    pub fn new() -> Result<Self> {
        Self::with_timeout(30)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            settle_delay: Duration::from_secs(3),
            chrome_executable: None,
        })
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_chrome_executable(mut self, path: PathBuf) -> Self {
        self.chrome_executable = Some(path);
        self
    }

    async fn status_code(&self, url: &str) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-notifications")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled");
        if let Some(ref path) = self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(ScanError::Browser)
    }

    async fn read_timing(&self, browser: &Browser, url: &str) -> Result<PageTiming> {
        let page = browser.new_page(url).await?;
        page.wait_for_navigation().await?;
        tokio::time::sleep(self.settle_delay).await;

        page.evaluate(PERFORMANCE_SCRIPT)
            .await?
            .into_value::<PageTiming>()
            .map_err(|e| ScanError::Browser(format!("Unexpected performance data: {}", e)))
    }
}

#[async_trait]
impl PageMeasurer for BrowserMeasurer {
    async fn measure(&self, url: &str, device: Device) -> Result<MeasurementResult> {
        let status_code = self.status_code(url).await?;
        debug!("Processing: {} - Status: {}", url, status_code);

        let (mut browser, mut handler) = Browser::launch(self.browser_config()?).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        // The browser is shut down whether or not the page could be read
        let timing = self.read_timing(&browser, url).await;

        if let Err(e) = browser.close().await {
            warn!("Error closing browser for {}: {}", url, e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Error waiting for browser exit for {}: {}", url, e);
        }
        handler_task.abort();

        let timing = timing?;
        let mut result = MeasurementResult::new(url.to_string(), device);
        result.status_code = Some(status_code);
        result.set(Metric::Fcp, timing.first_contentful_paint());
        result.set(Metric::LoadTime, timing.load_time());
        debug!(
            "FCP: {:?}s | Total: {:?}s for {}",
            result.value(Metric::Fcp),
            result.value(Metric::LoadTime),
            url
        );
        Ok(result)
    }
}
