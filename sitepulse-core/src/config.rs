//! Run configuration: built-in defaults, an optional TOML file, then whatever
//! the caller layers on top.

use serde::{Deserialize, Serialize};
use sitepulse_scanner::sitemap::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use sitepulse_scanner::{Device, Metric};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which measurement collaborator a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureMode {
    /// Headless browser timing: load time and FCP.
    #[default]
    Browser,
    /// PageSpeed Insights API: Core Web Vitals and category scores.
    PageSpeed,
}

impl MeasureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureMode::Browser => "browser",
            MeasureMode::PageSpeed => "pagespeed",
        }
    }

    /// Report columns, in order.
    pub fn metrics(&self) -> Vec<Metric> {
        match self {
            MeasureMode::Browser => vec![Metric::Fcp, Metric::LoadTime],
            MeasureMode::PageSpeed => Metric::ALL
                .iter()
                .copied()
                .filter(|m| *m != Metric::LoadTime)
                .collect(),
        }
    }

    /// The metric rows are sorted by and the summary is built on.
    pub fn primary_metric(&self) -> Metric {
        match self {
            MeasureMode::Browser => Metric::LoadTime,
            MeasureMode::PageSpeed => Metric::Lcp,
        }
    }

    pub fn default_concurrency(&self) -> usize {
        match self {
            MeasureMode::Browser => 5,
            MeasureMode::PageSpeed => 4,
        }
    }

    pub fn default_chunk_size(&self) -> Option<usize> {
        match self {
            MeasureMode::Browser => None,
            MeasureMode::PageSpeed => Some(10),
        }
    }

    pub fn default_devices(&self) -> Vec<Device> {
        match self {
            MeasureMode::Browser => vec![Device::Desktop],
            MeasureMode::PageSpeed => vec![Device::Desktop, Device::Mobile],
        }
    }
}

impl fmt::Display for MeasureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browser" => Ok(MeasureMode::Browser),
            "pagespeed" | "psi" => Ok(MeasureMode::PageSpeed),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSpeedSettings {
    pub api_key: Option<String>,
    pub locale: String,
    pub categories: Vec<String>,
}

impl Default for PageSpeedSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            locale: "en".to_string(),
            categories: sitepulse_scanner::pagespeed::DEFAULT_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub server: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: Option<String>,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            server: None,
            port: 587,
            username: None,
            password: None,
            sender: None,
        }
    }
}

/// Everything one audit run needs. Built once and passed down the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sitemap_url: String,
    pub project_name: String,
    pub output_dir: PathBuf,
    pub mode: MeasureMode,
    /// Falls back to the mode's devices when unset.
    pub devices: Option<Vec<Device>>,
    pub concurrency: Option<usize>,
    pub chunk_size: Option<usize>,
    pub chunk_delay_secs: u64,
    pub device_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub measure_timeout_secs: u64,
    pub settle_delay_secs: u64,
    /// Chrome or Chromium binary for browser mode; auto-detected when unset.
    pub chrome_executable: Option<PathBuf>,
    pub user_agent: String,
    pub pagespeed: PageSpeedSettings,
    pub smtp: SmtpSettings,
    pub recipients: Vec<String>,
    pub cleanup: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sitemap_url: String::new(),
            project_name: "sitepulse".to_string(),
            output_dir: PathBuf::from("reports"),
            mode: MeasureMode::default(),
            devices: None,
            concurrency: None,
            chunk_size: None,
            chunk_delay_secs: 5,
            device_delay_secs: 1,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            measure_timeout_secs: 60,
            settle_delay_secs: 3,
            chrome_executable: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pagespeed: PageSpeedSettings::default(),
            smtp: SmtpSettings::default(),
            recipients: Vec::new(),
            cleanup: false,
        }
    }
}

impl AuditConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read a TOML config file. A leading `~` is expanded.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let expanded = shellexpand::tilde(path);
        let path = Path::new(expanded.as_ref());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Configured devices in first-seen order, without repeats.
    pub fn devices(&self) -> Vec<Device> {
        let configured = self
            .devices
            .clone()
            .unwrap_or_else(|| self.mode.default_devices());
        let mut unique = Vec::with_capacity(configured.len());
        for device in configured {
            if !unique.contains(&device) {
                unique.push(device);
            }
        }
        unique
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| self.mode.default_concurrency())
    }

    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size.or_else(|| self.mode.default_chunk_size())
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_secs(self.chunk_delay_secs)
    }

    pub fn device_delay(&self) -> Duration {
        Duration::from_secs(self.device_delay_secs)
    }

    pub fn measure_timeout(&self) -> Duration {
        Duration::from_secs(self.measure_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    /// Mail goes out only with a relay, a sender and at least one recipient.
    pub fn email_enabled(&self) -> bool {
        self.smtp.server.is_some() && self.smtp.sender.is_some() && !self.recipients.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = Url::parse(&self.sitemap_url).map_err(|e| {
            ConfigError::Invalid(format!("sitemap URL '{}': {}", self.sitemap_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "sitemap URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == Some(0) {
            return Err(ConfigError::Invalid(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if self.devices().is_empty() {
            return Err(ConfigError::Invalid(
                "at least one device is required".to_string(),
            ));
        }
        if self.project_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "project name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults() {
        let mut config = AuditConfig::default();
        assert_eq!(config.concurrency(), 5);
        assert_eq!(config.chunk_size(), None);
        assert_eq!(config.devices(), vec![Device::Desktop]);

        config.mode = MeasureMode::PageSpeed;
        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.chunk_size(), Some(10));
        assert_eq!(config.devices(), vec![Device::Desktop, Device::Mobile]);
    }

    #[test]
    fn test_explicit_values_override_mode() {
        let config = AuditConfig {
            mode: MeasureMode::PageSpeed,
            concurrency: Some(2),
            chunk_size: Some(3),
            devices: Some(vec![Device::Mobile]),
            ..AuditConfig::default()
        };
        assert_eq!(config.concurrency(), 2);
        assert_eq!(config.chunk_size(), Some(3));
        assert_eq!(config.devices(), vec![Device::Mobile]);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("PageSpeed".parse::<MeasureMode>(), Ok(MeasureMode::PageSpeed));
        assert_eq!("browser".parse::<MeasureMode>(), Ok(MeasureMode::Browser));
        assert!("lighthouse".parse::<MeasureMode>().is_err());
    }

    #[test]
    fn test_pagespeed_metrics_exclude_load_time() {
        let metrics = MeasureMode::PageSpeed.metrics();
        assert_eq!(metrics.len(), 14);
        assert!(!metrics.contains(&Metric::LoadTime));
        assert!(metrics.contains(&MeasureMode::PageSpeed.primary_metric()));
    }
}
