// Tests for configuration loading and validation

use sitepulse_core::config::{AuditConfig, ConfigError, MeasureMode};
use sitepulse_scanner::Device;
use std::io::Write;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
sitemap_url = "https://www.example.com/sitemap.xml"
project_name = "example"
output_dir = "out/reports"
mode = "pagespeed"
devices = ["mobile"]
concurrency = 2
chunk_delay_secs = 10
recipients = ["ops@example.com"]
cleanup = true

[pagespeed]
api_key = "abc123"
locale = "de"

[smtp]
server = "smtp.example.com"
sender = "audit@example.com"
"#;

#[test]
fn test_parse_full_config() {
    let config = AuditConfig::from_toml_str(FULL_CONFIG).unwrap();

    assert_eq!(config.mode, MeasureMode::PageSpeed);
    assert_eq!(config.devices(), vec![Device::Mobile]);
    assert_eq!(config.concurrency(), 2);
    assert_eq!(config.chunk_size(), Some(10));
    assert_eq!(config.chunk_delay_secs, 10);
    assert_eq!(config.pagespeed.api_key.as_deref(), Some("abc123"));
    assert_eq!(config.pagespeed.locale, "de");
    assert_eq!(config.pagespeed.categories.len(), 4);
    assert_eq!(config.smtp.port, 587);
    assert!(config.cleanup);
    assert!(config.email_enabled());
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = AuditConfig::from_toml_str("").unwrap();
    assert_eq!(config, AuditConfig::default());
    assert_eq!(config.measure_timeout_secs, 60);
    assert_eq!(config.request_timeout_secs, 30);
    assert!(!config.email_enabled());
}

#[test]
fn test_unknown_mode_is_parse_error() {
    let result = AuditConfig::from_toml_str(r#"mode = "lighthouse""#);
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{}", FULL_CONFIG)?;

    let config = AuditConfig::load(&file.path().to_string_lossy())?;
    assert_eq!(config.project_name, "example");
    Ok(())
}

#[test]
fn test_load_missing_file() {
    let result = AuditConfig::load("/nonexistent/sitepulse/config.toml");
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

// ============================================================================
// Validation
// ============================================================================

fn valid() -> AuditConfig {
    AuditConfig {
        sitemap_url: "https://example.com/sitemap.xml".to_string(),
        ..AuditConfig::default()
    }
}

#[test]
fn test_validate_accepts_defaults_with_sitemap() {
    assert!(valid().validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_sitemap_url() {
    let mut config = valid();
    config.sitemap_url = "not a url".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    config.sitemap_url = "file:///tmp/sitemap.xml".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_validate_rejects_zero_concurrency_and_chunk() {
    let mut config = valid();
    config.concurrency = Some(0);
    assert!(config.validate().is_err());

    let mut config = valid();
    config.chunk_size = Some(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_empty_devices() {
    let mut config = valid();
    config.devices = Some(Vec::new());
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_repeated_devices_are_collapsed() {
    let config = AuditConfig::from_toml_str(
        r#"
sitemap_url = "https://example.com/sitemap.xml"
devices = ["desktop", "mobile", "desktop"]
"#,
    )
    .unwrap();

    assert!(config.validate().is_ok());
    assert_eq!(config.devices(), vec![Device::Desktop, Device::Mobile]);
}

#[test]
fn test_chrome_executable_from_file() {
    let config = AuditConfig::from_toml_str(r#"chrome_executable = "/usr/bin/chromium""#).unwrap();
    assert_eq!(
        config.chrome_executable,
        Some(std::path::PathBuf::from("/usr/bin/chromium"))
    );
}
