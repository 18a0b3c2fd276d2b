use sitepulse::commands::command_argument_builder;
use sitepulse::handlers::*;
use sitepulse_core::config::MeasureMode;
use sitepulse_core::package::package_directory;
use sitepulse_scanner::Device;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn audit_matches(args: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["sitepulse", "audit"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    matches.subcommand_matches("audit").unwrap().clone()
}

#[test]
fn test_cli_flags_build_config() {
    let matches = audit_matches(&[
        "--sitemap",
        "https://example.com/sitemap.xml",
        "--mode",
        "pagespeed",
        "--device",
        "mobile",
        "--device",
        "desktop",
        "--device",
        "mobile",
        "--threads",
        "2",
        "--project",
        "acme",
        "--output",
        "out",
        "--api-key",
        "secret",
        "--cleanup",
    ]);
    let config = build_config(&matches).unwrap();

    assert_eq!(config.sitemap_url, "https://example.com/sitemap.xml");
    assert_eq!(config.mode, MeasureMode::PageSpeed);
    assert_eq!(config.devices(), vec![Device::Mobile, Device::Desktop]);
    assert_eq!(config.concurrency(), 2);
    // Chunking follows the mode default when not given.
    assert_eq!(config.chunk_size(), Some(10));
    assert_eq!(config.project_name, "acme");
    assert_eq!(config.output_dir, PathBuf::from("out"));
    assert_eq!(config.pagespeed.api_key.as_deref(), Some("secret"));
    assert!(config.cleanup);
    assert!(config.validate().is_ok());
}

#[test]
fn test_cli_overrides_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, r#"sitemap_url = "https://old.example.com/sitemap.xml""#)?;
    writeln!(file, r#"project_name = "from-file""#)?;
    writeln!(file, "concurrency = 8")?;

    let config_path = file.path().to_string_lossy().to_string();
    let matches = audit_matches(&[
        "--config",
        &config_path,
        "--sitemap",
        "https://new.example.com/sitemap.xml",
    ]);
    let config = build_config(&matches)?;

    assert_eq!(config.sitemap_url, "https://new.example.com/sitemap.xml");
    assert_eq!(config.project_name, "from-file");
    assert_eq!(config.concurrency(), 8);
    Ok(())
}

#[test]
fn test_missing_config_file_is_an_error() {
    let matches = audit_matches(&["--config", "/nonexistent/sitepulse.toml"]);
    assert!(build_config(&matches).is_err());
}

#[test]
fn test_unknown_mode_rejected_by_parser() {
    let result = command_argument_builder().try_get_matches_from([
        "sitepulse",
        "audit",
        "--mode",
        "lighthouse",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_subcommand_required() {
    let result = command_argument_builder().try_get_matches_from(["sitepulse"]);
    assert!(result.is_err());
}

#[test]
fn test_archive_path_sits_beside_run_directory() {
    let zip = archive_path(Path::new(
        "/srv/audits/reports/acme_performance_reports_20240502_093000",
    ));
    assert_eq!(
        zip,
        PathBuf::from("/srv/audits/reports/acme_performance_reports_20240502_093000.zip")
    );
}

fn zip_entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(|n| n.to_string()).collect();
    names.sort();
    names
}

#[test]
fn test_run_archive_holds_only_its_own_workbook() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let first = root.path().join("acme_performance_reports_20240101_000000");
    let second = root.path().join("acme_performance_reports_20240102_000000");
    std::fs::create_dir_all(&first)?;
    std::fs::create_dir_all(&second)?;
    std::fs::write(first.join("acme_performance_report_20240101_000000.xlsx"), b"one")?;
    std::fs::write(second.join("acme_performance_report_20240102_000000.xlsx"), b"two")?;

    let zip = archive_path(&second);
    package_directory(&second, &zip)?;

    assert_eq!(
        zip_entries(&zip),
        vec!["acme_performance_report_20240102_000000.xlsx".to_string()]
    );
    Ok(())
}

#[test]
fn test_cleanup_leaves_sibling_runs_alone() -> Result<(), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let earlier = root.path().join("acme_performance_reports_20240101_000000");
    let current = root.path().join("acme_performance_reports_20240102_000000");
    std::fs::create_dir_all(&earlier)?;
    std::fs::create_dir_all(&current)?;
    std::fs::write(earlier.join("report.xlsx"), b"old")?;
    std::fs::write(current.join("report.xlsx"), b"new")?;
    let zip = archive_path(&current);
    std::fs::write(&zip, b"PK")?;

    cleanup_artifacts(&current, &zip);

    assert!(!current.exists());
    assert!(!zip.exists());
    assert!(root.path().exists());
    assert!(earlier.join("report.xlsx").exists());
    Ok(())
}

#[test]
fn test_chrome_flag_sets_executable() {
    let matches = audit_matches(&["--chrome", "/opt/chromium/chrome"]);
    let config = build_config(&matches).unwrap();
    assert_eq!(
        config.chrome_executable,
        Some(PathBuf::from("/opt/chromium/chrome"))
    );
}

#[test]
fn test_distribution_lines() {
    let mut distribution = BTreeMap::new();
    distribution.insert(0, 1);
    distribution.insert(1, 4);
    distribution.insert(3, 2);

    assert_eq!(
        distribution_lines(&distribution),
        vec![
            "0 segments: 1 URLs".to_string(),
            "1 segment: 4 URLs".to_string(),
            "3 segments: 2 URLs".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_discover_against_mock_sitemap() {
    let server = MockServer::start().await;
    let body = format!(
        r#"<?xml version="1.0"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>{0}/</loc></url><url><loc>{0}/a/b/</loc></url></urlset>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let sitemap = format!("{}/sitemap.xml", server.uri());
    let matches = command_argument_builder()
        .try_get_matches_from(["sitepulse", "-q", "discover", "--sitemap", &sitemap, "--all"])
        .unwrap();
    let sub = matches.subcommand_matches("discover").unwrap();

    assert!(handle_discover(sub, true).await.is_ok());
}
