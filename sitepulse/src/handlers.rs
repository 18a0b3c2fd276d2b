use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitepulse_core::audit::{AuditOutcome, AuditRun, build_measurer, execute_audit};
use sitepulse_core::classify::Rating;
use sitepulse_core::config::{AuditConfig, ConfigError, MeasureMode};
use sitepulse_core::delivery::{Mailer, compose_subject, compose_summary_body};
use sitepulse_core::package::package_directory;
use sitepulse_core::report::{ReportOptions, run_directory, summary_rows, write_workbook};
use sitepulse_scanner::filter::{filter_urls_with_stats, segment_distribution};
use sitepulse_scanner::sitemap::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use sitepulse_scanner::{Device, SitemapResolver};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
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

// Config layering

/// Layer the optional config file, then command line flags and secret
/// environment variables, over the built-in defaults.
pub fn build_config(args: &ArgMatches) -> Result<AuditConfig, ConfigError> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };

    if let Some(sitemap) = args.get_one::<Url>("sitemap") {
        config.sitemap_url = sitemap.to_string();
    }
    if let Some(mode) = args.get_one::<String>("mode") {
        config.mode = mode.parse::<MeasureMode>().map_err(ConfigError::Invalid)?;
    }
    if let Some(devices) = args.get_many::<String>("device") {
        let devices = devices
            .map(|d| d.parse::<Device>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConfigError::Invalid)?;
        config.devices = Some(devices);
    }
    if let Some(threads) = args.get_one::<usize>("threads") {
        config.concurrency = Some(*threads);
    }
    if let Some(size) = args.get_one::<usize>("chunk-size") {
        config.chunk_size = Some(*size);
    }
    if let Some(project) = args.get_one::<String>("project") {
        config.project_name = project.clone();
    }
    if let Some(output) = args.get_one::<PathBuf>("output") {
        let expanded = shellexpand::tilde(&output.to_string_lossy()).to_string();
        config.output_dir = PathBuf::from(expanded);
    }
    if args.get_flag("cleanup") {
        config.cleanup = true;
    }
    if let Some(chrome) = args.get_one::<PathBuf>("chrome") {
        config.chrome_executable = Some(chrome.clone());
    }
    if let Some(key) = args.get_one::<String>("api-key") {
        config.pagespeed.api_key = Some(key.clone());
    }
    if let Some(username) = args.get_one::<String>("smtp-username") {
        config.smtp.username = Some(username.clone());
    }
    if let Some(password) = args.get_one::<String>("smtp-password") {
        config.smtp.password = Some(password.clone());
    }

    Ok(config)
}

/// The zip sits beside the run directory and shares its name, so packaging
/// never has to archive itself.
pub fn archive_path(run_dir: &Path) -> PathBuf {
    let name = run_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "performance_reports".to_string());
    let parent = run_dir.parent().unwrap_or(run_dir);
    parent.join(format!("{}.zip", name))
}

/// Remove one run's directory and its archive once delivery succeeded.
pub fn cleanup_artifacts(run_dir: &Path, zip_path: &Path) {
    if let Err(e) = fs::remove_dir_all(run_dir) {
        warn!("Could not remove {}: {}", run_dir.display(), e);
    }
    if let Err(e) = fs::remove_file(zip_path) {
        warn!("Could not remove {}: {}", zip_path.display(), e);
    }
    info!("Cleaned up {} and {}", run_dir.display(), zip_path.display());
}

// Audit

pub async fn handle_audit(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let config = build_config(args).context("Invalid configuration")?;
    config.validate().context("Invalid configuration")?;

    if !quiet {
        print_divider();
        println!("{}", "  SITEPULSE AUDIT".bright_white().bold());
        print_divider();
        println!("{} Sitemap: {}", "→".blue(), config.sitemap_url.bright_white());
        println!(
            "{} Mode: {} on {}",
            "→".blue(),
            config.mode.to_string().bright_white(),
            config
                .devices()
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
                .bright_white()
        );
        println!(
            "{} Workers: {}",
            "→".blue(),
            config.concurrency().to_string().bright_white()
        );
        println!();
    }

    let measurer = build_measurer(&config)?;
    let run = match execute_audit(&config, measurer, !quiet).await? {
        AuditOutcome::NoData { discovered } => {
            println!(
                "{} No data to report: {} URLs discovered, none with 0 or 1 path segments to measure.",
                "⚠".yellow().bold(),
                discovered
            );
            return Ok(());
        }
        AuditOutcome::Completed(run) => run,
    };

    let run_dir = run_directory(&config.output_dir, &run.project_name, &run.started_at);
    let options = ReportOptions {
        include_status: config.mode == MeasureMode::Browser,
        ..ReportOptions::new(run_dir.clone())
    };
    let workbook = write_workbook(&run, &options).context("Failed to write the report")?;

    if !quiet {
        print_run_summary(&run, &workbook);
    }

    if args.get_flag("no-email") {
        info!("Email delivery skipped (--no-email)");
        return Ok(());
    }
    if !config.email_enabled() {
        info!("Email delivery not configured; report left at {}", workbook.display());
        return Ok(());
    }

    let zip_path = archive_path(&run_dir);
    let delivered = match deliver(&config, &run, &run_dir, &zip_path).await {
        Ok(()) => {
            println!(
                "{} Report emailed to {}",
                "✓".green().bold(),
                config.recipients.join(", ").bright_white()
            );
            true
        }
        Err(e) => {
            warn!("Report delivery failed: {:#}", e);
            println!(
                "{} Delivery failed; the report is still at {}",
                "⚠".yellow().bold(),
                workbook.display()
            );
            false
        }
    };

    if delivered && config.cleanup {
        cleanup_artifacts(&run_dir, &zip_path);
    }

    Ok(())
}

async fn deliver(
    config: &AuditConfig,
    run: &AuditRun,
    run_dir: &Path,
    zip_path: &Path,
) -> anyhow::Result<()> {
    let zip_path = package_directory(run_dir, zip_path)
        .context("Failed to package the report")?;
    let attachment_name = zip_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mailer = Mailer::new(config.smtp.clone());
    mailer
        .send_report(
            &compose_subject(run),
            &compose_summary_body(run, &attachment_name),
            &config.recipients,
            &zip_path,
        )
        .await?;
    Ok(())
}

fn print_run_summary(run: &AuditRun, workbook: &Path) {
    println!();
    print_divider();
    println!("{}", "  RESULTS".bright_white().bold());
    print_divider();
    println!(
        "{} {} discovered, {} measured",
        "→".blue(),
        run.discovered.to_string().bright_white(),
        run.filtered.to_string().bright_white()
    );

    for device in &run.devices {
        let summary = run.summary(*device);
        println!();
        println!(
            "{} {}",
            device.to_string().to_uppercase().bright_blue().bold(),
            run.primary_metric.label().dimmed()
        );
        for (rating, (label, count, pct)) in Rating::LIVE.iter().zip(summary_rows(&summary)) {
            let label = match rating {
                Rating::Good => label.green(),
                Rating::Moderate => label.yellow(),
                _ => label.red(),
            };
            println!("  {} {:<28} {:>5}  {}", "•".blue(), label, count, pct.dimmed());
        }
        println!("  {} {:<28} {:>5}", "•".blue(), "N/A".dimmed(), summary.not_available);
    }

    println!();
    println!(
        "{} Report written to {}",
        "✓".green().bold(),
        workbook.display().to_string().bright_white()
    );
    println!(
        "{} Finished in {} minutes",
        "✓".green().bold(),
        run.elapsed_minutes()
    );
}

// Discover

pub async fn handle_discover(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let sitemap = args
        .get_one::<Url>("sitemap")
        .context("A sitemap URL is required")?;
    let timeout = args
        .get_one::<u64>("timeout")
        .copied()
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let show_all = args.get_flag("all");

    let resolver = SitemapResolver::with_settings(DEFAULT_USER_AGENT, timeout)?;
    let pb = (!quiet).then(|| spinner("Resolving sitemap..."));
    let report = resolver.resolve_with_report(sitemap.as_str()).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut discovered: Vec<String> = report.urls.into_iter().collect();
    discovered.sort();
    let (filtered, stats) = filter_urls_with_stats(&discovered);

    let listing = if show_all { &discovered } else { &filtered };
    for url in listing {
        println!("{}", url);
    }

    if !quiet {
        println!();
        print_divider();
        println!(
            "{} {} sitemaps fetched, {} failed",
            "→".blue(),
            report.sitemaps_fetched,
            report.sitemaps_failed
        );
        println!(
            "{} {} URLs discovered, {} kept ({} root, {} one segment)",
            "→".blue(),
            discovered.len().to_string().bright_white(),
            filtered.len().to_string().bright_white(),
            stats.root,
            stats.single_segment
        );
        for line in distribution_lines(&segment_distribution(&discovered)) {
            println!("  {} {}", "•".blue(), line);
        }
    }

    Ok(())
}

/// One line per path depth, shallowest first.
pub fn distribution_lines(distribution: &BTreeMap<usize, usize>) -> Vec<String> {
    distribution
        .iter()
        .map(|(segments, count)| {
            let unit = if *segments == 1 { "segment" } else { "segments" };
            format!("{} {}: {} URLs", segments, unit, count)
        })
        .collect()
}
