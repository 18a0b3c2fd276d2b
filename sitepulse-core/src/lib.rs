pub mod audit;
pub mod classify;
pub mod config;
pub mod delivery;
pub mod package;
pub mod report;

use colored::Colorize;

pub use audit::{AuditError, AuditOutcome, AuditRun, build_measurer, execute_audit};
pub use classify::{ClassifiedRecord, Rating, RatingSummary, classify, summarize};
pub use config::{AuditConfig, ConfigError, MeasureMode};
pub use delivery::{DeliveryError, Mailer, compose_subject, compose_summary_body};
pub use package::package_directory;
pub use report::{ReportError, ReportOptions, run_directory, write_workbook};

pub fn print_banner() {
    println!(
        "{}",
        r#"
     _ _                   _
 ___(_) |_ ___ _ __  _   _| |___  ___
/ __| | __/ _ \ '_ \| | | | / __|/ _ \
\__ \ | ||  __/ |_) | |_| | \__ \  __/
|___/_|\__\___| .__/ \__,_|_|___/\___|
              |_|
"#
        .bright_cyan()
        .bold()
    );
    println!(
        "{}\n",
        format!("  sitemap-driven page performance audits  v{}", env!("CARGO_PKG_VERSION"))
            .dimmed()
    );
}
