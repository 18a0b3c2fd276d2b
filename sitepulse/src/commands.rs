use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitepulse")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitepulse")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log per-URL decisions and worker activity")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("audit")
                .about(
                    "Discover pages from a sitemap, measure them and write a RAG-coloured \
                spreadsheet report, optionally emailed as a zip.",
                )
                .arg(
                    arg!(-s --"sitemap" <URL>)
                        .required(false)
                        .help("Sitemap or sitemap index URL (overrides the config file)")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("TOML configuration file"),
                )
                .arg(
                    arg!(-m --"mode" <MODE>)
                        .required(false)
                        .help("Measurement source: headless browser timing or the PageSpeed Insights API")
                        .value_parser(["browser", "pagespeed"]),
                )
                .arg(
                    arg!(-d --"device" <DEVICE>)
                        .required(false)
                        .help("Device profile to measure; repeat for several")
                        .value_parser(["desktop", "mobile"])
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Number of pages measured concurrently")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"chunk-size" <NUM_URLS>)
                        .required(false)
                        .help("Submit URLs in chunks of this size, pausing between chunks")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-p --"project" <NAME>)
                        .required(false)
                        .help("Project name used in report and archive file names"),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Root directory; each run writes into its own timestamped subdirectory")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"chrome" <PATH>)
                        .required(false)
                        .help("Chrome or Chromium binary used in browser mode")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"no-email")
                        .required(false)
                        .help("Write the report but do not package or email it")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"cleanup")
                        .required(false)
                        .help("Remove the report directory and archive after a successful delivery")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"api-key" <KEY>)
                        .required(false)
                        .help("PageSpeed Insights API key")
                        .env("SITEPULSE_PAGESPEED_KEY")
                        .hide_env_values(true),
                )
                .arg(
                    arg!(--"smtp-username" <USER>)
                        .required(false)
                        .help("SMTP username")
                        .env("SITEPULSE_SMTP_USERNAME"),
                )
                .arg(
                    arg!(--"smtp-password" <PASSWORD>)
                        .required(false)
                        .help("SMTP password")
                        .env("SITEPULSE_SMTP_PASSWORD")
                        .hide_env_values(true),
                ),
        )
        .subcommand(
            command!("discover")
                .about("Resolve a sitemap and list the pages an audit would measure")
                .arg(
                    arg!(-s --"sitemap" <URL>)
                        .required(true)
                        .help("Sitemap or sitemap index URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"all")
                        .required(false)
                        .help("List every discovered URL, not only those that pass the filter")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Timeout for each sitemap request")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30"),
                ),
        )
}
