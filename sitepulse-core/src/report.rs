//! Spreadsheet report: a summary sheet followed by one detail sheet per
//! device.

use crate::audit::AuditRun;
use crate::classify::{ClassifiedRecord, Rating, RatingSummary, bucket_label};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use sitepulse_scanner::{Device, Metric};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const HEADER_FILL: u32 = 0x4472C4;
const URL_COLUMN_WIDTH: f64 = 60.0;
const METRIC_COLUMN_WIDTH: f64 = 22.0;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub output_dir: PathBuf,
    /// Add an HTTP status column when the measurer records one.
    pub include_status: bool,
    /// Used for the file name; the run's start time when unset.
    pub timestamp: Option<DateTime<Local>>,
}

impl ReportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            include_status: true,
            timestamp: None,
        }
    }
}

pub fn report_file_name(project: &str, timestamp: &DateTime<Local>) -> String {
    format!(
        "{}_performance_report_{}.xlsx",
        project,
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// Per-run directory under the output root; each run writes, packages and
/// cleans up only its own directory.
pub fn run_directory(output_root: &Path, project: &str, timestamp: &DateTime<Local>) -> PathBuf {
    output_root.join(format!(
        "{}_performance_reports_{}",
        project,
        timestamp.format("%Y%m%d_%H%M%S")
    ))
}

/// Detail sheet name for `device` given how many devices the run covered.
pub fn detail_sheet_name(device: Device, device_count: usize) -> String {
    if device_count <= 1 {
        return "Detailed Report".to_string();
    }
    format!("{} Results", device_title(device))
}

fn device_title(device: Device) -> &'static str {
    match device {
        Device::Desktop => "Desktop",
        Device::Mobile => "Mobile",
    }
}

/// Sort by `metric`, largest first. Records without a usable value go last
/// and keep their relative order.
pub fn sort_records(records: &mut [&ClassifiedRecord], metric: Metric) {
    let key = |r: &ClassifiedRecord| r.value(metric).filter(|v| v.is_finite());
    records.sort_by(|a, b| match (key(a), key(b)) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// (label, count, percentage) for each live bucket of `summary`.
pub fn summary_rows(summary: &RatingSummary) -> Vec<(String, usize, String)> {
    Rating::LIVE
        .iter()
        .map(|rating| {
            (
                bucket_label(summary.metric, *rating),
                summary.count(*rating),
                format!("{:.2}%", summary.percentage(*rating)),
            )
        })
        .collect()
}

fn fill(rating: Rating) -> Format {
    Format::new()
        .set_background_color(Color::RGB(rating.fill_color()))
        .set_border(FormatBorder::Thin)
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin)
}

fn build_summary_sheet(run: &AuditRun) -> Result<Worksheet, ReportError> {
    let mut sheet = Worksheet::new();
    sheet.set_name("Summary")?;

    let title_format = Format::new()
        .set_bold()
        .set_font_size(14)
        .set_align(FormatAlign::Center);
    let header = header_format();
    let centered = Format::new()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let italic = Format::new().set_italic();
    let bold = Format::new().set_bold();

    let multi_device = run.devices.len() > 1;
    let mut row: u32 = 0;
    for device in &run.devices {
        let summary = run.summary(*device);
        let mut title = format!("{} Performance Summary", run.primary_metric.display_name());
        if multi_device {
            title = format!("{} ({})", title, device_title(*device));
        }
        sheet.merge_range(row, 0, row, 2, &title, &title_format)?;

        row += 2;
        for (col, text) in ["RAG Category", "Count", "Percentage"].iter().enumerate() {
            sheet.write_string_with_format(row, col as u16, *text, &header)?;
        }

        for (rating, (label, count, percentage)) in Rating::LIVE.iter().zip(summary_rows(&summary)) {
            row += 1;
            sheet.write_string_with_format(row, 0, label, &fill(*rating))?;
            sheet.write_number_with_format(row, 1, count as f64, &centered)?;
            sheet.write_string_with_format(row, 2, percentage, &centered)?;
        }

        row += 1;
        sheet.write_string_with_format(
            row,
            0,
            format!("N/A: {}", summary.not_available),
            &italic,
        )?;
        row += 2;
        sheet.write_string_with_format(
            row,
            0,
            format!("Total URLs Analyzed: {}", summary.total()),
            &bold,
        )?;
        row += 3;
    }

    sheet.set_column_width(0, 25)?;
    sheet.set_column_width(1, 15)?;
    sheet.set_column_width(2, 15)?;
    Ok(sheet)
}

fn build_detail_sheet(
    run: &AuditRun,
    device: Device,
    include_status: bool,
) -> Result<Worksheet, ReportError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(detail_sheet_name(device, run.devices.len()))?;

    let header = header_format();
    let mut headers = vec!["URL"];
    if include_status {
        headers.push("Status Code");
    }
    headers.extend(run.metrics.iter().map(|m| m.label()));
    for (col, text) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *text, &header)?;
    }

    let mut records = run.records_for(device);
    sort_records(&mut records, run.primary_metric);

    let first_metric_col: u16 = if include_status { 2 } else { 1 };
    for (idx, record) in records.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, record.result.url.as_str())?;
        if include_status {
            match record.result.status_code {
                Some(code) => sheet.write_number(row, 1, code as f64)?,
                None => sheet.write_string(row, 1, "N/A")?,
            };
        }
        for (offset, metric) in run.metrics.iter().enumerate() {
            let col = first_metric_col + offset as u16;
            let format = fill(record.rating(*metric)).set_num_format("0.00");
            match record.value(*metric).filter(|v| v.is_finite()) {
                Some(value) => sheet.write_number_with_format(row, col, value, &format)?,
                None => sheet.write_string_with_format(row, col, "N/A", &format)?,
            };
        }
    }

    sheet.set_column_width(0, URL_COLUMN_WIDTH)?;
    for col in 1..headers.len() as u16 {
        sheet.set_column_width(col, METRIC_COLUMN_WIDTH)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(sheet)
}

/// Write the workbook for `run` and return its path.
pub fn write_workbook(run: &AuditRun, options: &ReportOptions) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(&options.output_dir)?;
    let timestamp = options.timestamp.unwrap_or(run.started_at);
    let path = options
        .output_dir
        .join(report_file_name(&run.project_name, &timestamp));

    let mut workbook = Workbook::new();
    workbook.push_worksheet(build_summary_sheet(run)?);
    for device in &run.devices {
        workbook.push_worksheet(build_detail_sheet(run, *device, options.include_status)?);
    }
    workbook.save(&path)?;

    info!("Report saved to {}", path.display());
    Ok(path)
}
