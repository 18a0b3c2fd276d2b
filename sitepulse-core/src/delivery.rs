//! Emailing the packaged report.

use crate::audit::AuditRun;
use crate::classify::Rating;
use crate::config::SmtpSettings;
use crate::report::{detail_sheet_name, summary_rows};
use chrono::{DateTime, Local};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Email delivery is not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Failed to read attachment: {0}")]
    Attachment(#[from] std::io::Error),
}

/// `15-Mar-2024 02:30 PM`
pub fn format_report_date(date: &DateTime<Local>) -> String {
    date.format("%d-%b-%Y %I:%M %p").to_string()
}

pub fn compose_subject(run: &AuditRun) -> String {
    format!(
        "{} Performance Report - {}",
        run.project_name,
        format_report_date(&run.started_at)
    )
}

/// Plain-text body summarising the run, one block per device.
pub fn compose_summary_body(run: &AuditRun, attachment_name: &str) -> String {
    let mut body = String::new();
    body.push_str("Greetings,\n\n");
    body.push_str(&format!(
        "Kindly review the outcomes of a recent performance assessment for the website, \
         sourcing URLs directly from the sitemap: {}.\n\n",
        run.sitemap_url
    ));
    body.push_str(&format!(
        "Report Generated: {}\n\n",
        format_report_date(&run.started_at)
    ));
    body.push_str(
        "Note: This report only includes URLs with 0 or 1 path segment ending with '/'.\n\n",
    );
    body.push_str("Here is a summary of the findings:\n");
    body.push_str(&format!("Total URLs analyzed: {}\n", run.filtered));

    for device in &run.devices {
        let summary = run.summary(*device);
        body.push('\n');
        if run.devices.len() > 1 {
            body.push_str(&format!(
                "{} - {} Summary:\n",
                detail_sheet_name(*device, run.devices.len()),
                run.primary_metric.display_name()
            ));
        } else {
            body.push_str(&format!("{} Summary:\n", run.primary_metric.display_name()));
        }
        for (rating, (label, count, _)) in Rating::LIVE.iter().zip(summary_rows(&summary)) {
            body.push_str(&format!(
                " - {}: {} ({:.1}%)\n",
                label,
                count,
                summary.percentage(*rating)
            ));
        }
        if summary.not_available > 0 {
            body.push_str(&format!(" - N/A: {}\n", summary.not_available));
        }
    }

    body.push_str(&format!(
        "\nDetailed report attached in ZIP folder: '{}'\n",
        attachment_name
    ));
    body.push_str(&format!(
        "Execution time: {} minutes\n\n",
        run.elapsed_minutes()
    ));
    body.push_str(
        "Please review the attached report and let us know if you have any questions.\n",
    );
    body
}

/// Sends reports through an SMTP relay using STARTTLS.
pub struct Mailer {
    settings: SmtpSettings,
}

impl Mailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    /// Assemble the message without sending it.
    pub fn build_message(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
        attachment_path: &Path,
    ) -> Result<Message, DeliveryError> {
        let sender = self
            .settings
            .sender
            .as_deref()
            .ok_or_else(|| DeliveryError::NotConfigured("no sender address".to_string()))?;
        if recipients.is_empty() {
            return Err(DeliveryError::NotConfigured("no recipients".to_string()));
        }

        let mut builder = Message::builder()
            .from(sender.parse::<Mailbox>()?)
            .subject(subject);
        for recipient in recipients {
            builder = builder.to(recipient.parse::<Mailbox>()?);
        }

        let file_name = attachment_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "report.zip".to_string());
        let content_type = ContentType::parse("application/zip")
            .map_err(|e| DeliveryError::Message(e.to_string()))?;
        let attachment = Attachment::new(file_name).body(std::fs::read(attachment_path)?, content_type);

        builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body.to_string()))
                    .singlepart(attachment),
            )
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }

    pub async fn send_report(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
        attachment_path: &Path,
    ) -> Result<(), DeliveryError> {
        let server = self
            .settings
            .server
            .as_deref()
            .ok_or_else(|| DeliveryError::NotConfigured("no SMTP server".to_string()))?;
        let message = self.build_message(subject, body, recipients, attachment_path)?;

        let mut transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)?
            .port(self.settings.port);
        if let (Some(username), Some(password)) =
            (&self.settings.username, &self.settings.password)
        {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }

        transport.build().send(message).await?;
        info!("Email sent to {}", recipients.join(", "));
        Ok(())
    }
}
