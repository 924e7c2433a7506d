//! Maintenance report commands.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::Tabled;

use sd_core::{LogOnlyMailSender, MailSender};
use sd_ldap::{
    notify_expiring, notify_unmaintained, Directory, DirectoryService, MaintenanceReport,
    ReportEntry,
};

use crate::cli::ReportCommand;
use crate::config::{OutputFormat, ReportConfig};
use crate::output::{heading, info, output, output_single, success, warning};

/// Report line for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct EntryRow {
    /// Login name.
    #[tabled(rename = "UID")]
    pub uid: String,
    /// Full name.
    #[tabled(rename = "Name")]
    pub name: String,
    /// Company display name.
    #[tabled(rename = "Organization")]
    pub organization: String,
    /// Exit date, if any.
    #[tabled(rename = "Exit")]
    pub exit_date: String,
}

impl From<&ReportEntry> for EntryRow {
    fn from(entry: &ReportEntry) -> Self {
        Self {
            uid: entry.uid.clone(),
            name: entry.name.clone(),
            organization: entry.organization.clone(),
            exit_date: entry.exit_date.map(|d| d.to_string()).unwrap_or_default(),
        }
    }
}

fn print_report(report: &MaintenanceReport, format: OutputFormat) -> crate::CliResult<()> {
    if format == OutputFormat::Json {
        return output_single(report, format);
    }
    info(&format!(
        "Accounts as of {} (looking ahead to {})",
        report.today, report.horizon
    ));
    let sections = [
        ("Exited but active", &report.exited_active),
        ("Leaving soon", &report.leaving_soon),
        ("Inactive with active mailbox", &report.active_mail_on_inactive),
    ];
    for (title, entries) in sections {
        heading(title, entries.len(), format);
        let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
        output(&rows, format)?;
    }
    Ok(())
}

/// Runs a report command, mailing through `sender`.
pub async fn run_report_with(
    cmd: ReportCommand,
    service: &DirectoryService,
    conn: &mut dyn Directory,
    settings: &ReportConfig,
    sender: &dyn MailSender,
    output_format: OutputFormat,
) -> crate::CliResult<MaintenanceReport> {
    match cmd {
        ReportCommand::Unmaintained {
            weeks,
            today,
            notify,
            notify_users,
        } => {
            let today: NaiveDate = today.unwrap_or_else(|| Local::now().date_naive());
            let weeks = weeks.unwrap_or(settings.weeks);
            let report = service.unmaintained_report(conn, today, weeks).await?;
            print_report(&report, output_format)?;

            if notify {
                if settings.recipients.is_empty() {
                    warning("no report recipients configured");
                } else if notify_unmaintained(&report, sender, &settings.recipients).await {
                    success("Report sent");
                }
            }
            if notify_users {
                let sent = notify_expiring(&report, sender, today).await;
                success(&format!("{sent} expiry notice(s) sent"));
            }
            Ok(report)
        }
    }
}

/// Runs a report command. Mail is written to the log.
pub async fn run_report(
    cmd: ReportCommand,
    service: &DirectoryService,
    conn: &mut dyn Directory,
    settings: &ReportConfig,
    output_format: OutputFormat,
) -> crate::CliResult<()> {
    run_report_with(cmd, service, conn, settings, &LogOnlyMailSender, output_format).await?;
    Ok(())
}
