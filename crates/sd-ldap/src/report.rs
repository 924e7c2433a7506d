//! Maintenance reports over all users.
//!
//! The report lists accounts that need attention: users who have left but
//! are still active, users leaving soon, and inactive users whose mailbox
//! was left active. Scheduling the report is up to the caller.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use sd_core::{AccountResult, MailSender};
use sd_model::{User, UserState};

use crate::config::ExitDateBoundary;
use crate::directory::Directory;
use crate::service::DirectoryService;

/// Number of users fetched per page while scanning.
pub const BLOCK_SIZE: usize = 250;

/// Weeks ahead within which leaving users are notified individually.
pub const EXPIRY_NOTICE_WEEKS: u64 = 2;

/// One reported account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Login name.
    pub uid: String,
    /// Given and family name.
    pub name: String,
    /// Mail address.
    pub mail: String,
    /// Company display name.
    pub organization: String,
    /// Exit date, if set.
    pub exit_date: Option<NaiveDate>,
}

impl From<&User> for ReportEntry {
    fn from(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            name: user.full_name(),
            mail: user.mail.clone(),
            organization: user.organization.clone(),
            exit_date: user.exit_date,
        }
    }
}

impl ReportEntry {
    fn line(&self) -> String {
        match self.exit_date {
            Some(date) => {
                format!("{} ({}, {}) exit {date}", self.name, self.uid, self.organization)
            }
            None => format!("{} ({}, {})", self.name, self.uid, self.organization),
        }
    }
}

/// Accounts needing maintenance, each list ordered by exit date then uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Reference date.
    pub today: NaiveDate,
    /// End of the look-ahead window.
    pub horizon: NaiveDate,
    /// Active users whose exit date has passed.
    pub exited_active: Vec<ReportEntry>,
    /// Active users leaving before the horizon.
    pub leaving_soon: Vec<ReportEntry>,
    /// Inactive users with an active mailbox.
    pub active_mail_on_inactive: Vec<ReportEntry>,
}

impl MaintenanceReport {
    /// Returns whether nothing needs attention.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exited_active.is_empty()
            && self.leaving_soon.is_empty()
            && self.active_mail_on_inactive.is_empty()
    }

    /// Renders the plain-text summary mailed to administrators.
    #[must_use]
    pub fn render(&self) -> String {
        let sections = [
            ("Exited but still active".to_string(), &self.exited_active),
            (format!("Leaving before {}", self.horizon), &self.leaving_soon),
            ("Inactive with active mailbox".to_string(), &self.active_mail_on_inactive),
        ];
        let mut body = format!("Directory maintenance report for {}\n", self.today);
        for (title, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            body.push_str(&format!("\n{title}:\n"));
            for entry in entries {
                body.push_str("  ");
                body.push_str(&entry.line());
                body.push('\n');
            }
        }
        body
    }
}

fn has_exited(exit: NaiveDate, today: NaiveDate, boundary: ExitDateBoundary) -> bool {
    match boundary {
        ExitDateBoundary::Exclusive => exit < today,
        ExitDateBoundary::Inclusive => exit <= today,
    }
}

fn sort_entries(entries: &mut [ReportEntry]) {
    entries.sort_by(|a, b| a.exit_date.cmp(&b.exit_date).then_with(|| a.uid.cmp(&b.uid)));
}

impl DirectoryService {
    /// Scans all users and builds the maintenance report.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a page cannot be read.
    pub async fn unmaintained_report(
        &self,
        conn: &mut dyn Directory,
        today: NaiveDate,
        weeks: u64,
    ) -> AccountResult<MaintenanceReport> {
        let boundary = self.config().policy.exit_date_boundary;
        let horizon = today.checked_add_days(Days::new(weeks * 7)).unwrap_or(today);
        let mut report = MaintenanceReport {
            today,
            horizon,
            exited_active: Vec::new(),
            leaving_soon: Vec::new(),
            active_mail_on_inactive: Vec::new(),
        };

        let total = self.user_count(conn).await?;
        let mut first = 0;
        while first < total {
            let block = self.get_users(conn, first, BLOCK_SIZE).await?;
            if block.is_empty() {
                break;
            }
            first += block.len();
            for user in &block {
                if user.is_active() {
                    match user.exit_date {
                        Some(exit) if has_exited(exit, today, boundary) => {
                            report.exited_active.push(user.into());
                        }
                        Some(exit) if exit < horizon => report.leaving_soon.push(user.into()),
                        _ => {}
                    }
                } else if user.mail_status == UserState::Active {
                    report.active_mail_on_inactive.push(user.into());
                }
            }
        }

        sort_entries(&mut report.exited_active);
        sort_entries(&mut report.leaving_soon);
        sort_entries(&mut report.active_mail_on_inactive);
        tracing::info!(
            exited = report.exited_active.len(),
            leaving = report.leaving_soon.len(),
            mailboxes = report.active_mail_on_inactive.len(),
            "maintenance report built"
        );
        Ok(report)
    }
}

/// Mails the report to `recipients`. Empty reports are not sent.
///
/// Returns whether a mail was accepted.
pub async fn notify_unmaintained(
    report: &MaintenanceReport,
    sender: &dyn MailSender,
    recipients: &[String],
) -> bool {
    if report.is_empty() {
        tracing::debug!("maintenance report empty, nothing sent");
        return false;
    }
    let subject = format!("Directory maintenance report {}", report.today);
    sender.send(recipients, &subject, &report.render()).await
}

/// Mails each user leaving within the notice period individually.
///
/// Returns the number of accepted mails.
pub async fn notify_expiring(
    report: &MaintenanceReport,
    sender: &dyn MailSender,
    today: NaiveDate,
) -> usize {
    let threshold = today
        .checked_add_days(Days::new(EXPIRY_NOTICE_WEEKS * 7))
        .unwrap_or(today);
    let mut sent = 0;
    for entry in &report.leaving_soon {
        let Some(exit) = entry.exit_date.filter(|exit| *exit < threshold) else {
            continue;
        };
        if entry.mail.is_empty() {
            tracing::warn!(uid = %entry.uid, "leaving user without mail address");
            continue;
        }
        let subject = format!("Your account expires on {exit}");
        let body = format!(
            "Hello {},\n\nyour account {} will be deactivated after {exit}.\n",
            entry.name, entry.uid
        );
        if sender.send(std::slice::from_ref(&entry.mail), &subject, &body).await {
            sent += 1;
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::config::{LdapConfig, Policy};
    use crate::entry::LdapEntry;
    use crate::memory::MemoryDirectory;

    const USERS: &str = "ou=users,ou=acme,dc=example,dc=org";

    struct NeverPwned;

    #[async_trait]
    impl sd_auth::BreachCheck for NeverPwned {
        async fn is_pwned(&self, _password: &str) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(Vec<String>, String)>>,
    }

    #[async_trait]
    impl MailSender for RecordingSender {
        async fn send(&self, recipients: &[String], subject: &str, _body: &str) -> bool {
            self.sent.lock().push((recipients.to_vec(), subject.to_string()));
            true
        }
    }

    fn service(boundary: ExitDateBoundary) -> DirectoryService {
        let config = LdapConfig::builder()
            .connection_url("ldaps://localhost:636")
            .bind_dn("cn=admin,dc=example,dc=org")
            .bind_credential("secret")
            .base_dn("dc=example,dc=org")
            .company("acme", "ACME Corp", format!("uid={{uid}},{USERS}"))
            .policy(Policy {
                exit_date_boundary: boundary,
                ..Policy::default()
            })
            .build()
            .unwrap();
        DirectoryService::new(Arc::new(config), Arc::new(NeverPwned))
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn person(uid: &str, status: &str, mail_status: &str, exit: Option<NaiveDate>) -> LdapEntry {
        let entry = LdapEntry::new(format!("uid={uid},{USERS}"))
            .with_attr("objectClass", ["inetOrgPerson", "posixAccount"])
            .with_attr("uid", [uid])
            .with_attr("uidNumber", ["1001"])
            .with_attr("givenName", ["Test"])
            .with_attr("sn", [uid])
            .with_attr("mail", [format!("{uid}@example.org")])
            .with_attr("szzStatus", [status])
            .with_attr("szzMailStatus", [mail_status]);
        match exit {
            Some(exit) => entry.with_attr("szzExitDate", [crate::codec::format_date(exit)]),
            None => entry,
        }
    }

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new()
            .with_entry(person("gone", "active", "active", Some(date(1))))
            .with_entry(person("today", "active", "active", Some(date(10))))
            .with_entry(person("soon", "active", "active", Some(date(20))))
            .with_entry(person("later", "active", "active", Some(date(30))))
            .with_entry(person("stays", "active", "active", None))
            .with_entry(person("mailbox", "inactive", "active", Some(date(1))))
            .with_entry(person("clean", "inactive", "inactive", Some(date(1))))
    }

    fn uids(entries: &[ReportEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.uid.as_str()).collect()
    }

    #[tokio::test]
    async fn exclusive_boundary_keeps_today_as_leaving() {
        let svc = service(ExitDateBoundary::Exclusive);
        let mut dir = directory();

        let report = svc.unmaintained_report(&mut dir, date(10), 2).await.unwrap();
        assert_eq!(uids(&report.exited_active), ["gone"]);
        assert_eq!(uids(&report.leaving_soon), ["today", "soon"]);
        assert_eq!(uids(&report.active_mail_on_inactive), ["mailbox"]);
        assert_eq!(report.horizon, date(24));
    }

    #[tokio::test]
    async fn inclusive_boundary_counts_today_as_exited() {
        let svc = service(ExitDateBoundary::Inclusive);
        let mut dir = directory();

        let report = svc.unmaintained_report(&mut dir, date(10), 2).await.unwrap();
        assert_eq!(uids(&report.exited_active), ["gone", "today"]);
        assert_eq!(uids(&report.leaving_soon), ["soon"]);
    }

    #[tokio::test]
    async fn notifications_go_to_admins_and_leaving_users() {
        let svc = service(ExitDateBoundary::Exclusive);
        let mut dir = directory();
        let report = svc.unmaintained_report(&mut dir, date(10), 4).await.unwrap();
        assert_eq!(uids(&report.leaving_soon), ["today", "soon", "later"]);

        let sender = RecordingSender::default();
        let admins = vec!["it@example.org".to_string()];
        assert!(notify_unmaintained(&report, &sender, &admins).await);
        assert_eq!(notify_expiring(&report, &sender, date(10)).await, 2);

        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].0, admins);
        assert_eq!(sent[1].0, ["today@example.org"]);
        assert_eq!(sent[2].0, ["soon@example.org"]);
    }

    #[tokio::test]
    async fn empty_report_is_not_sent() {
        let svc = service(ExitDateBoundary::Exclusive);
        let mut dir = MemoryDirectory::new().with_entry(person("stays", "active", "active", None));
        let report = svc.unmaintained_report(&mut dir, date(10), 2).await.unwrap();
        assert!(report.is_empty());

        let sender = RecordingSender::default();
        assert!(!notify_unmaintained(&report, &sender, &["it@example.org".to_string()]).await);
        assert!(sender.sent.lock().is_empty());
    }

    #[test]
    fn render_lists_sections() {
        let entry = ReportEntry {
            uid: "doejan".into(),
            name: "Jane Doe".into(),
            mail: "jane.doe@example.org".into(),
            organization: "ACME Corp".into(),
            exit_date: Some(date(1)),
        };
        let report = MaintenanceReport {
            today: date(10),
            horizon: date(24),
            exited_active: vec![entry],
            leaving_soon: Vec::new(),
            active_mail_on_inactive: Vec::new(),
        };
        let body = report.render();
        assert!(body.contains("Exited but still active:"));
        assert!(body.contains("Jane Doe (doejan, ACME Corp) exit 2024-06-01"));
        assert!(!body.contains("Leaving before"));
    }
}
