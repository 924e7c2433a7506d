//! Mail-sending collaborator port.
//!
//! Transport and message composition live outside this workspace. The engine
//! only needs to hand over recipients, a subject and a plain-text body.

use async_trait::async_trait;

/// Sends plain-text notifications.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Sends a message and reports whether it was accepted for delivery.
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> bool;
}

/// Sender that only writes the message to the log.
#[derive(Debug, Clone, Default)]
pub struct LogOnlyMailSender;

#[async_trait]
impl MailSender for LogOnlyMailSender {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> bool {
        if recipients.is_empty() {
            tracing::warn!(subject, "mail without recipients dropped");
            return false;
        }
        tracing::info!(
            recipients = %recipients.join(", "),
            subject,
            body_len = body.len(),
            "mail logged instead of sent"
        );
        true
    }
}
