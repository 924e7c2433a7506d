//! Audit events for directory mutations.
//!
//! Every committed change to an account or a group membership is recorded as
//! an [`AuditEvent`] and emitted on the `audit` tracing target. Events include:
//! - Timestamp (UTC)
//! - Event type and outcome
//! - Affected uid and group, when known
//! - Free-form details

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Account events
    /// User entry created.
    UserCreated,
    /// User attributes modified.
    UserUpdated,
    /// User entry moved to another company subtree.
    UserMoved,
    /// User and mailbox activated.
    UserActivated,
    /// User and mailbox deactivated.
    UserDeactivated,

    // Credential events
    /// Password changed by the owner.
    PasswordChanged,
    /// Password replaced with a random value.
    PasswordReset,

    // Membership events
    /// User added to a group.
    UserJoinedGroup,
    /// User removed from a group.
    UserLeftGroup,
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// An audit record for a directory mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Outcome of the event.
    pub outcome: EventOutcome,

    /// Affected user.
    pub uid: Option<String>,

    /// Affected group common name.
    pub group: Option<String>,

    /// Error code (for failure events).
    pub error: Option<String>,

    /// Additional details as key-value pairs.
    pub details: Vec<(String, String)>,
}

impl AuditEvent {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type)
    }

    /// Writes the event to the `audit` tracing target.
    pub fn emit(&self) {
        let details = serde_json::to_string(&self.details).unwrap_or_default();
        match self.outcome {
            EventOutcome::Success => tracing::info!(
                target: "audit",
                id = %self.id,
                event = ?self.event_type,
                uid = self.uid.as_deref().unwrap_or("-"),
                group = self.group.as_deref().unwrap_or("-"),
                details = %details,
                "directory mutation committed"
            ),
            EventOutcome::Failure => tracing::warn!(
                target: "audit",
                id = %self.id,
                event = ?self.event_type,
                uid = self.uid.as_deref().unwrap_or("-"),
                group = self.group.as_deref().unwrap_or("-"),
                error = self.error.as_deref().unwrap_or("-"),
                details = %details,
                "directory mutation failed"
            ),
        }
    }
}

/// Builder for audit events.
pub struct AuditEventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    uid: Option<String>,
    group: Option<String>,
    error: Option<String>,
    details: Vec<(String, String)>,
}

impl AuditEventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            uid: None,
            group: None,
            error: None,
            details: Vec::new(),
        }
    }

    /// Sets the outcome to failure with an error code.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the affected uid.
    #[must_use]
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Sets the affected group.
    #[must_use]
    pub fn group(mut self, cn: impl Into<String>) -> Self {
        self.group = Some(cn.into());
        self
    }

    /// Adds a detail key-value pair.
    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            uid: self.uid,
            group: self.group,
            error: self.error,
            details: self.details,
        }
    }

    /// Builds and emits the event.
    pub fn emit(self) {
        self.build().emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_creates_success_event() {
        let event = AuditEvent::builder(EventType::UserJoinedGroup)
            .uid("doejan")
            .group("team-platform")
            .detail("member", "uid=doejan,ou=users,dc=example,dc=org")
            .build();

        assert_eq!(event.event_type, EventType::UserJoinedGroup);
        assert_eq!(event.outcome, EventOutcome::Success);
        assert_eq!(event.uid.as_deref(), Some("doejan"));
        assert_eq!(event.group.as_deref(), Some("team-platform"));
        assert_eq!(event.details.len(), 1);
        assert!(event.error.is_none());
    }

    #[test]
    fn builder_creates_failure_event() {
        let event = AuditEvent::builder(EventType::UserCreated)
            .failure("user.create.failed")
            .build();

        assert_eq!(event.outcome, EventOutcome::Failure);
        assert_eq!(event.error.as_deref(), Some("user.create.failed"));
    }

    #[test]
    fn event_has_timestamp() {
        let before = Utc::now();
        let event = AuditEvent::builder(EventType::PasswordReset).build();
        let after = Utc::now();

        assert!(event.timestamp >= before);
        assert!(event.timestamp <= after);
    }
}
