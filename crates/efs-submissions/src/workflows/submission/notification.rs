//! Outbound notifications. Each kind maps to one configuration entry (template plus
//! recipient) held in a lookup table built from the service configuration.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::domain::{Submission, SubmissionId};
use crate::config::SubmissionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    PaymentFailed,
    Accepted,
    Rejected,
    AvFailed,
    InternalDelivery,
    DelayedSubmissions,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 7] = [
        NotificationKind::Confirmation,
        NotificationKind::PaymentFailed,
        NotificationKind::Accepted,
        NotificationKind::Rejected,
        NotificationKind::AvFailed,
        NotificationKind::InternalDelivery,
        NotificationKind::DelayedSubmissions,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "address", rename_all = "snake_case")]
pub enum Recipient {
    /// Whoever presented the submission.
    Presenter,
    Mailbox(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    pub template: String,
    pub recipient: Recipient,
}

/// Lookup table from notification kind to its template and recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    table: BTreeMap<NotificationKind, NotificationConfig>,
}

impl NotificationSettings {
    pub fn from_config(config: &SubmissionConfig) -> Self {
        let presenter = |template: &str| NotificationConfig {
            template: template.to_string(),
            recipient: Recipient::Presenter,
        };
        let mailbox = |template: &str, address: &str| NotificationConfig {
            template: template.to_string(),
            recipient: Recipient::Mailbox(address.to_string()),
        };

        let table = BTreeMap::from([
            (
                NotificationKind::Confirmation,
                presenter("submission_confirmation"),
            ),
            (
                NotificationKind::PaymentFailed,
                presenter("payment_failed"),
            ),
            (NotificationKind::Accepted, presenter("submission_accepted")),
            (NotificationKind::Rejected, presenter("submission_rejected")),
            (
                NotificationKind::AvFailed,
                mailbox("virus_scan_failed", &config.internal_mailbox),
            ),
            (
                NotificationKind::InternalDelivery,
                mailbox("internal_delivery", &config.internal_mailbox),
            ),
            (
                NotificationKind::DelayedSubmissions,
                mailbox("delayed_submissions", &config.support_mailbox),
            ),
        ]);

        Self { table }
    }

    pub fn get(&self, kind: NotificationKind) -> Option<&NotificationConfig> {
        self.table.get(&kind)
    }

    /// Builds a notification about a single submission, resolving the presenter recipient.
    pub fn for_submission(
        &self,
        kind: NotificationKind,
        submission: &Submission,
        details: BTreeMap<String, String>,
    ) -> Result<Notification, NotificationError> {
        let config = self
            .get(kind)
            .ok_or(NotificationError::Unconfigured(kind))?;

        let recipient = match &config.recipient {
            Recipient::Presenter => submission
                .presenter_email()
                .map(str::to_string)
                .ok_or_else(|| NotificationError::NoRecipient(submission.id.clone()))?,
            Recipient::Mailbox(address) => address.clone(),
        };

        Ok(Notification {
            kind,
            template: config.template.clone(),
            recipient,
            submission_id: Some(submission.id.clone()),
            confirmation_reference: Some(submission.confirmation_reference.clone()),
            details,
        })
    }

    /// Builds a notification addressed only to a configured mailbox.
    pub fn for_mailbox(
        &self,
        kind: NotificationKind,
        details: BTreeMap<String, String>,
    ) -> Result<Notification, NotificationError> {
        let config = self
            .get(kind)
            .ok_or(NotificationError::Unconfigured(kind))?;
        let Recipient::Mailbox(address) = &config.recipient else {
            return Err(NotificationError::Unconfigured(kind));
        };

        Ok(Notification {
            kind,
            template: config.template.clone(),
            recipient: address.clone(),
            submission_id: None,
            confirmation_reference: None,
            details,
        })
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self::from_config(&SubmissionConfig::default())
    }
}

/// Payload handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub template: String,
    pub recipient: String,
    pub submission_id: Option<SubmissionId>,
    pub confirmation_reference: Option<String>,
    pub details: BTreeMap<String, String>,
}

/// Outbound email adapter.
pub trait Notifier: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("no notification configured for {0:?}")]
    Unconfigured(NotificationKind),
    #[error("submission [{0}] has no presenter email to notify")]
    NoRecipient(SubmissionId),
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Keeps every notification it is given.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn sent_kinds(&self) -> Vec<NotificationKind> {
        self.sent().into_iter().map(|n| n.kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| NotificationError::Transport("notifier lock poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}
