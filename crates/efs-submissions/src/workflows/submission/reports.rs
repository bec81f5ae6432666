//! Operational reports: submissions stuck in a status and payments taken over a window.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{PaymentSessionState, Submission, SubmissionId};

/// Submission that has not moved since before the delay cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayedSubmission {
    pub submission_id: SubmissionId,
    pub confirmation_reference: String,
    pub status: &'static str,
    pub form_type: String,
    pub company_number: String,
    pub presenter_email: String,
    pub last_modified_at: DateTime<Utc>,
    pub minutes_delayed: i64,
}

impl DelayedSubmission {
    pub fn from_submission(submission: &Submission, now: DateTime<Utc>) -> Self {
        Self {
            submission_id: submission.id.clone(),
            confirmation_reference: submission.confirmation_reference.clone(),
            status: submission.status.label(),
            form_type: submission.form_type().unwrap_or_default().to_string(),
            company_number: submission.company_number().unwrap_or_default().to_string(),
            presenter_email: submission.presenter_email().unwrap_or_default().to_string(),
            last_modified_at: submission.last_modified_at,
            minutes_delayed: (now - submission.last_modified_at).num_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaidSubmission {
    pub submission_id: SubmissionId,
    pub confirmation_reference: String,
    pub status: &'static str,
    pub form_type: String,
    pub company_number: String,
    pub fee: String,
    pub payment_reference: String,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaidSubmission {
    pub fn from_submission(submission: &Submission) -> Self {
        let payment_reference = submission
            .payment_sessions
            .iter()
            .find(|session| session.session_state == PaymentSessionState::Paid)
            .and_then(|session| session.payment_reference.clone())
            .unwrap_or_default();

        Self {
            submission_id: submission.id.clone(),
            confirmation_reference: submission.confirmation_reference.clone(),
            status: submission.status.label(),
            form_type: submission.form_type().unwrap_or_default().to_string(),
            company_number: submission.company_number().unwrap_or_default().to_string(),
            fee: submission.fee_on_submission.clone().unwrap_or_default(),
            payment_reference,
            paid_at: submission.paid_at,
        }
    }
}

/// Renders report rows as CSV with a header line.
pub fn render_csv<T: Serialize>(rows: &[T]) -> Result<String, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ReportError::Io(err.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush report: {0}")]
    Io(#[from] std::io::Error),
    #[error("report is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
