use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for uploaded files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub company_number: String,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presenter {
    pub email: String,
}

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Open,
    PaymentRequired,
    PaymentFailed,
    Submitted,
    Processing,
    ProcessedByEmail,
    ReadyToSubmit,
    SentToFes,
    Accepted,
    Rejected,
    RejectedByVirusScan,
    RejectedByDocumentConverter,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 12] = [
        SubmissionStatus::Open,
        SubmissionStatus::PaymentRequired,
        SubmissionStatus::PaymentFailed,
        SubmissionStatus::Submitted,
        SubmissionStatus::Processing,
        SubmissionStatus::ProcessedByEmail,
        SubmissionStatus::ReadyToSubmit,
        SubmissionStatus::SentToFes,
        SubmissionStatus::Accepted,
        SubmissionStatus::Rejected,
        SubmissionStatus::RejectedByVirusScan,
        SubmissionStatus::RejectedByDocumentConverter,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Open => "OPEN",
            SubmissionStatus::PaymentRequired => "PAYMENT_REQUIRED",
            SubmissionStatus::PaymentFailed => "PAYMENT_FAILED",
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Processing => "PROCESSING",
            SubmissionStatus::ProcessedByEmail => "PROCESSED_BY_EMAIL",
            SubmissionStatus::ReadyToSubmit => "READY_TO_SUBMIT",
            SubmissionStatus::SentToFes => "SENT_TO_FES",
            SubmissionStatus::Accepted => "ACCEPTED",
            SubmissionStatus::Rejected => "REJECTED",
            SubmissionStatus::RejectedByVirusScan => "REJECTED_BY_VIRUS_SCAN",
            SubmissionStatus::RejectedByDocumentConverter => "REJECTED_BY_DOCUMENT_CONVERTER",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(wanted))
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionStatus::Accepted
                | SubmissionStatus::Rejected
                | SubmissionStatus::RejectedByVirusScan
                | SubmissionStatus::RejectedByDocumentConverter
                | SubmissionStatus::ProcessedByEmail
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Virus scan / conversion progress of an individual file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileConversionStatus {
    Waiting,
    Queued,
    Converted,
    FailedAv,
    FailedConversion,
}

impl FileConversionStatus {
    /// Whether an outcome has been reported for the file.
    pub const fn is_decided(self) -> bool {
        matches!(
            self,
            FileConversionStatus::Converted
                | FileConversionStatus::FailedAv
                | FileConversionStatus::FailedConversion
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetails {
    pub file_id: FileId,
    pub file_name: String,
    pub file_size: u64,
    pub conversion_status: FileConversionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

impl FileDetails {
    pub fn new(file_id: FileId, file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            file_id,
            file_name: file_name.into(),
            file_size,
            conversion_status: FileConversionStatus::Waiting,
            converted_file_id: None,
            number_of_pages: None,
            last_modified_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default)]
    pub form_type: Option<String>,
    #[serde(default)]
    pub file_details: Vec<FileDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentSessionState {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub session_id: String,
    pub session_state: PaymentSessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
}

impl PaymentSession {
    pub fn pending(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            session_state: PaymentSessionState::Pending,
            payment_reference: None,
        }
    }
}

/// Aggregate root tracked from creation through FES adjudication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub confirmation_reference: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub last_modified_at: DateTime<Utc>,
    pub company: Option<Company>,
    pub presenter: Option<Presenter>,
    pub status: SubmissionStatus,
    pub form_details: Option<FormDetails>,
    #[serde(default)]
    pub payment_sessions: Vec<PaymentSession>,
    /// Raw amount from the active fee template when the form type was last resolved.
    pub fee_on_submission: Option<String>,
    pub confirm_authorised: Option<bool>,
    #[serde(default)]
    pub reject_reasons: Vec<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Write counter backing conditional saves.
    #[serde(default)]
    pub version: u64,
}

impl Submission {
    pub fn new(
        id: SubmissionId,
        confirmation_reference: String,
        presenter: Option<Presenter>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            confirmation_reference,
            created_at: now,
            submitted_at: None,
            last_modified_at: now,
            company: None,
            presenter,
            status: SubmissionStatus::Open,
            form_details: None,
            payment_sessions: Vec::new(),
            fee_on_submission: None,
            confirm_authorised: None,
            reject_reasons: Vec::new(),
            paid_at: None,
            version: 0,
        }
    }

    pub fn form_type(&self) -> Option<&str> {
        self.form_details
            .as_ref()
            .and_then(|details| details.form_type.as_deref())
            .filter(|form_type| !form_type.trim().is_empty())
    }

    pub fn files(&self) -> &[FileDetails] {
        self.form_details
            .as_ref()
            .map(|details| details.file_details.as_slice())
            .unwrap_or(&[])
    }

    pub fn barcode(&self) -> Option<&str> {
        self.form_details
            .as_ref()
            .and_then(|details| details.barcode.as_deref())
    }

    pub fn company_number(&self) -> Option<&str> {
        self.company
            .as_ref()
            .map(|company| company.company_number.as_str())
    }

    pub fn presenter_email(&self) -> Option<&str> {
        self.presenter
            .as_ref()
            .map(|presenter| presenter.email.as_str())
            .filter(|email| !email.trim().is_empty())
    }

    /// Form details, created empty on first use.
    pub fn form_details_mut(&mut self) -> &mut FormDetails {
        self.form_details.get_or_insert_with(FormDetails::default)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified_at = now;
    }

    pub fn status_view(&self) -> SubmissionStatusView {
        SubmissionStatusView {
            submission_id: self.id.clone(),
            confirmation_reference: self.confirmation_reference.clone(),
            status: self.status.label(),
            form_type: self.form_type().map(str::to_string),
            fee: self.fee_on_submission.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Public summary returned to presenters.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionStatusView {
    pub submission_id: SubmissionId,
    pub confirmation_reference: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}
