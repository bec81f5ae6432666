//! Collaborators for the hand-off to FES, the legacy registration system, and for the
//! advisory lookup that explains FES rejections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{FileId, Submission, SubmissionId};

/// Adjudication reported back by FES.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FesOutcome {
    Accepted,
    Rejected,
}

/// Batch record handed to the FES loader once a barcode has been assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FesBatchRecord {
    pub submission_id: SubmissionId,
    pub barcode: String,
    pub confirmation_reference: String,
    pub form_type: String,
    pub company_number: String,
    pub company_name: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub documents: Vec<FesDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FesDocument {
    pub file_id: FileId,
    pub converted_file_id: Option<String>,
    pub number_of_pages: Option<u32>,
}

impl FesBatchRecord {
    pub fn from_submission(submission: &Submission) -> Result<Self, FesError> {
        let barcode = submission
            .barcode()
            .ok_or_else(|| FesError::MissingBarcode(submission.id.clone()))?;

        Ok(Self {
            submission_id: submission.id.clone(),
            barcode: barcode.to_string(),
            confirmation_reference: submission.confirmation_reference.clone(),
            form_type: submission.form_type().unwrap_or_default().to_string(),
            company_number: submission
                .company
                .as_ref()
                .map(|company| company.company_number.clone())
                .unwrap_or_default(),
            company_name: submission
                .company
                .as_ref()
                .map(|company| company.company_name.clone())
                .unwrap_or_default(),
            submitted_at: submission.submitted_at,
            documents: submission
                .files()
                .iter()
                .map(|file| FesDocument {
                    file_id: file.file_id.clone(),
                    converted_file_id: file.converted_file_id.clone(),
                    number_of_pages: file.number_of_pages,
                })
                .collect(),
        })
    }
}

pub trait BarcodeSource: Send + Sync {
    fn next_barcode(&self, at: DateTime<Utc>) -> Result<String, FesError>;
}

pub trait FesLoader: Send + Sync {
    fn load(&self, record: &FesBatchRecord) -> Result<(), FesError>;
}

/// Advisory lookup for human-readable FES reject reasons.
pub trait RejectReasonLookup: Send + Sync {
    fn reasons_for_barcode(&self, barcode: &str) -> Result<Vec<String>, RejectReasonError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FesError {
    #[error("barcode service unavailable: {0}")]
    BarcodeUnavailable(String),
    #[error("submission [{0}] has no barcode")]
    MissingBarcode(SubmissionId),
    #[error("FES loader rejected batch record: {0}")]
    Loader(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reject reason lookup failed: {0}")]
pub struct RejectReasonError(pub String);

/// Bundle of the FES-facing collaborators.
#[derive(Clone)]
pub struct FesGateway {
    barcodes: Arc<dyn BarcodeSource>,
    loader: Arc<dyn FesLoader>,
    reasons: Arc<dyn RejectReasonLookup>,
}

impl FesGateway {
    pub fn new(
        barcodes: Arc<dyn BarcodeSource>,
        loader: Arc<dyn FesLoader>,
        reasons: Arc<dyn RejectReasonLookup>,
    ) -> Self {
        Self {
            barcodes,
            loader,
            reasons,
        }
    }

    pub fn next_barcode(&self, at: DateTime<Utc>) -> Result<String, FesError> {
        self.barcodes.next_barcode(at)
    }

    pub fn load(&self, record: &FesBatchRecord) -> Result<(), FesError> {
        self.loader.load(record)
    }

    pub fn reject_reasons(&self, barcode: &str) -> Result<Vec<String>, RejectReasonError> {
        self.reasons.reasons_for_barcode(barcode)
    }
}
