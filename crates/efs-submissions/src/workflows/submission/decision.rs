//! Aggregation of per-file virus scan and conversion outcomes into a single verdict.
//!
//! Nothing is cached between events: the decision is recomputed from the file list stored on
//! the submission, so the count of received outcomes can never drift from the durable record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{FileConversionStatus, FileDetails, FileId, Submission, SubmissionId};

/// Result reported for one attached file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Converted {
        #[serde(default)]
        converted_file_id: Option<String>,
        #[serde(default)]
        number_of_pages: Option<u32>,
    },
    Infected,
    ConversionFailed,
}

impl FileOutcome {
    pub fn conversion_status(&self) -> FileConversionStatus {
        match self {
            FileOutcome::Converted { .. } => FileConversionStatus::Converted,
            FileOutcome::Infected => FileConversionStatus::FailedAv,
            FileOutcome::ConversionFailed => FileConversionStatus::FailedConversion,
        }
    }
}

/// Snapshot of how far a submission's file decisions have progressed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub expected: usize,
    pub number_of_decisions: usize,
    /// Whether any file moved away from the default accepted outcome.
    pub changed: bool,
    pub infected: Vec<String>,
    pub failed_conversion: Vec<String>,
}

impl Decision {
    pub fn from_files(files: &[FileDetails]) -> Self {
        let mut decision = Decision {
            expected: files.len(),
            ..Decision::default()
        };

        for file in files {
            if file.conversion_status.is_decided() {
                decision.number_of_decisions += 1;
            }
            match file.conversion_status {
                FileConversionStatus::FailedAv => decision.infected.push(file.file_name.clone()),
                FileConversionStatus::FailedConversion => {
                    decision.failed_conversion.push(file.file_name.clone())
                }
                _ => {}
            }
        }

        decision.changed = !decision.infected.is_empty() || !decision.failed_conversion.is_empty();
        decision
    }

    pub fn is_complete(&self) -> bool {
        self.number_of_decisions == self.expected
    }

    /// Final verdict once every expected outcome has arrived.
    pub fn verdict(&self) -> Option<Verdict> {
        if !self.is_complete() {
            return None;
        }
        Some(if !self.infected.is_empty() {
            Verdict::RejectedByVirusScan
        } else if !self.failed_conversion.is_empty() {
            Verdict::RejectedByDocumentConverter
        } else {
            Verdict::Accepted
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    RejectedByVirusScan,
    RejectedByDocumentConverter,
}

impl Verdict {
    pub fn is_rejected(self) -> bool {
        !matches!(self, Verdict::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationProgress {
    /// Outcome recorded; more are outstanding.
    Pending { received: usize, expected: usize },
    /// The file had already reported; nothing changed.
    Duplicate { received: usize, expected: usize },
    /// This outcome was the last one expected.
    Finalized { decision: Decision, verdict: Verdict },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    #[error("submission [{0}] has no form details to decide on")]
    NoFormDetails(SubmissionId),
    #[error("file [{file_id}] is not attached to submission [{id}]")]
    UnknownFile { id: SubmissionId, file_id: FileId },
}

pub struct DecisionAggregator;

impl DecisionAggregator {
    /// Applies one file outcome to the submission's file list and reports progress.
    pub fn record_outcome(
        submission: &mut Submission,
        file_id: &FileId,
        outcome: FileOutcome,
        now: DateTime<Utc>,
    ) -> Result<AggregationProgress, DecisionError> {
        let id = submission.id.clone();
        let Some(details) = submission.form_details.as_mut() else {
            return Err(DecisionError::NoFormDetails(id));
        };

        let file = details
            .file_details
            .iter_mut()
            .find(|file| &file.file_id == file_id)
            .ok_or_else(|| DecisionError::UnknownFile {
                id: id.clone(),
                file_id: file_id.clone(),
            })?;

        if file.conversion_status.is_decided() {
            let decision = Decision::from_files(&details.file_details);
            return Ok(AggregationProgress::Duplicate {
                received: decision.number_of_decisions,
                expected: decision.expected,
            });
        }

        file.conversion_status = outcome.conversion_status();
        if let FileOutcome::Converted {
            converted_file_id,
            number_of_pages,
        } = outcome
        {
            file.converted_file_id = converted_file_id;
            file.number_of_pages = number_of_pages;
        }
        file.last_modified_at = Some(now);
        submission.touch(now);

        Ok(Self::progress(Decision::from_files(submission.files())))
    }

    /// Progress for a decision that was just advanced, finalizing when complete.
    pub fn progress(decision: Decision) -> AggregationProgress {
        match decision.verdict() {
            Some(verdict) => AggregationProgress::Finalized { decision, verdict },
            None => AggregationProgress::Pending {
                received: decision.number_of_decisions,
                expected: decision.expected,
            },
        }
    }
}
