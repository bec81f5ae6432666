use chrono::{DateTime, Utc};

use super::domain::{Submission, SubmissionId, SubmissionStatus};

/// Raised when a submission is not in a state that permits the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    #[error("submission [{id}] is {found}, expected {}", render_expected(.expected))]
    IncorrectState {
        id: SubmissionId,
        expected: Vec<SubmissionStatus>,
        found: SubmissionStatus,
    },
    #[error("submission [{id}] cannot move from {from} to {to}")]
    IllegalTransition {
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
}

fn render_expected(expected: &[SubmissionStatus]) -> String {
    expected
        .iter()
        .map(|status| status.label())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Gatekeeper for status preconditions and the fixed transition table.
pub struct TransitionGuard;

impl TransitionGuard {
    pub fn require_state(
        submission: &Submission,
        expected: SubmissionStatus,
    ) -> Result<(), StateViolation> {
        Self::require_any(submission, &[expected])
    }

    pub fn require_any(
        submission: &Submission,
        expected: &[SubmissionStatus],
    ) -> Result<(), StateViolation> {
        if expected.contains(&submission.status) {
            Ok(())
        } else {
            Err(StateViolation::IncorrectState {
                id: submission.id.clone(),
                expected: expected.to_vec(),
                found: submission.status,
            })
        }
    }

    pub fn is_valid_transition(from: SubmissionStatus, to: SubmissionStatus) -> bool {
        use SubmissionStatus::*;

        matches!(
            (from, to),
            (Open, PaymentRequired)
                | (Open, Submitted)
                | (PaymentRequired, Submitted)
                | (PaymentRequired, PaymentFailed)
                | (PaymentFailed, Submitted)
                | (Submitted, Processing)
                | (Processing, ProcessedByEmail)
                | (Processing, ReadyToSubmit)
                | (Processing, RejectedByVirusScan)
                | (Processing, RejectedByDocumentConverter)
                | (ReadyToSubmit, SentToFes)
                | (SentToFes, Accepted)
                | (SentToFes, Rejected)
        )
    }

    pub fn valid_next_states(from: SubmissionStatus) -> Vec<SubmissionStatus> {
        SubmissionStatus::ALL
            .into_iter()
            .filter(|to| Self::is_valid_transition(from, *to))
            .collect()
    }

    /// Moves the submission to `to`, stamping the modification time.
    pub fn transition(
        submission: &mut Submission,
        to: SubmissionStatus,
        now: DateTime<Utc>,
    ) -> Result<SubmissionStatus, StateViolation> {
        let from = submission.status;
        if !Self::is_valid_transition(from, to) {
            return Err(StateViolation::IllegalTransition {
                id: submission.id.clone(),
                from,
                to,
            });
        }

        submission.status = to;
        submission.touch(now);
        Ok(from)
    }
}
