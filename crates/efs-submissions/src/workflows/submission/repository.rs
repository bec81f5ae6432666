use chrono::{DateTime, Utc};

use super::domain::{Submission, SubmissionId, SubmissionStatus};

/// Ordering hint for batch pickup: submissions matching the predicate come first.
pub type PriorityPredicate<'a> = &'a (dyn Fn(&Submission) -> bool + Sync);

/// Storage abstraction so the orchestrator can be exercised in isolation.
///
/// Writes are conditional: `save` only succeeds when the stored `version` still equals the
/// version of the submission being saved, and `update_status` only when the stored status
/// equals `expected`. A lost race surfaces as [`RepositoryError::Conflict`].
pub trait SubmissionStore: Send + Sync {
    fn read(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError>;
    fn create(&self, submission: Submission) -> Result<Submission, RepositoryError>;
    /// Full replace; returns the stored copy with its bumped version.
    fn save(&self, submission: Submission) -> Result<Submission, RepositoryError>;
    fn update_status(
        &self,
        id: &SubmissionId,
        expected: SubmissionStatus,
        status: SubmissionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    fn update_barcode(
        &self,
        id: &SubmissionId,
        barcode: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    fn find_by_status(
        &self,
        status: SubmissionStatus,
        limit: usize,
        priority: PriorityPredicate<'_>,
    ) -> Result<Vec<Submission>, RepositoryError>;
    /// Submissions sitting in `status` whose last modification is before `before`.
    fn find_delayed(
        &self,
        status: SubmissionStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError>;
    /// Paid submissions in any of `statuses` with `paid_at` inside `[from, to)`.
    fn find_paid(
        &self,
        statuses: &[SubmissionStatus],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Duplicate,
    #[error("submission [{0}] was modified concurrently")]
    Conflict(SubmissionId),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
