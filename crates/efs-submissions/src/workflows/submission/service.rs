use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{Catalog, FormTemplate};
use super::clock::{Clock, SystemClock};
use super::decision::{AggregationProgress, DecisionAggregator, FileOutcome, Verdict};
use super::domain::{
    Company, FileConversionStatus, FileDetails, FileId, PaymentSession, PaymentSessionState,
    Presenter, Submission, SubmissionId, SubmissionStatus,
};
use super::fees::FeeResolution;
use super::fes::{FesBatchRecord, FesError, FesGateway, FesOutcome};
use super::notification::{NotificationKind, NotificationSettings, Notifier};
use super::reference::{IdGenerator, RandomIdGenerator, ReferencePattern};
use super::reports::{render_csv, DelayedSubmission, PaidSubmission};
use super::repository::{RepositoryError, SubmissionStore};
use super::state::{StateViolation, TransitionGuard};
use super::validation::{ValidationChain, ValidationContext, ValidationError};
use crate::config::SubmissionConfig;

/// Statuses a submission can be in once its payment has been taken.
const POST_PAYMENT_STATUSES: [SubmissionStatus; 9] = [
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

/// Tunables for the orchestrator, usually derived from [`SubmissionConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub reference_pattern: ReferencePattern,
    pub queue_batch_size: usize,
    pub delayed_after: Duration,
    /// Extra read-modify-write attempts for file outcomes that lose a race.
    pub conflict_retries: u8,
    pub notifications: NotificationSettings,
}

impl OrchestratorConfig {
    pub fn from_config(config: &SubmissionConfig) -> Self {
        Self {
            reference_pattern: ReferencePattern::new(config.reference_pattern.clone()),
            queue_batch_size: config.queue_batch_size,
            delayed_after: Duration::try_minutes(config.delayed_after_minutes.max(0))
                .unwrap_or_else(Duration::max_value),
            conflict_retries: config.conflict_retries,
            notifications: NotificationSettings::from_config(config),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_config(&SubmissionConfig::default())
    }
}

/// Result of a single file outcome delivery.
#[derive(Debug, Clone)]
pub struct FileOutcomeReport {
    pub submission: Submission,
    pub progress: AggregationProgress,
}

/// Per-submission results of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: Vec<SubmissionId>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub submission_id: SubmissionId,
    pub reason: String,
}

/// Drives submissions through their lifecycle, composing the guard, validation chain,
/// fee resolver and decision aggregator over a conditional store.
pub struct SubmissionOrchestrator<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    catalog: Catalog,
    fes: FesGateway,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    validation: ValidationChain,
    config: OrchestratorConfig,
    fes_claims: FesClaims,
}

/// Submissions with an FES hand-off in flight; one hand-off per submission at a time.
#[derive(Default)]
struct FesClaims(Mutex<HashSet<SubmissionId>>);

impl FesClaims {
    fn claim(&self, id: &SubmissionId) -> Result<FesClaim<'_>, SubmissionError> {
        let mut held = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(id.clone()) {
            return Err(SubmissionError::Conflict(id.clone()));
        }
        Ok(FesClaim {
            claims: self,
            id: id.clone(),
        })
    }
}

struct FesClaim<'a> {
    claims: &'a FesClaims,
    id: SubmissionId,
}

impl Drop for FesClaim<'_> {
    fn drop(&mut self) {
        let mut held = self.claims.0.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.id);
    }
}

impl<S, N> SubmissionOrchestrator<S, N>
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        catalog: Catalog,
        fes: FesGateway,
        config: OrchestratorConfig,
    ) -> Self {
        let ids = Arc::new(RandomIdGenerator::new(config.reference_pattern.clone()));
        Self {
            store,
            notifier,
            catalog,
            fes,
            ids,
            clock: Arc::new(SystemClock),
            validation: ValidationChain::default(),
            config,
            fes_claims: FesClaims::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn new_file_id(&self) -> FileId {
        self.ids.file_id()
    }

    /// Opens a new submission with a fresh confirmation reference.
    pub fn create(&self, presenter: Option<Presenter>) -> Result<Submission, SubmissionError> {
        let now = self.clock.now();
        let submission = Submission::new(
            self.ids.submission_id(),
            self.ids.confirmation_reference(),
            presenter,
            now,
        );

        let stored = self.store.create(submission)?;
        info!(
            submission_id = %stored.id,
            confirmation_reference = %stored.confirmation_reference,
            "submission created"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &SubmissionId) -> Result<Submission, SubmissionError> {
        self.store
            .read(id)?
            .ok_or_else(|| SubmissionError::NotFound(id.clone()))
    }

    pub fn update_company(
        &self,
        id: &SubmissionId,
        company: Company,
    ) -> Result<Submission, SubmissionError> {
        self.update_open(id, |submission, _| {
            submission.company = Some(company);
            Ok(())
        })
    }

    /// Sets the form type and stores the fee in force now, clearing it when none applies.
    pub fn update_form_type(
        &self,
        id: &SubmissionId,
        form_type: &str,
    ) -> Result<Submission, SubmissionError> {
        self.update_open(id, |submission, now| {
            let fee = self.catalog.fees().resolve(form_type, now)?;
            submission.form_details_mut().form_type = Some(form_type.trim().to_string());
            submission.fee_on_submission = fee.stored_amount();
            debug!(submission_id = %submission.id, form_type, ?fee, "form type updated");
            Ok(())
        })
    }

    /// Replaces the attached files; every file starts over in WAITING.
    pub fn update_files(
        &self,
        id: &SubmissionId,
        files: Vec<FileDetails>,
    ) -> Result<Submission, SubmissionError> {
        self.update_open(id, |submission, now| {
            submission.form_details_mut().file_details = files
                .into_iter()
                .map(|file| FileDetails {
                    conversion_status: FileConversionStatus::Waiting,
                    converted_file_id: None,
                    number_of_pages: None,
                    last_modified_at: Some(now),
                    ..file
                })
                .collect();
            Ok(())
        })
    }

    pub fn update_payment_sessions(
        &self,
        id: &SubmissionId,
        sessions: Vec<PaymentSession>,
    ) -> Result<Submission, SubmissionError> {
        self.update_open(id, |submission, _| {
            submission.payment_sessions = sessions;
            Ok(())
        })
    }

    pub fn update_confirm_authorised(
        &self,
        id: &SubmissionId,
        confirm_authorised: bool,
    ) -> Result<Submission, SubmissionError> {
        self.update_open(id, |submission, _| {
            submission.confirm_authorised = Some(confirm_authorised);
            Ok(())
        })
    }

    /// Validates an OPEN submission and moves it to PAYMENT_REQUIRED or SUBMITTED.
    pub fn complete(&self, id: &SubmissionId) -> Result<Submission, SubmissionError> {
        let now = self.clock.now();
        let submission = self.get(id)?;
        TransitionGuard::require_state(&submission, SubmissionStatus::Open)?;

        let form = self.form_for(&submission)?;
        let fee = match submission.form_type() {
            Some(form_type) => self.catalog.fees().resolve(form_type, now)?,
            None => FeeResolution::NotApplicable,
        };

        let context = ValidationContext {
            submission: &submission,
            form: form.as_ref(),
            fee: &fee,
        };
        if let Err(err) = self.validation.validate(&context) {
            warn!(submission_id = %id, field = err.field(), error = %err, "submission failed validation");
            return Err(err.into());
        }

        let mut completed = submission.clone();
        completed.fee_on_submission = fee.stored_amount();
        let next = if fee.payable().is_some() {
            SubmissionStatus::PaymentRequired
        } else {
            completed.submitted_at = Some(now);
            SubmissionStatus::Submitted
        };
        TransitionGuard::transition(&mut completed, next, now)?;

        let stored = self.persist(completed)?;
        info!(submission_id = %id, status = %stored.status, "submission completed");

        let mut details = BTreeMap::new();
        details.insert("status".to_string(), stored.status.label().to_string());
        if let Some(fee) = stored.fee_on_submission.as_ref() {
            details.insert("fee".to_string(), fee.clone());
        }
        self.notify(NotificationKind::Confirmation, &stored, details);

        Ok(stored)
    }

    /// Applies a payment session outcome reported by the payment provider.
    pub fn record_payment(
        &self,
        id: &SubmissionId,
        session_id: &str,
        state: PaymentSessionState,
        payment_reference: Option<String>,
    ) -> Result<Submission, SubmissionError> {
        let now = self.clock.now();
        let mut submission = self.get(id)?;
        TransitionGuard::require_any(
            &submission,
            &[
                SubmissionStatus::PaymentRequired,
                SubmissionStatus::PaymentFailed,
            ],
        )?;

        let session = submission
            .payment_sessions
            .iter_mut()
            .find(|session| session.session_id == session_id)
            .ok_or_else(|| SubmissionError::UnknownPaymentSession {
                id: id.clone(),
                session_id: session_id.to_string(),
            })?;
        session.session_state = state;
        if payment_reference.is_some() {
            session.payment_reference = payment_reference;
        }

        match state {
            PaymentSessionState::Paid => {
                submission.submitted_at = Some(now);
                submission.paid_at = Some(now);
                TransitionGuard::transition(&mut submission, SubmissionStatus::Submitted, now)?;
            }
            PaymentSessionState::Failed | PaymentSessionState::Cancelled => {
                if submission.status == SubmissionStatus::PaymentRequired {
                    TransitionGuard::transition(
                        &mut submission,
                        SubmissionStatus::PaymentFailed,
                        now,
                    )?;
                } else {
                    submission.touch(now);
                }
            }
            PaymentSessionState::Pending => submission.touch(now),
        }

        let stored = self.persist(submission)?;
        info!(submission_id = %id, session_id, ?state, status = %stored.status, "payment outcome recorded");

        if matches!(
            state,
            PaymentSessionState::Failed | PaymentSessionState::Cancelled
        ) {
            let mut details = BTreeMap::new();
            details.insert("session_id".to_string(), session_id.to_string());
            self.notify(NotificationKind::PaymentFailed, &stored, details);
        }

        Ok(stored)
    }

    /// Moves a SUBMITTED submission into PROCESSING and queues its files for conversion.
    pub fn queue_for_processing(&self, id: &SubmissionId) -> Result<Submission, SubmissionError> {
        let now = self.clock.now();
        let mut submission = self.get(id)?;
        TransitionGuard::require_state(&submission, SubmissionStatus::Submitted)?;
        TransitionGuard::transition(&mut submission, SubmissionStatus::Processing, now)?;

        if let Some(details) = submission.form_details.as_mut() {
            for file in details.file_details.iter_mut() {
                file.conversion_status = FileConversionStatus::Queued;
                file.last_modified_at = Some(now);
            }
        }

        // Nothing to convert: the empty decision is already final.
        let finalized = if submission.files().is_empty() {
            let form = self.form_for(&submission)?;
            let next = Self::status_for_verdict(Verdict::Accepted, form.as_ref());
            TransitionGuard::transition(&mut submission, next, now)?;
            true
        } else {
            false
        };

        let stored = self.persist(submission)?;
        info!(submission_id = %id, status = %stored.status, files = stored.files().len(), "submission queued");
        if finalized {
            self.notify_verdict(&stored, Verdict::Accepted);
        }
        Ok(stored)
    }

    /// Queues up to `limit` SUBMITTED submissions, same-day forms first.
    pub fn queue_batch(&self, limit: Option<usize>) -> Result<BatchReport, SubmissionError> {
        let limit = limit.unwrap_or(self.config.queue_batch_size);
        let same_day: HashSet<String> = self
            .catalog
            .forms()?
            .into_iter()
            .filter(|form| form.same_day)
            .map(|form| form.form_type)
            .collect();
        let priority = |submission: &Submission| {
            submission
                .form_type()
                .is_some_and(|form_type| same_day.contains(form_type))
        };

        let candidates = self
            .store
            .find_by_status(SubmissionStatus::Submitted, limit, &priority)?;

        let mut report = BatchReport::default();
        for candidate in candidates {
            match self.queue_for_processing(&candidate.id) {
                Ok(_) => report.processed.push(candidate.id),
                Err(err) => {
                    warn!(submission_id = %candidate.id, error = %err, "failed to queue submission");
                    report.failed.push(BatchFailure {
                        submission_id: candidate.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            queued = report.processed.len(),
            failed = report.failed.len(),
            "queue batch finished"
        );
        Ok(report)
    }

    /// Records the virus scan / conversion outcome of one file, finalizing the submission
    /// once every attached file has reported. Lost races are retried from a fresh read.
    pub fn record_file_outcome(
        &self,
        id: &SubmissionId,
        file_id: &FileId,
        outcome: FileOutcome,
    ) -> Result<FileOutcomeReport, SubmissionError> {
        for attempt in 0..=self.config.conflict_retries {
            let now = self.clock.now();
            let mut submission = self.get(id)?;
            TransitionGuard::require_state(&submission, SubmissionStatus::Processing)?;

            let progress =
                DecisionAggregator::record_outcome(&mut submission, file_id, outcome.clone(), now)?;

            if matches!(progress, AggregationProgress::Duplicate { .. }) {
                debug!(submission_id = %id, file_id = %file_id, "duplicate file outcome ignored");
                return Ok(FileOutcomeReport {
                    submission,
                    progress,
                });
            }

            let verdict = match &progress {
                AggregationProgress::Finalized { verdict, .. } => Some(*verdict),
                _ => None,
            };
            if let Some(verdict) = verdict {
                let form = self.form_for(&submission)?;
                let next = Self::status_for_verdict(verdict, form.as_ref());
                TransitionGuard::transition(&mut submission, next, now)?;
            }

            match self.store.save(submission) {
                Ok(stored) => {
                    info!(
                        submission_id = %id,
                        file_id = %file_id,
                        status = %stored.status,
                        attempt,
                        "file outcome recorded"
                    );
                    if let Some(verdict) = verdict {
                        if verdict.is_rejected() {
                            warn!(submission_id = %id, ?verdict, "submission rejected by file checks");
                        }
                        self.notify_verdict(&stored, verdict);
                    }
                    return Ok(FileOutcomeReport {
                        submission: stored,
                        progress,
                    });
                }
                Err(RepositoryError::Conflict(_)) => {
                    debug!(submission_id = %id, attempt, "file outcome lost a write race, retrying");
                }
                Err(err) => return Err(Self::store_error(id, err)),
            }
        }

        warn!(submission_id = %id, file_id = %file_id, "file outcome retries exhausted");
        Err(SubmissionError::Conflict(id.clone()))
    }

    /// Assigns a barcode and hands a READY_TO_SUBMIT submission to the FES loader.
    ///
    /// The submission is claimed before the guard so concurrent sends cannot both reach
    /// the loader; the loser gets [`SubmissionError::Conflict`].
    pub fn send_to_fes(&self, id: &SubmissionId) -> Result<Submission, SubmissionError> {
        let _claim = self.fes_claims.claim(id).inspect_err(|_| {
            debug!(submission_id = %id, "FES hand-off already in flight");
        })?;
        let now = self.clock.now();
        let mut submission = self.get(id)?;
        TransitionGuard::require_state(&submission, SubmissionStatus::ReadyToSubmit)?;

        if submission.barcode().is_none() {
            let barcode = self.fes.next_barcode(now)?;
            self.store
                .update_barcode(id, &barcode, now)
                .map_err(|err| Self::store_error(id, err))?;
            debug!(submission_id = %id, barcode = %barcode, "barcode assigned");
            submission = self.get(id)?;
            TransitionGuard::require_state(&submission, SubmissionStatus::ReadyToSubmit)?;
        }

        let record = FesBatchRecord::from_submission(&submission)?;
        if let Err(err) = self.fes.load(&record) {
            warn!(submission_id = %id, barcode = %record.barcode, error = %err, "FES load failed");
            return Err(err.into());
        }

        let mut sent = submission.clone();
        TransitionGuard::transition(&mut sent, SubmissionStatus::SentToFes, now)?;
        self.store
            .update_status(id, submission.status, sent.status, now)
            .map_err(|err| Self::store_error(id, err))?;

        info!(submission_id = %id, barcode = %record.barcode, "submission sent to FES");
        self.get(id)
    }

    /// Sends every READY_TO_SUBMIT submission to FES.
    pub fn send_ready_to_fes(&self) -> Result<BatchReport, SubmissionError> {
        let ready = self
            .store
            .find_by_status(SubmissionStatus::ReadyToSubmit, usize::MAX, &|_: &Submission| false)?;

        let mut report = BatchReport::default();
        for submission in ready {
            match self.send_to_fes(&submission.id) {
                Ok(_) => report.processed.push(submission.id),
                Err(err) => report.failed.push(BatchFailure {
                    submission_id: submission.id,
                    reason: err.to_string(),
                }),
            }
        }

        info!(
            sent = report.processed.len(),
            failed = report.failed.len(),
            "FES batch finished"
        );
        Ok(report)
    }

    /// Applies the FES adjudication to a SENT_TO_FES submission.
    pub fn record_fes_outcome(
        &self,
        id: &SubmissionId,
        outcome: FesOutcome,
    ) -> Result<Submission, SubmissionError> {
        let now = self.clock.now();
        let mut submission = self.get(id)?;
        TransitionGuard::require_state(&submission, SubmissionStatus::SentToFes)?;

        let (next, kind) = match outcome {
            FesOutcome::Accepted => (SubmissionStatus::Accepted, NotificationKind::Accepted),
            FesOutcome::Rejected => {
                submission.reject_reasons = self.reject_reasons(&submission);
                (SubmissionStatus::Rejected, NotificationKind::Rejected)
            }
        };
        TransitionGuard::transition(&mut submission, next, now)?;

        let stored = self.persist(submission)?;
        info!(submission_id = %id, status = %stored.status, "FES outcome recorded");

        let mut details = BTreeMap::new();
        if !stored.reject_reasons.is_empty() {
            details.insert("reject_reasons".to_string(), stored.reject_reasons.join("; "));
        }
        self.notify(kind, &stored, details);

        Ok(stored)
    }

    pub fn fee_for(
        &self,
        form_type: &str,
        as_of: DateTime<Utc>,
    ) -> Result<FeeResolution, SubmissionError> {
        Ok(self.catalog.fees().resolve(form_type, as_of)?)
    }

    /// Submissions sitting in `status` for longer than the configured delay.
    pub fn delayed_submissions(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<DelayedSubmission>, SubmissionError> {
        let now = self.clock.now();
        let before = now
            .checked_sub_signed(self.config.delayed_after)
            .ok_or(SubmissionError::DelayOutOfRange(
                self.config.delayed_after.num_minutes(),
            ))?;
        Ok(self
            .store
            .find_delayed(status, before)?
            .iter()
            .map(|submission| DelayedSubmission::from_submission(submission, now))
            .collect())
    }

    /// Emails the support mailbox a CSV of delayed submissions, if there are any.
    pub fn report_delayed(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<DelayedSubmission>, SubmissionError> {
        let delayed = self.delayed_submissions(status)?;
        if delayed.is_empty() {
            return Ok(delayed);
        }

        let csv = match render_csv(&delayed) {
            Ok(csv) => csv,
            Err(err) => {
                warn!(error = %err, "failed to render delayed submissions report");
                return Ok(delayed);
            }
        };

        let details = BTreeMap::from([
            ("status".to_string(), status.label().to_string()),
            ("count".to_string(), delayed.len().to_string()),
            ("csv".to_string(), csv),
        ]);
        match self
            .config
            .notifications
            .for_mailbox(NotificationKind::DelayedSubmissions, details)
        {
            Ok(notification) => {
                if let Err(err) = self.notifier.send(notification) {
                    warn!(error = %err, "failed to send delayed submissions report");
                }
            }
            Err(err) => warn!(error = %err, "delayed submissions report not configured"),
        }

        info!(status = %status, count = delayed.len(), "delayed submissions reported");
        Ok(delayed)
    }

    /// Submissions whose payment was taken inside `[from, to)`.
    pub fn paid_submissions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PaidSubmission>, SubmissionError> {
        Ok(self
            .store
            .find_paid(&POST_PAYMENT_STATUSES, from, to)?
            .iter()
            .map(PaidSubmission::from_submission)
            .collect())
    }

    fn update_open<F>(&self, id: &SubmissionId, apply: F) -> Result<Submission, SubmissionError>
    where
        F: FnOnce(&mut Submission, DateTime<Utc>) -> Result<(), SubmissionError>,
    {
        let now = self.clock.now();
        let mut submission = self.get(id)?;
        TransitionGuard::require_state(&submission, SubmissionStatus::Open)?;

        apply(&mut submission, now)?;
        submission.touch(now);
        self.persist(submission)
    }

    fn persist(&self, submission: Submission) -> Result<Submission, SubmissionError> {
        let id = submission.id.clone();
        self.store
            .save(submission)
            .map_err(|err| Self::store_error(&id, err))
    }

    fn store_error(id: &SubmissionId, err: RepositoryError) -> SubmissionError {
        match err {
            RepositoryError::Conflict(_) => SubmissionError::Conflict(id.clone()),
            RepositoryError::NotFound => SubmissionError::NotFound(id.clone()),
            other => SubmissionError::Repository(other),
        }
    }

    fn form_for(&self, submission: &Submission) -> Result<Option<FormTemplate>, SubmissionError> {
        match submission.form_type() {
            Some(form_type) => Ok(self.catalog.form(form_type)?),
            None => Ok(None),
        }
    }

    fn status_for_verdict(verdict: Verdict, form: Option<&FormTemplate>) -> SubmissionStatus {
        match verdict {
            Verdict::RejectedByVirusScan => SubmissionStatus::RejectedByVirusScan,
            Verdict::RejectedByDocumentConverter => SubmissionStatus::RejectedByDocumentConverter,
            Verdict::Accepted => match form {
                Some(form) if form.fully_electronic || form.fes_delivery => {
                    SubmissionStatus::ReadyToSubmit
                }
                Some(_) => SubmissionStatus::ProcessedByEmail,
                None => SubmissionStatus::ReadyToSubmit,
            },
        }
    }

    fn reject_reasons(&self, submission: &Submission) -> Vec<String> {
        let Some(barcode) = submission.barcode() else {
            return Vec::new();
        };
        match self.fes.reject_reasons(barcode) {
            Ok(reasons) => reasons,
            Err(err) => {
                warn!(submission_id = %submission.id, barcode, error = %err, "reject reason lookup failed");
                Vec::new()
            }
        }
    }

    fn notify_verdict(&self, submission: &Submission, verdict: Verdict) {
        let names = |files: Vec<String>| files.join(", ");
        match (verdict, submission.status) {
            (Verdict::RejectedByVirusScan, _) => {
                let infected = submission
                    .files()
                    .iter()
                    .filter(|file| file.conversion_status == FileConversionStatus::FailedAv)
                    .map(|file| file.file_name.clone())
                    .collect();
                let details = BTreeMap::from([("infected_files".to_string(), names(infected))]);
                self.notify(NotificationKind::AvFailed, submission, details);
            }
            (Verdict::Accepted, SubmissionStatus::ProcessedByEmail) => {
                let details = BTreeMap::from([(
                    "form_type".to_string(),
                    submission.form_type().unwrap_or_default().to_string(),
                )]);
                self.notify(NotificationKind::InternalDelivery, submission, details);
            }
            _ => {}
        }
    }

    /// Notification failures are logged and never undo the persisted change.
    fn notify(
        &self,
        kind: NotificationKind,
        submission: &Submission,
        details: BTreeMap<String, String>,
    ) {
        let notification = match self
            .config
            .notifications
            .for_submission(kind, submission, details)
        {
            Ok(notification) => notification,
            Err(err) => {
                warn!(submission_id = %submission.id, ?kind, error = %err, "notification not built");
                return;
            }
        };

        if let Err(err) = self.notifier.send(notification) {
            warn!(submission_id = %submission.id, ?kind, error = %err, "notification send failed");
        }
    }
}

/// Error raised by the submission orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission [{0}] not found")]
    NotFound(SubmissionId),
    #[error(transparent)]
    State(#[from] StateViolation),
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
    #[error("submission [{0}] was modified concurrently")]
    Conflict(SubmissionId),
    #[error(transparent)]
    Decision(#[from] super::decision::DecisionError),
    #[error("payment session [{session_id}] is not attached to submission [{id}]")]
    UnknownPaymentSession { id: SubmissionId, session_id: String },
    #[error(transparent)]
    FesLoad(#[from] FesError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("delay window of {0} minutes reaches before the earliest representable time")]
    DelayOutOfRange(i64),
}
