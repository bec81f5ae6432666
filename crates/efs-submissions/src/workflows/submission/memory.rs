//! In-process adapters for every collaborator. The service binary wires these by default
//! and the test suites build on them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::catalog::{FormTemplate, FormTemplateLookup, PaymentTemplateLookup};
use super::domain::{Submission, SubmissionId, SubmissionStatus};
use super::fees::{select_active, PaymentTemplate};
use super::fes::{
    BarcodeSource, FesBatchRecord, FesError, FesLoader, RejectReasonError, RejectReasonLookup,
};
use super::repository::{PriorityPredicate, RepositoryError, SubmissionStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory lock poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemorySubmissionStore {
    records: Arc<Mutex<HashMap<SubmissionId, Submission>>>,
}

impl InMemorySubmissionStore {
    pub fn len(&self) -> usize {
        lock(&self.records).map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn read(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(id).cloned())
    }

    fn create(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&submission.id) {
            return Err(RepositoryError::Duplicate);
        }
        guard.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    fn save(&self, mut submission: Submission) -> Result<Submission, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let stored = guard
            .get_mut(&submission.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != submission.version {
            return Err(RepositoryError::Conflict(submission.id));
        }

        submission.version += 1;
        *stored = submission.clone();
        Ok(submission)
    }

    fn update_status(
        &self,
        id: &SubmissionId,
        expected: SubmissionStatus,
        status: SubmissionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        let stored = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::Conflict(id.clone()));
        }

        stored.status = status;
        stored.touch(at);
        stored.version += 1;
        Ok(())
    }

    fn update_barcode(
        &self,
        id: &SubmissionId,
        barcode: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        let stored = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        match stored.barcode() {
            Some(existing) if existing != barcode => {
                return Err(RepositoryError::Conflict(id.clone()))
            }
            _ => {}
        }

        stored.form_details_mut().barcode = Some(barcode.to_string());
        stored.touch(at);
        stored.version += 1;
        Ok(())
    }

    fn find_by_status(
        &self,
        status: SubmissionStatus,
        limit: usize,
        priority: PriorityPredicate<'_>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut matches: Vec<(bool, Submission)> = guard
            .values()
            .filter(|submission| submission.status == status)
            .map(|submission| (priority(submission), submission.clone()))
            .collect();
        drop(guard);

        matches.sort_by(|(a_priority, a), (b_priority, b)| {
            b_priority
                .cmp(a_priority)
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_, submission)| submission)
            .collect())
    }

    fn find_delayed(
        &self,
        status: SubmissionStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut delayed: Vec<Submission> = guard
            .values()
            .filter(|submission| submission.status == status && submission.last_modified_at < before)
            .cloned()
            .collect();
        delayed.sort_by_key(|submission| submission.last_modified_at);
        Ok(delayed)
    }

    fn find_paid(
        &self,
        statuses: &[SubmissionStatus],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut paid: Vec<Submission> = guard
            .values()
            .filter(|submission| statuses.contains(&submission.status))
            .filter(|submission| {
                submission
                    .paid_at
                    .map(|paid_at| paid_at >= from && paid_at < to)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        paid.sort_by_key(|submission| submission.paid_at);
        Ok(paid)
    }
}

/// Form and payment templates held in memory.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    forms: Arc<Mutex<BTreeMap<String, FormTemplate>>>,
    payments: Arc<Mutex<Vec<PaymentTemplate>>>,
}

impl InMemoryCatalog {
    pub fn from_templates(forms: Vec<FormTemplate>, payments: Vec<PaymentTemplate>) -> Self {
        let forms = forms
            .into_iter()
            .map(|form| (form.form_type.clone(), form))
            .collect();
        Self {
            forms: Arc::new(Mutex::new(forms)),
            payments: Arc::new(Mutex::new(payments)),
        }
    }

    pub fn insert_form(&self, form: FormTemplate) {
        if let Ok(mut guard) = self.forms.lock() {
            guard.insert(form.form_type.clone(), form);
        }
    }

    pub fn insert_payment(&self, template: PaymentTemplate) {
        if let Ok(mut guard) = self.payments.lock() {
            guard.push(template);
        }
    }
}

impl FormTemplateLookup for InMemoryCatalog {
    fn by_form_type(&self, form_type: &str) -> Result<Option<FormTemplate>, RepositoryError> {
        let guard = lock(&self.forms)?;
        Ok(guard.get(form_type.trim()).cloned())
    }

    fn all(&self) -> Result<Vec<FormTemplate>, RepositoryError> {
        let guard = lock(&self.forms)?;
        Ok(guard.values().cloned().collect())
    }
}

impl PaymentTemplateLookup for InMemoryCatalog {
    fn active_as_of(
        &self,
        fee_code: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PaymentTemplate>, RepositoryError> {
        let guard = lock(&self.payments)?;
        Ok(select_active(guard.iter(), fee_code, at).cloned())
    }
}

/// Hands out barcodes from a process-local sequence.
#[derive(Debug)]
pub struct SequentialBarcodes {
    prefix: char,
    next: AtomicU64,
}

impl SequentialBarcodes {
    pub fn new(prefix: char) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialBarcodes {
    fn default() -> Self {
        Self::new('X')
    }
}

impl BarcodeSource for SequentialBarcodes {
    fn next_barcode(&self, at: DateTime<Utc>) -> Result<String, FesError> {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{}{}{:05}", self.prefix, at.format("%y%j"), sequence))
    }
}

/// Keeps every batch record handed over; can be switched to fail for outage drills.
#[derive(Default, Clone)]
pub struct RecordingFesLoader {
    records: Arc<Mutex<Vec<FesBatchRecord>>>,
    offline: Arc<AtomicBool>,
}

impl RecordingFesLoader {
    pub fn records(&self) -> Vec<FesBatchRecord> {
        self.records
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }
}

impl FesLoader for RecordingFesLoader {
    fn load(&self, record: &FesBatchRecord) -> Result<(), FesError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(FesError::Loader("FES loader offline".to_string()));
        }
        let mut guard = self
            .records
            .lock()
            .map_err(|_| FesError::Loader("loader lock poisoned".to_string()))?;
        guard.push(record.clone());
        Ok(())
    }
}

/// Reject reasons keyed by barcode; unknown barcodes yield an empty list.
#[derive(Default, Clone)]
pub struct StaticRejectReasons {
    reasons: Arc<Mutex<HashMap<String, Vec<String>>>>,
    unavailable: Arc<AtomicBool>,
}

impl StaticRejectReasons {
    pub fn insert(&self, barcode: impl Into<String>, reasons: Vec<String>) {
        if let Ok(mut guard) = self.reasons.lock() {
            guard.insert(barcode.into(), reasons);
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }
}

impl RejectReasonLookup for StaticRejectReasons {
    fn reasons_for_barcode(&self, barcode: &str) -> Result<Vec<String>, RejectReasonError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(RejectReasonError("advisory service unavailable".to_string()));
        }
        let guard = self
            .reasons
            .lock()
            .map_err(|_| RejectReasonError("reason lock poisoned".to_string()))?;
        Ok(guard.get(barcode).cloned().unwrap_or_default())
    }
}
