use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::submission::catalog::CatalogImporter;
use crate::workflows::submission::clock::ManualClock;
use crate::workflows::submission::domain::{
    Company, FileDetails, FileId, Presenter, Submission, SubmissionId,
    SubmissionStatus,
};
use crate::workflows::submission::fes::{FesGateway, FesLoader};
use crate::workflows::submission::memory::{
    InMemoryCatalog, InMemorySubmissionStore, RecordingFesLoader, SequentialBarcodes,
    StaticRejectReasons,
};
use crate::workflows::submission::notification::{
    Notification, NotificationError, Notifier, RecordingNotifier,
};
use crate::workflows::submission::repository::{
    PriorityPredicate, RepositoryError, SubmissionStore,
};
use crate::workflows::submission::reference::IdGenerator;
use crate::workflows::submission::{Catalog, OrchestratorConfig, SubmissionOrchestrator};

pub(super) const PRESENTER: &str = "agent@example.com";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap()
}

/// Collaborators shared by every orchestrator a test builds.
pub(super) struct Fixture {
    pub(super) catalog: InMemoryCatalog,
    pub(super) loader: RecordingFesLoader,
    pub(super) reasons: StaticRejectReasons,
    pub(super) clock: Arc<ManualClock>,
}

impl Fixture {
    pub(super) fn new() -> Self {
        let (forms, payments) = CatalogImporter::standard();
        Self {
            catalog: InMemoryCatalog::from_templates(forms, payments),
            loader: RecordingFesLoader::default(),
            reasons: StaticRejectReasons::default(),
            clock: Arc::new(ManualClock::starting_at(now())),
        }
    }

    pub(super) fn orchestrator<S, N>(
        &self,
        store: Arc<S>,
        notifier: Arc<N>,
    ) -> SubmissionOrchestrator<S, N>
    where
        S: SubmissionStore + 'static,
        N: Notifier + 'static,
    {
        self.orchestrator_with_config(store, notifier, OrchestratorConfig::default())
    }

    pub(super) fn orchestrator_with_config<S, N>(
        &self,
        store: Arc<S>,
        notifier: Arc<N>,
        config: OrchestratorConfig,
    ) -> SubmissionOrchestrator<S, N>
    where
        S: SubmissionStore + 'static,
        N: Notifier + 'static,
    {
        self.assemble(store, notifier, Arc::new(self.loader.clone()), config)
    }

    pub(super) fn orchestrator_with_loader<S, N>(
        &self,
        store: Arc<S>,
        notifier: Arc<N>,
        loader: Arc<dyn FesLoader>,
    ) -> SubmissionOrchestrator<S, N>
    where
        S: SubmissionStore + 'static,
        N: Notifier + 'static,
    {
        self.assemble(store, notifier, loader, OrchestratorConfig::default())
    }

    fn assemble<S, N>(
        &self,
        store: Arc<S>,
        notifier: Arc<N>,
        loader: Arc<dyn FesLoader>,
        config: OrchestratorConfig,
    ) -> SubmissionOrchestrator<S, N>
    where
        S: SubmissionStore + 'static,
        N: Notifier + 'static,
    {
        let catalog = Catalog::new(
            Arc::new(self.catalog.clone()),
            Arc::new(self.catalog.clone()),
        );
        let fes = FesGateway::new(
            Arc::new(SequentialBarcodes::default()),
            loader,
            Arc::new(self.reasons.clone()),
        );
        SubmissionOrchestrator::new(store, notifier, catalog, fes, config)
            .with_clock(self.clock.clone())
    }
}

pub(super) type TestOrchestrator = SubmissionOrchestrator<InMemorySubmissionStore, RecordingNotifier>;

pub(super) fn build_orchestrator() -> (
    TestOrchestrator,
    Arc<InMemorySubmissionStore>,
    Arc<RecordingNotifier>,
    Fixture,
) {
    let fixture = Fixture::new();
    let store = Arc::new(InMemorySubmissionStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = fixture.orchestrator(store.clone(), notifier.clone());
    (orchestrator, store, notifier, fixture)
}

pub(super) fn company() -> Company {
    Company {
        company_number: "01234567".to_string(),
        company_name: "Acme Widgets Ltd".to_string(),
    }
}

pub(super) fn file(id: &str, name: &str) -> FileDetails {
    FileDetails::new(FileId(id.to_string()), name, 2048)
}

/// OPEN submission with presenter and company already set.
pub(super) fn open_submission<S, N>(orchestrator: &SubmissionOrchestrator<S, N>) -> SubmissionId
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let submission = orchestrator
        .create(Some(Presenter {
            email: PRESENTER.to_string(),
        }))
        .expect("create submission");
    orchestrator
        .update_company(&submission.id, company())
        .expect("set company");
    submission.id
}

/// OPEN submission for `form_type` with the given files, ready to complete.
pub(super) fn prepared<S, N>(
    orchestrator: &SubmissionOrchestrator<S, N>,
    form_type: &str,
    files: Vec<FileDetails>,
) -> SubmissionId
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let id = open_submission(orchestrator);
    orchestrator
        .update_form_type(&id, form_type)
        .expect("set form type");
    if !files.is_empty() {
        orchestrator.update_files(&id, files).expect("set files");
    }
    id
}

/// PROCESSING submission of an unpriced paper form carrying `files`.
pub(super) fn processing<S, N>(
    orchestrator: &SubmissionOrchestrator<S, N>,
    form_type: &str,
    files: Vec<FileDetails>,
) -> SubmissionId
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let id = prepared(orchestrator, form_type, files);
    orchestrator.complete(&id).expect("complete");
    orchestrator.queue_for_processing(&id).expect("queue");
    id
}

pub(super) fn stored(store: &InMemorySubmissionStore, id: &SubmissionId) -> Submission {
    store
        .read(id)
        .expect("read succeeds")
        .expect("submission present")
}

pub(super) fn force_status(store: &InMemorySubmissionStore, id: &SubmissionId, to: SubmissionStatus) {
    let current = stored(store, id).status;
    store
        .update_status(id, current, to, now())
        .expect("force status");
}

/// Hands out numbered identifiers and a fixed-shape reference.
#[derive(Default)]
pub(super) struct SequentialIds {
    next: AtomicUsize,
}

impl IdGenerator for SequentialIds {
    fn submission_id(&self) -> SubmissionId {
        SubmissionId(format!("sub-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn file_id(&self) -> FileId {
        FileId(format!("file-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn confirmation_reference(&self) -> String {
        format!("REF-{:04}", self.next.load(Ordering::SeqCst))
    }
}

/// Notifier whose transport is always down.
#[derive(Default)]
pub(super) struct FailingNotifier {
    pub(super) attempts: AtomicUsize,
}

impl Notifier for FailingNotifier {
    fn send(&self, _notification: Notification) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::Transport("smtp relay offline".to_string()))
    }
}

/// Wraps the in-memory store and loses the next `conflicts` full saves to a phantom writer.
pub(super) struct ContendedStore {
    pub(super) inner: InMemorySubmissionStore,
    conflicts: AtomicUsize,
}

impl ContendedStore {
    pub(super) fn new(inner: InMemorySubmissionStore) -> Self {
        Self {
            inner,
            conflicts: AtomicUsize::new(0),
        }
    }

    pub(super) fn lose_next_saves(&self, conflicts: usize) {
        self.conflicts.store(conflicts, Ordering::SeqCst);
    }
}

impl SubmissionStore for ContendedStore {
    fn read(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        self.inner.read(id)
    }

    fn create(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        self.inner.create(submission)
    }

    fn save(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        let lost = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lost {
            return Err(RepositoryError::Conflict(submission.id));
        }
        self.inner.save(submission)
    }

    fn update_status(
        &self,
        id: &SubmissionId,
        expected: SubmissionStatus,
        status: SubmissionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner.update_status(id, expected, status, at)
    }

    fn update_barcode(
        &self,
        id: &SubmissionId,
        barcode: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner.update_barcode(id, barcode, at)
    }

    fn find_by_status(
        &self,
        status: SubmissionStatus,
        limit: usize,
        priority: PriorityPredicate<'_>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        self.inner.find_by_status(status, limit, priority)
    }

    fn find_delayed(
        &self,
        status: SubmissionStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        self.inner.find_delayed(status, before)
    }

    fn find_paid(
        &self,
        statuses: &[SubmissionStatus],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        self.inner.find_paid(statuses, from, to)
    }
}

/// Store whose backend is unreachable.
pub(super) struct UnavailableStore;

impl SubmissionStore for UnavailableStore {
    fn read(&self, _id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn create(&self, _submission: Submission) -> Result<Submission, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save(&self, _submission: Submission) -> Result<Submission, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status(
        &self,
        _id: &SubmissionId,
        _expected: SubmissionStatus,
        _status: SubmissionStatus,
        _at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_barcode(
        &self,
        _id: &SubmissionId,
        _barcode: &str,
        _at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_status(
        &self,
        _status: SubmissionStatus,
        _limit: usize,
        _priority: PriorityPredicate<'_>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_delayed(
        &self,
        _status: SubmissionStatus,
        _before: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_paid(
        &self,
        _statuses: &[SubmissionStatus],
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
