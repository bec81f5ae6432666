use chrono::{DateTime, Utc};
use efs_submissions::config::SubmissionConfig;
use efs_submissions::error::AppError;
use efs_submissions::workflows::submission::memory::{
    InMemoryCatalog, InMemorySubmissionStore, RecordingFesLoader, SequentialBarcodes,
    StaticRejectReasons,
};
use efs_submissions::workflows::submission::router::parse_instant;
use efs_submissions::workflows::submission::{
    Catalog, CatalogError, CatalogImporter, FesGateway, Notification, NotificationError, Notifier,
    OrchestratorConfig, SubmissionOrchestrator,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Orchestrator wired to the in-process adapters used for local runs.
pub(crate) type LocalOrchestrator = SubmissionOrchestrator<InMemorySubmissionStore, LoggingNotifier>;

/// Writes notifications to the log instead of a mail relay.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            kind = ?notification.kind,
            template = %notification.template,
            recipient = %notification.recipient,
            submission_id = ?notification.submission_id,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Loads the catalog from the configured CSV exports, falling back to the built-in one.
pub(crate) fn load_catalog(config: &SubmissionConfig) -> Result<InMemoryCatalog, CatalogError> {
    let (standard_forms, standard_payments) = CatalogImporter::standard();

    let forms = match config.form_templates_csv.as_ref() {
        Some(path) => CatalogImporter::forms_from_path(path)?,
        None => standard_forms,
    };
    let payments = match config.payment_templates_csv.as_ref() {
        Some(path) => CatalogImporter::payments_from_path(path)?,
        None => standard_payments,
    };

    info!(
        forms = forms.len(),
        payments = payments.len(),
        imported = config.form_templates_csv.is_some() || config.payment_templates_csv.is_some(),
        "catalog loaded"
    );
    Ok(InMemoryCatalog::from_templates(forms, payments))
}

pub(crate) fn catalog_handle(catalog: &InMemoryCatalog) -> Catalog {
    Catalog::new(Arc::new(catalog.clone()), Arc::new(catalog.clone()))
}

/// Collaborators behind a local orchestrator, kept so callers can inspect FES traffic.
pub(crate) struct LocalAdapters {
    pub(crate) store: Arc<InMemorySubmissionStore>,
    pub(crate) loader: RecordingFesLoader,
    pub(crate) reasons: StaticRejectReasons,
}

pub(crate) fn build_orchestrator(
    config: &SubmissionConfig,
) -> Result<(LocalOrchestrator, LocalAdapters), AppError> {
    let catalog = load_catalog(config)?;
    let adapters = LocalAdapters {
        store: Arc::new(InMemorySubmissionStore::default()),
        loader: RecordingFesLoader::default(),
        reasons: StaticRejectReasons::default(),
    };
    let fes = FesGateway::new(
        Arc::new(SequentialBarcodes::default()),
        Arc::new(adapters.loader.clone()),
        Arc::new(adapters.reasons.clone()),
    );

    let orchestrator = SubmissionOrchestrator::new(
        adapters.store.clone(),
        Arc::new(LoggingNotifier),
        catalog_handle(&catalog),
        fes,
        OrchestratorConfig::from_config(config),
    );
    Ok((orchestrator, adapters))
}

/// Clap value parser for RFC 3339 timestamps or `YYYY-MM-DD` dates.
pub(crate) fn parse_as_of(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(raw).ok_or_else(|| format!("failed to parse '{raw}' as a date or timestamp"))
}
