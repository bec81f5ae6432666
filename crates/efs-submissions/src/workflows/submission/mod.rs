//! Submission lifecycle: field updates guarded by status, completion checks, fee resolution,
//! per-file decision aggregation and the hand-off to FES.
//!
//! [`SubmissionOrchestrator`] is the entry point. Collaborators (store, catalogs, notifier,
//! FES gateway) are traits so the orchestrator can run against the in-memory adapters in
//! [`memory`] or real infrastructure.

pub mod catalog;
pub mod clock;
pub mod decision;
pub mod domain;
pub mod fees;
pub mod fes;
pub mod memory;
pub mod notification;
pub mod reference;
pub mod reports;
pub mod repository;
pub mod router;
pub mod service;
pub mod state;
pub mod validation;

#[cfg(test)]
mod tests;

pub use catalog::{
    Catalog, CatalogError, CatalogImporter, FormTemplate, FormTemplateLookup,
    PaymentTemplateLookup,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{AggregationProgress, Decision, DecisionAggregator, FileOutcome, Verdict};
pub use domain::{
    Company, FileConversionStatus, FileDetails, FileId, FormDetails, PaymentSession,
    PaymentSessionState, Presenter, Submission, SubmissionId, SubmissionStatus,
    SubmissionStatusView,
};
pub use fees::{FeeResolution, FeeResolver, PaymentItem, PaymentTemplate};
pub use fes::{FesBatchRecord, FesError, FesGateway, FesOutcome};
pub use notification::{
    Notification, NotificationError, NotificationKind, NotificationSettings, Notifier,
    RecordingNotifier,
};
pub use reference::{IdGenerator, RandomIdGenerator, ReferencePattern};
pub use repository::{RepositoryError, SubmissionStore};
pub use router::submission_router;
pub use service::{
    BatchReport, FileOutcomeReport, OrchestratorConfig, SubmissionError, SubmissionOrchestrator,
};
pub use state::{StateViolation, TransitionGuard};
pub use validation::{ValidationChain, ValidationError};
