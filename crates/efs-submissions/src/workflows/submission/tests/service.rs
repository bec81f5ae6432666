use super::common::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use chrono::{Duration, TimeZone, Utc};

use crate::workflows::submission::catalog::FormTemplate;
use crate::workflows::submission::decision::{
    AggregationProgress, DecisionError, FileOutcome, Verdict,
};
use crate::workflows::submission::domain::{
    FileConversionStatus, FileId, PaymentSession, PaymentSessionState, SubmissionId,
    SubmissionStatus,
};
use crate::workflows::submission::fees::{PaymentItem, PaymentTemplate};
use crate::workflows::submission::fes::{FesBatchRecord, FesError, FesLoader, FesOutcome};
use crate::workflows::submission::memory::InMemorySubmissionStore;
use crate::workflows::submission::notification::{NotificationKind, RecordingNotifier};
use crate::workflows::submission::reference::ReferencePattern;
use crate::workflows::submission::repository::{RepositoryError, SubmissionStore};
use crate::workflows::submission::state::StateViolation;
use crate::workflows::submission::validation::ValidationError;
use crate::config::SubmissionConfig;
use crate::workflows::submission::{OrchestratorConfig, SubmissionError};

fn converted() -> FileOutcome {
    FileOutcome::Converted {
        converted_file_id: Some("converted-1".to_string()),
        number_of_pages: Some(3),
    }
}

fn file_id(raw: &str) -> FileId {
    FileId(raw.to_string())
}

#[test]
fn create_opens_submission_with_patterned_reference() {
    let (orchestrator, store, _, _) = build_orchestrator();
    let created = orchestrator.create(None).expect("create");

    assert_eq!(created.status, SubmissionStatus::Open);
    assert_eq!(created.created_at, now());
    assert!(ReferencePattern::new("####-####").matches(&created.confirmation_reference));
    assert_eq!(stored(&store, &created.id), created);
}

#[test]
fn injected_ids_name_submissions_and_files() {
    let fixture = Fixture::new();
    let orchestrator = fixture
        .orchestrator(
            Arc::new(InMemorySubmissionStore::default()),
            Arc::new(RecordingNotifier::default()),
        )
        .with_ids(Arc::new(SequentialIds::default()));

    let created = orchestrator.create(None).expect("create");
    assert_eq!(created.id, SubmissionId("sub-1".to_string()));
    assert_eq!(created.confirmation_reference, "REF-0001");
    assert_eq!(orchestrator.new_file_id(), file_id("file-2"));
    assert_eq!(
        orchestrator.get(&created.id).expect("stored").confirmation_reference,
        "REF-0001"
    );
}

#[test]
fn create_propagates_store_outages() {
    let fixture = Fixture::new();
    let orchestrator =
        fixture.orchestrator(Arc::new(UnavailableStore), Arc::new(RecordingNotifier::default()));

    match orchestrator.create(None) {
        Err(SubmissionError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected repository outage, got {other:?}"),
    }
}

#[test]
fn field_updates_are_rejected_outside_open() {
    let (orchestrator, store, notifier, _) = build_orchestrator();
    let id = prepared(&orchestrator, "SH19", Vec::new());
    force_status(&store, &id, SubmissionStatus::Submitted);
    let before = stored(&store, &id);

    let attempts = [
        orchestrator.update_company(&id, company()),
        orchestrator.update_form_type(&id, "CC01"),
        orchestrator.update_files(&id, vec![file("f-1", "late.pdf")]),
        orchestrator.update_payment_sessions(&id, vec![PaymentSession::pending("sess-1")]),
        orchestrator.update_confirm_authorised(&id, true),
        orchestrator.complete(&id),
    ];

    for attempt in attempts {
        match attempt {
            Err(SubmissionError::State(StateViolation::IncorrectState { found, expected, .. })) => {
                assert_eq!(found, SubmissionStatus::Submitted);
                assert_eq!(expected, vec![SubmissionStatus::Open]);
            }
            other => panic!("expected incorrect state, got {other:?}"),
        }
    }
    assert_eq!(stored(&store, &id), before);
    assert!(notifier.sent().is_empty());
}

#[test]
fn field_updates_report_missing_submissions() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let missing = SubmissionId("missing".to_string());

    match orchestrator.update_company(&missing, company()) {
        Err(SubmissionError::NotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn form_type_update_stores_and_clears_the_fee() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let id = open_submission(&orchestrator);

    let priced = orchestrator.update_form_type(&id, "CC01").expect("CC01");
    assert_eq!(priced.fee_on_submission.as_deref(), Some("10"));
    assert_eq!(priced.form_type(), Some("CC01"));

    let free = orchestrator.update_form_type(&id, "SH19").expect("SH19");
    assert!(free.fee_on_submission.is_none());
}

#[test]
fn field_update_conflicts_surface_to_the_caller() {
    let fixture = Fixture::new();
    let store = Arc::new(ContendedStore::new(InMemorySubmissionStore::default()));
    let orchestrator = fixture.orchestrator(store.clone(), Arc::new(RecordingNotifier::default()));
    let id = open_submission(&orchestrator);

    store.lose_next_saves(1);
    match orchestrator.update_confirm_authorised(&id, true) {
        Err(SubmissionError::Conflict(conflicted)) => assert_eq!(conflicted, id),
        other => panic!("expected conflict, got {other:?}"),
    }
    let current = store.inner.read(&id).expect("read").expect("present");
    assert!(current.confirm_authorised.is_none());
}

#[test]
fn complete_submits_free_electronic_forms() {
    let (orchestrator, store, notifier, _) = build_orchestrator();
    let id = prepared(&orchestrator, "SH19", Vec::new());

    let completed = orchestrator.complete(&id).expect("complete");

    assert_eq!(completed.status, SubmissionStatus::Submitted);
    assert_eq!(completed.submitted_at, Some(now()));
    assert!(completed.fee_on_submission.is_none());
    assert_eq!(stored(&store, &id).status, SubmissionStatus::Submitted);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Confirmation);
    assert_eq!(sent[0].recipient, PRESENTER);
    assert_eq!(sent[0].details.get("status").map(String::as_str), Some("SUBMITTED"));
}

#[test]
fn complete_requires_payment_for_priced_forms() {
    let (orchestrator, _, notifier, _) = build_orchestrator();
    let id = prepared(&orchestrator, "CC01", vec![file("f-1", "notice.pdf")]);
    orchestrator
        .update_payment_sessions(&id, vec![PaymentSession::pending("sess-1")])
        .expect("sessions");

    let completed = orchestrator.complete(&id).expect("complete");

    assert_eq!(completed.status, SubmissionStatus::PaymentRequired);
    assert_eq!(completed.fee_on_submission.as_deref(), Some("10"));
    assert!(completed.submitted_at.is_none());
    assert_eq!(notifier.sent_kinds(), vec![NotificationKind::Confirmation]);
}

#[test]
fn validation_failure_leaves_submission_untouched() {
    let (orchestrator, store, notifier, _) = build_orchestrator();
    let created = orchestrator
        .create(Some(crate::workflows::submission::Presenter {
            email: PRESENTER.to_string(),
        }))
        .expect("create");
    orchestrator
        .update_form_type(&created.id, "SH19")
        .expect("form type");
    let before = stored(&store, &created.id);

    match orchestrator.complete(&created.id) {
        Err(SubmissionError::ValidationFailed(ValidationError::MissingCompany(id))) => {
            assert_eq!(id, created.id)
        }
        other => panic!("expected missing company, got {other:?}"),
    }
    assert_eq!(stored(&store, &created.id), before);
    assert!(notifier.sent().is_empty());
}

#[test]
fn missing_form_details_are_reported_before_presenter() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let created = orchestrator.create(None).expect("create");

    match orchestrator.complete(&created.id) {
        Err(SubmissionError::ValidationFailed(ValidationError::MissingFormDetails(id))) => {
            assert_eq!(id, created.id)
        }
        other => panic!("expected missing form details, got {other:?}"),
    }
}

#[test]
fn complete_resolves_the_fee_in_force_at_completion() {
    let (orchestrator, _, _, fixture) = build_orchestrator();
    fixture
        .catalog
        .insert_form(FormTemplate::paper("RP04", "Second filing", Some("RP04")));
    fixture.catalog.insert_payment(PaymentTemplate {
        fee_code: "RP04".to_string(),
        active_from: now() + Duration::hours(12),
        items: vec![PaymentItem {
            amount: "15".to_string(),
            description: "Second filing".to_string(),
            available_payment_methods: vec!["credit-card".to_string()],
        }],
        status: "active".to_string(),
        links: BTreeMap::new(),
    });

    let id = prepared(&orchestrator, "RP04", vec![file("f-1", "rp04.pdf")]);
    assert!(orchestrator.get(&id).expect("get").fee_on_submission.is_none());

    fixture.clock.advance(Duration::days(1));
    match orchestrator.complete(&id) {
        Err(SubmissionError::ValidationFailed(ValidationError::PaymentSessionsRequired(_))) => {}
        other => panic!("expected payment sessions to be required, got {other:?}"),
    }

    orchestrator
        .update_payment_sessions(&id, vec![PaymentSession::pending("sess-1")])
        .expect("sessions");
    let completed = orchestrator.complete(&id).expect("complete");
    assert_eq!(completed.status, SubmissionStatus::PaymentRequired);
    assert_eq!(completed.fee_on_submission.as_deref(), Some("15"));
}

fn awaiting_payment(orchestrator: &TestOrchestrator) -> SubmissionId {
    let id = prepared(orchestrator, "CC01", vec![file("f-1", "notice.pdf")]);
    orchestrator
        .update_payment_sessions(&id, vec![PaymentSession::pending("sess-1")])
        .expect("sessions");
    orchestrator.complete(&id).expect("complete");
    id
}

#[test]
fn failed_then_successful_payment_submits() {
    let (orchestrator, _, notifier, fixture) = build_orchestrator();
    let id = awaiting_payment(&orchestrator);

    let failed = orchestrator
        .record_payment(&id, "sess-1", PaymentSessionState::Failed, None)
        .expect("failed payment");
    assert_eq!(failed.status, SubmissionStatus::PaymentFailed);
    assert_eq!(
        notifier.sent_kinds(),
        vec![NotificationKind::Confirmation, NotificationKind::PaymentFailed]
    );

    fixture.clock.advance(Duration::minutes(5));
    let paid = orchestrator
        .record_payment(
            &id,
            "sess-1",
            PaymentSessionState::Paid,
            Some("PAY-1".to_string()),
        )
        .expect("paid");
    let paid_at = now() + Duration::minutes(5);
    assert_eq!(paid.status, SubmissionStatus::Submitted);
    assert_eq!(paid.paid_at, Some(paid_at));
    assert_eq!(paid.submitted_at, Some(paid_at));
    assert_eq!(
        paid.payment_sessions[0].payment_reference.as_deref(),
        Some("PAY-1")
    );
}

#[test]
fn payment_outcomes_need_a_known_session_and_payable_state() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let open = open_submission(&orchestrator);
    match orchestrator.record_payment(&open, "sess-1", PaymentSessionState::Paid, None) {
        Err(SubmissionError::State(_)) => {}
        other => panic!("expected incorrect state, got {other:?}"),
    }

    let id = awaiting_payment(&orchestrator);
    match orchestrator.record_payment(&id, "sess-404", PaymentSessionState::Paid, None) {
        Err(SubmissionError::UnknownPaymentSession { session_id, .. }) => {
            assert_eq!(session_id, "sess-404")
        }
        other => panic!("expected unknown session, got {other:?}"),
    }
}

#[test]
fn queueing_marks_every_file_queued() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let id = processing(
        &orchestrator,
        "SH01",
        vec![file("a", "a.pdf"), file("b", "b.pdf")],
    );

    let submission = orchestrator.get(&id).expect("get");
    assert_eq!(submission.status, SubmissionStatus::Processing);
    assert!(submission
        .files()
        .iter()
        .all(|file| file.conversion_status == FileConversionStatus::Queued));
}

#[test]
fn electronic_forms_are_ready_as_soon_as_they_are_queued() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let id = prepared(&orchestrator, "SH19", Vec::new());
    orchestrator.complete(&id).expect("complete");

    let queued = orchestrator.queue_for_processing(&id).expect("queue");
    assert_eq!(queued.status, SubmissionStatus::ReadyToSubmit);
}

#[test]
fn queueing_requires_submitted() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let id = open_submission(&orchestrator);
    match orchestrator.queue_for_processing(&id) {
        Err(SubmissionError::State(StateViolation::IncorrectState { found, .. })) => {
            assert_eq!(found, SubmissionStatus::Open)
        }
        other => panic!("expected incorrect state, got {other:?}"),
    }
}

#[test]
fn infected_file_rejects_submission_once_all_outcomes_arrive() {
    let (orchestrator, _, notifier, _) = build_orchestrator();
    let id = processing(
        &orchestrator,
        "SH01",
        vec![file("a", "a.pdf"), file("b", "b.pdf")],
    );

    let first = orchestrator
        .record_file_outcome(&id, &file_id("a"), converted())
        .expect("first outcome");
    assert_eq!(
        first.progress,
        AggregationProgress::Pending {
            received: 1,
            expected: 2
        }
    );
    assert_eq!(first.submission.status, SubmissionStatus::Processing);

    let second = orchestrator
        .record_file_outcome(&id, &file_id("b"), FileOutcome::Infected)
        .expect("second outcome");
    match &second.progress {
        AggregationProgress::Finalized { verdict, decision } => {
            assert_eq!(*verdict, Verdict::RejectedByVirusScan);
            assert_eq!(decision.infected, vec!["b.pdf".to_string()]);
        }
        other => panic!("expected finalized decision, got {other:?}"),
    }
    assert_eq!(second.submission.status, SubmissionStatus::RejectedByVirusScan);

    let sent = notifier.sent();
    let av = sent.last().expect("av notification");
    assert_eq!(av.kind, NotificationKind::AvFailed);
    assert_eq!(av.recipient, "internal-filings@efs.local");
    assert_eq!(av.details.get("infected_files").map(String::as_str), Some("b.pdf"));
}

#[test]
fn accepted_files_route_by_delivery_channel() {
    let (orchestrator, _, notifier, _) = build_orchestrator();

    let fes = processing(&orchestrator, "SH01", vec![file("a", "a.pdf")]);
    let report = orchestrator
        .record_file_outcome(&fes, &file_id("a"), converted())
        .expect("outcome");
    assert_eq!(report.submission.status, SubmissionStatus::ReadyToSubmit);
    let converted_file = &report.submission.files()[0];
    assert_eq!(converted_file.converted_file_id.as_deref(), Some("converted-1"));
    assert_eq!(converted_file.number_of_pages, Some(3));

    let email = processing(&orchestrator, "AD01", vec![file("c", "c.pdf")]);
    let report = orchestrator
        .record_file_outcome(&email, &file_id("c"), converted())
        .expect("outcome");
    assert_eq!(report.submission.status, SubmissionStatus::ProcessedByEmail);
    assert_eq!(
        notifier.sent_kinds().last(),
        Some(&NotificationKind::InternalDelivery)
    );
}

#[test]
fn conversion_failure_rejects_without_av_notification() {
    let (orchestrator, _, notifier, _) = build_orchestrator();
    let id = processing(&orchestrator, "SH01", vec![file("a", "a.pdf")]);

    let report = orchestrator
        .record_file_outcome(&id, &file_id("a"), FileOutcome::ConversionFailed)
        .expect("outcome");

    assert_eq!(
        report.submission.status,
        SubmissionStatus::RejectedByDocumentConverter
    );
    assert!(!notifier.sent_kinds().contains(&NotificationKind::AvFailed));
}

#[test]
fn duplicate_outcomes_do_not_finalize() {
    let (orchestrator, store, _, _) = build_orchestrator();
    let id = processing(
        &orchestrator,
        "SH01",
        vec![file("a", "a.pdf"), file("b", "b.pdf")],
    );

    orchestrator
        .record_file_outcome(&id, &file_id("a"), converted())
        .expect("first");
    let version = stored(&store, &id).version;
    let repeat = orchestrator
        .record_file_outcome(&id, &file_id("a"), FileOutcome::Infected)
        .expect("repeat");

    assert_eq!(
        repeat.progress,
        AggregationProgress::Duplicate {
            received: 1,
            expected: 2
        }
    );
    let current = stored(&store, &id);
    assert_eq!(current.status, SubmissionStatus::Processing);
    assert_eq!(current.version, version);
    assert_eq!(
        current.files()[0].conversion_status,
        FileConversionStatus::Converted
    );
}

#[test]
fn unknown_files_are_rejected() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let id = processing(&orchestrator, "SH01", vec![file("a", "a.pdf")]);

    match orchestrator.record_file_outcome(&id, &file_id("zzz"), converted()) {
        Err(SubmissionError::Decision(DecisionError::UnknownFile { file_id, .. })) => {
            assert_eq!(file_id.0, "zzz")
        }
        other => panic!("expected unknown file, got {other:?}"),
    }
}

#[test]
fn file_outcomes_retry_lost_races() {
    let fixture = Fixture::new();
    let store = Arc::new(ContendedStore::new(InMemorySubmissionStore::default()));
    let orchestrator = fixture.orchestrator(store.clone(), Arc::new(RecordingNotifier::default()));
    let id = processing(&orchestrator, "SH01", vec![file("a", "a.pdf")]);

    store.lose_next_saves(2);
    let report = orchestrator
        .record_file_outcome(&id, &file_id("a"), converted())
        .expect("outcome after retries");
    assert_eq!(report.submission.status, SubmissionStatus::ReadyToSubmit);
}

#[test]
fn file_outcome_retries_are_bounded() {
    let fixture = Fixture::new();
    let store = Arc::new(ContendedStore::new(InMemorySubmissionStore::default()));
    let orchestrator = fixture.orchestrator(store.clone(), Arc::new(RecordingNotifier::default()));
    let id = processing(&orchestrator, "SH01", vec![file("a", "a.pdf")]);

    store.lose_next_saves(6);
    match orchestrator.record_file_outcome(&id, &file_id("a"), converted()) {
        Err(SubmissionError::Conflict(conflicted)) => assert_eq!(conflicted, id),
        other => panic!("expected conflict, got {other:?}"),
    }
    let current = store.inner.read(&id).expect("read").expect("present");
    assert_eq!(
        current.files()[0].conversion_status,
        FileConversionStatus::Queued
    );
}

fn ready_to_submit(orchestrator: &TestOrchestrator) -> SubmissionId {
    let id = processing(orchestrator, "SH01", vec![file("a", "a.pdf")]);
    orchestrator
        .record_file_outcome(&id, &file_id("a"), converted())
        .expect("outcome");
    id
}

#[test]
fn send_to_fes_assigns_barcode_and_hands_off_record() {
    let (orchestrator, _, _, fixture) = build_orchestrator();
    let id = ready_to_submit(&orchestrator);

    let sent = orchestrator.send_to_fes(&id).expect("send");

    assert_eq!(sent.status, SubmissionStatus::SentToFes);
    let barcode = sent.barcode().expect("barcode assigned").to_string();
    assert!(barcode.starts_with('X'));
    let records = fixture.loader.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].barcode, barcode);
    assert_eq!(records[0].company_number, "01234567");
    assert_eq!(records[0].documents.len(), 1);
}

#[test]
fn loader_failure_keeps_barcode_and_status() {
    let (orchestrator, store, _, fixture) = build_orchestrator();
    let id = ready_to_submit(&orchestrator);
    fixture.loader.set_offline(true);

    match orchestrator.send_to_fes(&id) {
        Err(SubmissionError::FesLoad(FesError::Loader(_))) => {}
        other => panic!("expected loader failure, got {other:?}"),
    }
    let after_failure = stored(&store, &id);
    assert_eq!(after_failure.status, SubmissionStatus::ReadyToSubmit);
    let barcode = after_failure.barcode().expect("barcode kept").to_string();

    fixture.loader.set_offline(false);
    let sent = orchestrator.send_to_fes(&id).expect("retry send");
    assert_eq!(sent.status, SubmissionStatus::SentToFes);
    assert_eq!(sent.barcode(), Some(barcode.as_str()));
}

/// Loader that parks inside `load` until the test releases it.
struct GatedLoader {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    loads: AtomicUsize,
}

impl FesLoader for GatedLoader {
    fn load(&self, _record: &FesBatchRecord) -> Result<(), FesError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Ok(entered) = self.entered.lock() {
            let _ = entered.send(());
        }
        if let Ok(release) = self.release.lock() {
            let _ = release.recv_timeout(std::time::Duration::from_secs(5));
        }
        Ok(())
    }
}

#[test]
fn concurrent_sends_hand_off_one_record() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let loader = Arc::new(GatedLoader {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
        loads: AtomicUsize::new(0),
    });
    let fixture = Fixture::new();
    let store = Arc::new(InMemorySubmissionStore::default());
    let orchestrator = fixture.orchestrator_with_loader(
        store.clone(),
        Arc::new(RecordingNotifier::default()),
        loader.clone(),
    );
    let id = ready_to_submit(&orchestrator);
    store
        .update_barcode(&id, "X0001", now())
        .expect("barcode kept from an earlier attempt");

    thread::scope(|scope| {
        let first = scope.spawn(|| orchestrator.send_to_fes(&id));
        entered_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("first send reaches the loader");

        match orchestrator.send_to_fes(&id) {
            Err(SubmissionError::Conflict(conflicted)) => assert_eq!(conflicted, id),
            other => panic!("expected conflict while a hand-off is in flight, got {other:?}"),
        }

        release_tx.send(()).expect("release loader");
        let sent = first.join().expect("first send thread").expect("first send");
        assert_eq!(sent.status, SubmissionStatus::SentToFes);
    });

    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    match orchestrator.send_to_fes(&id) {
        Err(SubmissionError::State(StateViolation::IncorrectState { found, .. })) => {
            assert_eq!(found, SubmissionStatus::SentToFes)
        }
        other => panic!("expected incorrect state after hand-off, got {other:?}"),
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn send_ready_to_fes_sends_every_ready_submission() {
    let (orchestrator, _, _, fixture) = build_orchestrator();
    let first = ready_to_submit(&orchestrator);
    let second = prepared(&orchestrator, "SH19", Vec::new());
    orchestrator.complete(&second).expect("complete");
    orchestrator.queue_for_processing(&second).expect("queue");

    let report = orchestrator.send_ready_to_fes().expect("batch");

    assert_eq!(report.processed.len(), 2);
    assert!(report.processed.contains(&first));
    assert!(report.processed.contains(&second));
    assert!(report.failed.is_empty());
    assert_eq!(fixture.loader.records().len(), 2);
}

#[test]
fn fes_rejection_carries_advisory_reasons() {
    let (orchestrator, _, notifier, fixture) = build_orchestrator();
    let id = ready_to_submit(&orchestrator);
    let sent = orchestrator.send_to_fes(&id).expect("send");
    let barcode = sent.barcode().expect("barcode").to_string();
    fixture
        .reasons
        .insert(barcode, vec!["Company name does not match".to_string()]);

    let rejected = orchestrator
        .record_fes_outcome(&id, FesOutcome::Rejected)
        .expect("rejected");

    assert_eq!(rejected.status, SubmissionStatus::Rejected);
    assert_eq!(rejected.reject_reasons, vec!["Company name does not match"]);
    let last = notifier.sent().pop().expect("notification");
    assert_eq!(last.kind, NotificationKind::Rejected);
    assert_eq!(
        last.details.get("reject_reasons").map(String::as_str),
        Some("Company name does not match")
    );
}

#[test]
fn reject_reason_outage_does_not_block_rejection() {
    let (orchestrator, _, _, fixture) = build_orchestrator();
    let id = ready_to_submit(&orchestrator);
    orchestrator.send_to_fes(&id).expect("send");
    fixture.reasons.set_unavailable(true);

    let rejected = orchestrator
        .record_fes_outcome(&id, FesOutcome::Rejected)
        .expect("rejected");
    assert_eq!(rejected.status, SubmissionStatus::Rejected);
    assert!(rejected.reject_reasons.is_empty());
}

#[test]
fn fes_acceptance_requires_sent_to_fes() {
    let (orchestrator, _, notifier, _) = build_orchestrator();
    let id = ready_to_submit(&orchestrator);

    match orchestrator.record_fes_outcome(&id, FesOutcome::Accepted) {
        Err(SubmissionError::State(StateViolation::IncorrectState { found, .. })) => {
            assert_eq!(found, SubmissionStatus::ReadyToSubmit)
        }
        other => panic!("expected incorrect state, got {other:?}"),
    }

    orchestrator.send_to_fes(&id).expect("send");
    let accepted = orchestrator
        .record_fes_outcome(&id, FesOutcome::Accepted)
        .expect("accepted");
    assert_eq!(accepted.status, SubmissionStatus::Accepted);
    assert_eq!(
        notifier.sent_kinds().last(),
        Some(&NotificationKind::Accepted)
    );
}

#[test]
fn notification_failures_never_roll_back() {
    let fixture = Fixture::new();
    let store = Arc::new(InMemorySubmissionStore::default());
    let notifier = Arc::new(FailingNotifier::default());
    let orchestrator = fixture.orchestrator(store.clone(), notifier.clone());
    let id = prepared(&orchestrator, "SH19", Vec::new());

    let completed = orchestrator.complete(&id).expect("complete despite mail outage");

    assert_eq!(completed.status, SubmissionStatus::Submitted);
    assert_eq!(stored(&store, &id).status, SubmissionStatus::Submitted);
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn queue_batch_prefers_same_day_forms() {
    let (orchestrator, store, _, fixture) = build_orchestrator();
    let routine = prepared(&orchestrator, "SH01", vec![file("a", "a.pdf")]);
    orchestrator.complete(&routine).expect("complete routine");

    fixture.clock.advance(Duration::minutes(1));
    let urgent = prepared(&orchestrator, "DS01", vec![file("b", "b.pdf")]);
    orchestrator
        .update_payment_sessions(&urgent, vec![PaymentSession::pending("sess-9")])
        .expect("sessions");
    let awaiting = orchestrator.complete(&urgent).expect("complete urgent");
    assert_eq!(awaiting.fee_on_submission.as_deref(), Some("33"));
    orchestrator
        .record_payment(&urgent, "sess-9", PaymentSessionState::Paid, None)
        .expect("paid");

    let first = orchestrator.queue_batch(Some(1)).expect("batch");
    assert_eq!(first.processed, vec![urgent.clone()]);
    assert_eq!(stored(&store, &routine).status, SubmissionStatus::Submitted);

    let second = orchestrator.queue_batch(None).expect("batch");
    assert_eq!(second.processed, vec![routine]);
}

#[test]
fn delayed_submissions_are_reported_to_support() {
    let (orchestrator, _, notifier, fixture) = build_orchestrator();
    let id = processing(&orchestrator, "SH01", vec![file("a", "a.pdf")]);

    assert!(orchestrator
        .report_delayed(SubmissionStatus::Processing)
        .expect("report")
        .is_empty());

    fixture.clock.advance(Duration::hours(2));
    let delayed = orchestrator
        .report_delayed(SubmissionStatus::Processing)
        .expect("report");

    assert_eq!(delayed.len(), 1);
    assert_eq!(delayed[0].submission_id, id);
    assert_eq!(delayed[0].minutes_delayed, 120);
    let last = notifier.sent().pop().expect("report mailed");
    assert_eq!(last.kind, NotificationKind::DelayedSubmissions);
    assert_eq!(last.recipient, "efs-support@efs.local");
    assert!(last
        .details
        .get("csv")
        .is_some_and(|csv| csv.contains(&id.0)));
}

#[test]
fn oversized_delay_window_is_an_error() {
    let fixture = Fixture::new();
    let config = OrchestratorConfig::from_config(&SubmissionConfig {
        delayed_after_minutes: 1_000_000_000_000,
        ..SubmissionConfig::default()
    });
    let orchestrator = fixture.orchestrator_with_config(
        Arc::new(InMemorySubmissionStore::default()),
        Arc::new(RecordingNotifier::default()),
        config,
    );

    match orchestrator.delayed_submissions(SubmissionStatus::Processing) {
        Err(SubmissionError::DelayOutOfRange(minutes)) => {
            assert_eq!(minutes, 1_000_000_000_000)
        }
        other => panic!("expected out of range delay, got {other:?}"),
    }

    let unbounded = OrchestratorConfig::from_config(&SubmissionConfig {
        delayed_after_minutes: i64::MAX,
        ..SubmissionConfig::default()
    });
    assert_eq!(unbounded.delayed_after, Duration::max_value());
}

#[test]
fn paid_report_lists_payments_in_window() {
    let (orchestrator, _, _, _) = build_orchestrator();
    let id = awaiting_payment(&orchestrator);
    orchestrator
        .record_payment(
            &id,
            "sess-1",
            PaymentSessionState::Paid,
            Some("PAY-1".to_string()),
        )
        .expect("paid");

    let rows = orchestrator
        .paid_submissions(now() - Duration::hours(1), now() + Duration::hours(1))
        .expect("report");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payment_reference, "PAY-1");

    let yesterday = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
    assert!(orchestrator
        .paid_submissions(yesterday, yesterday + Duration::hours(1))
        .expect("report")
        .is_empty());
}
