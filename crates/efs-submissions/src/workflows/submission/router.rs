use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::decision::FileOutcome;
use super::domain::{
    Company, FileDetails, FileId, PaymentSession, PaymentSessionState, Presenter, SubmissionId,
    SubmissionStatus,
};
use super::fes::FesOutcome;
use super::notification::Notifier;
use super::reports::render_csv;
use super::repository::{RepositoryError, SubmissionStore};
use super::service::{SubmissionError, SubmissionOrchestrator};

type Shared<S, N> = State<Arc<SubmissionOrchestrator<S, N>>>;

/// Router builder exposing the submission lifecycle over HTTP.
pub fn submission_router<S, N>(orchestrator: Arc<SubmissionOrchestrator<S, N>>) -> Router
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/efs-submission-api/submissions",
            post(create_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id",
            get(get_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/company",
            put(company_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/form",
            put(form_type_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/files",
            put(files_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/payment-sessions",
            put(payment_sessions_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/confirm-authorised",
            put(confirm_authorised_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/complete",
            put(complete_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/payment",
            post(payment_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/queue",
            post(queue_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/files/:file_id/outcome",
            post(file_outcome_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/fes",
            post(send_to_fes_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/submissions/:submission_id/fes/outcome",
            post(fes_outcome_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/fees/:form_type",
            get(fee_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/reports/delayed",
            get(delayed_report_handler::<S, N>),
        )
        .route(
            "/efs-submission-api/reports/paid",
            get(paid_report_handler::<S, N>),
        )
        .with_state(orchestrator)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub presenter_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FormTypeRequest {
    pub form_type: String,
}

/// Upload entry; `null` entries are kept so validation can reject them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUpload {
    #[serde(default)]
    pub file_id: Option<FileId>,
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct FilesRequest {
    pub files: Vec<Option<FileUpload>>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmAuthorisedRequest {
    pub confirm_authorised: bool,
}

#[derive(Debug, Deserialize)]
pub struct PaymentOutcomeRequest {
    pub session_id: String,
    pub state: PaymentSessionState,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FesOutcomeRequest {
    pub outcome: FesOutcome,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeeQuery {
    pub as_of: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DelayedQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaidQuery {
    pub from: String,
    pub to: String,
}

pub(crate) async fn create_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    body: Option<axum::Json<CreateRequest>>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let request = body.map(|axum::Json(request)| request).unwrap_or_default();
    let presenter = request
        .presenter_email
        .map(|email| Presenter { email });
    respond(orchestrator.create(presenter), StatusCode::CREATED)
}

pub(crate) async fn get_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator.get(&SubmissionId(submission_id)),
        StatusCode::OK,
    )
}

pub(crate) async fn company_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
    axum::Json(company): axum::Json<Company>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator.update_company(&SubmissionId(submission_id), company),
        StatusCode::OK,
    )
}

pub(crate) async fn form_type_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
    axum::Json(request): axum::Json<FormTypeRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator.update_form_type(&SubmissionId(submission_id), &request.form_type),
        StatusCode::OK,
    )
}

pub(crate) async fn files_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
    axum::Json(request): axum::Json<FilesRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let files = request
        .files
        .into_iter()
        .map(|entry| match entry {
            Some(upload) => FileDetails::new(
                upload
                    .file_id
                    .unwrap_or_else(|| orchestrator.new_file_id()),
                upload.file_name,
                upload.file_size,
            ),
            None => FileDetails::new(FileId(String::new()), "", 0),
        })
        .collect();

    respond(
        orchestrator.update_files(&SubmissionId(submission_id), files),
        StatusCode::OK,
    )
}

pub(crate) async fn payment_sessions_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
    axum::Json(sessions): axum::Json<Vec<PaymentSession>>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator.update_payment_sessions(&SubmissionId(submission_id), sessions),
        StatusCode::OK,
    )
}

pub(crate) async fn confirm_authorised_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
    axum::Json(request): axum::Json<ConfirmAuthorisedRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator
            .update_confirm_authorised(&SubmissionId(submission_id), request.confirm_authorised),
        StatusCode::OK,
    )
}

pub(crate) async fn complete_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator
            .complete(&SubmissionId(submission_id))
            .map(|submission| submission.status_view()),
        StatusCode::OK,
    )
}

pub(crate) async fn payment_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
    axum::Json(request): axum::Json<PaymentOutcomeRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator
            .record_payment(
                &SubmissionId(submission_id),
                &request.session_id,
                request.state,
                request.payment_reference,
            )
            .map(|submission| submission.status_view()),
        StatusCode::OK,
    )
}

pub(crate) async fn queue_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator
            .queue_for_processing(&SubmissionId(submission_id))
            .map(|submission| submission.status_view()),
        StatusCode::ACCEPTED,
    )
}

pub(crate) async fn file_outcome_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path((submission_id, file_id)): Path<(String, String)>,
    axum::Json(outcome): axum::Json<FileOutcome>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator
            .record_file_outcome(&SubmissionId(submission_id), &FileId(file_id), outcome)
            .map(|report| report.submission.status_view()),
        StatusCode::OK,
    )
}

pub(crate) async fn send_to_fes_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator
            .send_to_fes(&SubmissionId(submission_id))
            .map(|submission| submission.status_view()),
        StatusCode::ACCEPTED,
    )
}

pub(crate) async fn fes_outcome_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(submission_id): Path<String>,
    axum::Json(request): axum::Json<FesOutcomeRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    respond(
        orchestrator.record_fes_outcome(&SubmissionId(submission_id), request.outcome),
        StatusCode::OK,
    )
}

pub(crate) async fn fee_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Path(form_type): Path<String>,
    Query(query): Query<FeeQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let as_of = match query.as_of.as_deref() {
        Some(raw) => match parse_instant(raw) {
            Some(at) => at,
            None => return bad_request(format!("as_of '{raw}' is not a date or timestamp")),
        },
        None => Utc::now(),
    };

    match orchestrator.fee_for(&form_type, as_of) {
        Ok(resolution) => {
            let payload = json!({
                "form_type": form_type,
                "as_of": as_of,
                "fee": resolution.stored_amount(),
                "payable": resolution.payable().is_some(),
                "detail": resolution,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delayed_report_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Query(query): Query<DelayedQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let status = match query.status.as_deref() {
        Some(raw) => match SubmissionStatus::from_label(raw) {
            Some(status) => status,
            None => return bad_request(format!("unknown status '{raw}'")),
        },
        None => SubmissionStatus::Processing,
    };

    match orchestrator.delayed_submissions(status) {
        Ok(rows) => csv_response(render_csv(&rows)),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn paid_report_handler<S, N>(
    State(orchestrator): Shared<S, N>,
    Query(query): Query<PaidQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: Notifier + 'static,
{
    let (Some(from), Some(to)) = (parse_instant(&query.from), parse_instant(&query.to)) else {
        return bad_request("from and to must be dates or timestamps".to_string());
    };

    match orchestrator.paid_submissions(from, to) {
        Ok(rows) => csv_response(render_csv(&rows)),
        Err(err) => error_response(err),
    }
}

fn respond<T: Serialize>(result: Result<T, SubmissionError>, ok: StatusCode) -> Response {
    match result {
        Ok(body) => (ok, axum::Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn error_response(err: SubmissionError) -> Response {
    let status = match &err {
        SubmissionError::NotFound(_)
        | SubmissionError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        SubmissionError::State(_)
        | SubmissionError::Conflict(_)
        | SubmissionError::Repository(RepositoryError::Duplicate)
        | SubmissionError::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
        SubmissionError::ValidationFailed(_)
        | SubmissionError::Decision(_)
        | SubmissionError::UnknownPaymentSession { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionError::FesLoad(_) => StatusCode::BAD_GATEWAY,
        SubmissionError::Repository(RepositoryError::Unavailable(_))
        | SubmissionError::DelayOutOfRange(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut payload = json!({ "error": err.to_string() });
    if let SubmissionError::ValidationFailed(validation) = &err {
        payload["field"] = json!(validation.field());
    }
    (status, axum::Json(payload)).into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, axum::Json(json!({ "error": message }))).into_response()
}

fn csv_response(rendered: Result<String, super::reports::ReportError>) -> Response {
    match rendered {
        Ok(csv) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
