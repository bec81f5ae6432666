use super::{Rule, ValidationContext, ValidationError};

pub(super) const ORDERED: &[Rule] = &[
    form_type_present,
    form_type_registered,
    insolvency_confirmed,
    files_attached,
    payment_sessions_match_fee,
    electronic_forms_file_free,
    presenter_present,
    company_present,
    confirmation_reference_present,
];

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn fully_electronic(context: &ValidationContext<'_>) -> bool {
    context.form.is_some_and(|form| form.fully_electronic)
}

fn form_type_present(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    let submission = context.submission;
    let Some(details) = submission.form_details.as_ref() else {
        return Err(ValidationError::MissingFormDetails(submission.id.clone()));
    };

    match details.form_type.as_deref() {
        Some(form_type) if !is_blank(form_type) => Ok(()),
        _ => Err(ValidationError::BlankFormType(submission.id.clone())),
    }
}

fn form_type_registered(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    if context.form.is_some() {
        return Ok(());
    }
    Err(ValidationError::UnknownFormType {
        id: context.submission.id.clone(),
        form_type: context
            .submission
            .form_type()
            .unwrap_or_default()
            .to_string(),
    })
}

fn insolvency_confirmed(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    let insolvency = context.form.is_some_and(|form| form.is_insolvency());
    if insolvency && context.submission.confirm_authorised != Some(true) {
        return Err(ValidationError::ConfirmAuthorisedRequired(
            context.submission.id.clone(),
        ));
    }
    Ok(())
}

fn files_attached(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    if fully_electronic(context) {
        return Ok(());
    }

    let submission = context.submission;
    let files = submission.files();
    if files.is_empty() {
        return Err(ValidationError::MissingFiles(submission.id.clone()));
    }

    match files.iter().position(|file| is_blank(&file.file_id.0)) {
        Some(index) => Err(ValidationError::InvalidFileEntry {
            id: submission.id.clone(),
            index,
        }),
        None => Ok(()),
    }
}

fn payment_sessions_match_fee(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    let submission = context.submission;
    let fee_due = context.fee.payable().is_some();
    let has_sessions = !submission.payment_sessions.is_empty();

    match (fee_due, has_sessions) {
        (true, false) => Err(ValidationError::PaymentSessionsRequired(
            submission.id.clone(),
        )),
        (false, true) => Err(ValidationError::UnexpectedPaymentSessions(
            submission.id.clone(),
        )),
        _ => Ok(()),
    }
}

fn electronic_forms_file_free(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    if fully_electronic(context) && !context.submission.files().is_empty() {
        return Err(ValidationError::FilesNotAllowed(
            context.submission.id.clone(),
        ));
    }
    Ok(())
}

fn presenter_present(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    let submission = context.submission;
    match submission.presenter.as_ref() {
        None => Err(ValidationError::MissingPresenter(submission.id.clone())),
        Some(presenter) if is_blank(&presenter.email) => {
            Err(ValidationError::BlankPresenterEmail(submission.id.clone()))
        }
        Some(_) => Ok(()),
    }
}

fn company_present(context: &ValidationContext<'_>) -> Result<(), ValidationError> {
    let submission = context.submission;
    let Some(company) = submission.company.as_ref() else {
        return Err(ValidationError::MissingCompany(submission.id.clone()));
    };

    if is_blank(&company.company_number) {
        return Err(ValidationError::BlankCompanyNumber(submission.id.clone()));
    }
    if is_blank(&company.company_name) {
        return Err(ValidationError::BlankCompanyName(submission.id.clone()));
    }
    Ok(())
}

fn confirmation_reference_present(
    context: &ValidationContext<'_>,
) -> Result<(), ValidationError> {
    if is_blank(&context.submission.confirmation_reference) {
        return Err(ValidationError::BlankConfirmationReference(
            context.submission.id.clone(),
        ));
    }
    Ok(())
}
