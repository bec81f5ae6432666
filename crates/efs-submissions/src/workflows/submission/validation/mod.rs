mod rules;

use super::catalog::FormTemplate;
use super::domain::{Submission, SubmissionId};
use super::fees::FeeResolution;

/// Immutable view handed to every completeness rule.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub submission: &'a Submission,
    /// Registered template for the submission's form type, if any.
    pub form: Option<&'a FormTemplate>,
    pub fee: &'a FeeResolution,
}

type Rule = fn(&ValidationContext<'_>) -> Result<(), ValidationError>;

/// Ordered completeness checks run before a submission may leave OPEN.
pub struct ValidationChain {
    rules: &'static [Rule],
}

impl Default for ValidationChain {
    fn default() -> Self {
        Self {
            rules: rules::ORDERED,
        }
    }
}

impl ValidationChain {
    /// Evaluates rules in order and stops at the first failure.
    pub fn validate(&self, context: &ValidationContext<'_>) -> Result<(), ValidationError> {
        self.rules.iter().try_for_each(|rule| rule(context))
    }
}

/// Reason a submission failed completion checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("form details are missing for submission [{0}]")]
    MissingFormDetails(SubmissionId),
    #[error("form type is blank for submission [{0}]")]
    BlankFormType(SubmissionId),
    #[error("form type [{form_type}] is not registered for submission [{id}]")]
    UnknownFormType { id: SubmissionId, form_type: String },
    #[error("confirm authorised must be true for insolvency form on submission [{0}]")]
    ConfirmAuthorisedRequired(SubmissionId),
    #[error("file details are missing for submission [{0}]")]
    MissingFiles(SubmissionId),
    #[error("file details entry {index} is empty for submission [{id}]")]
    InvalidFileEntry { id: SubmissionId, index: usize },
    #[error("payment sessions are required for fee-bearing submission [{0}]")]
    PaymentSessionsRequired(SubmissionId),
    #[error("payment sessions are not allowed for submission [{0}] without a fee")]
    UnexpectedPaymentSessions(SubmissionId),
    #[error("files are not allowed for fully electronic form on submission [{0}]")]
    FilesNotAllowed(SubmissionId),
    #[error("presenter is missing for submission [{0}]")]
    MissingPresenter(SubmissionId),
    #[error("presenter email is blank for submission [{0}]")]
    BlankPresenterEmail(SubmissionId),
    #[error("company is missing for submission [{0}]")]
    MissingCompany(SubmissionId),
    #[error("company number is blank for submission [{0}]")]
    BlankCompanyNumber(SubmissionId),
    #[error("company name is blank for submission [{0}]")]
    BlankCompanyName(SubmissionId),
    #[error("confirmation reference is blank for submission [{0}]")]
    BlankConfirmationReference(SubmissionId),
}

impl ValidationError {
    /// Name of the offending submission field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingFormDetails(_) => "form_details",
            ValidationError::BlankFormType(_) | ValidationError::UnknownFormType { .. } => {
                "form_type"
            }
            ValidationError::ConfirmAuthorisedRequired(_) => "confirm_authorised",
            ValidationError::MissingFiles(_)
            | ValidationError::InvalidFileEntry { .. }
            | ValidationError::FilesNotAllowed(_) => "file_details",
            ValidationError::PaymentSessionsRequired(_)
            | ValidationError::UnexpectedPaymentSessions(_) => "payment_sessions",
            ValidationError::MissingPresenter(_) | ValidationError::BlankPresenterEmail(_) => {
                "presenter"
            }
            ValidationError::MissingCompany(_)
            | ValidationError::BlankCompanyNumber(_)
            | ValidationError::BlankCompanyName(_) => "company",
            ValidationError::BlankConfirmationReference(_) => "confirmation_reference",
        }
    }
}
