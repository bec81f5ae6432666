//! Form and fee catalogs consulted by the orchestrator. Both are read-only from the
//! submission workflow's perspective; the importer loads them from CSV exports.

mod parser;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::fees::{FeeResolver, PaymentItem, PaymentTemplate};
use super::repository::RepositoryError;

pub const INSOLVENCY_CATEGORY: &str = "Insolvency";
const GENERAL_CATEGORY: &str = "General";

/// Registered form type and how submissions of it are routed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub form_type: String,
    pub description: String,
    pub fee_code: Option<String>,
    /// Delivered straight to FES without attachments.
    pub fully_electronic: bool,
    /// Converted documents are handed to FES rather than an internal mailbox.
    pub fes_delivery: bool,
    pub same_day: bool,
    pub category: String,
}

impl FormTemplate {
    pub fn paper(form_type: &str, description: &str, fee_code: Option<&str>) -> Self {
        Self {
            form_type: form_type.to_string(),
            description: description.to_string(),
            fee_code: fee_code.map(str::to_string),
            fully_electronic: false,
            fes_delivery: true,
            same_day: false,
            category: GENERAL_CATEGORY.to_string(),
        }
    }

    pub fn fully_electronic(form_type: &str, description: &str, fee_code: Option<&str>) -> Self {
        Self {
            fully_electronic: true,
            ..Self::paper(form_type, description, fee_code)
        }
    }

    pub fn in_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn delivered_by_email(mut self) -> Self {
        self.fes_delivery = false;
        self
    }

    pub fn with_same_day(mut self) -> Self {
        self.same_day = true;
        self
    }

    pub fn is_insolvency(&self) -> bool {
        self.category.trim().eq_ignore_ascii_case(INSOLVENCY_CATEGORY)
    }
}

pub trait FormTemplateLookup: Send + Sync {
    fn by_form_type(&self, form_type: &str) -> Result<Option<FormTemplate>, RepositoryError>;
    fn all(&self) -> Result<Vec<FormTemplate>, RepositoryError>;
}

pub trait PaymentTemplateLookup: Send + Sync {
    fn active_as_of(
        &self,
        fee_code: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PaymentTemplate>, RepositoryError>;
}

/// Shared handle over the two catalog lookups.
#[derive(Clone)]
pub struct Catalog {
    forms: Arc<dyn FormTemplateLookup>,
    payments: Arc<dyn PaymentTemplateLookup>,
}

impl Catalog {
    pub fn new(
        forms: Arc<dyn FormTemplateLookup>,
        payments: Arc<dyn PaymentTemplateLookup>,
    ) -> Self {
        Self { forms, payments }
    }

    pub fn form(&self, form_type: &str) -> Result<Option<FormTemplate>, RepositoryError> {
        self.forms.by_form_type(form_type)
    }

    pub fn forms(&self) -> Result<Vec<FormTemplate>, RepositoryError> {
        self.forms.all()
    }

    pub fn fees(&self) -> FeeResolver<'_> {
        FeeResolver::new(self.forms.as_ref(), self.payments.as_ref())
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { row: usize, message: String },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(err) => write!(f, "failed to read catalog export: {}", err),
            CatalogError::Csv(err) => write!(f, "invalid catalog CSV data: {}", err),
            CatalogError::InvalidRow { row, message } => {
                write!(f, "catalog row {} rejected: {}", row, message)
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(err) => Some(err),
            CatalogError::Csv(err) => Some(err),
            CatalogError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CatalogError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct CatalogImporter;

impl CatalogImporter {
    pub fn forms_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<FormTemplate>, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::forms_from_reader(file)
    }

    /// Columns: `form_type,description,fee_code,fully_electronic,fes_delivery,same_day,category`.
    pub fn forms_from_reader<R: Read>(reader: R) -> Result<Vec<FormTemplate>, CatalogError> {
        parser::parse_forms(reader)
    }

    pub fn payments_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<PaymentTemplate>, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::payments_from_reader(file)
    }

    /// Columns: `fee_code,active_from,amount,description,payment_methods,status`.
    /// Rows sharing a fee code and start date become line items of one template.
    pub fn payments_from_reader<R: Read>(reader: R) -> Result<Vec<PaymentTemplate>, CatalogError> {
        parser::parse_payments(reader)
    }

    /// Built-in catalog used when no CSV exports are configured.
    pub fn standard() -> (Vec<FormTemplate>, Vec<PaymentTemplate>) {
        let forms = vec![
            FormTemplate::fully_electronic("SH19", "Statement of capital", None),
            FormTemplate::paper("CC01", "Notice of restriction on the articles", Some("CC01")),
            FormTemplate::paper("SH01", "Return of allotment of shares", None),
            FormTemplate::paper("AD01", "Change of registered office address", None)
                .delivered_by_email(),
            FormTemplate::paper("LIQ02", "Notice of statement of affairs", None)
                .in_category(INSOLVENCY_CATEGORY),
            FormTemplate::paper("DS01", "Striking off application by a company", Some("DS01"))
                .with_same_day(),
        ];

        let payments = vec![
            standard_template("CC01", 2020, 1, 1, "10", "Restriction on the articles"),
            standard_template("DS01", 2020, 1, 1, "10", "Striking off application"),
            standard_template("DS01", 2024, 5, 1, "33", "Striking off application"),
        ];

        (forms, payments)
    }
}

fn standard_template(
    fee_code: &str,
    year: i32,
    month: u32,
    day: u32,
    amount: &str,
    description: &str,
) -> PaymentTemplate {
    let active_from = Utc
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default();

    PaymentTemplate {
        fee_code: fee_code.to_string(),
        active_from,
        items: vec![PaymentItem {
            amount: amount.to_string(),
            description: description.to_string(),
            available_payment_methods: vec!["credit-card".to_string(), "account".to_string()],
        }],
        status: "active".to_string(),
        links: [(
            "self".to_string(),
            format!("/payment-templates/{fee_code}/{}", active_from.date_naive()),
        )]
        .into_iter()
        .collect(),
    }
}
