use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::{FormTemplateLookup, PaymentTemplateLookup};
use super::repository::RepositoryError;

/// Time-versioned price record for a fee code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTemplate {
    pub fee_code: String,
    pub active_from: DateTime<Utc>,
    pub items: Vec<PaymentItem>,
    pub status: String,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentItem {
    pub amount: String,
    pub description: String,
    #[serde(default)]
    pub available_payment_methods: Vec<String>,
}

/// Picks the template in force at `as_of`: the latest start that is not in the future.
pub fn select_active<'a, I>(
    templates: I,
    fee_code: &str,
    as_of: DateTime<Utc>,
) -> Option<&'a PaymentTemplate>
where
    I: IntoIterator<Item = &'a PaymentTemplate>,
{
    templates
        .into_iter()
        .filter(|template| template.fee_code == fee_code && template.active_from <= as_of)
        .max_by_key(|template| template.active_from)
}

/// Parses a fee string into a positive amount. Zero, negative and malformed amounts are not payable.
pub fn payable_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|amount| *amount > Decimal::ZERO)
}

/// Result of resolving a form type's fee at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum FeeResolution {
    /// Unknown form type, or the form carries no fee code.
    NotApplicable,
    /// A fee code exists but no template is in force yet.
    NoActiveTemplate { fee_code: String },
    /// A template is in force but its first item has no numeric amount.
    Unusable {
        fee_code: String,
        raw_amount: Option<String>,
    },
    Due { fee_code: String, amount: String },
}

impl FeeResolution {
    pub fn template_found(&self) -> bool {
        matches!(
            self,
            FeeResolution::Unusable { .. } | FeeResolution::Due { .. }
        )
    }

    /// The raw amount kept on the submission.
    pub fn stored_amount(&self) -> Option<String> {
        match self {
            FeeResolution::Due { amount, .. } => Some(amount.clone()),
            FeeResolution::Unusable { raw_amount, .. } => raw_amount.clone(),
            FeeResolution::NotApplicable | FeeResolution::NoActiveTemplate { .. } => None,
        }
    }

    pub fn payable(&self) -> Option<Decimal> {
        match self {
            FeeResolution::Due { amount, .. } => payable_amount(amount),
            _ => None,
        }
    }
}

/// Resolves the amount due for a form type from the form and payment catalogs.
pub struct FeeResolver<'a> {
    forms: &'a dyn FormTemplateLookup,
    payments: &'a dyn PaymentTemplateLookup,
}

impl<'a> FeeResolver<'a> {
    pub fn new(forms: &'a dyn FormTemplateLookup, payments: &'a dyn PaymentTemplateLookup) -> Self {
        Self { forms, payments }
    }

    pub fn resolve(
        &self,
        form_type: &str,
        as_of: DateTime<Utc>,
    ) -> Result<FeeResolution, RepositoryError> {
        let Some(form) = self.forms.by_form_type(form_type)? else {
            return Ok(FeeResolution::NotApplicable);
        };

        let fee_code = match form.fee_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => return Ok(FeeResolution::NotApplicable),
        };

        let Some(template) = self.payments.active_as_of(&fee_code, as_of)? else {
            return Ok(FeeResolution::NoActiveTemplate { fee_code });
        };

        let raw_amount = template
            .items
            .first()
            .map(|item| item.amount.trim().to_string())
            .filter(|amount| !amount.is_empty());

        match raw_amount {
            Some(amount) if Decimal::from_str(&amount).is_ok() => {
                Ok(FeeResolution::Due { fee_code, amount })
            }
            raw_amount => Ok(FeeResolution::Unusable {
                fee_code,
                raw_amount,
            }),
        }
    }
}
