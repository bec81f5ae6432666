use super::{CatalogError, FormTemplate, GENERAL_CATEGORY};
use crate::workflows::submission::fees::{PaymentItem, PaymentTemplate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::io::Read;

pub(crate) fn parse_forms<R: Read>(reader: R) -> Result<Vec<FormTemplate>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut forms = Vec::new();

    for record in csv_reader.deserialize::<FormRow>() {
        let row = record?;
        forms.push(FormTemplate {
            form_type: row.form_type,
            description: row.description,
            fee_code: row.fee_code,
            fully_electronic: row.fully_electronic,
            fes_delivery: row.fes_delivery,
            same_day: row.same_day,
            category: row
                .category
                .unwrap_or_else(|| GENERAL_CATEGORY.to_string()),
        });
    }

    Ok(forms)
}

pub(crate) fn parse_payments<R: Read>(reader: R) -> Result<Vec<PaymentTemplate>, CatalogError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut templates: Vec<PaymentTemplate> = Vec::new();

    for (index, record) in csv_reader.deserialize::<PaymentRow>().enumerate() {
        let row = record?;
        let active_from =
            parse_start(&row.active_from).ok_or_else(|| CatalogError::InvalidRow {
                row: index + 1,
                message: format!("active_from '{}' is not a date or timestamp", row.active_from),
            })?;

        let item = PaymentItem {
            amount: row.amount,
            description: row.description,
            available_payment_methods: row
                .payment_methods
                .split(';')
                .map(str::trim)
                .filter(|method| !method.is_empty())
                .map(str::to_string)
                .collect(),
        };

        let existing = templates.iter().position(|template| {
            template.fee_code == row.fee_code && template.active_from == active_from
        });

        match existing {
            Some(position) => templates[position].items.push(item),
            None => templates.push(PaymentTemplate {
                links: BTreeMap::from([(
                    "self".to_string(),
                    format!(
                        "/payment-templates/{}/{}",
                        row.fee_code,
                        active_from.date_naive()
                    ),
                )]),
                fee_code: row.fee_code,
                active_from,
                items: vec![item],
                status: row.status,
            }),
        }
    }

    Ok(templates)
}

#[derive(Debug, Deserialize)]
struct FormRow {
    form_type: String,
    description: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    fee_code: Option<String>,
    #[serde(deserialize_with = "flag")]
    fully_electronic: bool,
    #[serde(deserialize_with = "flag")]
    fes_delivery: bool,
    #[serde(deserialize_with = "flag")]
    same_day: bool,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentRow {
    fee_code: String,
    active_from: String,
    amount: String,
    description: String,
    #[serde(default)]
    payment_methods: String,
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "active".to_string()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Ok(true),
        "" | "n" | "no" | "false" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected yes/no flag, found '{other}'"
        ))),
    }
}

fn parse_start(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
