use crate::infra::{build_orchestrator, catalog_handle, load_catalog, parse_as_of};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use efs_submissions::config::SubmissionConfig;
use efs_submissions::error::AppError;
use efs_submissions::workflows::submission::{
    Company, FeeResolution, FesOutcome, FileDetails, FileId, FileOutcome, ManualClock,
    PaymentSession, PaymentSessionState, Presenter, SubmissionError, SubmissionId,
    SubmissionStatus,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct FeeArgs {
    /// Form type to price, e.g. CC01
    pub(crate) form_type: String,
    /// Date or timestamp to resolve the fee at (defaults to now)
    #[arg(long, value_parser = parse_as_of)]
    pub(crate) as_of: Option<DateTime<Utc>>,
    /// Form template CSV export to use instead of the built-in catalog
    #[arg(long)]
    pub(crate) forms_csv: Option<PathBuf>,
    /// Payment template CSV export to use instead of the built-in catalog
    #[arg(long)]
    pub(crate) payments_csv: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Starting instant for the simulated clock (defaults to now)
    #[arg(long, value_parser = parse_as_of)]
    pub(crate) start: Option<DateTime<Utc>>,
    /// Report the second upload as infected so the filing is rejected
    #[arg(long)]
    pub(crate) infected: bool,
    /// Have FES reject the filing instead of accepting it
    #[arg(long)]
    pub(crate) fes_reject: bool,
}

pub(crate) fn run_fee_lookup(args: FeeArgs) -> Result<(), AppError> {
    let FeeArgs {
        form_type,
        as_of,
        forms_csv,
        payments_csv,
    } = args;

    let config = SubmissionConfig {
        form_templates_csv: forms_csv,
        payment_templates_csv: payments_csv,
        ..SubmissionConfig::default()
    };
    let catalog = catalog_handle(&load_catalog(&config)?);
    let as_of = as_of.unwrap_or_else(Utc::now);
    let resolution = catalog
        .fees()
        .resolve(&form_type, as_of)
        .map_err(SubmissionError::from)?;

    println!("Fee for {} as of {}", form_type, as_of.to_rfc3339());
    println!("- {}", describe_fee(&resolution));
    Ok(())
}

fn describe_fee(resolution: &FeeResolution) -> String {
    match resolution {
        FeeResolution::NotApplicable => "no fee applies".to_string(),
        FeeResolution::NoActiveTemplate { fee_code } => {
            format!("fee code {fee_code} has no template in force yet")
        }
        FeeResolution::Unusable {
            fee_code,
            raw_amount,
        } => format!(
            "fee code {fee_code} has an unusable amount ({})",
            raw_amount.as_deref().unwrap_or("blank")
        ),
        FeeResolution::Due { fee_code, amount } => match resolution.payable() {
            Some(payable) => format!("{payable} due under fee code {fee_code}"),
            None => format!("fee code {fee_code} is set to {amount}, nothing to pay"),
        },
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        start,
        infected,
        fes_reject,
    } = args;

    let clock = Arc::new(ManualClock::starting_at(start.unwrap_or_else(Utc::now)));
    let config = SubmissionConfig::default();
    let (orchestrator, adapters) = build_orchestrator(&config)?;
    let orchestrator = orchestrator.with_clock(clock.clone());

    println!("EFS submission lifecycle demo");

    let created = orchestrator.create(Some(Presenter {
        email: "filings@acme.example".to_string(),
    }))?;
    let id = created.id.clone();
    println!(
        "- Opened submission {} (reference {})",
        id, created.confirmation_reference
    );

    orchestrator.update_company(
        &id,
        Company {
            company_number: "01234567".to_string(),
            company_name: "Acme Widgets Ltd".to_string(),
        },
    )?;
    let priced = orchestrator.update_form_type(&id, "CC01")?;
    println!(
        "- Form CC01 selected, fee on submission {}",
        priced.fee_on_submission.as_deref().unwrap_or("none")
    );
    orchestrator.update_files(
        &id,
        vec![
            FileDetails::new(FileId("demo-articles".to_string()), "articles.pdf", 48_213),
            FileDetails::new(FileId("demo-resolution".to_string()), "resolution.pdf", 12_877),
        ],
    )?;

    if let Err(err) = orchestrator.complete(&id) {
        println!("  Completion rejected as expected without payment sessions: {err}");
    }
    orchestrator.update_payment_sessions(&id, vec![PaymentSession::pending("demo-session")])?;
    let completed = orchestrator.complete(&id)?;
    println!("- Completed -> {}", completed.status);

    clock.advance(Duration::minutes(2));
    let paid = orchestrator.record_payment(
        &id,
        "demo-session",
        PaymentSessionState::Paid,
        Some("PAY-DEMO-1".to_string()),
    )?;
    println!("- Payment taken -> {}", paid.status);

    let queued = orchestrator.queue_batch(None)?;
    println!("- Queued {} submission(s) for conversion", queued.processed.len());

    clock.advance(Duration::minutes(5));
    let outcomes = [
        ("demo-articles", converted(4)),
        (
            "demo-resolution",
            if infected {
                FileOutcome::Infected
            } else {
                converted(1)
            },
        ),
    ];
    for (file_id, outcome) in outcomes {
        let report = orchestrator.record_file_outcome(&id, &FileId(file_id.to_string()), outcome)?;
        println!(
            "  {} reported -> {:?} ({})",
            file_id, report.progress, report.submission.status
        );
    }

    let current = orchestrator.get(&id)?;
    if current.status == SubmissionStatus::ReadyToSubmit {
        let sent = orchestrator.send_ready_to_fes()?;
        println!(
            "- Sent {} submission(s) to FES, loader holds {} record(s)",
            sent.processed.len(),
            adapters.loader.records().len()
        );

        let outcome = if fes_reject {
            if let Some(barcode) = orchestrator.get(&id)?.barcode() {
                adapters.reasons.insert(
                    barcode,
                    vec!["Company name does not match the register".to_string()],
                );
            }
            FesOutcome::Rejected
        } else {
            FesOutcome::Accepted
        };
        let adjudicated = orchestrator.record_fes_outcome(&id, outcome)?;
        println!("- FES adjudicated -> {}", adjudicated.status);
        for reason in &adjudicated.reject_reasons {
            println!("  Reject reason: {reason}");
        }
    } else {
        println!("- Filing stopped at {}", current.status);
    }

    let stalled = stalled_submission(&orchestrator)?;
    clock.advance(Duration::minutes(90));
    let delayed = orchestrator.report_delayed(SubmissionStatus::Processing)?;
    println!(
        "\nDelayed submissions report: {} stuck in PROCESSING (includes {})",
        delayed.len(),
        stalled
    );

    let today = clock_day(&orchestrator, &id)?;
    let paid_rows = orchestrator.paid_submissions(today, today + Duration::days(1))?;
    println!("Paid submissions today: {}", paid_rows.len());

    match serde_json::to_string_pretty(&orchestrator.get(&id)?.status_view()) {
        Ok(json) => println!("\nPublic status payload:\n{}", json),
        Err(err) => println!("\nPublic status payload unavailable: {}", err),
    }
    println!("Stored submissions: {}", adapters.store.len());

    Ok(())
}

fn converted(pages: u32) -> FileOutcome {
    FileOutcome::Converted {
        converted_file_id: None,
        number_of_pages: Some(pages),
    }
}

/// Leaves an SH01 filing in PROCESSING with no outcomes so the delay report has work.
fn stalled_submission(
    orchestrator: &crate::infra::LocalOrchestrator,
) -> Result<SubmissionId, SubmissionError> {
    let created = orchestrator.create(Some(Presenter {
        email: "filings@acme.example".to_string(),
    }))?;
    let id = created.id;
    orchestrator.update_company(
        &id,
        Company {
            company_number: "07654321".to_string(),
            company_name: "Slow Parcel Ltd".to_string(),
        },
    )?;
    orchestrator.update_form_type(&id, "SH01")?;
    orchestrator.update_files(
        &id,
        vec![FileDetails::new(FileId("demo-allotment".to_string()), "allotment.pdf", 9_412)],
    )?;
    orchestrator.complete(&id)?;
    orchestrator.queue_for_processing(&id)?;
    Ok(id)
}

/// Midnight of the day the demo submission was created.
fn clock_day(
    orchestrator: &crate::infra::LocalOrchestrator,
    id: &SubmissionId,
) -> Result<DateTime<Utc>, SubmissionError> {
    let created_at = orchestrator.get(id)?.created_at;
    Ok(created_at
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(created_at))
}
