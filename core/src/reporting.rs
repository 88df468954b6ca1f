//! Regulatory report drafting.
//!
//! CTRs are drafted automatically when a large cash rule fires, one per
//! transaction, with a filing deadline attached. SARs are drafted when
//! a case closes with a file_sar decision and cover the case's whole
//! activity window. Both start as drafts; filing is a separate step.

use crate::alerts::ACTOR_SYSTEM;
use crate::clock::format_ts;
use crate::error::{AmlError, AmlResult};
use crate::risk_factors::SECONDS_PER_DAY;
use crate::store::{AmlStore, CaseRow, CtrReportRow, SarReportRow, TransactionRow};
use crate::types::{ReportStatus, TransactionType};

/// Draft a CTR for a reportable cash transaction. Returns None when the
/// transaction already carries one.
pub fn draft_ctr(
    store: &AmlStore,
    txn: &TransactionRow,
    deadline_days: i64,
    now: i64,
) -> AmlResult<Option<CtrReportRow>> {
    if store.get_ctr_by_transaction(&txn.transaction_id)?.is_some() {
        return Ok(None);
    }
    let customer = store
        .get_customer(&txn.customer_id)?
        .ok_or_else(|| AmlError::not_found("customer", &txn.customer_id))?;

    let report_number = format!(
        "CTR-{}-{:04}",
        format_ts(now, "%Y%m%d"),
        store.count_ctrs()? + 1
    );
    // Deposits count as cash in; everything else reportable is cash out.
    let (total_cash_in, total_cash_out) = if txn.transaction_type == TransactionType::Deposit {
        (txn.amount, 0.0)
    } else {
        (0.0, txn.amount)
    };
    let row = CtrReportRow {
        report_number: report_number.clone(),
        transaction_id: txn.transaction_id.clone(),
        customer_id: txn.customer_id.clone(),
        customer_name: customer.full_name,
        account_number: txn.account_number.clone(),
        transaction_type: txn.transaction_type,
        total_cash_in,
        total_cash_out,
        currency: txn.currency.clone(),
        occurred_at: txn.occurred_at,
        filed_at: now,
        filing_deadline: now + deadline_days * SECONDS_PER_DAY,
        status: ReportStatus::Draft,
    };
    store.insert_ctr(&row)?;
    store.append_audit(
        "ctr",
        &report_number,
        "drafted",
        ACTOR_SYSTEM,
        None,
        Some(ReportStatus::Draft.as_str()),
        Some(&format!("CTR drafted for transaction {}", txn.transaction_id)),
        now,
    )?;
    log::info!(
        "CTR {report_number} drafted for transaction {} ({:.2} {})",
        txn.transaction_id,
        txn.amount,
        txn.currency
    );
    Ok(Some(row))
}

/// Draft the SAR for a reported case.
pub fn draft_sar(
    store: &AmlStore,
    case: &CaseRow,
    reason: &str,
    actor: &str,
    now: i64,
) -> AmlResult<SarReportRow> {
    let txns = store.transactions_for_case(&case.case_id)?;
    let activity_start = txns.iter().map(|t| t.occurred_at).min();
    let activity_end = txns.iter().map(|t| t.occurred_at).max();
    let total_amount: f64 = txns.iter().map(|t| t.amount).sum();
    let currency = txns
        .first()
        .map(|t| t.currency.clone())
        .unwrap_or_else(|| "USD".to_string());

    let report_number = format!(
        "SAR-{}-{:04}",
        format_ts(now, "%Y%m%d"),
        store.count_sars()? + 1
    );
    let row = SarReportRow {
        report_number: report_number.clone(),
        case_id: case.case_id.clone(),
        case_number: case.case_number.clone(),
        customer_id: case.customer_id.clone(),
        customer_name: case.customer_name.clone(),
        activity_start,
        activity_end,
        total_amount,
        currency,
        transaction_count: txns.len() as i64,
        activity_description: format!(
            "Suspicious activity involving {} transactions totaling {:.2}",
            txns.len(),
            total_amount
        ),
        suspicious_reason: reason.to_string(),
        action_taken: Some("Account placed under enhanced monitoring".to_string()),
        status: ReportStatus::Draft,
        prepared_by: actor.to_string(),
        prepared_at: now,
    };
    store.insert_sar(&row)?;
    store.append_audit(
        "sar",
        &report_number,
        "drafted",
        actor,
        None,
        Some(ReportStatus::Draft.as_str()),
        Some(&format!("SAR drafted for case {}", case.case_number)),
        now,
    )?;
    log::info!("SAR {report_number} drafted for case {}", case.case_number);
    Ok(row)
}

/// Move a CTR from draft to filed. False when it was already filed
/// or does not exist.
pub fn file_ctr(store: &AmlStore, report_number: &str, actor: &str, now: i64) -> AmlResult<bool> {
    if !store.mark_ctr_filed(report_number, now)? {
        return Ok(false);
    }
    store.append_audit(
        "ctr",
        report_number,
        "filed",
        actor,
        Some(ReportStatus::Draft.as_str()),
        Some(ReportStatus::Filed.as_str()),
        None,
        now,
    )?;
    Ok(true)
}

/// Move a SAR from draft to filed. False when it was already filed
/// or does not exist.
pub fn file_sar(store: &AmlStore, report_number: &str, actor: &str, now: i64) -> AmlResult<bool> {
    if !store.mark_sar_filed(report_number)? {
        return Ok(false);
    }
    store.append_audit(
        "sar",
        report_number,
        "filed",
        actor,
        Some(ReportStatus::Draft.as_str()),
        Some(ReportStatus::Filed.as_str()),
        None,
        now,
    )?;
    Ok(true)
}

/// Unfiled CTRs whose deadline has passed.
pub fn overdue_ctrs(store: &AmlStore, now: i64) -> AmlResult<Vec<CtrReportRow>> {
    let overdue = store
        .list_ctrs()?
        .into_iter()
        .filter(|r| r.status == ReportStatus::Draft && r.filing_deadline < now)
        .collect::<Vec<_>>();
    if !overdue.is_empty() {
        log::warn!("{} CTR drafts past their filing deadline", overdue.len());
    }
    Ok(overdue)
}
