//! Compliance case workflow.
//!
//! Cases aggregate alerts for one customer into a single investigation
//! with a priority-driven due date. Closing a case records a decision,
//! resolves whatever alerts are still attached and open, and a
//! "file_sar" decision drafts the SAR on the spot.

use uuid::Uuid;

use crate::alerts;
use crate::clock::format_ts;
use crate::config::WorkflowConfig;
use crate::error::{AmlError, AmlResult};
use crate::reporting;
use crate::risk_factors::SECONDS_PER_DAY;
use crate::store::{AlertRow, AmlStore, CaseRow};
use crate::types::{CasePriority, CaseStatus};

const AUDIT_ENTITY: &str = "case";

/// Close decision that files a SAR.
pub const DECISION_FILE_SAR: &str = "file_sar";
/// Close decision that writes the case off as noise.
pub const DECISION_FALSE_POSITIVE: &str = "false_positive";

pub fn allowed_next(from: CaseStatus) -> &'static [CaseStatus] {
    match from {
        CaseStatus::Open => &[
            CaseStatus::Investigating,
            CaseStatus::Escalated,
            CaseStatus::ClosedReported,
            CaseStatus::ClosedNoAction,
            CaseStatus::ClosedFalsePositive,
        ],
        CaseStatus::Investigating => &[
            CaseStatus::Investigating,
            CaseStatus::PendingReview,
            CaseStatus::Escalated,
            CaseStatus::ClosedReported,
            CaseStatus::ClosedNoAction,
            CaseStatus::ClosedFalsePositive,
        ],
        CaseStatus::PendingReview => &[
            CaseStatus::Investigating,
            CaseStatus::Escalated,
            CaseStatus::ClosedReported,
            CaseStatus::ClosedNoAction,
            CaseStatus::ClosedFalsePositive,
        ],
        CaseStatus::Escalated => &[
            CaseStatus::Investigating,
            CaseStatus::PendingReview,
            CaseStatus::ClosedReported,
            CaseStatus::ClosedNoAction,
            CaseStatus::ClosedFalsePositive,
        ],
        CaseStatus::ClosedReported
        | CaseStatus::ClosedNoAction
        | CaseStatus::ClosedFalsePositive => &[],
    }
}

fn ensure_transition(from: CaseStatus, to: CaseStatus) -> AmlResult<()> {
    if allowed_next(from).contains(&to) {
        return Ok(());
    }
    log::warn!("case transition {} -> {} rejected", from.as_str(), to.as_str());
    Err(AmlError::StateTransition {
        entity: AUDIT_ENTITY,
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    })
}

fn stale_transition(from: CaseStatus, to: CaseStatus) -> AmlError {
    AmlError::StateTransition {
        entity: AUDIT_ENTITY,
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

fn load(store: &AmlStore, case_id: &str) -> AmlResult<CaseRow> {
    store
        .get_case(case_id)?
        .ok_or_else(|| AmlError::not_found("case", case_id))
}

// ── Opening ────────────────────────────────────────────────────────

/// Open a case seeded by one alert. Idempotent: an alert already linked
/// to a case returns that case instead of opening a second one.
pub fn open_from_alert(
    store: &AmlStore,
    alert: &AlertRow,
    config: &WorkflowConfig,
    actor: &str,
    now: i64,
) -> AmlResult<CaseRow> {
    if let Some(existing) = &alert.case_id {
        return load(store, existing);
    }
    let customer = store
        .get_customer(&alert.customer_id)?
        .ok_or_else(|| AmlError::not_found("customer", &alert.customer_id))?;
    let txn = store
        .get_transaction(&alert.transaction_id)?
        .ok_or_else(|| AmlError::not_found("transaction", &alert.transaction_id))?;

    let priority = CasePriority::from_severity(alert.severity);
    let case_number = format!(
        "CASE-{}-{:04}",
        format_ts(now, "%Y%m%d%H%M"),
        store.count_cases()? + 1
    );
    let case = CaseRow {
        case_id: Uuid::new_v4().to_string(),
        case_number,
        title: alert.title.clone(),
        description: Some(alert.description.clone()),
        customer_id: customer.customer_id.clone(),
        customer_name: customer.full_name.clone(),
        risk_level: customer.risk_level,
        priority,
        status: CaseStatus::Open,
        assigned_to: None,
        assigned_at: None,
        escalated_to: None,
        escalated_at: None,
        escalation_reason: None,
        alert_count: 1,
        transaction_count: 1,
        total_amount: txn.amount,
        decision: None,
        decision_reason: None,
        decided_by: None,
        sar_filed: false,
        due_at: now + config.due_days(priority) * SECONDS_PER_DAY,
        created_by: actor.to_string(),
        created_at: now,
        closed_at: None,
    };
    store.insert_case(&case)?;
    store.link_alert_to_case(&alert.alert_id, &case.case_id, now)?;
    store.append_audit(
        AUDIT_ENTITY,
        &case.case_id,
        "created",
        actor,
        None,
        Some(CaseStatus::Open.as_str()),
        Some(&format!("Case created from alert {}", alert.alert_id)),
        now,
    )?;
    log::info!(
        "case {} opened for customer {} (priority {})",
        case.case_number,
        case.customer_id,
        priority.as_str()
    );
    Ok(case)
}

/// Fold another alert into an existing case. Returns false when the
/// alert is already linked somewhere.
pub fn attach_alert(
    store: &AmlStore,
    case_id: &str,
    alert: &AlertRow,
    actor: &str,
    now: i64,
) -> AmlResult<bool> {
    if alert.case_id.is_some() {
        return Ok(false);
    }
    let case = load(store, case_id)?;
    if case.status.is_terminal() {
        return Err(stale_transition(case.status, case.status));
    }
    if case.customer_id != alert.customer_id {
        return Err(AmlError::validation(
            "alert_id",
            "alert belongs to a different customer than the case",
        ));
    }
    let txn = store
        .get_transaction(&alert.transaction_id)?
        .ok_or_else(|| AmlError::not_found("transaction", &alert.transaction_id))?;
    store.link_alert_to_case(&alert.alert_id, case_id, now)?;
    store.add_case_rollup(case_id, txn.amount)?;
    store.append_audit(
        AUDIT_ENTITY,
        case_id,
        "alert_attached",
        actor,
        None,
        None,
        Some(&format!("Alert {} attached", alert.alert_id)),
        now,
    )?;
    Ok(true)
}

// ── Lifecycle ──────────────────────────────────────────────────────

pub fn assign(
    store: &AmlStore,
    case_id: &str,
    assignee: &str,
    actor: &str,
    now: i64,
) -> AmlResult<CaseRow> {
    let case = load(store, case_id)?;
    ensure_transition(case.status, CaseStatus::Investigating)?;
    if !store.assign_case(case_id, case.status, CaseStatus::Investigating, assignee, now)? {
        return Err(stale_transition(case.status, CaseStatus::Investigating));
    }
    store.append_audit(
        AUDIT_ENTITY,
        case_id,
        "assigned",
        actor,
        Some(case.status.as_str()),
        Some(CaseStatus::Investigating.as_str()),
        Some(&format!("Assigned to {assignee}")),
        now,
    )?;
    load(store, case_id)
}

/// Investigation done, findings await a reviewer.
pub fn send_for_review(
    store: &AmlStore,
    case_id: &str,
    actor: &str,
    now: i64,
) -> AmlResult<CaseRow> {
    let case = load(store, case_id)?;
    ensure_transition(case.status, CaseStatus::PendingReview)?;
    if !store.set_case_status(case_id, case.status, CaseStatus::PendingReview)? {
        return Err(stale_transition(case.status, CaseStatus::PendingReview));
    }
    store.append_audit(
        AUDIT_ENTITY,
        case_id,
        "sent_for_review",
        actor,
        Some(case.status.as_str()),
        Some(CaseStatus::PendingReview.as_str()),
        None,
        now,
    )?;
    load(store, case_id)
}

pub fn escalate(
    store: &AmlStore,
    case_id: &str,
    escalated_to: &str,
    reason: &str,
    actor: &str,
    now: i64,
) -> AmlResult<CaseRow> {
    let case = load(store, case_id)?;
    ensure_transition(case.status, CaseStatus::Escalated)?;
    if !store.escalate_case(case_id, case.status, escalated_to, reason, now)? {
        return Err(stale_transition(case.status, CaseStatus::Escalated));
    }
    store.append_audit(
        AUDIT_ENTITY,
        case_id,
        "escalated",
        actor,
        Some(case.status.as_str()),
        Some(CaseStatus::Escalated.as_str()),
        Some(&format!("Case escalated: {reason}")),
        now,
    )?;
    load(store, case_id)
}

#[derive(Debug, Clone)]
pub struct CaseClosure {
    pub case: CaseRow,
    /// Report number of the SAR drafted by a file_sar decision.
    pub sar_report_number: Option<String>,
    pub alerts_resolved: usize,
}

/// Close the case with a decision. "file_sar" marks the case reported
/// and drafts the SAR; "false_positive" writes it off; anything else
/// closes with no action. Open alerts attached to the case are resolved
/// to match.
pub fn close(
    store: &AmlStore,
    case_id: &str,
    decision: &str,
    reason: &str,
    actor: &str,
    now: i64,
) -> AmlResult<CaseClosure> {
    let case = load(store, case_id)?;
    let (target, sar_filed) = match decision {
        DECISION_FILE_SAR => (CaseStatus::ClosedReported, true),
        DECISION_FALSE_POSITIVE => (CaseStatus::ClosedFalsePositive, false),
        _ => (CaseStatus::ClosedNoAction, false),
    };
    ensure_transition(case.status, target)?;
    if !store.close_case(case_id, case.status, target, decision, reason, actor, sar_filed, now)? {
        return Err(stale_transition(case.status, target));
    }
    store.append_audit(
        AUDIT_ENTITY,
        case_id,
        "closed",
        actor,
        Some(case.status.as_str()),
        Some(target.as_str()),
        Some(&format!("Case closed: {decision} - {reason}")),
        now,
    )?;

    let false_positive = decision == DECISION_FALSE_POSITIVE;
    let mut alerts_resolved = 0usize;
    for alert in store.alerts_for_case(case_id)? {
        if alert.status.is_terminal() {
            continue;
        }
        let resolution = format!("Case {} closed: {decision}", case.case_number);
        alerts::resolve_for_case(store, &alert, &resolution, false_positive, actor, now)?;
        alerts_resolved += 1;
    }

    let closed = load(store, case_id)?;
    let sar_report_number = if sar_filed {
        store.bump_profile_str_count(&closed.customer_id)?;
        let sar = reporting::draft_sar(store, &closed, reason, actor, now)?;
        Some(sar.report_number)
    } else {
        None
    };
    log::info!(
        "case {} closed with decision {decision} ({alerts_resolved} alerts resolved)",
        closed.case_number
    );
    Ok(CaseClosure {
        case: closed,
        sar_report_number,
        alerts_resolved,
    })
}

// ── Statistics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CaseStats {
    pub total: i64,
    pub active: i64,
    pub sar_filed: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_priority: Vec<(String, i64)>,
}

pub fn stats(store: &AmlStore) -> AmlResult<CaseStats> {
    let by_status = store.case_counts_by_status()?;
    let by_priority = store.case_counts_by_priority()?;
    let total = by_status.iter().map(|(_, n)| n).sum();
    let active = by_status
        .iter()
        .filter(|(s, _)| {
            CaseStatus::parse(s).map(|st| !st.is_terminal()).unwrap_or(false)
        })
        .map(|(_, n)| n)
        .sum();
    Ok(CaseStats {
        total,
        active,
        sar_filed: store.count_sar_filed_cases()?,
        by_status,
        by_priority,
    })
}
