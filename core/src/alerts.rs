//! Alert lifecycle.
//!
//! Detections become alerts with dedup on the (transaction, rule) key:
//! a rule re-firing on the same transaction refreshes the existing
//! alert's detection fields and never clobbers analyst workflow state.
//! Status moves are validated against a typed transition table, then
//! applied with a status-guarded UPDATE, and every move lands in the
//! audit log.

use uuid::Uuid;

use crate::error::{AmlError, AmlResult};
use crate::monitoring::RuleFiring;
use crate::patterns::PatternMatch;
use crate::store::{AlertRow, AmlStore, TransactionRow};
use crate::types::{AlertSeverity, AlertStatus, PatternType};

/// Actor recorded for machine-initiated audit entries.
pub const ACTOR_SYSTEM: &str = "system";

const AUDIT_ENTITY: &str = "alert";

/// Result of feeding one detection through the dedup gate.
#[derive(Debug, Clone)]
pub struct AlertUpsert {
    pub alert_id: String,
    pub customer_id: String,
    pub severity: AlertSeverity,
    /// False when an existing alert was refreshed instead.
    pub created: bool,
}

/// Direct workflow transitions. Assignment reaches Investigating from
/// Open or Investigating, escalation reaches Escalated from any
/// non-terminal state, and resolution is only valid once an alert is
/// under investigation or escalated.
pub fn allowed_next(from: AlertStatus) -> &'static [AlertStatus] {
    match from {
        AlertStatus::Open => &[AlertStatus::Investigating, AlertStatus::Escalated],
        AlertStatus::Investigating => &[
            AlertStatus::Investigating,
            AlertStatus::Escalated,
            AlertStatus::ClosedConfirmed,
            AlertStatus::ClosedFalsePositive,
        ],
        AlertStatus::Escalated => &[
            AlertStatus::Escalated,
            AlertStatus::ClosedConfirmed,
            AlertStatus::ClosedFalsePositive,
        ],
        AlertStatus::ClosedConfirmed | AlertStatus::ClosedFalsePositive => &[],
    }
}

fn ensure_transition(from: AlertStatus, to: AlertStatus) -> AmlResult<()> {
    if allowed_next(from).contains(&to) {
        return Ok(());
    }
    log::warn!("alert transition {} -> {} rejected", from.as_str(), to.as_str());
    Err(AmlError::StateTransition {
        entity: AUDIT_ENTITY,
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    })
}

fn stale_transition(from: AlertStatus, to: AlertStatus) -> AmlError {
    AmlError::StateTransition {
        entity: AUDIT_ENTITY,
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

// ── Detection intake ───────────────────────────────────────────────

/// Materialize a rule firing as an alert, or refresh the one already
/// raised for this (transaction, rule) pair.
pub fn upsert_rule_alert(
    store: &AmlStore,
    txn: &TransactionRow,
    firing: &RuleFiring,
    now: i64,
) -> AmlResult<AlertUpsert> {
    let details = serde_json::to_string(&firing.details)?;
    upsert(
        store,
        &txn.transaction_id,
        &txn.customer_id,
        firing.rule_id,
        firing.alert_type,
        &firing.title,
        &firing.description,
        firing.severity,
        firing.score,
        &details,
        now,
    )
}

/// Materialize a pattern match as an alert anchored on its most recent
/// transaction. Matches with no involved transactions yield nothing.
pub fn upsert_pattern_alert(
    store: &AmlStore,
    m: &PatternMatch,
    now: i64,
) -> AmlResult<Option<AlertUpsert>> {
    let anchor = match m.transactions_involved.last() {
        Some(id) => id,
        None => return Ok(None),
    };
    let details = serde_json::to_string(&m.details)?;
    let upserted = upsert(
        store,
        anchor,
        &m.customer_id,
        pattern_rule_id(m.pattern_type),
        m.pattern_type.as_str(),
        pattern_title(m.pattern_type),
        &m.description,
        AlertSeverity::from_score(m.risk_score),
        m.risk_score,
        &details,
        now,
    )?;
    Ok(Some(upserted))
}

fn pattern_rule_id(pt: PatternType) -> &'static str {
    match pt {
        PatternType::Structuring => "P-STR",
        PatternType::Layering => "P-LAY",
        PatternType::RoundAmounts => "P-RND",
        PatternType::VelocityAnomaly => "P-VEL",
        PatternType::DormantReactivation => "P-DRM",
    }
}

fn pattern_title(pt: PatternType) -> &'static str {
    match pt {
        PatternType::Structuring => "Structuring Activity Pattern",
        PatternType::Layering => "Layering Activity Pattern",
        PatternType::RoundAmounts => "Round Amount Abuse Pattern",
        PatternType::VelocityAnomaly => "Velocity Anomaly Pattern",
        PatternType::DormantReactivation => "Dormant Account Reactivation Pattern",
    }
}

#[allow(clippy::too_many_arguments)]
fn upsert(
    store: &AmlStore,
    transaction_id: &str,
    customer_id: &str,
    rule_id: &str,
    alert_type: &str,
    title: &str,
    description: &str,
    severity: AlertSeverity,
    score: f64,
    details: &str,
    now: i64,
) -> AmlResult<AlertUpsert> {
    if let Some(existing) = store.get_alert_by_txn_rule(transaction_id, rule_id)? {
        store.refresh_alert(
            &existing.alert_id,
            severity,
            score,
            title,
            description,
            Some(details),
            now,
        )?;
        log::debug!("alert {} refreshed for rule {rule_id}", existing.alert_id);
        return Ok(AlertUpsert {
            alert_id: existing.alert_id,
            customer_id: existing.customer_id,
            severity,
            created: false,
        });
    }

    let alert_id = Uuid::new_v4().to_string();
    let row = AlertRow {
        alert_id: alert_id.clone(),
        transaction_id: transaction_id.to_string(),
        customer_id: customer_id.to_string(),
        rule_id: rule_id.to_string(),
        alert_type: alert_type.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        severity,
        score,
        details: Some(details.to_string()),
        status: AlertStatus::Open,
        assigned_to: None,
        escalated_to: None,
        escalated_at: None,
        resolution: None,
        resolved_by: None,
        resolved_at: None,
        case_id: None,
        created_at: now,
        updated_at: now,
    };
    store.insert_alert(&row)?;
    store.bump_profile_alert_count(customer_id)?;
    store.append_audit(
        AUDIT_ENTITY,
        &alert_id,
        "created",
        ACTOR_SYSTEM,
        None,
        Some(AlertStatus::Open.as_str()),
        Some(title),
        now,
    )?;
    Ok(AlertUpsert {
        alert_id,
        customer_id: customer_id.to_string(),
        severity,
        created: true,
    })
}

// ── Lifecycle ──────────────────────────────────────────────────────

fn load(store: &AmlStore, alert_id: &str) -> AmlResult<AlertRow> {
    store
        .get_alert(alert_id)?
        .ok_or_else(|| AmlError::not_found("alert", alert_id))
}

/// Hand the alert to an analyst. Moves it to investigating.
pub fn assign(
    store: &AmlStore,
    alert_id: &str,
    assignee: &str,
    actor: &str,
    now: i64,
) -> AmlResult<AlertRow> {
    let alert = load(store, alert_id)?;
    ensure_transition(alert.status, AlertStatus::Investigating)?;
    if !store.assign_alert(alert_id, alert.status, AlertStatus::Investigating, assignee, now)? {
        return Err(stale_transition(alert.status, AlertStatus::Investigating));
    }
    store.append_audit(
        AUDIT_ENTITY,
        alert_id,
        "assigned",
        actor,
        Some(alert.status.as_str()),
        Some(AlertStatus::Investigating.as_str()),
        Some(&format!("Assigned to {assignee}")),
        now,
    )?;
    load(store, alert_id)
}

pub fn escalate(
    store: &AmlStore,
    alert_id: &str,
    escalated_to: &str,
    actor: &str,
    now: i64,
) -> AmlResult<AlertRow> {
    let alert = load(store, alert_id)?;
    ensure_transition(alert.status, AlertStatus::Escalated)?;
    if !store.escalate_alert(alert_id, alert.status, escalated_to, now)? {
        return Err(stale_transition(alert.status, AlertStatus::Escalated));
    }
    store.append_audit(
        AUDIT_ENTITY,
        alert_id,
        "escalated",
        actor,
        Some(alert.status.as_str()),
        Some(AlertStatus::Escalated.as_str()),
        Some(&format!("Escalated to {escalated_to}")),
        now,
    )?;
    load(store, alert_id)
}

/// Close the alert. A false positive feeds the customer's profile so
/// future reviews see the noise rate.
pub fn resolve(
    store: &AmlStore,
    alert_id: &str,
    resolution: &str,
    false_positive: bool,
    actor: &str,
    now: i64,
) -> AmlResult<AlertRow> {
    let alert = load(store, alert_id)?;
    let target = if false_positive {
        AlertStatus::ClosedFalsePositive
    } else {
        AlertStatus::ClosedConfirmed
    };
    ensure_transition(alert.status, target)?;
    if !store.resolve_alert(alert_id, alert.status, target, resolution, actor, now)? {
        return Err(stale_transition(alert.status, target));
    }
    if false_positive {
        store.bump_profile_false_positive_count(&alert.customer_id)?;
    }
    store.append_audit(
        AUDIT_ENTITY,
        alert_id,
        "resolved",
        actor,
        Some(alert.status.as_str()),
        Some(target.as_str()),
        Some(resolution),
        now,
    )?;
    load(store, alert_id)
}

/// Close an alert as part of a case decision. The decision overrides the
/// direct-resolution guard, bulk-review style, so a still-open alert is
/// closed along with its case. The status-guarded update still protects
/// against concurrent writers.
pub(crate) fn resolve_for_case(
    store: &AmlStore,
    alert: &AlertRow,
    resolution: &str,
    false_positive: bool,
    actor: &str,
    now: i64,
) -> AmlResult<()> {
    let target = if false_positive {
        AlertStatus::ClosedFalsePositive
    } else {
        AlertStatus::ClosedConfirmed
    };
    if !store.resolve_alert(&alert.alert_id, alert.status, target, resolution, actor, now)? {
        return Err(stale_transition(alert.status, target));
    }
    if false_positive {
        store.bump_profile_false_positive_count(&alert.customer_id)?;
    }
    store.append_audit(
        AUDIT_ENTITY,
        &alert.alert_id,
        "resolved",
        actor,
        Some(alert.status.as_str()),
        Some(target.as_str()),
        Some(resolution),
        now,
    )
}

// ── Statistics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct AlertStats {
    pub total: i64,
    pub active: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_severity: Vec<(String, i64)>,
}

pub fn stats(store: &AmlStore) -> AmlResult<AlertStats> {
    let by_status = store.alert_counts_by_status()?;
    let by_severity = store.alert_counts_by_severity()?;
    let total = by_status.iter().map(|(_, n)| n).sum();
    let active = by_status
        .iter()
        .filter(|(s, _)| {
            AlertStatus::parse(s).map(|st| !st.is_terminal()).unwrap_or(false)
        })
        .map(|(_, n)| n)
        .sum();
    Ok(AlertStats {
        total,
        active,
        by_status,
        by_severity,
    })
}
