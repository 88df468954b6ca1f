//! Alert and case workflow tests: guarded state machines, audit
//! trails, rollups, and closure cascades into reports and profile
//! counters.

use aml_core::clock::EngineClock;
use aml_core::config::AmlConfig;
use aml_core::engine::{AmlEngine, NewCustomer, NewTransaction};
use aml_core::error::AmlError;
use aml_core::types::{
    AlertStatus, CasePriority, CaseStatus, CustomerType, KycStatus, ReportStatus, TransactionType,
};

const T0: i64 = 1_700_006_400; // 2023-11-15 00:00:00 UTC
const DAY: i64 = 86_400;

fn build() -> AmlEngine {
    let mut engine = AmlEngine::in_memory(AmlConfig::default()).expect("build engine");
    engine.set_clock(EngineClock::Fixed(T0));
    engine
}

fn register(engine: &AmlEngine, id: &str) {
    engine
        .register_customer(NewCustomer {
            customer_id: id.to_string(),
            customer_type: CustomerType::Individual,
            full_name: format!("Customer {id}"),
            account_number: format!("ACCT-{id}"),
            country: Some("US".to_string()),
            occupation: None,
            is_pep: false,
            kyc_status: KycStatus::Completed,
        })
        .unwrap();
}

fn txn(customer_id: &str, transaction_type: TransactionType, amount: f64, at: i64) -> NewTransaction {
    NewTransaction {
        transaction_id: String::new(),
        customer_id: customer_id.to_string(),
        account_number: format!("ACCT-{customer_id}"),
        transaction_type,
        amount,
        currency: "USD".to_string(),
        origin_country: Some("US".to_string()),
        destination_country: Some("US".to_string()),
        counterparty_name: None,
        counterparty_account: None,
        counterparty_country: None,
        occurred_at: at,
    }
}

/// Ingest a wire to a sanctioned destination; returns the single
/// high-severity alert it raises.
fn geo_alert(engine: &AmlEngine, customer_id: &str, at: i64) -> String {
    let mut wire = txn(customer_id, TransactionType::Wire, 7_400.0, at);
    wire.destination_country = Some("IR".to_string());
    let outcome = engine.ingest_transaction(wire).unwrap();
    assert_eq!(outcome.alerts.len(), 1);
    outcome.alerts[0].alert_id.clone()
}

/// An alert walks open -> investigating -> escalated -> resolved, and
/// each step lands in the audit trail.
#[test]
fn alert_walks_the_full_lifecycle_with_audit() {
    let engine = build();
    register(&engine, "c-walk");
    let alert_id = geo_alert(&engine, "c-walk", T0 - 5 * DAY);

    let assigned = engine.assign_alert(&alert_id, "analyst.a", "supervisor.b").unwrap();
    assert_eq!(assigned.status, AlertStatus::Investigating);
    assert_eq!(assigned.assigned_to.as_deref(), Some("analyst.a"));

    let escalated = engine.escalate_alert(&alert_id, "mlro.c", "analyst.a").unwrap();
    assert_eq!(escalated.status, AlertStatus::Escalated);

    let resolved = engine
        .resolve_alert(&alert_id, "Confirmed unusual corridor usage", false, "mlro.c")
        .unwrap();
    assert_eq!(resolved.status, AlertStatus::ClosedConfirmed);
    assert_eq!(resolved.resolved_by.as_deref(), Some("mlro.c"));
    assert_eq!(resolved.resolved_at, Some(T0));

    let trail = engine.audit_trail("alert", &alert_id).unwrap();
    let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["created", "assigned", "escalated", "resolved"]);
    assert_eq!(trail[1].from_status.as_deref(), Some("open"));
    assert_eq!(trail[1].to_status.as_deref(), Some("investigating"));
}

/// Closed alerts accept no further transitions.
#[test]
fn terminal_alert_rejects_further_transitions() {
    let engine = build();
    register(&engine, "c-term");
    let alert_id = geo_alert(&engine, "c-term", T0 - 5 * DAY);

    engine.assign_alert(&alert_id, "analyst.a", "supervisor.b").unwrap();
    engine
        .resolve_alert(&alert_id, "Reviewed and confirmed", false, "analyst.a")
        .unwrap();
    let err = engine
        .assign_alert(&alert_id, "analyst.z", "supervisor.b")
        .unwrap_err();
    assert!(
        matches!(err, AmlError::StateTransition { .. }),
        "Expected a state transition error, got {err:?}"
    );
}

/// Resolution requires investigation or escalation first; an untouched
/// alert cannot be closed directly.
#[test]
fn open_alert_cannot_be_resolved_directly() {
    let engine = build();
    register(&engine, "c-open");
    let alert_id = geo_alert(&engine, "c-open", T0 - 5 * DAY);

    let err = engine
        .resolve_alert(&alert_id, "Looks fine", false, "analyst.a")
        .unwrap_err();
    assert!(matches!(err, AmlError::StateTransition { .. }));

    let alert = engine.alert(&alert_id).unwrap();
    assert_eq!(alert.status, AlertStatus::Open);
    assert!(alert.resolution.is_none());
}

/// A false-positive resolution feeds the customer's profile counter.
#[test]
fn false_positive_resolution_bumps_profile_counter() {
    let engine = build();
    register(&engine, "c-fp");
    let alert_id = geo_alert(&engine, "c-fp", T0 - 5 * DAY);

    engine.assign_alert(&alert_id, "analyst.a", "supervisor.b").unwrap();
    engine
        .resolve_alert(&alert_id, "Documented trade finance", true, "analyst.a")
        .unwrap();
    let alert = engine.alert(&alert_id).unwrap();
    assert_eq!(alert.status, AlertStatus::ClosedFalsePositive);

    let profile = engine.risk_profile("c-fp").unwrap().expect("profile");
    assert_eq!(profile.false_positive_count, 1);
}

/// A critical detection opens a case at critical priority, due the
/// next day, numbered from the clock.
#[test]
fn critical_detection_opens_case_due_next_day() {
    let engine = build();
    register(&engine, "c-case");

    let outcome = engine
        .ingest_transaction(txn("c-case", TransactionType::Deposit, 15_000.0, T0 - 5 * DAY))
        .unwrap();
    let case_id = outcome.case_id.expect("auto-opened case");
    let case = engine.case(&case_id).unwrap();

    assert_eq!(case.case_number, "CASE-202311150000-0001");
    assert_eq!(case.priority, CasePriority::Critical);
    assert_eq!(case.status, CaseStatus::Open);
    assert_eq!(case.due_at, T0 + DAY);
    assert_eq!(case.alert_count, 1);
    assert_eq!(case.total_amount, 15_000.0);

    // The seed alert is linked back to the case.
    let seeded = engine
        .store()
        .alerts_for_case(&case_id)
        .unwrap();
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0].severity.as_str(), "critical");
}

/// Attaching another alert rolls counts and amounts into the case.
#[test]
fn attaching_alert_rolls_up_case_totals() {
    let engine = build();
    register(&engine, "c-roll");

    let outcome = engine
        .ingest_transaction(txn("c-roll", TransactionType::Deposit, 15_000.0, T0 - 5 * DAY))
        .unwrap();
    let case_id = outcome.case_id.expect("auto-opened case");
    let extra = geo_alert(&engine, "c-roll", T0 - 4 * DAY);

    let attached = engine.attach_alert_to_case(&case_id, &extra, "analyst.a").unwrap();
    assert!(attached);
    let case = engine.case(&case_id).unwrap();
    assert_eq!(case.alert_count, 2);
    assert_eq!(case.transaction_count, 2);
    assert_eq!(case.total_amount, 15_000.0 + 7_400.0);

    // Attaching the same alert twice is a no-op.
    let again = engine.attach_alert_to_case(&case_id, &extra, "analyst.a").unwrap();
    assert!(!again);
}

/// A case only aggregates alerts for its own customer.
#[test]
fn cross_customer_alert_attach_is_rejected() {
    let engine = build();
    register(&engine, "c-one");
    register(&engine, "c-two");
    let seed = geo_alert(&engine, "c-one", T0 - 4 * DAY);
    let foreign = geo_alert(&engine, "c-two", T0 - 3 * DAY);
    let case = engine.open_case(&seed, "analyst.a").unwrap();

    let err = engine
        .attach_alert_to_case(&case.case_id, &foreign, "analyst.a")
        .unwrap_err();
    assert!(matches!(err, AmlError::Validation { .. }));

    let case = engine.case(&case.case_id).unwrap();
    assert_eq!(case.alert_count, 1);
}

/// Closing with a SAR decision drafts the report, resolves linked
/// alerts, and bumps the STR counter.
#[test]
fn sar_close_drafts_report_and_cascades() {
    let engine = build();
    register(&engine, "c-sar");

    let outcome = engine
        .ingest_transaction(txn("c-sar", TransactionType::Deposit, 15_000.0, T0 - 5 * DAY))
        .unwrap();
    let case_id = outcome.case_id.expect("auto-opened case");
    engine.assign_case(&case_id, "analyst.a", "supervisor.b").unwrap();

    let closure = engine
        .close_case(&case_id, "file_sar", "Structured cash placement", "analyst.a")
        .unwrap();
    assert_eq!(closure.case.status, CaseStatus::ClosedReported);
    assert!(closure.case.sar_filed);
    assert_eq!(closure.alerts_resolved, 1);

    let number = closure.sar_report_number.expect("SAR drafted");
    assert_eq!(number, "SAR-20231115-0001");
    let sar = engine.store().get_sar(&number).unwrap().expect("SAR row");
    assert_eq!(sar.status, ReportStatus::Draft);
    assert_eq!(sar.case_id, case_id);
    assert_eq!(sar.transaction_count, 1);
    assert_eq!(sar.total_amount, 15_000.0);
    assert_eq!(sar.suspicious_reason, "Structured cash placement");

    // Linked alerts were closed as confirmed, and the profile counts
    // one suspicious report.
    for alert in engine.store().alerts_for_case(&case_id).unwrap() {
        assert_eq!(alert.status, AlertStatus::ClosedConfirmed);
    }
    let profile = engine.risk_profile("c-sar").unwrap().expect("profile");
    assert_eq!(profile.str_count, 1);

    assert!(engine.file_sar(&number, "supervisor.b").unwrap());
    let filed = engine.store().get_sar(&number).unwrap().expect("SAR row");
    assert_eq!(filed.status, ReportStatus::Filed);
}

/// A false-positive close closes the case and its alerts on the
/// false-positive track without drafting anything.
#[test]
fn false_positive_close_skips_reporting() {
    let engine = build();
    register(&engine, "c-fpc");
    let alert_id = geo_alert(&engine, "c-fpc", T0 - 5 * DAY);

    let case = engine.open_case(&alert_id, "supervisor.b").unwrap();
    assert_eq!(case.priority, CasePriority::High);
    assert_eq!(case.due_at, T0 + 3 * DAY);

    let closure = engine
        .close_case(&case.case_id, "false_positive", "Documented and expected", "analyst.a")
        .unwrap();
    assert_eq!(closure.case.status, CaseStatus::ClosedFalsePositive);
    assert!(closure.sar_report_number.is_none());
    assert!(!closure.case.sar_filed);

    let alert = engine.alert(&alert_id).unwrap();
    assert_eq!(alert.status, AlertStatus::ClosedFalsePositive);
    let profile = engine.risk_profile("c-fpc").unwrap().expect("profile");
    assert_eq!(profile.false_positive_count, 1);
}

/// Cases move through review before closing, and a closed case
/// rejects further work.
#[test]
fn case_review_flow_and_terminal_guard() {
    let engine = build();
    register(&engine, "c-rev");
    let alert_id = geo_alert(&engine, "c-rev", T0 - 5 * DAY);
    let case = engine.open_case(&alert_id, "supervisor.b").unwrap();

    engine.assign_case(&case.case_id, "analyst.a", "supervisor.b").unwrap();
    let reviewed = engine.send_case_for_review(&case.case_id, "analyst.a").unwrap();
    assert_eq!(reviewed.status, CaseStatus::PendingReview);

    engine
        .close_case(&case.case_id, "no_action", "Within expected profile", "supervisor.b")
        .unwrap();
    let err = engine
        .assign_case(&case.case_id, "analyst.z", "supervisor.b")
        .unwrap_err();
    assert!(matches!(err, AmlError::StateTransition { .. }));

    let trail = engine.audit_trail("case", &case.case_id).unwrap();
    let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["created", "assigned", "sent_for_review", "closed"]
    );
}

/// Escalating a case records who took it over and why, and the case
/// can still be closed from the escalated state.
#[test]
fn case_escalation_records_reason_and_allows_close() {
    let engine = build();
    register(&engine, "c-esc");
    let alert_id = geo_alert(&engine, "c-esc", T0 - 3 * DAY);
    let case = engine.open_case(&alert_id, "analyst.a").unwrap();

    engine.assign_case(&case.case_id, "analyst.a", "supervisor.b").unwrap();
    let escalated = engine
        .escalate_case(&case.case_id, "mlro.c", "Volume inconsistent with stated profile", "analyst.a")
        .unwrap();
    assert_eq!(escalated.status, CaseStatus::Escalated);
    assert_eq!(escalated.escalated_to.as_deref(), Some("mlro.c"));
    assert_eq!(escalated.escalated_at, Some(T0));
    assert_eq!(
        escalated.escalation_reason.as_deref(),
        Some("Volume inconsistent with stated profile")
    );

    let closure = engine
        .close_case(&case.case_id, "no_action", "Reviewed by MLRO, no action", "mlro.c")
        .unwrap();
    assert_eq!(closure.case.status, CaseStatus::ClosedNoAction);
    assert!(closure.sar_report_number.is_none());

    let trail = engine.audit_trail("case", &case.case_id).unwrap();
    let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["created", "assigned", "escalated", "closed"]);
}
