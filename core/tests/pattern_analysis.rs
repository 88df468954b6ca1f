//! Batch pattern analysis tests: the five detectors, scan ordering,
//! deadline behaviour, and advisory alert creation.

use aml_core::clock::EngineClock;
use aml_core::config::AmlConfig;
use aml_core::engine::{AmlEngine, NewCustomer, NewTransaction};
use aml_core::types::{CustomerType, KycStatus, PatternType, TransactionType};

const T0: i64 = 1_700_006_400; // 2023-11-15 00:00:00 UTC
const HOUR: i64 = 3_600;
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

/// Two band deposits a day across five days inside the window is
/// structuring at full risk, and the scan raises an advisory alert.
#[test]
fn repeated_band_deposits_detected_as_structuring() {
    let engine = build();
    register(&engine, "c-str");

    // Amounts sit in the 9k-10k band but below the per-transaction
    // monitoring margin, so only the batch detector sees them.
    for day in 0..5 {
        let day_start = T0 - (10 - day) * DAY;
        engine
            .ingest_transaction(txn("c-str", TransactionType::Deposit, 9_200.0, day_start + 10 * HOUR))
            .unwrap();
        engine
            .ingest_transaction(txn("c-str", TransactionType::Deposit, 9_400.0, day_start + 15 * HOUR))
            .unwrap();
    }

    let scan = engine.scan_patterns(None).unwrap();
    let m = scan
        .matches
        .iter()
        .find(|m| m.customer_id == "c-str" && m.pattern_type == PatternType::Structuring)
        .expect("structuring match");
    assert_eq!(m.risk_score, 100.0);
    assert_eq!(m.confidence, 0.95);
    assert_eq!(m.transactions_involved.len(), 10);

    let alerts = engine.store().alerts_for_customer("c-str").unwrap();
    assert_eq!(alerts.len(), 1, "Only the pattern alert should exist");
    assert_eq!(alerts[0].rule_id, "P-STR");
    assert!(scan
        .summary
        .high_risk_customers
        .iter()
        .any(|h| h.customer_id == "c-str"));
}

/// Five or more rapid transfers to three or more counterparties is
/// layering; its risk here stays advisory, below the alert line.
#[test]
fn transfer_burst_detected_as_layering() {
    let engine = build();
    register(&engine, "c-lay");

    for k in 0..6i64 {
        let mut wire = txn("c-lay", TransactionType::Wire, 4_500.0, T0 - 5 * DAY + k * 1_800);
        wire.counterparty_account = Some(format!("EXT-{k:03}"));
        wire.counterparty_name = Some(format!("Entity {k}"));
        engine.ingest_transaction(wire).unwrap();
    }

    let scan = engine.scan_patterns(None).unwrap();
    let m = scan
        .matches
        .iter()
        .find(|m| m.customer_id == "c-lay" && m.pattern_type == PatternType::Layering)
        .expect("layering match");
    assert!(m.risk_score < 60.0);

    let alerts = engine.store().alerts_for_customer("c-lay").unwrap();
    assert!(
        !alerts.iter().any(|a| a.rule_id == "P-LAY"),
        "Sub-threshold layering must not raise an alert"
    );
}

/// A round-amount ratio over the threshold flags the account.
#[test]
fn round_amount_ratio_over_threshold_is_flagged() {
    let engine = build();
    register(&engine, "c-rnd");

    let amounts = [
        1_000.0, 2_000.0, 3_000.0, 4_000.0, 2_000.0, 3_000.0, 1_000.0, // round
        1_751.5, 2_333.33, 4_101.17, // not round
    ];
    for (day, amount) in amounts.iter().enumerate() {
        engine
            .ingest_transaction(txn(
                "c-rnd",
                TransactionType::Transfer,
                *amount,
                T0 - 20 * DAY + day as i64 * DAY + 11 * HOUR,
            ))
            .unwrap();
    }

    let scan = engine.scan_patterns(None).unwrap();
    let m = scan
        .matches
        .iter()
        .find(|m| m.customer_id == "c-rnd" && m.pattern_type == PatternType::RoundAmounts)
        .expect("round amount match");
    assert!((m.confidence - 0.7).abs() < 1e-9);
    assert!((m.risk_score - 70.0).abs() < 1e-9);

    let alerts = engine.store().alerts_for_customer("c-rnd").unwrap();
    assert!(alerts.iter().any(|a| a.rule_id == "P-RND"));
}

/// A single day far outside the account's daily baseline is a
/// velocity anomaly.
#[test]
fn velocity_spike_day_detected() {
    let engine = build();
    register(&engine, "c-vel");

    // Fourteen quiet days, then ten transactions in one day.
    for day in 0..14i64 {
        engine
            .ingest_transaction(txn("c-vel", TransactionType::Card, 150.0, T0 - (20 - day) * DAY + 12 * HOUR))
            .unwrap();
    }
    for k in 0..10i64 {
        engine
            .ingest_transaction(txn("c-vel", TransactionType::Card, 200.0, T0 - 6 * DAY + (8 + k) * HOUR))
            .unwrap();
    }

    let scan = engine.scan_patterns(None).unwrap();
    let m = scan
        .matches
        .iter()
        .find(|m| m.customer_id == "c-vel" && m.pattern_type == PatternType::VelocityAnomaly)
        .expect("velocity anomaly match");
    assert_eq!(m.details["daily_count"], 10);
}

/// A burst on an account that was silent for months after real
/// history is a dormant reactivation.
#[test]
fn dormant_account_burst_detected() {
    let engine = build();
    register(&engine, "c-dorm");

    for k in 0..3i64 {
        engine
            .ingest_transaction(txn("c-dorm", TransactionType::Deposit, 900.0, T0 - (300 - k) * DAY))
            .unwrap();
    }
    for k in 0..6i64 {
        engine
            .ingest_transaction(txn("c-dorm", TransactionType::Withdrawal, 2_100.0, T0 - DAY + k * HOUR))
            .unwrap();
    }

    let scan = engine.scan_patterns(None).unwrap();
    let m = scan
        .matches
        .iter()
        .find(|m| m.customer_id == "c-dorm" && m.pattern_type == PatternType::DormantReactivation)
        .expect("dormant reactivation match");
    let gap = m.details["dormant_days"].as_i64().unwrap();
    assert!(gap >= 290, "Expected a ~297 day gap, got {gap}");
}

/// Brand-new accounts with no history before the window never count
/// as reactivated.
#[test]
fn new_account_burst_is_not_dormancy() {
    let engine = build();
    register(&engine, "c-new");

    for k in 0..6i64 {
        engine
            .ingest_transaction(txn("c-new", TransactionType::Withdrawal, 2_100.0, T0 - DAY + k * HOUR))
            .unwrap();
    }

    let scan = engine.scan_patterns(None).unwrap();
    assert!(
        !scan
            .matches
            .iter()
            .any(|m| m.customer_id == "c-new" && m.pattern_type == PatternType::DormantReactivation),
        "No prior history means no reactivation"
    );
}

/// Matches come back riskiest first and the summary counts by type.
#[test]
fn scan_orders_matches_riskiest_first() {
    let engine = build();
    register(&engine, "c-str");
    register(&engine, "c-rnd");

    for day in 0..5 {
        let day_start = T0 - (10 - day) * DAY;
        engine
            .ingest_transaction(txn("c-str", TransactionType::Deposit, 9_200.0, day_start + 10 * HOUR))
            .unwrap();
        engine
            .ingest_transaction(txn("c-str", TransactionType::Deposit, 9_400.0, day_start + 15 * HOUR))
            .unwrap();
    }
    let amounts = [
        1_000.0, 2_000.0, 3_000.0, 4_000.0, 2_000.0, 3_000.0, 1_000.0, 1_751.5, 2_333.33, 4_101.17,
    ];
    for (day, amount) in amounts.iter().enumerate() {
        engine
            .ingest_transaction(txn(
                "c-rnd",
                TransactionType::Transfer,
                *amount,
                T0 - 20 * DAY + day as i64 * DAY + 11 * HOUR,
            ))
            .unwrap();
    }

    let scan = engine.scan_patterns(None).unwrap();
    assert!(scan.matches.len() >= 2);
    assert_eq!(scan.matches[0].pattern_type, PatternType::Structuring);
    for pair in scan.matches.windows(2) {
        assert!(
            pair[0].risk_score >= pair[1].risk_score,
            "Matches must be ordered by descending risk"
        );
    }
    assert!(scan
        .summary
        .by_type
        .contains(&(PatternType::Structuring, 1)));
    assert!(scan
        .summary
        .by_type
        .contains(&(PatternType::RoundAmounts, 1)));
    assert_eq!(scan.summary.total_patterns, scan.matches.len());
}

/// An already-expired deadline stops the scan before any customer is
/// processed.
#[test]
fn expired_deadline_stops_scan() {
    let engine = build();
    register(&engine, "c-any");
    engine
        .ingest_transaction(txn("c-any", TransactionType::Deposit, 700.0, T0 - 2 * DAY))
        .unwrap();

    let scan = engine.scan_patterns(Some(T0 - 1)).unwrap();
    assert!(scan.deadline_hit);
    assert_eq!(scan.customers_scanned, 0);
    assert!(scan.matches.is_empty());
    assert_eq!(scan.customers_total, 1);
}
