//! Customer risk assessment tests: factor scoring, composite tiers,
//! review scheduling, and reassessment after profile changes.

use aml_core::clock::EngineClock;
use aml_core::config::AmlConfig;
use aml_core::engine::{AmlEngine, NewCustomer, NewTransaction};
use aml_core::types::{CustomerType, KycStatus, RiskLevel, TransactionType};

const T0: i64 = 1_700_006_400; // 2023-11-15 00:00:00 UTC
const DAY: i64 = 86_400;

fn build() -> AmlEngine {
    let mut engine = AmlEngine::in_memory(AmlConfig::default()).expect("build engine");
    engine.set_clock(EngineClock::Fixed(T0));
    engine
}

fn individual(id: &str, country: &str, is_pep: bool) -> NewCustomer {
    NewCustomer {
        customer_id: id.to_string(),
        customer_type: CustomerType::Individual,
        full_name: format!("Customer {id}"),
        account_number: format!("ACCT-{id}"),
        country: Some(country.to_string()),
        occupation: Some("teacher".to_string()),
        is_pep,
        kyc_status: KycStatus::Completed,
    }
}

fn deposit(customer_id: &str, amount: f64, occurred_at: i64) -> NewTransaction {
    NewTransaction {
        transaction_id: String::new(),
        customer_id: customer_id.to_string(),
        account_number: format!("ACCT-{customer_id}"),
        transaction_type: TransactionType::Deposit,
        amount,
        currency: "USD".to_string(),
        origin_country: Some("US".to_string()),
        destination_country: Some("US".to_string()),
        counterparty_name: None,
        counterparty_account: None,
        counterparty_country: None,
        occurred_at,
    }
}

/// A PEP from a sanctioned jurisdiction should max out the geographic
/// factor and carry both indicators.
#[test]
fn pep_in_sanctioned_country_maxes_geographic_factor() {
    let engine = build();
    engine.register_customer(individual("c-pep", "IR", true)).unwrap();

    let assessment = engine.assess_customer("c-pep").unwrap();
    assert_eq!(
        assessment.geographic_risk, 100.0,
        "High-risk country plus PEP uplift should saturate at 100, got {}",
        assessment.geographic_risk
    );
    assert!(assessment.indicators.contains(&"PEP".to_string()));
    assert!(assessment
        .indicators
        .contains(&"High Risk Country".to_string()));

    let domestic = engine.register_customer(individual("c-us", "US", false)).unwrap();
    assert!(
        assessment.composite_score > domestic.risk_score,
        "PEP in IR ({}) should outrank a domestic profile ({})",
        assessment.composite_score,
        domestic.risk_score
    );
}

/// A corporate in a high-risk line of business scores 80 on the
/// customer-type factor.
#[test]
fn high_risk_business_lifts_customer_type_factor() {
    let engine = build();
    engine
        .register_customer(NewCustomer {
            customer_id: "c-msb".to_string(),
            customer_type: CustomerType::Corporate,
            full_name: "Sunrise Exchange LLC".to_string(),
            account_number: "ACCT-MSB".to_string(),
            country: Some("US".to_string()),
            occupation: Some("money_services".to_string()),
            is_pep: false,
            kyc_status: KycStatus::Completed,
        })
        .unwrap();

    let assessment = engine.assess_customer("c-msb").unwrap();
    assert_eq!(assessment.customer_type_risk, 80.0);
    assert!(assessment
        .indicators
        .contains(&"High Risk Business".to_string()));
}

/// Incomplete KYC adds a flat uplift to the customer-type factor, and
/// completing KYC later lowers the composite.
#[test]
fn incomplete_kyc_raises_type_risk_until_completed() {
    let engine = build();
    let mut new = individual("c-kyc", "US", false);
    new.kyc_status = KycStatus::Pending;
    engine.register_customer(new).unwrap();

    let pending = engine.assess_customer("c-kyc").unwrap();
    assert_eq!(pending.customer_type_risk, 50.0);

    let completed = engine.update_kyc("c-kyc", KycStatus::Completed).unwrap();
    assert_eq!(completed.customer_type_risk, 30.0);
    assert!(
        completed.composite_score < pending.composite_score,
        "Completing KYC should lower the composite ({} -> {})",
        pending.composite_score,
        completed.composite_score
    );
}

/// Review cadence follows the assessed tier: medium reviews at 180
/// days.
#[test]
fn review_schedule_follows_risk_tier() {
    let engine = build();
    let row = engine.register_customer(individual("c-rev", "US", false)).unwrap();
    assert_eq!(row.risk_level, RiskLevel::Medium);

    let assessment = engine.assess_customer("c-rev").unwrap();
    assert_eq!(
        assessment.next_review_at,
        T0 + 180 * DAY,
        "Medium tier should schedule review 180 days out"
    );

    let profile = engine.risk_profile("c-rev").unwrap().expect("profile persisted");
    assert_eq!(profile.next_review_at, Some(T0 + 180 * DAY));
    assert_eq!(profile.last_review_at, Some(T0));
}

/// Heavy cash usage and high average amounts both feed the behaviour
/// factor.
#[test]
fn cash_heavy_history_raises_transaction_factor() {
    let engine = build();
    engine.register_customer(individual("c-cash", "US", false)).unwrap();

    // Six large cash deposits across six days inside the 90-day window.
    for day in 0..6 {
        engine
            .ingest_transaction(deposit("c-cash", 11_111.0, T0 - (20 - day) * DAY))
            .unwrap();
    }

    let assessment = engine.assess_customer("c-cash").unwrap();
    // Base 30 + high average uplift 20 + cash ratio uplift 20.
    assert_eq!(assessment.transaction_risk, 70.0);
    assert!(assessment.composite_score > 40.0);
}

/// Workflow counters accumulated on the profile survive reassessment.
#[test]
fn profile_counters_survive_reassessment() {
    let engine = build();
    engine.register_customer(individual("c-count", "US", false)).unwrap();

    // One large round cash deposit fires three rules, so three alerts.
    engine
        .ingest_transaction(deposit("c-count", 15_000.0, T0 - 5 * DAY))
        .unwrap();

    let before = engine.risk_profile("c-count").unwrap().expect("profile");
    assert_eq!(before.alert_count, 3);

    engine.assess_customer("c-count").unwrap();
    let after = engine.risk_profile("c-count").unwrap().expect("profile");
    assert_eq!(
        after.alert_count, before.alert_count,
        "Reassessment must not reset workflow counters"
    );
}
