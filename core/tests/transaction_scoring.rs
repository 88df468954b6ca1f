//! Transaction scoring tests: signal weights, structuring band
//! detection, model blending, and the score version guard.

use aml_core::clock::EngineClock;
use aml_core::config::AmlConfig;
use aml_core::engine::{AmlEngine, NewCustomer, NewTransaction};
use aml_core::error::AmlError;
use aml_core::ml::WeightedMlScorer;
use aml_core::store::ScoreUpdate;
use aml_core::types::{CustomerType, KycStatus, TransactionType};

const T0: i64 = 1_700_006_400; // 2023-11-15 00:00:00 UTC, a Wednesday
const HOUR: i64 = 3_600;

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

fn transfer(customer_id: &str, amount: f64, occurred_at: i64) -> NewTransaction {
    NewTransaction {
        transaction_id: String::new(),
        customer_id: customer_id.to_string(),
        account_number: format!("ACCT-{customer_id}"),
        transaction_type: TransactionType::Transfer,
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

/// Amounts at 50k and above saturate the amount signal and tag the
/// high_amount factor.
#[test]
fn large_amount_saturates_amount_signal() {
    let engine = build();
    register(&engine, "c-1");

    let outcome = engine
        .ingest_transaction(transfer("c-1", 60_000.0, T0 - 10 * HOUR))
        .unwrap();
    // 60k is daytime, first activity, no counterparty, round by 1000:
    // 1.0*20 + 0.1*15 + 0.3*15 + 0.0*25 + 0.5*15 + 0.2*10 = 35.5
    assert!((outcome.score.rule_score - 35.5).abs() < 1e-9);
    assert_eq!(outcome.score.factors, vec!["high_amount".to_string()]);
}

/// Amounts tucked just below the reporting threshold are marked
/// structured on the persisted row.
#[test]
fn just_below_threshold_marks_structured() {
    let engine = build();
    register(&engine, "c-2");

    let outcome = engine
        .ingest_transaction(transfer("c-2", 9_950.0, T0 - 10 * HOUR))
        .unwrap();
    assert!(outcome.score.is_structured);

    let row = engine.transaction(&outcome.transaction.transaction_id).unwrap();
    assert!(row.is_structured);
    assert!(!row.is_high_risk);
}

/// A high-risk destination country contributes the full geography
/// weight of 25 points.
#[test]
fn sanctioned_destination_adds_geography_weight() {
    let engine = build();
    register(&engine, "c-dom");
    register(&engine, "c-for");

    let domestic = engine
        .ingest_transaction(transfer("c-dom", 7_400.0, T0 - 10 * HOUR))
        .unwrap();
    let mut abroad = transfer("c-for", 7_400.0, T0 - 10 * HOUR);
    abroad.destination_country = Some("IR".to_string());
    let foreign = engine.ingest_transaction(abroad).unwrap();

    let diff = foreign.score.rule_score - domestic.score.rule_score;
    assert!(
        (diff - 25.0).abs() < 1e-9,
        "Geography should add exactly 25 points, added {diff}"
    );
    assert!(foreign
        .score
        .factors
        .contains(&"high_risk_geography".to_string()));
}

/// With a model installed the final score blends 60/40 with the rule
/// score.
#[test]
fn model_output_blends_sixty_forty() {
    let mut engine = build();
    engine.set_ml_scorer(Box::new(WeightedMlScorer::default()));
    register(&engine, "c-ml");

    let outcome = engine
        .ingest_transaction(transfer("c-ml", 12_500.0, T0 - 10 * HOUR))
        .unwrap();
    let ml = outcome.score.ml_score.expect("model score present");
    let expected = outcome.score.rule_score * 0.6 + ml * 0.4;
    assert!(
        (outcome.score.risk_score - expected).abs() < 1e-9,
        "Blend mismatch: {} vs {}",
        outcome.score.risk_score,
        expected
    );
}

/// More than ten transactions in the trailing 24h saturates the
/// velocity signal.
#[test]
fn rapid_activity_tags_velocity_factor() {
    let engine = build();
    register(&engine, "c-vel");

    let mut last = None;
    for k in 0..12 {
        let outcome = engine
            .ingest_transaction(transfer("c-vel", 100.0, T0 - 20 * HOUR + k * HOUR))
            .unwrap();
        last = Some(outcome);
    }
    let last = last.unwrap();
    assert!(last
        .score
        .factors
        .contains(&"high_velocity".to_string()));
}

/// Scores past the review threshold flag the row and surface it on
/// the review queue.
#[test]
fn review_threshold_feeds_review_queue() {
    let engine = build();
    register(&engine, "c-rev");

    // 60k to a sanctioned destination at 03:00:
    // 20 + 1.5 + 4.5 + 25 + 7.5 + 7 = 65.5, over the 60 review line.
    let mut new = transfer("c-rev", 60_000.0, T0 - 21 * HOUR);
    new.destination_country = Some("IR".to_string());
    let outcome = engine.ingest_transaction(new).unwrap();

    assert!(outcome.score.requires_review);
    assert!(!outcome.score.is_high_risk);
    let queue = engine.review_queue().unwrap();
    assert!(queue
        .iter()
        .any(|t| t.transaction_id == outcome.transaction.transaction_id));
}

/// A stale score version loses the write instead of clobbering the
/// newer result.
#[test]
fn stale_score_version_is_rejected() {
    let engine = build();
    register(&engine, "c-stale");

    let outcome = engine
        .ingest_transaction(transfer("c-stale", 500.0, T0 - 10 * HOUR))
        .unwrap();
    let id = outcome.transaction.transaction_id.clone();

    // Ingest already applied version 1; writing against version 0 is stale.
    let err = engine
        .store()
        .apply_score(
            &id,
            0,
            &ScoreUpdate {
                risk_score: 1.0,
                rule_score: 1.0,
                ml_score: None,
                risk_factors: "{}".to_string(),
                is_high_risk: false,
                requires_review: false,
                exceeds_threshold: false,
                is_structured: false,
            },
        )
        .unwrap_err();
    assert!(matches!(err, AmlError::StaleScore { .. }));

    // Rescoring from the current row still succeeds.
    let rescored = engine.rescore_transaction(&id).unwrap();
    assert!((rescored.rule_score - outcome.score.rule_score).abs() < 1e-9);
}

/// Rescoring over unchanged history reproduces the stored result
/// exactly, verdicts included.
#[test]
fn rescore_is_stable_over_unchanged_history() {
    let engine = build();
    register(&engine, "c-stable");

    let mut new = transfer("c-stable", 60_000.0, T0 - 21 * HOUR);
    new.destination_country = Some("IR".to_string());
    let outcome = engine.ingest_transaction(new).unwrap();
    let id = outcome.transaction.transaction_id.clone();

    let first = engine.rescore_transaction(&id).unwrap();
    let second = engine.rescore_transaction(&id).unwrap();
    assert_eq!(first.risk_score, outcome.score.risk_score);
    assert_eq!(second.risk_score, first.risk_score);
    assert_eq!(second.factors, first.factors);
    assert_eq!(second.is_high_risk, first.is_high_risk);
    assert_eq!(second.requires_review, first.requires_review);

    let row = engine.transaction(&id).unwrap();
    assert_eq!(row.risk_score, Some(second.risk_score));
}
