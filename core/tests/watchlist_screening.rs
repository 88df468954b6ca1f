//! Watchlist screening tests: fuzzy name matching thresholds, alias
//! handling, and transaction counterparty hits.

use aml_core::clock::EngineClock;
use aml_core::config::AmlConfig;
use aml_core::engine::{AmlEngine, NewCustomer, NewTransaction};
use aml_core::types::{CustomerType, KycStatus, MatchStatus, TransactionType};

const T0: i64 = 1_700_006_400; // 2023-11-15 00:00:00 UTC
const DAY: i64 = 86_400;

fn build() -> AmlEngine {
    let engine = AmlEngine::in_memory(AmlConfig::default()).expect("build engine");
    engine
        .add_watchlist_entry(
            "OFAC-1001",
            "sanctions",
            Some("SDN"),
            "Viktor Ivanov",
            &["Victor Ivanov".to_string()],
            Some("RU"),
        )
        .unwrap();
    engine
        .add_watchlist_entry("PEP-2001", "pep", None, "Carlos Mendoza", &[], Some("VE"))
        .unwrap();
    engine
}

fn fixed(mut engine: AmlEngine) -> AmlEngine {
    engine.set_clock(EngineClock::Fixed(T0));
    engine
}

fn customer(id: &str, full_name: &str) -> NewCustomer {
    NewCustomer {
        customer_id: id.to_string(),
        customer_type: CustomerType::Individual,
        full_name: full_name.to_string(),
        account_number: format!("ACCT-{id}"),
        country: Some("US".to_string()),
        occupation: None,
        is_pep: false,
        kyc_status: KycStatus::Completed,
    }
}

fn transfer_to(customer_id: &str, counterparty: Option<&str>, at: i64) -> NewTransaction {
    NewTransaction {
        transaction_id: String::new(),
        customer_id: customer_id.to_string(),
        account_number: format!("ACCT-{customer_id}"),
        transaction_type: TransactionType::Transfer,
        amount: 3_200.0,
        currency: "USD".to_string(),
        origin_country: Some("US".to_string()),
        destination_country: Some("US".to_string()),
        counterparty_name: counterparty.map(str::to_string),
        counterparty_account: counterparty.map(|_| "EXT-000001".to_string()),
        counterparty_country: None,
        occurred_at: at,
    }
}

/// An exact name match at registration is a confirmed hit at score
/// 100.
#[test]
fn exact_name_confirms_at_registration() {
    let engine = fixed(build());
    engine
        .register_customer(customer("c-exact", "Viktor Ivanov"))
        .unwrap();

    let results = engine
        .store()
        .screening_results_for_customer("c-exact")
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].match_status, MatchStatus::ConfirmedMatch);
    assert_eq!(results[0].match_score, 100.0);
    assert_eq!(results[0].entry_id.as_deref(), Some("OFAC-1001"));
    assert_eq!(results[0].matched_field.as_deref(), Some("name"));
    assert_eq!(results[0].screening_type, "customer");
}

/// A near spelling lands between the match and confirm thresholds.
#[test]
fn close_spelling_is_possible_match() {
    let engine = fixed(build());
    engine
        .register_customer(customer("c-close", "Viktor Ivanof"))
        .unwrap();

    let results = engine
        .store()
        .screening_results_for_customer("c-close")
        .unwrap();
    assert_eq!(results[0].match_status, MatchStatus::PossibleMatch);
    assert!(
        results[0].match_score >= 85.0 && results[0].match_score < 95.0,
        "Expected a possible-match score, got {}",
        results[0].match_score
    );
}

/// Case, punctuation, and extra whitespace do not defeat the match.
#[test]
fn normalization_survives_punctuation() {
    let engine = fixed(build());
    engine
        .register_customer(customer("c-norm", "  viKTOR -- IVANOV. "))
        .unwrap();

    let results = engine
        .store()
        .screening_results_for_customer("c-norm")
        .unwrap();
    assert_eq!(results[0].match_status, MatchStatus::ConfirmedMatch);
    assert_eq!(results[0].match_score, 100.0);
}

/// Aliases listed on the entry match as strongly as the primary name.
#[test]
fn alias_matches_primary_entry() {
    let engine = fixed(build());
    engine
        .register_customer(customer("c-alias", "Victor Ivanov"))
        .unwrap();

    let results = engine
        .store()
        .screening_results_for_customer("c-alias")
        .unwrap();
    assert_eq!(results[0].match_status, MatchStatus::ConfirmedMatch);
    assert_eq!(results[0].matched_field.as_deref(), Some("alias"));
    assert_eq!(results[0].entry_id.as_deref(), Some("OFAC-1001"));
}

/// Unrelated names still record a screening row, with no entry
/// attached.
#[test]
fn unrelated_name_records_no_match() {
    let engine = fixed(build());
    engine
        .register_customer(customer("c-none", "Maria Lopez"))
        .unwrap();

    let results = engine
        .store()
        .screening_results_for_customer("c-none")
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].match_status, MatchStatus::NoMatch);
    assert!(results[0].entry_id.is_none());
    assert!(results[0].matched_field.is_none());
}

/// A sanctioned counterparty marks the transaction with both hit
/// flags.
#[test]
fn sanctioned_counterparty_marks_transaction() {
    let engine = fixed(build());
    engine.register_customer(customer("c-cp", "Plain Person")).unwrap();

    let outcome = engine
        .ingest_transaction(transfer_to("c-cp", Some("Viktor Ivanov"), T0 - 2 * DAY))
        .unwrap();
    let screening = outcome.screening.expect("counterparty screened");
    assert_eq!(screening.match_status, MatchStatus::ConfirmedMatch);
    assert_eq!(screening.screening_type, "transaction");

    let row = engine.transaction(&outcome.transaction.transaction_id).unwrap();
    assert!(row.watchlist_hit);
    assert!(row.sanctions_hit);
}

/// A PEP-list counterparty is a watchlist hit but not a sanctions
/// hit.
#[test]
fn pep_counterparty_is_not_a_sanctions_hit() {
    let engine = fixed(build());
    engine.register_customer(customer("c-pep", "Plain Person")).unwrap();

    let outcome = engine
        .ingest_transaction(transfer_to("c-pep", Some("Carlos Mendoza"), T0 - 2 * DAY))
        .unwrap();
    assert!(outcome.screening.is_some());

    let row = engine.transaction(&outcome.transaction.transaction_id).unwrap();
    assert!(row.watchlist_hit);
    assert!(!row.sanctions_hit);
}

/// Transactions without a counterparty name skip screening entirely.
#[test]
fn missing_counterparty_skips_screening() {
    let engine = fixed(build());
    engine.register_customer(customer("c-skip", "Plain Person")).unwrap();

    let outcome = engine
        .ingest_transaction(transfer_to("c-skip", None, T0 - 2 * DAY))
        .unwrap();
    assert!(outcome.screening.is_none());
    assert!(engine
        .store()
        .screening_results_for_transaction(&outcome.transaction.transaction_id)
        .unwrap()
        .is_empty());
}
