//! aml-runner: seeded end-to-end exercise of the AML engine.
//!
//! Usage:
//!   aml-runner --seed 42 --days 30 --customers 20 --db run.db
//!   aml-runner --config engine.json

use aml_core::config::AmlConfig;
use aml_core::engine::{AmlEngine, NewCustomer, NewTransaction};
use aml_core::ml::WeightedMlScorer;
use aml_core::patterns::ScanOutcome;
use aml_core::types::{AlertSeverity, CustomerType, KycStatus, TransactionType};
use anyhow::Result;
use rand::Rng;
use rand_pcg::Pcg64Mcg;
use std::env;

const SECONDS_PER_DAY: i64 = 86_400;

const FIRST_NAMES: [&str; 12] = [
    "Elena", "Marcus", "Priya", "Tomas", "Aisha", "Derek", "Ingrid", "Rafael", "Mei", "Oluwaseun",
    "Hannah", "Viktor",
];

const LAST_NAMES: [&str; 12] = [
    "Alvarez", "Chen", "Okafor", "Novak", "Haddad", "Lindqvist", "Moreau", "Tanaka", "Osei",
    "Petrov", "Kaur", "Ivanof",
];

const OCCUPATIONS: [&str; 8] = [
    "teacher",
    "software engineer",
    "accountant",
    "nurse",
    "money services business",
    "restaurant owner",
    "real estate broker",
    "precious metals dealer",
];

const COUNTERPARTY_NAMES: [&str; 5] = [
    "Harbor Freight Logistics",
    "Bluefin Imports LLC",
    "Cedar Grove Holdings",
    "Atlas Textile Co",
    "Meridian Parts Supply",
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let days = parse_arg(&args, "--days", 30i64).max(7);
    let customers = parse_arg(&args, "--customers", 20usize).max(8);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => AmlConfig::load(&w[1])?,
        None => AmlConfig::default(),
    };

    println!("aml-runner");
    println!("  seed:      {seed}");
    println!("  days:      {days}");
    println!("  customers: {customers}");
    println!("  db:        {db}");
    println!();

    let mut engine = if db == ":memory:" {
        AmlEngine::in_memory(config)?
    } else {
        AmlEngine::open(db, config)?
    };
    engine.set_ml_scorer(Box::new(WeightedMlScorer::default()));

    let mut rng = Pcg64Mcg::new(seed as u128);
    let now = engine.now_ts();
    let start = now - days * SECONDS_PER_DAY;

    seed_watchlist(&engine)?;
    let ids = seed_customers(&engine, &mut rng, customers)?;

    let mut ingested = 0usize;
    ingested += baseline_activity(&engine, &mut rng, &ids, start, days)?;
    ingested += inject_structuring(&engine, &mut rng, &ids[0], start, days)?;
    ingested += inject_layering(&engine, &mut rng, &ids[1], start, days)?;
    ingested += inject_dormancy(&engine, &mut rng, &ids[2], now)?;
    ingested += inject_flagged_singles(&engine, &ids, start, days)?;

    let scan = engine.scan_patterns(None)?;
    demo_workflow(&engine)?;
    print_summary(&engine, ingested, &scan)?;
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn seed_watchlist(engine: &AmlEngine) -> Result<()> {
    engine.add_watchlist_entry(
        "OFAC-1001",
        "sanctions",
        Some("SDN"),
        "Viktor Ivanov",
        &["Victor Ivanov".to_string()],
        Some("RU"),
    )?;
    engine.add_watchlist_entry(
        "OFAC-1002",
        "sanctions",
        Some("SDN"),
        "Golden Lotus Trading Ltd",
        &[],
        Some("MM"),
    )?;
    engine.add_watchlist_entry("PEP-2001", "pep", None, "Carlos Mendoza", &[], Some("VE"))?;
    Ok(())
}

fn seed_customers(engine: &AmlEngine, rng: &mut Pcg64Mcg, count: usize) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let customer_id = format!("C-{:04}", i + 1);
        let account_number = format!("ACCT-{:04}", i + 1);
        let full_name = if i + 1 == count {
            // Near-miss against the seeded sanctions entry.
            "Viktor Ivanof".to_string()
        } else {
            format!(
                "{} {}",
                FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())],
                LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())]
            )
        };
        let corporate = rng.gen_bool(0.2);
        let country = if rng.gen_bool(0.1) { "PA" } else { "US" };
        engine.register_customer(NewCustomer {
            customer_id: customer_id.clone(),
            customer_type: if corporate {
                CustomerType::Corporate
            } else {
                CustomerType::Individual
            },
            full_name,
            account_number,
            country: Some(country.to_string()),
            occupation: Some(OCCUPATIONS[rng.gen_range(0..OCCUPATIONS.len())].to_string()),
            is_pep: rng.gen_bool(0.08),
            kyc_status: if rng.gen_bool(0.9) {
                KycStatus::Completed
            } else {
                KycStatus::Pending
            },
        })?;
        ids.push(customer_id);
    }
    Ok(ids)
}

fn txn(
    customer_id: &str,
    transaction_type: TransactionType,
    amount: f64,
    occurred_at: i64,
) -> NewTransaction {
    let n: usize = customer_id
        .trim_start_matches("C-")
        .parse()
        .unwrap_or_default();
    NewTransaction {
        transaction_id: String::new(),
        customer_id: customer_id.to_string(),
        account_number: format!("ACCT-{n:04}"),
        transaction_type,
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

/// Unremarkable day-to-day activity for every customer.
fn baseline_activity(
    engine: &AmlEngine,
    rng: &mut Pcg64Mcg,
    ids: &[String],
    start: i64,
    days: i64,
) -> Result<usize> {
    const TYPES: [TransactionType; 5] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::Transfer,
        TransactionType::Ach,
        TransactionType::Card,
    ];
    let mut ingested = 0usize;
    for day in 0..days {
        let day_start = start + day * SECONDS_PER_DAY;
        for (i, customer_id) in ids.iter().enumerate() {
            // Indexes 1 and 2 are reserved for the layering and dormancy
            // scenarios, which need otherwise-quiet accounts.
            if i == 1 || i == 2 {
                continue;
            }
            for _ in 0..rng.gen_range(0..3) {
                let occurred_at =
                    day_start + rng.gen_range(8i64..20) * 3_600 + rng.gen_range(0i64..3_600);
                let transaction_type = TYPES[rng.gen_range(0..TYPES.len())];
                let amount = (rng.gen_range(40.0..2_500.0_f64) * 100.0).round() / 100.0;
                let mut new = txn(customer_id, transaction_type, amount, occurred_at);
                if transaction_type == TransactionType::Transfer && rng.gen_bool(0.5) {
                    new.counterparty_name =
                        Some(COUNTERPARTY_NAMES[rng.gen_range(0..COUNTERPARTY_NAMES.len())].to_string());
                    new.counterparty_account =
                        Some(format!("EXT-{:06}", rng.gen_range(100_000..999_999)));
                }
                engine.ingest_transaction(new)?;
                ingested += 1;
            }
        }
    }
    Ok(ingested)
}

/// Repeated just-under-threshold cash deposits across many days.
fn inject_structuring(
    engine: &AmlEngine,
    rng: &mut Pcg64Mcg,
    customer_id: &str,
    start: i64,
    days: i64,
) -> Result<usize> {
    let mut ingested = 0usize;
    for day in (0..days).step_by(3) {
        let day_start = start + day * SECONDS_PER_DAY;
        for k in 0..2i64 {
            let occurred_at = day_start + (10 + k * 4) * 3_600 + rng.gen_range(0i64..1_800);
            let amount = (rng.gen_range(9_200.0..9_900.0_f64) * 100.0).round() / 100.0;
            engine.ingest_transaction(txn(
                customer_id,
                TransactionType::Deposit,
                amount,
                occurred_at,
            ))?;
            ingested += 1;
        }
    }
    Ok(ingested)
}

/// A burst of outbound wires to distinct counterparties within a few hours.
fn inject_layering(
    engine: &AmlEngine,
    rng: &mut Pcg64Mcg,
    customer_id: &str,
    start: i64,
    days: i64,
) -> Result<usize> {
    let burst_start = start + (days / 2) * SECONDS_PER_DAY + 9 * 3_600;
    for k in 0..6i64 {
        let amount = (rng.gen_range(4_000.0..9_000.0_f64) * 100.0).round() / 100.0;
        let mut new = txn(
            customer_id,
            TransactionType::Wire,
            amount,
            burst_start + k * 1_800,
        );
        new.counterparty_name = Some(format!("Shell Entity {k}"));
        new.counterparty_account = Some(format!("LAYER-{k:03}"));
        new.counterparty_country = Some("KY".to_string());
        engine.ingest_transaction(new)?;
    }
    Ok(6)
}

/// Old history followed by silence, then a burst inside the scan window.
fn inject_dormancy(
    engine: &AmlEngine,
    rng: &mut Pcg64Mcg,
    customer_id: &str,
    now: i64,
) -> Result<usize> {
    let mut ingested = 0usize;
    let historical = now - 250 * SECONDS_PER_DAY;
    for k in 0..4i64 {
        let amount = (rng.gen_range(200.0..1_500.0_f64) * 100.0).round() / 100.0;
        engine.ingest_transaction(txn(
            customer_id,
            TransactionType::Deposit,
            amount,
            historical + k * SECONDS_PER_DAY,
        ))?;
        ingested += 1;
    }
    let burst = now - 2 * SECONDS_PER_DAY;
    for k in 0..6i64 {
        // First reactivation movement is large enough to trip dormancy monitoring.
        let amount = if k == 0 {
            6_000.0
        } else {
            (rng.gen_range(2_000.0..4_000.0_f64) * 100.0).round() / 100.0
        };
        engine.ingest_transaction(txn(
            customer_id,
            TransactionType::Withdrawal,
            amount,
            burst + k * 7_200,
        ))?;
        ingested += 1;
    }
    Ok(ingested)
}

/// One-off transactions that each target a specific monitoring rule.
fn inject_flagged_singles(
    engine: &AmlEngine,
    ids: &[String],
    start: i64,
    days: i64,
) -> Result<usize> {
    let mid = start + (days / 2) * SECONDS_PER_DAY;

    // Large round cash deposit: threshold rule, round-amount rule, and their compound.
    engine.ingest_transaction(txn(
        &ids[3],
        TransactionType::Deposit,
        15_000.0,
        mid + 11 * 3_600,
    ))?;

    // Wire into a high-risk corridor.
    let mut wire = txn(&ids[4], TransactionType::Wire, 7_400.0, mid + 14 * 3_600);
    wire.destination_country = Some("IR".to_string());
    wire.counterparty_country = Some("IR".to_string());
    wire.counterparty_name = Some("Caspian Trade House".to_string());
    wire.counterparty_account = Some("IR-778210".to_string());
    engine.ingest_transaction(wire)?;

    // Odd-hours movement.
    engine.ingest_transaction(txn(
        &ids[5],
        TransactionType::Withdrawal,
        1_850.0,
        mid + SECONDS_PER_DAY + 3 * 3_600,
    ))?;

    // Counterparty name that matches the seeded sanctions entry.
    let mut hit = txn(
        &ids[6],
        TransactionType::Transfer,
        3_200.0,
        mid + 2 * SECONDS_PER_DAY + 10 * 3_600,
    );
    hit.counterparty_name = Some("Viktor Ivanov".to_string());
    hit.counterparty_account = Some("EXT-440091".to_string());
    engine.ingest_transaction(hit)?;

    Ok(4)
}

/// Walk one auto-opened case through triage to a SAR filing, and clear
/// one low-severity alert as a false positive.
fn demo_workflow(engine: &AmlEngine) -> Result<()> {
    if let Some(case) = engine.active_cases()?.first() {
        engine.assign_case(&case.case_id, "analyst.ortiz", "supervisor.chen")?;
        let closure = engine.close_case(
            &case.case_id,
            "file_sar",
            "Confirmed suspicious cash activity inconsistent with customer profile",
            "analyst.ortiz",
        )?;
        if let Some(number) = &closure.sar_report_number {
            engine.file_sar(number, "supervisor.chen")?;
        }
    }

    let low = engine
        .active_alerts()?
        .into_iter()
        .find(|a| a.severity == AlertSeverity::Low);
    if let Some(alert) = low {
        engine.assign_alert(&alert.alert_id, "analyst.ortiz", "supervisor.chen")?;
        engine.resolve_alert(
            &alert.alert_id,
            "Reviewed; consistent with stated business activity",
            true,
            "analyst.ortiz",
        )?;
    }
    Ok(())
}

fn print_summary(engine: &AmlEngine, ingested: usize, scan: &ScanOutcome) -> Result<()> {
    let stats = engine.stats()?;

    println!("=== RUN SUMMARY ===");
    println!("  customers:       {}", stats.customers);
    println!(
        "  transactions:    {} ({ingested} ingested this run)",
        stats.transactions
    );
    println!(
        "  alerts:          {} total, {} active",
        stats.alerts.total, stats.alerts.active
    );
    for (status, n) in &stats.alerts.by_status {
        println!("    {:<18} {n}", status.as_str());
    }
    println!(
        "  cases:           {} total, {} active, {} SAR-filed",
        stats.cases.total, stats.cases.active, stats.cases.sar_filed
    );
    println!("  CTR reports:     {}", stats.ctr_reports);
    println!("  SAR reports:     {}", stats.sar_reports);
    println!("  screening hits:  {}", stats.screening_hits);
    println!();

    println!("=== PATTERN SCAN ===");
    println!(
        "  customers scanned: {}/{}",
        scan.customers_scanned, scan.customers_total
    );
    println!("  matches:           {}", scan.summary.total_patterns);
    for (pattern_type, n) in &scan.summary.by_type {
        println!("    {:<22} {n}", pattern_type.as_str());
    }
    println!(
        "  high-risk flagged: {}",
        scan.summary.high_risk_customers.len()
    );
    println!("  avg confidence:    {:.2}", scan.summary.avg_confidence);
    println!("  avg risk score:    {:.1}", scan.summary.avg_risk_score);
    if !scan.errors.is_empty() {
        println!("  scan errors:       {}", scan.errors.len());
    }
    println!();

    println!("=== REVIEW QUEUE (top 5) ===");
    for t in engine.review_queue()?.iter().take(5) {
        println!(
            "  {}  {:<10} {:>12.2}  score {:>5.1}",
            t.transaction_id,
            t.transaction_type.as_str(),
            t.amount,
            t.risk_score.unwrap_or_default()
        );
    }
    Ok(())
}
