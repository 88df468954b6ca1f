//! Per-transaction monitoring rules.
//!
//! Rules implement [`MonitoringRule`] and live in an ordered registry;
//! the standard catalog is built from config and further rules can be
//! registered behind it. Seven base rules fire independently; two
//! compound rules escalate when specific base rules fire together on
//! the same transaction:
//!   R001 amount threshold    large cash/deposit/withdrawal
//!   R002 velocity            rapid movement of funds
//!   R003 structuring         just-under-threshold repeats
//!   R004 geographic          high-risk country involvement
//!   R005 timing              small-hours activity
//!   R006 round amount        suspiciously round figures
//!   R007 dormancy            dormant account springs to life
//!   C001 = R001 + R006, C002 = R003 + R002, both critical.
//!
//! The monitor only detects; turning firings into persisted alerts is
//! the alert pipeline's job.

use crate::config::MonitoringConfig;
use crate::error::AmlResult;
use crate::risk_factors::{self, SECONDS_PER_DAY, SECONDS_PER_HOUR};
use crate::store::{AmlStore, TransactionRow};
use crate::types::AlertSeverity;

pub const RULE_LARGE_CASH: &str = "R001";
pub const RULE_VELOCITY: &str = "R002";
pub const RULE_STRUCTURING: &str = "R003";
pub const RULE_HIGH_RISK_COUNTRY: &str = "R004";
pub const RULE_UNUSUAL_TIME: &str = "R005";
pub const RULE_ROUND_AMOUNT: &str = "R006";
pub const RULE_DORMANCY: &str = "R007";
pub const RULE_COMBO_CASH_ROUND: &str = "C001";
pub const RULE_COMBO_STRUCTURING_VELOCITY: &str = "C002";

const NAME_LARGE_CASH: &str = "Large Cash Transaction";
const NAME_VELOCITY: &str = "Rapid Movement of Funds";
const NAME_STRUCTURING: &str = "Structuring Pattern";
const NAME_HIGH_RISK_COUNTRY: &str = "High Risk Country";
const NAME_UNUSUAL_TIME: &str = "Unusual Time Pattern";
const NAME_ROUND_AMOUNT: &str = "Round Amount Pattern";
const NAME_DORMANCY: &str = "Dormant Account Sudden Activity";

/// One rule firing on one transaction.
#[derive(Debug, Clone)]
pub struct RuleFiring {
    pub rule_id: &'static str,
    pub rule_name: &'static str,
    pub alert_type: &'static str,
    pub title: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub score: f64,
    pub details: serde_json::Value,
}

/// Everything the monitor found for one transaction.
#[derive(Debug, Clone)]
pub struct MonitoringOutcome {
    pub transaction_id: String,
    pub firings: Vec<RuleFiring>,
    /// Names of the base rules that fired, in rule order.
    pub risk_indicators: Vec<String>,
    pub max_severity: Option<AlertSeverity>,
    /// Rules that errored and were skipped this pass.
    pub failed_rules: Vec<&'static str>,
}

// ── Rule trait ─────────────────────────────────────────────────────

/// One independent detection rule. A rule sees the transaction and
/// whatever history it needs through the store, and either fires or
/// stays silent. An error from one rule never blocks the others.
pub trait MonitoringRule {
    fn rule_id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn evaluate(&self, store: &AmlStore, txn: &TransactionRow) -> AmlResult<Option<RuleFiring>>;
}

// ── Base rule catalog ──────────────────────────────────────────────

struct AmountThresholdRule {
    threshold: f64,
}

impl MonitoringRule for AmountThresholdRule {
    fn rule_id(&self) -> &'static str {
        RULE_LARGE_CASH
    }

    fn name(&self) -> &'static str {
        NAME_LARGE_CASH
    }

    fn evaluate(
        &self,
        _store: &AmlStore,
        txn: &TransactionRow,
    ) -> AmlResult<Option<RuleFiring>> {
        if !txn.is_cash || txn.amount < self.threshold {
            return Ok(None);
        }
        // Double the threshold is a harder signal than just over it.
        let severity = if txn.amount >= self.threshold * 2.0 {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        Ok(Some(RuleFiring {
            rule_id: RULE_LARGE_CASH,
            rule_name: NAME_LARGE_CASH,
            alert_type: "amount_threshold",
            title: NAME_LARGE_CASH.to_string(),
            description: format!(
                "Large {} transaction of {} {}",
                txn.transaction_type.as_str(),
                txn.amount,
                txn.currency
            ),
            severity,
            score: (txn.amount / self.threshold * 50.0).min(100.0),
            details: serde_json::json!({
                "amount": txn.amount,
                "threshold": self.threshold,
                "type": txn.transaction_type.as_str(),
            }),
        }))
    }
}

struct VelocityRule {
    window_hours: i64,
    count: i64,
    amount_floor: f64,
}

impl MonitoringRule for VelocityRule {
    fn rule_id(&self) -> &'static str {
        RULE_VELOCITY
    }

    fn name(&self) -> &'static str {
        NAME_VELOCITY
    }

    fn evaluate(
        &self,
        store: &AmlStore,
        txn: &TransactionRow,
    ) -> AmlResult<Option<RuleFiring>> {
        let since = txn.occurred_at - self.window_hours * SECONDS_PER_HOUR;
        let (others, others_total) = store.window_stats_excluding(
            &txn.customer_id,
            since,
            txn.occurred_at,
            &txn.transaction_id,
        )?;
        if others < self.count {
            return Ok(None);
        }
        let total_amount = others_total + txn.amount;
        if total_amount < self.amount_floor {
            return Ok(None);
        }
        Ok(Some(RuleFiring {
            rule_id: RULE_VELOCITY,
            rule_name: NAME_VELOCITY,
            alert_type: "velocity",
            title: NAME_VELOCITY.to_string(),
            description: format!(
                "Rapid movement of funds: {} transactions totaling {} in {} hours",
                others + 1,
                total_amount,
                self.window_hours
            ),
            severity: AlertSeverity::High,
            score: (others as f64 / self.count as f64 * 60.0).min(100.0),
            details: serde_json::json!({
                "transaction_count": others + 1,
                "total_amount": total_amount,
                "period_hours": self.window_hours,
            }),
        }))
    }
}

struct StructuringRule {
    threshold: f64,
    margin: f64,
    window_hours: i64,
}

impl MonitoringRule for StructuringRule {
    fn rule_id(&self) -> &'static str {
        RULE_STRUCTURING
    }

    fn name(&self) -> &'static str {
        NAME_STRUCTURING
    }

    fn evaluate(
        &self,
        store: &AmlStore,
        txn: &TransactionRow,
    ) -> AmlResult<Option<RuleFiring>> {
        if !risk_factors::is_near_threshold(txn.amount, self.threshold, self.margin) {
            return Ok(None);
        }
        let since = txn.occurred_at - self.window_hours * SECONDS_PER_HOUR;
        let similar = store.count_band_amounts_excluding(
            &txn.customer_id,
            since,
            txn.occurred_at,
            self.threshold - self.margin,
            self.threshold,
            &txn.transaction_id,
        )?;
        if similar == 0 {
            return Ok(None);
        }
        Ok(Some(RuleFiring {
            rule_id: RULE_STRUCTURING,
            rule_name: NAME_STRUCTURING,
            alert_type: "structuring",
            title: NAME_STRUCTURING.to_string(),
            description: format!(
                "Potential structuring: Multiple transactions just below {} threshold",
                self.threshold
            ),
            severity: AlertSeverity::High,
            score: 80.0,
            details: serde_json::json!({
                "amount": txn.amount,
                "threshold": self.threshold,
                "similar_count": similar,
            }),
        }))
    }
}

struct GeographicRule {
    high_risk_countries: Vec<String>,
}

impl MonitoringRule for GeographicRule {
    fn rule_id(&self) -> &'static str {
        RULE_HIGH_RISK_COUNTRY
    }

    fn name(&self) -> &'static str {
        NAME_HIGH_RISK_COUNTRY
    }

    fn evaluate(
        &self,
        _store: &AmlStore,
        txn: &TransactionRow,
    ) -> AmlResult<Option<RuleFiring>> {
        let candidates = [
            ("originating", txn.origin_country.as_deref()),
            ("destination", txn.destination_country.as_deref()),
            ("counterparty", txn.counterparty_country.as_deref()),
        ];
        for (field, country) in candidates {
            let Some(country) = country else { continue };
            if self
                .high_risk_countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(country))
            {
                return Ok(Some(RuleFiring {
                    rule_id: RULE_HIGH_RISK_COUNTRY,
                    rule_name: NAME_HIGH_RISK_COUNTRY,
                    alert_type: "geographic",
                    title: NAME_HIGH_RISK_COUNTRY.to_string(),
                    description: format!("Transaction involves high-risk country: {country}"),
                    severity: AlertSeverity::High,
                    score: 90.0,
                    details: serde_json::json!({
                        "country": country,
                        "field": field,
                    }),
                }));
            }
        }
        Ok(None)
    }
}

struct TimingRule {
    risky_hours: Vec<u32>,
}

impl MonitoringRule for TimingRule {
    fn rule_id(&self) -> &'static str {
        RULE_UNUSUAL_TIME
    }

    fn name(&self) -> &'static str {
        NAME_UNUSUAL_TIME
    }

    fn evaluate(
        &self,
        _store: &AmlStore,
        txn: &TransactionRow,
    ) -> AmlResult<Option<RuleFiring>> {
        let hour = risk_factors::hour_of(txn.occurred_at);
        if !self.risky_hours.contains(&hour) {
            return Ok(None);
        }
        Ok(Some(RuleFiring {
            rule_id: RULE_UNUSUAL_TIME,
            rule_name: NAME_UNUSUAL_TIME,
            alert_type: "timing",
            title: NAME_UNUSUAL_TIME.to_string(),
            description: format!("Transaction at unusual hour: {hour:02}:00"),
            severity: AlertSeverity::Medium,
            score: 60.0,
            details: serde_json::json!({
                "hour": hour,
                "occurred_at": txn.occurred_at,
            }),
        }))
    }
}

struct RoundAmountRule {
    floor: f64,
    divisor: f64,
}

impl MonitoringRule for RoundAmountRule {
    fn rule_id(&self) -> &'static str {
        RULE_ROUND_AMOUNT
    }

    fn name(&self) -> &'static str {
        NAME_ROUND_AMOUNT
    }

    fn evaluate(
        &self,
        _store: &AmlStore,
        txn: &TransactionRow,
    ) -> AmlResult<Option<RuleFiring>> {
        if txn.amount < self.floor || !risk_factors::is_round_amount(txn.amount, self.divisor) {
            return Ok(None);
        }
        Ok(Some(RuleFiring {
            rule_id: RULE_ROUND_AMOUNT,
            rule_name: NAME_ROUND_AMOUNT,
            alert_type: "round_amount",
            title: NAME_ROUND_AMOUNT.to_string(),
            description: format!("Round amount transaction: {}", txn.amount),
            severity: AlertSeverity::Low,
            score: 40.0,
            details: serde_json::json!({
                "amount": txn.amount,
                "divisor": self.divisor,
            }),
        }))
    }
}

struct DormancyRule {
    days: i64,
    amount_floor: f64,
}

impl MonitoringRule for DormancyRule {
    fn rule_id(&self) -> &'static str {
        RULE_DORMANCY
    }

    fn name(&self) -> &'static str {
        NAME_DORMANCY
    }

    fn evaluate(
        &self,
        store: &AmlStore,
        txn: &TransactionRow,
    ) -> AmlResult<Option<RuleFiring>> {
        let last = match store.last_transaction_before(
            &txn.customer_id,
            txn.occurred_at,
            &txn.transaction_id,
        )? {
            Some(last) => last,
            // First ever transaction is not a reactivation.
            None => return Ok(None),
        };
        let days_dormant = (txn.occurred_at - last.occurred_at) / SECONDS_PER_DAY;
        if days_dormant < self.days || txn.amount < self.amount_floor {
            return Ok(None);
        }
        Ok(Some(RuleFiring {
            rule_id: RULE_DORMANCY,
            rule_name: NAME_DORMANCY,
            alert_type: "dormancy",
            title: NAME_DORMANCY.to_string(),
            description: format!(
                "Sudden activity in dormant account: {days_dormant} days inactive"
            ),
            severity: AlertSeverity::High,
            score: 75.0,
            details: serde_json::json!({
                "days_dormant": days_dormant,
                "amount": txn.amount,
                "last_activity": last.occurred_at,
            }),
        }))
    }
}

// ── Monitor ────────────────────────────────────────────────────────

pub struct TransactionMonitor {
    rules: Vec<Box<dyn MonitoringRule>>,
}

impl TransactionMonitor {
    /// Build the standard R001-R007 catalog from config, in rule order.
    pub fn new(config: MonitoringConfig) -> Self {
        let rules: Vec<Box<dyn MonitoringRule>> = vec![
            Box::new(AmountThresholdRule {
                threshold: config.amount_threshold,
            }),
            Box::new(VelocityRule {
                window_hours: config.velocity_window_hours,
                count: config.velocity_count,
                amount_floor: config.velocity_amount_floor,
            }),
            Box::new(StructuringRule {
                threshold: config.structuring_threshold,
                margin: config.structuring_margin,
                window_hours: config.structuring_window_hours,
            }),
            Box::new(GeographicRule {
                high_risk_countries: config.high_risk_countries,
            }),
            Box::new(TimingRule {
                risky_hours: config.risky_hours,
            }),
            Box::new(RoundAmountRule {
                floor: config.round_amount_floor,
                divisor: config.round_amount_divisor,
            }),
            Box::new(DormancyRule {
                days: config.dormancy_days,
                amount_floor: config.dormancy_amount_floor,
            }),
        ];
        Self { rules }
    }

    /// Append a rule behind the standard catalog.
    pub fn register_rule(&mut self, rule: Box<dyn MonitoringRule>) {
        self.rules.push(rule);
    }

    /// Run every rule against one transaction. Window rules anchor at
    /// the transaction's own timestamp, so replays are deterministic.
    /// A rule that errors is logged and skipped; the rest still run.
    pub fn monitor(&self, store: &AmlStore, txn: &TransactionRow) -> AmlResult<MonitoringOutcome> {
        let mut firings = Vec::new();
        let mut failed_rules = Vec::new();
        for rule in &self.rules {
            match rule.evaluate(store, txn) {
                Ok(Some(f)) => firings.push(f),
                Ok(None) => {}
                Err(err) => {
                    log::error!(
                        "rule {} failed on transaction {}: {err}",
                        rule.rule_id(),
                        txn.transaction_id
                    );
                    failed_rules.push(rule.rule_id());
                }
            }
        }

        let risk_indicators: Vec<String> =
            firings.iter().map(|f| f.rule_name.to_string()).collect();
        firings.extend(compound_firings(&risk_indicators));

        for f in &firings {
            log::warn!(
                "rule {} fired on transaction {}: {}",
                f.rule_id,
                txn.transaction_id,
                f.description
            );
        }

        let max_severity = firings.iter().map(|f| f.severity).max();
        Ok(MonitoringOutcome {
            transaction_id: txn.transaction_id.clone(),
            firings,
            risk_indicators,
            max_severity,
            failed_rules,
        })
    }
}

/// Certain rule pairs firing together are a stronger signal than
/// either alone.
fn compound_firings(risk_indicators: &[String]) -> Vec<RuleFiring> {
    let fired = |name: &str| risk_indicators.iter().any(|i| i == name);
    let mut out = Vec::new();

    if fired(NAME_LARGE_CASH) && fired(NAME_ROUND_AMOUNT) {
        out.push(RuleFiring {
            rule_id: RULE_COMBO_CASH_ROUND,
            rule_name: "Pattern Combination - Cash + Round",
            alert_type: "pattern_combination",
            title: "High Risk Pattern Combination".to_string(),
            description: "Large cash transaction with round amount - potential money \
                          laundering indicator"
                .to_string(),
            severity: AlertSeverity::Critical,
            score: 95.0,
            details: serde_json::json!({
                "patterns": [NAME_LARGE_CASH, NAME_ROUND_AMOUNT],
            }),
        });
    }

    if fired(NAME_STRUCTURING) && fired(NAME_VELOCITY) {
        out.push(RuleFiring {
            rule_id: RULE_COMBO_STRUCTURING_VELOCITY,
            rule_name: "Pattern Combination - Structuring + Velocity",
            alert_type: "pattern_combination",
            title: "Potential Structuring Scheme".to_string(),
            description: "Multiple structured transactions with rapid movement - high risk \
                          of intentional structuring"
                .to_string(),
            severity: AlertSeverity::Critical,
            score: 98.0,
            details: serde_json::json!({
                "patterns": [NAME_STRUCTURING, NAME_VELOCITY],
            }),
        });
    }

    out
}
