//! Per-transaction risk scoring.
//!
//! Six weighted signals build a 0-100 rule score:
//!   amount 20, velocity 15, pattern 15, geography 25, counterparty 15,
//!   timing 10.
//! Signals above the tag threshold contribute a named factor to the
//! persisted rationale. When a model is plugged in, its 0-1 output is
//! scaled to 0-100 and blended with the rule score; otherwise the rule
//! score stands alone. Writes go through the version guard so stale
//! re-scores lose instead of clobbering newer results.

use crate::config::ScoringConfig;
use crate::error::AmlResult;
use crate::ml::{MlScorer, TransactionFeatures};
use crate::risk_factors::{self, SECONDS_PER_HOUR};
use crate::store::{AmlStore, ScoreUpdate, TransactionRow};

const AMOUNT_WEIGHT: f64 = 20.0;
const VELOCITY_WEIGHT: f64 = 15.0;
const PATTERN_WEIGHT: f64 = 15.0;
const GEOGRAPHY_WEIGHT: f64 = 25.0;
const COUNTERPARTY_WEIGHT: f64 = 15.0;
const TIMING_WEIGHT: f64 = 10.0;

/// Signals strictly above this contribute a named factor.
const FACTOR_TAG_THRESHOLD: f64 = 0.7;
/// Velocity signal window.
const VELOCITY_WINDOW_HOURS: i64 = 24;
/// Amounts in this inclusive band look deliberately sub-threshold.
const STRUCTURED_LOW: f64 = 9_900.0;
const STRUCTURED_HIGH: f64 = 9_999.0;

#[derive(Debug, Clone)]
pub struct TransactionScore {
    pub transaction_id: String,
    pub risk_score: f64,
    pub rule_score: f64,
    pub ml_score: Option<f64>,
    pub factors: Vec<String>,
    pub is_high_risk: bool,
    pub requires_review: bool,
    pub is_structured: bool,
}

pub struct TransactionScorer {
    config: ScoringConfig,
}

impl TransactionScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a transaction and persist the result under its current
    /// score version.
    pub fn score(
        &self,
        store: &AmlStore,
        txn: &TransactionRow,
        ml: Option<&dyn MlScorer>,
    ) -> AmlResult<TransactionScore> {
        let mut factors = Vec::new();
        let mut tag = |name: &str, signal: f64| {
            if signal > FACTOR_TAG_THRESHOLD {
                factors.push(name.to_string());
            }
        };

        let amount_signal = amount_signal(txn.amount);
        tag("high_amount", amount_signal);

        let velocity_signal = self.velocity_signal(store, txn)?;
        tag("high_velocity", velocity_signal);

        let (pattern_signal, is_structured) = pattern_signal(txn.amount);
        tag("unusual_pattern", pattern_signal);

        let geography_signal = self.geography_signal(txn);
        tag("high_risk_geography", geography_signal);

        let counterparty_signal = counterparty_signal(txn);
        tag("high_risk_counterparty", counterparty_signal);

        let timing_signal = timing_signal(txn.occurred_at);
        tag("unusual_timing", timing_signal);

        let rule_score = amount_signal * AMOUNT_WEIGHT
            + velocity_signal * VELOCITY_WEIGHT
            + pattern_signal * PATTERN_WEIGHT
            + geography_signal * GEOGRAPHY_WEIGHT
            + counterparty_signal * COUNTERPARTY_WEIGHT
            + timing_signal * TIMING_WEIGHT;

        let ml_score = ml.map(|scorer| {
            let features = TransactionFeatures::extract(
                txn.amount,
                txn.occurred_at,
                txn.is_cash,
                txn.origin_country.as_deref(),
                txn.destination_country.as_deref(),
                geography_signal > 0.0,
            );
            scorer.score(&features) * 100.0
        });
        let risk_score = match ml_score {
            Some(m) => {
                rule_score * self.config.ml_blend_rule_weight + m * self.config.ml_blend_ml_weight
            }
            None => rule_score,
        };

        let is_high_risk = risk_score > self.config.high_risk_threshold;
        let requires_review = risk_score > self.config.review_threshold;

        let rationale = serde_json::json!({
            "factors": factors,
            "components": {
                "amount": amount_signal,
                "velocity": velocity_signal,
                "pattern": pattern_signal,
                "geography": geography_signal,
                "counterparty": counterparty_signal,
                "timing": timing_signal,
            },
        });
        store.apply_score(
            &txn.transaction_id,
            txn.score_version,
            &ScoreUpdate {
                risk_score,
                rule_score,
                ml_score,
                risk_factors: rationale.to_string(),
                is_high_risk,
                requires_review,
                exceeds_threshold: txn.exceeds_threshold,
                is_structured,
            },
        )?;

        if is_high_risk {
            log::warn!(
                "transaction {} scored {:.1} (rule {:.1}), flagged high risk: {:?}",
                txn.transaction_id,
                risk_score,
                rule_score,
                factors
            );
        } else {
            log::debug!(
                "transaction {} scored {:.1} (rule {:.1})",
                txn.transaction_id,
                risk_score,
                rule_score
            );
        }

        Ok(TransactionScore {
            transaction_id: txn.transaction_id.clone(),
            risk_score,
            rule_score,
            ml_score,
            factors,
            is_high_risk,
            requires_review,
            is_structured,
        })
    }

    /// Transactions in the trailing 24h including this one, stepped to
    /// a 0-1 signal.
    fn velocity_signal(&self, store: &AmlStore, txn: &TransactionRow) -> AmlResult<f64> {
        let since = txn.occurred_at - VELOCITY_WINDOW_HOURS * SECONDS_PER_HOUR;
        let (others, _) = store.window_stats_excluding(
            &txn.customer_id,
            since,
            txn.occurred_at,
            &txn.transaction_id,
        )?;
        let recent_count = others + 1;
        Ok(if recent_count > 10 {
            1.0
        } else if recent_count > 5 {
            0.7
        } else {
            recent_count as f64 / 10.0
        })
    }

    /// Destination outranks origin outranks counterparty country.
    fn geography_signal(&self, txn: &TransactionRow) -> f64 {
        if self.in_high_risk_list(txn.destination_country.as_deref()) {
            1.0
        } else if self.in_high_risk_list(txn.origin_country.as_deref()) {
            0.8
        } else if self.in_high_risk_list(txn.counterparty_country.as_deref()) {
            0.7
        } else {
            0.0
        }
    }

    fn in_high_risk_list(&self, country: Option<&str>) -> bool {
        match country {
            Some(c) => self
                .config
                .high_risk_countries
                .iter()
                .any(|h| h.eq_ignore_ascii_case(c)),
            None => false,
        }
    }
}

fn amount_signal(amount: f64) -> f64 {
    if amount >= 50_000.0 {
        1.0
    } else if amount >= 10_000.0 {
        0.7
    } else if amount >= 5_000.0 {
        0.5
    } else {
        amount / 10_000.0
    }
}

fn pattern_signal(amount: f64) -> (f64, bool) {
    let mut signal: f64 = 0.0;
    if risk_factors::is_round_amount(amount, 1_000.0) {
        signal += 0.3;
    }
    let is_structured = (STRUCTURED_LOW..=STRUCTURED_HIGH).contains(&amount);
    if is_structured {
        signal += 0.5;
    }
    (signal.min(1.0), is_structured)
}

fn counterparty_signal(txn: &TransactionRow) -> f64 {
    // Unknown counterparties are riskier than named ones.
    match txn.counterparty_name.as_deref() {
        Some(name) if !name.is_empty() => 0.3,
        _ => 0.5,
    }
}

fn timing_signal(occurred_at: i64) -> f64 {
    let hour = risk_factors::hour_of(occurred_at);
    if (2..=5).contains(&hour) {
        0.7
    } else if hour >= 22 || hour <= 6 {
        0.5
    } else if risk_factors::is_weekend(occurred_at) {
        0.4
    } else {
        0.2
    }
}
