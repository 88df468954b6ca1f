//! Customer risk assessment.
//!
//! Five weighted factors produce a 0-100 composite:
//!   1. geographic     home country against the high-risk list, PEP uplift
//!   2. product        flat until product holdings are modeled
//!   3. channel        flat; all customers onboard remotely today
//!   4. customer type  corporate and high-risk business uplifts, KYC gaps
//!   5. transaction    behaviour over the trailing history window
//!
//! The composite maps to a risk tier which drives the periodic review
//! cadence. Assessments persist to the risk profile table in place.

use crate::config::ScoringConfig;
use crate::error::{AmlError, AmlResult};
use crate::risk_factors::{self, SECONDS_PER_DAY};
use crate::store::{AmlStore, CustomerRow, RiskProfileRow, TransactionRow};
use crate::types::{CustomerType, RiskLevel};

const NO_HISTORY_RISK: f64 = 20.0;
const BEHAVIOUR_BASE_RISK: f64 = 30.0;
const HIGH_AVG_AMOUNT: f64 = 10_000.0;
const HIGH_ALERT_COUNT: i64 = 10;

/// One completed assessment, as returned to callers. The persisted
/// profile carries the same numbers minus the indicator strings.
#[derive(Debug, Clone)]
pub struct CustomerAssessment {
    pub customer_id: String,
    pub geographic_risk: f64,
    pub product_risk: f64,
    pub channel_risk: f64,
    pub customer_type_risk: f64,
    pub transaction_risk: f64,
    pub composite_score: f64,
    pub risk_level: RiskLevel,
    pub indicators: Vec<String>,
    pub next_review_at: i64,
}

pub struct CustomerScorer {
    config: ScoringConfig,
}

impl CustomerScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score one customer and persist the result. Workflow counters on
    /// an existing profile (STR/alert/false-positive) carry over.
    pub fn assess(
        &self,
        store: &AmlStore,
        customer_id: &str,
        now: i64,
    ) -> AmlResult<CustomerAssessment> {
        let customer = store
            .get_customer(customer_id)?
            .ok_or_else(|| AmlError::not_found("customer", customer_id))?;

        let since = now - self.config.history_window_days * SECONDS_PER_DAY;
        let history = store.transactions_in_window(customer_id, since, now)?;

        let geographic = self.geographic_risk(&customer);
        let product = self.product_risk();
        let channel = self.channel_risk();
        let customer_type = self.customer_type_risk(&customer);
        let transaction = self.transaction_risk(&history);

        let w = &self.config.factor_weights;
        let composite = (geographic * w.geographic
            + product * w.product
            + channel * w.channel
            + customer_type * w.customer_type
            + transaction * w.transaction)
            .clamp(0.0, 100.0);
        let risk_level = RiskLevel::from_score(composite);

        let existing = store.get_risk_profile(customer_id)?;
        let (str_count, alert_count, false_positive_count) = existing
            .map(|p| (p.str_count, p.alert_count, p.false_positive_count))
            .unwrap_or((0, 0, 0));

        let next_review_at = now + self.config.review_days(risk_level) * SECONDS_PER_DAY;
        store.upsert_risk_profile(&RiskProfileRow {
            customer_id: customer_id.to_string(),
            geographic_risk: geographic,
            product_risk: product,
            channel_risk: channel,
            customer_type_risk: customer_type,
            transaction_risk: transaction,
            composite_score: composite,
            risk_level,
            str_count,
            alert_count,
            false_positive_count,
            last_review_at: Some(now),
            next_review_at: Some(next_review_at),
        })?;
        store.update_customer_risk(customer_id, composite, risk_level, now)?;

        let indicators = self.indicators(&customer, str_count, alert_count);
        log::debug!(
            "customer {} assessed at {:.1} ({})",
            customer_id,
            composite,
            risk_level.as_str()
        );

        Ok(CustomerAssessment {
            customer_id: customer_id.to_string(),
            geographic_risk: geographic,
            product_risk: product,
            channel_risk: channel,
            customer_type_risk: customer_type,
            transaction_risk: transaction,
            composite_score: composite,
            risk_level,
            indicators,
            next_review_at,
        })
    }

    fn geographic_risk(&self, customer: &CustomerRow) -> f64 {
        let mut score: f64 = match customer.country.as_deref() {
            Some(c) if self.is_high_risk_country(c) => 80.0,
            Some(c) if !c.is_empty() => 30.0,
            _ => 0.0,
        };
        if customer.is_pep {
            score = (score + 30.0).min(100.0);
        }
        score
    }

    // Flat until per-product holdings exist in the data model.
    fn product_risk(&self) -> f64 {
        40.0
    }

    fn channel_risk(&self) -> f64 {
        35.0
    }

    fn customer_type_risk(&self, customer: &CustomerRow) -> f64 {
        let mut score: f64 = 30.0;
        if customer.customer_type == CustomerType::Corporate {
            score = 50.0;
            if self.is_high_risk_business(customer.occupation.as_deref()) {
                score = 80.0;
            }
        }
        if !customer.kyc_status.is_complete() {
            score = (score + 20.0).min(100.0);
        }
        score
    }

    fn transaction_risk(&self, history: &[TransactionRow]) -> f64 {
        if history.is_empty() {
            // New relationship: nothing observed yet is mildly risky.
            return NO_HISTORY_RISK;
        }
        let amounts: Vec<f64> = history.iter().map(|t| t.amount).collect();
        let avg = risk_factors::mean(&amounts);
        let std = risk_factors::population_std(&amounts);
        let cash_ratio =
            history.iter().filter(|t| t.is_cash).count() as f64 / history.len() as f64;

        let mut score = BEHAVIOUR_BASE_RISK;
        if avg > HIGH_AVG_AMOUNT {
            score += 20.0;
        }
        if std > avg * 0.5 {
            score += 15.0;
        }
        if cash_ratio > 0.5 {
            score += 20.0;
        }
        score.min(100.0)
    }

    fn indicators(&self, customer: &CustomerRow, str_count: i64, alert_count: i64) -> Vec<String> {
        let mut out = Vec::new();
        if customer.is_pep {
            out.push("PEP".to_string());
        }
        if customer
            .country
            .as_deref()
            .is_some_and(|c| self.is_high_risk_country(c))
        {
            out.push("High Risk Country".to_string());
        }
        if customer.customer_type == CustomerType::Corporate
            && self.is_high_risk_business(customer.occupation.as_deref())
        {
            out.push("High Risk Business".to_string());
        }
        if !customer.kyc_status.is_complete() {
            out.push("Incomplete KYC".to_string());
        }
        if str_count > 0 {
            out.push(format!("STR Filed ({str_count})"));
        }
        if alert_count > HIGH_ALERT_COUNT {
            out.push("High Alert Count".to_string());
        }
        out
    }

    fn is_high_risk_country(&self, country: &str) -> bool {
        self.config
            .high_risk_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
    }

    fn is_high_risk_business(&self, occupation: Option<&str>) -> bool {
        match occupation {
            Some(o) => self
                .config
                .high_risk_businesses
                .iter()
                .any(|b| b.eq_ignore_ascii_case(o)),
            None => false,
        }
    }
}
