//! Optional model-based anomaly score.
//!
//! The scoring pipeline treats the model as a black box behind
//! `MlScorer`: given extracted features it returns a 0-1 anomaly
//! probability, which the pipeline blends with the rule score. The
//! built-in `WeightedMlScorer` is a deterministic linear stand-in so
//! runs stay reproducible without a trained artifact.

use crate::risk_factors;

/// Features extracted from a transaction before scoring.
#[derive(Debug, Clone)]
pub struct TransactionFeatures {
    pub amount: f64,
    pub hour: u32,
    pub is_cash: bool,
    pub is_round_amount: bool,
    pub is_cross_border: bool,
    pub is_high_risk_country: bool,
}

impl TransactionFeatures {
    pub fn extract(
        amount: f64,
        occurred_at: i64,
        is_cash: bool,
        origin: Option<&str>,
        destination: Option<&str>,
        high_risk_country: bool,
    ) -> Self {
        let is_cross_border = match (origin, destination) {
            (Some(o), Some(d)) => !o.is_empty() && !d.is_empty() && o != d,
            _ => false,
        };
        Self {
            amount,
            hour: risk_factors::hour_of(occurred_at),
            is_cash,
            is_round_amount: risk_factors::is_round_amount(amount, 1_000.0),
            is_cross_border,
            is_high_risk_country: high_risk_country,
        }
    }
}

pub trait MlScorer {
    /// Anomaly probability in [0, 1].
    fn score(&self, features: &TransactionFeatures) -> f64;
}

/// Linear feature blend. Weights sum to 1 so the output needs no
/// squashing.
#[derive(Debug, Clone)]
pub struct WeightedMlScorer {
    pub amount_weight: f64,
    pub cash_weight: f64,
    pub round_weight: f64,
    pub cross_border_weight: f64,
    pub geography_weight: f64,
    pub night_weight: f64,
    /// Amounts at or above this saturate the amount feature.
    pub amount_ceiling: f64,
}

impl Default for WeightedMlScorer {
    fn default() -> Self {
        Self {
            amount_weight: 0.35,
            cash_weight: 0.15,
            round_weight: 0.15,
            cross_border_weight: 0.15,
            geography_weight: 0.15,
            night_weight: 0.05,
            amount_ceiling: 50_000.0,
        }
    }
}

impl MlScorer for WeightedMlScorer {
    fn score(&self, f: &TransactionFeatures) -> f64 {
        let amount_feature = if self.amount_ceiling > 0.0 {
            (f.amount / self.amount_ceiling).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let night = f.hour >= 22 || f.hour <= 6;

        let mut score = self.amount_weight * amount_feature;
        if f.is_cash {
            score += self.cash_weight;
        }
        if f.is_round_amount {
            score += self.round_weight;
        }
        if f.is_cross_border {
            score += self.cross_border_weight;
        }
        if f.is_high_risk_country {
            score += self.geography_weight;
        }
        if night {
            score += self.night_weight;
        }
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_scorer_stays_in_unit_interval() {
        let scorer = WeightedMlScorer::default();
        let hot = TransactionFeatures {
            amount: 1_000_000.0,
            hour: 3,
            is_cash: true,
            is_round_amount: true,
            is_cross_border: true,
            is_high_risk_country: true,
        };
        let cold = TransactionFeatures {
            amount: 12.5,
            hour: 14,
            is_cash: false,
            is_round_amount: false,
            is_cross_border: false,
            is_high_risk_country: false,
        };
        let high = scorer.score(&hot);
        let low = scorer.score(&cold);
        assert!((0.0..=1.0).contains(&high));
        assert!((0.0..=1.0).contains(&low));
        assert!(high > low);
    }

    #[test]
    fn cross_border_requires_distinct_countries() {
        let same = TransactionFeatures::extract(100.0, 0, false, Some("US"), Some("US"), false);
        let diff = TransactionFeatures::extract(100.0, 0, false, Some("US"), Some("GB"), false);
        let missing = TransactionFeatures::extract(100.0, 0, false, None, Some("GB"), false);
        assert!(!same.is_cross_border);
        assert!(diff.is_cross_border);
        assert!(!missing.is_cross_border);
    }
}
