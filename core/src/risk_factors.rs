//! Small numeric helpers shared by the scoring, monitoring, and
//! pattern layers. Timestamps are unix seconds throughout.

use chrono::{DateTime, Datelike, Timelike, Weekday};

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Float-safe modulo epsilon. Amounts arrive as f64 and 9000.0 must
/// count as divisible by 1000 even after arithmetic drift.
const ROUND_EPSILON: f64 = 1e-9;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n, not n-1).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// True when `amount` divides evenly by `divisor` within epsilon.
pub fn is_round_amount(amount: f64, divisor: f64) -> bool {
    if divisor <= 0.0 {
        return false;
    }
    let rem = (amount % divisor).abs();
    rem < ROUND_EPSILON || (divisor - rem) < ROUND_EPSILON
}

/// True when `amount` sits just under `threshold`: within `margin`
/// below it but not at or over it.
pub fn is_near_threshold(amount: f64, threshold: f64, margin: f64) -> bool {
    amount >= threshold - margin && amount < threshold
}

/// Calendar day index of a timestamp (days since the unix epoch).
pub fn day_of(ts: i64) -> i64 {
    ts.div_euclid(SECONDS_PER_DAY)
}

/// UTC hour of day, 0-23.
pub fn hour_of(ts: i64) -> u32 {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.hour(),
        None => 0,
    }
}

/// True for Saturday and Sunday in UTC.
pub fn is_weekend(ts: i64) -> bool {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => matches!(dt.weekday(), Weekday::Sat | Weekday::Sun),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_amount_tolerates_float_drift() {
        assert!(is_round_amount(9000.0, 1000.0));
        assert!(is_round_amount(9000.0 + 1e-10, 1000.0));
        assert!(is_round_amount(9000.0 - 1e-10, 1000.0));
        assert!(!is_round_amount(9050.0, 1000.0));
        assert!(!is_round_amount(9000.0, 0.0));
    }

    #[test]
    fn near_threshold_band_is_half_open() {
        assert!(is_near_threshold(9500.0, 10_000.0, 500.0));
        assert!(is_near_threshold(9999.99, 10_000.0, 500.0));
        assert!(!is_near_threshold(10_000.0, 10_000.0, 500.0));
        assert!(!is_near_threshold(9499.99, 10_000.0, 500.0));
    }

    #[test]
    fn day_of_floors_toward_negative_infinity() {
        assert_eq!(day_of(0), 0);
        assert_eq!(day_of(86_399), 0);
        assert_eq!(day_of(86_400), 1);
        assert_eq!(day_of(-1), -1);
    }

    #[test]
    fn population_std_of_constant_series_is_zero() {
        let values = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(population_std(&values), 0.0);
        assert!(population_std(&[]) == 0.0);
    }

    #[test]
    fn hour_and_weekend_follow_utc() {
        // 2024-01-06 03:30:00 UTC was a Saturday.
        let ts = 1_704_511_800;
        assert_eq!(hour_of(ts), 3);
        assert!(is_weekend(ts));
        // Two days later, a Monday.
        assert!(!is_weekend(ts + 2 * SECONDS_PER_DAY));
    }
}
