//! Historical pattern analysis.
//!
//! Runs over a trailing window per customer and finds aggregate
//! behaviour no single-transaction rule can see:
//!   structuring           repeated just-under-threshold amounts
//!   layering              funds fanned through many counterparties
//!   round amounts         an implausible share of round figures
//!   velocity anomaly      a day whose activity is a 3-sigma outlier
//!   dormant reactivation  a long-idle account suddenly busy
//!
//! A scan never aborts on a bad customer: failures are collected and
//! the remaining customers still run. An optional deadline bounds the
//! whole sweep; whatever was found by then is returned.

use std::collections::{BTreeMap, BTreeSet};

use crate::clock::EngineClock;
use crate::config::PatternConfig;
use crate::error::AmlResult;
use crate::risk_factors::{self, SECONDS_PER_DAY};
use crate::store::{AmlStore, TransactionRow};
use crate::types::PatternType;

/// Matches above this risk score mark the customer high risk in the
/// scan summary.
const HIGH_RISK_CUTOFF: f64 = 80.0;

#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub customer_id: String,
    pub pattern_type: PatternType,
    /// Detector confidence, 0-1.
    pub confidence: f64,
    /// Severity of the behaviour, 0-100.
    pub risk_score: f64,
    pub description: String,
    pub details: serde_json::Value,
    pub transactions_involved: Vec<String>,
    pub window_start: i64,
    pub window_end: i64,
    pub detected_at: i64,
}

#[derive(Debug, Clone)]
pub struct ScanError {
    pub customer_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct HighRiskCustomer {
    pub customer_id: String,
    pub pattern_type: PatternType,
    pub risk_score: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub total_patterns: usize,
    pub by_type: Vec<(PatternType, usize)>,
    pub high_risk_customers: Vec<HighRiskCustomer>,
    pub avg_confidence: f64,
    pub avg_risk_score: f64,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub matches: Vec<PatternMatch>,
    pub errors: Vec<ScanError>,
    pub customers_scanned: usize,
    pub customers_total: usize,
    pub deadline_hit: bool,
    pub summary: ScanSummary,
}

pub struct PatternAnalyzer {
    config: PatternConfig,
}

impl PatternAnalyzer {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    /// Sweep every customer with window activity. Matches come back
    /// sorted by risk, worst first.
    pub fn scan(
        &self,
        store: &AmlStore,
        clock: &EngineClock,
        deadline: Option<i64>,
    ) -> AmlResult<ScanOutcome> {
        let now = clock.now_ts();
        let window_start = now - self.config.window_days * SECONDS_PER_DAY;
        let customers = store.customer_ids_with_activity(window_start, now)?;
        let customers_total = customers.len();

        let mut matches = Vec::new();
        let mut errors = Vec::new();
        let mut customers_scanned = 0usize;
        let mut deadline_hit = false;

        for customer_id in customers {
            if let Some(d) = deadline {
                if clock.now_ts() > d {
                    deadline_hit = true;
                    log::warn!(
                        "pattern scan deadline passed after {customers_scanned} of \
                         {customers_total} customers"
                    );
                    break;
                }
            }
            match self.scan_customer(store, &customer_id, now) {
                Ok(mut found) => matches.append(&mut found),
                Err(e) => {
                    log::error!("pattern scan failed for customer {customer_id}: {e}");
                    errors.push(ScanError {
                        customer_id,
                        message: e.to_string(),
                    });
                }
            }
            customers_scanned += 1;
        }

        matches.sort_by(|a, b| {
            b.risk_score
                .partial_cmp(&a.risk_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        let summary = summarize(&matches);
        log::info!(
            "pattern scan: {} matches across {} of {} customers ({} errors)",
            matches.len(),
            customers_scanned,
            customers_total,
            errors.len()
        );

        Ok(ScanOutcome {
            matches,
            errors,
            customers_scanned,
            customers_total,
            deadline_hit,
            summary,
        })
    }

    /// Run every detector for one customer over the trailing window.
    pub fn scan_customer(
        &self,
        store: &AmlStore,
        customer_id: &str,
        now: i64,
    ) -> AmlResult<Vec<PatternMatch>> {
        let window_start = now - self.config.window_days * SECONDS_PER_DAY;
        let txns = store.transactions_in_window(customer_id, window_start, now)?;

        let mut out = Vec::new();
        if let Some(m) = self.detect_structuring(customer_id, &txns, window_start, now) {
            out.push(m);
        }
        if let Some(m) = self.detect_layering(customer_id, &txns, window_start, now) {
            out.push(m);
        }
        if let Some(m) = self.detect_round_amounts(customer_id, &txns, window_start, now) {
            out.push(m);
        }
        out.extend(self.detect_velocity(customer_id, &txns, window_start, now));
        if let Some(m) = self.detect_dormant(store, customer_id, &txns, window_start, now)? {
            out.push(m);
        }
        Ok(out)
    }

    /// Repeated amounts in the sub-threshold band. Flags one heavy day
    /// or a heavy window.
    fn detect_structuring(
        &self,
        customer_id: &str,
        txns: &[TransactionRow],
        window_start: i64,
        now: i64,
    ) -> Option<PatternMatch> {
        let low = self.config.structuring_band_low;
        let high = self.config.structuring_band_high;
        let band: Vec<&TransactionRow> =
            txns.iter().filter(|t| (low..high).contains(&t.amount)).collect();
        if band.is_empty() {
            return None;
        }

        let mut per_day: BTreeMap<i64, i64> = BTreeMap::new();
        for t in &band {
            *per_day.entry(risk_factors::day_of(t.occurred_at)).or_insert(0) += 1;
        }
        let pattern_days = per_day
            .values()
            .filter(|&&c| c >= self.config.structuring_daily_count)
            .count() as i64;
        let count = band.len() as i64;
        if pattern_days < 1 && count < self.config.structuring_window_count {
            return None;
        }

        let cumulative: f64 = band.iter().map(|t| t.amount).sum();
        let confidence = (0.15 * count as f64 + 0.10 * pattern_days as f64).min(0.95);
        let risk_score = (8.0 * count as f64 + 5.0 * pattern_days as f64).min(100.0);
        let avg_per_day = if pattern_days > 0 {
            count as f64 / pattern_days as f64
        } else {
            0.0
        };

        Some(PatternMatch {
            customer_id: customer_id.to_string(),
            pattern_type: PatternType::Structuring,
            confidence,
            risk_score,
            description: format!(
                "{count} sub-threshold transactions across {pattern_days} pattern days \
                 totaling {cumulative:.2}"
            ),
            details: serde_json::json!({
                "pattern_days": pattern_days,
                "total_transactions": count,
                "cumulative_amount": cumulative,
                "avg_per_day": avg_per_day,
            }),
            transactions_involved: band.iter().map(|t| t.transaction_id.clone()).collect(),
            window_start,
            window_end: now,
            detected_at: now,
        })
    }

    /// Many transfers through distinct counterparties in a tight span.
    fn detect_layering(
        &self,
        customer_id: &str,
        txns: &[TransactionRow],
        window_start: i64,
        now: i64,
    ) -> Option<PatternMatch> {
        let transfers: Vec<&TransactionRow> = txns
            .iter()
            .filter(|t| {
                t.transaction_type.is_transfer_like()
                    && t.counterparty_account.as_deref().is_some_and(|a| !a.is_empty())
            })
            .collect();
        if (transfers.len() as i64) < self.config.layering_min_transfers {
            return None;
        }

        // Input is time-ordered, so span is last minus first.
        let span_seconds = transfers.last()?.occurred_at - transfers.first()?.occurred_at;
        let span_hours = span_seconds as f64 / 3_600.0;
        if span_hours > self.config.layering_span_hours {
            return None;
        }
        let unique: BTreeSet<&str> = transfers
            .iter()
            .filter_map(|t| t.counterparty_account.as_deref())
            .collect();
        if (unique.len() as i64) < self.config.layering_min_counterparties {
            return None;
        }

        let count = transfers.len() as f64;
        let velocity = if span_hours > 0.0 { count / span_hours } else { count };
        let counterparties = unique.len() as f64;
        let confidence = (0.1 * velocity + 0.1 * counterparties).min(0.95);
        let risk_score = (10.0 * velocity + 5.0 * counterparties).min(100.0);
        let total_amount: f64 = transfers.iter().map(|t| t.amount).sum();

        Some(PatternMatch {
            customer_id: customer_id.to_string(),
            pattern_type: PatternType::Layering,
            confidence,
            risk_score,
            description: format!(
                "{} transfers through {} counterparties within {span_hours:.1} hours",
                transfers.len(),
                unique.len()
            ),
            details: serde_json::json!({
                "transfer_count": transfers.len(),
                "unique_counterparties": unique.len(),
                "total_amount": total_amount,
                "time_span_hours": span_hours,
                "velocity_per_hour": velocity,
            }),
            transactions_involved: transfers.iter().map(|t| t.transaction_id.clone()).collect(),
            window_start,
            window_end: now,
            detected_at: now,
        })
    }

    /// Share of round figures among significant amounts. A transaction
    /// divisible by several units still counts once.
    fn detect_round_amounts(
        &self,
        customer_id: &str,
        txns: &[TransactionRow],
        window_start: i64,
        now: i64,
    ) -> Option<PatternMatch> {
        let significant: Vec<&TransactionRow> = txns
            .iter()
            .filter(|t| t.amount >= self.config.round_min_amount)
            .collect();
        if (significant.len() as i64) < self.config.round_min_sample {
            return None;
        }

        let mut by_divisor: Vec<(f64, i64)> =
            self.config.round_divisors.iter().map(|d| (*d, 0)).collect();
        let mut round_ids = Vec::new();
        for t in &significant {
            let mut any = false;
            for (divisor, count) in by_divisor.iter_mut() {
                if risk_factors::is_round_amount(t.amount, *divisor) {
                    *count += 1;
                    any = true;
                }
            }
            if any {
                round_ids.push(t.transaction_id.clone());
            }
        }

        let total = significant.len() as f64;
        let round_count = round_ids.len() as f64;
        let ratio = round_count / total;
        if ratio <= self.config.round_ratio_threshold {
            return None;
        }

        let confidence = ratio.min(0.85);
        let risk_score = (100.0 * ratio).min(100.0);
        let divisor_counts: serde_json::Map<String, serde_json::Value> = by_divisor
            .iter()
            .map(|(d, c)| (format!("{}", *d as i64), serde_json::json!(c)))
            .collect();

        Some(PatternMatch {
            customer_id: customer_id.to_string(),
            pattern_type: PatternType::RoundAmounts,
            confidence,
            risk_score,
            description: format!(
                "{} of {} transactions are round amounts (ratio {ratio:.2})",
                round_ids.len(),
                significant.len()
            ),
            details: serde_json::json!({
                "total_transactions": significant.len(),
                "round_transactions": round_ids.len(),
                "round_ratio": ratio,
                "by_divisor": divisor_counts,
            }),
            transactions_involved: round_ids,
            window_start,
            window_end: now,
            detected_at: now,
        })
    }

    /// Daily-count z-score outliers. One match per anomalous day.
    fn detect_velocity(
        &self,
        customer_id: &str,
        txns: &[TransactionRow],
        window_start: i64,
        now: i64,
    ) -> Vec<PatternMatch> {
        let mut per_day: BTreeMap<i64, (i64, f64, Vec<String>)> = BTreeMap::new();
        for t in txns {
            let entry = per_day
                .entry(risk_factors::day_of(t.occurred_at))
                .or_insert((0, 0.0, Vec::new()));
            entry.0 += 1;
            entry.1 += t.amount;
            entry.2.push(t.transaction_id.clone());
        }
        // Only days with activity enter the baseline; quiet days do not
        // drag the mean toward zero.
        if (per_day.len() as i64) < self.config.velocity_min_days {
            return Vec::new();
        }
        let counts: Vec<f64> = per_day.values().map(|(c, _, _)| *c as f64).collect();
        let avg = risk_factors::mean(&counts);
        let std = risk_factors::population_std(&counts);
        if std <= 0.0 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for (day, (count, volume, ids)) in &per_day {
            let z = (*count as f64 - avg) / std;
            if z.abs() <= self.config.velocity_z_threshold {
                continue;
            }
            let anomaly = z.abs();
            out.push(PatternMatch {
                customer_id: customer_id.to_string(),
                pattern_type: PatternType::VelocityAnomaly,
                confidence: (anomaly / 10.0).min(0.90),
                risk_score: (anomaly * 15.0).min(100.0),
                description: format!(
                    "Daily transaction count {count} deviates {anomaly:.1} sigma from the \
                     customer's mean of {avg:.1}"
                ),
                details: serde_json::json!({
                    "anomaly_day": day,
                    "daily_count": count,
                    "daily_volume": volume,
                    "avg_daily_count": avg,
                    "anomaly_z_score": anomaly,
                }),
                transactions_involved: ids.clone(),
                window_start,
                window_end: now,
                detected_at: now,
            });
        }
        out
    }

    /// Fresh activity after a long gap. Needs prior history inside the
    /// lookback horizon, so brand-new customers never fire.
    fn detect_dormant(
        &self,
        store: &AmlStore,
        customer_id: &str,
        recent: &[TransactionRow],
        window_start: i64,
        now: i64,
    ) -> AmlResult<Option<PatternMatch>> {
        if recent.is_empty() {
            return Ok(None);
        }
        let recent_count = recent.len() as i64;
        let recent_volume: f64 = recent.iter().map(|t| t.amount).sum();
        if recent_count < self.config.dormancy_min_recent_count
            || recent_volume < self.config.dormancy_min_recent_volume
        {
            return Ok(None);
        }

        let history_start = now - self.config.dormancy_history_days * SECONDS_PER_DAY;
        let last_historical =
            match store.last_transaction_in_range(customer_id, history_start, window_start)? {
                Some(t) => t,
                None => return Ok(None),
            };
        let first_recent = match recent.first() {
            Some(t) => t,
            None => return Ok(None),
        };
        let dormant_days = risk_factors::day_of(first_recent.occurred_at)
            - risk_factors::day_of(last_historical.occurred_at);
        if dormant_days < self.config.dormancy_min_gap_days {
            return Ok(None);
        }

        let confidence =
            (dormant_days as f64 / 365.0 + recent_volume / 100_000.0).min(0.85);
        let risk_score = (dormant_days as f64 / 10.0 + recent_volume / 10_000.0).min(100.0);

        Ok(Some(PatternMatch {
            customer_id: customer_id.to_string(),
            pattern_type: PatternType::DormantReactivation,
            confidence,
            risk_score,
            description: format!(
                "Account dormant {dormant_days} days resumed with {recent_count} \
                 transactions totaling {recent_volume:.2}"
            ),
            details: serde_json::json!({
                "dormant_days": dormant_days,
                "recent_transaction_count": recent_count,
                "recent_volume": recent_volume,
            }),
            transactions_involved: recent.iter().map(|t| t.transaction_id.clone()).collect(),
            window_start,
            window_end: now,
            detected_at: now,
        }))
    }
}

fn summarize(matches: &[PatternMatch]) -> ScanSummary {
    if matches.is_empty() {
        return ScanSummary::default();
    }
    let mut by_type = Vec::new();
    for pt in PatternType::ALL {
        let count = matches.iter().filter(|m| m.pattern_type == pt).count();
        if count > 0 {
            by_type.push((pt, count));
        }
    }
    let high_risk_customers = matches
        .iter()
        .filter(|m| m.risk_score > HIGH_RISK_CUTOFF)
        .map(|m| HighRiskCustomer {
            customer_id: m.customer_id.clone(),
            pattern_type: m.pattern_type,
            risk_score: m.risk_score,
            confidence: m.confidence,
        })
        .collect();
    let n = matches.len() as f64;
    ScanSummary {
        total_patterns: matches.len(),
        by_type,
        high_risk_customers,
        avg_confidence: matches.iter().map(|m| m.confidence).sum::<f64>() / n,
        avg_risk_score: matches.iter().map(|m| m.risk_score).sum::<f64>() / n,
    }
}
