//! Engine configuration: scoring weights, rule thresholds, detector
//! parameters, workflow cadences, screening thresholds.
//!
//! Defaults encode the documented model constants; `load()` overlays a
//! JSON file section by section so deployments only specify what they
//! tune.

use crate::types::AlertSeverity;
use serde::{Deserialize, Serialize};

// ── Customer & transaction scoring ─────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorWeights {
    pub geographic: f64,
    pub product: f64,
    pub channel: f64,
    pub customer_type: f64,
    pub transaction: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            geographic: 0.25,
            product: 0.15,
            channel: 0.15,
            customer_type: 0.20,
            transaction: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub factor_weights: FactorWeights,
    pub high_risk_countries: Vec<String>,
    pub high_risk_businesses: Vec<String>,
    /// Customer behaviour window, days.
    pub history_window_days: i64,
    pub review_days_critical: i64,
    pub review_days_high: i64,
    pub review_days_medium: i64,
    pub review_days_low: i64,
    /// Rule/ML blend. Fixed by convention, not a discovered optimum.
    pub ml_blend_rule_weight: f64,
    pub ml_blend_ml_weight: f64,
    /// final_score above this marks the transaction high risk.
    pub high_risk_threshold: f64,
    /// final_score above this queues the transaction for review.
    pub review_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            factor_weights: FactorWeights::default(),
            high_risk_countries: str_vec(&[
                "IR", "KP", "SY", "YE", "AF", "MM", "LA", "VU", "GN", "GW",
            ]),
            high_risk_businesses: str_vec(&[
                "money_services",
                "cryptocurrency",
                "gambling",
                "precious_metals",
                "arms_dealing",
                "marijuana",
                "shell_company",
            ]),
            history_window_days: 90,
            review_days_critical: 30,
            review_days_high: 90,
            review_days_medium: 180,
            review_days_low: 365,
            ml_blend_rule_weight: 0.6,
            ml_blend_ml_weight: 0.4,
            high_risk_threshold: 70.0,
            review_threshold: 60.0,
        }
    }
}

impl ScoringConfig {
    pub fn review_days(&self, level: crate::types::RiskLevel) -> i64 {
        use crate::types::RiskLevel;
        match level {
            RiskLevel::Critical => self.review_days_critical,
            RiskLevel::High => self.review_days_high,
            RiskLevel::Medium => self.review_days_medium,
            RiskLevel::Low => self.review_days_low,
        }
    }
}

// ── Per-transaction monitoring rules ───────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// R001: large cash/deposit/withdrawal floor.
    pub amount_threshold: f64,
    /// R002: rolling window, required count, sum floor.
    pub velocity_window_hours: i64,
    pub velocity_count: i64,
    pub velocity_amount_floor: f64,
    /// R003: reporting threshold and just-under margin.
    pub structuring_threshold: f64,
    pub structuring_margin: f64,
    pub structuring_window_hours: i64,
    /// R004: monitoring keeps its own (shorter) country list.
    pub high_risk_countries: Vec<String>,
    /// R005: hours of day considered risky.
    pub risky_hours: Vec<u32>,
    /// R006: divisor and floor for round-amount hits.
    pub round_amount_divisor: f64,
    pub round_amount_floor: f64,
    /// R007: dormancy gap and reactivation floor.
    pub dormancy_days: i64,
    pub dormancy_amount_floor: f64,
    /// CTR drafting for cash hits on R001.
    pub ctr_filing_deadline_days: i64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            amount_threshold: 10_000.0,
            velocity_window_hours: 24,
            velocity_count: 5,
            velocity_amount_floor: 5_000.0,
            structuring_threshold: 10_000.0,
            structuring_margin: 500.0,
            structuring_window_hours: 24,
            high_risk_countries: str_vec(&["IR", "KP", "SY", "YE", "AF", "MM"]),
            risky_hours: vec![2, 3, 4, 5],
            round_amount_divisor: 1_000.0,
            round_amount_floor: 5_000.0,
            dormancy_days: 180,
            dormancy_amount_floor: 5_000.0,
            ctr_filing_deadline_days: 15,
        }
    }
}

// ── Batch pattern analysis ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub window_days: i64,
    /// Structuring band [low, high) and flag counts.
    pub structuring_band_low: f64,
    pub structuring_band_high: f64,
    pub structuring_daily_count: i64,
    pub structuring_window_count: i64,
    pub layering_min_transfers: i64,
    pub layering_min_counterparties: i64,
    pub layering_span_hours: f64,
    pub round_divisors: Vec<f64>,
    pub round_min_amount: f64,
    pub round_min_sample: i64,
    pub round_ratio_threshold: f64,
    pub velocity_min_days: i64,
    pub velocity_z_threshold: f64,
    pub dormancy_min_gap_days: i64,
    pub dormancy_min_recent_count: i64,
    pub dormancy_min_recent_volume: f64,
    /// How far back the dormancy probe looks for prior activity.
    pub dormancy_history_days: i64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            structuring_band_low: 9_000.0,
            structuring_band_high: 10_000.0,
            structuring_daily_count: 2,
            structuring_window_count: 5,
            layering_min_transfers: 5,
            layering_min_counterparties: 3,
            layering_span_hours: 24.0,
            round_divisors: vec![1_000.0, 5_000.0, 10_000.0],
            round_min_amount: 1_000.0,
            round_min_sample: 10,
            round_ratio_threshold: 0.6,
            velocity_min_days: 7,
            velocity_z_threshold: 3.0,
            dormancy_min_gap_days: 90,
            dormancy_min_recent_count: 5,
            dormancy_min_recent_volume: 10_000.0,
            dormancy_history_days: 365,
        }
    }
}

// ── Alert / case workflow ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub due_days_critical: i64,
    pub due_days_high: i64,
    pub due_days_medium: i64,
    pub due_days_low: i64,
    /// Alerts at or above this severity open a case automatically.
    pub auto_case_min_severity: AlertSeverity,
    /// Pattern matches below this risk score stay advisory (no alert).
    pub pattern_alert_min_risk: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            due_days_critical: 1,
            due_days_high: 3,
            due_days_medium: 7,
            due_days_low: 14,
            auto_case_min_severity: AlertSeverity::Critical,
            pattern_alert_min_risk: 60.0,
        }
    }
}

impl WorkflowConfig {
    pub fn due_days(&self, priority: crate::types::CasePriority) -> i64 {
        use crate::types::CasePriority;
        match priority {
            CasePriority::Critical => self.due_days_critical,
            CasePriority::High => self.due_days_high,
            CasePriority::Medium => self.due_days_medium,
            CasePriority::Low => self.due_days_low,
        }
    }
}

// ── Watchlist screening ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Similarity ratio above this records a hit.
    pub match_threshold: f64,
    /// Hits at or above this are confirmed matches.
    pub confirm_threshold: f64,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.85,
            confirm_threshold: 0.95,
        }
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AmlConfig {
    pub scoring: ScoringConfig,
    pub monitoring: MonitoringConfig,
    pub patterns: PatternConfig,
    pub workflow: WorkflowConfig,
    pub screening: ScreeningConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct AmlConfigFile {
    #[serde(default)]
    scoring: ScoringConfig,
    #[serde(default)]
    monitoring: MonitoringConfig,
    #[serde(default)]
    patterns: PatternConfig,
    #[serde(default)]
    workflow: WorkflowConfig,
    #[serde(default)]
    screening: ScreeningConfig,
}

impl AmlConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: AmlConfigFile = serde_json::from_str(&content)?;
        Ok(Self {
            scoring: file.scoring,
            monitoring: file.monitoring,
            patterns: file.patterns,
            workflow: file.workflow,
            screening: file.screening,
        })
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
