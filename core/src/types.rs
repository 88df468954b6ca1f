//! Shared primitive types used across the entire engine.

use serde::{Deserialize, Serialize};

/// A stable, unique identifier for a customer.
pub type CustomerId = String;

/// A stable, unique identifier for a transaction.
pub type TransactionId = String;

/// A stable, unique identifier for an alert.
pub type AlertId = String;

/// A stable, unique identifier for a case.
pub type CaseId = String;

// ── Risk ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a composite 0-100 score to a tier. Monotonic by construction.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            RiskLevel::Critical
        } else if score >= 50.0 {
            RiskLevel::High
        } else if score >= 25.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

// ── Alerts ─────────────────────────────────────────────────────────

/// Ordered so that `max()` over a batch of firings yields the worst one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(AlertSeverity::Low),
            "medium" => Some(AlertSeverity::Medium),
            "high" => Some(AlertSeverity::High),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }

    /// Severity tier for detections that carry only a 0-100 score
    /// (pattern matches feeding the alert pipeline).
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            AlertSeverity::Critical
        } else if score >= 70.0 {
            AlertSeverity::High
        } else if score >= 50.0 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Investigating,
    Escalated,
    ClosedConfirmed,
    ClosedFalsePositive,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Escalated => "escalated",
            AlertStatus::ClosedConfirmed => "closed_confirmed",
            AlertStatus::ClosedFalsePositive => "closed_false_positive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(AlertStatus::Open),
            "investigating" => Some(AlertStatus::Investigating),
            "escalated" => Some(AlertStatus::Escalated),
            "closed_confirmed" => Some(AlertStatus::ClosedConfirmed),
            "closed_false_positive" => Some(AlertStatus::ClosedFalsePositive),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AlertStatus::ClosedConfirmed | AlertStatus::ClosedFalsePositive
        )
    }
}

// ── Cases ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    Investigating,
    PendingReview,
    Escalated,
    ClosedReported,
    ClosedNoAction,
    ClosedFalsePositive,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::Investigating => "investigating",
            CaseStatus::PendingReview => "pending_review",
            CaseStatus::Escalated => "escalated",
            CaseStatus::ClosedReported => "closed_reported",
            CaseStatus::ClosedNoAction => "closed_no_action",
            CaseStatus::ClosedFalsePositive => "closed_false_positive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(CaseStatus::Open),
            "investigating" => Some(CaseStatus::Investigating),
            "pending_review" => Some(CaseStatus::PendingReview),
            "escalated" => Some(CaseStatus::Escalated),
            "closed_reported" => Some(CaseStatus::ClosedReported),
            "closed_no_action" => Some(CaseStatus::ClosedNoAction),
            "closed_false_positive" => Some(CaseStatus::ClosedFalsePositive),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::ClosedReported
                | CaseStatus::ClosedNoAction
                | CaseStatus::ClosedFalsePositive
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl CasePriority {
    /// Case priority mirrors the severity of the seed alert.
    pub fn from_severity(severity: AlertSeverity) -> Self {
        match severity {
            AlertSeverity::Critical => CasePriority::Critical,
            AlertSeverity::High => CasePriority::High,
            AlertSeverity::Medium => CasePriority::Medium,
            AlertSeverity::Low => CasePriority::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CasePriority::Low => "low",
            CasePriority::Medium => "medium",
            CasePriority::High => "high",
            CasePriority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(CasePriority::Low),
            "medium" => Some(CasePriority::Medium),
            "high" => Some(CasePriority::High),
            "critical" => Some(CasePriority::Critical),
            _ => None,
        }
    }
}

// ── Transactions ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Wire,
    Check,
    Cash,
    Ach,
    Card,
    Other,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
            TransactionType::Wire => "wire",
            TransactionType::Check => "check",
            TransactionType::Cash => "cash",
            TransactionType::Ach => "ach",
            TransactionType::Card => "card",
            TransactionType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "transfer" => Some(TransactionType::Transfer),
            "wire" => Some(TransactionType::Wire),
            "check" => Some(TransactionType::Check),
            "cash" => Some(TransactionType::Cash),
            "ach" => Some(TransactionType::Ach),
            "card" => Some(TransactionType::Card),
            "other" => Some(TransactionType::Other),
            _ => None,
        }
    }

    /// Transfer-like types considered by the layering detector.
    pub fn is_transfer_like(&self) -> bool {
        matches!(self, TransactionType::Transfer | TransactionType::Wire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    Individual,
    Corporate,
    Government,
    NonProfit,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::Individual => "individual",
            CustomerType::Corporate => "corporate",
            CustomerType::Government => "government",
            CustomerType::NonProfit => "non_profit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "individual" => Some(CustomerType::Individual),
            "corporate" => Some(CustomerType::Corporate),
            "government" => Some(CustomerType::Government),
            "non_profit" => Some(CustomerType::NonProfit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Completed,
    Expired,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Completed => "completed",
            KycStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(KycStatus::Pending),
            "completed" => Some(KycStatus::Completed),
            "expired" => Some(KycStatus::Expired),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, KycStatus::Completed)
    }
}

// ── Patterns & screening ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Structuring,
    Layering,
    RoundAmounts,
    VelocityAnomaly,
    DormantReactivation,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Structuring => "structuring",
            PatternType::Layering => "layering",
            PatternType::RoundAmounts => "round_amounts",
            PatternType::VelocityAnomaly => "velocity_anomaly",
            PatternType::DormantReactivation => "dormant_reactivation",
        }
    }

    pub const ALL: [PatternType; 5] = [
        PatternType::Structuring,
        PatternType::Layering,
        PatternType::RoundAmounts,
        PatternType::VelocityAnomaly,
        PatternType::DormantReactivation,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    ConfirmedMatch,
    PossibleMatch,
    NoMatch,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::ConfirmedMatch => "confirmed_match",
            MatchStatus::PossibleMatch => "possible_match",
            MatchStatus::NoMatch => "no_match",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed_match" => Some(MatchStatus::ConfirmedMatch),
            "possible_match" => Some(MatchStatus::PossibleMatch),
            "no_match" => Some(MatchStatus::NoMatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    Filed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Filed => "filed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ReportStatus::Draft),
            "filed" => Some(ReportStatus::Filed),
            _ => None,
        }
    }
}
