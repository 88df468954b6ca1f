//! SQLite persistence layer.
//!
//! RULE: only the store talks to the database.
//! Engine modules call store methods and never execute SQL directly.

use crate::error::AmlResult;
use crate::types::{
    AlertSeverity, AlertStatus, CasePriority, CaseStatus, CustomerType, KycStatus, MatchStatus,
    ReportStatus, RiskLevel, TransactionType,
};
use rusqlite::Connection;

mod customer;
mod reports;
mod screening;
mod transaction;
mod workflow;

pub struct AmlStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl AmlStore {
    pub fn open(path: &str) -> AmlResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AmlResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> AmlResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AmlResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_customers.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_transactions.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_workflow.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_reports.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_screening.sql"))?;
        Ok(())
    }
}

/// Parse a TEXT column into a domain enum inside a `query_map` closure.
/// Unknown values surface as a conversion failure on that column.
pub(crate) fn parse_col<T>(
    idx: usize,
    raw: &str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized value '{raw}'").into(),
        )
    })
}

// ── Row structs ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CustomerRow {
    pub customer_id: String,
    pub customer_type: CustomerType,
    pub full_name: String,
    pub account_number: String,
    pub country: Option<String>,
    pub occupation: Option<String>,
    pub is_pep: bool,
    pub kyc_status: KycStatus,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub is_active: bool,
    pub onboarded_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct RiskProfileRow {
    pub customer_id: String,
    pub geographic_risk: f64,
    pub product_risk: f64,
    pub channel_risk: f64,
    pub customer_type_risk: f64,
    pub transaction_risk: f64,
    pub composite_score: f64,
    pub risk_level: RiskLevel,
    pub str_count: i64,
    pub alert_count: i64,
    pub false_positive_count: i64,
    pub last_review_at: Option<i64>,
    pub next_review_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub transaction_id: String,
    pub customer_id: String,
    pub account_number: String,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub currency: String,
    pub origin_country: Option<String>,
    pub destination_country: Option<String>,
    pub counterparty_name: Option<String>,
    pub counterparty_account: Option<String>,
    pub counterparty_country: Option<String>,
    pub is_cash: bool,
    pub occurred_at: i64,
    pub risk_score: Option<f64>,
    pub rule_score: Option<f64>,
    pub ml_score: Option<f64>,
    pub risk_factors: Option<String>,
    pub is_high_risk: bool,
    pub requires_review: bool,
    pub exceeds_threshold: bool,
    pub is_structured: bool,
    pub sanctions_hit: bool,
    pub watchlist_hit: bool,
    pub score_version: i64,
}

/// Scoring output applied to a transaction row under a version guard.
#[derive(Debug, Clone)]
pub struct ScoreUpdate {
    pub risk_score: f64,
    pub rule_score: f64,
    pub ml_score: Option<f64>,
    pub risk_factors: String,
    pub is_high_risk: bool,
    pub requires_review: bool,
    pub exceeds_threshold: bool,
    pub is_structured: bool,
}

#[derive(Debug, Clone)]
pub struct AlertRow {
    pub alert_id: String,
    pub transaction_id: String,
    pub customer_id: String,
    pub rule_id: String,
    pub alert_type: String,
    pub title: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub score: f64,
    pub details: Option<String>,
    pub status: AlertStatus,
    pub assigned_to: Option<String>,
    pub escalated_to: Option<String>,
    pub escalated_at: Option<i64>,
    pub resolution: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<i64>,
    pub case_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CaseRow {
    pub case_id: String,
    pub case_number: String,
    pub title: String,
    pub description: Option<String>,
    pub customer_id: String,
    pub customer_name: String,
    pub risk_level: RiskLevel,
    pub priority: CasePriority,
    pub status: CaseStatus,
    pub assigned_to: Option<String>,
    pub assigned_at: Option<i64>,
    pub escalated_to: Option<String>,
    pub escalated_at: Option<i64>,
    pub escalation_reason: Option<String>,
    pub alert_count: i64,
    pub transaction_count: i64,
    pub total_amount: f64,
    pub decision: Option<String>,
    pub decision_reason: Option<String>,
    pub decided_by: Option<String>,
    pub sar_filed: bool,
    pub due_at: i64,
    pub created_by: String,
    pub created_at: i64,
    pub closed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AuditEntryRow {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub note: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CtrReportRow {
    pub report_number: String,
    pub transaction_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub account_number: String,
    pub transaction_type: TransactionType,
    pub total_cash_in: f64,
    pub total_cash_out: f64,
    pub currency: String,
    pub occurred_at: i64,
    pub filed_at: i64,
    pub filing_deadline: i64,
    pub status: ReportStatus,
}

#[derive(Debug, Clone)]
pub struct SarReportRow {
    pub report_number: String,
    pub case_id: String,
    pub case_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub activity_start: Option<i64>,
    pub activity_end: Option<i64>,
    pub total_amount: f64,
    pub currency: String,
    pub transaction_count: i64,
    pub activity_description: String,
    pub suspicious_reason: String,
    pub action_taken: Option<String>,
    pub status: ReportStatus,
    pub prepared_by: String,
    pub prepared_at: i64,
}

#[derive(Debug, Clone)]
pub struct WatchlistEntryRow {
    pub entry_id: String,
    pub list_type: String,
    pub program: Option<String>,
    pub full_name: String,
    /// JSON array of alternate spellings; parsed by the screener.
    pub aliases: String,
    pub country: Option<String>,
    pub is_active: bool,
    pub added_at: i64,
}

#[derive(Debug, Clone)]
pub struct ScreeningResultRow {
    pub screening_id: String,
    pub customer_id: Option<String>,
    pub transaction_id: Option<String>,
    pub screening_type: String,
    pub searched_name: String,
    pub entry_id: Option<String>,
    pub match_score: f64,
    pub match_status: MatchStatus,
    pub matched_field: Option<String>,
    pub screened_at: i64,
}
