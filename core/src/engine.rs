//! Engine facade.
//!
//! One `AmlEngine` owns the store, the config, and every detection
//! component, and strings them into the ingest pipeline:
//!
//!   validate -> persist -> screen counterparty -> score -> monitor
//!            -> alerts -> CTR draft -> auto-case
//!
//! Workflow, reporting, and statistics calls are thin pass-throughs
//! with the engine clock supplying "now", so a fixed clock makes every
//! derived date and report number exact.

use uuid::Uuid;

use crate::alerts::{self, AlertStats, AlertUpsert, ACTOR_SYSTEM};
use crate::cases::{self, CaseClosure, CaseStats};
use crate::clock::EngineClock;
use crate::config::AmlConfig;
use crate::customer_scoring::{CustomerAssessment, CustomerScorer};
use crate::error::{AmlError, AmlResult};
use crate::ml::MlScorer;
use crate::monitoring::{MonitoringOutcome, MonitoringRule, TransactionMonitor, RULE_LARGE_CASH};
use crate::patterns::{PatternAnalyzer, PatternMatch, ScanOutcome};
use crate::reporting;
use crate::screening::{self, WatchlistScreener};
use crate::store::{
    AlertRow, AmlStore, AuditEntryRow, CaseRow, CtrReportRow, CustomerRow, RiskProfileRow,
    ScreeningResultRow, TransactionRow, WatchlistEntryRow,
};
use crate::transaction_scoring::{TransactionScore, TransactionScorer};
use crate::types::{CustomerType, KycStatus, RiskLevel, TransactionType};

/// Customer intake payload. Risk fields are filled by the engine.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub customer_id: String,
    pub customer_type: CustomerType,
    pub full_name: String,
    pub account_number: String,
    pub country: Option<String>,
    pub occupation: Option<String>,
    pub is_pep: bool,
    pub kyc_status: KycStatus,
}

/// Transaction intake payload. Derived flags and scores are filled by
/// the engine. An empty transaction_id gets a generated one.
#[derive(Debug, Clone)]
pub struct NewTransaction {
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
    pub occurred_at: i64,
}

/// Everything the ingest pipeline produced for one transaction.
#[derive(Debug)]
pub struct IngestOutcome {
    /// The row as it stands after scoring and monitoring.
    pub transaction: TransactionRow,
    pub score: TransactionScore,
    pub monitoring: MonitoringOutcome,
    pub alerts: Vec<AlertUpsert>,
    pub screening: Option<ScreeningResultRow>,
    pub ctr_report_number: Option<String>,
    /// Set when the detections auto-opened a case.
    pub case_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngineStats {
    pub customers: i64,
    pub transactions: i64,
    pub alerts: AlertStats,
    pub cases: CaseStats,
    pub ctr_reports: i64,
    pub sar_reports: i64,
    pub watchlist_entries: i64,
    pub screening_hits: i64,
}

pub struct AmlEngine {
    store: AmlStore,
    config: AmlConfig,
    clock: EngineClock,
    ml: Option<Box<dyn MlScorer>>,
    customer_scorer: CustomerScorer,
    transaction_scorer: TransactionScorer,
    monitor: TransactionMonitor,
    analyzer: PatternAnalyzer,
    screener: WatchlistScreener,
}

impl AmlEngine {
    pub fn open(path: &str, config: AmlConfig) -> AmlResult<Self> {
        Self::with_store(AmlStore::open(path)?, config)
    }

    pub fn in_memory(config: AmlConfig) -> AmlResult<Self> {
        Self::with_store(AmlStore::in_memory()?, config)
    }

    fn with_store(store: AmlStore, config: AmlConfig) -> AmlResult<Self> {
        store.migrate()?;
        Ok(Self {
            customer_scorer: CustomerScorer::new(config.scoring.clone()),
            transaction_scorer: TransactionScorer::new(config.scoring.clone()),
            monitor: TransactionMonitor::new(config.monitoring.clone()),
            analyzer: PatternAnalyzer::new(config.patterns.clone()),
            screener: WatchlistScreener::new(config.screening.clone()),
            store,
            config,
            clock: EngineClock::System,
            ml: None,
        })
    }

    pub fn set_clock(&mut self, clock: EngineClock) {
        self.clock = clock;
    }

    /// Install a model. Scoring blends its output with the rule score.
    pub fn set_ml_scorer(&mut self, scorer: Box<dyn MlScorer>) {
        self.ml = Some(scorer);
    }

    /// Add a monitoring rule behind the standard catalog.
    pub fn register_monitoring_rule(&mut self, rule: Box<dyn MonitoringRule>) {
        self.monitor.register_rule(rule);
    }

    pub fn store(&self) -> &AmlStore {
        &self.store
    }

    pub fn config(&self) -> &AmlConfig {
        &self.config
    }

    pub fn now_ts(&self) -> i64 {
        self.clock.now_ts()
    }

    // ── Customers ──────────────────────────────────────────────

    /// Register a customer, screen the name against the watchlist, and
    /// run the initial risk assessment.
    pub fn register_customer(&self, input: NewCustomer) -> AmlResult<CustomerRow> {
        let now = self.clock.now_ts();
        require_field("customer_id", &input.customer_id)?;
        require_field("full_name", &input.full_name)?;
        require_field("account_number", &input.account_number)?;

        let row = CustomerRow {
            customer_id: input.customer_id,
            customer_type: input.customer_type,
            full_name: input.full_name,
            account_number: input.account_number,
            country: input.country,
            occupation: input.occupation,
            is_pep: input.is_pep,
            kyc_status: input.kyc_status,
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            is_active: true,
            onboarded_at: now,
            updated_at: now,
        };
        self.store.insert_customer(&row)?;
        self.screener.screen_customer(&self.store, &row, now)?;
        self.customer_scorer.assess(&self.store, &row.customer_id, now)?;
        self.customer(&row.customer_id)
    }

    pub fn customer(&self, customer_id: &str) -> AmlResult<CustomerRow> {
        self.store
            .get_customer(customer_id)?
            .ok_or_else(|| AmlError::not_found("customer", customer_id))
    }

    /// Re-run the five-factor assessment and persist the result.
    pub fn assess_customer(&self, customer_id: &str) -> AmlResult<CustomerAssessment> {
        self.customer_scorer
            .assess(&self.store, customer_id, self.clock.now_ts())
    }

    /// Record a KYC status change and reassess, since incomplete KYC
    /// feeds the customer-type factor.
    pub fn update_kyc(&self, customer_id: &str, status: KycStatus) -> AmlResult<CustomerAssessment> {
        let now = self.clock.now_ts();
        self.customer(customer_id)?;
        self.store.set_customer_kyc(customer_id, status, now)?;
        self.customer_scorer.assess(&self.store, customer_id, now)
    }

    pub fn risk_profile(&self, customer_id: &str) -> AmlResult<Option<RiskProfileRow>> {
        self.store.get_risk_profile(customer_id)
    }

    // ── Transactions ───────────────────────────────────────────

    /// Run one transaction through the whole detection pipeline.
    pub fn ingest_transaction(&self, input: NewTransaction) -> AmlResult<IngestOutcome> {
        let now = self.clock.now_ts();
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(AmlError::validation("amount", "must be a positive number"));
        }
        require_field("account_number", &input.account_number)?;
        require_field("currency", &input.currency)?;
        self.customer(&input.customer_id)?;

        let transaction_id = if input.transaction_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            input.transaction_id
        };
        let is_cash = matches!(
            input.transaction_type,
            TransactionType::Cash | TransactionType::Deposit | TransactionType::Withdrawal
        );
        let row = TransactionRow {
            transaction_id: transaction_id.clone(),
            customer_id: input.customer_id,
            account_number: input.account_number,
            transaction_type: input.transaction_type,
            amount: input.amount,
            currency: input.currency,
            origin_country: input.origin_country,
            destination_country: input.destination_country,
            counterparty_name: input.counterparty_name,
            counterparty_account: input.counterparty_account,
            counterparty_country: input.counterparty_country,
            is_cash,
            occurred_at: input.occurred_at,
            risk_score: None,
            rule_score: None,
            ml_score: None,
            risk_factors: None,
            is_high_risk: false,
            requires_review: false,
            exceeds_threshold: input.amount >= self.config.monitoring.amount_threshold,
            is_structured: false,
            sanctions_hit: false,
            watchlist_hit: false,
            score_version: 0,
        };
        self.store.insert_transaction(&row)?;

        let screening = self.screener.screen_transaction(&self.store, &row, now)?;
        let score = self
            .transaction_scorer
            .score(&self.store, &row, self.ml.as_deref())?;
        let monitoring = self.monitor.monitor(&self.store, &row)?;

        let mut upserts = Vec::with_capacity(monitoring.firings.len());
        for firing in &monitoring.firings {
            upserts.push(alerts::upsert_rule_alert(&self.store, &row, firing, now)?);
        }

        let mut ctr_report_number = None;
        if monitoring.firings.iter().any(|f| f.rule_id == RULE_LARGE_CASH) {
            ctr_report_number = reporting::draft_ctr(
                &self.store,
                &row,
                self.config.monitoring.ctr_filing_deadline_days,
                now,
            )?
            .map(|r| r.report_number);
        }

        let mut case_id = None;
        if let Some(max) = monitoring.max_severity {
            if max >= self.config.workflow.auto_case_min_severity {
                // Compound firings come last, so ties pick the compound.
                if let Some(worst) = upserts.iter().filter(|u| u.severity == max).last() {
                    let alert = self
                        .store
                        .get_alert(&worst.alert_id)?
                        .ok_or_else(|| AmlError::not_found("alert", &worst.alert_id))?;
                    let case = cases::open_from_alert(
                        &self.store,
                        &alert,
                        &self.config.workflow,
                        ACTOR_SYSTEM,
                        now,
                    )?;
                    case_id = Some(case.case_id);
                }
            }
        }

        let transaction = self.transaction(&transaction_id)?;
        Ok(IngestOutcome {
            transaction,
            score,
            monitoring,
            alerts: upserts,
            screening,
            ctr_report_number,
            case_id,
        })
    }

    pub fn transaction(&self, transaction_id: &str) -> AmlResult<TransactionRow> {
        self.store
            .get_transaction(transaction_id)?
            .ok_or_else(|| AmlError::not_found("transaction", transaction_id))
    }

    /// Score the stored row again, e.g. after installing a model.
    pub fn rescore_transaction(&self, transaction_id: &str) -> AmlResult<TransactionScore> {
        let txn = self.transaction(transaction_id)?;
        self.transaction_scorer
            .score(&self.store, &txn, self.ml.as_deref())
    }

    /// Transactions flagged for analyst review, riskiest first.
    pub fn review_queue(&self) -> AmlResult<Vec<TransactionRow>> {
        self.store.review_queue()
    }

    // ── Pattern analysis ───────────────────────────────────────

    /// Sweep all customers with recent activity. Matches at or above
    /// the configured risk floor are materialized as alerts.
    pub fn scan_patterns(&self, deadline: Option<i64>) -> AmlResult<ScanOutcome> {
        let now = self.clock.now_ts();
        let outcome = self.analyzer.scan(&self.store, &self.clock, deadline)?;
        for m in &outcome.matches {
            if m.risk_score >= self.config.workflow.pattern_alert_min_risk {
                alerts::upsert_pattern_alert(&self.store, m, now)?;
            }
        }
        Ok(outcome)
    }

    /// Detector pass for a single customer, without alerting.
    pub fn analyze_customer(&self, customer_id: &str) -> AmlResult<Vec<PatternMatch>> {
        self.analyzer
            .scan_customer(&self.store, customer_id, self.clock.now_ts())
    }

    // ── Alert workflow ─────────────────────────────────────────

    pub fn alert(&self, alert_id: &str) -> AmlResult<AlertRow> {
        self.store
            .get_alert(alert_id)?
            .ok_or_else(|| AmlError::not_found("alert", alert_id))
    }

    pub fn active_alerts(&self) -> AmlResult<Vec<AlertRow>> {
        self.store.active_alerts()
    }

    pub fn assign_alert(&self, alert_id: &str, assignee: &str, actor: &str) -> AmlResult<AlertRow> {
        alerts::assign(&self.store, alert_id, assignee, actor, self.clock.now_ts())
    }

    pub fn escalate_alert(
        &self,
        alert_id: &str,
        escalated_to: &str,
        actor: &str,
    ) -> AmlResult<AlertRow> {
        alerts::escalate(&self.store, alert_id, escalated_to, actor, self.clock.now_ts())
    }

    pub fn resolve_alert(
        &self,
        alert_id: &str,
        resolution: &str,
        false_positive: bool,
        actor: &str,
    ) -> AmlResult<AlertRow> {
        alerts::resolve(
            &self.store,
            alert_id,
            resolution,
            false_positive,
            actor,
            self.clock.now_ts(),
        )
    }

    // ── Case workflow ──────────────────────────────────────────

    pub fn case(&self, case_id: &str) -> AmlResult<CaseRow> {
        self.store
            .get_case(case_id)?
            .ok_or_else(|| AmlError::not_found("case", case_id))
    }

    pub fn active_cases(&self) -> AmlResult<Vec<CaseRow>> {
        self.store.active_cases()
    }

    pub fn open_case(&self, alert_id: &str, actor: &str) -> AmlResult<CaseRow> {
        let alert = self.alert(alert_id)?;
        cases::open_from_alert(
            &self.store,
            &alert,
            &self.config.workflow,
            actor,
            self.clock.now_ts(),
        )
    }

    pub fn attach_alert_to_case(
        &self,
        case_id: &str,
        alert_id: &str,
        actor: &str,
    ) -> AmlResult<bool> {
        let alert = self.alert(alert_id)?;
        cases::attach_alert(&self.store, case_id, &alert, actor, self.clock.now_ts())
    }

    pub fn assign_case(&self, case_id: &str, assignee: &str, actor: &str) -> AmlResult<CaseRow> {
        cases::assign(&self.store, case_id, assignee, actor, self.clock.now_ts())
    }

    pub fn send_case_for_review(&self, case_id: &str, actor: &str) -> AmlResult<CaseRow> {
        cases::send_for_review(&self.store, case_id, actor, self.clock.now_ts())
    }

    pub fn escalate_case(
        &self,
        case_id: &str,
        escalated_to: &str,
        reason: &str,
        actor: &str,
    ) -> AmlResult<CaseRow> {
        cases::escalate(
            &self.store,
            case_id,
            escalated_to,
            reason,
            actor,
            self.clock.now_ts(),
        )
    }

    pub fn close_case(
        &self,
        case_id: &str,
        decision: &str,
        reason: &str,
        actor: &str,
    ) -> AmlResult<CaseClosure> {
        cases::close(&self.store, case_id, decision, reason, actor, self.clock.now_ts())
    }

    pub fn audit_trail(&self, entity_type: &str, entity_id: &str) -> AmlResult<Vec<AuditEntryRow>> {
        self.store.audit_trail(entity_type, entity_id)
    }

    // ── Reporting ──────────────────────────────────────────────

    pub fn file_ctr(&self, report_number: &str, actor: &str) -> AmlResult<bool> {
        reporting::file_ctr(&self.store, report_number, actor, self.clock.now_ts())
    }

    pub fn file_sar(&self, report_number: &str, actor: &str) -> AmlResult<bool> {
        reporting::file_sar(&self.store, report_number, actor, self.clock.now_ts())
    }

    pub fn overdue_ctrs(&self) -> AmlResult<Vec<CtrReportRow>> {
        reporting::overdue_ctrs(&self.store, self.clock.now_ts())
    }

    // ── Screening ──────────────────────────────────────────────

    pub fn add_watchlist_entry(
        &self,
        entry_id: &str,
        list_type: &str,
        program: Option<&str>,
        full_name: &str,
        aliases: &[String],
        country: Option<&str>,
    ) -> AmlResult<WatchlistEntryRow> {
        screening::add_watchlist_entry(
            &self.store,
            entry_id,
            list_type,
            program,
            full_name,
            aliases,
            country,
            self.clock.now_ts(),
        )
    }

    /// Re-screen an existing customer, e.g. after a watchlist update.
    pub fn screen_customer(&self, customer_id: &str) -> AmlResult<ScreeningResultRow> {
        let customer = self.customer(customer_id)?;
        self.screener
            .screen_customer(&self.store, &customer, self.clock.now_ts())
    }

    // ── Statistics ─────────────────────────────────────────────

    pub fn stats(&self) -> AmlResult<EngineStats> {
        Ok(EngineStats {
            customers: self.store.count_customers()?,
            transactions: self.store.count_transactions()?,
            alerts: alerts::stats(&self.store)?,
            cases: cases::stats(&self.store)?,
            ctr_reports: self.store.count_ctrs()?,
            sar_reports: self.store.count_sars()?,
            watchlist_entries: self.store.count_watchlist_entries()?,
            screening_hits: self.store.count_screening_hits()?,
        })
    }
}

fn require_field(field: &str, value: &str) -> AmlResult<()> {
    if value.trim().is_empty() {
        return Err(AmlError::validation(field, "must not be empty"));
    }
    Ok(())
}
