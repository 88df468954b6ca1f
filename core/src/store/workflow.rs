//! Alert and case workflow queries plus the append-only audit log.
//!
//! Status updates are guarded: every UPDATE carries the status the
//! caller believes the row is in, and reports whether a row changed.
//! The workflow layer turns a miss into a state transition error.

use super::{parse_col, AlertRow, AmlStore, AuditEntryRow, CaseRow};
use crate::error::AmlResult;
use crate::types::{AlertSeverity, AlertStatus, CasePriority, CaseStatus, RiskLevel};
use rusqlite::{params, OptionalExtension};

const ALERT_COLUMNS: &str = "alert_id, transaction_id, customer_id, rule_id, alert_type, \
     title, description, severity, score, details, status, assigned_to, escalated_to, \
     escalated_at, resolution, resolved_by, resolved_at, case_id, created_at, updated_at";

const CASE_COLUMNS: &str = "case_id, case_number, title, description, customer_id, \
     customer_name, risk_level, priority, status, assigned_to, assigned_at, escalated_to, \
     escalated_at, escalation_reason, alert_count, transaction_count, total_amount, \
     decision, decision_reason, decided_by, sar_filed, due_at, created_by, created_at, \
     closed_at";

impl AmlStore {
    // ── Alerts ─────────────────────────────────────────────────

    pub fn insert_alert(&self, a: &AlertRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO transaction_alerts
             (alert_id, transaction_id, customer_id, rule_id, alert_type, title, description,
              severity, score, details, status, assigned_to, escalated_to, escalated_at,
              resolution, resolved_by, resolved_at, case_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20)",
            params![
                a.alert_id,
                a.transaction_id,
                a.customer_id,
                a.rule_id,
                a.alert_type,
                a.title,
                a.description,
                a.severity.as_str(),
                a.score,
                a.details,
                a.status.as_str(),
                a.assigned_to,
                a.escalated_to,
                a.escalated_at,
                a.resolution,
                a.resolved_by,
                a.resolved_at,
                a.case_id,
                a.created_at,
                a.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_alert(&self, alert_id: &str) -> AmlResult<Option<AlertRow>> {
        self.conn
            .query_row(
                &format!("SELECT {ALERT_COLUMNS} FROM transaction_alerts WHERE alert_id = ?1"),
                params![alert_id],
                alert_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Lookup on the (transaction, rule) natural key, the dedup axis.
    pub fn get_alert_by_txn_rule(
        &self,
        transaction_id: &str,
        rule_id: &str,
    ) -> AmlResult<Option<AlertRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM transaction_alerts
                     WHERE transaction_id = ?1 AND rule_id = ?2"
                ),
                params![transaction_id, rule_id],
                alert_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Refresh detection fields when a rule re-fires on the same
    /// transaction. Workflow fields (status, assignment) are untouched.
    pub fn refresh_alert(
        &self,
        alert_id: &str,
        severity: AlertSeverity,
        score: f64,
        title: &str,
        description: &str,
        details: Option<&str>,
        now: i64,
    ) -> AmlResult<()> {
        self.conn.execute(
            "UPDATE transaction_alerts
             SET severity = ?1, score = ?2, title = ?3, description = ?4, details = ?5,
                 updated_at = ?6
             WHERE alert_id = ?7",
            params![severity.as_str(), score, title, description, details, now, alert_id],
        )?;
        Ok(())
    }

    pub fn alerts_for_customer(&self, customer_id: &str) -> AmlResult<Vec<AlertRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM transaction_alerts
             WHERE customer_id = ?1 ORDER BY created_at, alert_id"
        ))?;
        let rows = stmt.query_map(params![customer_id], alert_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn alerts_for_case(&self, case_id: &str) -> AmlResult<Vec<AlertRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM transaction_alerts
             WHERE case_id = ?1 ORDER BY created_at, alert_id"
        ))?;
        let rows = stmt.query_map(params![case_id], alert_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Alerts still in flight (not closed), oldest first.
    pub fn active_alerts(&self) -> AmlResult<Vec<AlertRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ALERT_COLUMNS} FROM transaction_alerts
             WHERE status IN ('open', 'investigating', 'escalated')
             ORDER BY created_at, alert_id"
        ))?;
        let rows = stmt.query_map([], alert_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_alert_status(
        &self,
        alert_id: &str,
        expected: AlertStatus,
        new: AlertStatus,
        now: i64,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE transaction_alerts SET status = ?1, updated_at = ?2
             WHERE alert_id = ?3 AND status = ?4",
            params![new.as_str(), now, alert_id, expected.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn assign_alert(
        &self,
        alert_id: &str,
        expected: AlertStatus,
        new: AlertStatus,
        assignee: &str,
        now: i64,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE transaction_alerts SET status = ?1, assigned_to = ?2, updated_at = ?3
             WHERE alert_id = ?4 AND status = ?5",
            params![new.as_str(), assignee, now, alert_id, expected.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn escalate_alert(
        &self,
        alert_id: &str,
        expected: AlertStatus,
        escalated_to: &str,
        now: i64,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE transaction_alerts
             SET status = 'escalated', escalated_to = ?1, escalated_at = ?2, updated_at = ?2
             WHERE alert_id = ?3 AND status = ?4",
            params![escalated_to, now, alert_id, expected.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn resolve_alert(
        &self,
        alert_id: &str,
        expected: AlertStatus,
        new: AlertStatus,
        resolution: &str,
        resolved_by: &str,
        now: i64,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE transaction_alerts
             SET status = ?1, resolution = ?2, resolved_by = ?3, resolved_at = ?4,
                 updated_at = ?4
             WHERE alert_id = ?5 AND status = ?6",
            params![
                new.as_str(),
                resolution,
                resolved_by,
                now,
                alert_id,
                expected.as_str()
            ],
        )?;
        Ok(n > 0)
    }

    pub fn link_alert_to_case(&self, alert_id: &str, case_id: &str, now: i64) -> AmlResult<()> {
        self.conn.execute(
            "UPDATE transaction_alerts SET case_id = ?1, updated_at = ?2 WHERE alert_id = ?3",
            params![case_id, now, alert_id],
        )?;
        Ok(())
    }

    pub fn alert_counts_by_status(&self) -> AmlResult<Vec<(String, i64)>> {
        self.group_counts("SELECT status, COUNT(*) FROM transaction_alerts GROUP BY status")
    }

    pub fn alert_counts_by_severity(&self) -> AmlResult<Vec<(String, i64)>> {
        self.group_counts("SELECT severity, COUNT(*) FROM transaction_alerts GROUP BY severity")
    }

    // ── Cases ──────────────────────────────────────────────────

    pub fn insert_case(&self, c: &CaseRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO compliance_cases
             (case_id, case_number, title, description, customer_id, customer_name,
              risk_level, priority, status, assigned_to, assigned_at, escalated_to,
              escalated_at, escalation_reason, alert_count, transaction_count, total_amount,
              decision, decision_reason, decided_by, sar_filed, due_at, created_by,
              created_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
            params![
                c.case_id,
                c.case_number,
                c.title,
                c.description,
                c.customer_id,
                c.customer_name,
                c.risk_level.as_str(),
                c.priority.as_str(),
                c.status.as_str(),
                c.assigned_to,
                c.assigned_at,
                c.escalated_to,
                c.escalated_at,
                c.escalation_reason,
                c.alert_count,
                c.transaction_count,
                c.total_amount,
                c.decision,
                c.decision_reason,
                c.decided_by,
                c.sar_filed,
                c.due_at,
                c.created_by,
                c.created_at,
                c.closed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_case(&self, case_id: &str) -> AmlResult<Option<CaseRow>> {
        self.conn
            .query_row(
                &format!("SELECT {CASE_COLUMNS} FROM compliance_cases WHERE case_id = ?1"),
                params![case_id],
                case_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn count_cases(&self) -> AmlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM compliance_cases", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn cases_for_customer(&self, customer_id: &str) -> AmlResult<Vec<CaseRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CASE_COLUMNS} FROM compliance_cases
             WHERE customer_id = ?1 ORDER BY created_at, case_id"
        ))?;
        let rows = stmt.query_map(params![customer_id], case_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Cases still in flight, most overdue first.
    pub fn active_cases(&self) -> AmlResult<Vec<CaseRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CASE_COLUMNS} FROM compliance_cases
             WHERE status IN ('open', 'investigating', 'pending_review', 'escalated')
             ORDER BY due_at, case_id"
        ))?;
        let rows = stmt.query_map([], case_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn set_case_status(
        &self,
        case_id: &str,
        expected: CaseStatus,
        new: CaseStatus,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE compliance_cases SET status = ?1 WHERE case_id = ?2 AND status = ?3",
            params![new.as_str(), case_id, expected.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn assign_case(
        &self,
        case_id: &str,
        expected: CaseStatus,
        new: CaseStatus,
        assignee: &str,
        now: i64,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE compliance_cases
             SET status = ?1, assigned_to = ?2, assigned_at = ?3
             WHERE case_id = ?4 AND status = ?5",
            params![new.as_str(), assignee, now, case_id, expected.as_str()],
        )?;
        Ok(n > 0)
    }

    pub fn escalate_case(
        &self,
        case_id: &str,
        expected: CaseStatus,
        escalated_to: &str,
        reason: &str,
        now: i64,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE compliance_cases
             SET status = 'escalated', escalated_to = ?1, escalated_at = ?2,
                 escalation_reason = ?3
             WHERE case_id = ?4 AND status = ?5",
            params![escalated_to, now, reason, case_id, expected.as_str()],
        )?;
        Ok(n > 0)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn close_case(
        &self,
        case_id: &str,
        expected: CaseStatus,
        new: CaseStatus,
        decision: &str,
        reason: &str,
        decided_by: &str,
        sar_filed: bool,
        now: i64,
    ) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE compliance_cases
             SET status = ?1, decision = ?2, decision_reason = ?3, decided_by = ?4,
                 sar_filed = ?5, closed_at = ?6
             WHERE case_id = ?7 AND status = ?8",
            params![
                new.as_str(),
                decision,
                reason,
                decided_by,
                sar_filed,
                now,
                case_id,
                expected.as_str()
            ],
        )?;
        Ok(n > 0)
    }

    /// Fold one more alert (and its transaction) into the case totals.
    pub fn add_case_rollup(&self, case_id: &str, amount: f64) -> AmlResult<()> {
        self.conn.execute(
            "UPDATE compliance_cases
             SET alert_count = alert_count + 1,
                 transaction_count = transaction_count + 1,
                 total_amount = total_amount + ?1
             WHERE case_id = ?2",
            params![amount, case_id],
        )?;
        Ok(())
    }

    pub fn case_counts_by_status(&self) -> AmlResult<Vec<(String, i64)>> {
        self.group_counts("SELECT status, COUNT(*) FROM compliance_cases GROUP BY status")
    }

    pub fn case_counts_by_priority(&self) -> AmlResult<Vec<(String, i64)>> {
        self.group_counts("SELECT priority, COUNT(*) FROM compliance_cases GROUP BY priority")
    }

    pub fn count_sar_filed_cases(&self) -> AmlResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM compliance_cases WHERE sar_filed = 1",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    // ── Audit log ──────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn append_audit(
        &self,
        entity_type: &str,
        entity_id: &str,
        action: &str,
        actor: &str,
        from_status: Option<&str>,
        to_status: Option<&str>,
        note: Option<&str>,
        now: i64,
    ) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO audit_log
             (entity_type, entity_id, action, actor, from_status, to_status, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![entity_type, entity_id, action, actor, from_status, to_status, note, now],
        )?;
        Ok(())
    }

    /// Full history for one entity, in append order.
    pub fn audit_trail(&self, entity_type: &str, entity_id: &str) -> AmlResult<Vec<AuditEntryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_type, entity_id, action, actor, from_status, to_status, note,
                    created_at
             FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![entity_type, entity_id], |row| {
            Ok(AuditEntryRow {
                id: row.get(0)?,
                entity_type: row.get(1)?,
                entity_id: row.get(2)?,
                action: row.get(3)?,
                actor: row.get(4)?,
                from_status: row.get(5)?,
                to_status: row.get(6)?,
                note: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn group_counts(&self, sql: &str) -> AmlResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn alert_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRow> {
    let severity: String = row.get(7)?;
    let status: String = row.get(10)?;
    Ok(AlertRow {
        alert_id: row.get(0)?,
        transaction_id: row.get(1)?,
        customer_id: row.get(2)?,
        rule_id: row.get(3)?,
        alert_type: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        severity: parse_col(7, &severity, AlertSeverity::parse)?,
        score: row.get(8)?,
        details: row.get(9)?,
        status: parse_col(10, &status, AlertStatus::parse)?,
        assigned_to: row.get(11)?,
        escalated_to: row.get(12)?,
        escalated_at: row.get(13)?,
        resolution: row.get(14)?,
        resolved_by: row.get(15)?,
        resolved_at: row.get(16)?,
        case_id: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

fn case_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseRow> {
    let risk_level: String = row.get(6)?;
    let priority: String = row.get(7)?;
    let status: String = row.get(8)?;
    Ok(CaseRow {
        case_id: row.get(0)?,
        case_number: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        customer_id: row.get(4)?,
        customer_name: row.get(5)?,
        risk_level: parse_col(6, &risk_level, RiskLevel::parse)?,
        priority: parse_col(7, &priority, CasePriority::parse)?,
        status: parse_col(8, &status, CaseStatus::parse)?,
        assigned_to: row.get(9)?,
        assigned_at: row.get(10)?,
        escalated_to: row.get(11)?,
        escalated_at: row.get(12)?,
        escalation_reason: row.get(13)?,
        alert_count: row.get(14)?,
        transaction_count: row.get(15)?,
        total_amount: row.get(16)?,
        decision: row.get(17)?,
        decision_reason: row.get(18)?,
        decided_by: row.get(19)?,
        sar_filed: row.get(20)?,
        due_at: row.get(21)?,
        created_by: row.get(22)?,
        created_at: row.get(23)?,
        closed_at: row.get(24)?,
    })
}
