//! Regulatory report persistence (CTR and SAR drafts).

use super::{parse_col, AmlStore, CtrReportRow, SarReportRow};
use crate::error::AmlResult;
use crate::types::{ReportStatus, TransactionType};
use rusqlite::{params, OptionalExtension};

impl AmlStore {
    // ── Currency transaction reports ───────────────────────────

    pub fn insert_ctr(&self, r: &CtrReportRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO ctr_reports
             (report_number, transaction_id, customer_id, customer_name, account_number,
              transaction_type, total_cash_in, total_cash_out, currency, occurred_at,
              filed_at, filing_deadline, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                r.report_number,
                r.transaction_id,
                r.customer_id,
                r.customer_name,
                r.account_number,
                r.transaction_type.as_str(),
                r.total_cash_in,
                r.total_cash_out,
                r.currency,
                r.occurred_at,
                r.filed_at,
                r.filing_deadline,
                r.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_ctr(&self, report_number: &str) -> AmlResult<Option<CtrReportRow>> {
        self.conn
            .query_row(
                "SELECT report_number, transaction_id, customer_id, customer_name,
                        account_number, transaction_type, total_cash_in, total_cash_out,
                        currency, occurred_at, filed_at, filing_deadline, status
                 FROM ctr_reports WHERE report_number = ?1",
                params![report_number],
                ctr_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Each transaction carries at most one CTR; drafting checks here first.
    pub fn get_ctr_by_transaction(&self, transaction_id: &str) -> AmlResult<Option<CtrReportRow>> {
        self.conn
            .query_row(
                "SELECT report_number, transaction_id, customer_id, customer_name,
                        account_number, transaction_type, total_cash_in, total_cash_out,
                        currency, occurred_at, filed_at, filing_deadline, status
                 FROM ctr_reports WHERE transaction_id = ?1",
                params![transaction_id],
                ctr_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_ctrs(&self) -> AmlResult<Vec<CtrReportRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_number, transaction_id, customer_id, customer_name,
                    account_number, transaction_type, total_cash_in, total_cash_out,
                    currency, occurred_at, filed_at, filing_deadline, status
             FROM ctr_reports ORDER BY report_number",
        )?;
        let rows = stmt.query_map([], ctr_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_ctrs(&self) -> AmlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM ctr_reports", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Draft to filed. False when the report was already filed.
    pub fn mark_ctr_filed(&self, report_number: &str, now: i64) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE ctr_reports SET status = 'filed', filed_at = ?2
             WHERE report_number = ?1 AND status = 'draft'",
            params![report_number, now],
        )?;
        Ok(n > 0)
    }

    // ── Suspicious activity reports ────────────────────────────

    pub fn insert_sar(&self, r: &SarReportRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO sar_reports
             (report_number, case_id, case_number, customer_id, customer_name,
              activity_start, activity_end, total_amount, currency, transaction_count,
              activity_description, suspicious_reason, action_taken, status, prepared_by,
              prepared_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                r.report_number,
                r.case_id,
                r.case_number,
                r.customer_id,
                r.customer_name,
                r.activity_start,
                r.activity_end,
                r.total_amount,
                r.currency,
                r.transaction_count,
                r.activity_description,
                r.suspicious_reason,
                r.action_taken,
                r.status.as_str(),
                r.prepared_by,
                r.prepared_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_sar(&self, report_number: &str) -> AmlResult<Option<SarReportRow>> {
        self.conn
            .query_row(
                "SELECT report_number, case_id, case_number, customer_id, customer_name,
                        activity_start, activity_end, total_amount, currency,
                        transaction_count, activity_description, suspicious_reason,
                        action_taken, status, prepared_by, prepared_at
                 FROM sar_reports WHERE report_number = ?1",
                params![report_number],
                sar_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn sars_for_case(&self, case_id: &str) -> AmlResult<Vec<SarReportRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_number, case_id, case_number, customer_id, customer_name,
                    activity_start, activity_end, total_amount, currency,
                    transaction_count, activity_description, suspicious_reason,
                    action_taken, status, prepared_by, prepared_at
             FROM sar_reports WHERE case_id = ?1 ORDER BY report_number",
        )?;
        let rows = stmt.query_map(params![case_id], sar_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn list_sars(&self) -> AmlResult<Vec<SarReportRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT report_number, case_id, case_number, customer_id, customer_name,
                    activity_start, activity_end, total_amount, currency,
                    transaction_count, activity_description, suspicious_reason,
                    action_taken, status, prepared_by, prepared_at
             FROM sar_reports ORDER BY report_number",
        )?;
        let rows = stmt.query_map([], sar_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_sars(&self) -> AmlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sar_reports", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn mark_sar_filed(&self, report_number: &str) -> AmlResult<bool> {
        let n = self.conn.execute(
            "UPDATE sar_reports SET status = 'filed'
             WHERE report_number = ?1 AND status = 'draft'",
            params![report_number],
        )?;
        Ok(n > 0)
    }
}

fn ctr_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CtrReportRow> {
    let transaction_type: String = row.get(5)?;
    let status: String = row.get(12)?;
    Ok(CtrReportRow {
        report_number: row.get(0)?,
        transaction_id: row.get(1)?,
        customer_id: row.get(2)?,
        customer_name: row.get(3)?,
        account_number: row.get(4)?,
        transaction_type: parse_col(5, &transaction_type, TransactionType::parse)?,
        total_cash_in: row.get(6)?,
        total_cash_out: row.get(7)?,
        currency: row.get(8)?,
        occurred_at: row.get(9)?,
        filed_at: row.get(10)?,
        filing_deadline: row.get(11)?,
        status: parse_col(12, &status, ReportStatus::parse)?,
    })
}

fn sar_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SarReportRow> {
    let status: String = row.get(13)?;
    Ok(SarReportRow {
        report_number: row.get(0)?,
        case_id: row.get(1)?,
        case_number: row.get(2)?,
        customer_id: row.get(3)?,
        customer_name: row.get(4)?,
        activity_start: row.get(5)?,
        activity_end: row.get(6)?,
        total_amount: row.get(7)?,
        currency: row.get(8)?,
        transaction_count: row.get(9)?,
        activity_description: row.get(10)?,
        suspicious_reason: row.get(11)?,
        action_taken: row.get(12)?,
        status: parse_col(13, &status, ReportStatus::parse)?,
        prepared_by: row.get(14)?,
        prepared_at: row.get(15)?,
    })
}
