//! Transaction inserts, window aggregates for the monitoring rules,
//! and the version-guarded score write.

use super::{parse_col, AmlStore, ScoreUpdate, TransactionRow};
use crate::error::{AmlError, AmlResult};
use crate::types::TransactionType;
use rusqlite::{params, OptionalExtension};

const TXN_COLUMNS: &str = "transaction_id, customer_id, account_number, transaction_type, \
     amount, currency, origin_country, destination_country, counterparty_name, \
     counterparty_account, counterparty_country, is_cash, occurred_at, risk_score, \
     rule_score, ml_score, risk_factors, is_high_risk, requires_review, exceeds_threshold, \
     is_structured, sanctions_hit, watchlist_hit, score_version";

impl AmlStore {
    pub fn insert_transaction(&self, t: &TransactionRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO transactions
             (transaction_id, customer_id, account_number, transaction_type, amount, currency,
              origin_country, destination_country, counterparty_name, counterparty_account,
              counterparty_country, is_cash, occurred_at, risk_score, rule_score, ml_score,
              risk_factors, is_high_risk, requires_review, exceeds_threshold, is_structured,
              sanctions_hit, watchlist_hit, score_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            params![
                t.transaction_id,
                t.customer_id,
                t.account_number,
                t.transaction_type.as_str(),
                t.amount,
                t.currency,
                t.origin_country,
                t.destination_country,
                t.counterparty_name,
                t.counterparty_account,
                t.counterparty_country,
                t.is_cash,
                t.occurred_at,
                t.risk_score,
                t.rule_score,
                t.ml_score,
                t.risk_factors,
                t.is_high_risk,
                t.requires_review,
                t.exceeds_threshold,
                t.is_structured,
                t.sanctions_hit,
                t.watchlist_hit,
                t.score_version,
            ],
        )?;
        Ok(())
    }

    pub fn get_transaction(&self, transaction_id: &str) -> AmlResult<Option<TransactionRow>> {
        self.conn
            .query_row(
                &format!("SELECT {TXN_COLUMNS} FROM transactions WHERE transaction_id = ?1"),
                params![transaction_id],
                txn_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All of a customer's transactions with `since <= occurred_at <= until`,
    /// oldest first. Ties break on transaction_id so scans are stable.
    pub fn transactions_in_window(
        &self,
        customer_id: &str,
        since: i64,
        until: i64,
    ) -> AmlResult<Vec<TransactionRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE customer_id = ?1 AND occurred_at >= ?2 AND occurred_at <= ?3
             ORDER BY occurred_at, transaction_id"
        ))?;
        let rows = stmt.query_map(params![customer_id, since, until], txn_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Count and amount sum over a window, excluding one transaction
    /// (the one under evaluation).
    pub fn window_stats_excluding(
        &self,
        customer_id: &str,
        since: i64,
        until: i64,
        exclude_id: &str,
    ) -> AmlResult<(i64, f64)> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(amount), 0)
                 FROM transactions
                 WHERE customer_id = ?1 AND occurred_at >= ?2 AND occurred_at <= ?3
                   AND transaction_id != ?4",
                params![customer_id, since, until, exclude_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(Into::into)
    }

    /// Count window transactions whose amount falls in `[low, high)`,
    /// excluding the one under evaluation.
    pub fn count_band_amounts_excluding(
        &self,
        customer_id: &str,
        since: i64,
        until: i64,
        low: f64,
        high: f64,
        exclude_id: &str,
    ) -> AmlResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM transactions
                 WHERE customer_id = ?1 AND occurred_at >= ?2 AND occurred_at <= ?3
                   AND amount >= ?4 AND amount < ?5 AND transaction_id != ?6",
                params![customer_id, since, until, low, high, exclude_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    /// The most recent transaction strictly before `before`, excluding
    /// the one under evaluation. Dormancy checks gap against this.
    pub fn last_transaction_before(
        &self,
        customer_id: &str,
        before: i64,
        exclude_id: &str,
    ) -> AmlResult<Option<TransactionRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {TXN_COLUMNS} FROM transactions
                     WHERE customer_id = ?1 AND occurred_at < ?2 AND transaction_id != ?3
                     ORDER BY occurred_at DESC, transaction_id DESC LIMIT 1"
                ),
                params![customer_id, before, exclude_id],
                txn_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// The most recent transaction with `from_ts <= occurred_at < to_ts`.
    pub fn last_transaction_in_range(
        &self,
        customer_id: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> AmlResult<Option<TransactionRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {TXN_COLUMNS} FROM transactions
                     WHERE customer_id = ?1 AND occurred_at >= ?2 AND occurred_at < ?3
                     ORDER BY occurred_at DESC, transaction_id DESC LIMIT 1"
                ),
                params![customer_id, from_ts, to_ts],
                txn_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Write scoring output. The version guard makes concurrent
    /// re-scores lose cleanly instead of clobbering newer results.
    pub fn apply_score(
        &self,
        transaction_id: &str,
        expected_version: i64,
        update: &ScoreUpdate,
    ) -> AmlResult<()> {
        let n = self.conn.execute(
            "UPDATE transactions SET
                risk_score = ?1, rule_score = ?2, ml_score = ?3, risk_factors = ?4,
                is_high_risk = ?5, requires_review = ?6, exceeds_threshold = ?7,
                is_structured = ?8, score_version = score_version + 1
             WHERE transaction_id = ?9 AND score_version = ?10",
            params![
                update.risk_score,
                update.rule_score,
                update.ml_score,
                update.risk_factors,
                update.is_high_risk,
                update.requires_review,
                update.exceeds_threshold,
                update.is_structured,
                transaction_id,
                expected_version,
            ],
        )?;
        if n == 0 {
            if self.get_transaction(transaction_id)?.is_none() {
                return Err(AmlError::not_found("transaction", transaction_id));
            }
            return Err(AmlError::StaleScore {
                transaction_id: transaction_id.to_string(),
            });
        }
        Ok(())
    }

    /// Record a counterparty screening hit. `sanctions` marks hits from
    /// sanctions lists as opposed to PEP or other watchlists.
    pub fn mark_transaction_hit(&self, transaction_id: &str, sanctions: bool) -> AmlResult<()> {
        self.conn.execute(
            "UPDATE transactions
             SET watchlist_hit = 1, sanctions_hit = MAX(sanctions_hit, ?2)
             WHERE transaction_id = ?1",
            params![transaction_id, sanctions],
        )?;
        Ok(())
    }

    /// Customers with at least one transaction in the window, for the
    /// batch pattern scan. Sorted so scans are deterministic.
    pub fn customer_ids_with_activity(&self, since: i64, until: i64) -> AmlResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT customer_id FROM transactions
             WHERE occurred_at >= ?1 AND occurred_at <= ?2
             ORDER BY customer_id",
        )?;
        let rows = stmt.query_map(params![since, until], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Transactions referenced by a case's alerts, for SAR drafting.
    pub fn transactions_for_case(&self, case_id: &str) -> AmlResult<Vec<TransactionRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {cols} FROM transactions t
             JOIN transaction_alerts a ON a.transaction_id = t.transaction_id
             WHERE a.case_id = ?1
             ORDER BY t.occurred_at, t.transaction_id",
            cols = prefixed_columns("t")
        ))?;
        let rows = stmt.query_map(params![case_id], txn_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Scored transactions waiting on a reviewer, riskiest first.
    pub fn review_queue(&self) -> AmlResult<Vec<TransactionRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TXN_COLUMNS} FROM transactions
             WHERE requires_review = 1
             ORDER BY risk_score DESC, transaction_id"
        ))?;
        let rows = stmt.query_map([], txn_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_transactions(&self) -> AmlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

fn prefixed_columns(alias: &str) -> String {
    TXN_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn txn_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionRow> {
    let transaction_type: String = row.get(3)?;
    Ok(TransactionRow {
        transaction_id: row.get(0)?,
        customer_id: row.get(1)?,
        account_number: row.get(2)?,
        transaction_type: parse_col(3, &transaction_type, TransactionType::parse)?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        origin_country: row.get(6)?,
        destination_country: row.get(7)?,
        counterparty_name: row.get(8)?,
        counterparty_account: row.get(9)?,
        counterparty_country: row.get(10)?,
        is_cash: row.get(11)?,
        occurred_at: row.get(12)?,
        risk_score: row.get(13)?,
        rule_score: row.get(14)?,
        ml_score: row.get(15)?,
        risk_factors: row.get(16)?,
        is_high_risk: row.get(17)?,
        requires_review: row.get(18)?,
        exceeds_threshold: row.get(19)?,
        is_structured: row.get(20)?,
        sanctions_hit: row.get(21)?,
        watchlist_hit: row.get(22)?,
        score_version: row.get(23)?,
    })
}
