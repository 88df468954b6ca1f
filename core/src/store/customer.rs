//! Customer registry and risk profile queries.

use super::{parse_col, AmlStore, CustomerRow, RiskProfileRow};
use crate::error::AmlResult;
use crate::types::{CustomerType, KycStatus, RiskLevel};
use rusqlite::{params, OptionalExtension};

impl AmlStore {
    pub fn insert_customer(&self, c: &CustomerRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO customers
             (customer_id, customer_type, full_name, account_number, country, occupation,
              is_pep, kyc_status, risk_score, risk_level, is_active, onboarded_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                c.customer_id,
                c.customer_type.as_str(),
                c.full_name,
                c.account_number,
                c.country,
                c.occupation,
                c.is_pep,
                c.kyc_status.as_str(),
                c.risk_score,
                c.risk_level.as_str(),
                c.is_active,
                c.onboarded_at,
                c.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_customer(&self, customer_id: &str) -> AmlResult<Option<CustomerRow>> {
        self.conn
            .query_row(
                "SELECT customer_id, customer_type, full_name, account_number, country,
                        occupation, is_pep, kyc_status, risk_score, risk_level, is_active,
                        onboarded_at, updated_at
                 FROM customers WHERE customer_id = ?1",
                params![customer_id],
                customer_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_active_customers(&self) -> AmlResult<Vec<CustomerRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, customer_type, full_name, account_number, country,
                    occupation, is_pep, kyc_status, risk_score, risk_level, is_active,
                    onboarded_at, updated_at
             FROM customers WHERE is_active = 1 ORDER BY customer_id",
        )?;
        let rows = stmt.query_map([], customer_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_customers(&self) -> AmlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn update_customer_risk(
        &self,
        customer_id: &str,
        score: f64,
        level: RiskLevel,
        now: i64,
    ) -> AmlResult<()> {
        self.conn.execute(
            "UPDATE customers SET risk_score = ?1, risk_level = ?2, updated_at = ?3
             WHERE customer_id = ?4",
            params![score, level.as_str(), now, customer_id],
        )?;
        Ok(())
    }

    pub fn set_customer_kyc(&self, customer_id: &str, status: KycStatus, now: i64) -> AmlResult<()> {
        self.conn.execute(
            "UPDATE customers SET kyc_status = ?1, updated_at = ?2 WHERE customer_id = ?3",
            params![status.as_str(), now, customer_id],
        )?;
        Ok(())
    }

    // ── Risk profiles ──────────────────────────────────────────

    /// Insert or refresh the scoring-owned profile columns. The
    /// workflow counters (str/alert/false-positive) are bumped
    /// separately and survive re-scores.
    pub fn upsert_risk_profile(&self, p: &RiskProfileRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO customer_risk_profiles
             (customer_id, geographic_risk, product_risk, channel_risk, customer_type_risk,
              transaction_risk, composite_score, risk_level, str_count, alert_count,
              false_positive_count, last_review_at, next_review_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(customer_id) DO UPDATE SET
                geographic_risk = excluded.geographic_risk,
                product_risk = excluded.product_risk,
                channel_risk = excluded.channel_risk,
                customer_type_risk = excluded.customer_type_risk,
                transaction_risk = excluded.transaction_risk,
                composite_score = excluded.composite_score,
                risk_level = excluded.risk_level,
                last_review_at = excluded.last_review_at,
                next_review_at = excluded.next_review_at",
            params![
                p.customer_id,
                p.geographic_risk,
                p.product_risk,
                p.channel_risk,
                p.customer_type_risk,
                p.transaction_risk,
                p.composite_score,
                p.risk_level.as_str(),
                p.str_count,
                p.alert_count,
                p.false_positive_count,
                p.last_review_at,
                p.next_review_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_risk_profile(&self, customer_id: &str) -> AmlResult<Option<RiskProfileRow>> {
        self.conn
            .query_row(
                "SELECT customer_id, geographic_risk, product_risk, channel_risk,
                        customer_type_risk, transaction_risk, composite_score, risk_level,
                        str_count, alert_count, false_positive_count, last_review_at,
                        next_review_at
                 FROM customer_risk_profiles WHERE customer_id = ?1",
                params![customer_id],
                |row| {
                    let level: String = row.get(7)?;
                    Ok(RiskProfileRow {
                        customer_id: row.get(0)?,
                        geographic_risk: row.get(1)?,
                        product_risk: row.get(2)?,
                        channel_risk: row.get(3)?,
                        customer_type_risk: row.get(4)?,
                        transaction_risk: row.get(5)?,
                        composite_score: row.get(6)?,
                        risk_level: parse_col(7, &level, RiskLevel::parse)?,
                        str_count: row.get(8)?,
                        alert_count: row.get(9)?,
                        false_positive_count: row.get(10)?,
                        last_review_at: row.get(11)?,
                        next_review_at: row.get(12)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn bump_profile_alert_count(&self, customer_id: &str) -> AmlResult<()> {
        self.bump_profile_counter(customer_id, "alert_count")
    }

    pub fn bump_profile_str_count(&self, customer_id: &str) -> AmlResult<()> {
        self.bump_profile_counter(customer_id, "str_count")
    }

    pub fn bump_profile_false_positive_count(&self, customer_id: &str) -> AmlResult<()> {
        self.bump_profile_counter(customer_id, "false_positive_count")
    }

    // Creates a stub profile row when the customer has never been scored.
    fn bump_profile_counter(&self, customer_id: &str, column: &str) -> AmlResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO customer_risk_profiles (customer_id, {column})
                 VALUES (?1, 1)
                 ON CONFLICT(customer_id) DO UPDATE SET {column} = {column} + 1"
            ),
            params![customer_id],
        )?;
        Ok(())
    }
}

fn customer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CustomerRow> {
    let customer_type: String = row.get(1)?;
    let kyc_status: String = row.get(7)?;
    let risk_level: String = row.get(9)?;
    Ok(CustomerRow {
        customer_id: row.get(0)?,
        customer_type: parse_col(1, &customer_type, CustomerType::parse)?,
        full_name: row.get(2)?,
        account_number: row.get(3)?,
        country: row.get(4)?,
        occupation: row.get(5)?,
        is_pep: row.get(6)?,
        kyc_status: parse_col(7, &kyc_status, KycStatus::parse)?,
        risk_score: row.get(8)?,
        risk_level: parse_col(9, &risk_level, RiskLevel::parse)?,
        is_active: row.get(10)?,
        onboarded_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
