//! Watchlist entries and screening result persistence.

use super::{parse_col, AmlStore, ScreeningResultRow, WatchlistEntryRow};
use crate::error::AmlResult;
use crate::types::MatchStatus;
use rusqlite::params;

impl AmlStore {
    pub fn insert_watchlist_entry(&self, e: &WatchlistEntryRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO watchlist_entries
             (entry_id, list_type, program, full_name, aliases, country, is_active, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                e.entry_id,
                e.list_type,
                e.program,
                e.full_name,
                e.aliases,
                e.country,
                e.is_active,
                e.added_at,
            ],
        )?;
        Ok(())
    }

    pub fn active_watchlist_entries(&self) -> AmlResult<Vec<WatchlistEntryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT entry_id, list_type, program, full_name, aliases, country, is_active,
                    added_at
             FROM watchlist_entries WHERE is_active = 1 ORDER BY entry_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WatchlistEntryRow {
                entry_id: row.get(0)?,
                list_type: row.get(1)?,
                program: row.get(2)?,
                full_name: row.get(3)?,
                aliases: row.get(4)?,
                country: row.get(5)?,
                is_active: row.get(6)?,
                added_at: row.get(7)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_watchlist_entries(&self) -> AmlResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM watchlist_entries", [], |row| row.get(0))
            .map_err(Into::into)
    }

    pub fn insert_screening_result(&self, r: &ScreeningResultRow) -> AmlResult<()> {
        self.conn.execute(
            "INSERT INTO screening_results
             (screening_id, customer_id, transaction_id, screening_type, searched_name,
              entry_id, match_score, match_status, matched_field, screened_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                r.screening_id,
                r.customer_id,
                r.transaction_id,
                r.screening_type,
                r.searched_name,
                r.entry_id,
                r.match_score,
                r.match_status.as_str(),
                r.matched_field,
                r.screened_at,
            ],
        )?;
        Ok(())
    }

    pub fn screening_results_for_customer(
        &self,
        customer_id: &str,
    ) -> AmlResult<Vec<ScreeningResultRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT screening_id, customer_id, transaction_id, screening_type, searched_name,
                    entry_id, match_score, match_status, matched_field, screened_at
             FROM screening_results WHERE customer_id = ?1 ORDER BY screened_at, screening_id",
        )?;
        let rows = stmt.query_map(params![customer_id], screening_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn screening_results_for_transaction(
        &self,
        transaction_id: &str,
    ) -> AmlResult<Vec<ScreeningResultRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT screening_id, customer_id, transaction_id, screening_type, searched_name,
                    entry_id, match_score, match_status, matched_field, screened_at
             FROM screening_results WHERE transaction_id = ?1
             ORDER BY screened_at, screening_id",
        )?;
        let rows = stmt.query_map(params![transaction_id], screening_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Screenings that produced a confirmed or possible match.
    pub fn count_screening_hits(&self) -> AmlResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM screening_results WHERE match_status != 'no_match'",
                [],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

fn screening_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScreeningResultRow> {
    let match_status: String = row.get(7)?;
    Ok(ScreeningResultRow {
        screening_id: row.get(0)?,
        customer_id: row.get(1)?,
        transaction_id: row.get(2)?,
        screening_type: row.get(3)?,
        searched_name: row.get(4)?,
        entry_id: row.get(5)?,
        match_score: row.get(6)?,
        match_status: parse_col(7, &match_status, MatchStatus::parse)?,
        matched_field: row.get(8)?,
        screened_at: row.get(9)?,
    })
}
