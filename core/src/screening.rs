//! Watchlist screening.
//!
//! Names are normalized (lowercased, punctuation stripped, whitespace
//! collapsed) and compared with a Dice coefficient over character
//! bigrams. Customers are screened at onboarding, counterparties at
//! ingest; every screening records its outcome, hits or not, and a
//! counterparty hit flags the transaction.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::config::ScreeningConfig;
use crate::error::AmlResult;
use crate::store::{AmlStore, CustomerRow, ScreeningResultRow, TransactionRow, WatchlistEntryRow};
use crate::types::MatchStatus;

/// List type whose hits set the sanctions flag on a transaction.
pub const LIST_SANCTIONS: &str = "sanctions";

fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_space = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if c.is_whitespace() && !last_space {
            out.push(' ');
            last_space = true;
        }
        // Punctuation is dropped outright, so O'Brien matches OBrien.
    }
    out.trim_end().to_string()
}

fn bigrams(s: &str) -> BTreeMap<(char, char), i64> {
    let chars: Vec<char> = s.chars().collect();
    let mut out = BTreeMap::new();
    for w in chars.windows(2) {
        *out.entry((w[0], w[1])).or_insert(0) += 1;
    }
    out
}

/// Dice coefficient over bigram multisets of the normalized names, 0-1.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }
    let ba = bigrams(&na);
    let bb = bigrams(&nb);
    let total = (ba.values().sum::<i64>() + bb.values().sum::<i64>()) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let mut overlap = 0i64;
    for (bg, ca) in &ba {
        if let Some(cb) = bb.get(bg) {
            overlap += (*ca).min(*cb);
        }
    }
    2.0 * overlap as f64 / total
}

#[derive(Debug, Clone)]
struct NameMatch {
    entry_id: String,
    list_type: String,
    /// Similarity ratio, 0-1.
    score: f64,
    matched_field: &'static str,
    matched_name: String,
}

pub struct WatchlistScreener {
    config: ScreeningConfig,
}

impl WatchlistScreener {
    pub fn new(config: ScreeningConfig) -> Self {
        Self { config }
    }

    fn status_for(&self, score: f64) -> MatchStatus {
        if score >= self.config.confirm_threshold {
            MatchStatus::ConfirmedMatch
        } else if score >= self.config.match_threshold {
            MatchStatus::PossibleMatch
        } else {
            MatchStatus::NoMatch
        }
    }

    /// Best candidate across all entries. Aliases are only consulted
    /// when the primary name missed, and the first alias hit wins for
    /// that entry.
    fn search(&self, name: &str, entries: &[WatchlistEntryRow]) -> Option<NameMatch> {
        let mut best: Option<NameMatch> = None;
        for entry in entries {
            let primary = name_similarity(name, &entry.full_name);
            consider(&mut best, entry, primary, "name", &entry.full_name);
            if primary >= self.config.match_threshold {
                continue;
            }
            let aliases: Vec<String> = match serde_json::from_str(&entry.aliases) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!(
                        "watchlist entry {} has malformed aliases: {e}",
                        entry.entry_id
                    );
                    Vec::new()
                }
            };
            for alias in &aliases {
                let score = name_similarity(name, alias);
                if score >= self.config.match_threshold {
                    consider(&mut best, entry, score, "alias", alias);
                    break;
                }
            }
        }
        best
    }

    fn result_row(
        &self,
        customer_id: Option<&str>,
        transaction_id: Option<&str>,
        screening_type: &str,
        searched_name: &str,
        best: Option<&NameMatch>,
        now: i64,
    ) -> ScreeningResultRow {
        let score = best.map(|m| m.score).unwrap_or(0.0);
        let status = self.status_for(score);
        let hit = status != MatchStatus::NoMatch;
        ScreeningResultRow {
            screening_id: Uuid::new_v4().to_string(),
            customer_id: customer_id.map(str::to_string),
            transaction_id: transaction_id.map(str::to_string),
            screening_type: screening_type.to_string(),
            searched_name: searched_name.to_string(),
            entry_id: best.filter(|_| hit).map(|m| m.entry_id.clone()),
            match_score: score * 100.0,
            match_status: status,
            matched_field: best.filter(|_| hit).map(|m| m.matched_field.to_string()),
            screened_at: now,
        }
    }

    /// Screen a customer's legal name against the active watchlist.
    pub fn screen_customer(
        &self,
        store: &AmlStore,
        customer: &CustomerRow,
        now: i64,
    ) -> AmlResult<ScreeningResultRow> {
        let entries = store.active_watchlist_entries()?;
        let best = self.search(&customer.full_name, &entries);
        let row = self.result_row(
            Some(&customer.customer_id),
            None,
            "customer",
            &customer.full_name,
            best.as_ref(),
            now,
        );
        store.insert_screening_result(&row)?;
        if row.match_status != MatchStatus::NoMatch {
            if let Some(m) = &best {
                log::warn!(
                    "customer {} name matched '{}' on watchlist entry {} ({:.2})",
                    customer.customer_id,
                    m.matched_name,
                    m.entry_id,
                    m.score
                );
            }
        }
        Ok(row)
    }

    /// Screen a transaction's counterparty. No counterparty, no
    /// screening. A hit flags the transaction, and sanctions-list hits
    /// set the sanctions flag.
    pub fn screen_transaction(
        &self,
        store: &AmlStore,
        txn: &TransactionRow,
        now: i64,
    ) -> AmlResult<Option<ScreeningResultRow>> {
        let name = match txn.counterparty_name.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => return Ok(None),
        };
        let entries = store.active_watchlist_entries()?;
        let best = self.search(name, &entries);
        let row = self.result_row(
            None,
            Some(&txn.transaction_id),
            "transaction",
            name,
            best.as_ref(),
            now,
        );
        store.insert_screening_result(&row)?;
        if row.match_status != MatchStatus::NoMatch {
            if let Some(m) = &best {
                let sanctions = m.list_type == LIST_SANCTIONS;
                store.mark_transaction_hit(&txn.transaction_id, sanctions)?;
                log::warn!(
                    "counterparty '{name}' on transaction {} matched '{}' on watchlist \
                     entry {} ({:.2})",
                    txn.transaction_id,
                    m.matched_name,
                    m.entry_id,
                    m.score
                );
            }
        }
        Ok(Some(row))
    }
}

fn consider(
    best: &mut Option<NameMatch>,
    entry: &WatchlistEntryRow,
    score: f64,
    field: &'static str,
    matched_name: &str,
) {
    if score <= 0.0 {
        return;
    }
    let better = best.as_ref().map(|b| score > b.score).unwrap_or(true);
    if better {
        *best = Some(NameMatch {
            entry_id: entry.entry_id.clone(),
            list_type: entry.list_type.clone(),
            score,
            matched_field: field,
            matched_name: matched_name.to_string(),
        });
    }
}

/// Add an active watchlist entry. Aliases are stored as a JSON array.
pub fn add_watchlist_entry(
    store: &AmlStore,
    entry_id: &str,
    list_type: &str,
    program: Option<&str>,
    full_name: &str,
    aliases: &[String],
    country: Option<&str>,
    now: i64,
) -> AmlResult<WatchlistEntryRow> {
    let row = WatchlistEntryRow {
        entry_id: entry_id.to_string(),
        list_type: list_type.to_string(),
        program: program.map(str::to_string),
        full_name: full_name.to_string(),
        aliases: serde_json::to_string(aliases)?,
        country: country.map(str::to_string),
        is_active: true,
        added_at: now,
    };
    store.insert_watchlist_entry(&row)?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_names_score_one() {
        assert_eq!(name_similarity("John Smith", "John Smith"), 1.0);
    }

    #[test]
    fn normalization_ignores_case_and_punctuation() {
        assert_eq!(name_similarity("O'Brien, Patrick", "obrien patrick"), 1.0);
        assert_eq!(name_similarity("John   Smith.", "john smith"), 1.0);
    }

    #[test]
    fn near_miss_scores_below_one() {
        let s = name_similarity("John Smith", "Jon Smith");
        assert!(s > 0.7 && s < 1.0, "got {s}");
    }

    #[test]
    fn unrelated_names_score_low() {
        let s = name_similarity("John Smith", "Wei Zhang");
        assert!(s < 0.2, "got {s}");
    }

    #[test]
    fn empty_name_scores_zero() {
        assert_eq!(name_similarity("", "John Smith"), 0.0);
        assert_eq!(name_similarity("  .  ", "John Smith"), 0.0);
    }
}
