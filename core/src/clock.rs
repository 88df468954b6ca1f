//! Engine clock: the single source of "now" for review dates, due
//! dates, audit stamps, and report numbers.
//!
//! Scoring maths never read the clock; they work off each transaction's
//! own timestamp. Tests pin the clock so date-derived outputs are exact.

use chrono::{DateTime, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineClock {
    /// Wall clock, used by live deployments and the runner.
    System,
    /// Frozen at a unix timestamp, used by tests.
    Fixed(i64),
}

impl EngineClock {
    /// Current time as unix seconds.
    pub fn now_ts(&self) -> i64 {
        match self {
            EngineClock::System => Utc::now().timestamp(),
            EngineClock::Fixed(ts) => *ts,
        }
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        match self {
            EngineClock::System => Utc::now(),
            EngineClock::Fixed(ts) => match Utc.timestamp_opt(*ts, 0) {
                chrono::LocalResult::Single(dt) => dt,
                _ => Utc::now(),
            },
        }
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        EngineClock::System
    }
}

/// Format a unix timestamp as UTC with a strftime pattern. Used for
/// case and report numbering. Out-of-range timestamps fall back to the
/// raw seconds value.
pub fn format_ts(ts: i64, fmt: &str) -> String {
    match Utc.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.format(fmt).to_string(),
        _ => ts.to_string(),
    }
}
