//! Quota tracking types
//!
//! Window policy, counter snapshots and the result of a consume attempt.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Window Types
// ============================================================================

/// Calendar period over which the call counter accumulates (UTC).
///
/// Each period gets its own counter row, keyed by [`QuotaWindowType::window_key`],
/// so quota recovers when the period rolls over without any reset job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaWindowType {
    /// Clock hour
    Hourly,
    /// Calendar day
    Daily,
    /// Calendar month
    Monthly,
}

impl Default for QuotaWindowType {
    fn default() -> Self {
        QuotaWindowType::Daily
    }
}

impl std::fmt::Display for QuotaWindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaWindowType::Hourly => write!(f, "hourly"),
            QuotaWindowType::Daily => write!(f, "daily"),
            QuotaWindowType::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for QuotaWindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hourly" | "hour" => Ok(QuotaWindowType::Hourly),
            "daily" | "day" => Ok(QuotaWindowType::Daily),
            "monthly" | "month" => Ok(QuotaWindowType::Monthly),
            _ => Err(format!("Unknown window type: {}", s)),
        }
    }
}

impl QuotaWindowType {
    /// Start of the window containing `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let naive = match self {
            QuotaWindowType::Hourly => date.and_hms_opt(now.hour(), 0, 0),
            QuotaWindowType::Daily => date.and_hms_opt(0, 0, 0),
            QuotaWindowType::Monthly => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        };
        naive
            .map(|n| Utc.from_utc_datetime(&n))
            .unwrap_or(now)
    }

    /// Instant the window containing `now` rolls over
    pub fn window_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.window_start(now);
        match self {
            QuotaWindowType::Hourly => start + Duration::hours(1),
            QuotaWindowType::Daily => start + Duration::days(1),
            QuotaWindowType::Monthly => {
                let (year, month) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
                    .single()
                    .unwrap_or(start + Duration::days(31))
            }
        }
    }

    /// Counter key for the window containing `now`
    pub fn window_key(&self, now: DateTime<Utc>) -> String {
        match self {
            QuotaWindowType::Hourly => format!("hour:{}", now.format("%Y-%m-%dT%H")),
            QuotaWindowType::Daily => format!("day:{}", now.format("%Y-%m-%d")),
            QuotaWindowType::Monthly => format!("month:{}", now.format("%Y-%m")),
        }
    }

    /// Longest possible window, in whole days
    pub fn max_days(&self) -> i32 {
        match self {
            QuotaWindowType::Hourly | QuotaWindowType::Daily => 1,
            QuotaWindowType::Monthly => 31,
        }
    }

    /// Human phrase for "when quota comes back", used in client messages
    pub fn retry_hint(&self) -> &'static str {
        match self {
            QuotaWindowType::Hourly => "next hour",
            QuotaWindowType::Daily => "tomorrow",
            QuotaWindowType::Monthly => "next month",
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Limit plus window: everything needed to gate a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub limit: i64,
    pub window: QuotaWindowType,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_QUOTA_LIMIT,
            window: QuotaWindowType::Daily,
        }
    }
}

/// Calls allowed per window when nothing is configured
pub const DEFAULT_QUOTA_LIMIT: i64 = 600;

impl QuotaPolicy {
    pub fn new(limit: i64, window: QuotaWindowType) -> Self {
        Self {
            limit: limit.max(0),
            window,
        }
    }

    /// Key of the window that is current right now
    pub fn current_key(&self) -> String {
        self.window.window_key(Utc::now())
    }

    /// When the current window rolls over
    pub fn current_window_end(&self) -> DateTime<Utc> {
        self.window.window_end(Utc::now())
    }
}

// ============================================================================
// Counter
// ============================================================================

/// State of one window's counter. `0 <= count <= limit` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCounter {
    pub window_key: String,
    pub count: i64,
    pub limit: i64,
}

impl QuotaCounter {
    pub fn remaining(&self) -> i64 {
        (self.limit - self.count).max(0)
    }
}

/// Result of an atomic check-and-increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumeOutcome {
    /// One unit was taken; `remaining` is the capacity left afterwards
    Consumed { remaining: i64 },
    /// The window is at its limit; nothing was changed
    Exhausted,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_window_type_display_and_parse() {
        assert_eq!(QuotaWindowType::Daily.to_string(), "daily");
        assert_eq!("hour".parse::<QuotaWindowType>().unwrap(), QuotaWindowType::Hourly);
        assert_eq!("Monthly".parse::<QuotaWindowType>().unwrap(), QuotaWindowType::Monthly);
        assert!("weekly".parse::<QuotaWindowType>().is_err());
    }

    #[test]
    fn test_daily_window_key_rolls_at_midnight() {
        let late = at(2026, 10, 19, 23, 59);
        let early = at(2026, 10, 20, 0, 1);
        assert_eq!(QuotaWindowType::Daily.window_key(late), "day:2026-10-19");
        assert_eq!(QuotaWindowType::Daily.window_key(early), "day:2026-10-20");
        assert_eq!(QuotaWindowType::Daily.window_end(late), at(2026, 10, 20, 0, 0));
    }

    #[test]
    fn test_hourly_window() {
        let now = at(2026, 10, 19, 14, 30);
        assert_eq!(QuotaWindowType::Hourly.window_key(now), "hour:2026-10-19T14");
        assert_eq!(QuotaWindowType::Hourly.window_start(now), at(2026, 10, 19, 14, 0));
        assert_eq!(QuotaWindowType::Hourly.window_end(now), at(2026, 10, 19, 15, 0));
    }

    #[test]
    fn test_monthly_window_wraps_year() {
        let now = at(2026, 12, 31, 12, 0);
        assert_eq!(QuotaWindowType::Monthly.window_key(now), "month:2026-12");
        assert_eq!(QuotaWindowType::Monthly.window_start(now), at(2026, 12, 1, 0, 0));
        assert_eq!(QuotaWindowType::Monthly.window_end(now), at(2027, 1, 1, 0, 0));
    }

    #[test]
    fn test_policy_clamps_negative_limit() {
        let policy = QuotaPolicy::new(-3, QuotaWindowType::Daily);
        assert_eq!(policy.limit, 0);
        assert_eq!(QuotaPolicy::default().limit, DEFAULT_QUOTA_LIMIT);
    }

    #[test]
    fn test_counter_remaining() {
        let counter = QuotaCounter {
            window_key: "day:2026-10-19".to_string(),
            count: 598,
            limit: 600,
        };
        assert_eq!(counter.remaining(), 2);
    }
}
