//! Aggregated statistics types: daily stats, periods, metrics, achievements.

use crate::domain::{OutletId, TimeMs, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row per (user, outlet, date) summarizing that day's completed sessions.
/// Rebuilt by full recompute on every session completion, never incremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPerformanceStat {
    pub user_id: UserId,
    pub outlet_id: OutletId,
    pub date: NaiveDate,
    pub transfers_completed: i64,
    pub items_scanned: i64,
    pub error_count: i64,
    pub avg_scans_per_minute: f64,
    /// Mean session accuracy on [0, 1].
    pub avg_accuracy: f64,
    pub performance_score: f64,
    /// Earliest completion timestamp contributing to this row; feeds the
    /// leaderboard tie-break.
    pub first_completed_ms: i64,
}

/// Reporting window for performance and leaderboard queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Week,
    Month,
    AllTime,
}

impl Period {
    /// Inclusive start date of the window ending at `today`, or None for the
    /// unbounded all-time window (which scans full history).
    pub fn start_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::Today => Some(today),
            Period::Week => Some(today - chrono::Duration::days(6)),
            Period::Month => Some(today - chrono::Duration::days(29)),
            Period::AllTime => None,
        }
    }

    /// Whether `date` falls inside the window ending at `today`.
    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        if date > today {
            return false;
        }
        match self.start_date(today) {
            Some(start) => date >= start,
            None => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::AllTime => "all_time",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Period {
    type Err = ();

    // Accepts both the performance ("today") and leaderboard ("daily")
    // spellings the dashboards send.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" | "daily" => Ok(Period::Today),
            "week" | "weekly" => Ok(Period::Week),
            "month" | "monthly" => Ok(Period::Month),
            "all_time" | "alltime" | "all" => Ok(Period::AllTime),
            _ => Err(()),
        }
    }
}

/// Leaderboard ranking metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Weighted composite: speed 40%, accuracy 40%, volume 20%.
    Overall,
    Speed,
    Accuracy,
    Volume,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Overall => "overall",
            Metric::Speed => "speed",
            Metric::Accuracy => "accuracy",
            Metric::Volume => "volume",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overall" => Ok(Metric::Overall),
            "speed" => Ok(Metric::Speed),
            "accuracy" => Ok(Metric::Accuracy),
            "volume" => Ok(Metric::Volume),
            _ => Err(()),
        }
    }
}

/// Cached ranking row; rebuilt from stats, never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: UserId,
    pub score: f64,
    pub items_scanned: i64,
    pub avg_scans_per_minute: f64,
    pub avg_accuracy: f64,
    pub transfers_completed: i64,
}

/// An earned milestone, unique per (user, code), append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub user_id: UserId,
    pub achievement_code: String,
    pub earned_at: TimeMs,
}
