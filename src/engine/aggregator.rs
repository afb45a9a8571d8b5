//! Daily performance aggregation.
//!
//! Stat rows are always rebuilt by full recompute over the day's completed
//! sessions, never incremented, so re-processing a session is harmless.

use crate::db::Repository;
use crate::domain::{
    DailyPerformanceStat, OutletId, Period, ReceivingSession, TimeMs, UserId,
};
use crate::engine::ranker::LeaderboardRanker;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub struct PerformanceAggregator {
    repo: Arc<Repository>,
    ranker: Arc<LeaderboardRanker>,
}

/// Period totals plus the per-day breakdown backing them.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceWindow {
    pub period: Period,
    pub transfers_completed: i64,
    pub items_scanned: i64,
    pub error_count: i64,
    pub avg_scans_per_minute: f64,
    pub avg_accuracy: f64,
    pub avg_performance_score: f64,
    pub days: Vec<DailyPerformanceStat>,
}

impl PerformanceAggregator {
    pub fn new(repo: Arc<Repository>, ranker: Arc<LeaderboardRanker>) -> Self {
        PerformanceAggregator { repo, ranker }
    }

    /// Rebuild the (user, outlet, day) stat row covering a just-completed
    /// session and invalidate leaderboards whose window includes that day.
    pub async fn on_session_complete(
        &self,
        session: &ReceivingSession,
    ) -> Result<(), sqlx::Error> {
        let Some(completed_at) = session.completed_at else {
            return Ok(());
        };
        let date = completed_at.date();

        let sessions = self
            .repo
            .completed_sessions_for_day(session.user_id, session.outlet_id, date)
            .await?;
        let stat = recompute_day(session.user_id, session.outlet_id, date, &sessions);
        self.repo.upsert_daily_stat(&stat).await?;
        self.ranker.invalidate_for_date(date);

        debug!(
            user_id = %session.user_id,
            date = %date,
            transfers = stat.transfers_completed,
            "daily stat recomputed"
        );
        Ok(())
    }

    /// Reduce a user's stat rows over a reporting window.
    pub async fn performance_window(
        &self,
        user_id: UserId,
        period: Period,
    ) -> Result<PerformanceWindow, sqlx::Error> {
        let today = TimeMs::now().date();
        let days = self
            .repo
            .stats_for_user(user_id, period.start_date(today))
            .await?;

        let transfers_completed: i64 = days.iter().map(|d| d.transfers_completed).sum();
        let items_scanned: i64 = days.iter().map(|d| d.items_scanned).sum();
        let error_count: i64 = days.iter().map(|d| d.error_count).sum();
        let n = days.len() as f64;
        let (avg_spm, avg_acc, avg_score) = if days.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                days.iter().map(|d| d.avg_scans_per_minute).sum::<f64>() / n,
                days.iter().map(|d| d.avg_accuracy).sum::<f64>() / n,
                days.iter().map(|d| d.performance_score).sum::<f64>() / n,
            )
        };

        Ok(PerformanceWindow {
            period,
            transfers_completed,
            items_scanned,
            error_count,
            avg_scans_per_minute: avg_spm,
            avg_accuracy: avg_acc,
            avg_performance_score: avg_score,
            days,
        })
    }
}

/// One day's stat row from its completed sessions.
fn recompute_day(
    user_id: UserId,
    outlet_id: OutletId,
    date: chrono::NaiveDate,
    sessions: &[ReceivingSession],
) -> DailyPerformanceStat {
    let n = sessions.len() as f64;
    let mean = |f: &dyn Fn(&ReceivingSession) -> f64| -> f64 {
        if sessions.is_empty() {
            0.0
        } else {
            sessions.iter().map(f).sum::<f64>() / n
        }
    };

    DailyPerformanceStat {
        user_id,
        outlet_id,
        date,
        transfers_completed: sessions.len() as i64,
        items_scanned: sessions.iter().map(|s| s.items_scanned).sum(),
        error_count: sessions.iter().map(|s| s.error_count).sum(),
        avg_scans_per_minute: mean(&|s| s.scans_per_minute.unwrap_or(0.0)),
        avg_accuracy: mean(&|s| s.accuracy.unwrap_or(0.0)),
        performance_score: mean(&|s| s.performance_score.unwrap_or(0) as f64),
        first_completed_ms: sessions
            .iter()
            .filter_map(|s| s.completed_at)
            .map(|t| t.as_i64())
            .min()
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SessionState, TransferId};

    fn completed(transfer: i64, completed_ms: i64, items: i64, errors: i64) -> ReceivingSession {
        let mut s = ReceivingSession::start(
            TransferId::new(transfer),
            "stock_transfer".to_string(),
            UserId::new(1),
            OutletId::new(1),
            TimeMs::new(completed_ms - 60_000),
        );
        s.state = SessionState::Completed;
        s.completed_at = Some(TimeMs::new(completed_ms));
        s.items_scanned = items;
        s.error_count = errors;
        s.scans_per_minute = Some(items as f64);
        s.accuracy = Some(1.0 - errors as f64 / items.max(1) as f64);
        s.performance_score = Some(80);
        s
    }

    #[test]
    fn test_recompute_day_sums_and_means() {
        let date: chrono::NaiveDate = "2024-06-15".parse().unwrap();
        let sessions = vec![
            completed(1, 1_000_000, 20, 0),
            completed(2, 2_000_000, 10, 2),
        ];
        let stat = recompute_day(UserId::new(1), OutletId::new(1), date, &sessions);
        assert_eq!(stat.transfers_completed, 2);
        assert_eq!(stat.items_scanned, 30);
        assert_eq!(stat.error_count, 2);
        assert!((stat.avg_scans_per_minute - 15.0).abs() < 1e-9);
        assert_eq!(stat.first_completed_ms, 1_000_000);
    }

    #[test]
    fn test_recompute_empty_day() {
        let date: chrono::NaiveDate = "2024-06-15".parse().unwrap();
        let stat = recompute_day(UserId::new(1), OutletId::new(1), date, &[]);
        assert_eq!(stat.transfers_completed, 0);
        assert_eq!(stat.avg_accuracy, 0.0);
        assert_eq!(stat.first_completed_ms, 0);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let date: chrono::NaiveDate = "2024-06-15".parse().unwrap();
        let sessions = vec![completed(1, 1_000_000, 20, 0)];
        let a = recompute_day(UserId::new(1), OutletId::new(1), date, &sessions);
        let b = recompute_day(UserId::new(1), OutletId::new(1), date, &sessions);
        assert_eq!(a, b);
    }
}
