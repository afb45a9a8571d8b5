//! Leaderboard computation with a small TTL memo cache.

use crate::db::repo::UserAggregate;
use crate::db::Repository;
use crate::domain::{LeaderboardEntry, Metric, Period, TimeMs};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct CachedBoard {
    computed_at: Instant,
    entries: Vec<LeaderboardEntry>,
}

/// Computes and caches per-period, per-metric rankings. The cache is a pure
/// memo over the stats table; eviction never loses data.
pub struct LeaderboardRanker {
    repo: Arc<Repository>,
    cache: Mutex<HashMap<(Period, Metric), CachedBoard>>,
    ttl: Duration,
}

impl LeaderboardRanker {
    pub fn new(repo: Arc<Repository>, ttl: Duration) -> Self {
        LeaderboardRanker {
            repo,
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Ranked board for a period and metric, truncated to `limit` rows.
    /// Serves a cached board when one is fresh.
    pub async fn rank(
        &self,
        period: Period,
        metric: Metric,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(board) = cache.get(&(period, metric)) {
                if board.computed_at.elapsed() < self.ttl {
                    return Ok(truncate(&board.entries, limit));
                }
            }
        }

        let today = TimeMs::now().date();
        let aggregates = self
            .repo
            .aggregate_stats_by_user(period.start_date(today))
            .await?;
        let entries = compute_board(&aggregates, metric);

        let result = truncate(&entries, limit);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            (period, metric),
            CachedBoard {
                computed_at: Instant::now(),
                entries,
            },
        );
        Ok(result)
    }

    /// Drop cached boards whose window covers `date`. Called after a stat
    /// row for that date changes.
    pub fn invalidate_for_date(&self, date: NaiveDate) {
        let today = TimeMs::now().date();
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.retain(|(period, _), _| !period.contains(date, today));
    }
}

fn truncate(entries: &[LeaderboardEntry], limit: usize) -> Vec<LeaderboardEntry> {
    entries.iter().take(limit).cloned().collect()
}

/// Deterministic ranking: score descending, then earliest first completion,
/// then user id. Equal inputs always produce the identical board.
fn compute_board(aggregates: &[UserAggregate], metric: Metric) -> Vec<LeaderboardEntry> {
    let max_speed = aggregates
        .iter()
        .map(|a| a.avg_scans_per_minute)
        .fold(0.0_f64, f64::max);
    let max_volume = aggregates.iter().map(|a| a.items_scanned).max().unwrap_or(0);

    let mut scored: Vec<(&UserAggregate, f64)> = aggregates
        .iter()
        .map(|a| (a, metric_score(a, metric, max_speed, max_volume)))
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.first_completed_ms.cmp(&b.first_completed_ms))
            .then(a.user_id.cmp(&b.user_id))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (a, score))| LeaderboardEntry {
            rank: i as i64 + 1,
            user_id: a.user_id,
            score,
            items_scanned: a.items_scanned,
            avg_scans_per_minute: a.avg_scans_per_minute,
            avg_accuracy: a.avg_accuracy,
            transfers_completed: a.transfers_completed,
        })
        .collect()
}

/// Metric score on a 0-100 scale. Speed and volume are normalized against
/// the cohort maximum so the composite weighs comparable quantities.
fn metric_score(a: &UserAggregate, metric: Metric, max_speed: f64, max_volume: i64) -> f64 {
    let speed = if max_speed > 0.0 {
        a.avg_scans_per_minute / max_speed * 100.0
    } else {
        0.0
    };
    let accuracy = a.avg_accuracy * 100.0;
    let volume = if max_volume > 0 {
        a.items_scanned as f64 / max_volume as f64 * 100.0
    } else {
        0.0
    };
    match metric {
        Metric::Speed => speed,
        Metric::Accuracy => accuracy,
        Metric::Volume => volume,
        Metric::Overall => speed * 0.4 + accuracy * 0.4 + volume * 0.2,
    }
}
