//! Achievement catalogue and evaluation.
//!
//! Awards are append-only and unique per (user, code); evaluation recomputes
//! every predicate from stored facts, so replays and sweeps are safe.

use crate::db::repo::SessionMetrics;
use crate::db::Repository;
use crate::domain::{ScanResult, TimeMs, UserId};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Static catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AchievementDef {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const CATALOGUE: &[AchievementDef] = &[
    AchievementDef {
        code: "first_steps",
        name: "First Steps",
        description: "Complete your first receiving session",
    },
    AchievementDef {
        code: "speed_demon",
        name: "Speed Demon",
        description: "Complete 3 sessions at 30+ scans per minute",
    },
    AchievementDef {
        code: "sharpshooter",
        name: "Sharpshooter",
        description: "Complete 5 sessions with perfect accuracy",
    },
    AchievementDef {
        code: "century_club",
        name: "Century Club",
        description: "Scan 100 items across completed sessions",
    },
    AchievementDef {
        code: "clean_streak",
        name: "Clean Streak",
        description: "25 consecutive scans without an error",
    },
    AchievementDef {
        code: "daily_grinder",
        name: "Daily Grinder",
        description: "Complete sessions on 5 consecutive days",
    },
    AchievementDef {
        code: "marathon",
        name: "Marathon",
        description: "Complete 10 sessions in a single day",
    },
];

/// Everything the predicates need, loaded once per evaluation.
struct Facts {
    sessions: Vec<SessionMetrics>,
    scan_results: Vec<ScanResult>,
}

/// Per-code status for the achievements endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub earned: bool,
    pub earned_at: Option<i64>,
}

pub struct AchievementEvaluator {
    repo: Arc<Repository>,
}

impl AchievementEvaluator {
    pub fn new(repo: Arc<Repository>) -> Self {
        AchievementEvaluator { repo }
    }

    /// Evaluate every catalogue predicate for a user, awarding any newly
    /// satisfied ones. Returns the codes earned by this call.
    pub async fn evaluate(
        &self,
        user_id: UserId,
        now: TimeMs,
    ) -> Result<Vec<&'static str>, sqlx::Error> {
        let facts = self.load_facts(user_id).await?;
        let mut newly_earned = Vec::new();

        for def in CATALOGUE {
            if !predicate_holds(def.code, &facts) {
                continue;
            }
            if self.repo.insert_achievement(user_id, def.code, now).await? {
                info!(user_id = %user_id, code = def.code, "achievement earned");
                newly_earned.push(def.code);
            }
        }
        Ok(newly_earned)
    }

    /// Full catalogue with earned/locked status for a user.
    pub async fn check(&self, user_id: UserId) -> Result<Vec<AchievementStatus>, sqlx::Error> {
        let earned = self.repo.earned_achievements(user_id).await?;
        Ok(CATALOGUE
            .iter()
            .map(|def| {
                let hit = earned.iter().find(|a| a.achievement_code == def.code);
                AchievementStatus {
                    code: def.code,
                    name: def.name,
                    description: def.description,
                    earned: hit.is_some(),
                    earned_at: hit.map(|a| a.earned_at.as_i64()),
                }
            })
            .collect())
    }

    async fn load_facts(&self, user_id: UserId) -> Result<Facts, sqlx::Error> {
        Ok(Facts {
            sessions: self.repo.completed_session_metrics(user_id).await?,
            scan_results: self.repo.scan_results_for_user(user_id).await?,
        })
    }
}

fn predicate_holds(code: &str, facts: &Facts) -> bool {
    let sessions = &facts.sessions;
    match code {
        "first_steps" => !sessions.is_empty(),
        "speed_demon" => sessions.iter().filter(|s| s.scans_per_minute >= 30.0).count() >= 3,
        "sharpshooter" => sessions.iter().filter(|s| s.accuracy >= 1.0).count() >= 5,
        "century_club" => sessions.iter().map(|s| s.items_scanned).sum::<i64>() >= 100,
        "clean_streak" => longest_error_free_streak(&facts.scan_results) >= 25,
        "daily_grinder" => longest_consecutive_days(&completion_dates(sessions)) >= 5,
        "marathon" => max_sessions_in_one_day(&completion_dates(sessions)) >= 10,
        _ => false,
    }
}

fn completion_dates(sessions: &[SessionMetrics]) -> Vec<NaiveDate> {
    sessions.iter().map(|s| s.completed_at.date()).collect()
}

// Duplicates count toward the streak; only an error breaks it.
fn longest_error_free_streak(results: &[ScanResult]) -> usize {
    let mut best = 0;
    let mut run = 0;
    for r in results {
        if *r == ScanResult::Error {
            run = 0;
        } else {
            run += 1;
            best = best.max(run);
        }
    }
    best
}

/// Longest run of consecutive calendar days in an ascending date list.
/// Repeated dates extend nothing and break nothing.
fn longest_consecutive_days(dates: &[NaiveDate]) -> usize {
    let mut unique: Vec<NaiveDate> = dates.to_vec();
    unique.sort();
    unique.dedup();

    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for date in unique {
        run = match prev {
            Some(p) if date == p + chrono::Duration::days(1) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(date);
    }
    best
}

fn max_sessions_in_one_day(dates: &[NaiveDate]) -> usize {
    let mut counts = std::collections::HashMap::new();
    for date in dates {
        *counts.entry(*date).or_insert(0usize) += 1;
    }
    counts.into_values().max().unwrap_or(0)
}
