use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Metric, Period};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub period: Option<String>,
    pub metric: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: i64,
    pub user_id: i64,
    pub score: f64,
    pub items_scanned: i64,
    pub avg_scans_per_minute: f64,
    pub avg_accuracy: f64,
    pub transfers_completed: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub success: bool,
    pub period: String,
    pub metric: String,
    pub entries: Vec<LeaderboardRow>,
}

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

pub async fn get_leaderboard(
    Query(params): Query<LeaderboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let period = match params.period.as_deref() {
        None => Period::Today,
        Some(s) => Period::from_str(s).map_err(|_| {
            AppError::Validation(format!(
                "period must be one of: daily, weekly, monthly, all_time; got {}",
                s
            ))
        })?,
    };
    let metric = match params.metric.as_deref() {
        None => Metric::Overall,
        Some(s) => Metric::from_str(s).map_err(|_| {
            AppError::Validation(format!(
                "metric must be one of: overall, speed, accuracy, volume; got {}",
                s
            ))
        })?,
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let entries = state.ranker.rank(period, metric, limit).await?;

    Ok(Json(LeaderboardResponse {
        success: true,
        period: period.to_string(),
        metric: metric.to_string(),
        entries: entries
            .iter()
            .map(|e| LeaderboardRow {
                rank: e.rank,
                user_id: e.user_id.as_i64(),
                score: e.score,
                items_scanned: e.items_scanned,
                avg_scans_per_minute: e.avg_scans_per_minute,
                avg_accuracy: e.avg_accuracy,
                transfers_completed: e.transfers_completed,
            })
            .collect(),
    }))
}
