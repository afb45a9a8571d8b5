use axum::extract::{Query, State};
use axum::Json;
use futures::try_join;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Period, ReceivingSession, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceQuery {
    pub user_id: i64,
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRow {
    pub date: String,
    pub transfers_completed: i64,
    pub items_scanned: i64,
    pub error_count: i64,
    pub avg_scans_per_minute: f64,
    pub avg_accuracy: f64,
    pub performance_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSession {
    pub session_id: String,
    pub transfer_id: i64,
    pub completed_at: Option<i64>,
    pub items_scanned: i64,
    pub error_count: i64,
    pub scans_per_minute: f64,
    pub accuracy: f64,
    pub performance_score: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResponse {
    pub success: bool,
    pub user_id: i64,
    pub period: String,
    pub transfers_completed: i64,
    pub items_scanned: i64,
    pub error_count: i64,
    pub avg_scans_per_minute: f64,
    pub avg_accuracy: f64,
    pub avg_performance_score: f64,
    pub days: Vec<DayRow>,
    pub recent_sessions: Vec<RecentSession>,
}

const RECENT_SESSION_LIMIT: i64 = 10;

pub async fn get_performance(
    Query(params): Query<PerformanceQuery>,
    State(state): State<AppState>,
) -> Result<Json<PerformanceResponse>, AppError> {
    if params.user_id < 1 {
        return Err(AppError::Validation("userId must be positive".to_string()));
    }
    let user_id = UserId::new(params.user_id);
    let period = match params.period.as_deref() {
        None => Period::Today,
        Some(s) => Period::from_str(s).map_err(|_| {
            AppError::Validation(format!(
                "period must be one of: today, week, month, all_time; got {}",
                s
            ))
        })?,
    };

    let (window, recent) = try_join!(
        state.aggregator.performance_window(user_id, period),
        state.repo.recent_sessions(user_id, RECENT_SESSION_LIMIT),
    )?;

    Ok(Json(PerformanceResponse {
        success: true,
        user_id: params.user_id,
        period: period.to_string(),
        transfers_completed: window.transfers_completed,
        items_scanned: window.items_scanned,
        error_count: window.error_count,
        avg_scans_per_minute: window.avg_scans_per_minute,
        avg_accuracy: window.avg_accuracy,
        avg_performance_score: window.avg_performance_score,
        days: window
            .days
            .iter()
            .map(|d| DayRow {
                date: d.date.to_string(),
                transfers_completed: d.transfers_completed,
                items_scanned: d.items_scanned,
                error_count: d.error_count,
                avg_scans_per_minute: d.avg_scans_per_minute,
                avg_accuracy: d.avg_accuracy,
                performance_score: d.performance_score,
            })
            .collect(),
        recent_sessions: recent.iter().map(recent_row).collect(),
    }))
}

fn recent_row(s: &ReceivingSession) -> RecentSession {
    RecentSession {
        session_id: s.session_id.to_string(),
        transfer_id: s.transfer_id.as_i64(),
        completed_at: s.completed_at.map(|t| t.as_i64()),
        items_scanned: s.items_scanned,
        error_count: s.error_count,
        scans_per_minute: s.scans_per_minute.unwrap_or(0.0),
        accuracy: s.accuracy.unwrap_or(0.0),
        performance_score: s.performance_score.unwrap_or(0),
    }
}
