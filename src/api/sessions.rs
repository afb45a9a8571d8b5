use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{OutletId, SessionId, TimeMs, TransferId, UserId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub transfer_id: i64,
    pub transfer_type: Option<String>,
    pub user_id: i64,
    pub outlet_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub resumed: bool,
    pub state: String,
    pub started_at: i64,
}

pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, AppError> {
    if body.transfer_id < 1 || body.user_id < 1 || body.outlet_id < 1 {
        return Err(AppError::Validation(
            "transferId, userId and outletId must be positive".to_string(),
        ));
    }
    let transfer_type = body
        .transfer_type
        .unwrap_or_else(|| "stock_transfer".to_string());

    let outcome = state
        .sessions
        .start_session(
            TransferId::new(body.transfer_id),
            transfer_type,
            UserId::new(body.user_id),
            OutletId::new(body.outlet_id),
            TimeMs::now(),
        )
        .await?;

    Ok(Json(StartSessionResponse {
        success: true,
        session_id: outcome.session.session_id.to_string(),
        resumed: outcome.resumed,
        state: outcome.session.state.to_string(),
        started_at: outcome.session.started_at.as_i64(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSessionRequest {
    pub session_id: String,
    pub transfer_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub items_scanned: i64,
    pub error_count: i64,
    pub duration_seconds: i64,
    pub scans_per_minute: f64,
    pub accuracy: f64,
    pub performance_score: i64,
    pub achievements_earned: Vec<&'static str>,
}

pub async fn complete_session(
    State(state): State<AppState>,
    Json(body): Json<CompleteSessionRequest>,
) -> Result<Json<CompleteSessionResponse>, AppError> {
    if body.session_id.is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }

    let outcome = state
        .sessions
        .complete_session(
            &SessionId::new(body.session_id),
            TransferId::new(body.transfer_id),
            UserId::new(body.user_id),
            TimeMs::now(),
        )
        .await?;

    Ok(Json(CompleteSessionResponse {
        success: true,
        session_id: outcome.session_id.to_string(),
        items_scanned: outcome.items_scanned,
        error_count: outcome.error_count,
        duration_seconds: outcome.summary.duration_seconds,
        scans_per_minute: outcome.summary.scans_per_minute,
        accuracy: outcome.summary.accuracy,
        performance_score: outcome.summary.performance_score,
        achievements_earned: outcome.achievements_earned,
    }))
}
