use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{AlertStatus, Period, ScanEvent, Severity, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousQuery {
    pub period: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousRow {
    pub event_id: i64,
    pub session_id: String,
    pub user_id: i64,
    pub outlet_id: i64,
    pub barcode: String,
    pub scan_result: String,
    pub scanned_at: i64,
    pub fraud_score: i64,
    pub fraud_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousResponse {
    pub success: bool,
    pub entries: Vec<SuspiciousRow>,
}

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub async fn get_suspicious_scans(
    Query(params): Query<SuspiciousQuery>,
    State(state): State<AppState>,
) -> Result<Json<SuspiciousResponse>, AppError> {
    let from_ms = match params.period.as_deref() {
        None => None,
        Some(s) => {
            let period = Period::from_str(s).map_err(|_| {
                AppError::Validation(format!(
                    "period must be one of: today, week, month, all_time; got {}",
                    s
                ))
            })?;
            period.start_date(TimeMs::now().date()).map(|d| {
                d.and_hms_opt(0, 0, 0)
                    .unwrap_or_default()
                    .and_utc()
                    .timestamp_millis()
            })
        }
    };
    let severity = params
        .severity
        .as_deref()
        .map(Severity::from_str)
        .transpose()
        .map_err(|_| {
            AppError::Validation(
                "severity must be one of: critical, high, medium, low".to_string(),
            )
        })?;
    let status = params
        .status
        .as_deref()
        .map(AlertStatus::from_str)
        .transpose()
        .map_err(|_| {
            AppError::Validation(
                "status must be one of: pending, reviewed, flagged, approved".to_string(),
            )
        })?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let scans = state
        .repo
        .suspicious_scans(from_ms, severity, status, limit, offset)
        .await?;

    Ok(Json(SuspiciousResponse {
        success: true,
        entries: scans
            .iter()
            .map(|s| SuspiciousRow {
                event_id: s.event.event_id,
                session_id: s.event.session_id.to_string(),
                user_id: s.event.user_id.as_i64(),
                outlet_id: s.event.outlet_id.as_i64(),
                barcode: s.event.barcode.clone(),
                scan_result: s.event.scan_result.to_string(),
                scanned_at: s.event.scanned_at.as_i64(),
                fraud_score: s.event.fraud_score,
                fraud_reasons: s.event.fraud_reasons.clone(),
                severity: Severity::from_score(s.event.fraud_score).map(|v| v.to_string()),
                alert_id: s.alert_id,
                alert_status: s.alert_status.map(|v| v.to_string()),
            })
            .collect(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDetailResponse {
    pub success: bool,
    pub event_id: i64,
    pub session_id: String,
    pub transfer_id: i64,
    pub user_id: i64,
    pub outlet_id: i64,
    pub barcode: String,
    pub quantity: i64,
    pub scan_result: String,
    pub device_type: String,
    pub scanned_at: i64,
    pub time_since_last_scan_ms: Option<i64>,
    pub is_suspicious: bool,
    pub fraud_score: i64,
    pub fraud_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

pub async fn get_scan_detail(
    Path(event_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ScanDetailResponse>, AppError> {
    let event = state
        .repo
        .get_scan_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("scan event {}", event_id)))?;

    Ok(Json(scan_detail(&event)))
}

fn scan_detail(event: &ScanEvent) -> ScanDetailResponse {
    ScanDetailResponse {
        success: true,
        event_id: event.event_id,
        session_id: event.session_id.to_string(),
        transfer_id: event.transfer_id.as_i64(),
        user_id: event.user_id.as_i64(),
        outlet_id: event.outlet_id.as_i64(),
        barcode: event.barcode.clone(),
        quantity: event.quantity,
        scan_result: event.scan_result.to_string(),
        device_type: event.device_type.to_string(),
        scanned_at: event.scanned_at.as_i64(),
        time_since_last_scan_ms: event.time_since_last_scan_ms,
        is_suspicious: event.is_suspicious,
        fraud_score: event.fraud_score,
        fraud_reasons: event.fraud_reasons.clone(),
        severity: Severity::from_score(event.fraud_score).map(|v| v.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAlertRequest {
    pub status: String,
    pub reviewed_by: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAlertResponse {
    pub success: bool,
    pub alert_id: i64,
    pub status: String,
}

pub async fn review_alert(
    Path(alert_id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<ReviewAlertRequest>,
) -> Result<Json<ReviewAlertResponse>, AppError> {
    let status = AlertStatus::from_str(&body.status).map_err(|_| {
        AppError::Validation(
            "status must be one of: reviewed, flagged, approved".to_string(),
        )
    })?;
    if status == AlertStatus::Pending {
        return Err(AppError::Validation(
            "an alert cannot be reviewed back to pending".to_string(),
        ));
    }

    state
        .repo
        .get_fraud_alert(alert_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("alert {}", alert_id)))?;

    state
        .repo
        .update_alert_status(alert_id, status, body.reviewed_by, TimeMs::now())
        .await?;

    Ok(Json(ReviewAlertResponse {
        success: true,
        alert_id,
        status: status.to_string(),
    }))
}
