use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{DeviceType, SessionId, TimeMs};
use crate::engine::session_manager::ScanRequest;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScanRequest {
    pub session_id: String,
    pub barcode: String,
    pub quantity: Option<i64>,
    pub device_type: Option<String>,
    pub product_id: Option<i64>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScanResponse {
    pub success: bool,
    pub event_id: i64,
    pub scan_result: String,
    pub fraud_score: i64,
    pub is_suspicious: bool,
    pub fraud_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

pub async fn record_scan(
    State(state): State<AppState>,
    Json(body): Json<RecordScanRequest>,
) -> Result<Json<RecordScanResponse>, AppError> {
    if body.session_id.is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }
    let device_type = match body.device_type.as_deref() {
        None => DeviceType::UsbScanner,
        Some(s) => DeviceType::from_str(s).map_err(|_| {
            AppError::Validation(format!(
                "deviceType must be one of: usb_scanner, bluetooth_scanner, camera, manual; got {}",
                s
            ))
        })?,
    };

    let recorded = state
        .sessions
        .record_scan(ScanRequest {
            session_id: SessionId::new(body.session_id),
            barcode: body.barcode,
            quantity: body.quantity.unwrap_or(1),
            device_type,
            product_id: body.product_id,
            ip_address: body.ip_address,
            scanned_at: TimeMs::now(),
        })
        .await?;

    Ok(Json(RecordScanResponse {
        success: true,
        event_id: recorded.event.event_id,
        scan_result: recorded.event.scan_result.to_string(),
        fraud_score: recorded.event.fraud_score,
        is_suspicious: recorded.event.is_suspicious,
        fraud_reasons: recorded.event.fraud_reasons,
        severity: recorded.severity.map(|s| s.to_string()),
    }))
}
