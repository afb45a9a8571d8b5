use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{OutletId, TimeMs, TransferId, UserId};
use crate::error::AppError;
use crate::settings::{preset_overrides, SettingsLevel, SettingsScope};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsQuery {
    pub user_id: Option<i64>,
    pub outlet_id: Option<i64>,
    pub transfer_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub success: bool,
    pub min_scan_interval_ms: i64,
    pub sequential_window: i64,
    pub max_quantity_per_scan: i64,
    pub symbology: String,
    /// Layers that contributed at least one override, in cascade order.
    pub sources: Vec<String>,
}

pub async fn get_settings(
    Query(params): Query<SettingsQuery>,
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    let scope = SettingsScope {
        user_id: params.user_id.map(UserId::new),
        outlet_id: params.outlet_id.map(OutletId::new),
        transfer_id: params.transfer_id.map(TransferId::new),
    };
    let resolved = state.settings.resolve(scope).await?;

    Ok(Json(SettingsResponse {
        success: true,
        min_scan_interval_ms: resolved.effective.min_scan_interval_ms,
        sequential_window: resolved.effective.sequential_window,
        max_quantity_per_scan: resolved.effective.max_quantity_per_scan,
        symbology: resolved.effective.symbology.to_string(),
        sources: resolved.sources.iter().map(|s| s.to_string()).collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPresetRequest {
    pub preset: String,
    pub level: String,
    pub scope_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPresetResponse {
    pub success: bool,
    pub preset: String,
    pub level: String,
    pub scope_id: i64,
    pub applied_at: i64,
}

pub async fn apply_preset(
    State(state): State<AppState>,
    Json(body): Json<ApplyPresetRequest>,
) -> Result<Json<ApplyPresetResponse>, AppError> {
    let overrides = preset_overrides(&body.preset).ok_or_else(|| {
        AppError::Validation(format!(
            "preset must be one of: relaxed, standard, strict; got {}",
            body.preset
        ))
    })?;
    let level = SettingsLevel::from_str(&body.level).map_err(|_| {
        AppError::Validation(format!(
            "level must be one of: global, outlet, user, transfer; got {}",
            body.level
        ))
    })?;
    if level == SettingsLevel::Global && body.scope_id != 0 {
        return Err(AppError::Validation(
            "global settings use scopeId 0".to_string(),
        ));
    }
    if level != SettingsLevel::Global && body.scope_id < 1 {
        return Err(AppError::Validation(
            "scopeId must be positive for non-global levels".to_string(),
        ));
    }

    // The global layer must stay complete; a partial preset merges over the
    // current global row instead of replacing it.
    let overrides = if level == SettingsLevel::Global {
        let current = state
            .repo
            .load_settings_layer(SettingsLevel::Global, 0)
            .await?
            .unwrap_or_default();
        overrides.overlaid_on(&current)
    } else {
        overrides
    };

    state
        .repo
        .upsert_settings_layer(level, body.scope_id, &overrides)
        .await?;

    Ok(Json(ApplyPresetResponse {
        success: true,
        preset: body.preset,
        level: level.to_string(),
        scope_id: body.scope_id,
        applied_at: TimeMs::now().as_i64(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetLayerRequest {
    pub level: String,
    pub scope_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetLayerResponse {
    pub success: bool,
    pub level: String,
    pub scope_id: i64,
    pub removed: bool,
}

/// Delete one layer's override row so resolution falls through to the layers
/// beneath it. The global layer cannot be reset; scoring requires it.
pub async fn reset_layer(
    State(state): State<AppState>,
    Json(body): Json<ResetLayerRequest>,
) -> Result<Json<ResetLayerResponse>, AppError> {
    let level = SettingsLevel::from_str(&body.level).map_err(|_| {
        AppError::Validation(format!(
            "level must be one of: outlet, user, transfer; got {}",
            body.level
        ))
    })?;
    if level == SettingsLevel::Global {
        return Err(AppError::Validation(
            "the global layer cannot be reset".to_string(),
        ));
    }
    if body.scope_id < 1 {
        return Err(AppError::Validation(
            "scopeId must be positive".to_string(),
        ));
    }

    let removed = state.repo.delete_settings_layer(level, body.scope_id).await?;

    Ok(Json(ResetLayerResponse {
        success: true,
        level: level.to_string(),
        scope_id: body.scope_id,
        removed,
    }))
}
