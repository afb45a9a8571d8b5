use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{TimeMs, UserId};
use crate::engine::achievements::AchievementStatus;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsQuery {
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsResponse {
    pub success: bool,
    pub user_id: i64,
    pub newly_earned: Vec<&'static str>,
    pub achievements: Vec<AchievementStatus>,
}

/// Re-evaluates the catalogue before reporting, so an award missed by a
/// failed completion still shows up here. Awarding is idempotent.
pub async fn get_achievements(
    Query(params): Query<AchievementsQuery>,
    State(state): State<AppState>,
) -> Result<Json<AchievementsResponse>, AppError> {
    if params.user_id < 1 {
        return Err(AppError::Validation("userId must be positive".to_string()));
    }
    let user_id = UserId::new(params.user_id);

    let newly_earned = state.achievements.evaluate(user_id, TimeMs::now()).await?;
    let achievements = state.achievements.check(user_id).await?;

    Ok(Json(AchievementsResponse {
        success: true,
        user_id: params.user_id,
        newly_earned,
        achievements,
    }))
}
