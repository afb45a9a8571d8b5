pub mod achievements;
pub mod fraud;
pub mod health;
pub mod leaderboard;
pub mod performance;
pub mod scans;
pub mod sessions;
pub mod settings;

use crate::config::Config;
use crate::db::Repository;
use crate::engine::{
    AchievementEvaluator, LeaderboardRanker, PerformanceAggregator, SessionManager,
};
use crate::settings::SettingsResolver;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub sessions: Arc<SessionManager>,
    pub aggregator: Arc<PerformanceAggregator>,
    pub ranker: Arc<LeaderboardRanker>,
    pub achievements: Arc<AchievementEvaluator>,
    pub settings: SettingsResolver,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        sessions: Arc<SessionManager>,
        aggregator: Arc<PerformanceAggregator>,
        ranker: Arc<LeaderboardRanker>,
        achievements: Arc<AchievementEvaluator>,
    ) -> Self {
        let settings = SettingsResolver::new(repo.clone());
        Self {
            repo,
            config,
            sessions,
            aggregator,
            ranker,
            achievements,
            settings,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/sessions/start", post(sessions::start_session))
        .route("/v1/sessions/complete", post(sessions::complete_session))
        .route("/v1/scans", post(scans::record_scan))
        .route("/v1/performance", get(performance::get_performance))
        .route("/v1/leaderboard", get(leaderboard::get_leaderboard))
        .route("/v1/achievements", get(achievements::get_achievements))
        .route("/v1/fraud/suspicious", get(fraud::get_suspicious_scans))
        .route("/v1/fraud/scans/:event_id", get(fraud::get_scan_detail))
        .route(
            "/v1/fraud/alerts/:alert_id/review",
            post(fraud::review_alert),
        )
        .route("/v1/settings", get(settings::get_settings))
        .route("/v1/settings/preset", post(settings::apply_preset))
        .route("/v1/settings/reset", post(settings::reset_layer))
        .layer(cors)
        .with_state(state)
}
