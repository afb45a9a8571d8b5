use axum::http::StatusCode;
use chrono::NaiveDate;
use scanwarden::api::{self, AppState};
use scanwarden::config::Config;
use scanwarden::db::init_db;
use scanwarden::domain::DailyPerformanceStat;
use scanwarden::engine::{
    AchievementEvaluator, LeaderboardRanker, PerformanceAggregator, SessionManager,
};
use scanwarden::settings::SettingsResolver;
use scanwarden::{OutletId, ReceivingSession, Repository, TimeMs, TransferId, UserId};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        leaderboard_cache_ttl_secs: 30,
        persist_retry_max_elapsed_ms: 100,
        scoring_retry_max_elapsed_ms: 100,
    };

    let ranker = Arc::new(LeaderboardRanker::new(
        repo.clone(),
        Duration::from_secs(30),
    ));
    let aggregator = Arc::new(PerformanceAggregator::new(repo.clone(), ranker.clone()));
    let achievements = Arc::new(AchievementEvaluator::new(repo.clone()));
    let sessions = Arc::new(SessionManager::new(
        repo.clone(),
        SettingsResolver::new(repo.clone()),
        aggregator.clone(),
        achievements.clone(),
        config.clone(),
    ));
    let state = AppState::new(repo.clone(), config, sessions, aggregator, ranker, achievements);

    (api::create_router(state), repo, temp_dir)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn stat(
    user: i64,
    date: NaiveDate,
    items: i64,
    spm: f64,
    accuracy: f64,
    first_ms: i64,
) -> DailyPerformanceStat {
    DailyPerformanceStat {
        user_id: UserId::new(user),
        outlet_id: OutletId::new(1),
        date,
        transfers_completed: 1,
        items_scanned: items,
        error_count: 0,
        avg_scans_per_minute: spm,
        avg_accuracy: accuracy,
        performance_score: 80.0,
        first_completed_ms: first_ms,
    }
}

#[tokio::test]
async fn test_leaderboard_ranks_by_composite() {
    let (app, repo, _temp) = setup_test_app().await;
    let today = chrono::Utc::now().date_naive();

    repo.upsert_daily_stat(&stat(1, today, 200, 40.0, 1.0, 100))
        .await
        .unwrap();
    repo.upsert_daily_stat(&stat(2, today, 100, 20.0, 0.5, 100))
        .await
        .unwrap();

    let (status, body) = get_json(&app, "/v1/leaderboard?period=daily&metric=overall").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["userId"], 1);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[1]["userId"], 2);
    assert!(entries[0]["score"].as_f64().unwrap() > entries[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn test_leaderboard_tie_break_is_deterministic() {
    let (app, repo, _temp) = setup_test_app().await;
    let today = chrono::Utc::now().date_naive();

    // Identical stats; user 5 completed earlier than user 2.
    repo.upsert_daily_stat(&stat(2, today, 100, 30.0, 1.0, 9_000))
        .await
        .unwrap();
    repo.upsert_daily_stat(&stat(5, today, 100, 30.0, 1.0, 1_000))
        .await
        .unwrap();

    let (_, first) = get_json(&app, "/v1/leaderboard?period=daily").await;
    let entries = first["entries"].as_array().unwrap();
    assert_eq!(entries[0]["userId"], 5, "earlier completion wins the tie");
    assert_eq!(entries[1]["userId"], 2);

    let (_, second) = get_json(&app, "/v1/leaderboard?period=daily").await;
    assert_eq!(first["entries"], second["entries"]);
}

#[tokio::test]
async fn test_leaderboard_metric_and_period_validation() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, body) = get_json(&app, "/v1/leaderboard?metric=vibes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let (status, _) = get_json(&app, "/v1/leaderboard?period=fortnight").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_leaderboard_volume_metric_reorders() {
    let (app, repo, _temp) = setup_test_app().await;
    let today = chrono::Utc::now().date_naive();

    // User 1 is fast, user 2 moves more items.
    repo.upsert_daily_stat(&stat(1, today, 50, 45.0, 1.0, 100))
        .await
        .unwrap();
    repo.upsert_daily_stat(&stat(2, today, 400, 10.0, 0.9, 100))
        .await
        .unwrap();

    let (_, speed) = get_json(&app, "/v1/leaderboard?period=daily&metric=speed").await;
    assert_eq!(speed["entries"][0]["userId"], 1);

    let (_, volume) = get_json(&app, "/v1/leaderboard?period=daily&metric=volume").await;
    assert_eq!(volume["entries"][0]["userId"], 2);
}

#[tokio::test]
async fn test_performance_window_sums_days() {
    let (app, repo, _temp) = setup_test_app().await;
    let today = chrono::Utc::now().date_naive();
    let yesterday = today - chrono::Duration::days(1);

    repo.upsert_daily_stat(&stat(7, today, 30, 20.0, 1.0, 100))
        .await
        .unwrap();
    repo.upsert_daily_stat(&stat(7, yesterday, 50, 10.0, 0.8, 100))
        .await
        .unwrap();

    let (status, body) = get_json(&app, "/v1/performance?userId=7&period=week").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["itemsScanned"], 80);
    assert_eq!(body["transfersCompleted"], 2);
    assert_eq!(body["days"].as_array().unwrap().len(), 2);

    // Today's window excludes yesterday.
    let (_, today_body) = get_json(&app, "/v1/performance?userId=7&period=today").await;
    assert_eq!(today_body["itemsScanned"], 30);
}

#[tokio::test]
async fn test_performance_validation() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, _) = get_json(&app, "/v1/performance?userId=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(&app, "/v1/performance?userId=7&period=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_achievements_awarded_and_idempotent() {
    let (app, repo, _temp) = setup_test_app().await;

    // One completed session on record.
    let session = ReceivingSession::start(
        TransferId::new(1),
        "stock_transfer".to_string(),
        UserId::new(7),
        OutletId::new(1),
        TimeMs::new(1_000_000),
    );
    repo.create_session(&session).await.unwrap();
    repo.complete_session(
        &session.session_id,
        TimeMs::new(1_060_000),
        10,
        0,
        60,
        10.0,
        1.0,
        70,
    )
    .await
    .unwrap();

    let (status, first) = get_json(&app, "/v1/achievements?userId=7").await;
    assert_eq!(status, StatusCode::OK);
    assert!(first["newlyEarned"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a == "first_steps"));

    let (_, second) = get_json(&app, "/v1/achievements?userId=7").await;
    assert!(second["newlyEarned"].as_array().unwrap().is_empty());
    let first_steps = second["achievements"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["code"] == "first_steps")
        .unwrap();
    assert_eq!(first_steps["earned"], true);

    // Locked achievements are listed too.
    let locked = second["achievements"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["earned"] == false)
        .count();
    assert!(locked > 0);
}

#[tokio::test]
async fn test_settings_resolution_and_presets() {
    let (app, _repo, _temp) = setup_test_app().await;

    // Seeded global defaults.
    let (status, body) = get_json(&app, "/v1/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["minScanIntervalMs"], 100);
    assert_eq!(body["sequentialWindow"], 5);
    assert_eq!(body["symbology"], "any");
    assert_eq!(body["sources"], json!(["global"]));

    // Strict preset at outlet level.
    let (status, _) = post_json(
        &app,
        "/v1/settings/preset",
        json!({"preset": "strict", "level": "outlet", "scopeId": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, scoped) = get_json(&app, "/v1/settings?outletId=5").await;
    assert_eq!(scoped["minScanIntervalMs"], 200);
    assert_eq!(scoped["maxQuantityPerScan"], 5);
    // Symbology is not set by the strict preset and falls through to global.
    assert_eq!(scoped["symbology"], "any");
    assert_eq!(scoped["sources"], json!(["global", "outlet"]));

    // Other outlets are unaffected.
    let (_, other) = get_json(&app, "/v1/settings?outletId=6").await;
    assert_eq!(other["minScanIntervalMs"], 100);
}

#[tokio::test]
async fn test_global_preset_keeps_row_complete() {
    let (app, _repo, _temp) = setup_test_app().await;

    // "strict" has no symbology; applying it globally must not erase the
    // existing global symbology.
    let (status, _) = post_json(
        &app,
        "/v1/settings/preset",
        json!({"preset": "strict", "level": "global", "scopeId": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get_json(&app, "/v1/settings").await;
    assert_eq!(body["minScanIntervalMs"], 200);
    assert_eq!(body["symbology"], "any");
}

#[tokio::test]
async fn test_reset_layer_falls_back_to_global() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, _) = post_json(
        &app,
        "/v1/settings/preset",
        json!({"preset": "strict", "level": "outlet", "scopeId": 7}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app,
        "/v1/settings/reset",
        json!({"level": "outlet", "scopeId": 7}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);

    let (_, resolved) = get_json(&app, "/v1/settings?outletId=7").await;
    assert_eq!(resolved["minScanIntervalMs"], 100);
    assert_eq!(resolved["sources"], json!(["global"]));

    // Resetting an absent layer is a no-op.
    let (status, body) = post_json(
        &app,
        "/v1/settings/reset",
        json!({"level": "outlet", "scopeId": 7}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], false);

    // The global layer is not resettable.
    let (status, _) = post_json(
        &app,
        "/v1/settings/reset",
        json!({"level": "global", "scopeId": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_preset_validation() {
    let (app, _repo, _temp) = setup_test_app().await;

    let (status, _) = post_json(
        &app,
        "/v1/settings/preset",
        json!({"preset": "chaotic", "level": "outlet", "scopeId": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/v1/settings/preset",
        json!({"preset": "strict", "level": "galaxy", "scopeId": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/v1/settings/preset",
        json!({"preset": "strict", "level": "global", "scopeId": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
