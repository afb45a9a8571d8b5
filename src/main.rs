use scanwarden::api;
use scanwarden::config::Config;
use scanwarden::db::init_db;
use scanwarden::engine::{
    AchievementEvaluator, LeaderboardRanker, PerformanceAggregator, SessionManager,
};
use scanwarden::settings::SettingsResolver;
use scanwarden::Repository;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let ranker = Arc::new(LeaderboardRanker::new(
        repo.clone(),
        Duration::from_secs(config.leaderboard_cache_ttl_secs),
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

    // Background reconciliation: queued event appends and completed sessions
    // that were never aggregated.
    let sweeper = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match sweeper.sweep_pending_evaluations().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("sweep processed {} pending sessions", n),
                Err(e) => tracing::warn!("sweep failed: {}", e),
            }
        }
    });

    // Create router
    let app = api::create_router(api::AppState::new(
        repo,
        config,
        sessions,
        aggregator,
        ranker,
        achievements,
    ));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
