//! Analytics engine: scoring, session orchestration, aggregation, ranking.

pub mod achievements;
pub mod aggregator;
pub mod barcode;
pub mod ranker;
pub mod scoring;
pub mod session_manager;

pub use achievements::AchievementEvaluator;
pub use aggregator::PerformanceAggregator;
pub use ranker::LeaderboardRanker;
pub use session_manager::SessionManager;
