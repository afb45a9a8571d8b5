pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod settings;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    DeviceType, FraudAlert, FraudRule, Metric, OutletId, Period, ReceivingSession, ScanEvent,
    ScanResult, SessionId, SessionState, Severity, TimeMs, TransferId, UserId,
};
pub use engine::{AchievementEvaluator, LeaderboardRanker, PerformanceAggregator, SessionManager};
pub use error::AppError;
pub use settings::{EffectiveSettings, SettingsResolver};
