//! Core domain types for the scan analytics engine.

pub mod fraud;
pub mod primitives;
pub mod scan;
pub mod session;
pub mod stats;

pub use fraud::{AlertStatus, FraudAlert, FraudRule, Severity, SignalType};
pub use primitives::{OutletId, SessionId, TimeMs, TransferId, UserId};
pub use scan::{DeviceType, ScanEvent, ScanResult};
pub use session::{
    accuracy_ratio, performance_score, ReceivingSession, SessionState, SessionSummary,
};
pub use stats::{Achievement, DailyPerformanceStat, LeaderboardEntry, Metric, Period};
