//! Receiving session aggregate and its state machine.

use crate::domain::{OutletId, ScanResult, SessionId, TimeMs, TransferId, UserId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a receiving session.
///
/// `started -> active` on the first scored scan, `active -> completed` on
/// completion, `started|active -> abandoned` via the external timeout sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Started,
    Active,
    Completed,
    Abandoned,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Started => "started",
            SessionState::Active => "active",
            SessionState::Completed => "completed",
            SessionState::Abandoned => "abandoned",
        }
    }

    /// Whether a scan may be recorded in this state.
    pub fn accepts_scans(&self) -> bool {
        matches!(self, SessionState::Started | SessionState::Active)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(SessionState::Started),
            "active" => Ok(SessionState::Active),
            "completed" => Ok(SessionState::Completed),
            "abandoned" => Ok(SessionState::Abandoned),
            _ => Err(()),
        }
    }
}

/// One user reconciling one transfer's items: the mutable aggregate every
/// scored scan and the completion call update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivingSession {
    pub session_id: SessionId,
    pub transfer_id: TransferId,
    pub transfer_type: String,
    pub user_id: UserId,
    pub outlet_id: OutletId,
    pub state: SessionState,
    pub started_at: TimeMs,
    pub last_scan_at: Option<TimeMs>,
    pub completed_at: Option<TimeMs>,
    /// Count of non-error scan events in this session.
    pub items_scanned: i64,
    /// Count of non-success scan events in this session.
    pub error_count: i64,
    pub duration_seconds: Option<i64>,
    pub scans_per_minute: Option<f64>,
    pub accuracy: Option<f64>,
    pub performance_score: Option<i64>,
    /// Set once aggregation + achievement evaluation have run; the pending
    /// sweep re-processes completed sessions where this is still None.
    pub evaluated_at: Option<TimeMs>,
}

impl ReceivingSession {
    /// Create a freshly-started session.
    pub fn start(
        transfer_id: TransferId,
        transfer_type: String,
        user_id: UserId,
        outlet_id: OutletId,
        started_at: TimeMs,
    ) -> Self {
        ReceivingSession {
            session_id: SessionId::generate(),
            transfer_id,
            transfer_type,
            user_id,
            outlet_id,
            state: SessionState::Started,
            started_at,
            last_scan_at: None,
            completed_at: None,
            items_scanned: 0,
            error_count: 0,
            duration_seconds: None,
            scans_per_minute: None,
            accuracy: None,
            performance_score: None,
            evaluated_at: None,
        }
    }

    /// Apply one scored scan to the aggregate counters and state.
    pub fn apply_scan(&mut self, result: ScanResult, scanned_at: TimeMs) {
        if result != ScanResult::Error {
            self.items_scanned += 1;
        }
        if result != ScanResult::Success {
            self.error_count += 1;
        }
        self.last_scan_at = Some(scanned_at);
        if self.state == SessionState::Started {
            self.state = SessionState::Active;
        }
    }

    /// Validate and compute the completion summary.
    ///
    /// Rejects `completed_at` earlier than `started_at`; the timestamp is
    /// never silently corrected.
    pub fn completion_summary(&self, completed_at: TimeMs) -> Result<SessionSummary, String> {
        if completed_at < self.started_at {
            return Err(format!(
                "completed_at {} is earlier than started_at {}",
                completed_at.as_i64(),
                self.started_at.as_i64()
            ));
        }

        let duration_seconds = (completed_at.as_i64() - self.started_at.as_i64()) / 1000;
        let scans_per_minute = if duration_seconds > 0 {
            self.items_scanned as f64 / (duration_seconds as f64 / 60.0)
        } else {
            0.0
        };
        let accuracy = accuracy_ratio(self.items_scanned, self.error_count);

        Ok(SessionSummary {
            completed_at,
            duration_seconds,
            scans_per_minute,
            accuracy,
            performance_score: performance_score(scans_per_minute, accuracy, self.error_count),
        })
    }
}

/// Metrics computed when a session completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSummary {
    pub completed_at: TimeMs,
    pub duration_seconds: i64,
    pub scans_per_minute: f64,
    pub accuracy: f64,
    pub performance_score: i64,
}

/// Accuracy as `1 - error_count / items_scanned`, clamped to [0, 1].
/// Zero items scanned means zero accuracy.
pub fn accuracy_ratio(items_scanned: i64, error_count: i64) -> f64 {
    if items_scanned <= 0 {
        return 0.0;
    }
    (1.0 - error_count as f64 / items_scanned as f64).clamp(0.0, 1.0)
}

/// Session performance score on [0, 100]: accuracy worth 60 points, speed 30
/// (full marks at 30 scans/min), minus up to 10 points of error penalty.
pub fn performance_score(scans_per_minute: f64, accuracy: f64, error_count: i64) -> i64 {
    let accuracy_points = accuracy * 60.0;
    let speed_points = (scans_per_minute / 30.0 * 30.0).min(30.0);
    let error_penalty = (error_count as f64).min(10.0);
    (accuracy_points + speed_points - error_penalty).round().clamp(0.0, 100.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ReceivingSession {
        ReceivingSession::start(
            TransferId::new(1),
            "stock_transfer".to_string(),
            UserId::new(1),
            OutletId::new(1),
            TimeMs::new(1_000_000),
        )
    }

    #[test]
    fn test_first_scan_activates_session() {
        let mut s = session();
        assert_eq!(s.state, SessionState::Started);
        s.apply_scan(ScanResult::Success, TimeMs::new(1_001_000));
        assert_eq!(s.state, SessionState::Active);
        assert_eq!(s.items_scanned, 1);
        assert_eq!(s.error_count, 0);
    }

    #[test]
    fn test_duplicate_counts_as_item_and_error() {
        let mut s = session();
        s.apply_scan(ScanResult::Duplicate, TimeMs::new(1_001_000));
        assert_eq!(s.items_scanned, 1);
        assert_eq!(s.error_count, 1);
    }

    #[test]
    fn test_error_scan_not_counted_as_item() {
        let mut s = session();
        s.apply_scan(ScanResult::Error, TimeMs::new(1_001_000));
        assert_eq!(s.items_scanned, 0);
        assert_eq!(s.error_count, 1);
    }

    #[test]
    fn test_completion_rejects_time_before_start() {
        let s = session();
        let err = s.completion_summary(TimeMs::new(999_999));
        assert!(err.is_err());
    }

    #[test]
    fn test_completion_summary_metrics() {
        let mut s = session();
        for _ in 0..30 {
            s.apply_scan(ScanResult::Success, TimeMs::new(1_030_000));
        }
        // 60 seconds, 30 items -> 30 scans/min, perfect accuracy.
        let summary = s.completion_summary(TimeMs::new(1_060_000)).unwrap();
        assert_eq!(summary.duration_seconds, 60);
        assert!((summary.scans_per_minute - 30.0).abs() < 1e-9);
        assert!((summary.accuracy - 1.0).abs() < 1e-9);
        assert_eq!(summary.performance_score, 90);
    }

    #[test]
    fn test_zero_duration_yields_zero_speed() {
        let mut s = session();
        s.apply_scan(ScanResult::Success, TimeMs::new(1_000_100));
        let summary = s.completion_summary(TimeMs::new(1_000_100)).unwrap();
        assert_eq!(summary.scans_per_minute, 0.0);
    }

    #[test]
    fn test_accuracy_ratio_zero_items() {
        assert_eq!(accuracy_ratio(0, 0), 0.0);
        assert_eq!(accuracy_ratio(0, 3), 0.0);
    }

    #[test]
    fn test_accuracy_ratio_clamps() {
        assert_eq!(accuracy_ratio(2, 5), 0.0);
        assert!((accuracy_ratio(10, 1) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_performance_score_bounds() {
        assert_eq!(performance_score(0.0, 0.0, 100), 0);
        assert_eq!(performance_score(60.0, 1.0, 0), 90);
        assert!(performance_score(120.0, 1.0, 0) <= 100);
    }

    #[test]
    fn test_state_accepts_scans() {
        assert!(SessionState::Started.accepts_scans());
        assert!(SessionState::Active.accepts_scans());
        assert!(!SessionState::Completed.accepts_scans());
        assert!(!SessionState::Abandoned.accepts_scans());
    }
}
