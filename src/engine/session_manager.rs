//! Session lifecycle orchestration: start, scored scan recording, completion.
//!
//! All mutation of one session is serialized behind a per-session async lock,
//! so concurrent scans for the same session never interleave their
//! read-score-write sequences. Different sessions proceed in parallel.

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{
    DeviceType, OutletId, ReceivingSession, ScanEvent, SessionId, SessionState, SessionSummary,
    Severity, TimeMs, TransferId, UserId,
};
use crate::engine::achievements::AchievementEvaluator;
use crate::engine::aggregator::PerformanceAggregator;
use crate::engine::scoring::{score_scan, ScanInput};
use crate::error::AppError;
use crate::settings::{SettingsError, SettingsResolver, SettingsScope};
use backoff::future::retry;
use backoff::ExponentialBackoff;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

pub struct SessionManager {
    repo: Arc<Repository>,
    settings: SettingsResolver,
    aggregator: Arc<PerformanceAggregator>,
    achievements: Arc<AchievementEvaluator>,
    config: Config,
    session_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Scored events whose append exhausted its retry budget, kept for the
    /// reconciliation sweep.
    recovery_queue: Mutex<Vec<ScanEvent>>,
}

/// Result of a start call: the session plus whether it already existed.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub session: ReceivingSession,
    pub resumed: bool,
}

/// One scan to record against a session.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub session_id: SessionId,
    pub barcode: String,
    pub quantity: i64,
    pub device_type: DeviceType,
    pub product_id: Option<i64>,
    pub ip_address: Option<String>,
    pub scanned_at: TimeMs,
}

/// The persisted, scored event plus its alert severity if one was raised.
#[derive(Debug, Clone)]
pub struct ScanRecorded {
    pub event: ScanEvent,
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub session_id: SessionId,
    pub summary: SessionSummary,
    pub items_scanned: i64,
    pub error_count: i64,
    pub achievements_earned: Vec<&'static str>,
}

impl SessionManager {
    pub fn new(
        repo: Arc<Repository>,
        settings: SettingsResolver,
        aggregator: Arc<PerformanceAggregator>,
        achievements: Arc<AchievementEvaluator>,
        config: Config,
    ) -> Self {
        SessionManager {
            repo,
            settings,
            aggregator,
            achievements,
            config,
            session_locks: Mutex::new(HashMap::new()),
            recovery_queue: Mutex::new(Vec::new()),
        }
    }

    /// Start a receiving session, or resume the open one for the same
    /// transfer and user. Starting is idempotent per (transfer, user).
    pub async fn start_session(
        &self,
        transfer_id: TransferId,
        transfer_type: String,
        user_id: UserId,
        outlet_id: OutletId,
        at: TimeMs,
    ) -> Result<StartOutcome, AppError> {
        if let Some(existing) = self.repo.find_open_session(transfer_id, user_id).await? {
            return Ok(StartOutcome {
                session: existing,
                resumed: true,
            });
        }

        let session = ReceivingSession::start(transfer_id, transfer_type, user_id, outlet_id, at);
        self.repo.create_session(&session).await?;
        info!(session_id = %session.session_id, transfer_id = %transfer_id, "session started");
        Ok(StartOutcome {
            session,
            resumed: false,
        })
    }

    /// Score and persist one scan.
    ///
    /// Scoring fails closed: if rules or settings cannot be loaded within the
    /// retry budget the scan is rejected, never stored unscored. A persist
    /// failure past its budget queues the scored event for reconciliation.
    pub async fn record_scan(&self, req: ScanRequest) -> Result<ScanRecorded, AppError> {
        if req.barcode.is_empty() {
            return Err(AppError::Validation("barcode must not be empty".into()));
        }
        if req.quantity < 1 {
            return Err(AppError::Validation(format!(
                "quantity must be at least 1, got {}",
                req.quantity
            )));
        }

        let lock = self.session_lock(&req.session_id);
        let _guard = lock.lock().await;

        let mut session = self
            .repo
            .get_session(&req.session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {}", req.session_id)))?;
        if !session.state.accepts_scans() {
            return Err(AppError::SessionState(format!(
                "session {} is {}, scans are not accepted",
                session.session_id, session.state
            )));
        }

        let scope = SettingsScope {
            user_id: Some(session.user_id),
            outlet_id: Some(session.outlet_id),
            transfer_id: Some(session.transfer_id),
        };
        let (effective, rules) = self.load_scoring_inputs(scope).await?;
        let history = self
            .repo
            .session_history(&session.session_id)
            .await
            .map_err(|e| AppError::ScoringUnavailable(e.to_string()))?;

        let time_since_last = session
            .last_scan_at
            .map(|t| req.scanned_at.as_i64() - t.as_i64());
        let outcome = score_scan(
            &ScanInput {
                barcode: &req.barcode,
                quantity: req.quantity,
                time_since_last_scan_ms: time_since_last,
            },
            &history,
            &rules,
            &effective,
        );

        let mut event = ScanEvent {
            event_id: 0,
            event_key: ScanEvent::compute_event_key(
                &session.session_id,
                &req.barcode,
                req.scanned_at,
                req.device_type,
            ),
            session_id: session.session_id.clone(),
            transfer_id: session.transfer_id,
            user_id: session.user_id,
            outlet_id: session.outlet_id,
            barcode: req.barcode,
            product_id: req.product_id,
            quantity: req.quantity,
            scan_result: outcome.scan_result,
            device_type: req.device_type,
            ip_address: req.ip_address,
            scanned_at: req.scanned_at,
            time_since_last_scan_ms: time_since_last,
            is_suspicious: outcome.is_suspicious,
            fraud_score: outcome.score,
            fraud_reasons: outcome.reasons,
        };

        event.event_id = self.append_with_retry(event.clone()).await?;

        session.apply_scan(event.scan_result, event.scanned_at);
        self.repo.update_session_progress(&session).await?;

        let severity = if event.is_suspicious {
            let severity = Severity::from_score(event.fraud_score);
            if let Some(sev) = severity {
                self.repo
                    .insert_fraud_alert(
                        event.event_id,
                        event.user_id,
                        event.outlet_id,
                        sev,
                        event.scanned_at,
                    )
                    .await?;
                warn!(
                    event_id = event.event_id,
                    score = event.fraud_score,
                    severity = %sev,
                    "suspicious scan flagged"
                );
            }
            severity
        } else {
            None
        };

        Ok(ScanRecorded { event, severity })
    }

    /// Complete a session: recompute counters from the event log, persist the
    /// summary, then aggregate and evaluate achievements.
    ///
    /// Aggregation and evaluation run at-least-once; a failure there leaves
    /// the session pending for the sweep rather than failing the completion.
    pub async fn complete_session(
        &self,
        session_id: &SessionId,
        transfer_id: TransferId,
        user_id: UserId,
        at: TimeMs,
    ) -> Result<CompletionOutcome, AppError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self
            .repo
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {}", session_id)))?;
        if session.transfer_id != transfer_id || session.user_id != user_id {
            return Err(AppError::Validation(format!(
                "session {} does not belong to transfer {} / user {}",
                session_id, transfer_id, user_id
            )));
        }
        match session.state {
            SessionState::Active => {}
            SessionState::Started => {
                return Err(AppError::SessionState(format!(
                    "session {} has no recorded scans",
                    session_id
                )))
            }
            SessionState::Completed | SessionState::Abandoned => {
                return Err(AppError::SessionState(format!(
                    "session {} is already {}",
                    session_id, session.state
                )))
            }
        }

        // Counters are recomputed from the event log, which survives any
        // in-flight counter drift.
        let (items, errors) = self.repo.session_event_counts(session_id).await?;
        session.items_scanned = items;
        session.error_count = errors;

        let summary = session
            .completion_summary(at)
            .map_err(AppError::Validation)?;

        self.repo
            .complete_session(
                session_id,
                summary.completed_at,
                items,
                errors,
                summary.duration_seconds,
                summary.scans_per_minute,
                summary.accuracy,
                summary.performance_score,
            )
            .await?;

        session.state = SessionState::Completed;
        session.completed_at = Some(summary.completed_at);
        session.duration_seconds = Some(summary.duration_seconds);
        session.scans_per_minute = Some(summary.scans_per_minute);
        session.accuracy = Some(summary.accuracy);
        session.performance_score = Some(summary.performance_score);

        let achievements_earned = match self.evaluate_completed(&session).await {
            Ok(earned) => earned,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    error = %e,
                    "post-completion processing failed, left for sweep"
                );
                Vec::new()
            }
        };

        self.drop_session_lock(session_id);
        info!(
            session_id = %session_id,
            items_scanned = items,
            score = summary.performance_score,
            "session completed"
        );

        Ok(CompletionOutcome {
            session_id: session_id.clone(),
            summary,
            items_scanned: items,
            error_count: errors,
            achievements_earned,
        })
    }

    /// Reconciliation sweep: flush queued event appends, then aggregate and
    /// evaluate any completed sessions the completion call failed to process.
    /// Returns the number of sessions processed.
    pub async fn sweep_pending_evaluations(&self) -> Result<usize, AppError> {
        // Abandoned and never-completed sessions leave lock entries behind.
        // An entry with no holder outside the map is safe to drop; the map
        // mutex keeps the count stable while we look.
        {
            let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        let queued: Vec<ScanEvent> = {
            let mut queue = self.recovery_queue.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *queue)
        };
        for event in queued {
            if let Err(e) = self.repo.append_scan_event(&event).await {
                warn!(event_key = %event.event_key, error = %e, "recovery append failed, requeued");
                let mut queue = self.recovery_queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.push(event);
            }
        }

        let pending = self.repo.pending_evaluations().await?;
        let mut processed = 0;
        for session in pending {
            match self.evaluate_completed(&session).await {
                Ok(_) => processed += 1,
                Err(e) => {
                    warn!(session_id = %session.session_id, error = %e, "sweep evaluation failed")
                }
            }
        }
        Ok(processed)
    }

    /// Events currently queued for reconciliation.
    pub fn recovery_queue_len(&self) -> usize {
        self.recovery_queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Per-session locks currently retained.
    pub fn session_lock_count(&self) -> usize {
        self.session_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Aggregate + evaluate achievements for a completed session, then stamp
    /// it evaluated so the sweep skips it.
    async fn evaluate_completed(
        &self,
        session: &ReceivingSession,
    ) -> Result<Vec<&'static str>, sqlx::Error> {
        self.aggregator.on_session_complete(session).await?;
        let earned = self
            .achievements
            .evaluate(session.user_id, TimeMs::now())
            .await?;
        self.repo
            .mark_session_evaluated(&session.session_id, TimeMs::now())
            .await?;
        Ok(earned)
    }

    /// Load settings and rules with bounded retry. Missing or incomplete
    /// global configuration is permanent; storage failures are transient.
    async fn load_scoring_inputs(
        &self,
        scope: SettingsScope,
    ) -> Result<
        (
            crate::settings::EffectiveSettings,
            Vec<crate::domain::FraudRule>,
        ),
        AppError,
    > {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_millis(
                self.config.scoring_retry_max_elapsed_ms,
            )),
            ..Default::default()
        };

        retry(backoff, || async {
            let resolved = self.settings.resolve(scope).await.map_err(|e| match e {
                SettingsError::Storage(_) => {
                    backoff::Error::transient(AppError::ScoringUnavailable(e.to_string()))
                }
                other => backoff::Error::permanent(AppError::Configuration(other.to_string())),
            })?;
            let rules = self.repo.load_fraud_rules().await.map_err(|e| {
                backoff::Error::transient(AppError::ScoringUnavailable(e.to_string()))
            })?;
            Ok((resolved.effective, rules))
        })
        .await
    }

    /// Append with bounded retry; on exhaustion the event goes to the
    /// recovery queue and the caller gets a persistence error.
    async fn append_with_retry(&self, event: ScanEvent) -> Result<i64, AppError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_millis(
                self.config.persist_retry_max_elapsed_ms,
            )),
            ..Default::default()
        };

        let result = retry(backoff, || async {
            self.repo
                .append_scan_event(&event)
                .await
                .map_err(backoff::Error::transient)
        })
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!(event_key = %event.event_key, error = %e, "event append exhausted retries");
                let mut queue = self.recovery_queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.push(event);
                Err(AppError::Persistence(
                    "scan accepted but not yet stored, queued for reconciliation".into(),
                ))
            }
        }
    }

    fn session_lock(&self, session_id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(session_id.as_str().to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn drop_session_lock(&self, session_id: &SessionId) {
        let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(session_id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use crate::domain::ScanResult;
    use crate::engine::ranker::LeaderboardRanker;
    use tempfile::TempDir;

    async fn setup() -> (Arc<SessionManager>, Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));

        let ranker = Arc::new(LeaderboardRanker::new(
            repo.clone(),
            Duration::from_secs(30),
        ));
        let aggregator = Arc::new(PerformanceAggregator::new(repo.clone(), ranker));
        let achievements = Arc::new(AchievementEvaluator::new(repo.clone()));
        let config = Config {
            port: 0,
            database_path: db_path,
            leaderboard_cache_ttl_secs: 30,
            persist_retry_max_elapsed_ms: 100,
            scoring_retry_max_elapsed_ms: 100,
        };
        let manager = Arc::new(SessionManager::new(
            repo.clone(),
            SettingsResolver::new(repo.clone()),
            aggregator,
            achievements,
            config,
        ));
        (manager, repo, temp_dir)
    }

    async fn started_session(manager: &SessionManager) -> ReceivingSession {
        manager
            .start_session(
                TransferId::new(42),
                "stock_transfer".to_string(),
                UserId::new(7),
                OutletId::new(3),
                TimeMs::new(1_000_000),
            )
            .await
            .unwrap()
            .session
    }

    fn scan(session: &ReceivingSession, barcode: &str, at: i64) -> ScanRequest {
        ScanRequest {
            session_id: session.session_id.clone(),
            barcode: barcode.to_string(),
            quantity: 1,
            device_type: DeviceType::UsbScanner,
            product_id: None,
            ip_address: None,
            scanned_at: TimeMs::new(at),
        }
    }

    #[tokio::test]
    async fn test_start_session_resumes_open_one() {
        let (manager, _repo, _temp) = setup().await;
        let first = started_session(&manager).await;

        let second = manager
            .start_session(
                TransferId::new(42),
                "stock_transfer".to_string(),
                UserId::new(7),
                OutletId::new(3),
                TimeMs::new(2_000_000),
            )
            .await
            .unwrap();
        assert!(second.resumed);
        assert_eq!(second.session.session_id, first.session_id);
    }

    #[tokio::test]
    async fn test_clean_scan_recorded_with_zero_score() {
        let (manager, repo, _temp) = setup().await;
        let session = started_session(&manager).await;

        let recorded = manager
            .record_scan(scan(&session, "TEST1", 1_001_000))
            .await
            .unwrap();
        assert_eq!(recorded.event.fraud_score, 0);
        assert_eq!(recorded.event.scan_result, ScanResult::Success);
        assert!(recorded.severity.is_none());
        assert!(recorded.event.event_id > 0);

        let stored = repo.get_session(&session.session_id).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Active);
        assert_eq!(stored.items_scanned, 1);
    }

    #[tokio::test]
    async fn test_fast_rescan_is_suspicious_duplicate() {
        let (manager, repo, _temp) = setup().await;
        let session = started_session(&manager).await;

        manager
            .record_scan(scan(&session, "TEST1", 1_001_000))
            .await
            .unwrap();
        // 50ms later, same barcode: speed (30) + duplicate (25).
        let recorded = manager
            .record_scan(scan(&session, "TEST1", 1_001_050))
            .await
            .unwrap();
        assert_eq!(recorded.event.scan_result, ScanResult::Duplicate);
        assert_eq!(recorded.event.fraud_score, 55);
        assert!(recorded.event.is_suspicious);
        assert_eq!(recorded.severity, Some(Severity::Medium));
        assert_eq!(recorded.event.fraud_reasons.len(), 2);
        assert!(recorded
            .event
            .fraud_reasons
            .iter()
            .any(|r| r.starts_with("speed:")));
        assert!(recorded
            .event
            .fraud_reasons
            .iter()
            .any(|r| r.starts_with("duplicate:")));

        let alert = repo.get_fraud_alert(1).await.unwrap().unwrap();
        assert_eq!(alert.event_id, recorded.event.event_id);
    }

    #[tokio::test]
    async fn test_first_scan_never_speed_flagged() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;

        // 1ms after session start, but there is no previous scan to measure
        // against.
        let recorded = manager
            .record_scan(scan(&session, "TEST1", 1_000_001))
            .await
            .unwrap();
        assert_eq!(recorded.event.fraud_score, 0);
        assert_eq!(recorded.event.time_since_last_scan_ms, None);
    }

    #[tokio::test]
    async fn test_scan_rejects_unknown_session() {
        let (manager, _repo, _temp) = setup().await;
        let fake = ReceivingSession::start(
            TransferId::new(1),
            "stock_transfer".to_string(),
            UserId::new(1),
            OutletId::new(1),
            TimeMs::new(0),
        );
        let err = manager
            .record_scan(scan(&fake, "TEST1", 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scan_validation() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;

        let mut empty = scan(&session, "", 1_001_000);
        empty.barcode = String::new();
        assert!(matches!(
            manager.record_scan(empty).await.unwrap_err(),
            AppError::Validation(_)
        ));

        let mut zero_qty = scan(&session, "TEST1", 1_001_000);
        zero_qty.quantity = 0;
        assert!(matches!(
            manager.record_scan(zero_qty).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_complete_session_full_flow() {
        let (manager, repo, _temp) = setup().await;
        let session = started_session(&manager).await;

        for (i, code) in ["A1", "B2", "C3"].iter().enumerate() {
            manager
                .record_scan(scan(&session, code, 1_000_000 + (i as i64 + 1) * 10_000))
                .await
                .unwrap();
        }

        let outcome = manager
            .complete_session(
                &session.session_id,
                session.transfer_id,
                session.user_id,
                TimeMs::new(1_060_000),
            )
            .await
            .unwrap();
        assert_eq!(outcome.items_scanned, 3);
        assert_eq!(outcome.error_count, 0);
        assert_eq!(outcome.summary.duration_seconds, 60);
        assert!((outcome.summary.accuracy - 1.0).abs() < 1e-9);
        assert!(outcome.achievements_earned.contains(&"first_steps"));

        let stored = repo.get_session(&session.session_id).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Completed);
        assert!(stored.evaluated_at.is_some());

        // The daily stat row exists after completion.
        let stats = repo.stats_for_user(session.user_id, None).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].transfers_completed, 1);
    }

    #[tokio::test]
    async fn test_complete_rejects_wrong_owner() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;
        manager
            .record_scan(scan(&session, "A1", 1_001_000))
            .await
            .unwrap();

        let err = manager
            .complete_session(
                &session.session_id,
                session.transfer_id,
                UserId::new(999),
                TimeMs::new(1_060_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_complete_requires_active_state() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;

        // No scans yet: still in started state.
        let err = manager
            .complete_session(
                &session.session_id,
                session.transfer_id,
                session.user_id,
                TimeMs::new(1_060_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionState(_)));
    }

    #[tokio::test]
    async fn test_complete_twice_is_conflict() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;
        manager
            .record_scan(scan(&session, "A1", 1_001_000))
            .await
            .unwrap();
        manager
            .complete_session(
                &session.session_id,
                session.transfer_id,
                session.user_id,
                TimeMs::new(1_060_000),
            )
            .await
            .unwrap();

        let err = manager
            .complete_session(
                &session.session_id,
                session.transfer_id,
                session.user_id,
                TimeMs::new(1_070_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionState(_)));
    }

    #[tokio::test]
    async fn test_scan_after_complete_rejected() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;
        manager
            .record_scan(scan(&session, "A1", 1_001_000))
            .await
            .unwrap();
        manager
            .complete_session(
                &session.session_id,
                session.transfer_id,
                session.user_id,
                TimeMs::new(1_060_000),
            )
            .await
            .unwrap();

        let err = manager
            .record_scan(scan(&session, "B2", 1_070_000))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionState(_)));
    }

    #[tokio::test]
    async fn test_completion_time_before_start_rejected() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;
        manager
            .record_scan(scan(&session, "A1", 1_001_000))
            .await
            .unwrap();

        let err = manager
            .complete_session(
                &session.session_id,
                session.transfer_id,
                session.user_id,
                TimeMs::new(999_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_global_settings_is_configuration_error() {
        let (manager, repo, _temp) = setup().await;
        let session = started_session(&manager).await;
        repo.delete_settings_layer(crate::settings::SettingsLevel::Global, 0)
            .await
            .unwrap();

        let err = manager
            .record_scan(scan(&session, "TEST1", 1_001_000))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_sweep_picks_up_unevaluated_completion() {
        let (manager, repo, _temp) = setup().await;
        let session = started_session(&manager).await;
        manager
            .record_scan(scan(&session, "A1", 1_001_000))
            .await
            .unwrap();

        // Completion recorded directly, as if the process died before the
        // post-completion steps ran.
        repo.complete_session(
            &session.session_id,
            TimeMs::new(1_060_000),
            1,
            0,
            60,
            1.0,
            1.0,
            61,
        )
        .await
        .unwrap();

        let processed = manager.sweep_pending_evaluations().await.unwrap();
        assert_eq!(processed, 1);

        let stored = repo.get_session(&session.session_id).await.unwrap().unwrap();
        assert!(stored.evaluated_at.is_some());
        // A second sweep finds nothing.
        assert_eq!(manager.sweep_pending_evaluations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_session_locks() {
        let (manager, _repo, _temp) = setup().await;
        let session = started_session(&manager).await;

        // Recording a scan creates the lock; the session is never completed.
        manager
            .record_scan(scan(&session, "TEST1", 1_001_000))
            .await
            .unwrap();
        assert_eq!(manager.session_lock_count(), 1);

        manager.sweep_pending_evaluations().await.unwrap();
        assert_eq!(manager.session_lock_count(), 0);

        // A lock someone still holds survives the sweep.
        let held = manager.session_lock(&session.session_id);
        manager.sweep_pending_evaluations().await.unwrap();
        assert_eq!(manager.session_lock_count(), 1);
        drop(held);
    }

    #[tokio::test]
    async fn test_outlet_override_changes_scoring() {
        let (manager, repo, _temp) = setup().await;
        let session = started_session(&manager).await;
        // Outlet 3 relaxes the speed floor to 20ms.
        repo.upsert_settings_layer(
            crate::settings::SettingsLevel::Outlet,
            3,
            &crate::settings::SettingsOverride {
                min_scan_interval_ms: Some(20),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        manager
            .record_scan(scan(&session, "A1", 1_001_000))
            .await
            .unwrap();
        // 50ms gap passes under the outlet override.
        let recorded = manager
            .record_scan(scan(&session, "B2", 1_001_050))
            .await
            .unwrap();
        assert_eq!(recorded.event.fraud_score, 0);
    }
}
