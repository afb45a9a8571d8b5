//! Repository layer for database operations.

use crate::domain::{
    Achievement, AlertStatus, DailyPerformanceStat, DeviceType, FraudAlert, FraudRule, OutletId,
    ReceivingSession, ScanEvent, ScanResult, SessionId, SessionState, Severity, SignalType, TimeMs,
    TransferId, UserId,
};
use crate::settings::{SettingsLevel, SettingsOverride, Symbology};
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

/// Minimal view of a prior scan used by the scoring engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryScan {
    pub barcode: String,
    pub scan_result: ScanResult,
    pub scanned_at: TimeMs,
}

/// Per-user reduction of daily stats over a period window.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAggregate {
    pub user_id: UserId,
    pub transfers_completed: i64,
    pub items_scanned: i64,
    pub error_count: i64,
    pub avg_scans_per_minute: f64,
    pub avg_accuracy: f64,
    pub avg_performance_score: f64,
    pub first_completed_ms: i64,
}

/// A flagged event joined with its review-queue alert, if one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspiciousScan {
    pub event: ScanEvent,
    pub alert_id: Option<i64>,
    pub alert_status: Option<AlertStatus>,
}

/// Completed-session metrics consumed by the achievement evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMetrics {
    pub items_scanned: i64,
    pub scans_per_minute: f64,
    pub accuracy: f64,
    pub completed_at: TimeMs,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Cheap liveness check for the readiness endpoint.
    ///
    /// # Errors
    /// Returns an error if the pool cannot serve a query.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    // ---- sessions ----

    /// Insert a freshly-started session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn create_session(&self, session: &ReceivingSession) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO receiving_sessions
                (session_id, transfer_id, transfer_type, user_id, outlet_id, state, started_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.session_id.as_str())
        .bind(session.transfer_id.as_i64())
        .bind(&session.transfer_type)
        .bind(session.user_id.as_i64())
        .bind(session.outlet_id.as_i64())
        .bind(session.state.as_str())
        .bind(session.started_at.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find an open (started/active) session for a transfer+user pair.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_open_session(
        &self,
        transfer_id: TransferId,
        user_id: UserId,
    ) -> Result<Option<ReceivingSession>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM receiving_sessions
            WHERE transfer_id = ? AND user_id = ? AND state IN ('started', 'active')
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(transfer_id.as_i64())
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| session_from_row(&r)))
    }

    /// Load a session by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ReceivingSession>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM receiving_sessions WHERE session_id = ?")
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| session_from_row(&r)))
    }

    /// Persist the scan-progress side of a session after a scored event.
    pub async fn update_session_progress(
        &self,
        session: &ReceivingSession,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE receiving_sessions
            SET state = ?, items_scanned = ?, error_count = ?, last_scan_at = ?
            WHERE session_id = ?
            "#,
        )
        .bind(session.state.as_str())
        .bind(session.items_scanned)
        .bind(session.error_count)
        .bind(session.last_scan_at.map(|t| t.as_i64()))
        .bind(session.session_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist completion: final counters recomputed from the event log plus
    /// the summary metrics.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete_session(
        &self,
        session_id: &SessionId,
        completed_at: TimeMs,
        items_scanned: i64,
        error_count: i64,
        duration_seconds: i64,
        scans_per_minute: f64,
        accuracy: f64,
        performance_score: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE receiving_sessions
            SET state = 'completed', completed_at = ?, items_scanned = ?, error_count = ?,
                duration_seconds = ?, scans_per_minute = ?, accuracy = ?, performance_score = ?
            WHERE session_id = ?
            "#,
        )
        .bind(completed_at.as_i64())
        .bind(items_scanned)
        .bind(error_count)
        .bind(duration_seconds)
        .bind(scans_per_minute)
        .bind(accuracy)
        .bind(performance_score)
        .bind(session_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stamp a completed session as aggregated + evaluated.
    pub async fn mark_session_evaluated(
        &self,
        session_id: &SessionId,
        at: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE receiving_sessions SET evaluated_at = ? WHERE session_id = ?")
            .bind(at.as_i64())
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Completed sessions the at-least-once sweep still needs to process.
    pub async fn pending_evaluations(&self) -> Result<Vec<ReceivingSession>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM receiving_sessions
            WHERE state = 'completed' AND evaluated_at IS NULL
            ORDER BY completed_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(session_from_row).collect())
    }

    /// Completed sessions for one user+outlet on one calendar day; the daily
    /// stat row is a full recompute over these.
    pub async fn completed_sessions_for_day(
        &self,
        user_id: UserId,
        outlet_id: OutletId,
        date: NaiveDate,
    ) -> Result<Vec<ReceivingSession>, sqlx::Error> {
        let (from_ms, to_ms) = day_bounds_ms(date);
        let rows = sqlx::query(
            r#"
            SELECT * FROM receiving_sessions
            WHERE user_id = ? AND outlet_id = ? AND state = 'completed'
              AND completed_at >= ? AND completed_at < ?
            ORDER BY completed_at ASC
            "#,
        )
        .bind(user_id.as_i64())
        .bind(outlet_id.as_i64())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(session_from_row).collect())
    }

    /// Most recently completed sessions for a user.
    pub async fn recent_sessions(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<ReceivingSession>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM receiving_sessions
            WHERE user_id = ? AND state = 'completed'
            ORDER BY completed_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.as_i64())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(session_from_row).collect())
    }

    // ---- scan events ----

    /// Append a scored scan event idempotently; the content-derived event_key
    /// makes a retried append a no-op. Returns the event row id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn append_scan_event(&self, event: &ScanEvent) -> Result<i64, sqlx::Error> {
        let reasons_json =
            serde_json::to_string(&event.fraud_reasons).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO scan_events (
                event_key, session_id, transfer_id, user_id, outlet_id, barcode,
                product_id, quantity, scan_result, device_type, ip_address, scanned_at,
                time_since_last_scan_ms, is_suspicious, fraud_score, fraud_reasons
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_key) DO NOTHING
            "#,
        )
        .bind(event.event_key())
        .bind(event.session_id.as_str())
        .bind(event.transfer_id.as_i64())
        .bind(event.user_id.as_i64())
        .bind(event.outlet_id.as_i64())
        .bind(&event.barcode)
        .bind(event.product_id)
        .bind(event.quantity)
        .bind(event.scan_result.as_str())
        .bind(event.device_type.as_str())
        .bind(event.ip_address.as_deref())
        .bind(event.scanned_at.as_i64())
        .bind(event.time_since_last_scan_ms)
        .bind(event.is_suspicious)
        .bind(event.fraud_score)
        .bind(reasons_json)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(result.last_insert_rowid());
        }

        // Replayed append: hand back the id of the existing row.
        let row = sqlx::query("SELECT event_id FROM scan_events WHERE event_key = ?")
            .bind(event.event_key())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("event_id"))
    }

    /// Load a scan event with its full reason list.
    pub async fn get_scan_event(&self, event_id: i64) -> Result<Option<ScanEvent>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM scan_events WHERE event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| scan_event_from_row(&r)))
    }

    /// Ordered scan history of a session, oldest first.
    pub async fn session_history(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<HistoryScan>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT barcode, scan_result, scanned_at FROM scan_events
            WHERE session_id = ?
            ORDER BY scanned_at ASC, event_id ASC
            "#,
        )
        .bind(session_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let result_str: String = r.get("scan_result");
                HistoryScan {
                    barcode: r.get("barcode"),
                    scan_result: result_str.parse().unwrap_or(ScanResult::Error),
                    scanned_at: TimeMs::new(r.get("scanned_at")),
                }
            })
            .collect())
    }

    /// Count of non-error events referencing a session. Source of truth for
    /// the session's items_scanned counter at completion.
    pub async fn session_event_counts(
        &self,
        session_id: &SessionId,
    ) -> Result<(i64, i64), sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN scan_result != 'error' THEN 1 ELSE 0 END), 0) AS items,
                COALESCE(SUM(CASE WHEN scan_result != 'success' THEN 1 ELSE 0 END), 0) AS errors
            FROM scan_events
            WHERE session_id = ?
            "#,
        )
        .bind(session_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get("items"), row.get("errors")))
    }

    /// Page through flagged events, optionally filtered by window, severity
    /// band, and alert review status. Newest first.
    pub async fn suspicious_scans(
        &self,
        from_ms: Option<i64>,
        severity: Option<Severity>,
        status: Option<AlertStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SuspiciousScan>, sqlx::Error> {
        let mut sql = String::from(
            r#"
            SELECT e.*, a.alert_id AS alert_id, a.status AS alert_status
            FROM scan_events e
            LEFT JOIN fraud_alerts a ON a.event_id = e.event_id
            WHERE e.is_suspicious = 1
            "#,
        );
        if from_ms.is_some() {
            sql.push_str(" AND e.scanned_at >= ?");
        }
        if severity.is_some() {
            sql.push_str(" AND e.fraud_score >= ? AND e.fraud_score < ?");
        }
        if status.is_some() {
            sql.push_str(" AND a.status = ?");
        }
        sql.push_str(" ORDER BY e.scanned_at DESC, e.event_id DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(from) = from_ms {
            query = query.bind(from);
        }
        if let Some(sev) = severity {
            query = query.bind(sev.min_score()).bind(sev.max_score_exclusive());
        }
        if let Some(st) = status {
            query = query.bind(st.as_str());
        }
        query = query.bind(limit).bind(offset);

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|r| {
                let status_str: Option<String> = r.get("alert_status");
                SuspiciousScan {
                    event: scan_event_from_row(r),
                    alert_id: r.get("alert_id"),
                    alert_status: status_str.and_then(|s| s.parse().ok()),
                }
            })
            .collect())
    }

    // ---- fraud rules & alerts ----

    /// Load the full rule set, active and inactive. Read-only at scoring time.
    pub async fn load_fraud_rules(&self) -> Result<Vec<FraudRule>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM fraud_rules ORDER BY rule_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|r| {
                let signal_str: String = r.get("signal_type");
                let signal_type: SignalType = signal_str.parse().ok()?;
                Some(FraudRule {
                    rule_id: r.get("rule_id"),
                    signal_type,
                    threshold: r.get("threshold"),
                    weight: r.get("weight"),
                    is_active: r.get::<i64, _>("is_active") != 0,
                })
            })
            .collect())
    }

    /// Create a review-queue alert for a suspicious event.
    pub async fn insert_fraud_alert(
        &self,
        event_id: i64,
        user_id: UserId,
        outlet_id: OutletId,
        severity: Severity,
        created_at: TimeMs,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO fraud_alerts (event_id, user_id, outlet_id, severity, status, created_at)
            VALUES (?, ?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(event_id)
        .bind(user_id.as_i64())
        .bind(outlet_id.as_i64())
        .bind(severity.as_str())
        .bind(created_at.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_fraud_alert(&self, alert_id: i64) -> Result<Option<FraudAlert>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM fraud_alerts WHERE alert_id = ?")
            .bind(alert_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| alert_from_row(&r)))
    }

    /// Move an alert through the reviewer workflow.
    pub async fn update_alert_status(
        &self,
        alert_id: i64,
        status: AlertStatus,
        reviewed_by: Option<i64>,
        reviewed_at: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE fraud_alerts SET status = ?, reviewed_by = ?, reviewed_at = ? WHERE alert_id = ?",
        )
        .bind(status.as_str())
        .bind(reviewed_by)
        .bind(reviewed_at.as_i64())
        .bind(alert_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- daily stats ----

    /// Upsert one day's recomputed stat row.
    pub async fn upsert_daily_stat(&self, stat: &DailyPerformanceStat) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO daily_performance_stats (
                user_id, outlet_id, date, transfers_completed, items_scanned, error_count,
                avg_scans_per_minute, avg_accuracy, performance_score, first_completed_ms, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, outlet_id, date) DO UPDATE SET
                transfers_completed = excluded.transfers_completed,
                items_scanned = excluded.items_scanned,
                error_count = excluded.error_count,
                avg_scans_per_minute = excluded.avg_scans_per_minute,
                avg_accuracy = excluded.avg_accuracy,
                performance_score = excluded.performance_score,
                first_completed_ms = excluded.first_completed_ms,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(stat.user_id.as_i64())
        .bind(stat.outlet_id.as_i64())
        .bind(stat.date.to_string())
        .bind(stat.transfers_completed)
        .bind(stat.items_scanned)
        .bind(stat.error_count)
        .bind(stat.avg_scans_per_minute)
        .bind(stat.avg_accuracy)
        .bind(stat.performance_score)
        .bind(stat.first_completed_ms)
        .bind(TimeMs::now().as_i64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stat rows for one user inside a window (None = all-time full scan).
    pub async fn stats_for_user(
        &self,
        user_id: UserId,
        from_date: Option<NaiveDate>,
    ) -> Result<Vec<DailyPerformanceStat>, sqlx::Error> {
        let rows = match from_date {
            Some(from) => {
                sqlx::query(
                    "SELECT * FROM daily_performance_stats WHERE user_id = ? AND date >= ? ORDER BY date ASC",
                )
                .bind(user_id.as_i64())
                .bind(from.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM daily_performance_stats WHERE user_id = ? ORDER BY date ASC",
                )
                .bind(user_id.as_i64())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().map(stat_from_row).collect())
    }

    /// Group stat rows in a window by user for the leaderboard.
    pub async fn aggregate_stats_by_user(
        &self,
        from_date: Option<NaiveDate>,
    ) -> Result<Vec<UserAggregate>, sqlx::Error> {
        let base = r#"
            SELECT user_id,
                   SUM(transfers_completed) AS transfers_completed,
                   SUM(items_scanned) AS items_scanned,
                   SUM(error_count) AS error_count,
                   AVG(avg_scans_per_minute) AS avg_scans_per_minute,
                   AVG(avg_accuracy) AS avg_accuracy,
                   AVG(performance_score) AS avg_performance_score,
                   MIN(first_completed_ms) AS first_completed_ms
            FROM daily_performance_stats
        "#;
        let rows = match from_date {
            Some(from) => {
                let sql = format!("{} WHERE date >= ? GROUP BY user_id", base);
                sqlx::query(&sql)
                    .bind(from.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{} GROUP BY user_id", base);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        Ok(rows
            .iter()
            .map(|r| UserAggregate {
                user_id: UserId::new(r.get("user_id")),
                transfers_completed: r.get("transfers_completed"),
                items_scanned: r.get("items_scanned"),
                error_count: r.get("error_count"),
                avg_scans_per_minute: r.get("avg_scans_per_minute"),
                avg_accuracy: r.get("avg_accuracy"),
                avg_performance_score: r.get("avg_performance_score"),
                first_completed_ms: r.get("first_completed_ms"),
            })
            .collect())
    }

    // ---- achievements ----

    pub async fn earned_achievements(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Achievement>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM user_achievements WHERE user_id = ? ORDER BY earned_at ASC",
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Achievement {
                user_id: UserId::new(r.get("user_id")),
                achievement_code: r.get("achievement_code"),
                earned_at: TimeMs::new(r.get("earned_at")),
            })
            .collect())
    }

    /// Award an achievement. Returns false if the user already holds the
    /// code; re-evaluation is a no-op, never a duplicate row.
    pub async fn insert_achievement(
        &self,
        user_id: UserId,
        code: &str,
        earned_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_code, earned_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, achievement_code) DO NOTHING
            "#,
        )
        .bind(user_id.as_i64())
        .bind(code)
        .bind(earned_at.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Completed-session metrics for achievement predicates, oldest first.
    pub async fn completed_session_metrics(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SessionMetrics>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT items_scanned, scans_per_minute, accuracy, completed_at
            FROM receiving_sessions
            WHERE user_id = ? AND state = 'completed' AND completed_at IS NOT NULL
            ORDER BY completed_at ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| SessionMetrics {
                items_scanned: r.get("items_scanned"),
                scans_per_minute: r.get::<Option<f64>, _>("scans_per_minute").unwrap_or(0.0),
                accuracy: r.get::<Option<f64>, _>("accuracy").unwrap_or(0.0),
                completed_at: TimeMs::new(r.get("completed_at")),
            })
            .collect())
    }

    /// Every scan result for a user in scan order, for streak predicates.
    pub async fn scan_results_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ScanResult>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT scan_result FROM scan_events
            WHERE user_id = ?
            ORDER BY scanned_at ASC, event_id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let s: String = r.get("scan_result");
                s.parse().unwrap_or(ScanResult::Error)
            })
            .collect())
    }

    // ---- settings layers ----

    /// Load one layer's sparse override row.
    pub async fn load_settings_layer(
        &self,
        level: SettingsLevel,
        scope_id: i64,
    ) -> Result<Option<SettingsOverride>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM settings_layers WHERE level = ? AND scope_id = ?")
            .bind(level.as_str())
            .bind(scope_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            let symbology_str: Option<String> = r.get("symbology");
            SettingsOverride {
                min_scan_interval_ms: r.get("min_scan_interval_ms"),
                sequential_window: r.get("sequential_window"),
                max_quantity_per_scan: r.get("max_quantity_per_scan"),
                symbology: symbology_str.and_then(|s| s.parse::<Symbology>().ok()),
            }
        }))
    }

    /// Replace one layer's override row. Each layer row is independently
    /// owned, so no cross-layer coordination is needed.
    pub async fn upsert_settings_layer(
        &self,
        level: SettingsLevel,
        scope_id: i64,
        overrides: &SettingsOverride,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO settings_layers
                (level, scope_id, min_scan_interval_ms, sequential_window,
                 max_quantity_per_scan, symbology, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(level, scope_id) DO UPDATE SET
                min_scan_interval_ms = excluded.min_scan_interval_ms,
                sequential_window = excluded.sequential_window,
                max_quantity_per_scan = excluded.max_quantity_per_scan,
                symbology = excluded.symbology,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(level.as_str())
        .bind(scope_id)
        .bind(overrides.min_scan_interval_ms)
        .bind(overrides.sequential_window)
        .bind(overrides.max_quantity_per_scan)
        .bind(overrides.symbology.map(|s| s.as_str()))
        .bind(TimeMs::now().as_i64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete one layer's override row (reset to inherit).
    pub async fn delete_settings_layer(
        &self,
        level: SettingsLevel,
        scope_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM settings_layers WHERE level = ? AND scope_id = ?")
            .bind(level.as_str())
            .bind(scope_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// UTC millisecond bounds [start, end) of a calendar day.
fn day_bounds_ms(date: NaiveDate) -> (i64, i64) {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let end = start + chrono::Duration::days(1);
    (start.timestamp_millis(), end.timestamp_millis())
}

fn session_from_row(row: &SqliteRow) -> ReceivingSession {
    let state_str: String = row.get("state");
    ReceivingSession {
        session_id: SessionId::new(row.get("session_id")),
        transfer_id: TransferId::new(row.get("transfer_id")),
        transfer_type: row.get("transfer_type"),
        user_id: UserId::new(row.get("user_id")),
        outlet_id: OutletId::new(row.get("outlet_id")),
        state: state_str.parse().unwrap_or(SessionState::Abandoned),
        started_at: TimeMs::new(row.get("started_at")),
        last_scan_at: row
            .get::<Option<i64>, _>("last_scan_at")
            .map(TimeMs::new),
        completed_at: row
            .get::<Option<i64>, _>("completed_at")
            .map(TimeMs::new),
        items_scanned: row.get("items_scanned"),
        error_count: row.get("error_count"),
        duration_seconds: row.get("duration_seconds"),
        scans_per_minute: row.get("scans_per_minute"),
        accuracy: row.get("accuracy"),
        performance_score: row.get("performance_score"),
        evaluated_at: row
            .get::<Option<i64>, _>("evaluated_at")
            .map(TimeMs::new),
    }
}

fn scan_event_from_row(row: &SqliteRow) -> ScanEvent {
    let result_str: String = row.get("scan_result");
    let device_str: String = row.get("device_type");
    let reasons_json: String = row.get("fraud_reasons");
    ScanEvent {
        event_id: row.get("event_id"),
        event_key: row.get("event_key"),
        session_id: SessionId::new(row.get("session_id")),
        transfer_id: TransferId::new(row.get("transfer_id")),
        user_id: UserId::new(row.get("user_id")),
        outlet_id: OutletId::new(row.get("outlet_id")),
        barcode: row.get("barcode"),
        product_id: row.get("product_id"),
        quantity: row.get("quantity"),
        scan_result: result_str.parse().unwrap_or(ScanResult::Error),
        device_type: device_str.parse().unwrap_or(DeviceType::UsbScanner),
        ip_address: row.get("ip_address"),
        scanned_at: TimeMs::new(row.get("scanned_at")),
        time_since_last_scan_ms: row.get("time_since_last_scan_ms"),
        is_suspicious: row.get::<i64, _>("is_suspicious") != 0,
        fraud_score: row.get("fraud_score"),
        fraud_reasons: serde_json::from_str(&reasons_json).unwrap_or_default(),
    }
}

fn stat_from_row(row: &SqliteRow) -> DailyPerformanceStat {
    let date_str: String = row.get("date");
    DailyPerformanceStat {
        user_id: UserId::new(row.get("user_id")),
        outlet_id: OutletId::new(row.get("outlet_id")),
        date: date_str.parse().unwrap_or_default(),
        transfers_completed: row.get("transfers_completed"),
        items_scanned: row.get("items_scanned"),
        error_count: row.get("error_count"),
        avg_scans_per_minute: row.get("avg_scans_per_minute"),
        avg_accuracy: row.get("avg_accuracy"),
        performance_score: row.get("performance_score"),
        first_completed_ms: row.get("first_completed_ms"),
    }
}

fn alert_from_row(row: &SqliteRow) -> FraudAlert {
    let severity_str: String = row.get("severity");
    let status_str: String = row.get("status");
    FraudAlert {
        alert_id: row.get("alert_id"),
        event_id: row.get("event_id"),
        user_id: UserId::new(row.get("user_id")),
        outlet_id: OutletId::new(row.get("outlet_id")),
        severity: severity_str.parse().unwrap_or(Severity::Low),
        status: status_str.parse().unwrap_or(AlertStatus::Pending),
        created_at: TimeMs::new(row.get("created_at")),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row
            .get::<Option<i64>, _>("reviewed_at")
            .map(TimeMs::new),
    }
}
