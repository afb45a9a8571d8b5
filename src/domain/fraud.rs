//! Fraud detection types: signals, rules, severity bands, alerts.

use crate::domain::{OutletId, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// The independent signals the scoring engine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Speed,
    Duplicate,
    SequentialPattern,
    InvalidBarcode,
    ExcessiveQuantity,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Speed => "speed",
            SignalType::Duplicate => "duplicate",
            SignalType::SequentialPattern => "sequential_pattern",
            SignalType::InvalidBarcode => "invalid_barcode",
            SignalType::ExcessiveQuantity => "excessive_quantity",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignalType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speed" => Ok(SignalType::Speed),
            "duplicate" => Ok(SignalType::Duplicate),
            "sequential_pattern" => Ok(SignalType::SequentialPattern),
            "invalid_barcode" => Ok(SignalType::InvalidBarcode),
            "excessive_quantity" => Ok(SignalType::ExcessiveQuantity),
            _ => Err(()),
        }
    }
}

/// One scoring rule, read-only at scoring time.
///
/// `threshold` is the built-in default parameter for the signal; scoped
/// overrides come from the settings cascade and take precedence where a
/// cascade key exists for the signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRule {
    pub rule_id: String,
    pub signal_type: SignalType,
    pub threshold: f64,
    pub weight: i64,
    pub is_active: bool,
}

/// Severity bands partitioning the 0-100 fraud score.
///
/// One canonical set, applied uniformly to scoring, alerting and dashboards:
/// critical >= 80, high >= 60, medium >= 40, low > 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

pub const SEVERITY_CRITICAL_MIN: i64 = 80;
pub const SEVERITY_HIGH_MIN: i64 = 60;
pub const SEVERITY_MEDIUM_MIN: i64 = 40;

impl Severity {
    /// Band for a score. Zero maps to no band at all: a zero score is never
    /// alert-worthy even when inactive rules left reasons behind.
    pub fn from_score(score: i64) -> Option<Severity> {
        match score {
            s if s >= SEVERITY_CRITICAL_MIN => Some(Severity::Critical),
            s if s >= SEVERITY_HIGH_MIN => Some(Severity::High),
            s if s >= SEVERITY_MEDIUM_MIN => Some(Severity::Medium),
            s if s > 0 => Some(Severity::Low),
            _ => None,
        }
    }

    /// Minimum score included in this band (for range filters).
    pub fn min_score(&self) -> i64 {
        match self {
            Severity::Critical => SEVERITY_CRITICAL_MIN,
            Severity::High => SEVERITY_HIGH_MIN,
            Severity::Medium => SEVERITY_MEDIUM_MIN,
            Severity::Low => 1,
        }
    }

    /// Exclusive upper score bound for this band.
    pub fn max_score_exclusive(&self) -> i64 {
        match self {
            Severity::Critical => 101,
            Severity::High => SEVERITY_CRITICAL_MIN,
            Severity::Medium => SEVERITY_HIGH_MIN,
            Severity::Low => SEVERITY_MEDIUM_MIN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            _ => Err(()),
        }
    }
}

/// Reviewer workflow state of a fraud alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Reviewed,
    Flagged,
    Approved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Reviewed => "reviewed",
            AlertStatus::Flagged => "flagged",
            AlertStatus::Approved => "approved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AlertStatus::Pending),
            "reviewed" => Ok(AlertStatus::Reviewed),
            "flagged" => Ok(AlertStatus::Flagged),
            "approved" => Ok(AlertStatus::Approved),
            _ => Err(()),
        }
    }
}

/// Review-queue row derived from a suspicious scan event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlert {
    pub alert_id: i64,
    pub event_id: i64,
    pub user_id: UserId,
    pub outlet_id: OutletId,
    pub severity: Severity,
    pub status: AlertStatus,
    pub created_at: TimeMs,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<TimeMs>,
}
