//! Scan event type: one barcode read inside a receiving session.

use crate::domain::{OutletId, SessionId, TimeMs, TransferId, UserId};
use serde::{Deserialize, Serialize};

/// Outcome classification of a single scan.
///
/// `Duplicate` and `Error` are normal outcomes, not failures; a scan that
/// reaches classification has already been accepted and will be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanResult {
    /// Barcode accepted and counted toward the transfer.
    Success,
    /// Barcode already scanned successfully in this session.
    Duplicate,
    /// Barcode rejected (failed validation for the outlet symbology).
    Error,
}

impl ScanResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanResult::Success => "success",
            ScanResult::Duplicate => "duplicate",
            ScanResult::Error => "error",
        }
    }
}

impl std::fmt::Display for ScanResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScanResult {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(ScanResult::Success),
            "duplicate" => Ok(ScanResult::Duplicate),
            "error" => Ok(ScanResult::Error),
            _ => Err(()),
        }
    }
}

/// Device that produced the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    UsbScanner,
    BluetoothScanner,
    Camera,
    Manual,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::UsbScanner => "usb_scanner",
            DeviceType::BluetoothScanner => "bluetooth_scanner",
            DeviceType::Camera => "camera",
            DeviceType::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "usb_scanner" => Ok(DeviceType::UsbScanner),
            "bluetooth_scanner" => Ok(DeviceType::BluetoothScanner),
            "camera" => Ok(DeviceType::Camera),
            "manual" => Ok(DeviceType::Manual),
            _ => Err(()),
        }
    }
}

/// A single scored scan event. Immutable once persisted; the fraud score is
/// attached before the append and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Row id assigned by the event store (0 before persist).
    pub event_id: i64,
    /// Stable content-derived key used for idempotent append.
    pub event_key: String,
    pub session_id: SessionId,
    pub transfer_id: TransferId,
    pub user_id: UserId,
    pub outlet_id: OutletId,
    pub barcode: String,
    pub product_id: Option<i64>,
    /// Quantity implied by this scan (burst scans carry more than 1).
    pub quantity: i64,
    pub scan_result: ScanResult,
    pub device_type: DeviceType,
    pub ip_address: Option<String>,
    pub scanned_at: TimeMs,
    /// Milliseconds since the previous scan in the session, None for the first.
    pub time_since_last_scan_ms: Option<i64>,
    pub is_suspicious: bool,
    pub fraud_score: i64,
    pub fraud_reasons: Vec<String>,
}

impl ScanEvent {
    /// Stable unique key for a scan: sha256 over the fields that identify a
    /// physical scan, so a retried append never creates a second row.
    pub fn compute_event_key(
        session_id: &SessionId,
        barcode: &str,
        scanned_at: TimeMs,
        device_type: DeviceType,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(session_id.as_str());
        hasher.update(barcode);
        hasher.update(scanned_at.as_i64().to_le_bytes());
        hasher.update(device_type.as_str());
        let hash = hasher.finalize();
        format!("scan:{}", hex::encode(&hash[..16]))
    }

    /// Borrow the precomputed event key.
    pub fn event_key(&self) -> &str {
        &self.event_key
    }
}
