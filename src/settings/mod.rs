//! Layered settings cascade: Global -> Outlet -> User -> Transfer.
//!
//! Each non-global layer is a sparse partial record; only explicitly-set keys
//! override the accumulated result. "Override to zero" and "no override" are
//! distinct because unset keys are `None`, not absent map entries.

use crate::db::Repository;
use crate::domain::{OutletId, TransferId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Barcode symbology an outlet expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    /// Format check only (printable ASCII, bounded length).
    Any,
    /// 13 digits with a mod-10 check digit.
    Ean13,
    /// Code 39 character set.
    Code39,
}

impl Symbology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Any => "any",
            Symbology::Ean13 => "ean13",
            Symbology::Code39 => "code39",
        }
    }
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Symbology {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(Symbology::Any),
            "ean13" => Ok(Symbology::Ean13),
            "code39" => Ok(Symbology::Code39),
            _ => Err(()),
        }
    }
}

/// Cascade layer, in precedence order (later overrides earlier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsLevel {
    Global,
    Outlet,
    User,
    Transfer,
}

impl SettingsLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsLevel::Global => "global",
            SettingsLevel::Outlet => "outlet",
            SettingsLevel::User => "user",
            SettingsLevel::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for SettingsLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettingsLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(SettingsLevel::Global),
            "outlet" => Ok(SettingsLevel::Outlet),
            "user" => Ok(SettingsLevel::User),
            "transfer" => Ok(SettingsLevel::Transfer),
            _ => Err(()),
        }
    }
}

/// Scope a resolution request applies to. All parts optional; absent parts
/// simply skip their layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsScope {
    pub user_id: Option<UserId>,
    pub outlet_id: Option<OutletId>,
    pub transfer_id: Option<TransferId>,
}

/// One layer's sparse override row. `None` means "no override", never
/// "override to default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverride {
    pub min_scan_interval_ms: Option<i64>,
    pub sequential_window: Option<i64>,
    pub max_quantity_per_scan: Option<i64>,
    pub symbology: Option<Symbology>,
}

impl SettingsOverride {
    /// Whether this layer overrides anything at all.
    pub fn is_empty(&self) -> bool {
        self.min_scan_interval_ms.is_none()
            && self.sequential_window.is_none()
            && self.max_quantity_per_scan.is_none()
            && self.symbology.is_none()
    }

    /// New override with `self`'s set keys on top of `base`'s.
    pub fn overlaid_on(&self, base: &Self) -> Self {
        SettingsOverride {
            min_scan_interval_ms: self.min_scan_interval_ms.or(base.min_scan_interval_ms),
            sequential_window: self.sequential_window.or(base.sequential_window),
            max_quantity_per_scan: self.max_quantity_per_scan.or(base.max_quantity_per_scan),
            symbology: self.symbology.or(base.symbology),
        }
    }

    /// Overlay set keys of `self` onto `base`.
    pub fn apply_to(&self, base: &mut EffectiveSettings) {
        if let Some(v) = self.min_scan_interval_ms {
            base.min_scan_interval_ms = v;
        }
        if let Some(v) = self.sequential_window {
            base.sequential_window = v;
        }
        if let Some(v) = self.max_quantity_per_scan {
            base.max_quantity_per_scan = v;
        }
        if let Some(v) = self.symbology {
            base.symbology = v;
        }
    }
}

/// Fully-resolved settings snapshot. Produced per request, immutable, never
/// persisted; everything the scoring critical path needs is resident here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    /// Scans closer together than this are physically implausible.
    pub min_scan_interval_ms: i64,
    /// Run length for the sequential-pattern signal.
    pub sequential_window: i64,
    /// Per-scan quantity ceiling for the excessive-quantity signal.
    pub max_quantity_per_scan: i64,
    pub symbology: Symbology,
}

impl EffectiveSettings {
    /// Build the base from the global layer, which must be complete. Scoring
    /// never proceeds on zero-value defaults.
    fn from_global(global: &SettingsOverride) -> Result<Self, SettingsError> {
        Ok(EffectiveSettings {
            min_scan_interval_ms: global
                .min_scan_interval_ms
                .ok_or(SettingsError::IncompleteGlobal("min_scan_interval_ms"))?,
            sequential_window: global
                .sequential_window
                .ok_or(SettingsError::IncompleteGlobal("sequential_window"))?,
            max_quantity_per_scan: global
                .max_quantity_per_scan
                .ok_or(SettingsError::IncompleteGlobal("max_quantity_per_scan"))?,
            symbology: global
                .symbology
                .ok_or(SettingsError::IncompleteGlobal("symbology"))?,
        })
    }
}

/// Resolution result: the snapshot plus which layers contributed overrides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSettings {
    pub effective: EffectiveSettings,
    pub sources: Vec<SettingsLevel>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    /// Fatal configuration error: the system cannot score without defaults.
    #[error("global settings row is missing")]
    MissingGlobal,
    #[error("global settings row is missing key {0}")]
    IncompleteGlobal(&'static str),
    /// Transient storage failure; callers retry with bounded backoff.
    #[error("settings storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Read-side of the cascade. Side-effect-free and safe for unbounded
/// concurrent readers.
#[derive(Clone)]
pub struct SettingsResolver {
    repo: Arc<Repository>,
}

impl SettingsResolver {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Resolve effective settings for a scope by merging the four layers
    /// left-to-right: Global, then Outlet, User, Transfer overrides.
    pub async fn resolve(&self, scope: SettingsScope) -> Result<ResolvedSettings, SettingsError> {
        let global = self
            .repo
            .load_settings_layer(SettingsLevel::Global, 0)
            .await?
            .ok_or(SettingsError::MissingGlobal)?;

        let mut effective = EffectiveSettings::from_global(&global)?;
        let mut sources = vec![SettingsLevel::Global];

        let layers = [
            (SettingsLevel::Outlet, scope.outlet_id.map(|o| o.as_i64())),
            (SettingsLevel::User, scope.user_id.map(|u| u.as_i64())),
            (
                SettingsLevel::Transfer,
                scope.transfer_id.map(|t| t.as_i64()),
            ),
        ];

        for (level, scope_id) in layers {
            let Some(scope_id) = scope_id else { continue };
            if let Some(layer) = self.repo.load_settings_layer(level, scope_id).await? {
                if !layer.is_empty() {
                    layer.apply_to(&mut effective);
                    sources.push(level);
                }
            }
        }

        Ok(ResolvedSettings { effective, sources })
    }
}

/// Named preset contents. Applying a preset writes one layer's override row;
/// it is a plain write, fully separate from read-time resolution.
pub fn preset_overrides(name: &str) -> Option<SettingsOverride> {
    match name {
        "relaxed" => Some(SettingsOverride {
            min_scan_interval_ms: Some(50),
            sequential_window: Some(6),
            max_quantity_per_scan: Some(25),
            symbology: None,
        }),
        "standard" => Some(SettingsOverride {
            min_scan_interval_ms: Some(100),
            sequential_window: Some(5),
            max_quantity_per_scan: Some(10),
            symbology: Some(Symbology::Any),
        }),
        "strict" => Some(SettingsOverride {
            min_scan_interval_ms: Some(200),
            sequential_window: Some(4),
            max_quantity_per_scan: Some(5),
            symbology: None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_global() -> SettingsOverride {
        SettingsOverride {
            min_scan_interval_ms: Some(100),
            sequential_window: Some(5),
            max_quantity_per_scan: Some(10),
            symbology: Some(Symbology::Any),
        }
    }

    #[test]
    fn test_global_must_be_complete() {
        let mut global = full_global();
        global.sequential_window = None;
        let err = EffectiveSettings::from_global(&global).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::IncompleteGlobal("sequential_window")
        ));
    }

    #[test]
    fn test_overlay_only_set_keys() {
        let mut effective = EffectiveSettings::from_global(&full_global()).unwrap();
        let outlet = SettingsOverride {
            min_scan_interval_ms: Some(250),
            ..Default::default()
        };
        outlet.apply_to(&mut effective);
        assert_eq!(effective.min_scan_interval_ms, 250);
        // Unset keys fall through to the accumulated result.
        assert_eq!(effective.sequential_window, 5);
        assert_eq!(effective.symbology, Symbology::Any);
    }

    #[test]
    fn test_override_to_zero_is_distinct_from_unset() {
        let mut effective = EffectiveSettings::from_global(&full_global()).unwrap();
        let layer = SettingsOverride {
            max_quantity_per_scan: Some(0),
            ..Default::default()
        };
        assert!(!layer.is_empty());
        layer.apply_to(&mut effective);
        assert_eq!(effective.max_quantity_per_scan, 0);
    }

    #[test]
    fn test_later_layers_win() {
        let mut effective = EffectiveSettings::from_global(&full_global()).unwrap();
        SettingsOverride {
            min_scan_interval_ms: Some(150),
            ..Default::default()
        }
        .apply_to(&mut effective);
        SettingsOverride {
            min_scan_interval_ms: Some(300),
            ..Default::default()
        }
        .apply_to(&mut effective);
        assert_eq!(effective.min_scan_interval_ms, 300);
    }

    #[test]
    fn test_presets_exist() {
        assert!(preset_overrides("relaxed").is_some());
        assert!(preset_overrides("standard").is_some());
        assert!(preset_overrides("strict").is_some());
        assert!(preset_overrides("chaotic").is_none());
    }

    #[test]
    fn test_standard_preset_is_complete() {
        // "standard" can seed a full layer; the partial presets cannot.
        let standard = preset_overrides("standard").unwrap();
        assert!(EffectiveSettings::from_global(&standard).is_ok());
        let strict = preset_overrides("strict").unwrap();
        assert!(EffectiveSettings::from_global(&strict).is_err());
    }

    #[test]
    fn test_symbology_round_trip() {
        for s in [Symbology::Any, Symbology::Ean13, Symbology::Code39] {
            assert_eq!(s.as_str().parse::<Symbology>().unwrap(), s);
        }
    }
}
