//! Pure fraud scoring: five independent signals over a scan and its session
//! history. No I/O, no clock reads; everything the function needs arrives as
//! an argument, so a given input always scores identically.

use crate::db::repo::HistoryScan;
use crate::domain::{FraudRule, ScanResult, SignalType};
use crate::engine::barcode::{is_sequential_run, validate_barcode};
use crate::settings::EffectiveSettings;

/// The scan under evaluation, before classification.
#[derive(Debug, Clone)]
pub struct ScanInput<'a> {
    pub barcode: &'a str,
    pub quantity: i64,
    /// Milliseconds since the previous scan in this session, None for the
    /// first scan.
    pub time_since_last_scan_ms: Option<i64>,
}

/// Scoring verdict attached to the event before persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Sum of fired active rule weights, capped at 100.
    pub score: i64,
    /// One reason per triggered signal, active or not, prefixed with the
    /// signal name so consumers can filter by signal.
    pub reasons: Vec<String>,
    pub is_suspicious: bool,
    pub scan_result: ScanResult,
}

/// Score one scan against the active rule set.
///
/// Every triggered signal contributes a reason; only rules marked active
/// contribute weight. A scan is suspicious when its score is positive and at
/// least one active rule fired, so a weight-zero rule set never flags.
pub fn score_scan(
    input: &ScanInput<'_>,
    history: &[HistoryScan],
    rules: &[FraudRule],
    settings: &EffectiveSettings,
) -> ScoreOutcome {
    let mut score: i64 = 0;
    let mut reasons = Vec::new();
    let mut active_fired = false;
    let mut duplicate = false;
    let mut invalid = false;

    for rule in rules {
        let Some(reason) = evaluate_signal(rule, input, history, settings) else {
            continue;
        };
        match rule.signal_type {
            SignalType::Duplicate => duplicate = true,
            SignalType::InvalidBarcode => invalid = true,
            _ => {}
        }
        reasons.push(format!("{}: {}", rule.signal_type, reason));
        if rule.is_active {
            active_fired = true;
            score += rule.weight;
        }
    }

    let score = score.min(100);
    // Classification precedence: a duplicate of an invalid code is an error.
    let scan_result = if invalid {
        ScanResult::Error
    } else if duplicate {
        ScanResult::Duplicate
    } else {
        ScanResult::Success
    };

    ScoreOutcome {
        score,
        reasons,
        is_suspicious: score > 0 && active_fired,
        scan_result,
    }
}

/// Evaluate one rule's signal; Some(reason) when it triggers.
///
/// Cascade-managed parameters override the rule's built-in threshold for the
/// signals the cascade covers.
fn evaluate_signal(
    rule: &FraudRule,
    input: &ScanInput<'_>,
    history: &[HistoryScan],
    settings: &EffectiveSettings,
) -> Option<String> {
    match rule.signal_type {
        SignalType::Speed => {
            let min_interval = settings.min_scan_interval_ms;
            let elapsed = input.time_since_last_scan_ms?;
            (elapsed < min_interval).then(|| {
                format!(
                    "scan interval {}ms below minimum {}ms",
                    elapsed, min_interval
                )
            })
        }
        SignalType::Duplicate => {
            let seen = history
                .iter()
                .any(|h| h.scan_result == ScanResult::Success && h.barcode == input.barcode);
            seen.then(|| format!("barcode {} already scanned in this session", input.barcode))
        }
        SignalType::SequentialPattern => {
            let window = usize::try_from(settings.sequential_window).unwrap_or(0);
            if window < 2 || history.len() + 1 < window {
                return None;
            }
            let mut run: Vec<&str> = history[history.len() - (window - 1)..]
                .iter()
                .map(|h| h.barcode.as_str())
                .collect();
            run.push(input.barcode);
            is_sequential_run(&run)
                .then(|| format!("sequential barcode pattern over last {} scans", window))
        }
        SignalType::InvalidBarcode => {
            let valid = validate_barcode(settings.symbology, input.barcode);
            (!valid).then(|| {
                format!(
                    "barcode {} failed {} validation",
                    input.barcode, settings.symbology
                )
            })
        }
        SignalType::ExcessiveQuantity => {
            let max = settings.max_quantity_per_scan;
            (input.quantity > max)
                .then(|| format!("quantity {} exceeds per-scan limit {}", input.quantity, max))
        }
    }
}
