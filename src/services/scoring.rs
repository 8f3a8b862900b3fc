//! Normalization of raw scorer probabilities into safety scores and statuses.

use serde_json::Value;

use crate::models::moderation::SafetyStatus;

/// Scores at or above this are Safe.
pub const SAFE_THRESHOLD: f64 = 90.0;

/// Scores at or above this (and below [`SAFE_THRESHOLD`]) are Warning.
pub const WARNING_THRESHOLD: f64 = 70.0;

/// Safety score for one category: the most alarming sub-signal, inverted to a
/// percentage and rounded to two decimals.
pub fn category_score(risk_values: &[f64]) -> Result<f64, ScoringError> {
    let max_risk = risk_values
        .iter()
        .copied()
        .reduce(f64::max)
        .ok_or(ScoringError::EmptySignals)?;

    Ok(round2((1.0 - max_risk) * 100.0))
}

/// Map a score in [0, 100] to its status band.
pub fn status_of(score: f64) -> SafetyStatus {
    if score >= SAFE_THRESHOLD {
        SafetyStatus::Safe
    } else if score >= WARNING_THRESHOLD {
        SafetyStatus::Warning
    } else {
        SafetyStatus::Unsafe
    }
}

/// Pull the sub-signal probabilities for one scorer model out of a raw payload.
pub fn extract_signals(payload: &Value, model: &str) -> Result<Vec<f64>, ScoringError> {
    let signals = payload
        .get(model)
        .and_then(Value::as_object)
        .filter(|signals| !signals.is_empty())
        .ok_or_else(|| ScoringError::MissingCategoryData(model.to_string()))?;

    signals
        .iter()
        .map(|(name, value)| {
            let probability = value.as_f64().ok_or_else(|| ScoringError::InvalidSignal {
                signal: name.clone(),
                reason: "not a number".to_string(),
            })?;
            if !(0.0..=1.0).contains(&probability) {
                return Err(ScoringError::InvalidSignal {
                    signal: name.clone(),
                    reason: format!("probability {probability} outside [0, 1]"),
                });
            }
            Ok(probability)
        })
        .collect()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScoringError {
    #[error("missing category data: {0}")]
    MissingCategoryData(String),

    #[error("missing category data: no sub-signals")]
    EmptySignals,

    #[error("invalid signal '{signal}': {reason}")]
    InvalidSignal { signal: String, reason: String },
}
