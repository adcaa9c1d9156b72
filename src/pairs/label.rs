//! Synthetic preference labels
use super::RawPair;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rule for converting the returns of a segment pair into a preference strength.
///
/// The preference strength `mu` is the probability that segment 1 is preferred over segment 0.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabelPolicy {
    /// `mu = 0` if `return0 > return1` else `1`. Ties go to segment 1.
    Binary,
    /// Per-step return difference scaled by the largest magnitude in the batch.
    ///
    /// `mu = 0.5 + 0.5 * diff / max|diff|` where `diff = (return1 - return0) / len`.
    Continuous,
    /// `mu = sigmoid(return1 - return0)`
    Sigmoid,
    /// [`LabelPolicy::Sigmoid`] rounded to the nearest multiple of `step`.
    SigmoidQuantized { step: f64 },
}

impl LabelPolicy {
    /// Short name used in archive file names.
    pub fn name(&self) -> String {
        match self {
            Self::Binary => "binary".into(),
            Self::Continuous => "continuous".into(),
            Self::Sigmoid => "sigmoid".into(),
            Self::SigmoidQuantized { step } => format!("sigmoid-{}", step),
        }
    }
}

impl fmt::Display for LabelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A segment pair with its preference strength.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabeledPair {
    pub pair: RawPair,
    /// Strength in `[0, 1]` of the preference for segment 1.
    pub mu: f64,
    /// Batch-normalized return difference in `[-1, 1]`.
    ///
    /// Only set by [`LabelPolicy::Continuous`].
    pub normalized_mu: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LabelError {
    #[error("all return differences in the batch are zero; cannot normalize")]
    DegenerateBatch,
    #[error("pair {index} has zero-length segments")]
    EmptySegment { index: usize },
    #[error("quantization step {0} does not evenly divide [0, 1]")]
    InvalidStep(f64),
    #[error("pair {index} has a non-finite return")]
    NonFiniteReturn { index: usize },
}

/// Tolerance on `k * step == 1` for a quantization step to be accepted.
const STEP_TOLERANCE: f64 = 1e-9;

/// Whether `step` splits `[0, 1]` into a whole number of intervals.
fn is_valid_step(step: f64) -> bool {
    step > 0.0 && step <= 1.0 && ((1.0 / step).round() * step - 1.0).abs() <= STEP_TOLERANCE
}

/// Logistic sigmoid, evaluated without overflow for large magnitudes.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Label every pair in a batch with one policy.
///
/// [`LabelPolicy::Continuous`] depends on the whole batch;
/// the other policies label each pair independently.
/// Fails if any return is NaN or infinite.
pub fn label_pairs(pairs: &[RawPair], policy: LabelPolicy) -> Result<Vec<LabeledPair>, LabelError> {
    if let Some(index) = pairs
        .iter()
        .position(|p| !(p.return0.is_finite() && p.return1.is_finite()))
    {
        return Err(LabelError::NonFiniteReturn { index });
    }
    let labeled = |pair: &RawPair, mu| LabeledPair {
        pair: *pair,
        mu,
        normalized_mu: None,
    };
    match policy {
        LabelPolicy::Binary => Ok(pairs
            .iter()
            .map(|p| labeled(p, if p.return0 > p.return1 { 0.0 } else { 1.0 }))
            .collect()),
        LabelPolicy::Sigmoid => Ok(pairs
            .iter()
            .map(|p| labeled(p, sigmoid(p.return1 - p.return0)))
            .collect()),
        LabelPolicy::SigmoidQuantized { step } => {
            if !is_valid_step(step) {
                return Err(LabelError::InvalidStep(step));
            }
            Ok(pairs
                .iter()
                .map(|p| {
                    let mu = (sigmoid(p.return1 - p.return0) / step).round() * step;
                    labeled(p, mu.min(1.0))
                })
                .collect())
        }
        LabelPolicy::Continuous => label_continuous(pairs),
    }
}

fn label_continuous(pairs: &[RawPair]) -> Result<Vec<LabeledPair>, LabelError> {
    if pairs.is_empty() {
        return Ok(Vec::new());
    }
    let diffs = pairs
        .iter()
        .enumerate()
        .map(|(index, p)| {
            if p.is_empty() {
                Err(LabelError::EmptySegment { index })
            } else {
                Ok((p.return1 - p.return0) / p.len() as f64)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let max_abs = diffs.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
    if max_abs == 0.0 || !max_abs.is_finite() {
        return Err(LabelError::DegenerateBatch);
    }

    Ok(pairs
        .iter()
        .zip(diffs)
        .map(|(p, diff)| {
            let normalized = diff / max_abs;
            LabeledPair {
                pair: *p,
                mu: 0.5 + 0.5 * normalized,
                normalized_mu: Some(normalized),
            }
        })
        .collect())
}
