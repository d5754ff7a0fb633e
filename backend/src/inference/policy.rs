use shared::ClassificationResult;

use super::model::InferenceError;
use crate::config::{ModelConfig, ModelOutput, PolicyKind};

/// How a probability vector is turned into a single label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionPolicy {
    /// Highest-probability label wins.
    Argmax,
    /// Highest-probability label wins only if it reaches `threshold`;
    /// otherwise the result is the unrecognized sentinel.
    Thresholded { threshold: f32 },
}

impl DecisionPolicy {
    pub fn from_config(config: &ModelConfig) -> Self {
        match config.policy {
            PolicyKind::Argmax => DecisionPolicy::Argmax,
            PolicyKind::Thresholded => DecisionPolicy::Thresholded {
                threshold: config.threshold,
            },
        }
    }

    fn apply(&self, label: &str, confidence: f32) -> ClassificationResult {
        match *self {
            DecisionPolicy::Thresholded { threshold } if confidence < threshold => {
                ClassificationResult::unrecognized(confidence)
            }
            _ => ClassificationResult::new(label, confidence),
        }
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Maps raw model output onto `labels` and applies `policy`.
///
/// With exactly two labels the first output is read as a sigmoid score for
/// `labels[1]`; otherwise the output must have one entry per label.
pub fn decide(
    output: &[f32],
    labels: &[String],
    policy: DecisionPolicy,
    output_kind: ModelOutput,
) -> Result<ClassificationResult, InferenceError> {
    if output.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::Model("model output contains NaN or infinity".into()));
    }

    if labels.len() == 2 {
        let raw = *output.first().ok_or(InferenceError::OutputShape {
            expected: 1,
            got: 0,
        })?;
        let p = match output_kind {
            ModelOutput::Probabilities => raw,
            ModelOutput::Logits => sigmoid(raw),
        };
        let (label, confidence) = if p > 0.5 {
            (&labels[1], p)
        } else {
            (&labels[0], 1.0 - p)
        };
        return Ok(policy.apply(label, confidence));
    }

    if output.len() != labels.len() {
        return Err(InferenceError::OutputShape {
            expected: labels.len(),
            got: output.len(),
        });
    }

    let probabilities = match output_kind {
        ModelOutput::Probabilities => output.to_vec(),
        ModelOutput::Logits => softmax(output),
    };

    let (idx, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

    Ok(policy.apply(&labels[idx], confidence))
}
