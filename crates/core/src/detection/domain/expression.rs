//! Facial expression labels and per-face probability distributions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed slack when checking that probabilities sum to one.
const SUM_TOLERANCE: f32 = 1e-3;

/// Expression labels, in the output order of the FER+ classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Neutral,
    Happy,
    Surprised,
    Sad,
    Angry,
    Disgusted,
    Fearful,
    Contempt,
}

impl Expression {
    pub const ALL: [Expression; 8] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Surprised,
        Expression::Sad,
        Expression::Angry,
        Expression::Disgusted,
        Expression::Fearful,
        Expression::Contempt,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Surprised => "surprised",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Disgusted => "disgusted",
            Expression::Fearful => "fearful",
            Expression::Contempt => "contempt",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Expression {
    type Err = ScoresError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::ALL
            .into_iter()
            .find(|e| e.label() == s)
            .ok_or_else(|| ScoresError::UnknownLabel(s.to_string()))
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ScoresError {
    #[error("expression scores are empty")]
    Empty,
    #[error("probability for {expression} out of range: {value}")]
    OutOfRange { expression: Expression, value: f32 },
    #[error("probabilities sum to {0}, expected 1")]
    BadSum(f32),
    #[error("duplicate expression label: {0}")]
    Duplicate(Expression),
    #[error("expected {expected} logits, got {actual}")]
    LabelCount { expected: usize, actual: usize },
    #[error("unknown expression label: {0}")]
    UnknownLabel(String),
}

/// Probability per expression, in the order the classifier produced them.
///
/// Invariant: non-empty, every value in `[0, 1]`, no repeated label, values
/// sum to 1 within a small tolerance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpressionScores {
    entries: Vec<(Expression, f32)>,
}

impl ExpressionScores {
    pub fn new(entries: Vec<(Expression, f32)>) -> Result<Self, ScoresError> {
        if entries.is_empty() {
            return Err(ScoresError::Empty);
        }
        for (i, &(expression, value)) in entries.iter().enumerate() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScoresError::OutOfRange { expression, value });
            }
            if entries[..i].iter().any(|(e, _)| *e == expression) {
                return Err(ScoresError::Duplicate(expression));
            }
        }
        let sum: f32 = entries.iter().map(|(_, p)| p).sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(ScoresError::BadSum(sum));
        }
        Ok(Self { entries })
    }

    /// Softmax over raw classifier outputs, labelled in `Expression::ALL` order.
    pub fn from_logits(logits: &[f32]) -> Result<Self, ScoresError> {
        if logits.len() != Expression::ALL.len() {
            return Err(ScoresError::LabelCount {
                expected: Expression::ALL.len(),
                actual: logits.len(),
            });
        }
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
        let total: f32 = exps.iter().sum();
        let entries = Expression::ALL
            .into_iter()
            .zip(exps)
            .map(|(e, v)| (e, (v / total).clamp(0.0, 1.0)))
            .collect();
        Self::new(entries)
    }

    pub fn entries(&self) -> &[(Expression, f32)] {
        &self.entries
    }

    /// Entries sorted by probability, highest first. Ties keep insertion order.
    pub fn ranked(&self) -> Vec<(Expression, f32)> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    pub fn dominant(&self) -> (Expression, f32) {
        // Non-empty by construction.
        self.ranked()[0]
    }
}
