//! Embedding comparison and visualization scaling
//!
//! All functions are pure. `b` may be shorter or longer than `a`; the dot
//! product only walks `a`, treating missing `b` entries as zero.

use serde::Serialize;

/// Euclidean norm
pub fn magnitude(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Dot product over the indices of `a`. Entries of `b` past its end count as
/// zero; entries of `b` past the end of `a` are never read.
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .enumerate()
        .map(|(i, x)| x * b.get(i).copied().unwrap_or(0.0))
        .sum()
}

/// Cosine similarity, or `0.0` when either vector has zero magnitude
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a > 0.0 && mag_b > 0.0 {
        dot_product(a, b) / (mag_a * mag_b)
    } else {
        0.0
    }
}

/// Factor that maps the largest absolute value across both vectors to 1.
/// Returns `1.0` when every value is zero (or both are empty).
pub fn visualization_scale(a: &[f64], b: &[f64]) -> f64 {
    let max = a.iter().chain(b).fold(0.0_f64, |m, v| m.max(v.abs()));
    if max > 0.0 { 1.0 / max } else { 1.0 }
}

/// Sign of a bar; zero is drawn on the negative side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

/// One dimension, ready to hand to a renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub value: f64,
    /// `|value * scale|` clamped to `[0, 1]`
    pub intensity: f64,
    pub polarity: Polarity,
}

/// Per-dimension bars for `values` under a shared `scale`
pub fn bars(values: &[f64], scale: f64) -> Vec<Bar> {
    values
        .iter()
        .map(|&value| Bar {
            value,
            intensity: (value * scale).abs().min(1.0),
            polarity: if value > 0.0 {
                Polarity::Positive
            } else {
                Polarity::Negative
            },
        })
        .collect()
}

/// Every derived quantity for a pair of embeddings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorComparison {
    pub dimensions_a: usize,
    pub dimensions_b: usize,
    pub magnitude_a: f64,
    pub magnitude_b: f64,
    pub dot_product: f64,
    pub cosine_similarity: f64,
    pub scale: f64,
}

impl VectorComparison {
    /// Compare two embeddings
    pub fn compute(a: &[f64], b: &[f64]) -> Self {
        Self {
            dimensions_a: a.len(),
            dimensions_b: b.len(),
            magnitude_a: magnitude(a),
            magnitude_b: magnitude(b),
            dot_product: dot_product(a, b),
            cosine_similarity: cosine_similarity(a, b),
            scale: visualization_scale(a, b),
        }
    }
}
