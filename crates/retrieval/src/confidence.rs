//! Response confidence from retrieval quality, answer length and citation
//! density.

use crate::citation::scanner::distinct_markers;
use crate::text::word_count;
use crate::types::RetrievedItem;
use serde::{Deserialize, Serialize};

/// Returned when any factor cannot be computed.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Measurements the score is computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    /// Retrieved item count.
    pub sources: usize,
    pub average_relevance: f32,
    pub answer_words: usize,
    /// Distinct `[n]` markers in the answer.
    pub distinct_markers: usize,
}

impl ConfidenceInputs {
    pub fn measure(items: &[RetrievedItem], answer: &str) -> Self {
        let average_relevance = if items.is_empty() {
            0.0
        } else {
            items.iter().map(|item| item.relevance_score).sum::<f32>() / items.len() as f32
        };

        Self {
            sources: items.len(),
            average_relevance,
            answer_words: word_count(answer),
            distinct_markers: distinct_markers(answer).len(),
        }
    }
}

/// The four factors, each in `[0, 1]` for well-formed inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceFactors {
    pub source: f32,
    pub relevance: f32,
    pub length: f32,
    pub citation: f32,
}

impl ConfidenceFactors {
    pub fn from_inputs(inputs: &ConfidenceInputs) -> Self {
        let length = if (20..=200).contains(&inputs.answer_words) {
            1.0
        } else {
            0.7
        };

        Self {
            source: (inputs.sources as f32 / 3.0).min(1.0),
            relevance: if inputs.sources == 0 {
                0.0
            } else {
                inputs.average_relevance
            },
            length,
            citation: (inputs.distinct_markers as f32 / inputs.sources.max(1) as f32).min(1.0),
        }
    }
}

/// Factor weights; defaults `(0.3, 0.4, 0.1, 0.2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub source: f32,
    pub relevance: f32,
    pub length: f32,
    pub citation: f32,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            source: 0.3,
            relevance: 0.4,
            length: 0.1,
            citation: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    /// Weighted sum rounded to two decimals, or [`DEFAULT_CONFIDENCE`] when
    /// the arithmetic does not produce a finite number.
    pub fn score(&self, inputs: &ConfidenceInputs) -> f32 {
        let factors = ConfidenceFactors::from_inputs(inputs);
        let weighted = self.weights.source * factors.source
            + self.weights.relevance * factors.relevance
            + self.weights.length * factors.length
            + self.weights.citation * factors.citation;

        if !weighted.is_finite() {
            tracing::debug!(?inputs, "Confidence not finite; using default");
            return DEFAULT_CONFIDENCE;
        }
        (weighted * 100.0).round() / 100.0
    }

    pub fn score_response(&self, items: &[RetrievedItem], answer: &str) -> f32 {
        self.score(&ConfidenceInputs::measure(items, answer))
    }
}
