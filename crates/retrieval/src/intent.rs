//! Keyword-based query intent, used to narrow the modality fan-out.

use crate::types::Modality;
use serde::Serialize;
use std::collections::BTreeSet;

const IMAGE_HINTS: &[&str] = &["show", "display", "image", "picture", "photo"];
const AUDIO_HINTS: &[&str] = &["audio", "recording", "transcript", "said", "mentioned"];
const DOCUMENT_HINTS: &[&str] = &["document", "text", "page", "write", "written"];
const TEMPORAL_WORDS: &[&str] = &[
    "yesterday",
    "today",
    "last week",
    "recently",
    "ago",
    "before",
    "after",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryIntent {
    pub modality_hints: BTreeSet<Modality>,
    pub temporal_references: Vec<String>,
    /// More than ten words, or phrased as a question.
    pub complex: bool,
}

/// Substring keyword matching on the lowercased query.
pub fn analyze(query: &str) -> QueryIntent {
    let lower = query.to_lowercase();
    let mentions = |hints: &[&str]| hints.iter().any(|hint| lower.contains(hint));

    let mut modality_hints = BTreeSet::new();
    if mentions(IMAGE_HINTS) {
        modality_hints.insert(Modality::Image);
    }
    if mentions(AUDIO_HINTS) {
        modality_hints.insert(Modality::Audio);
    }
    if mentions(DOCUMENT_HINTS) {
        modality_hints.insert(Modality::Document);
    }

    QueryIntent {
        modality_hints,
        temporal_references: TEMPORAL_WORDS
            .iter()
            .filter(|word| lower.contains(*word))
            .map(|word| word.to_string())
            .collect(),
        complex: query.split_whitespace().count() > 10 || query.contains('?'),
    }
}
