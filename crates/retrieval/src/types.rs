//! Core retrieval types: modalities, flat metadata, retrieved items and
//! query specifications.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Upper bound accepted for `QuerySpec::max_results`.
pub const MAX_RESULTS_LIMIT: usize = 50;

/// Default number of results for a query.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Content kind. Each modality has its own vector space and store.
///
/// Declaration order is the fan-out order: when two modalities return
/// items with the same fingerprint, the earlier one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Document,
    Audio,
    Image,
    Text,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Document,
        Modality::Audio,
        Modality::Image,
        Modality::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Document => "document",
            Modality::Audio => "audio",
            Modality::Image => "image",
            Modality::Text => "text",
        }
    }

    /// Backing collection (table) name.
    pub fn collection_name(&self) -> &'static str {
        match self {
            Modality::Document => "document_embeddings",
            Modality::Audio => "audio_embeddings",
            Modality::Image => "image_embeddings",
            Modality::Text => "text_embeddings",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "document" | "documents" | "doc" => Some(Modality::Document),
            "audio" => Some(Modality::Audio),
            "image" | "images" => Some(Modality::Image),
            "text" | "note" | "notes" => Some(Modality::Text),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metadata value a vector store can hold without nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            MetadataValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Integer(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Flat string/number/bool metadata map.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Start and end of an audio segment, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// One search hit, normalised across modalities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedItem {
    pub id: String,
    pub source_document_id: String,
    pub content: String,
    pub modality: Modality,
    /// In `[0, 1]`; boosted once by the ranker.
    pub relevance_score: f32,
    pub source_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_range: Option<TimeRange>,
    #[serde(default)]
    pub raw_metadata: Metadata,
}

impl RetrievedItem {
    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp_range.map(|range| range.start)
    }
}

/// What to search and how many results to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub text: String,
    /// Empty means "every enabled modality".
    pub modality_filters: BTreeSet<Modality>,
    pub include_documents: bool,
    pub include_images: bool,
    pub include_audio: bool,
    max_results: usize,
}

impl QuerySpec {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            modality_filters: BTreeSet::new(),
            include_documents: true,
            include_images: true,
            include_audio: true,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Clamped to `1..=MAX_RESULTS_LIMIT`.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = Modality>) -> Self {
        self.modality_filters = filters.into_iter().collect();
        self
    }

    pub fn only(self, modality: Modality) -> Self {
        self.with_filters([modality])
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Whether `modality` takes part in the fan-out.
    ///
    /// Free-form text notes follow the documents flag.
    pub fn searches(&self, modality: Modality) -> bool {
        let enabled = match modality {
            Modality::Document | Modality::Text => self.include_documents,
            Modality::Image => self.include_images,
            Modality::Audio => self.include_audio,
        };
        enabled && (self.modality_filters.is_empty() || self.modality_filters.contains(&modality))
    }
}

/// A query by example image. The vector comes from the external image
/// encoder; `extracted_text` from OCR over the same image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuery {
    pub embedding: Vec<f32>,
    pub extracted_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_results_clamped() {
        assert_eq!(QuerySpec::new("q").with_max_results(0).max_results(), 1);
        assert_eq!(QuerySpec::new("q").with_max_results(500).max_results(), 50);
        assert_eq!(QuerySpec::new("q").max_results(), 10);
    }

    #[test]
    fn test_searches_respects_flag_before_filter() {
        let mut spec = QuerySpec::new("q").only(Modality::Audio);
        assert!(spec.searches(Modality::Audio));
        assert!(!spec.searches(Modality::Document));

        spec.include_audio = false;
        assert!(!spec.searches(Modality::Audio));
    }

    #[test]
    fn test_empty_filters_search_enabled_modalities() {
        let mut spec = QuerySpec::new("q");
        spec.include_images = false;
        let searched: Vec<_> = Modality::ALL
            .into_iter()
            .filter(|m| spec.searches(*m))
            .collect();
        assert_eq!(
            searched,
            vec![Modality::Document, Modality::Audio, Modality::Text]
        );
    }

    #[test]
    fn test_modality_parse() {
        assert_eq!(Modality::parse("Images"), Some(Modality::Image));
        assert_eq!(Modality::parse("notes"), Some(Modality::Text));
        assert_eq!(Modality::parse("video"), None);
    }

    #[test]
    fn test_metadata_value_untagged() {
        let parsed: Metadata =
            serde_json::from_str(r#"{"page_number": 3, "confidence": 0.9, "has_text": true, "speaker": "Ana"}"#)
                .unwrap();
        assert_eq!(parsed["page_number"], MetadataValue::Integer(3));
        assert_eq!(parsed["confidence"].as_f64(), Some(0.9));
        assert_eq!(parsed["has_text"].as_bool(), Some(true));
        assert_eq!(parsed["speaker"].as_str(), Some("Ana"));
    }
}
