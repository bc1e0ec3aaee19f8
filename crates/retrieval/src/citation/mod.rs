//! Citation attribution: mapping a generated answer back to the ranked
//! items that justify it, then validating, previewing and formatting the
//! result.

mod extractor;
mod format;
mod preview;
pub mod scanner;
mod validate;

pub use extractor::{Attribution, CitationExtractor};
pub use format::{format_for_json, format_for_markdown, CitationView};
pub use preview::{preview, CitationPreview, PreviewDetail};
pub use validate::{usage_stats, validate, CitationUsage, CitationValidation};

use crate::types::{Metadata, Modality, RetrievedItem, TimeRange};
use serde::Serialize;

/// A numbered reference from an answer to one ranked item.
///
/// Numbers are unique within a response and returned in ascending order.
/// For explicit markers `number == rank`; implicit citations are numbered
/// `1..=k` by similarity and keep the item's original `rank`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub number: u32,
    /// 1-based position of the item in the ranked list.
    pub rank: usize,
    pub item_id: String,
    pub source_document_id: String,
    pub content: String,
    pub modality: Modality,
    pub source_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_range: Option<TimeRange>,
    pub relevance_score: f32,
    #[serde(skip)]
    pub metadata: Metadata,
}

impl Citation {
    pub fn from_item(number: u32, rank: usize, item: &RetrievedItem) -> Self {
        Self {
            number,
            rank,
            item_id: item.id.clone(),
            source_document_id: item.source_document_id.clone(),
            content: item.content.clone(),
            modality: item.modality,
            source_reference: item.source_reference.clone(),
            page_number: item.page_number,
            timestamp_range: item.timestamp_range,
            relevance_score: item.relevance_score,
            metadata: item.raw_metadata.clone(),
        }
    }

    /// Start of the cited audio segment, if any.
    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp_range.map(|range| range.start)
    }
}
