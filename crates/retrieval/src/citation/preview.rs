//! Modality-aware citation previews for client display.

use super::Citation;
use crate::text::{format_clock, truncate_with_ellipsis};
use crate::types::{MetadataValue, Modality};
use serde::Serialize;

const DOCUMENT_PREVIEW_CHARS: usize = 300;
const GENERIC_PREVIEW_CHARS: usize = 200;
const IMAGE_PLACEHOLDER: &str = "Image content (OCR extracted text)";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationPreview {
    pub number: u32,
    pub modality: Modality,
    pub source: String,
    pub preview_text: String,
    #[serde(flatten)]
    pub detail: PreviewDetail,
}

/// Per-modality preview fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PreviewDetail {
    #[serde(rename_all = "camelCase")]
    Document {
        page_number: Option<u32>,
        document_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        image_path: String,
        thumbnail_path: String,
        /// `WxH`
        dimensions: String,
        has_text: bool,
        thumbnail_available: bool,
    },
    #[serde(rename_all = "camelCase")]
    Audio {
        /// `M:SS–M:SS`
        time_range: String,
        start_timestamp: f64,
        end_timestamp: f64,
        confidence: f64,
        speaker: String,
        duration: f64,
    },
    Generic,
}

pub fn preview(citation: &Citation) -> CitationPreview {
    let (preview_text, detail) = match citation.modality {
        Modality::Document => document(citation),
        Modality::Image => image(citation),
        Modality::Audio => audio(citation),
        Modality::Text => (
            truncate_with_ellipsis(&citation.content, GENERIC_PREVIEW_CHARS),
            PreviewDetail::Generic,
        ),
    };

    CitationPreview {
        number: citation.number,
        modality: citation.modality,
        source: citation.source_reference.clone(),
        preview_text,
        detail,
    }
}

fn document(citation: &Citation) -> (String, PreviewDetail) {
    (
        truncate_with_ellipsis(&citation.content, DOCUMENT_PREVIEW_CHARS),
        PreviewDetail::Document {
            page_number: citation.page_number,
            document_id: citation.source_document_id.clone(),
        },
    )
}

fn image(citation: &Citation) -> (String, PreviewDetail) {
    let meta_str = |key: &str| {
        citation
            .metadata
            .get(key)
            .and_then(MetadataValue::as_str)
            .unwrap_or("")
            .to_string()
    };
    let meta_int = |key: &str| {
        citation
            .metadata
            .get(key)
            .and_then(MetadataValue::as_i64)
            .unwrap_or(0)
    };

    let preview_text = if !citation.content.trim().is_empty() {
        citation.content.clone()
    } else {
        match citation.metadata.get("ocr_text").and_then(MetadataValue::as_str) {
            Some(ocr) if !ocr.trim().is_empty() => ocr.to_string(),
            _ => IMAGE_PLACEHOLDER.to_string(),
        }
    };

    let thumbnail_path = meta_str("thumbnail_path");
    (
        preview_text,
        PreviewDetail::Image {
            image_path: meta_str("image_path"),
            thumbnail_available: !thumbnail_path.is_empty(),
            thumbnail_path,
            dimensions: format!("{}x{}", meta_int("width"), meta_int("height")),
            has_text: citation
                .metadata
                .get("has_text")
                .and_then(MetadataValue::as_bool)
                .unwrap_or(false),
        },
    )
}

fn audio(citation: &Citation) -> (String, PreviewDetail) {
    let (start, end) = match citation.timestamp_range {
        Some(range) => (range.start, range.end),
        None => (0.0, 0.0),
    };

    (
        citation.content.clone(),
        PreviewDetail::Audio {
            time_range: format!("{}–{}", format_clock(start), format_clock(end)),
            start_timestamp: start,
            end_timestamp: end,
            confidence: citation
                .metadata
                .get("confidence")
                .and_then(MetadataValue::as_f64)
                .unwrap_or(0.0),
            speaker: citation
                .metadata
                .get("speaker")
                .and_then(MetadataValue::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            duration: end - start,
        },
    )
}
