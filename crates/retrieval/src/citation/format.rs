//! Citation output formats: the response-shape view and Markdown.

use super::Citation;
use crate::text::{format_clock, truncate_with_ellipsis};
use crate::types::Modality;
use serde::{Deserialize, Serialize};

const JSON_PREVIEW_CHARS: usize = 200;
const MARKDOWN_PREVIEW_CHARS: usize = 150;

/// One citation as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationView {
    pub number: u32,
    pub source: String,
    pub modality: Modality,
    pub relevance_score: f32,
    pub content_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl From<&Citation> for CitationView {
    fn from(citation: &Citation) -> Self {
        Self {
            number: citation.number,
            source: citation.source_reference.clone(),
            modality: citation.modality,
            relevance_score: citation.relevance_score,
            content_preview: truncate_with_ellipsis(&citation.content, JSON_PREVIEW_CHARS),
            page: citation.page_number,
            timestamp: citation.timestamp(),
        }
    }
}

pub fn format_for_json(citations: &[Citation]) -> Vec<CitationView> {
    citations.iter().map(CitationView::from).collect()
}

/// A `## Sources` section, or an empty string when there is nothing to cite.
pub fn format_for_markdown(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let mut parts = vec!["## Sources\n".to_string()];
    for citation in citations {
        let mut line = format!("[{}] **{}**", citation.number, citation.source_reference);
        if let Some(page) = citation.page_number {
            line.push_str(&format!(" (Page {})", page));
        }
        if let Some(timestamp) = citation.timestamp() {
            line.push_str(&format!(" (Time: {})", format_clock(timestamp)));
        }
        line.push_str(&format!(" - Relevance: {:.2}", citation.relevance_score));
        parts.push(line);
        parts.push(format!(
            "   > {}\n",
            truncate_with_ellipsis(&citation.content, MARKDOWN_PREVIEW_CHARS)
        ));
    }
    parts.join("\n")
}
