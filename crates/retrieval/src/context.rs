//! Generator context blocks and the deterministic fallback answer.
//!
//! Block numbers are 1-based rank positions; explicit citation markers in
//! the answer are resolved against the same numbering.

use crate::text::truncate_with_ellipsis;
use crate::types::RetrievedItem;

const FALLBACK_SOURCES: usize = 3;
const FALLBACK_SNIPPET_CHARS: usize = 200;

pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge base to answer your question.";

const FALLBACK_NOTE: &str = "Please note that this is a simplified response. For more detailed analysis, please try your query again.";

/// `[i] MODALITY - source` header plus content, one block per item.
pub fn build_context(items: &[RetrievedItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            format!(
                "[{}] {} - {}\n{}\n",
                index + 1,
                item.modality.as_str().to_uppercase(),
                item.source_reference,
                item.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Template answer built from the top ranked items, used when the
/// generator is unavailable.
pub fn fallback_answer(query: &str, items: &[RetrievedItem]) -> String {
    if items.is_empty() {
        return NO_CONTEXT_ANSWER.to_string();
    }

    let mut parts = vec![
        format!(
            "Based on the available information, here's what I found regarding '{}':",
            query
        ),
        String::new(),
    ];

    for (index, item) in items.iter().take(FALLBACK_SOURCES).enumerate() {
        parts.push(format!(
            "[{}] From {}: {}",
            index + 1,
            item.source_reference,
            truncate_with_ellipsis(&item.content, FALLBACK_SNIPPET_CHARS)
        ));
    }

    parts.push(String::new());
    parts.push(FALLBACK_NOTE.to_string());
    parts.join("\n")
}
