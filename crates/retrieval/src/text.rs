//! Small text helpers shared by previews, prompts and the fallback answer.

use unicode_segmentation::UnicodeSegmentation;

/// Keep at most `max` grapheme clusters, appending `...` when anything was cut.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    let mut graphemes = text.grapheme_indices(true);
    match graphemes.nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// The first `max` chars of `text`. Combining marks count on their own.
pub fn leading(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// `M:SS` for a non-negative offset in seconds.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
