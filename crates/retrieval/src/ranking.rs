//! Merging heterogeneous result sets: fingerprint dedup, one-shot boosting
//! and a stable descending sort.

use crate::text::leading;
use crate::types::RetrievedItem;
use mosaic_core::config::RankingConfig;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Deduplicates, boosts and orders merged candidates.
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    config: RankingConfig,
}

impl Ranker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Hex SHA-256 of the item's leading content.
    pub fn fingerprint(&self, item: &RetrievedItem) -> String {
        let head = leading(&item.content, self.config.fingerprint_chars);
        let digest = Sha256::digest(head.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Keep the first item seen per fingerprint, preserving input order.
    pub fn dedup(&self, items: Vec<RetrievedItem>) -> Vec<RetrievedItem> {
        let mut seen = HashSet::new();
        items
            .into_iter()
            .filter(|item| seen.insert(self.fingerprint(item)))
            .collect()
    }

    /// Length boost, then metadata boost, then clamp to 1.0.
    pub fn boosted_score(&self, item: &RetrievedItem) -> f32 {
        let base = if item.relevance_score.is_finite() {
            item.relevance_score.max(0.0)
        } else {
            0.0
        };

        let chars = item.content.chars().count() as f32;
        let length_boost = self
            .config
            .length_boost_cap
            .min(1.0 + chars / self.config.length_boost_divisor);

        let mut metadata_boost = 1.0;
        if item.page_number.is_some() {
            metadata_boost += self.config.page_boost;
        }
        if item.timestamp_range.is_some() {
            metadata_boost += self.config.timestamp_boost;
        }

        let score = base * length_boost * metadata_boost;
        if score.is_finite() {
            score.min(1.0)
        } else {
            0.0
        }
    }

    /// Dedup, boost every survivor exactly once, sort descending (ties keep
    /// input order) and keep `max_results`.
    pub fn rank(&self, candidates: Vec<RetrievedItem>, max_results: usize) -> Vec<RetrievedItem> {
        let before = candidates.len();
        let mut items = self.dedup(candidates);
        for item in &mut items {
            item.relevance_score = self.boosted_score(item);
        }

        items.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        items.truncate(max_results);

        tracing::debug!(
            candidates = before,
            kept = items.len(),
            "Ranked merged results"
        );
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, Modality, TimeRange};

    fn item(id: &str, content: &str, score: f32) -> RetrievedItem {
        RetrievedItem {
            id: id.to_string(),
            source_document_id: "doc".to_string(),
            content: content.to_string(),
            modality: Modality::Document,
            relevance_score: score,
            source_reference: "Document chunk 0".to_string(),
            page_number: None,
            timestamp_range: None,
            raw_metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let ranker = Ranker::default();
        let shared = "x".repeat(100);
        let items = vec![
            item("doc-hit", &format!("{}tail one", shared), 0.4),
            item("audio-hit", &format!("{}tail two", shared), 0.9),
            item("other", "something else", 0.5),
        ];

        let deduped = ranker.dedup(items);
        let ids: Vec<_> = deduped.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-hit", "other"]);
    }

    #[test]
    fn test_dedup_counts_combining_marks_as_chars() {
        let ranker = Ranker::default();
        let accented = "e\u{0301}".repeat(50);
        let items = vec![
            item("first", &format!("{}AAAA", accented), 0.4),
            item("second", &format!("{}BBBB", accented), 0.6),
        ];

        let deduped = ranker.dedup(items);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].id, "first");
    }

    #[test]
    fn test_length_boost_capped() {
        let ranker = Ranker::default();
        let short = item("a", "tiny", 0.5);
        let long = item("b", &"word ".repeat(4000), 0.5);

        assert!((ranker.boosted_score(&short) - 0.5 * (1.0 + 4.0 / 10000.0)).abs() < 1e-6);
        assert!((ranker.boosted_score(&long) - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_metadata_boost_and_clamp() {
        let ranker = Ranker::default();
        let mut paged = item("a", "", 0.5);
        paged.page_number = Some(2);
        paged.timestamp_range = Some(TimeRange {
            start: 1.0,
            end: 2.0,
        });
        assert!((ranker.boosted_score(&paged) - 0.55).abs() < 1e-6);

        let mut high = item("b", &"z".repeat(5000), 0.99);
        high.page_number = Some(1);
        assert_eq!(ranker.boosted_score(&high), 1.0);
    }

    #[test]
    fn test_non_finite_score_is_zero() {
        let ranker = Ranker::default();
        assert_eq!(ranker.boosted_score(&item("a", "x", f32::NAN)), 0.0);
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let ranker = Ranker::default();
        let ranked = ranker.rank(
            vec![
                item("first", "aaaa", 0.5),
                item("best", "bbbb", 0.9),
                item("second", "cccc", 0.5),
            ],
            10,
        );
        let ids: Vec<_> = ranked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["best", "first", "second"]);
    }

    #[test]
    fn test_rank_truncates() {
        let ranker = Ranker::default();
        let items = (0..8)
            .map(|i| item(&format!("i{}", i), &format!("content {}", i), 0.1 * i as f32))
            .collect();
        let ranked = ranker.rank(items, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].id, "i7");
    }
}
