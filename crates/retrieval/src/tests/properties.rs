use super::support::{item, ScriptedEmbedder};
use crate::citation::CitationExtractor;
use crate::ranking::Ranker;
use crate::store::relevance_from_distance;
use crate::types::{RetrievedItem, TimeRange};
use mosaic_core::config::CitationConfig;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn candidates() -> impl Strategy<Value = Vec<RetrievedItem>> {
    prop::collection::vec(("[a-e]{1,3}", 0.0f32..=1.0, any::<bool>()), 0..30).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(index, (content, relevance, timed))| {
                let mut item = item(&format!("c{}", index), &content, relevance);
                if timed {
                    item.timestamp_range = Some(TimeRange {
                        start: 1.0,
                        end: 2.0,
                    });
                }
                item
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn dedup_is_idempotent(items in candidates()) {
        let ranker = Ranker::default();
        let once = ranker.dedup(items);
        let twice = ranker.dedup(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn boost_is_monotonic_and_capped(
        low in 0.0f32..=1.0,
        delta in 0.0f32..=1.0,
        content in ".{0,300}",
        paged in any::<bool>(),
    ) {
        let ranker = Ranker::default();
        let high = (low + delta).min(1.0);

        let mut a = item("a", &content, low);
        let mut b = item("b", &content, high);
        if paged {
            a.page_number = Some(1);
            b.page_number = Some(1);
        }

        let boosted_low = ranker.boosted_score(&a);
        let boosted_high = ranker.boosted_score(&b);
        prop_assert!(boosted_low <= boosted_high);
        prop_assert!((0.0..=1.0).contains(&boosted_high));
    }

    #[test]
    fn boost_never_lowers_the_base_score(
        base in 0.0f32..=1.5,
        content in ".{0,12000}",
        paged in any::<bool>(),
        timed in any::<bool>(),
    ) {
        let ranker = Ranker::default();
        let mut candidate = item("a", &content, base);
        if paged {
            candidate.page_number = Some(3);
        }
        if timed {
            candidate.timestamp_range = Some(TimeRange { start: 0.0, end: 4.0 });
        }

        let boosted = ranker.boosted_score(&candidate);
        prop_assert!(boosted >= base.min(1.0));
        prop_assert!(boosted <= 1.0);
    }

    #[test]
    fn rank_is_sorted_and_bounded(items in candidates(), max in 1usize..=50) {
        let ranked = Ranker::default().rank(items, max);
        prop_assert!(ranked.len() <= max);
        prop_assert!(ranked
            .windows(2)
            .all(|pair| pair[0].relevance_score >= pair[1].relevance_score));
    }

    #[test]
    fn relevance_stays_in_unit_range(distance in prop::num::f32::ANY) {
        let relevance = relevance_from_distance(distance);
        prop_assert!((0.0..=1.0).contains(&relevance));
    }

    #[test]
    fn citation_numbers_ascend_and_resolve(
        markers in prop::collection::vec(0u32..12, 0..8),
        ranked_len in 0usize..8,
    ) {
        let answer = markers
            .iter()
            .map(|n| format!("claim [{}]", n))
            .collect::<Vec<_>>()
            .join(" ");
        let ranked: Vec<_> = (0..ranked_len)
            .map(|i| item(&format!("r{}", i + 1), &format!("content {}", i), 0.5))
            .collect();
        let extractor = CitationExtractor::new(
            Arc::new(ScriptedEmbedder::new([1.0, 0.0, 0.0])),
            CitationConfig::default(),
            Duration::from_secs(1),
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let citations = runtime.block_on(extractor.extract(&answer, &ranked));

        prop_assert!(citations.windows(2).all(|pair| pair[0].number < pair[1].number));
        for citation in &citations {
            prop_assert!(citation.rank >= 1 && citation.rank <= ranked.len());
            prop_assert_eq!(&citation.item_id, &ranked[citation.rank - 1].id);
        }
    }
}
