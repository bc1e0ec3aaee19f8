use super::support::*;
use crate::citation::CitationExtractor;
use crate::context::NO_CONTEXT_ANSWER;
use crate::store::{MemoryStore, StoreSet};
use crate::types::{ImageQuery, Modality, QuerySpec};
use mosaic_core::config::CitationConfig;
use mosaic_core::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const X: [f32; DIMS] = [1.0, 0.0, 0.0];
const Y: [f32; DIMS] = [0.0, 1.0, 0.0];
const Z: [f32; DIMS] = [0.0, 0.0, 1.0];

async fn documents() -> MemoryStore {
    filled_store(
        Modality::Document,
        &[
            ("d1", "doc-a", X, "Revenue grew twelve percent."),
            ("d2", "doc-a", [0.8, 0.6, 0.0], "Costs were flat year over year."),
            ("d3", "doc-b", [0.6, 0.8, 0.0], "Headcount rose in the second half."),
        ],
    )
    .await
}

async fn corpus() -> StoreSet {
    StoreSet::new()
        .with(Arc::new(documents().await))
        .with(Arc::new(MemoryStore::new(Modality::Image)))
        .with(Arc::new(MemoryStore::new(Modality::Audio)))
        .with(Arc::new(MemoryStore::new(Modality::Text)))
}

fn ids(items: &[crate::types::RetrievedItem]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

#[tokio::test]
async fn test_failed_modality_is_isolated() {
    let stores = StoreSet::new()
        .with(Arc::new(documents().await))
        .with(Arc::new(FailingStore {
            modality: Modality::Audio,
        }));
    let retriever = retriever(stores, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y));

    let items = retriever
        .search(&QuerySpec::new("revenue"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ids(&items), vec!["d1", "d2", "d3"]);
    assert!(items.iter().all(|item| item.modality == Modality::Document));
}

#[tokio::test]
async fn test_slow_modality_is_dropped_after_timeout() {
    let audio = filled_store(Modality::Audio, &[("a1", "call", X, "We shipped on time.")]).await;
    let stores = StoreSet::new()
        .with(Arc::new(documents().await))
        .with(Arc::new(SlowStore {
            inner: audio,
            delay: Duration::from_secs(10),
        }));
    let retriever = retriever(stores, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y));

    let started = Instant::now();
    let items = retriever
        .search(&QuerySpec::new("revenue"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.modality != Modality::Audio));
}

#[tokio::test]
async fn test_failed_embedder_skips_only_its_space() {
    let images = filled_store(Modality::Image, &[("i1", "deck", Y, "Image: chart.png")]).await;
    let stores = StoreSet::new()
        .with(Arc::new(documents().await))
        .with(Arc::new(images));
    let retriever = retriever(stores, ScriptedEmbedder::new(X), ScriptedEmbedder::failing());

    let items = retriever
        .search(&QuerySpec::new("revenue"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.modality == Modality::Document));
}

#[tokio::test]
async fn test_cancelled_search_returns_cancelled() {
    let retriever = retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = retriever.search(&QuerySpec::new("revenue"), &cancel).await;
    assert!(matches!(result, Err(AppError::Cancelled)));
}

#[tokio::test]
async fn test_image_search_uses_cross_modal_space() {
    let images = filled_store(
        Modality::Image,
        &[
            ("img-a", "deck", Y, "Image: chart.png"),
            ("img-b", "deck", X, "Image: logo.png"),
        ],
    )
    .await;
    let stores = StoreSet::new().with(Arc::new(images));
    // the text space would pick img-b; the cross-modal space picks img-a
    let retriever = retriever(stores, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y));

    let spec = QuerySpec::new("the quarterly chart")
        .only(Modality::Image)
        .with_max_results(1);
    let items = retriever.search(&spec, &CancellationToken::new()).await.unwrap();

    assert_eq!(ids(&items), vec!["img-a"]);
    assert_eq!(items[0].source_reference, "Image: Unknown");
}

#[tokio::test]
async fn test_search_audio_ignores_other_modalities() {
    let audio = filled_store(
        Modality::Audio,
        &[
            ("a1", "call", [0.8, 0.6, 0.0], "We shipped on time."),
            ("a2", "call", Z, "Lunch was late."),
        ],
    )
    .await;
    let stores = corpus().await.with(Arc::new(audio));
    let retriever = retriever(stores, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y));

    let items = retriever
        .search_audio("shipping", 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ids(&items), vec!["a1", "a2"]);
    assert!(items.iter().all(|item| item.modality == Modality::Audio));
}

#[tokio::test]
async fn test_search_by_image_merges_ocr_text() {
    let images = filled_store(Modality::Image, &[("img-a", "deck", Y, "Image: chart.png")]).await;
    let stores = corpus().await.with(Arc::new(images));
    let retriever = retriever(stores, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Z));

    let query = ImageQuery {
        embedding: Y.to_vec(),
        extracted_text: Some("revenue".to_string()),
    };
    let items = retriever
        .search_by_image(&query, 4, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items[0].id, "img-a");
    assert!(items.iter().any(|item| item.modality == Modality::Document));
    assert!(items.len() <= 4);
}

#[tokio::test]
async fn test_cross_references_exclude_source_document() {
    let retriever = retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y));

    let related = retriever
        .cross_references("doc-a", "Revenue grew", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ids(&related), vec!["d3"]);
}

#[tokio::test]
async fn test_explicit_markers_resolve_against_rank() {
    let generator = Arc::new(ScriptedGenerator::answering(
        "Revenue grew [1] while headcount rose [3].",
    ));
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        generator.clone(),
        ScriptedEmbedder::new(X),
    );

    let response = engine
        .answer(&QuerySpec::new("revenue"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!response.used_fallback);
    let cited: Vec<_> = response
        .cited
        .iter()
        .map(|c| (c.number, c.rank, c.item_id.as_str()))
        .collect();
    assert_eq!(cited, vec![(1, 1, "d1"), (3, 3, "d3")]);
    assert_eq!(response.retrieved_contexts.len(), 3);
    assert!(response.confidence > 0.0 && response.confidence <= 1.0);

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("[1] DOCUMENT - Document chunk 0\nRevenue grew twelve percent."));
}

#[tokio::test]
async fn test_implicit_attribution_by_similarity() {
    let items = vec![
        item("i1", "alpha", 0.9),
        item("i2", "bravo", 0.8),
        item("i3", "charlie", 0.7),
        item("i4", "delta", 0.6),
        item("i5", "echo", 0.5),
    ];
    let embedder = ScriptedEmbedder::new(Z)
        .with("An answer without markers.", X)
        .with("bravo", X)
        .with("delta", [0.8, 0.6, 0.0]);
    let extractor = CitationExtractor::new(
        Arc::new(embedder),
        CitationConfig::default(),
        Duration::from_secs(1),
    );

    let citations = extractor.extract("An answer without markers.", &items).await;

    let cited: Vec<_> = citations
        .iter()
        .map(|c| (c.number, c.rank, c.item_id.as_str()))
        .collect();
    assert_eq!(cited, vec![(1, 2, "i2"), (2, 4, "i4")]);
}

#[tokio::test]
async fn test_generator_failure_falls_back_to_template() {
    let generator = Arc::new(ScriptedGenerator::failing());
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        generator,
        ScriptedEmbedder::new(X),
    );

    let response = engine
        .answer(&QuerySpec::new("revenue"), Some("s"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(response.used_fallback);
    assert!(response
        .answer
        .starts_with("Based on the available information, here's what I found regarding 'revenue':"));
    let numbers: Vec<_> = response.cited.iter().map(|c| c.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert!(engine.sessions().history("s").is_empty());
}

#[tokio::test]
async fn test_slow_generator_falls_back() {
    let generator = Arc::new(ScriptedGenerator::answering("late").delayed(Duration::from_secs(5)));
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        generator,
        ScriptedEmbedder::new(X),
    );

    let response = engine
        .answer(&QuerySpec::new("revenue"), None, &CancellationToken::new())
        .await
        .unwrap();
    assert!(response.used_fallback);
}

#[tokio::test]
async fn test_no_context_answer() {
    let engine = engine(
        retriever(StoreSet::in_memory(), ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        Arc::new(ScriptedGenerator::failing()),
        ScriptedEmbedder::new(X),
    );

    let response = engine
        .answer(&QuerySpec::new("anything"), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.answer, NO_CONTEXT_ANSWER);
    assert!(response.citations.is_empty());
    assert!(response.retrieved_contexts.is_empty());
}

#[tokio::test]
async fn test_cancel_during_generation() {
    let generator = Arc::new(ScriptedGenerator::answering("never").delayed(Duration::from_secs(5)));
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        generator,
        ScriptedEmbedder::new(X),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = engine
        .answer(&QuerySpec::new("revenue"), Some("s"), &cancel)
        .await;
    assert!(matches!(result, Err(AppError::Cancelled)));
    assert!(engine.sessions().history("s").is_empty());
}

#[tokio::test]
async fn test_context_depth_ignores_request_max_results() {
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        Arc::new(ScriptedGenerator::answering("Revenue grew [1].")),
        ScriptedEmbedder::new(X),
    );

    let response = engine
        .answer(
            &QuerySpec::new("revenue").with_max_results(1),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(ids(&response.retrieved_contexts), vec!["d1", "d2", "d3"]);
}

#[tokio::test]
async fn test_cancel_during_extraction_leaves_session_untouched() {
    let generator = Arc::new(ScriptedGenerator::answering("Revenue grew strongly."));
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        generator.clone(),
        ScriptedEmbedder::new(X).delayed(Duration::from_millis(500)),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = engine
        .answer(&QuerySpec::new("revenue"), Some("s"), &cancel)
        .await;
    assert!(matches!(result, Err(AppError::Cancelled)));
    assert_eq!(generator.prompts().len(), 1);
    assert!(engine.sessions().history("s").is_empty());
}

#[tokio::test]
async fn test_session_turns_feed_the_next_prompt() {
    let generator = Arc::new(ScriptedGenerator::answering("Revenue grew [1]."));
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        generator.clone(),
        ScriptedEmbedder::new(X),
    );
    let cancel = CancellationToken::new();

    engine
        .answer(&QuerySpec::new("first question"), Some("s"), &cancel)
        .await
        .unwrap();
    engine
        .answer(&QuerySpec::new("follow up"), Some("s"), &cancel)
        .await
        .unwrap();

    assert_eq!(engine.sessions().history("s").len(), 2);
    let prompts = generator.prompts();
    assert!(!prompts[0].contains("CONVERSATION HISTORY:"));
    assert!(prompts[1].contains("CONVERSATION HISTORY:\nQ: first question\nA: Revenue grew [1]."));
}

#[tokio::test]
async fn test_response_serializes_camel_case() {
    let engine = engine(
        retriever(corpus().await, ScriptedEmbedder::new(X), ScriptedEmbedder::new(Y)),
        Arc::new(ScriptedGenerator::answering("Revenue grew [1].")),
        ScriptedEmbedder::new(X),
    );

    let response = engine
        .answer(&QuerySpec::new("revenue"), None, &CancellationToken::new())
        .await
        .unwrap();
    let json = serde_json::to_value(&response).unwrap();

    assert!(json.get("retrievedContexts").is_some());
    assert!(json.get("processingTimeMs").is_some());
    assert!(json.get("cited").is_none());
    assert_eq!(json["citations"][0]["number"], 1);
}
