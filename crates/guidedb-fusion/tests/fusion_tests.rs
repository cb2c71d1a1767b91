//! End-to-end engine tests: adaptive weighting, entity boosting,
//! graceful degradation, caching and deadline handling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guidedb_core::config::RetrievalConfig;
use guidedb_core::error::{Result as RetrievalResult, RetrievalError};
use guidedb_core::traits::VectorRetriever;
use guidedb_core::types::{
    Chunk, Intent, Language, QueryContext, ScoredResult, Source,
};
use guidedb_fusion::FusionEngine;
use guidedb_lexical::LexicalIndex;

fn chunk(id: &str, topic: &str, summary: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        topic: topic.to_string(),
        summary: summary.to_string(),
        keywords: Vec::new(),
        structured_data: None,
        build: None,
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk(
            "a",
            "bile titan weak points",
            "forehead plate cracks under anti-tank fire, belly sacs burst to small arms",
        ),
        chunk(
            "b",
            "charger engagement guide",
            "strip leg armor then fire into the exposed flesh",
        ),
        chunk(
            "c",
            "resupply basics",
            "call resupply early and share ammunition across the squad",
        ),
    ]
}

fn built_index(config: &RetrievalConfig) -> Arc<LexicalIndex> {
    let mut index = LexicalIndex::new(&config.aliases, &config.stop_words);
    index.build(corpus());
    Arc::new(index)
}

fn weakness_ctx(query: &str) -> QueryContext {
    QueryContext {
        original_query: query.to_string(),
        rewritten_query: query.to_string(),
        bm25_query: query.to_string(),
        detected_language: Language::Latin,
        intent: Intent::Weakness,
        confidence: 0.9,
        detected_entities: Vec::new(),
    }
}

/// Returns a fixed ranking regardless of the query.
struct FixedRanking {
    order: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FixedRanking {
    fn new(order: Vec<&'static str>) -> Self {
        FixedRanking { order, calls: AtomicUsize::new(0) }
    }
}

impl VectorRetriever for FixedRanking {
    fn search(&self, _query: &str, top_k: usize) -> RetrievalResult<Vec<ScoredResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let all = corpus();
        let hits = self
            .order
            .iter()
            .take(top_k)
            .enumerate()
            .filter_map(|(i, id)| {
                all.iter().find(|c| c.id == *id).map(|c| ScoredResult {
                    chunk: c.clone(),
                    score: 0.9 - i as f64 * 0.1,
                    rank: i + 1,
                    source: Source::Vector,
                    matched_terms: Vec::new(),
                })
            })
            .collect();
        Ok(hits)
    }
}

struct Unavailable;
impl VectorRetriever for Unavailable {
    fn search(&self, _query: &str, _top_k: usize) -> RetrievalResult<Vec<ScoredResult>> {
        Err(RetrievalError::SourceUnavailable("vector backend offline".to_string()))
    }
}

struct Slow;
impl VectorRetriever for Slow {
    fn search(&self, _query: &str, _top_k: usize) -> RetrievalResult<Vec<ScoredResult>> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn weakness_query_favors_lexical_winner_despite_vector_order() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    // The vector side ranks the charger doc first; the lexically exact
    // bile titan doc must still win under the weakness weighting.
    let vector: Arc<dyn VectorRetriever> = Arc::new(FixedRanking::new(vec!["b", "a"]));
    let engine = FusionEngine::new(&config, index, Some(vector)).expect("engine");

    let response = engine
        .retrieve(&weakness_ctx("bile titan weak points"), 3)
        .await
        .expect("retrieve");

    assert!(!response.results.is_empty());
    assert_eq!(response.results[0].chunk.id, "a");
    assert_eq!(response.results[0].rank, 1);
    assert_eq!(response.metadata.weights.lexical, 0.6);
    assert_eq!(response.metadata.weights.vector, 0.4);
    assert!(response.metadata.degraded.is_empty());
}

#[tokio::test]
async fn entity_boost_is_recorded_on_matching_results() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    let engine = FusionEngine::new(&config, index, None).expect("engine");

    let response = engine
        .retrieve(&weakness_ctx("how to kill bt"), 3)
        .await
        .expect("retrieve");

    let top = &response.results[0];
    assert_eq!(top.chunk.id, "a");
    assert_eq!(top.boost, 1.8);
}

#[tokio::test]
async fn vector_failure_degrades_to_lexical_only() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    let vector: Arc<dyn VectorRetriever> = Arc::new(Unavailable);
    let engine = FusionEngine::new(&config, index, Some(vector)).expect("engine");

    let response = engine
        .retrieve(&weakness_ctx("bile titan weak points"), 3)
        .await
        .expect("degraded retrieval still succeeds");

    assert!(!response.results.is_empty());
    assert_eq!(response.results[0].chunk.id, "a");
    assert!(response.results.iter().all(|r| r.vector_score == 0.0));
    assert_eq!(response.metadata.vector_candidates, 0);
    assert!(response
        .metadata
        .degraded
        .iter()
        .any(|d| d.contains("vector backend offline")));
}

#[tokio::test]
async fn missing_vector_retriever_is_reported_not_fatal() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    let engine = FusionEngine::new(&config, index, None).expect("engine");

    let response = engine
        .retrieve(&weakness_ctx("charger leg armor"), 3)
        .await
        .expect("retrieve");

    assert!(!response.results.is_empty());
    assert!(response
        .metadata
        .degraded
        .iter()
        .any(|d| d.contains("not configured")));
}

#[tokio::test]
async fn identical_queries_hit_the_cache_once() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    let counting = Arc::new(FixedRanking::new(vec!["a", "b"]));
    let vector: Arc<dyn VectorRetriever> = counting.clone();
    let engine = FusionEngine::new(&config, index, Some(vector)).expect("engine");

    let ctx = weakness_ctx("bile titan weak points");
    let first = engine.retrieve(&ctx, 3).await.expect("first");
    let second = engine.retrieve(&ctx, 3).await.expect("second");

    assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    assert!(!first.metadata.from_cache);
    assert!(second.metadata.from_cache);
    assert_eq!(
        first.results.iter().map(|r| r.chunk.id.clone()).collect::<Vec<_>>(),
        second.results.iter().map(|r| r.chunk.id.clone()).collect::<Vec<_>>(),
    );

    let stats = engine.stats();
    assert_eq!(stats.total_queries, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cached_responses, 1);
}

#[tokio::test]
async fn alias_variants_share_one_cache_entry() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    let engine = FusionEngine::new(&config, index, None).expect("engine");

    engine.retrieve(&weakness_ctx("bt weak points"), 3).await.expect("first");
    let second = engine
        .retrieve(&weakness_ctx("bile titan weak points"), 3)
        .await
        .expect("second");

    assert!(second.metadata.from_cache);
}

#[tokio::test]
async fn different_top_k_is_a_distinct_cache_entry() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    let engine = FusionEngine::new(&config, index, None).expect("engine");

    engine.retrieve(&weakness_ctx("charger leg armor"), 3).await.expect("first");
    let other = engine.retrieve(&weakness_ctx("charger leg armor"), 1).await.expect("second");

    assert!(!other.metadata.from_cache);
    assert_eq!(other.results.len(), 1);
}

#[tokio::test]
async fn expired_deadline_cancels_with_typed_error() {
    let config = RetrievalConfig::default();
    let index = built_index(&config);
    let vector: Arc<dyn VectorRetriever> = Arc::new(Slow);
    let engine = FusionEngine::new(&config, index, Some(vector)).expect("engine");

    let err = engine
        .retrieve_with_deadline(&weakness_ctx("bile titan weak points"), 3, Duration::from_millis(20))
        .await
        .expect_err("deadline must expire");
    assert!(matches!(err, RetrievalError::Cancelled));
}

#[tokio::test]
async fn both_sources_failing_yields_empty_flagged_response() {
    let config = RetrievalConfig::default();
    // Unbuilt index: the lexical path reports not-initialized.
    let index = Arc::new(LexicalIndex::new(&config.aliases, &config.stop_words));
    let vector: Arc<dyn VectorRetriever> = Arc::new(Unavailable);
    let engine = FusionEngine::new(&config, index, Some(vector)).expect("engine");

    let response = engine
        .retrieve(&weakness_ctx("bile titan weak points"), 3)
        .await
        .expect("still a response, never an error");

    assert!(response.results.is_empty());
    assert_eq!(response.metadata.degraded.len(), 2);
    assert!(response.metadata.degraded.iter().any(|d| d.starts_with("lexical:")));
    assert!(response.metadata.degraded.iter().any(|d| d.starts_with("vector:")));
}

#[tokio::test]
async fn source_timeout_degrades_instead_of_hanging() {
    let mut config = RetrievalConfig::default();
    config.source_timeout_ms = 50;
    let index = built_index(&config);
    let vector: Arc<dyn VectorRetriever> = Arc::new(Slow);
    let engine = FusionEngine::new(&config, index, Some(vector)).expect("engine");

    let response = engine
        .retrieve(&weakness_ctx("bile titan weak points"), 3)
        .await
        .expect("lexical side still answers");

    assert!(!response.results.is_empty());
    assert!(response.metadata.degraded.iter().any(|d| d.contains("timed out")));
}
