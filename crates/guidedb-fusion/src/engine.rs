//! The fusion engine: orchestrates both retrieval paths and combines
//! their outputs into one ranked answer.
//!
//! Per-request state machine: Start -> DualRetrieve (parallel) -> Fuse
//! -> Boost -> Truncate -> Respond. No retries inside a request; a
//! failing sub-retrieval degrades to single-source fusion and both
//! sources failing yields an empty, clearly-flagged response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{info, warn};

use guidedb_core::config::RetrievalConfig;
use guidedb_core::error::RetrievalError;
use guidedb_core::traits::VectorRetriever;
use guidedb_core::types::{
    FusedResponse, FusionMethod, Intent, IntentWeights, QueryContext, ResponseMetadata,
    ScoredResult,
};
use guidedb_lexical::LexicalIndex;
use guidedb_query::{QueryNormalizer, WeightTable};

use crate::adapter::VectorRetrieverAdapter;
use crate::cache::{CacheKey, RetrievalCache};
use crate::fuse;

/// One engine instance per process/service: configuration and
/// collaborators are injected at construction, nothing is global.
pub struct FusionEngine {
    index: Arc<LexicalIndex>,
    vector: Option<VectorRetrieverAdapter>,
    normalizer: QueryNormalizer,
    weights: WeightTable,
    method: FusionMethod,
    rrf_k: f64,
    boosts: HashMap<String, f64>,
    overfetch: usize,
    source_timeout: Duration,
    cache: RetrievalCache,
    counters: Mutex<Counters>,
}

#[derive(Debug, Default, Clone)]
struct Counters {
    total_queries: u64,
    cache_hits: u64,
    last_lexical_candidates: usize,
    last_vector_candidates: usize,
}

/// Observability snapshot: current fusion method, the weighting table
/// in force, and per-call source result counts.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub fusion_method: FusionMethod,
    pub weight_table: HashMap<Intent, IntentWeights>,
    pub default_weights: IntentWeights,
    pub total_queries: u64,
    pub cache_hits: u64,
    pub last_lexical_candidates: usize,
    pub last_vector_candidates: usize,
    pub cached_responses: usize,
}

impl FusionEngine {
    pub fn new(
        config: &RetrievalConfig,
        index: Arc<LexicalIndex>,
        vector: Option<Arc<dyn VectorRetriever>>,
    ) -> anyhow::Result<Self> {
        let method: FusionMethod = config
            .fusion_method
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let normalizer = QueryNormalizer::from_tokenizer(index.tokenizer().clone());
        Ok(FusionEngine {
            index,
            vector: vector.map(VectorRetrieverAdapter::new),
            normalizer,
            weights: WeightTable::new(config.intent_weights.clone(), config.default_weights),
            method,
            rrf_k: config.rrf_k,
            boosts: config.entity_boosts.clone(),
            overfetch: config.overfetch.max(1),
            source_timeout: Duration::from_millis(config.source_timeout_ms),
            cache: RetrievalCache::new(
                config.cache_capacity,
                config.cache_ttl_secs.map(Duration::from_secs),
            ),
            counters: Mutex::new(Counters::default()),
        })
    }

    /// Retrieve and fuse. Both sub-retrievals run concurrently, each
    /// bounded to `overfetch * top_k` candidates and its own timeout.
    pub async fn retrieve(
        &self,
        ctx: &QueryContext,
        top_k: usize,
    ) -> Result<FusedResponse, RetrievalError> {
        let normalized = self.normalizer.normalize(&ctx.rewritten_query);
        let weights = self.weights.for_intent(ctx.intent);
        let key = CacheKey {
            canonical_query: normalized.canonical_query.clone(),
            top_k,
            params: self.params_fingerprint(weights),
        };

        if let Some(mut cached) = self.cache.get(&key) {
            cached.metadata.from_cache = true;
            let mut counters = self.lock_counters();
            counters.total_queries += 1;
            counters.cache_hits += 1;
            info!(query = %ctx.original_query, "serving retrieval response from cache");
            return Ok(cached);
        }

        let candidates = self.overfetch * top_k.max(1);

        let lexical_task = {
            let index = Arc::clone(&self.index);
            let query = ctx.bm25_query.clone();
            timeout(self.source_timeout, spawn_blocking(move || index.search(&query, candidates)))
        };
        let vector_task = self.vector.clone().map(|adapter| {
            let query = ctx.rewritten_query.clone();
            timeout(
                self.source_timeout,
                spawn_blocking(move || adapter.search_checked(&query, candidates)),
            )
        });

        let (lexical_out, vector_out) = match vector_task {
            Some(task) => {
                let (l, v) = tokio::join!(lexical_task, task);
                (l, Some(v))
            }
            None => (lexical_task.await, None),
        };

        let mut degraded = Vec::new();

        let lexical_hits: Vec<ScoredResult> = match lexical_out {
            Ok(Ok(Ok(hits))) => hits,
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "lexical source unavailable, degrading");
                degraded.push(format!("lexical: {e}"));
                Vec::new()
            }
            Ok(Err(join_err)) => {
                warn!(error = %join_err, "lexical task failed, degrading");
                degraded.push(format!("lexical: task failed: {join_err}"));
                Vec::new()
            }
            Err(_) => {
                warn!(timeout_ms = self.source_timeout.as_millis() as u64, "lexical search timed out");
                degraded.push(format!(
                    "lexical: timed out after {}ms",
                    self.source_timeout.as_millis()
                ));
                Vec::new()
            }
        };

        let vector_hits: Vec<ScoredResult> = match vector_out {
            None => {
                degraded.push("vector: retriever not configured".to_string());
                Vec::new()
            }
            Some(Ok(Ok(outcome))) => {
                if let Some(reason) = outcome.failure {
                    degraded.push(format!("vector: {reason}"));
                }
                outcome.results
            }
            Some(Ok(Err(join_err))) => {
                warn!(error = %join_err, "vector task failed, degrading");
                degraded.push(format!("vector: task failed: {join_err}"));
                Vec::new()
            }
            Some(Err(_)) => {
                warn!(timeout_ms = self.source_timeout.as_millis() as u64, "vector search timed out");
                degraded.push(format!(
                    "vector: timed out after {}ms",
                    self.source_timeout.as_millis()
                ));
                Vec::new()
            }
        };

        if lexical_hits.is_empty() && vector_hits.is_empty() && degraded.len() == 2 {
            warn!(query = %ctx.original_query, "both retrieval sources unavailable");
        }

        let entities: Vec<String> = if ctx.detected_entities.is_empty() {
            normalized.detected_entities.clone()
        } else {
            ctx.detected_entities.iter().map(|e| e.to_lowercase()).collect()
        };

        let mut fused =
            fuse::fuse(self.method, &lexical_hits, &vector_hits, weights, self.rrf_k);
        fuse::apply_entity_boost(&mut fused, &entities, &self.boosts);
        let results = fuse::finalize(fused, top_k);

        let response = FusedResponse {
            results,
            query: ctx.clone(),
            metadata: ResponseMetadata {
                fusion_method: self.method,
                weights,
                lexical_candidates: lexical_hits.len(),
                vector_candidates: vector_hits.len(),
                degraded,
                from_cache: false,
            },
        };

        {
            let mut counters = self.lock_counters();
            counters.total_queries += 1;
            counters.last_lexical_candidates = lexical_hits.len();
            counters.last_vector_candidates = vector_hits.len();
        }
        info!(
            query = %ctx.original_query,
            intent = ?ctx.intent,
            lexical = lexical_hits.len(),
            vector = vector_hits.len(),
            results = response.results.len(),
            "retrieval complete"
        );

        self.cache.put(&key, response.clone());
        Ok(response)
    }

    /// Like [`retrieve`](Self::retrieve) but bounded by a caller
    /// deadline; an expired deadline surfaces as a typed cancellation,
    /// never a partial response.
    pub async fn retrieve_with_deadline(
        &self,
        ctx: &QueryContext,
        top_k: usize,
        deadline: Duration,
    ) -> Result<FusedResponse, RetrievalError> {
        match timeout(deadline, self.retrieve(ctx, top_k)).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Cancelled),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let counters = self.lock_counters().clone();
        EngineStats {
            fusion_method: self.method,
            weight_table: self.weights.entries().clone(),
            default_weights: self.weights.default_pair(),
            total_queries: counters.total_queries,
            cache_hits: counters.cache_hits,
            last_lexical_candidates: counters.last_lexical_candidates,
            last_vector_candidates: counters.last_vector_candidates,
            cached_responses: self.cache.len(),
        }
    }

    fn params_fingerprint(&self, weights: IntentWeights) -> String {
        format!(
            "{:?}|{}|{:.4}|{:.4}",
            self.method, self.rrf_k, weights.lexical, weights.vector
        )
    }

    fn lock_counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
