//! Rank-list fusion strategies and the post-fusion entity boost.
//!
//! All strategies share one accumulation order: lexical hits are
//! registered before vector hits, and the final sort is stable, so equal
//! fused scores keep first-encounter order. That makes every fusion run
//! deterministic for a fixed pair of input lists.

use std::collections::HashMap;

use guidedb_core::types::{FusedResult, FusionMethod, IntentWeights, ScoredResult, Source};

struct Accumulator {
    entries: Vec<FusedResult>,
    by_id: HashMap<String, usize>,
}

impl Accumulator {
    fn new() -> Self {
        Accumulator { entries: Vec::new(), by_id: HashMap::new() }
    }

    fn slot(&mut self, result: &ScoredResult, method: FusionMethod) -> &mut FusedResult {
        let idx = match self.by_id.get(&result.chunk.id) {
            Some(&idx) => idx,
            None => {
                self.entries.push(FusedResult {
                    chunk: result.chunk.clone(),
                    fused_score: 0.0,
                    lexical_score: 0.0,
                    vector_score: 0.0,
                    sources: Vec::new(),
                    fusion_method: method,
                    boost: 1.0,
                    rank: 0,
                });
                let idx = self.entries.len() - 1;
                self.by_id.insert(result.chunk.id.clone(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }
}

/// Merge the two ranked lists with the configured strategy.
///
/// Results come back sorted by fused score descending, unranked and
/// untruncated; the engine applies boost, truncation and final ranks.
pub fn fuse(
    method: FusionMethod,
    lexical: &[ScoredResult],
    vector: &[ScoredResult],
    weights: IntentWeights,
    rrf_k: f64,
) -> Vec<FusedResult> {
    let mut entries = match method {
        FusionMethod::Rrf => rrf(lexical, vector, weights, rrf_k),
        FusionMethod::WeightedSum => weighted(lexical, vector, weights, false),
        FusionMethod::MaxScore => weighted(lexical, vector, weights, true),
    };
    // Stable: ties keep first-encounter order, lexical before vector.
    entries.sort_by(|a, b| {
        b.fused_score.partial_cmp(&a.fused_score).unwrap_or(std::cmp::Ordering::Equal)
    });
    entries
}

/// Reciprocal rank fusion: each hit at 1-based rank `r` contributes
/// `weight / (k + r)`; a document present in both lists accumulates both
/// contributions. Rank-based, so incomparable score scales cannot skew
/// the merge.
fn rrf(
    lexical: &[ScoredResult],
    vector: &[ScoredResult],
    weights: IntentWeights,
    k: f64,
) -> Vec<FusedResult> {
    let mut acc = Accumulator::new();
    for (i, result) in lexical.iter().enumerate() {
        let entry = acc.slot(result, FusionMethod::Rrf);
        entry.fused_score += weights.lexical / (k + (i + 1) as f64);
        entry.lexical_score = result.score;
        entry.sources.push(Source::Lexical);
    }
    for (i, result) in vector.iter().enumerate() {
        let entry = acc.slot(result, FusionMethod::Rrf);
        entry.fused_score += weights.vector / (k + (i + 1) as f64);
        entry.vector_score = result.score;
        entry.sources.push(Source::Vector);
    }
    acc.entries
}

/// Weighted-sum and max-score fusion over min-max normalized scores.
/// `take_max` selects max-score ("strong in either source is enough").
fn weighted(
    lexical: &[ScoredResult],
    vector: &[ScoredResult],
    weights: IntentWeights,
    take_max: bool,
) -> Vec<FusedResult> {
    let method = if take_max { FusionMethod::MaxScore } else { FusionMethod::WeightedSum };
    let lex_norm = min_max_normalize(&lexical.iter().map(|r| r.score).collect::<Vec<_>>());
    let vec_norm = min_max_normalize(&vector.iter().map(|r| r.score).collect::<Vec<_>>());

    let mut acc = Accumulator::new();
    for (i, result) in lexical.iter().enumerate() {
        let entry = acc.slot(result, method);
        let contribution = weights.lexical * lex_norm[i];
        if take_max {
            entry.fused_score = entry.fused_score.max(contribution);
        } else {
            entry.fused_score += contribution;
        }
        entry.lexical_score = result.score;
        entry.sources.push(Source::Lexical);
    }
    for (i, result) in vector.iter().enumerate() {
        let entry = acc.slot(result, method);
        let contribution = weights.vector * vec_norm[i];
        if take_max {
            entry.fused_score = entry.fused_score.max(contribution);
        } else {
            entry.fused_score += contribution;
        }
        entry.vector_score = result.score;
        entry.sources.push(Source::Vector);
    }
    acc.entries
}

/// Min-max normalization into [0, 1]. An all-equal list maps to all 1.0
/// so a degenerate source never divides by zero or drops out.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|&s| (s - min) / (max - min)).collect()
}

/// Multiply each result mentioning a detected entity in its topic by
/// that entity's boost factor, then re-sort. Entities absent from the
/// boost table count as 1.0.
pub fn apply_entity_boost(
    results: &mut [FusedResult],
    entities: &[String],
    boosts: &HashMap<String, f64>,
) {
    if entities.is_empty() {
        return;
    }
    for result in results.iter_mut() {
        let topic = result.chunk.topic.to_lowercase();
        let mut factor = 1.0_f64;
        for entity in entities {
            if topic.contains(entity.as_str()) {
                factor = factor.max(boosts.get(entity).copied().unwrap_or(1.0));
            }
        }
        result.fused_score *= factor;
        result.boost = factor;
    }
    results.sort_by(|a, b| {
        b.fused_score.partial_cmp(&a.fused_score).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Truncate to `top_k` and assign final 1-based ranks.
pub fn finalize(mut results: Vec<FusedResult>, top_k: usize) -> Vec<FusedResult> {
    results.truncate(top_k);
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
    results
}
