//! Uniform wrapper over the injected vector-search capability.
//!
//! Pure interface translation: the adapter never implements vector
//! search itself, and a failing backend becomes an empty candidate list
//! plus a diagnostic rather than a propagated error, preserving the
//! engine's degrade-gracefully contract.

use std::sync::Arc;

use tracing::warn;

use guidedb_core::traits::VectorRetriever;
use guidedb_core::types::{ScoredResult, Source};

/// Result of one adapted search: candidates plus an optional failure
/// diagnostic. The diagnostic is data, not an exception, so the engine
/// can report degradation without the adapter ever throwing.
#[derive(Debug)]
pub struct SourceOutcome {
    pub results: Vec<ScoredResult>,
    pub failure: Option<String>,
}

#[derive(Clone)]
pub struct VectorRetrieverAdapter {
    inner: Arc<dyn VectorRetriever>,
}

impl VectorRetrieverAdapter {
    pub fn new(inner: Arc<dyn VectorRetriever>) -> Self {
        VectorRetrieverAdapter { inner }
    }

    /// Search, normalizing source labels and 1-based ranks on the way
    /// through. Backend failures yield an empty outcome with the cause.
    pub fn search_checked(&self, query: &str, top_k: usize) -> SourceOutcome {
        match self.inner.search(query, top_k) {
            Ok(mut results) => {
                results.truncate(top_k);
                for (i, result) in results.iter_mut().enumerate() {
                    result.source = Source::Vector;
                    result.rank = i + 1;
                }
                SourceOutcome { results, failure: None }
            }
            Err(e) => {
                warn!(%query, error = %e, "vector retriever failed, degrading to empty");
                SourceOutcome { results: Vec::new(), failure: Some(e.to_string()) }
            }
        }
    }

    /// Plain contract for callers that only want candidates.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredResult> {
        self.search_checked(query, top_k).results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidedb_core::error::RetrievalError;
    use guidedb_core::types::Chunk;

    struct Failing;
    impl VectorRetriever for Failing {
        fn search(&self, _query: &str, _top_k: usize) -> guidedb_core::error::Result<Vec<ScoredResult>> {
            Err(RetrievalError::SourceUnavailable("backend offline".to_string()))
        }
    }

    struct Fixed;
    impl VectorRetriever for Fixed {
        fn search(&self, _query: &str, top_k: usize) -> guidedb_core::error::Result<Vec<ScoredResult>> {
            let hits = (0..3)
                .map(|i| ScoredResult {
                    chunk: Chunk {
                        id: format!("v{i}"),
                        topic: String::new(),
                        summary: String::new(),
                        keywords: Vec::new(),
                        structured_data: None,
                        build: None,
                    },
                    score: 1.0 - i as f64 * 0.1,
                    rank: 0,
                    source: Source::Lexical, // deliberately wrong label
                    matched_terms: Vec::new(),
                })
                .collect::<Vec<_>>();
            Ok(hits.into_iter().take(top_k).collect())
        }
    }

    #[test]
    fn failure_becomes_empty_with_diagnostic() {
        let adapter = VectorRetrieverAdapter::new(Arc::new(Failing));
        let outcome = adapter.search_checked("q", 5);
        assert!(outcome.results.is_empty());
        assert!(outcome.failure.expect("diagnostic").contains("backend offline"));
    }

    #[test]
    fn labels_and_ranks_are_normalized() {
        let adapter = VectorRetrieverAdapter::new(Arc::new(Fixed));
        let outcome = adapter.search_checked("q", 2);
        assert!(outcome.failure.is_none());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].rank, 1);
        assert_eq!(outcome.results[1].rank, 2);
        assert!(outcome.results.iter().all(|r| r.source == Source::Vector));
    }
}
