//! Offline health validator for a deployed retrieval setup.
//!
//! Read-only: runs a fixed battery of checks against the live index and
//! retriever without mutating either, and reports per-check outcomes
//! with remediation hints instead of aborting on the first failure.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use guidedb_core::traits::VectorRetriever;
use guidedb_core::types::{Chunk, FusionMethod, IntentWeights, ScoredResult, Source};
use guidedb_lexical::LexicalIndex;

use crate::fuse;

/// Overall outcome of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Partial,
    Fail,
}

/// One named check with its outcome and, on failure, a remediation hint.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub verdict: Verdict,
    pub checks: Vec<CheckOutcome>,
}

impl ValidationReport {
    pub fn summary(&self) -> String {
        let passed = self.checks.iter().filter(|c| c.passed).count();
        format!("{:?}: {passed}/{} checks passed", self.verdict, self.checks.len())
    }
}

/// Runs the check battery. Sample queries should be representative of
/// production traffic; an empty list skips the per-query recall check.
pub struct Validator {
    sample_queries: Vec<String>,
}

impl Validator {
    pub fn new(sample_queries: Vec<String>) -> Self {
        Validator { sample_queries }
    }

    pub fn run(
        &self,
        index: &LexicalIndex,
        vector: Option<&Arc<dyn VectorRetriever>>,
    ) -> ValidationReport {
        let mut checks = Vec::new();
        checks.push(check_lexical_ready(index));
        checks.push(self.check_lexical_recall(index));
        checks.push(check_vector(vector, self.sample_queries.first()));
        checks.push(check_fusion_methods());

        let lexical_ok = checks[0].passed && checks[1].passed;
        let all_ok = checks.iter().all(|c| c.passed);
        let verdict = if all_ok {
            Verdict::Pass
        } else if lexical_ok {
            Verdict::Partial
        } else {
            Verdict::Fail
        };

        let report = ValidationReport { verdict, checks };
        info!(summary = %report.summary(), "validation run complete");
        report
    }

    fn check_lexical_recall(&self, index: &LexicalIndex) -> CheckOutcome {
        if self.sample_queries.is_empty() {
            return CheckOutcome {
                name: "lexical_recall".to_string(),
                passed: true,
                detail: "no sample queries configured, check skipped".to_string(),
                remediation: None,
            };
        }

        let mut empty: Vec<&str> = Vec::new();
        for query in &self.sample_queries {
            match index.search(query, 5) {
                Ok(hits) if !hits.is_empty() => {}
                Ok(_) => empty.push(query),
                Err(e) => {
                    return CheckOutcome {
                        name: "lexical_recall".to_string(),
                        passed: false,
                        detail: format!("search failed on '{query}': {e}"),
                        remediation: Some("rebuild the lexical index".to_string()),
                    };
                }
            }
        }

        if empty.is_empty() {
            CheckOutcome {
                name: "lexical_recall".to_string(),
                passed: true,
                detail: format!("all {} sample queries returned hits", self.sample_queries.len()),
                remediation: None,
            }
        } else {
            CheckOutcome {
                name: "lexical_recall".to_string(),
                passed: false,
                detail: format!("no hits for: {}", empty.join(", ")),
                remediation: Some(
                    "check alias coverage and stop-word list for these queries".to_string(),
                ),
            }
        }
    }
}

fn check_lexical_ready(index: &LexicalIndex) -> CheckOutcome {
    if !index.is_built() {
        return CheckOutcome {
            name: "lexical_index_ready".to_string(),
            passed: false,
            detail: "index has not been built or loaded".to_string(),
            remediation: Some("run the build step before serving queries".to_string()),
        };
    }
    if index.document_count() == 0 {
        return CheckOutcome {
            name: "lexical_index_ready".to_string(),
            passed: false,
            detail: "index is built but holds no documents".to_string(),
            remediation: Some("verify the chunk source is non-empty".to_string()),
        };
    }
    CheckOutcome {
        name: "lexical_index_ready".to_string(),
        passed: true,
        detail: format!("index ready with {} documents", index.document_count()),
        remediation: None,
    }
}

fn check_vector(
    vector: Option<&Arc<dyn VectorRetriever>>,
    probe: Option<&String>,
) -> CheckOutcome {
    let Some(retriever) = vector else {
        return CheckOutcome {
            name: "vector_retriever".to_string(),
            passed: false,
            detail: "no vector retriever configured".to_string(),
            remediation: Some(
                "inject a vector retriever to enable hybrid fusion".to_string(),
            ),
        };
    };
    let query = probe.map_or("health probe", String::as_str);
    match retriever.search(query, 3) {
        Ok(hits) if !hits.is_empty() => CheckOutcome {
            name: "vector_retriever".to_string(),
            passed: true,
            detail: format!("probe query returned {} hits", hits.len()),
            remediation: None,
        },
        Ok(_) => CheckOutcome {
            name: "vector_retriever".to_string(),
            passed: false,
            detail: "probe query returned no hits".to_string(),
            remediation: Some("verify the vector store holds the corpus".to_string()),
        },
        Err(e) => CheckOutcome {
            name: "vector_retriever".to_string(),
            passed: false,
            detail: format!("probe query failed: {e}"),
            remediation: Some("check the vector backend connection".to_string()),
        },
    }
}

/// Exercises every fusion strategy on a small synthetic fixture and
/// verifies each produces a non-empty, descending-ordered merge.
fn check_fusion_methods() -> CheckOutcome {
    let lexical = fixture_hits(Source::Lexical, &["a", "b"]);
    let vector = fixture_hits(Source::Vector, &["b", "c"]);
    let weights = IntentWeights::default();

    for method in [FusionMethod::Rrf, FusionMethod::WeightedSum, FusionMethod::MaxScore] {
        let fused = fuse::fuse(method, &lexical, &vector, weights, 60.0);
        if fused.is_empty() {
            return CheckOutcome {
                name: "fusion_methods".to_string(),
                passed: false,
                detail: format!("{method:?} produced no results from non-empty inputs"),
                remediation: Some("inspect the fusion configuration".to_string()),
            };
        }
        let ordered = fused.windows(2).all(|w| w[0].fused_score >= w[1].fused_score);
        if !ordered {
            return CheckOutcome {
                name: "fusion_methods".to_string(),
                passed: false,
                detail: format!("{method:?} output is not score-descending"),
                remediation: Some("inspect the fusion configuration".to_string()),
            };
        }
    }

    CheckOutcome {
        name: "fusion_methods".to_string(),
        passed: true,
        detail: "all fusion strategies merged the fixture correctly".to_string(),
        remediation: None,
    }
}

fn fixture_hits(source: Source, ids: &[&str]) -> Vec<ScoredResult> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| ScoredResult {
            chunk: Chunk {
                id: (*id).to_string(),
                topic: format!("fixture {id}"),
                summary: String::new(),
                keywords: Vec::new(),
                structured_data: None,
                build: None,
            },
            score: 1.0 - i as f64 * 0.2,
            rank: i + 1,
            source,
            matched_terms: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use guidedb_core::error::RetrievalError;

    fn built_index() -> LexicalIndex {
        let mut index = LexicalIndex::new(&HashMap::new(), &[]);
        index.build(vec![Chunk {
            id: "c1".to_string(),
            topic: "bile titan weak points".to_string(),
            summary: "forehead plate and belly sacs".to_string(),
            keywords: vec!["weakness".to_string()],
            structured_data: None,
            build: None,
        }]);
        index
    }

    struct Healthy;
    impl VectorRetriever for Healthy {
        fn search(&self, _q: &str, _k: usize) -> guidedb_core::error::Result<Vec<ScoredResult>> {
            Ok(fixture_hits(Source::Vector, &["v1"]))
        }
    }

    struct Down;
    impl VectorRetriever for Down {
        fn search(&self, _q: &str, _k: usize) -> guidedb_core::error::Result<Vec<ScoredResult>> {
            Err(RetrievalError::SourceUnavailable("offline".to_string()))
        }
    }

    #[test]
    fn all_healthy_passes() {
        let index = built_index();
        let vector: Arc<dyn VectorRetriever> = Arc::new(Healthy);
        let validator = Validator::new(vec!["bile titan weakness".to_string()]);
        let report = validator.run(&index, Some(&vector));
        assert_eq!(report.verdict, Verdict::Pass);
        assert!(report.checks.iter().all(|c| c.passed));
    }

    #[test]
    fn vector_down_is_partial_not_fail() {
        let index = built_index();
        let vector: Arc<dyn VectorRetriever> = Arc::new(Down);
        let validator = Validator::new(vec!["bile titan weakness".to_string()]);
        let report = validator.run(&index, Some(&vector));
        assert_eq!(report.verdict, Verdict::Partial);
        let vec_check = report
            .checks
            .iter()
            .find(|c| c.name == "vector_retriever")
            .expect("check present");
        assert!(!vec_check.passed);
        assert!(vec_check.remediation.is_some());
    }

    #[test]
    fn unbuilt_index_fails() {
        let index = LexicalIndex::new(&HashMap::new(), &[]);
        let validator = Validator::new(Vec::new());
        let report = validator.run(&index, None);
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[test]
    fn missing_recall_is_flagged_with_remediation() {
        let index = built_index();
        let validator = Validator::new(vec!["completely unrelated phrase".to_string()]);
        let report = validator.run(&index, None);
        let recall = report
            .checks
            .iter()
            .find(|c| c.name == "lexical_recall")
            .expect("check present");
        assert!(!recall.passed);
        assert!(recall.detail.contains("unrelated"));
    }
}
