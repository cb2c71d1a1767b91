//! BM25 posting-list index over tokenized documents.
//!
//! Position in the document array is the document id; the index never
//! reorders or drops entries, so it stays aligned with the chunk array
//! owned by [`crate::LexicalIndex`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const DEFAULT_K1: f64 = 1.5;
const DEFAULT_B: f64 = 0.75;

/// Immutable BM25 statistics, built once from a tokenized corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    /// token -> (doc position, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    doc_lengths: Vec<u32>,
    avg_doc_len: f64,
    k1: f64,
    b: f64,
}

impl Bm25Index {
    pub fn build(corpus: &[Vec<String>]) -> Self {
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(corpus.len());

        for (doc, tokens) in corpus.iter().enumerate() {
            doc_lengths.push(tokens.len() as u32);
            let mut tf: HashMap<&str, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            for (token, count) in tf {
                postings.entry(token.to_string()).or_default().push((doc, count));
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| u64::from(l)).sum();
        let avg_doc_len = if doc_lengths.is_empty() {
            0.0
        } else {
            total as f64 / doc_lengths.len() as f64
        };

        Bm25Index { postings, doc_lengths, avg_doc_len, k1: DEFAULT_K1, b: DEFAULT_B }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    /// BM25 score of every document for the given query tokens.
    ///
    /// Scores are non-negative; documents sharing no token with the
    /// query score 0.
    pub fn score(&self, query_tokens: &[String]) -> Vec<f64> {
        let n = self.doc_lengths.len();
        let mut scores = vec![0.0; n];
        if n == 0 || self.avg_doc_len == 0.0 {
            return scores;
        }

        for token in query_tokens {
            let Some(entries) = self.postings.get(token) else {
                continue;
            };
            let df = entries.len() as f64;
            let idf = ((n as f64 - df + 0.5) / (df + 0.5) + 1.0).ln();
            for &(doc, tf) in entries {
                let tf = f64::from(tf);
                let doc_len = f64::from(self.doc_lengths[doc]);
                let denom =
                    tf + self.k1 * (1.0 - self.b + self.b * doc_len / self.avg_doc_len);
                scores[doc] += idf * (tf * (self.k1 + 1.0)) / denom;
            }
        }
        scores
    }
}
