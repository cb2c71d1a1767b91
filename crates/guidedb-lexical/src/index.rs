//! Keyword-relevance index over knowledge chunks: build, search,
//! persistence and stats.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use guidedb_core::error::{Result, RetrievalError};
use guidedb_core::types::{Chunk, ScoredResult, Source};

use crate::bm25::Bm25Index;
use crate::tokenizer::Tokenizer;

/// In-memory lexical index. Built once, immutable thereafter; concurrent
/// `search` calls are read-only and need no locking.
#[derive(Debug)]
pub struct LexicalIndex {
    tokenizer: Tokenizer,
    chunks: Vec<Chunk>,
    corpus_tokens: Vec<Vec<String>>,
    /// Token sets per document, for match explanations.
    token_sets: Vec<HashSet<String>>,
    bm25: Option<Bm25Index>,
    stop_words: Vec<String>,
}

/// Snapshot of index health for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub status: String,
    pub document_count: usize,
    pub stop_word_count: usize,
    pub entity_distribution: HashMap<String, usize>,
    pub average_document_length: f64,
}

/// On-disk sidecar: everything needed to reconstruct the index when the
/// postings file is lost.
#[derive(Serialize, Deserialize)]
struct Sidecar {
    chunks: Vec<Chunk>,
    stop_words: Vec<String>,
    corpus_tokens: Vec<Vec<String>>,
}

impl LexicalIndex {
    pub fn new(aliases: &HashMap<String, Vec<String>>, stop_words: &[String]) -> Self {
        LexicalIndex {
            tokenizer: Tokenizer::new(aliases, stop_words),
            chunks: Vec::new(),
            corpus_tokens: Vec::new(),
            token_sets: Vec::new(),
            bm25: None,
            stop_words: stop_words.to_vec(),
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn is_built(&self) -> bool {
        self.bm25.is_some()
    }

    pub fn document_count(&self) -> usize {
        self.chunks.len()
    }

    /// Build the index over the given chunks. Never partially fails: a
    /// chunk yielding no usable text is kept with an empty token list so
    /// positions stay aligned with the chunk array.
    pub fn build(&mut self, chunks: Vec<Chunk>) {
        info!(count = chunks.len(), "building lexical index");
        let mut corpus = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let text = build_search_text(chunk);
            let tokens = self.tokenizer.tokenize(&text);
            if tokens.is_empty() {
                warn!(id = %chunk.id, "chunk produced no tokens, keeping empty entry");
            }
            corpus.push(tokens);
        }
        self.finish_build(chunks, corpus);
    }

    fn finish_build(&mut self, chunks: Vec<Chunk>, corpus: Vec<Vec<String>>) {
        self.token_sets = corpus.iter().map(|t| t.iter().cloned().collect()).collect();
        self.bm25 = Some(Bm25Index::build(&corpus));
        self.corpus_tokens = corpus;
        self.chunks = chunks;
    }

    /// BM25 search. Tokenizes the query with the same pipeline used at
    /// indexing time, returns the `top_k` documents with positive score,
    /// 1-based rank and the overlapping tokens as explanation.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>> {
        let Some(bm25) = &self.bm25 else {
            return Err(RetrievalError::NotInitialized(
                "lexical index has not been built or loaded".to_string(),
            ));
        };

        let query_tokens = self.tokenizer.tokenize(query);
        if query_tokens.is_empty() {
            debug!(%query, "query tokenized to nothing");
            return Ok(Vec::new());
        }

        let scores = bm25.score(&query_tokens);
        let mut order: Vec<usize> = (0..scores.len()).filter(|&i| scores[i] > 0.0).collect();
        order.sort_by(|&a, &b| {
            scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(top_k);

        let mut results = Vec::with_capacity(order.len());
        for (rank, &doc) in order.iter().enumerate() {
            let mut matched: Vec<String> = Vec::new();
            for token in &query_tokens {
                if self.token_sets[doc].contains(token) && !matched.contains(token) {
                    matched.push(token.clone());
                }
            }
            results.push(ScoredResult {
                chunk: self.chunks[doc].clone(),
                score: scores[doc],
                rank: rank + 1,
                source: Source::Lexical,
                matched_terms: matched,
            });
        }
        debug!(%query, hits = results.len(), "lexical search complete");
        Ok(results)
    }

    /// Persist the index as a sidecar (chunks + stop words + corpus
    /// tokens) plus a postings file next to it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bm25 = self.bm25.as_ref().ok_or_else(|| {
            RetrievalError::NotInitialized("cannot save an unbuilt index".to_string())
        })?;

        let sidecar = Sidecar {
            chunks: self.chunks.clone(),
            stop_words: self.stop_words.clone(),
            corpus_tokens: self.corpus_tokens.clone(),
        };
        let sidecar_json = serde_json::to_vec(&sidecar)
            .map_err(|e| RetrievalError::persistence(path, e))?;
        fs::write(path, sidecar_json).map_err(|e| RetrievalError::persistence(path, e))?;

        let postings_path = postings_path(path);
        let postings_json = serde_json::to_vec(bm25)
            .map_err(|e| RetrievalError::persistence(&postings_path, e))?;
        fs::write(&postings_path, postings_json)
            .map_err(|e| RetrievalError::persistence(&postings_path, e))?;

        info!(path = %path.display(), "lexical index saved");
        Ok(())
    }

    /// Load a saved index. If the postings file is missing but the
    /// sidecar carries corpus tokens, the postings are rebuilt from the
    /// tokens instead of failing: a deliberate degraded-rebuild policy
    /// so a lost derived file never strands the corpus.
    pub fn load(path: &Path, aliases: &HashMap<String, Vec<String>>) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| RetrievalError::persistence(path, e))?;
        let sidecar: Sidecar =
            serde_json::from_slice(&bytes).map_err(|e| RetrievalError::persistence(path, e))?;

        let mut index = LexicalIndex::new(aliases, &sidecar.stop_words);

        let postings_path = postings_path(path);
        let bm25 = match fs::read(&postings_path) {
            Ok(bytes) => Some(
                serde_json::from_slice::<Bm25Index>(&bytes)
                    .map_err(|e| RetrievalError::persistence(&postings_path, e))?,
            ),
            Err(_) if !sidecar.corpus_tokens.is_empty() => {
                warn!(
                    path = %postings_path.display(),
                    "postings file missing, rebuilding from cached tokens"
                );
                None
            }
            Err(e) => return Err(RetrievalError::persistence(&postings_path, e)),
        };

        index.token_sets =
            sidecar.corpus_tokens.iter().map(|t| t.iter().cloned().collect()).collect();
        index.bm25 = match bm25 {
            Some(b) => Some(b),
            None => Some(Bm25Index::build(&sidecar.corpus_tokens)),
        };
        index.corpus_tokens = sidecar.corpus_tokens;
        index.chunks = sidecar.chunks;

        info!(path = %path.display(), docs = index.chunks.len(), "lexical index loaded");
        Ok(index)
    }

    pub fn stats(&self) -> IndexStats {
        let Some(bm25) = &self.bm25 else {
            return IndexStats {
                status: "not_initialized".to_string(),
                document_count: 0,
                stop_word_count: self.stop_words.len(),
                entity_distribution: HashMap::new(),
                average_document_length: 0.0,
            };
        };

        let mut distribution: HashMap<String, usize> = HashMap::new();
        for chunk in &self.chunks {
            let entity = extract_entity(chunk, self.tokenizer.canonical_entities());
            *distribution.entry(entity).or_insert(0) += 1;
        }

        IndexStats {
            status: "ready".to_string(),
            document_count: self.chunks.len(),
            stop_word_count: self.stop_words.len(),
            entity_distribution: distribution,
            average_document_length: bm25.avg_doc_len(),
        }
    }
}

fn postings_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".postings.json");
    PathBuf::from(name)
}

/// Weighted search text: topic first, then keywords, summary, and
/// recursively-extracted structured fields. Absent fields are skipped.
pub fn build_search_text(chunk: &Chunk) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !chunk.topic.is_empty() {
        parts.push(chunk.topic.clone());
    }
    parts.extend(chunk.keywords.iter().cloned());
    if !chunk.summary.is_empty() {
        parts.push(chunk.summary.clone());
    }

    if let Some(structured) = &chunk.structured_data {
        push_str_field(structured, "enemy_name", &mut parts);
        if let Some(points) = structured.get("weak_points").and_then(|v| v.as_array()) {
            for point in points {
                push_str_field(point, "name", &mut parts);
                push_str_field(point, "notes", &mut parts);
            }
        }
        if let Some(weapons) = structured.get("recommended_weapons").and_then(|v| v.as_array()) {
            for weapon in weapons {
                if let Some(s) = weapon.as_str() {
                    parts.push(s.to_string());
                }
            }
        }
    }

    if let Some(build) = &chunk.build {
        push_str_field(build, "name", &mut parts);
        push_str_field(build, "focus", &mut parts);
        if let Some(stratagems) = build.get("stratagems").and_then(|v| v.as_array()) {
            for stratagem in stratagems {
                push_str_field(stratagem, "name", &mut parts);
                push_str_field(stratagem, "rationale", &mut parts);
            }
        }
    }

    parts.join(" ")
}

fn push_str_field(value: &serde_json::Value, key: &str, parts: &mut Vec<String>) {
    if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
        if !s.is_empty() {
            parts.push(s.to_string());
        }
    }
}

/// Best-effort entity label for a chunk, used only by `stats()`.
fn extract_entity(chunk: &Chunk, canonical: &[String]) -> String {
    if let Some(name) = chunk
        .structured_data
        .as_ref()
        .and_then(|s| s.get("enemy_name"))
        .and_then(|v| v.as_str())
    {
        return name.to_lowercase();
    }
    let topic = chunk.topic.to_lowercase();
    for name in canonical {
        if crate::tokenizer::contains_term(&topic, name) {
            return name.clone();
        }
    }
    "target".to_string()
}
