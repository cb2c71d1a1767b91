//! Query preprocessor: alias-normalized query forms, language
//! composition detection, and the intent-to-weight table.
//!
//! Pure data transformation, no I/O. The normalizer shares the exact
//! alias map used at indexing time, so query-side and document-side
//! normalization cannot diverge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use guidedb_core::types::{Intent, IntentWeights, Language};
use guidedb_lexical::Tokenizer;

/// Output of [`QueryNormalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub canonical_query: String,
    pub detected_entities: Vec<String>,
}

/// Applies the shared alias map to incoming queries.
#[derive(Debug, Clone)]
pub struct QueryNormalizer {
    tokenizer: Tokenizer,
}

impl QueryNormalizer {
    pub fn new(aliases: &HashMap<String, Vec<String>>) -> Self {
        QueryNormalizer { tokenizer: Tokenizer::new(aliases, &[]) }
    }

    /// Reuse the index's own tokenizer so both sides share one pipeline.
    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        QueryNormalizer { tokenizer }
    }

    pub fn normalize(&self, query: &str) -> NormalizedQuery {
        let canonical_query = self.tokenizer.normalize(query);
        let detected_entities = self.tokenizer.detect_entities(query);
        debug!(%query, canonical = %canonical_query, entities = ?detected_entities, "query normalized");
        NormalizedQuery { canonical_query, detected_entities }
    }
}

/// Script composition of a query, used by callers that route CJK
/// queries through translation before retrieval.
pub fn detect_language(text: &str) -> Language {
    let mut cjk = false;
    let mut latin = false;
    for c in text.chars() {
        if ('\u{4e00}'..='\u{9fff}').contains(&c) {
            cjk = true;
        } else if c.is_ascii_alphabetic() {
            latin = true;
        }
    }
    match (cjk, latin) {
        (true, true) => Language::Mixed,
        (true, false) => Language::Cjk,
        _ => Language::Latin,
    }
}

/// Intent-to-weight mapping: the single source of truth for adaptive
/// weighting. Fusion never hard-codes weight pairs.
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: HashMap<Intent, IntentWeights>,
    default: IntentWeights,
}

impl WeightTable {
    pub fn new(weights: HashMap<Intent, IntentWeights>, default: IntentWeights) -> Self {
        WeightTable { weights, default }
    }

    /// Weight pair for an intent; unknown or unmapped intents fall back
    /// to the default balanced pair.
    pub fn for_intent(&self, intent: Intent) -> IntentWeights {
        self.weights.get(&intent).copied().unwrap_or(self.default)
    }

    pub fn entries(&self) -> &HashMap<Intent, IntentWeights> {
        &self.weights
    }

    pub fn default_pair(&self) -> IntentWeights {
        self.default
    }
}
