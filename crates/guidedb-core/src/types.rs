//! Domain types shared by the lexical index, query preprocessor and
//! fusion engine.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// An externally-authored knowledge chunk, immutable once indexed.
///
/// - `id`: globally unique chunk identifier
/// - `topic`: short display title (highest-weight search text)
/// - `summary`: longer prose description
/// - `keywords`: curated search terms, in authoring order
/// - `structured_data`/`build`: opaque nested maps; the engine only walks
///   them for text extraction and never interprets them semantically
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<serde_json::Value>,
}

/// Indicates which retrieval path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Lexical,
    Vector,
}

/// A single hit from one retrieval path.
///
/// `score` is source-specific (BM25 or vector similarity) but higher is
/// always better. `rank` is 1-based within the producing source.
/// `matched_terms` lists the normalized tokens that overlapped the
/// document's derived search text, for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    pub chunk: Chunk,
    pub score: f64,
    pub rank: usize,
    pub source: Source,
    #[serde(default)]
    pub matched_terms: Vec<String>,
}

/// Strategy used to merge the two ranked lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FusionMethod {
    #[serde(rename = "rrf")]
    Rrf,
    #[serde(rename = "weighted")]
    WeightedSum,
    #[serde(rename = "max")]
    MaxScore,
}

impl Default for FusionMethod {
    fn default() -> Self {
        FusionMethod::Rrf
    }
}

impl std::str::FromStr for FusionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rrf" => Ok(FusionMethod::Rrf),
            "weighted" | "weighted_sum" => Ok(FusionMethod::WeightedSum),
            "max" | "max_score" => Ok(FusionMethod::MaxScore),
            other => Err(format!("unknown fusion method: {other}")),
        }
    }
}

/// A merged result carrying both sub-scores.
///
/// Invariant: a response's results are sorted by `fused_score` descending;
/// ties keep first-encounter order (lexical hits before vector hits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    pub chunk: Chunk,
    pub fused_score: f64,
    pub lexical_score: f64,
    pub vector_score: f64,
    pub sources: Vec<Source>,
    pub fusion_method: FusionMethod,
    /// Domain-entity boost factor applied to `fused_score` (1.0 = none).
    pub boost: f64,
    /// Final 1-based rank after boost and truncation.
    pub rank: usize,
}

/// Closed set of query intents recognized by the weighting table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Weakness,
    KillMethod,
    Strategy,
    WeaponLoadout,
    BuildGuide,
    GeneralInfo,
    Unknown,
}

impl Default for Intent {
    fn default() -> Self {
        Intent::Unknown
    }
}

/// Dominant script composition of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Latin,
    Cjk,
    Mixed,
}

/// Per-intent weight pair consumed by the fusion stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentWeights {
    pub lexical: f64,
    pub vector: f64,
}

impl Default for IntentWeights {
    fn default() -> Self {
        IntentWeights { lexical: 0.5, vector: 0.5 }
    }
}

/// Structured output of the external query-processing collaborator,
/// consumed read-only by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub original_query: String,
    pub rewritten_query: String,
    pub bm25_query: String,
    pub detected_language: Language,
    pub intent: Intent,
    pub confidence: f64,
    #[serde(default)]
    pub detected_entities: Vec<String>,
}

impl QueryContext {
    /// Degraded context used when the external query processor fails:
    /// the raw query stands in for the rewritten forms and the intent is
    /// unknown.
    pub fn fallback(raw: &str) -> Self {
        QueryContext {
            original_query: raw.to_string(),
            rewritten_query: raw.to_string(),
            bm25_query: raw.to_string(),
            detected_language: Language::Latin,
            intent: Intent::Unknown,
            confidence: 0.0,
            detected_entities: Vec::new(),
        }
    }
}

/// Per-response diagnostics attached by the fusion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub fusion_method: FusionMethod,
    pub weights: IntentWeights,
    pub lexical_candidates: usize,
    pub vector_candidates: usize,
    /// Human-readable reasons for any degraded source, empty when both
    /// paths succeeded.
    #[serde(default)]
    pub degraded: Vec<String>,
    pub from_cache: bool,
}

/// The full answer to one `retrieve()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResponse {
    pub results: Vec<FusedResult>,
    pub query: QueryContext,
    pub metadata: ResponseMetadata,
}
