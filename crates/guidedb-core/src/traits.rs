use crate::error::Result;
use crate::types::ScoredResult;

/// The injected vector-similarity search capability.
///
/// The engine never implements vector search itself; every backend
/// satisfies this one contract at compile time instead of being probed
/// for methods at runtime. Implementations that are natively async may
/// block internally; the fusion engine already runs this off the request
/// task.
pub trait VectorRetriever: Send + Sync {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>>;
}
