use std::path::Path;

use thiserror::Error;

/// Retrieval error taxonomy.
///
/// Locally recoverable conditions (empty tokenization, absent optional
/// fields) are absorbed where they occur and never surface here; only
/// cross-component failures are typed.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Operation attempted on an index that was never built or loaded.
    /// Recoverable: build or load, then retry.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// I/O or serialization failure during save/load, with the
    /// underlying cause.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// One retrieval source failed or timed out. The fusion engine logs
    /// this and continues with the remaining source.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Caller-initiated abort; no partial state is persisted.
    #[error("retrieval cancelled")]
    Cancelled,
}

impl RetrievalError {
    pub fn persistence(path: &Path, cause: impl std::fmt::Display) -> Self {
        RetrievalError::Persistence(format!("{}: {}", path.display(), cause))
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
