pub mod adapter;
pub mod cache;
pub mod engine;
pub mod fuse;
pub mod validator;

pub use adapter::{SourceOutcome, VectorRetrieverAdapter};
pub use cache::{CacheKey, RetrievalCache};
pub use engine::{EngineStats, FusionEngine};
pub use validator::{CheckOutcome, ValidationReport, Validator, Verdict};
