pub mod bm25;
pub mod index;
pub mod tokenizer;

pub use bm25::Bm25Index;
pub use index::{IndexStats, LexicalIndex};
pub use tokenizer::Tokenizer;
