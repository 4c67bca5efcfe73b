//! Document ingestion: validation, text extraction, chunking, and indexing

mod chunker;
pub mod extractor;
mod pipeline;
pub mod validator;

pub use chunker::TextChunker;
pub use extractor::extract_text;
pub use pipeline::IngestPipeline;
