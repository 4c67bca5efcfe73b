//! Retrieval: query embedding, vector search, and result scoring

mod search;

pub use search::{relevance_score, Retriever, UNKNOWN_DOCUMENT};
