//! Answer generation: prompt assembly, model selection, and the RAG stream

pub mod model;
pub mod prompt;
pub mod rag;

pub use model::ModelSelection;
pub use prompt::{GroundingContext, SourceRef, NO_RESULTS_MESSAGE};
pub use rag::{AnswerStream, Fragment, GenerationRequest, RagPipeline};
