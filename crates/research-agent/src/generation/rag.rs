//! Retrieval-augmented generation as a pull-based stream
//!
//! Each call to [`RagPipeline::generate`] walks one request through
//! `Retrieve -> (no results | Streaming -> footer) -> Done`. Nothing happens
//! until the stream is polled, and dropping it mid-answer drops the upstream
//! completion stream with it.

use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

use crate::error::Result;
use crate::providers::{ChatCompletionProvider, FragmentStream};
use crate::retrieval::Retriever;
use crate::types::Message;

use super::prompt::{GroundingContext, NO_RESULTS_MESSAGE};

/// One piece of a generated answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Text relayed unchanged from the completion provider
    Answer(String),
    /// The fixed message produced when retrieval finds nothing
    NoResults(String),
    /// The synthesized sources footer
    Footer(String),
}

impl Fragment {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::NoResults(text) | Self::Footer(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Answer(text) | Self::NoResults(text) | Self::Footer(text) => text,
        }
    }
}

/// Finite, non-restartable answer stream; ends after the first `Err`
pub type AnswerStream = BoxStream<'static, Result<Fragment>>;

/// Everything one generation needs, resolved up front
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub query: String,
    /// Prior turns, sent verbatim after the system prompt
    pub history: Vec<Message>,
    pub top_k: usize,
    /// Already resolved through `ModelSelection`
    pub model: String,
    pub doc_ids: Option<Vec<String>>,
}

/// RAG orchestrator
#[derive(Clone)]
pub struct RagPipeline {
    retriever: Retriever,
    llm: Arc<dyn ChatCompletionProvider>,
}

enum Stage {
    Retrieve {
        request: GenerationRequest,
        retriever: Retriever,
        llm: Arc<dyn ChatCompletionProvider>,
    },
    Streaming {
        upstream: FragmentStream,
        grounding: GroundingContext,
    },
    Done,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, llm: Arc<dyn ChatCompletionProvider>) -> Self {
        Self { retriever, llm }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Produce a grounded, cited answer as a lazy stream of fragments
    pub fn generate(&self, request: GenerationRequest) -> AnswerStream {
        let start = Stage::Retrieve {
            request,
            retriever: self.retriever.clone(),
            llm: self.llm.clone(),
        };

        stream::unfold(start, advance).boxed()
    }
}

async fn advance(mut stage: Stage) -> Option<(Result<Fragment>, Stage)> {
    loop {
        match stage {
            Stage::Retrieve {
                request,
                retriever,
                llm,
            } => {
                let results = match retriever
                    .search(&request.query, request.top_k, request.doc_ids.as_deref())
                    .await
                {
                    Ok(results) => results,
                    Err(e) => {
                        tracing::warn!("Retrieval failed: {}", e);
                        return Some((Err(e), Stage::Done));
                    }
                };

                if results.is_empty() {
                    tracing::info!("No relevant chunks; skipping completion");
                    return Some((
                        Ok(Fragment::NoResults(NO_RESULTS_MESSAGE.to_string())),
                        Stage::Done,
                    ));
                }

                let grounding = GroundingContext::from_results(&results);
                let messages = grounding.build_messages(&request.history, &request.query);

                tracing::debug!(
                    "Grounding {} sources, {} history messages, model {}",
                    grounding.sources.len(),
                    request.history.len(),
                    request.model
                );

                match llm.stream_chat(&request.model, &messages).await {
                    Ok(upstream) => {
                        stage = Stage::Streaming {
                            upstream,
                            grounding,
                        };
                    }
                    Err(e) => {
                        tracing::warn!("Completion request failed: {}", e);
                        return Some((Err(e), Stage::Done));
                    }
                }
            }
            Stage::Streaming {
                mut upstream,
                grounding,
            } => {
                return match upstream.next().await {
                    Some(Ok(text)) => Some((
                        Ok(Fragment::Answer(text)),
                        Stage::Streaming {
                            upstream,
                            grounding,
                        },
                    )),
                    Some(Err(e)) => {
                        tracing::warn!("Completion stream failed: {}", e);
                        Some((Err(e), Stage::Done))
                    }
                    None => Some((Ok(Fragment::Footer(grounding.footer())), Stage::Done)),
                };
            }
            Stage::Done => return None,
        }
    }
}
