//! Chat turn driver
//!
//! Relays the fragments of one generated answer as `ChatEvent`s and appends
//! the user and assistant messages to the session once the answer completes.
//! Every stream ends with exactly one `done` or `error` event.

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::Result;
use crate::generation::{AnswerStream, Fragment, GenerationRequest, ModelSelection, RagPipeline};
use crate::storage::SessionStore;
use crate::types::{ChatEvent, ChatRequest, Message};

/// Event stream for one turn; always ends with exactly one terminal event
pub type ChatEventStream = BoxStream<'static, ChatEvent>;

/// Drives chat turns against the RAG pipeline and the session store
#[derive(Clone)]
pub struct ChatService {
    rag: RagPipeline,
    sessions: SessionStore,
}

struct Turn {
    answer: AnswerStream,
    sessions: SessionStore,
    session_id: String,
    query: String,
    accumulated: String,
    no_results: bool,
}

enum TurnState {
    Relaying(Turn),
    Finished,
}

impl ChatService {
    pub fn new(rag: RagPipeline, sessions: SessionStore) -> Self {
        Self { rag, sessions }
    }

    /// Start a turn. History is loaded before the stream opens, so a storage
    /// failure here surfaces as a plain error response.
    pub async fn start(&self, request: ChatRequest, models: &ModelSelection) -> Result<ChatEventStream> {
        let history = self
            .sessions
            .get(&request.session_id)
            .await?
            .map(|session| session.messages)
            .unwrap_or_default();

        let model = models.resolve(request.model.as_deref());
        tracing::info!(
            "Chat turn: session {}, {} prior messages, model {}, top_k {}",
            request.session_id,
            history.len(),
            model,
            request.top_k
        );

        let answer = self.rag.generate(GenerationRequest {
            query: request.message.clone(),
            history,
            top_k: request.top_k,
            model,
            doc_ids: request.doc_filter(),
        });

        Ok(relay(answer, self.sessions.clone(), request.session_id, request.message))
    }
}

/// Relay fragments as `content` events, then persist and emit `done`.
///
/// The turn is written only after the answer stream ends cleanly. A failed
/// or abandoned stream leaves the session untouched, as does the fixed
/// no-results reply.
pub(crate) fn relay(
    answer: AnswerStream,
    sessions: SessionStore,
    session_id: String,
    query: String,
) -> ChatEventStream {
    let turn = Turn {
        answer,
        sessions,
        session_id,
        query,
        accumulated: String::new(),
        no_results: false,
    };

    stream::unfold(TurnState::Relaying(turn), advance).boxed()
}

async fn advance(state: TurnState) -> Option<(ChatEvent, TurnState)> {
    let mut turn = match state {
        TurnState::Relaying(turn) => turn,
        TurnState::Finished => return None,
    };

    match turn.answer.next().await {
        Some(Ok(fragment)) => {
            if matches!(fragment, Fragment::NoResults(_)) {
                turn.no_results = true;
            }
            let text = fragment.into_text();
            turn.accumulated.push_str(&text);
            Some((ChatEvent::content(text), TurnState::Relaying(turn)))
        }
        Some(Err(e)) => {
            tracing::warn!("Chat turn for session {} failed: {}", turn.session_id, e);
            Some((ChatEvent::error(&e), TurnState::Finished))
        }
        None => Some((finish(turn).await, TurnState::Finished)),
    }
}

async fn finish(turn: Turn) -> ChatEvent {
    if turn.no_results {
        tracing::debug!("No-results reply for session {}; not persisted", turn.session_id);
        return ChatEvent::done();
    }

    let answer_len = turn.accumulated.len();
    match turn
        .sessions
        .append_turn(
            &turn.session_id,
            Message::user(turn.query),
            Message::assistant(turn.accumulated),
        )
        .await
    {
        Ok(outcome) => {
            tracing::info!(
                "Chat turn complete: session {} ({:?}), {} bytes",
                turn.session_id,
                outcome,
                answer_len
            );
            ChatEvent::done()
        }
        Err(e) => {
            tracing::error!("Failed to persist session {}: {}", turn.session_id, e);
            ChatEvent::error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::generation::NO_RESULTS_MESSAGE;
    use crate::ingestion::{IngestPipeline, TextChunker};
    use crate::providers::mock::{MockChat, MockEmbedder};
    use crate::providers::LocalVectorStore;
    use crate::retrieval::Retriever;
    use crate::types::Role;
    use std::sync::Arc;

    fn answer(items: Vec<Result<Fragment>>) -> AnswerStream {
        stream::iter(items).boxed()
    }

    async fn collect(events: ChatEventStream) -> Vec<ChatEvent> {
        events.collect().await
    }

    #[tokio::test]
    async fn test_completed_turn_is_persisted() {
        let sessions = SessionStore::in_memory().unwrap();
        let events = collect(relay(
            answer(vec![
                Ok(Fragment::Answer("Paris".into())),
                Ok(Fragment::Footer("\n\nsources".into())),
            ]),
            sessions.clone(),
            "s1".into(),
            "capital?".into(),
        ))
        .await;

        assert_eq!(
            events,
            vec![
                ChatEvent::content("Paris"),
                ChatEvent::content("\n\nsources"),
                ChatEvent::done()
            ]
        );

        let session = sessions.get("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0], Message::user("capital?"));
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert_eq!(session.messages[1].content, "Paris\n\nsources");
    }

    #[tokio::test]
    async fn test_failure_after_fragments_leaves_session_unchanged() {
        let sessions = SessionStore::in_memory().unwrap();
        sessions
            .append_turn("s1", Message::user("q0"), Message::assistant("a0"))
            .await
            .unwrap();
        let before = sessions.get("s1").await.unwrap().unwrap();

        let events = collect(relay(
            answer(vec![
                Ok(Fragment::Answer("a".into())),
                Ok(Fragment::Answer("b".into())),
                Ok(Fragment::Answer("c".into())),
                Err(Error::completion_unavailable("connection reset")),
            ]),
            sessions.clone(),
            "s1".into(),
            "q1".into(),
        ))
        .await;

        assert_eq!(events.len(), 4);
        assert!(events[..3].iter().all(|e| !e.is_terminal()));
        match &events[3] {
            ChatEvent::Error { kind, retryable, .. } => {
                assert_eq!(*kind, ErrorKind::CompletionUnavailable);
                assert!(*retryable);
            }
            other => panic!("expected error event, got {:?}", other),
        }

        let after = sessions.get("s1").await.unwrap().unwrap();
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_no_results_reply_is_not_persisted() {
        let embedder = Arc::new(MockEmbedder::new(32));
        let store = Arc::new(LocalVectorStore::in_memory(32).unwrap());
        let chat = Arc::new(MockChat::new(["unused"]));
        let rag = RagPipeline::new(Retriever::new(embedder, store), chat.clone());
        let sessions = SessionStore::in_memory().unwrap();
        let service = ChatService::new(rag, sessions.clone());
        let models = ModelSelection::new("llama3.2");

        let events = collect(
            service
                .start(ChatRequest::new("s1", "What is the capital of France?"), &models)
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(
            events,
            vec![ChatEvent::content(NO_RESULTS_MESSAGE), ChatEvent::done()]
        );
        assert_eq!(chat.calls(), 0);
        assert!(sessions.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_and_model_flow_into_generation() {
        let embedder = Arc::new(MockEmbedder::new(32));
        let store = Arc::new(LocalVectorStore::in_memory(32).unwrap());
        let chat = Arc::new(MockChat::new(["Madrid [Doc 1]."]));
        IngestPipeline::new(TextChunker::default(), embedder.clone(), store.clone())
            .index_document("d1", "spain.md", "Madrid is the capital of Spain.")
            .await
            .unwrap();

        let rag = RagPipeline::new(Retriever::new(embedder, store), chat.clone());
        let sessions = SessionStore::in_memory().unwrap();
        sessions
            .append_turn("s1", Message::user("hi"), Message::assistant("hello"))
            .await
            .unwrap();

        let service = ChatService::new(rag, sessions.clone());
        let models = ModelSelection::new("llama3.2");
        let request = ChatRequest::new("s1", "capital of Spain").with_model("mistral");
        let events = collect(service.start(request, &models).await.unwrap()).await;

        assert_eq!(events.last(), Some(&ChatEvent::done()));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let (model, messages) = chat.last_request().unwrap();
        assert_eq!(model, "mistral");
        assert_eq!(messages[1], Message::user("hi"));
        assert_eq!(messages[2], Message::assistant("hello"));

        let session = sessions.get("s1").await.unwrap().unwrap();
        assert_eq!(session.messages.len(), 4);
        assert!(session.messages[3].content.starts_with("Madrid [Doc 1]."));
        assert!(session.messages[3].content.contains("**Sources Referenced**"));
    }
}
