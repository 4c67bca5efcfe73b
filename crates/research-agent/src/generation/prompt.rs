//! Prompt templates for RAG generation

use crate::types::{Message, SearchResult};

/// Single fragment produced when retrieval finds nothing
pub const NO_RESULTS_MESSAGE: &str = "I couldn't find any relevant documents to answer your question. Please upload documents related to your query first.";

/// Heading that opens the synthesized sources footer
const FOOTER_HEADER: &str = "\n\n---\n\n**Sources Referenced**\n";

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a helpful research assistant. Answer the user's question based ONLY on the provided document excerpts below.

**OUTPUT FORMAT**
Structure your answer as clear markdown. Consider using:
- Bold text (**text**) for key terms and emphasis
- Section headers (## Main Topic, ### Subtopic) when organizing complex answers
- Bullet points for lists and multiple items
- Clear paragraphs for narrative explanations

Adapt your structure to the question type. Simple questions may need just a paragraph; complex topics benefit from sections.

**CITATION REQUIREMENTS**
- Use inline citations in the format [Doc N] immediately after factual claims
- Only cite documents actually provided below (Doc 1 through Doc {num_docs})
- Cite by document number only, never by filename or section
- Each major claim or piece of information should reference its source document
- Multiple facts from the same document still need citations: "Fact one [Doc 2]. Fact two [Doc 2]."
- Do NOT add a "Sources" or "References" section at the end; it is added for you

**GROUNDING RULES**
- Answer ONLY using the provided documents below
- If documents don't fully answer the question, explicitly state what information is missing
- Never add information from your training knowledge
- When uncertain, acknowledge the limitation rather than speculating
- If no documents are relevant, say so clearly

DOCUMENTS:
{context}

Now answer the user's question based on these documents."#;

/// One numbered entry of the context block, kept for the footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// 1-based number used in `[Doc N]`
    pub doc_number: usize,
    pub filename: String,
    pub chunk_position: String,
}

/// Numbered context block and the matching source map
#[derive(Debug, Clone)]
pub struct GroundingContext {
    pub context: String,
    pub sources: Vec<SourceRef>,
}

impl GroundingContext {
    /// Number results in the order given, starting at 1
    pub fn from_results(results: &[SearchResult]) -> Self {
        let mut parts = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for (i, result) in results.iter().enumerate() {
            let doc_number = i + 1;
            parts.push(format!(
                "[Doc {}] Source: {} (Section {}):\n{}",
                doc_number, result.source_filename, result.chunk_position, result.text
            ));
            sources.push(SourceRef {
                doc_number,
                filename: result.source_filename.clone(),
                chunk_position: result.chunk_position.clone(),
            });
        }

        Self {
            context: parts.join("\n\n"),
            sources,
        }
    }

    /// System instructions with the context block embedded
    pub fn system_prompt(&self) -> String {
        SYSTEM_PROMPT_TEMPLATE
            .replace("{num_docs}", &self.sources.len().to_string())
            .replace("{context}", &self.context)
    }

    /// System message, then history verbatim, then the raw query
    pub fn build_messages(&self, history: &[Message], query: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt()));
        messages.extend_from_slice(history);
        messages.push(Message::user(query));
        messages
    }

    /// Deterministic sources footer, in context numbering
    pub fn footer(&self) -> String {
        let mut footer = String::from(FOOTER_HEADER);
        for source in &self.sources {
            footer.push_str(&format!(
                "- [Doc {}]: {} (Section {})\n",
                source.doc_number, source.filename, source.chunk_position
            ));
        }
        footer
    }
}
