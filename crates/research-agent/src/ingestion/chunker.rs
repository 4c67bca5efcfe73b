//! Recursive character chunking with overlap

use crate::config::ChunkingConfig;

/// Separators tried in order: paragraphs, lines, words, characters
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Text chunker with configurable size and overlap.
///
/// Splits on the coarsest separator present in the text, recursing into
/// finer separators for pieces that are still too long, then greedily merges
/// neighbouring pieces back up to `chunk_size` characters. Separators stay
/// attached to the start of the piece that follows them, and each merged
/// chunk is trimmed. Lengths are counted in characters, not bytes.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk length in characters
    chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next
    chunk_overlap: usize,
    separators: Vec<&'static str>,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.to_vec(),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split text into chunks; empty or whitespace-only input yields none
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        // Pick the first separator that occurs in the text
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&'static str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut short_pieces: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                short_pieces.push(piece);
                continue;
            }

            if !short_pieces.is_empty() {
                chunks.extend(self.merge(&short_pieces));
                short_pieces.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !short_pieces.is_empty() {
            chunks.extend(self.merge(&short_pieces));
        }

        chunks
    }

    /// Greedily combine pieces into chunks, keeping up to `chunk_overlap`
    /// trailing characters of each chunk as the start of the next
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_trimmed(&window) {
                    chunks.push(chunk);
                }

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_trimmed(&window) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

/// Split on a literal separator, attaching each separator to the piece after
/// it. The empty separator splits into single characters. Empty pieces are
/// dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_trimmed(window: &std::collections::VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        let chunker = TextChunker::default();
        assert!(chunker.split("").is_empty());
        assert!(chunker.split("  \n\n\t ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_trimmed_chunk() {
        let chunker = TextChunker::default();
        assert_eq!(chunker.split("  Hello world.\n"), vec!["Hello world."]);
    }

    #[test]
    fn test_paragraph_boundaries() {
        let chunker = TextChunker::new(20, 0);
        let chunks = chunker.split("aaaa bbbb\n\ncccc dddd\n\neeee");
        assert_eq!(chunks, vec!["aaaa bbbb\n\ncccc dddd", "eeee"]);
    }

    #[test]
    fn test_word_overlap() {
        let text: String = (0..200).map(|i| format!("word{:03} ", i)).collect();
        let chunker = TextChunker::default();
        let chunks = chunker.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 512);
        }
        // The next chunk starts inside the previous one's tail
        let first_word_of_second = chunks[1].split(' ').next().unwrap();
        assert!(chunks[0].ends_with(first_word_of_second) || chunks[0].contains(first_word_of_second));
    }

    #[test]
    fn test_lengths_are_counted_in_chars() {
        let text = "é".repeat(600);
        let chunks = TextChunker::default().split(&text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 512);
        // 51 characters of overlap plus the remaining 88
        assert_eq!(chunks[1].chars().count(), 139);
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\n\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\n", "\n\nc"]
        );
        assert_eq!(split_keeping_separator("hé", ""), vec!["h", "é"]);
    }
}
