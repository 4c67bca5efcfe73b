//! Plain-text extraction from stored uploads

use std::path::Path;

use crate::types::FileType;

/// Extract plain text from a stored upload, dispatching on its extension.
///
/// Never fails: an unreadable file, an unsupported extension, or a PDF
/// without a text layer all yield an empty string, which the caller records
/// as a failed extraction.
pub async fn extract_text(path: &Path, extension: &str) -> String {
    match FileType::from_extension(extension) {
        Some(FileType::Pdf) => extract_pdf(path).await,
        Some(FileType::Txt) | Some(FileType::Markdown) => extract_plain(path).await,
        None => {
            tracing::warn!("No extractor for extension '{}'", extension);
            String::new()
        }
    }
}

async fn extract_plain(path: &Path) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("{} is not valid UTF-8: {}", path.display(), e);
                String::new()
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            String::new()
        }
    }
}

async fn extract_pdf(path: &Path) -> String {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            return String::new();
        }
    };

    // pdf-extract is CPU bound and may panic on malformed fonts
    let result =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data)).await;

    match result {
        Ok(Ok(text)) => clean_pdf_text(&text),
        Ok(Err(e)) => {
            tracing::warn!("PDF extraction failed for {}: {}", path.display(), e);
            String::new()
        }
        Err(e) => {
            tracing::error!("PDF extraction task aborted for {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Normalize ligatures and stray control characters, drop blank lines
fn clean_pdf_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl");

    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        tokio::fs::write(&path, "# Title\n\nBody text.").await.unwrap();

        assert_eq!(extract_text(&path, ".md").await, "# Title\n\nBody text.");
    }

    #[tokio::test]
    async fn test_missing_file_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        assert_eq!(extract_text(&path, ".txt").await, "");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        tokio::fs::write(&path, b"%PDF-1.4\nnot really a pdf").await.unwrap();

        assert_eq!(extract_text(&path, ".pdf").await, "");
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.png");
        tokio::fs::write(&path, b"\x89PNG").await.unwrap();
        assert_eq!(extract_text(&path, ".png").await, "");
    }

    #[test]
    fn test_clean_pdf_text() {
        let raw = "e\u{FB03}cient   \n\n  \nﬁle\0 name";
        assert_eq!(clean_pdf_text(raw), "efficient\nfile name");
    }
}
