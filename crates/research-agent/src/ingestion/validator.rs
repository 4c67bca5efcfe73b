//! Upload validation: extension allow-list, size limit, and file signatures
//! checked against the declared type

use crate::error::{Error, Result};
use crate::types::FileType;

/// Bytes inspected when deciding whether a file is UTF-8 text
const TEXT_PROBE_BYTES: usize = 1024;

/// PDF file signature
const PDF_MAGIC: &[u8] = b"%PDF";

/// Resolve the declared type of an uploaded filename against the allow-list
pub fn validate_extension(filename: &str) -> Result<FileType> {
    FileType::from_filename(filename).ok_or_else(|| {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();
        Error::UnsupportedFileType(ext)
    })
}

/// Fail once the running byte count passes the configured maximum
pub fn check_size(size: u64, max_bytes: u64) -> Result<()> {
    if size > max_bytes {
        return Err(Error::FileTooLarge { max_bytes });
    }
    Ok(())
}

/// Whether the leading bytes of an upload agree with its declared type.
///
/// PDFs must carry the `%PDF` header. Text and Markdown must not, and their
/// first KiB must decode as UTF-8; a multi-byte sequence cut off by the probe
/// window still counts as text.
pub fn matches_declared_type(file_type: FileType, head: &[u8]) -> bool {
    match file_type {
        FileType::Pdf => head.starts_with(PDF_MAGIC),
        FileType::Txt | FileType::Markdown => !head.starts_with(PDF_MAGIC) && looks_like_text(head),
    }
}

fn looks_like_text(head: &[u8]) -> bool {
    let probe = &head[..head.len().min(TEXT_PROBE_BYTES)];
    match std::str::from_utf8(probe) {
        Ok(_) => true,
        // error_len() is None when the input just ends mid-character
        Err(e) => e.error_len().is_none() && probe.len() == TEXT_PROBE_BYTES,
    }
}

/// Content check with the declared filename included in the error
pub fn validate_content(file_type: FileType, filename: &str, head: &[u8]) -> Result<()> {
    if matches_declared_type(file_type, head) {
        Ok(())
    } else {
        Err(Error::InvalidFileContent(filename.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allow_list() {
        assert_eq!(validate_extension("report.pdf").unwrap(), FileType::Pdf);
        assert_eq!(validate_extension("NOTES.MD").unwrap(), FileType::Markdown);

        match validate_extension("setup.exe") {
            Err(Error::UnsupportedFileType(ext)) => assert_eq!(ext, ".exe"),
            other => panic!("unexpected: {:?}", other),
        }
        tokio_test::assert_err!(validate_extension("no_extension"));
    }

    #[test]
    fn test_size_limit() {
        let max = 10 * 1024 * 1024;
        tokio_test::assert_ok!(check_size(max, max));
        tokio_test::assert_ok!(check_size(0, max));
        assert!(matches!(
            check_size(max + 1, max),
            Err(Error::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_pdf_signature() {
        assert!(matches_declared_type(FileType::Pdf, b"%PDF-1.7\n%\xe2\xe3"));
        assert!(!matches_declared_type(FileType::Pdf, b"just plain text"));
        assert!(!matches_declared_type(FileType::Pdf, b""));
        assert!(!matches_declared_type(FileType::Pdf, &[0x89, b'P', b'N', b'G', 0xff, 0x00]));
    }

    #[test]
    fn test_text_signature() {
        assert!(matches_declared_type(FileType::Markdown, "# Heading\n\nplain text".as_bytes()));
        assert!(matches_declared_type(FileType::Txt, "caf\u{e9} au lait".as_bytes()));
        assert!(matches_declared_type(FileType::Txt, b""));
        assert!(!matches_declared_type(FileType::Txt, &[0x89, b'P', b'N', b'G', 0xff, 0x00]));
        assert!(!matches_declared_type(FileType::Txt, b"%PDF-1.4\n\xff\xfe\x00binary"));
        assert!(!matches_declared_type(FileType::Markdown, b"%PDF-1.7\n"));
    }

    #[test]
    fn test_utf8_split_at_probe_boundary() {
        // 1023 ASCII bytes followed by the first byte of a 2-byte character
        let mut head = vec![b'a'; TEXT_PROBE_BYTES - 1];
        head.extend_from_slice("é".as_bytes());
        assert!(matches_declared_type(FileType::Txt, &head));

        head.truncate(10);
        head.push(0xc3);
        assert!(!matches_declared_type(FileType::Txt, &head));
    }

    #[test]
    fn test_validate_content_error() {
        let err = validate_content(FileType::Pdf, "fake.pdf", b"just plain text").unwrap_err();
        assert!(matches!(err, Error::InvalidFileContent(name) if name == "fake.pdf"));
        tokio_test::assert_ok!(validate_content(FileType::Txt, "notes.txt", b"hello"));
    }
}
