//! Text extraction from uploaded document bytes.

use std::path::Path;

use lopdf::Document;

use blueprint_shared::{BlueprintError, Result};

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_MARKDOWN: &str = "text/markdown";
pub const APPLICATION_PDF: &str = "application/pdf";

/// Content types [`DocumentExtractor`] accepts.
pub const SUPPORTED_CONTENT_TYPES: &[&str] = &[TEXT_PLAIN, TEXT_MARKDOWN, APPLICATION_PDF];

/// Turns raw bytes of a declared content type into plain text.
pub trait TextExtractor: Send + Sync {
    /// Fails with `UnsupportedFormat` for unknown types and `Decode` for
    /// malformed bytes.
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Extractor for plain text, markdown and PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl DocumentExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        match normalize_content_type(content_type).as_str() {
            TEXT_PLAIN | TEXT_MARKDOWN => extract_utf8(bytes),
            APPLICATION_PDF => extract_pdf(bytes),
            _ => Err(BlueprintError::unsupported_format(content_type)),
        }
    }
}

/// Strip parameters (`; charset=...`) and lowercase.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn extract_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| BlueprintError::decode(format!("text is not valid UTF-8: {e}")))
}

/// Extract page texts in page order, skipping pages with no text. A page
/// whose text cannot be read fails the whole document.
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| BlueprintError::decode(format!("failed to load PDF: {e}")))?;

    let pages = doc.get_pages();
    let mut page_numbers: Vec<u32> = pages.keys().copied().collect();
    page_numbers.sort_unstable();

    let mut parts = Vec::with_capacity(page_numbers.len());
    for page in page_numbers {
        let text = doc.extract_text(&[page]).map_err(|e| {
            BlueprintError::decode(format!("failed to extract text from page {page}: {e}"))
        })?;
        if !text.trim().is_empty() {
            parts.push(text);
        }
    }

    tracing::debug!(pages = pages.len(), with_text = parts.len(), "extracted PDF");
    Ok(parts.join("\n"))
}

/// Map a file extension to the content type the extractor expects.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "text" => Some(TEXT_PLAIN),
        "md" | "markdown" => Some(TEXT_MARKDOWN),
        "pdf" => Some(APPLICATION_PDF),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    fn single_page_pdf(text: &str) -> Vec<u8> {
        pdf_with_operations(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ])
    }

    fn pdf_with_operations(operations: Vec<Operation>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn plain_and_markdown_decode_utf8() {
        let extractor = DocumentExtractor::new();
        assert_eq!(extractor.extract("héllo".as_bytes(), TEXT_PLAIN).unwrap(), "héllo");
        assert_eq!(
            extractor.extract(b"# Title", "text/markdown; charset=utf-8").unwrap(),
            "# Title"
        );
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        let err = DocumentExtractor.extract(&[0xff, 0xfe, 0x00], TEXT_PLAIN).unwrap_err();
        assert!(matches!(err, BlueprintError::Decode { .. }));
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = DocumentExtractor.extract(b"\x89PNG", "image/png").unwrap_err();
        assert!(matches!(
            err,
            BlueprintError::UnsupportedFormat { ref content_type } if content_type == "image/png"
        ));
    }

    #[test]
    fn garbage_pdf_is_decode_error() {
        let err = DocumentExtractor.extract(b"not a pdf", APPLICATION_PDF).unwrap_err();
        assert!(matches!(err, BlueprintError::Decode { .. }));
    }

    #[test]
    fn pdf_text_is_extracted() {
        let bytes = single_page_pdf("Quarterly revenue grew");
        let text = DocumentExtractor.extract(&bytes, APPLICATION_PDF).unwrap();
        assert!(text.contains("Quarterly revenue grew"));
    }

    #[test]
    fn unreadable_pdf_page_fails_document() {
        // `Tf` without its font operand cannot be interpreted.
        let bytes = pdf_with_operations(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![]),
            Operation::new("Tj", vec![Object::string_literal("lost")]),
            Operation::new("ET", vec![]),
        ]);
        let err = DocumentExtractor.extract(&bytes, APPLICATION_PDF).unwrap_err();
        match err {
            BlueprintError::Decode { message } => assert!(message.contains("page 1"), "{message}"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn pdf_page_without_text_is_skipped() {
        let bytes = pdf_with_operations(vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])]);
        let text = DocumentExtractor.extract(&bytes, APPLICATION_PDF).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/notes.TXT")), Some(TEXT_PLAIN));
        assert_eq!(content_type_for_path(Path::new("README.md")), Some(TEXT_MARKDOWN));
        assert_eq!(content_type_for_path(Path::new("brief.pdf")), Some(APPLICATION_PDF));
        assert_eq!(content_type_for_path(Path::new("image.png")), None);
        assert_eq!(content_type_for_path(Path::new("Makefile")), None);
    }
}
