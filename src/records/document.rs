// Document text extraction: plain text, PDF and DOCX.
//
// DOCX is a zip archive; the body lives in word/document.xml. We read the
// text runs (<w:t>) paragraph by paragraph instead of pulling in a full XML
// parser, which is enough for chat exports.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex_lite::Regex;

use crate::error::TopicalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Pick the reader from the file extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self, TopicalError> {
        let ext = std::path::Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "md" | "log" | "csv" => Ok(DocumentKind::PlainText),
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            "" => Err(TopicalError::Validation(format!(
                "{file_name} has no extension; upload a .txt, .md, .log, .csv, .pdf or .docx file"
            ))),
            other => Err(TopicalError::Validation(format!(
                "Unsupported file type .{other}; upload a .txt, .md, .log, .csv, .pdf or .docx file"
            ))),
        }
    }
}

pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String> {
    match kind {
        DocumentKind::PlainText => {
            let text = std::str::from_utf8(bytes).context("file is not valid UTF-8 text")?;
            Ok(text.trim_start_matches('\u{feff}').to_string())
        }
        DocumentKind::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).context("failed to extract text from PDF")
        }
        DocumentKind::Docx => docx_text(bytes),
    }
}

static TEXT_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("static regex")
});

/// One line per non-empty paragraph of a .docx document.
fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("not a valid .docx (zip) file")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("word/document.xml missing from .docx")?
        .read_to_string(&mut xml)
        .context("failed to read word/document.xml")?;

    let paragraphs: Vec<String> = xml
        .split("</w:p>")
        .map(|para| {
            TEXT_RUN
                .captures_iter(para)
                .filter_map(|c| c.get(1))
                .map(|m| unescape_xml(m.as_str()))
                .collect::<String>()
        })
        .filter(|p| !p.trim().is_empty())
        .collect();

    Ok(paragraphs.join("\n"))
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        write!(
            writer,
            r#"<?xml version="1.0"?><w:document><w:body>{body}</w:body></w:document>"#
        )
        .unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(
            DocumentKind::from_file_name("chat.TXT").unwrap(),
            DocumentKind::PlainText
        );
        assert_eq!(DocumentKind::from_file_name("a.pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_file_name("a.docx").unwrap(), DocumentKind::Docx);
        assert!(DocumentKind::from_file_name("a.doc").is_err());
        assert!(DocumentKind::from_file_name("README").is_err());
    }

    #[test]
    fn test_plain_text_strips_bom() {
        let text = extract_text(DocumentKind::PlainText, "\u{feff}hello".as_bytes()).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_plain_text_rejects_invalid_utf8() {
        assert!(extract_text(DocumentKind::PlainText, &[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:t>10:00 alice: </w:t></w:r><w:r><w:t xml:space="preserve">budget &amp; plans</w:t></w:r></w:p>
               <w:p><w:r><w:tab/></w:r></w:p>
               <w:p><w:r><w:t>10:05 bob: agreed</w:t></w:r></w:p>"#,
        );
        let text = extract_text(DocumentKind::Docx, &bytes).unwrap();
        assert_eq!(text, "10:00 alice: budget & plans\n10:05 bob: agreed");
    }

    #[test]
    fn test_docx_garbage_is_error() {
        assert!(extract_text(DocumentKind::Docx, b"not a zip").is_err());
    }
}
