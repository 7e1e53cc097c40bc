// Chat records: turning uploaded text or documents into analysable lines.
//
// A record is one trimmed, non-trivial line. The analysis service only sees
// the first MAX_RECORDS of them, so we cut there rather than sending a
// prompt the model would truncate anyway.

pub mod document;

use crate::error::TopicalError;

pub use document::DocumentKind;

/// At most this many records are kept per submission.
pub const MAX_RECORDS: usize = 100;

/// Records this short or shorter (in characters) carry no topic signal.
pub const MIN_RECORD_CHARS: usize = 3;

/// Trim, drop short lines and keep the first MAX_RECORDS.
pub fn clean_and_limit<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let trimmed = line.as_ref().trim();
            (trimmed.chars().count() > MIN_RECORD_CHARS).then(|| trimmed.to_string())
        })
        .take(MAX_RECORDS)
        .collect()
}

/// Records from pasted text, one per line.
pub fn from_text(text: &str) -> Vec<String> {
    clean_and_limit(text.lines())
}

/// Records from an uploaded document. The extension decides how it's read.
pub fn from_document(file_name: &str, bytes: &[u8]) -> Result<Vec<String>, TopicalError> {
    let kind = DocumentKind::from_file_name(file_name)?;
    let text = document::extract_text(kind, bytes)
        .map_err(|e| TopicalError::Validation(format!("Could not read {file_name}: {e}")))?;
    Ok(from_text(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_drops_short_and_blank_lines() {
        let records = from_text("  hello world  \n\nok\nabc\nabcd\n   \n");
        assert_eq!(records, vec!["hello world", "abcd"]);
    }

    #[test]
    fn test_clean_counts_characters_not_bytes() {
        // three CJK characters are 9 bytes but still too short
        let records = from_text("你好吗\n你好吗？");
        assert_eq!(records, vec!["你好吗？"]);
    }

    #[test]
    fn test_clean_limits_to_max_records() {
        let text: String = (0..150).map(|i| format!("record number {i}\n")).collect();
        let records = from_text(&text);
        assert_eq!(records.len(), MAX_RECORDS);
        assert_eq!(records[0], "record number 0");
        assert_eq!(records[99], "record number 99");
    }

    #[test]
    fn test_unsupported_extension_is_validation_error() {
        let err = from_document("notes.xlsx", b"whatever").unwrap_err();
        assert!(matches!(err, TopicalError::Validation(_)));
    }
}
