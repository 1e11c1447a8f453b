use crate::error::{ChunkerError, Result};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;

/// A file's decoded content with per-line byte offsets.
///
/// Lines keep their terminators, so concatenating every line reproduces the
/// content exactly. A trailing newline ends the last line; it does not start
/// an empty one.
#[derive(Debug, Clone)]
pub struct SourceText {
    file_path: String,
    language: Language,
    content: String,
    lines: Vec<Range<usize>>,
}

impl SourceText {
    /// Build from already-decoded text
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let content = content.into();
        let language = Language::from_path(&file_path);
        let lines = line_ranges(&content);
        Self {
            file_path,
            language,
            content,
            lines,
        }
    }

    /// Build from raw bytes, rejecting binary content and replacing invalid UTF-8
    pub fn from_bytes(file_path: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let file_path = file_path.into();
        if bytes.contains(&0) {
            return Err(ChunkerError::binary(file_path));
        }
        let content = String::from_utf8_lossy(bytes).into_owned();
        Ok(Self::new(file_path, content))
    }

    /// Read a file from disk. `display_path` is the name chunks will carry.
    pub fn read(path: impl AsRef<Path>, display_path: impl Into<String>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(display_path, &bytes)
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub const fn language(&self) -> Language {
        self.language
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Number of lines in the file
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line `number` (1-indexed) including its terminator
    pub fn line(&self, number: usize) -> Option<&str> {
        let range = self.lines.get(number.checked_sub(1)?)?;
        Some(&self.content[range.clone()])
    }

    /// Text of lines `start..=end` (1-indexed, inclusive)
    pub fn slice_lines(&self, start: usize, end: usize) -> &str {
        if start == 0 || start > end || end > self.lines.len() {
            return "";
        }
        let from = self.lines[start - 1].start;
        let to = self.lines[end - 1].end;
        &self.content[from..to]
    }

    /// Whether line `number` (1-indexed) carries code for this file's language
    pub fn is_significant(&self, number: usize) -> bool {
        self.line(number)
            .is_some_and(|line| self.language.is_significant_line(line))
    }
}

fn line_ranges(content: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for (idx, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            ranges.push(start..idx + 1);
            start = idx + 1;
        }
    }
    if start < content.len() {
        ranges.push(start..content.len());
    }
    ranges
}

/// A bounded, line-addressed slice of one file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChunk {
    /// Source file path
    pub file_path: String,

    /// Position of this chunk within its file (0-indexed)
    pub index: usize,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// The actual code content, line terminators included
    pub content: String,

    /// Lines in this chunk that are neither blank nor comment-only
    pub significant_lines: usize,
}

impl CodeChunk {
    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Check if chunk contains a specific line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    /// Rough token estimate: 4 chars per token on average for code
    #[must_use]
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// Rough token estimate for arbitrary text (~4 bytes per token)
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    (content.len() / 4).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk(start: usize, end: usize) -> CodeChunk {
        CodeChunk {
            file_path: "test.rs".to_string(),
            index: 0,
            start_line: start,
            end_line: end,
            content: "code".to_string(),
            significant_lines: 1,
        }
    }

    #[test]
    fn test_chunk_line_count() {
        assert_eq!(chunk(10, 15).line_count(), 6);
        assert_eq!(chunk(3, 3).line_count(), 1);
    }

    #[test]
    fn test_chunk_contains_line() {
        let chunk = chunk(10, 15);
        assert!(chunk.contains_line(10));
        assert!(chunk.contains_line(12));
        assert!(chunk.contains_line(15));
        assert!(!chunk.contains_line(9));
        assert!(!chunk.contains_line(16));
    }

    #[test]
    fn test_line_accounting() {
        assert_eq!(SourceText::new("a.py", "").line_count(), 0);
        assert_eq!(SourceText::new("a.py", "x").line_count(), 1);
        assert_eq!(SourceText::new("a.py", "x\n").line_count(), 1);
        assert_eq!(SourceText::new("a.py", "x\n\n").line_count(), 2);
        assert_eq!(SourceText::new("a.py", "x\r\ny\r\n").line_count(), 2);
    }

    #[test]
    fn test_slice_lines_keeps_terminators() {
        let text = SourceText::new("a.py", "one\ntwo\r\nthree");
        assert_eq!(text.line(2), Some("two\r\n"));
        assert_eq!(text.slice_lines(2, 3), "two\r\nthree");
        assert_eq!(text.slice_lines(1, 3), text.content());
        assert_eq!(text.slice_lines(3, 4), "");
        assert_eq!(text.line(0), None);
    }

    #[test]
    fn test_binary_rejected_and_lossy_decode() {
        assert!(matches!(
            SourceText::from_bytes("blob.cs", b"ab\0cd"),
            Err(ChunkerError::BinaryContent(_))
        ));
        let text = SourceText::from_bytes("latin.cs", b"caf\xe9\n").expect("lossy decode");
        assert_eq!(text.line_count(), 1);
        assert!(text.content().starts_with("caf"));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("fn main() { println!(\"Hello\"); }"), 8);
    }
}
