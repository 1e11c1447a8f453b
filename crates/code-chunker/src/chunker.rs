use crate::config::{ChunkerConfig, ChunkingStrategy};
use crate::error::{ChunkerError, Result};
use crate::types::{CodeChunk, SourceText};
use std::path::Path;

/// Main chunker interface for processing code
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { config })
    }

    /// Lazily chunk a file's text. The returned iterator is `Clone`, and calling
    /// this again starts over from line 1.
    pub fn chunks<'a>(&self, text: &'a SourceText) -> Chunks<'a> {
        Chunks {
            text,
            strategy: self.config.strategy,
            chunk_size: self.config.chunk_size,
            next_line: 1,
            next_index: 0,
        }
    }

    /// Chunk code from a string
    pub fn chunk_str(&self, content: &str, file_path: &str) -> Vec<CodeChunk> {
        let text = SourceText::new(file_path, content);
        self.chunks(&text).collect()
    }

    /// Chunk code from a file
    pub fn chunk_file(&self, path: impl AsRef<Path>) -> Result<Vec<CodeChunk>> {
        let path = path.as_ref();
        let text = SourceText::read(path, path.to_string_lossy())?;
        Ok(self.chunks(&text).collect())
    }

    /// Get configuration
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Get chunking statistics
    pub fn get_stats(chunks: &[CodeChunk]) -> ChunkingStats {
        let total_chunks = chunks.len();
        let total_lines: usize = chunks.iter().map(CodeChunk::line_count).sum();
        let significant_lines: usize = chunks.iter().map(|c| c.significant_lines).sum();
        let largest_chunk_lines = chunks.iter().map(CodeChunk::line_count).max().unwrap_or(0);

        ChunkingStats {
            total_chunks,
            total_lines,
            significant_lines,
            avg_lines_per_chunk: if total_chunks > 0 {
                total_lines / total_chunks
            } else {
                0
            },
            largest_chunk_lines,
        }
    }
}

/// Iterator over the chunks of one [`SourceText`].
///
/// Chunk ranges partition `[1, line_count]`: ascending, no gaps, no overlaps.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a SourceText,
    strategy: ChunkingStrategy,
    chunk_size: usize,
    next_line: usize,
    next_index: usize,
}

impl Chunks<'_> {
    /// Last line of the chunk starting at `start`
    fn boundary(&self, start: usize) -> usize {
        let total = self.text.line_count();
        match self.strategy {
            ChunkingStrategy::LineCount => start.saturating_add(self.chunk_size - 1).min(total),
            ChunkingStrategy::SignificantLines => {
                let mut seen = 0;
                let mut line = start;
                while line <= total {
                    if self.text.is_significant(line) {
                        seen += 1;
                        if seen == self.chunk_size {
                            break;
                        }
                    }
                    line += 1;
                }
                let end = line.min(total);
                // Trailing blank/comment lines join the last chunk instead of
                // forming a chunk with nothing to analyze.
                if (end + 1..=total).all(|l| !self.text.is_significant(l)) {
                    total
                } else {
                    end
                }
            }
        }
    }
}

impl Iterator for Chunks<'_> {
    type Item = CodeChunk;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_line;
        if start > self.text.line_count() {
            return None;
        }

        let end = self.boundary(start);
        let significant_lines = (start..=end)
            .filter(|&line| self.text.is_significant(line))
            .count();
        let chunk = CodeChunk {
            file_path: self.text.file_path().to_string(),
            index: self.next_index,
            start_line: start,
            end_line: end,
            content: self.text.slice_lines(start, end).to_string(),
            significant_lines,
        };

        self.next_line = end + 1;
        self.next_index += 1;
        Some(chunk)
    }
}

/// Statistics about chunking results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingStats {
    pub total_chunks: usize,
    pub total_lines: usize,
    pub significant_lines: usize,
    pub avg_lines_per_chunk: usize,
    pub largest_chunk_lines: usize,
}

impl std::fmt::Display for ChunkingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunks: {}, Lines: {} ({} significant), Avg lines/chunk: {}, Largest: {}",
            self.total_chunks,
            self.total_lines,
            self.significant_lines,
            self.avg_lines_per_chunk,
            self.largest_chunk_lines
        )
    }
}
