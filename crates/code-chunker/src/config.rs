use serde::{Deserialize, Serialize};

/// Default number of lines per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Configuration for code chunking behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Chunking strategy to use
    pub strategy: ChunkingStrategy,

    /// Lines per chunk. Under [`ChunkingStrategy::SignificantLines`] only
    /// significant lines count towards this limit.
    pub chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::LineCount,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkerConfig {
    /// Plain line-count chunking with the given size
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Default::default()
        }
    }

    /// Denser chunks for prompts: blank and comment-only lines do not count
    pub fn significant_lines(chunk_size: usize) -> Self {
        Self {
            strategy: ChunkingStrategy::SignificantLines,
            chunk_size,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        Ok(())
    }
}

/// Strategy for placing chunk boundaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Every line counts towards the chunk size
    #[default]
    LineCount,

    /// Only non-blank, non-comment lines count towards the chunk size.
    /// Skipped lines still belong to a chunk so line numbers stay exact.
    SignificantLines,
}
