//! # CSA Code Chunker
//!
//! Line-accurate chunking of source files for LLM analysis.
//!
//! ## Guarantees
//!
//! For every file, the chunks produced:
//! - Partition `[1, line_count]` exactly (ascending, no gaps, no overlaps)
//! - Carry their original 1-indexed line numbers, whatever the strategy
//! - Reproduce the file byte-for-byte when concatenated
//!
//! ## Strategies
//!
//! ```text
//! LineCount         every line counts towards chunk_size
//! SignificantLines  only code lines count; blank/comment lines ride along
//! ```
//!
//! ## Example
//!
//! ```rust
//! use csa_code_chunker::{Chunker, ChunkerConfig, SourceText};
//!
//! let chunker = Chunker::new(ChunkerConfig::with_chunk_size(2)).unwrap();
//! let text = SourceText::new("example.py", "import os\n\ndef main():\n    pass\n");
//!
//! for chunk in chunker.chunks(&text) {
//!     println!("Chunk {} at lines {}-{}", chunk.index, chunk.start_line, chunk.end_line);
//! }
//! ```

mod chunker;
mod config;
mod error;
mod language;
mod types;

pub use chunker::{Chunker, ChunkingStats, Chunks};
pub use config::{ChunkerConfig, ChunkingStrategy, DEFAULT_CHUNK_SIZE};
pub use error::{ChunkerError, Result};
pub use language::Language;
pub use types::{estimate_tokens, CodeChunk, SourceText};
