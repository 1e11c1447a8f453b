//! # CSA Indexer
//!
//! File discovery and resumable-run bookkeeping.
//!
//! ## Pipeline
//!
//! ```text
//! Root directory
//!     │
//!     ├──> FileScanner (excluded dirs, extensions, globs, optional .gitignore)
//!     │      └─> SourceFile[] in lexicographic relative-path order
//!     │
//!     └──> Checkpoint (append-only JSON lines, exclusively locked)
//!            └─> completed relative paths, read once per run
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use csa_indexer::{default_checkpoint_path, Checkpoint, FileScanner, ScanOptions};
//!
//! fn main() -> csa_indexer::Result<()> {
//!     let root = std::path::Path::new("/path/to/project");
//!     let scan = FileScanner::new(root, ScanOptions::default())?.scan()?;
//!     let checkpoint = Checkpoint::open(default_checkpoint_path(root), true)?;
//!
//!     let pending = scan.files.iter().filter(|f| !checkpoint.contains(&f.relative_path));
//!     println!("{} files left", pending.count());
//!     Ok(())
//! }
//! ```

mod checkpoint;
mod error;
mod scanner;
mod stats;

pub use checkpoint::{
    default_checkpoint_path, read_checkpoint, state_dir_for_root, Checkpoint, CheckpointRecord,
};
pub use error::{IndexerError, Result};
pub use scanner::{
    relative_path, FileScanner, ScanOptions, ScanResult, SkipReason, SkippedFile, SourceFile,
    STATE_DIR_NAME,
};
pub use stats::ScanStats;
