use crate::scanner::SkipReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Statistics about a discovery scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Number of files accepted
    pub files: usize,

    /// Total lines across accepted files
    pub total_lines: usize,

    /// Accepted files per lowercase extension
    pub extensions: BTreeMap<String, usize>,

    pub skipped_binary: usize,
    pub skipped_too_large: usize,
    pub skipped_unreadable: usize,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, relative_path: &str, lines: usize) {
        self.files += 1;
        self.total_lines += lines;
        let ext = Path::new(relative_path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "none".to_string());
        *self.extensions.entry(ext).or_insert(0) += 1;
    }

    pub fn add_skipped(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::Binary => self.skipped_binary += 1,
            SkipReason::TooLarge { .. } => self.skipped_too_large += 1,
            SkipReason::Unreadable { .. } => self.skipped_unreadable += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_binary + self.skipped_too_large + self.skipped_unreadable
    }
}
