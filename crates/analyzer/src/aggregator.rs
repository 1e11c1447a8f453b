use crate::types::{AnalysisWarning, ChunkAnalysisResult, FileAnalysis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_BOUNDARY_MARKER: &str = "--- lines {start}-{end} ---";

/// How chunk descriptions combine into the file description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DescriptionMerge {
    /// Every non-empty chunk description, each preceded by `marker`.
    /// `{start}`, `{end}` and `{index}` expand to the chunk's line range and
    /// 0-based index. A single description is used as-is.
    Concatenate { marker: String },

    /// Only the first non-empty chunk description
    FirstChunkOnly,
}

impl Default for DescriptionMerge {
    fn default() -> Self {
        Self::Concatenate {
            marker: DEFAULT_BOUNDARY_MARKER.to_string(),
        }
    }
}

/// Merges a file's chunk results into one [`FileAnalysis`]
#[derive(Debug, Clone, Default)]
pub struct FileAggregator {
    merge: DescriptionMerge,
}

impl FileAggregator {
    pub fn new(merge: DescriptionMerge) -> Self {
        Self { merge }
    }

    /// `results` should arrive in chunk order; they are sorted by chunk index
    /// regardless. `chunks_total` is how many chunks the file has, processed
    /// or not.
    pub fn aggregate(
        &self,
        path: &str,
        total_lines: usize,
        chunks_total: usize,
        mut results: Vec<ChunkAnalysisResult>,
        partial: bool,
    ) -> FileAnalysis {
        debug_assert!(
            results
                .windows(2)
                .all(|w| w[0].chunk_index < w[1].chunk_index),
            "chunk results out of order for {path}"
        );
        results.sort_by_key(|r| r.chunk_index);

        let mut classes = OrderedUnion::default();
        let mut functions = OrderedUnion::default();
        let mut dependencies = OrderedUnion::default();
        let mut issues = Vec::new();
        let mut lines_analyzed = 0;
        let mut chunks_analyzed = 0;
        let mut degraded_chunks = 0;

        for result in &results {
            if result.was_processed() {
                lines_analyzed += result.line_span();
                chunks_analyzed += 1;
                if result.degraded {
                    degraded_chunks += 1;
                }
            }
            classes.extend(&result.classes);
            functions.extend(&result.functions);
            dependencies.extend(&result.dependencies);
            issues.extend(result.warnings.iter().cloned());
        }

        FileAnalysis {
            path: path.to_string(),
            total_lines,
            lines_analyzed,
            description: self.merge_descriptions(&results),
            classes: classes.into_vec(),
            functions: functions.into_vec(),
            dependencies: dependencies.into_vec(),
            issues,
            chunks_analyzed,
            chunks_total,
            degraded_chunks,
            partial,
        }
    }

    /// Analysis for a file that could not be read at processing time
    pub fn unreadable(&self, path: &str, total_lines: usize, message: String) -> FileAnalysis {
        self.with_single_issue(path, total_lines, AnalysisWarning::UnreadableFile { message })
    }

    /// Analysis for a file discovery refused to hand over
    pub fn skipped(&self, path: &str, reason: String) -> FileAnalysis {
        self.with_single_issue(path, 0, AnalysisWarning::SkippedFile { reason })
    }

    /// Analysis for a file whose worker stopped abnormally
    pub fn worker_failed(&self, path: &str, total_lines: usize, message: String) -> FileAnalysis {
        self.with_single_issue(path, total_lines, AnalysisWarning::WorkerFailed { message })
    }

    fn with_single_issue(
        &self,
        path: &str,
        total_lines: usize,
        issue: AnalysisWarning,
    ) -> FileAnalysis {
        let mut analysis = self.aggregate(path, total_lines, 0, Vec::new(), false);
        analysis.issues.push(issue);
        analysis
    }

    fn merge_descriptions(&self, results: &[ChunkAnalysisResult]) -> String {
        let mut described = results
            .iter()
            .filter(|r| !r.description.trim().is_empty());

        match &self.merge {
            DescriptionMerge::FirstChunkOnly => described
                .next()
                .map(|r| r.description.trim().to_string())
                .unwrap_or_default(),
            DescriptionMerge::Concatenate { marker } => {
                let described: Vec<_> = described.collect();
                match described.as_slice() {
                    [] => String::new(),
                    [only] => only.description.trim().to_string(),
                    many => many
                        .iter()
                        .map(|r| {
                            format!(
                                "{}\n{}",
                                expand_marker(marker, r),
                                r.description.trim()
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                }
            }
        }
    }
}

fn expand_marker(marker: &str, result: &ChunkAnalysisResult) -> String {
    marker
        .replace("{start}", &result.start_line.to_string())
        .replace("{end}", &result.end_line.to_string())
        .replace("{index}", &result.chunk_index.to_string())
}

/// Union that keeps the first occurrence's position
#[derive(Default)]
struct OrderedUnion {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedUnion {
    fn extend<'a>(&mut self, items: impl IntoIterator<Item = &'a String>) {
        for item in items {
            if self.seen.insert(item.clone()) {
                self.items.push(item.clone());
            }
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}
