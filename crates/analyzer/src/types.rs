use crate::parse::ParserStage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something that went wrong while analysing part of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// Cancellation was observed before this chunk got an answer
    CancelledBeforeCompletion { start_line: usize, end_line: usize },

    /// Every backend attempt failed
    BackendFailed {
        start_line: usize,
        end_line: usize,
        attempts: u32,
        message: String,
    },

    /// The response had no recognisable structure
    Unparseable { start_line: usize, end_line: usize },

    /// The response was not valid JSON; fields were recovered one by one
    TolerantParse { start_line: usize, end_line: usize },

    /// Only the line scanner could make sense of the response
    HeuristicParse { start_line: usize, end_line: usize },

    /// Discovery left the file out (binary, too large, unreadable)
    SkippedFile { reason: String },

    /// The file could not be read when its turn came
    UnreadableFile { message: String },

    /// A worker stopped abnormally while processing the file
    WorkerFailed { message: String },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CancelledBeforeCompletion {
                start_line,
                end_line,
            } => write!(
                f,
                "lines {start_line}-{end_line}: cancelled before analysis completed"
            ),
            Self::BackendFailed {
                start_line,
                end_line,
                attempts,
                message,
            } => write!(
                f,
                "lines {start_line}-{end_line}: backend failed after {attempts} attempt(s): {message}"
            ),
            Self::Unparseable {
                start_line,
                end_line,
            } => write!(
                f,
                "lines {start_line}-{end_line}: response could not be parsed"
            ),
            Self::TolerantParse {
                start_line,
                end_line,
            } => write!(
                f,
                "lines {start_line}-{end_line}: response was malformed JSON; fields were recovered individually"
            ),
            Self::HeuristicParse {
                start_line,
                end_line,
            } => write!(
                f,
                "lines {start_line}-{end_line}: no structured output found; results were scanned from free text"
            ),
            Self::SkippedFile { reason } => write!(f, "file skipped: {reason}"),
            Self::UnreadableFile { message } => write!(f, "file could not be read: {message}"),
            Self::WorkerFailed { message } => write!(f, "analysis worker failed: {message}"),
        }
    }
}

/// Outcome of analysing one chunk. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAnalysisResult {
    pub chunk_index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub description: String,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub dependencies: Vec<String>,
    pub warnings: Vec<AnalysisWarning>,
    /// Produced by a fallback stage or after retries ran out
    pub degraded: bool,
    /// Backend calls made for this chunk
    pub attempts: u32,
    pub parser: ParserStage,
}

impl ChunkAnalysisResult {
    /// A degraded result with no content
    pub fn degraded(
        chunk_index: usize,
        start_line: usize,
        end_line: usize,
        attempts: u32,
        warning: AnalysisWarning,
    ) -> Self {
        Self {
            chunk_index,
            start_line,
            end_line,
            description: String::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            dependencies: Vec::new(),
            warnings: vec![warning],
            degraded: true,
            attempts,
            parser: ParserStage::None,
        }
    }

    pub const fn line_span(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    /// The chunk got a final answer (content, exhausted retries, or an
    /// unparseable response) rather than being cut short by cancellation
    pub fn was_processed(&self) -> bool {
        self.attempts > 0 && !self.was_cancelled()
    }

    pub fn was_cancelled(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, AnalysisWarning::CancelledBeforeCompletion { .. }))
    }
}

/// Aggregated analysis of one file, handed to the reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Relative path (the file's identity)
    pub path: String,
    pub total_lines: usize,
    pub lines_analyzed: usize,
    pub description: String,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub dependencies: Vec<String>,
    pub issues: Vec<AnalysisWarning>,
    pub chunks_analyzed: usize,
    pub chunks_total: usize,
    pub degraded_chunks: usize,
    /// Cancellation stopped this file before its last chunk
    pub partial: bool,
}

impl FileAnalysis {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}
