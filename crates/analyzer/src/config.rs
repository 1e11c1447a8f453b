use crate::aggregator::DescriptionMerge;
use crate::chunk_analyzer::ChunkAnalyzerOptions;
use crate::error::{AnalyzerError, Result};
use crate::reporter::ReporterSettings;
use crate::retry::RetryPolicy;
use csa_code_chunker::ChunkerConfig;
use csa_indexer::ScanOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const MAX_WORKERS_LIMIT: usize = 32;

/// Chunks past this index use the structural-only prompt for oversized files
pub const FULL_PROMPT_CHUNKS: usize = 2;

/// Estimated file tokens above this share of the context window mark the
/// file as oversized
pub const OVERSIZED_CONTEXT_RATIO: f64 = 0.8;

/// Everything a run needs, built once and handed to the run controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub chunker: ChunkerConfig,
    pub scan: ScanOptions,
    pub retry: RetryPolicy,

    /// Per backend call
    pub call_timeout_secs: u64,

    /// Files processed concurrently; 1 means strictly sequential
    pub max_workers: usize,

    pub description_merge: DescriptionMerge,
    pub include_functions: bool,
    pub include_dependencies: bool,

    /// Skip files recorded in the checkpoint; `false` starts over
    pub resume: bool,

    /// Defaults to `<root>/.csa/checkpoint.jsonl`
    pub checkpoint_path: Option<PathBuf>,

    pub reporter: ReporterSettings,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            scan: ScanOptions::default(),
            retry: RetryPolicy::default(),
            call_timeout_secs: 60,
            max_workers: 1,
            description_merge: DescriptionMerge::default(),
            include_functions: true,
            include_dependencies: true,
            resume: true,
            checkpoint_path: None,
            reporter: ReporterSettings::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunker
            .validate()
            .map_err(AnalyzerError::invalid_config)?;
        self.retry.validate().map_err(AnalyzerError::invalid_config)?;

        if self.call_timeout_secs == 0 {
            return Err(AnalyzerError::invalid_config(
                "call_timeout_secs must be at least 1",
            ));
        }
        if self.max_workers == 0 {
            return Err(AnalyzerError::invalid_config(
                "max_workers must be at least 1",
            ));
        }
        if self.scan.include.is_empty() && self.scan.extensions.is_empty() {
            return Err(AnalyzerError::invalid_config(
                "no file extensions or include patterns configured",
            ));
        }
        if self.reporter.kind.trim().is_empty() {
            return Err(AnalyzerError::invalid_config("reporter.kind is empty"));
        }
        if let DescriptionMerge::Concatenate { marker } = &self.description_merge {
            if marker.trim().is_empty() {
                return Err(AnalyzerError::invalid_config(
                    "description_merge.marker is empty",
                ));
            }
        }
        Ok(())
    }

    /// `max_workers` clamped to the supported range
    pub fn effective_workers(&self) -> usize {
        self.max_workers.clamp(1, MAX_WORKERS_LIMIT)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn chunk_analyzer_options(&self) -> ChunkAnalyzerOptions {
        ChunkAnalyzerOptions {
            retry: self.retry.clone(),
            call_timeout: self.call_timeout(),
            include_functions: self.include_functions,
            include_dependencies: self.include_dependencies,
        }
    }
}
