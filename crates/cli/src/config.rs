use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use csa_analyzer::{AnalyzerConfig, DescriptionMerge, RetryPolicy};
use csa_code_chunker::ChunkingStrategy;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeArg {
    /// Every chunk description, separated by line-range markers
    Concatenate,
    /// Only the first chunk's description
    First,
}

/// Run options. Anything left unset keeps the value from `--config` (or the
/// built-in default).
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// TOML file with analyzer settings
    #[arg(long, env = "CSA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report file
    #[arg(short, long, env = "CSA_OUTPUT_FILE")]
    pub output: Option<PathBuf>,

    /// Report format (markdown, jsonl)
    #[arg(long, env = "CSA_REPORTER")]
    pub reporter: Option<String>,

    /// Lines per chunk
    #[arg(short = 'c', long, env = "CSA_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Count only non-blank, non-comment lines towards the chunk size
    #[arg(long)]
    pub significant_lines: bool,

    /// File extensions to analyze
    #[arg(long, env = "CSA_FILE_EXTENSIONS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Gitignore-style patterns to include (overrides extensions)
    #[arg(long)]
    pub include: Vec<String>,

    /// Gitignore-style patterns to exclude
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Honour .gitignore files
    #[arg(long, env = "CSA_OBEY_GITIGNORE")]
    pub obey_gitignore: bool,

    /// Only analyze the top-level directory
    #[arg(long)]
    pub no_recursive: bool,

    /// Skip function extraction
    #[arg(long)]
    pub no_functions: bool,

    /// Skip dependency extraction
    #[arg(long)]
    pub no_dependencies: bool,

    /// Files analyzed concurrently
    #[arg(long, env = "CSA_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Attempts per chunk before it is marked as failed
    #[arg(long, env = "CSA_RETRIES")]
    pub retries: Option<u32>,

    /// Seconds allowed per backend call
    #[arg(long, env = "CSA_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Ignore earlier progress and analyze every file again
    #[arg(long)]
    pub fresh: bool,

    /// Checkpoint file (default: <source_dir>/.csa/checkpoint.jsonl)
    #[arg(long, env = "CSA_CHECKPOINT")]
    pub checkpoint: Option<PathBuf>,

    /// How chunk descriptions are combined per file
    #[arg(long, value_enum)]
    pub merge: Option<MergeArg>,
}

impl RunArgs {
    /// Config file first, then command-line overrides
    pub fn resolve(&self) -> Result<AnalyzerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_file(path)?,
            None => AnalyzerConfig::default(),
        };
        self.apply(&mut config);
        config
            .validate()
            .context("Invalid analyzer configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut AnalyzerConfig) {
        if let Some(output) = &self.output {
            config.reporter.output = output.clone();
        }
        if let Some(kind) = &self.reporter {
            config.reporter.kind = kind.trim().to_ascii_lowercase();
        }
        if let Some(size) = self.chunk_size {
            config.chunker.chunk_size = size;
        }
        if self.significant_lines {
            config.chunker.strategy = ChunkingStrategy::SignificantLines;
        }

        if let Some(extensions) = &self.extensions {
            config.scan.extensions = extensions
                .iter()
                .map(|ext| ext.trim().to_string())
                .filter(|ext| !ext.is_empty())
                .collect();
        }
        if !self.include.is_empty() {
            config.scan.include = self.include.clone();
        }
        config.scan.exclude.extend(self.exclude.iter().cloned());
        if self.obey_gitignore {
            config.scan.obey_ignore_files = true;
        }
        if self.no_recursive {
            config.scan.recursive = false;
        }

        if self.no_functions {
            config.include_functions = false;
        }
        if self.no_dependencies {
            config.include_dependencies = false;
        }
        if let Some(workers) = self.max_workers {
            config.max_workers = workers;
        }
        if let Some(retries) = self.retries {
            config.retry = RetryPolicy {
                max_attempts: retries,
                ..config.retry.clone()
            };
        }
        if let Some(secs) = self.timeout_secs {
            config.call_timeout_secs = secs;
        }
        if self.fresh {
            config.resume = false;
        }
        if let Some(path) = &self.checkpoint {
            config.checkpoint_path = Some(path.clone());
        }
        match self.merge {
            Some(MergeArg::Concatenate) => {
                if !matches!(config.description_merge, DescriptionMerge::Concatenate { .. }) {
                    config.description_merge = DescriptionMerge::default();
                }
            }
            Some(MergeArg::First) => config.description_merge = DescriptionMerge::FirstChunkOnly,
            None => {}
        }
    }
}

fn load_config_file(path: &Path) -> Result<AnalyzerConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Failed to parse config {}", path.display()))
}

pub fn render_config(config: &AnalyzerConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration")
}
