//! # CSA Analyzer
//!
//! Resumable, chunked analysis of a source tree by a text-generation
//! backend.
//!
//! ```text
//! FileScanner ─▶ Chunker ─▶ ChunkAnalyzer ─▶ FileAggregator ─▶ Reporter
//!                               │                                 │
//!                         retry + parse chain               Checkpoint
//! ```
//!
//! [`RunController`] owns the run: it discovers files, skips the ones a
//! previous run already checkpointed, analyses the rest chunk by chunk,
//! reports each file in discovery order and appends it to the checkpoint.
//! Backend failures and malformed answers never abort a run; they turn into
//! degraded chunk results with warnings. Reporter and checkpoint failures
//! do abort it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use csa_analyzer::{AnalyzerConfig, ReporterRegistry, RunController, StubClient};
//! use std::sync::Arc;
//!
//! # async fn run() -> csa_analyzer::Result<()> {
//! let config = AnalyzerConfig::default();
//! let reporter = ReporterRegistry::default().create(&config.reporter)?;
//! let mut controller = RunController::new("./src", config, Arc::new(StubClient::new()), reporter)?;
//! let summary = controller.run().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod cancel;
mod chunk_analyzer;
mod config;
mod error;
pub mod llm;
pub mod parse;
mod prompt;
pub mod reporter;
mod retry;
mod runner;
mod types;

pub use aggregator::{DescriptionMerge, FileAggregator, DEFAULT_BOUNDARY_MARKER};
pub use cancel::CancelFlag;
pub use chunk_analyzer::{ChunkAnalyzer, ChunkAnalyzerOptions, ChunkContext};
pub use config::{AnalyzerConfig, MAX_WORKERS_LIMIT};
pub use error::{AnalyzerError, Result};
pub use llm::{LlmClient, LlmError, LmStudioClient, OllamaClient, StubClient};
pub use parse::{parse_response, ParsedAnalysis, ParserStage};
pub use prompt::{build_prompt, PromptHeader, PromptRequest};
pub use reporter::{Reporter, ReporterError, ReporterRegistry, ReporterSettings};
pub use retry::{retry_with_backoff, RetryOutcome, RetryPolicy};
pub use runner::{RunController, RunPhase, RunSummary};
pub use types::{AnalysisWarning, ChunkAnalysisResult, FileAnalysis};
