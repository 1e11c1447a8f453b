use crate::aggregator::FileAggregator;
use crate::cancel::CancelFlag;
use crate::chunk_analyzer::{ChunkAnalyzer, ChunkContext};
use crate::config::{AnalyzerConfig, FULL_PROMPT_CHUNKS, OVERSIZED_CONTEXT_RATIO};
use crate::error::{AnalyzerError, Result};
use crate::llm::LlmClient;
use crate::reporter::Reporter;
use crate::types::FileAnalysis;
use csa_code_chunker::{estimate_tokens, ChunkerError, Chunker, SourceText};
use csa_indexer::{default_checkpoint_path, Checkpoint, FileScanner, SourceFile};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Discovering,
    Processing,
    Finalizing,
    Terminal,
}

/// Counts reported when a run ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_discovered: usize,
    /// Skipped because an earlier run completed them
    pub files_already_complete: usize,
    pub files_completed: usize,
    /// Reported but cut short by cancellation
    pub files_partial: usize,
    /// Unreadable at processing time
    pub files_failed: usize,
    /// Left out by discovery (binary, too large, unreadable) and reported
    /// with a single issue
    pub files_skipped: usize,
    /// Never started because of cancellation
    pub files_not_started: usize,
    pub total_warnings: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Files from this run's work list that reached the reporter
    pub fn files_reported(&self) -> usize {
        self.files_completed + self.files_partial + self.files_failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} files analyzed ({} already complete, {} partial, {} failed, {} skipped, {} not started), {} warnings, {:.1}s{}",
            self.files_completed,
            self.files_discovered,
            self.files_already_complete,
            self.files_partial,
            self.files_failed,
            self.files_skipped,
            self.files_not_started,
            self.total_warnings,
            self.elapsed.as_secs_f64(),
            if self.cancelled { ", cancelled" } else { "" }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileStatus {
    Complete,
    Partial,
    Failed,
    /// Cancelled before any chunk got an answer; nothing to report
    NotStarted,
}

struct FileOutcome {
    analysis: FileAnalysis,
    status: FileStatus,
}

/// Chunk, analyse and aggregate one file. Shared by every worker.
struct FilePipeline {
    chunker: Chunker,
    analyzer: ChunkAnalyzer,
    aggregator: FileAggregator,
    cancel: CancelFlag,
}

impl FilePipeline {
    async fn process(&self, file: &SourceFile) -> FileOutcome {
        let text = match read_source(file).await {
            Ok(text) => text,
            Err(err) => {
                log::warn!("Cannot read {}: {err}", file.relative_path);
                return FileOutcome {
                    analysis: self.aggregator.unreadable(
                        &file.relative_path,
                        file.line_count,
                        err.to_string(),
                    ),
                    status: FileStatus::Failed,
                };
            }
        };

        let total_lines = text.line_count();
        let chunks = self.chunker.chunks(&text);
        let chunks_total = chunks.clone().count();
        let oversized = self.is_oversized(&text);

        let mut results = Vec::with_capacity(chunks_total);
        let mut partial = false;
        for chunk in chunks {
            if self.cancel.is_cancelled() {
                partial = true;
                break;
            }
            let context = ChunkContext {
                total_lines,
                structural_only: oversized && chunk.index >= FULL_PROMPT_CHUNKS,
            };
            let result = self.analyzer.analyze_chunk(&chunk, context, &self.cancel).await;
            let cancelled = result.was_cancelled();
            results.push(result);
            if cancelled {
                partial = true;
                break;
            }
        }

        let status = if !partial {
            FileStatus::Complete
        } else if results.iter().any(|r| r.attempts > 0) {
            FileStatus::Partial
        } else {
            FileStatus::NotStarted
        };

        FileOutcome {
            analysis: self.aggregator.aggregate(
                &file.relative_path,
                total_lines,
                chunks_total,
                results,
                partial,
            ),
            status,
        }
    }

    fn is_oversized(&self, text: &SourceText) -> bool {
        let Some(context_length) = self.analyzer.client().context_length() else {
            return false;
        };
        let tokens = estimate_tokens(text.content());
        let oversized = tokens as f64 > context_length as f64 * OVERSIZED_CONTEXT_RATIO;
        if oversized {
            log::info!(
                "{} is ~{tokens} tokens (context {context_length}); chunks after the first {FULL_PROMPT_CHUNKS} use structural-only prompts",
                text.file_path()
            );
        }
        oversized
    }
}

async fn read_source(file: &SourceFile) -> std::result::Result<SourceText, ChunkerError> {
    let bytes = tokio::fs::read(&file.path).await?;
    SourceText::from_bytes(file.relative_path.clone(), &bytes)
}

/// Drives one run: discovery, per-file analysis, reporting and
/// checkpointing.
///
/// Files are reported in discovery order and checkpointed right after the
/// reporter accepts them. Cancellation is cooperative: it is checked before
/// each file and each chunk, and an in-flight backend call is always allowed
/// to finish or time out.
pub struct RunController {
    root: PathBuf,
    config: AnalyzerConfig,
    client: Arc<dyn LlmClient>,
    reporter: Box<dyn Reporter>,
    cancel: CancelFlag,
    phase: RunPhase,
}

impl RunController {
    pub fn new(
        root: impl Into<PathBuf>,
        config: AnalyzerConfig,
        client: Arc<dyn LlmClient>,
        reporter: Box<dyn Reporter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: root.into(),
            config,
            client,
            reporter,
            cancel: CancelFlag::new(),
            phase: RunPhase::Idle,
        })
    }

    /// Share an existing cancellation signal (e.g. one wired to Ctrl-C)
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn enter(&mut self, phase: RunPhase) {
        log::debug!("Run phase {:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        self.enter(RunPhase::Discovering);

        let scanner = FileScanner::new(&self.root, self.config.scan.clone())
            .map_err(AnalyzerError::Discovery)?;
        let checkpoint_path = self
            .config
            .checkpoint_path
            .clone()
            .unwrap_or_else(|| default_checkpoint_path(&self.root));
        let mut checkpoint = Checkpoint::open(&checkpoint_path, self.config.resume)
            .map_err(AnalyzerError::Checkpoint)?;

        let scan = scanner.scan().map_err(AnalyzerError::Discovery)?;
        let files = scan.files;
        let pending: Vec<SourceFile> = files
            .iter()
            .filter(|f| !checkpoint.contains(&f.relative_path))
            .cloned()
            .collect();

        let mut summary = RunSummary {
            files_discovered: files.len(),
            files_already_complete: files.len() - pending.len(),
            ..RunSummary::default()
        };
        log::info!(
            "Discovered {} files under {} ({} already complete, {} to analyze)",
            summary.files_discovered,
            self.root.display(),
            summary.files_already_complete,
            pending.len()
        );

        self.reporter.initialize(&files, &pending, &self.root)?;

        self.enter(RunPhase::Processing);
        let pipeline = Arc::new(FilePipeline {
            chunker: Chunker::new(self.config.chunker.clone())?,
            analyzer: ChunkAnalyzer::new(
                Arc::clone(&self.client),
                self.config.chunk_analyzer_options(),
            ),
            aggregator: FileAggregator::new(self.config.description_merge.clone()),
            cancel: self.cancel.clone(),
        });

        for skipped in &scan.skipped {
            log::warn!("Skipping {}: {}", skipped.relative_path, skipped.reason);
            let analysis = pipeline
                .aggregator
                .skipped(&skipped.relative_path, skipped.reason.to_string());
            self.reporter.update(&analysis, &self.root, &pending)?;
            summary.files_skipped += 1;
            summary.total_warnings += analysis.issues.len();
        }

        let workers = self.config.effective_workers();
        if workers == 1 {
            self.process_sequential(&pipeline, &pending, &mut checkpoint, &mut summary)
                .await?;
        } else {
            log::info!("Processing with {workers} workers using {}", self.client.name());
            self.process_parallel(&pipeline, workers, &pending, &mut checkpoint, &mut summary)
                .await?;
        }

        summary.files_not_started = pending.len() - summary.files_reported();
        summary.cancelled = self.cancel.is_cancelled();
        if summary.cancelled {
            log::info!(
                "Run cancelled; {} files left for the next run",
                summary.files_not_started + summary.files_partial
            );
        }

        self.enter(RunPhase::Finalizing);
        self.reporter.finalize()?;

        summary.elapsed = started.elapsed();
        self.enter(RunPhase::Terminal);
        log::info!("{summary}");
        Ok(summary)
    }

    async fn process_sequential(
        &mut self,
        pipeline: &FilePipeline,
        pending: &[SourceFile],
        checkpoint: &mut Checkpoint,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for (index, file) in pending.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            log::info!(
                "File {}/{}: {}",
                index + 1,
                pending.len(),
                file.relative_path
            );
            let outcome = pipeline.process(file).await;
            self.record(outcome, &pending[index + 1..], checkpoint, summary)?;
        }
        Ok(())
    }

    /// Up to `workers` files in flight; results are consumed from the front
    /// of the window so reporting stays in discovery order.
    async fn process_parallel(
        &mut self,
        pipeline: &Arc<FilePipeline>,
        workers: usize,
        pending: &[SourceFile],
        checkpoint: &mut Checkpoint,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut window: VecDeque<(usize, JoinHandle<FileOutcome>)> =
            VecDeque::with_capacity(workers);
        let mut next = 0;

        loop {
            while window.len() < workers && next < pending.len() && !self.cancel.is_cancelled() {
                let file = pending[next].clone();
                log::info!("File {}/{}: {}", next + 1, pending.len(), file.relative_path);
                let pipeline = Arc::clone(pipeline);
                let handle = tokio::spawn(async move { pipeline.process(&file).await });
                window.push_back((next, handle));
                next += 1;
            }

            let Some((index, handle)) = window.pop_front() else {
                break;
            };
            let file = &pending[index];
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::error!("Worker for {} failed: {err}", file.relative_path);
                    FileOutcome {
                        analysis: pipeline.aggregator.worker_failed(
                            &file.relative_path,
                            file.line_count,
                            err.to_string(),
                        ),
                        status: FileStatus::Failed,
                    }
                }
            };

            if let Err(err) = self.record(outcome, &pending[index + 1..], checkpoint, summary) {
                self.cancel.cancel();
                for (_, handle) in window.drain(..) {
                    handle.abort();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Report a finished file and checkpoint it if it completed
    fn record(
        &mut self,
        outcome: FileOutcome,
        remaining: &[SourceFile],
        checkpoint: &mut Checkpoint,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let FileOutcome { analysis, status } = outcome;
        if status == FileStatus::NotStarted {
            log::debug!("{} not started before cancellation", analysis.path);
            return Ok(());
        }

        self.reporter.update(&analysis, &self.root, remaining)?;
        summary.total_warnings += analysis.issues.len();

        match status {
            FileStatus::Complete => {
                checkpoint
                    .record(&analysis.path)
                    .map_err(AnalyzerError::Checkpoint)?;
                summary.files_completed += 1;
            }
            FileStatus::Partial => summary.files_partial += 1,
            FileStatus::Failed => summary.files_failed += 1,
            FileStatus::NotStarted => {}
        }

        log::info!(
            "{}: {}/{} lines, {}/{} chunks{}{}",
            analysis.path,
            analysis.lines_analyzed,
            analysis.total_lines,
            analysis.chunks_analyzed,
            analysis.chunks_total,
            if analysis.degraded_chunks > 0 {
                format!(", {} degraded", analysis.degraded_chunks)
            } else {
                String::new()
            },
            match status {
                FileStatus::Partial => " (partial)",
                FileStatus::Failed => " (failed)",
                _ => "",
            }
        );
        Ok(())
    }
}
