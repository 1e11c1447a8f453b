use crate::cancel::CancelFlag;
use crate::llm::{LlmClient, LlmError};
use crate::parse::{parse_response, ParserStage};
use crate::prompt::{build_prompt, PromptRequest};
use crate::retry::{retry_with_backoff, RetryOutcome, RetryPolicy};
use crate::types::{AnalysisWarning, ChunkAnalysisResult};
use csa_code_chunker::CodeChunk;
use std::sync::Arc;
use std::time::Duration;

/// Knobs for a single chunk analysis
#[derive(Debug, Clone)]
pub struct ChunkAnalyzerOptions {
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
    pub include_functions: bool,
    pub include_dependencies: bool,
}

impl Default for ChunkAnalyzerOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(60),
            include_functions: true,
            include_dependencies: true,
        }
    }
}

/// Per-file facts the prompt needs
#[derive(Debug, Clone, Copy)]
pub struct ChunkContext {
    pub total_lines: usize,
    pub structural_only: bool,
}

/// Sends chunks to the backend and turns whatever comes back into a
/// [`ChunkAnalysisResult`]. Never fails: backend errors, timeouts and
/// unparseable answers all become degraded results.
#[derive(Clone)]
pub struct ChunkAnalyzer {
    client: Arc<dyn LlmClient>,
    options: ChunkAnalyzerOptions,
}

impl ChunkAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>, options: ChunkAnalyzerOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &dyn LlmClient {
        self.client.as_ref()
    }

    pub async fn analyze_chunk(
        &self,
        chunk: &CodeChunk,
        context: ChunkContext,
        cancel: &CancelFlag,
    ) -> ChunkAnalysisResult {
        let prompt = build_prompt(&PromptRequest {
            chunk,
            total_lines: context.total_lines,
            structural_only: context.structural_only,
            include_functions: self.options.include_functions,
            include_dependencies: self.options.include_dependencies,
        });
        let prompt = prompt.as_str();
        let timeout = self.options.call_timeout;
        let (start_line, end_line) = (chunk.start_line, chunk.end_line);

        log::debug!(
            "Analyzing {} lines {start_line}-{end_line} ({} tokens est.)",
            chunk.file_path,
            chunk.estimated_tokens()
        );

        let outcome = retry_with_backoff(
            &self.options.retry,
            cancel,
            LlmError::is_retryable,
            |attempt| {
                let client = Arc::clone(&self.client);
                async move {
                    if attempt > 1 {
                        log::debug!("Attempt {attempt} for lines {start_line}-{end_line}");
                    }
                    match tokio::time::timeout(timeout, client.analyze(prompt, timeout)).await {
                        Ok(result) => result,
                        Err(_) => Err(LlmError::Timeout(timeout)),
                    }
                }
            },
        )
        .await;

        let attempts = outcome.attempts();
        let result = match outcome {
            RetryOutcome::Succeeded { value, .. } => self.interpret(chunk, &value, attempts),
            RetryOutcome::Exhausted { error, .. } | RetryOutcome::NotRetryable { error, .. } => {
                log::warn!(
                    "Giving up on {} lines {start_line}-{end_line} after {attempts} attempt(s): {error}",
                    chunk.file_path
                );
                ChunkAnalysisResult::degraded(
                    chunk.index,
                    start_line,
                    end_line,
                    attempts,
                    AnalysisWarning::BackendFailed {
                        start_line,
                        end_line,
                        attempts,
                        message: error.to_string(),
                    },
                )
            }
            RetryOutcome::Cancelled { .. } => ChunkAnalysisResult::degraded(
                chunk.index,
                start_line,
                end_line,
                attempts,
                AnalysisWarning::CancelledBeforeCompletion {
                    start_line,
                    end_line,
                },
            ),
        };

        if result.degraded {
            log::debug!(
                "Lines {start_line}-{end_line} of {} degraded ({})",
                chunk.file_path,
                result.parser
            );
        }
        result
    }

    fn interpret(&self, chunk: &CodeChunk, text: &str, attempts: u32) -> ChunkAnalysisResult {
        let (start_line, end_line) = (chunk.start_line, chunk.end_line);
        let Some((stage, mut parsed)) = parse_response(text) else {
            return ChunkAnalysisResult::degraded(
                chunk.index,
                start_line,
                end_line,
                attempts,
                AnalysisWarning::Unparseable {
                    start_line,
                    end_line,
                },
            );
        };

        if !self.options.include_functions {
            parsed.functions.clear();
        }
        if !self.options.include_dependencies {
            parsed.dependencies.clear();
        }

        let warnings = match stage {
            ParserStage::Tolerant => vec![AnalysisWarning::TolerantParse {
                start_line,
                end_line,
            }],
            ParserStage::Heuristic => vec![AnalysisWarning::HeuristicParse {
                start_line,
                end_line,
            }],
            ParserStage::Strict | ParserStage::None => Vec::new(),
        };

        ChunkAnalysisResult {
            chunk_index: chunk.index,
            start_line,
            end_line,
            description: parsed.description,
            classes: parsed.classes,
            functions: parsed.functions,
            dependencies: parsed.dependencies,
            warnings,
            degraded: stage.is_degraded(),
            attempts,
            parser: stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResult;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned answers in order
    struct Scripted {
        answers: Mutex<VecDeque<LlmResult<String>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(answers: Vec<LlmResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn analyze(&self, _prompt: &str, timeout: Duration) -> LlmResult<String> {
            *self.calls.lock().unwrap() += 1;
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::Timeout(timeout)))
        }
    }

    struct Hangs;

    #[async_trait]
    impl LlmClient for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }

        async fn analyze(&self, _prompt: &str, _timeout: Duration) -> LlmResult<String> {
            std::future::pending().await
        }
    }

    fn chunk() -> CodeChunk {
        CodeChunk {
            file_path: "lib/util.py".to_string(),
            index: 2,
            start_line: 401,
            end_line: 450,
            content: "def foo():\n    pass\n".to_string(),
            significant_lines: 2,
        }
    }

    fn context() -> ChunkContext {
        ChunkContext {
            total_lines: 450,
            structural_only: false,
        }
    }

    fn analyzer(client: Arc<dyn LlmClient>, attempts: u32) -> ChunkAnalyzer {
        ChunkAnalyzer::new(
            client,
            ChunkAnalyzerOptions {
                retry: RetryPolicy::immediate(attempts),
                call_timeout: Duration::from_secs(5),
                ..ChunkAnalyzerOptions::default()
            },
        )
    }

    const GOOD: &str = r#"{"description": "Utility helpers", "classes": [], "functions": ["foo()"], "dependencies": []}"#;

    #[tokio::test]
    async fn two_failures_then_success() {
        let client = Scripted::new(vec![
            Err(LlmError::Timeout(Duration::from_secs(5))),
            Err(LlmError::provider("503")),
            Ok(GOOD.to_string()),
        ]);
        let result = analyzer(client.clone(), 3)
            .analyze_chunk(&chunk(), context(), &CancelFlag::new())
            .await;

        assert_eq!(client.calls(), 3);
        assert!(!result.degraded);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.parser, ParserStage::Strict);
        assert_eq!(result.functions, vec!["foo()"]);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_degrade_with_line_range() {
        let client = Scripted::new(vec![]);
        let result = analyzer(client.clone(), 3)
            .analyze_chunk(&chunk(), context(), &CancelFlag::new())
            .await;

        assert_eq!(client.calls(), 3);
        assert!(result.degraded);
        assert_eq!(result.chunk_index, 2);
        assert!(matches!(
            result.warnings.as_slice(),
            [AnalysisWarning::BackendFailed {
                start_line: 401,
                end_line: 450,
                attempts: 3,
                ..
            }]
        ));
        assert!(result.warnings[0].to_string().contains("lines 401-450"));
    }

    #[tokio::test]
    async fn cancelled_before_first_attempt() {
        let client = Scripted::new(vec![Ok(GOOD.to_string())]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = analyzer(client.clone(), 3)
            .analyze_chunk(&chunk(), context(), &cancel)
            .await;

        assert_eq!(client.calls(), 0);
        assert!(result.degraded);
        assert!(result.was_cancelled());
        assert!(!result.was_processed());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_client_times_out() {
        let analyzer = ChunkAnalyzer::new(
            Arc::new(Hangs),
            ChunkAnalyzerOptions {
                retry: RetryPolicy::immediate(2),
                call_timeout: Duration::from_millis(50),
                ..ChunkAnalyzerOptions::default()
            },
        );
        let result = analyzer
            .analyze_chunk(&chunk(), context(), &CancelFlag::new())
            .await;
        assert!(result.degraded);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn prose_answer_is_degraded_but_kept() {
        let client = Scripted::new(vec![Ok(
            "The chunk declares the `foo()` helper.".to_string()
        )]);
        let result = analyzer(client, 3)
            .analyze_chunk(&chunk(), context(), &CancelFlag::new())
            .await;

        assert!(result.degraded);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.parser, ParserStage::Heuristic);
        assert_eq!(result.functions, vec!["foo"]);
        assert!(matches!(
            result.warnings.as_slice(),
            [AnalysisWarning::HeuristicParse { .. }]
        ));
    }

    #[tokio::test]
    async fn malformed_json_is_recovered_but_flagged() {
        let client = Scripted::new(vec![Ok(
            "{\"description\": \"x\", \"classes\": [\"A\",],".to_string()
        )]);
        let result = analyzer(client, 3)
            .analyze_chunk(&chunk(), context(), &CancelFlag::new())
            .await;

        assert!(result.degraded);
        assert_eq!(result.parser, ParserStage::Tolerant);
        assert_eq!(result.description, "x");
        assert_eq!(result.classes, vec!["A"]);
        assert!(matches!(
            result.warnings.as_slice(),
            [AnalysisWarning::TolerantParse {
                start_line: 401,
                end_line: 450,
            }]
        ));
    }

    #[tokio::test]
    async fn empty_answer_is_not_retried() {
        let client = Scripted::new(vec![Ok("   ".to_string()), Ok(GOOD.to_string())]);
        let result = analyzer(client.clone(), 3)
            .analyze_chunk(&chunk(), context(), &CancelFlag::new())
            .await;
        assert_eq!(client.calls(), 1);
        assert!(result.degraded);
        assert!(matches!(
            result.warnings.as_slice(),
            [AnalysisWarning::Unparseable { .. }]
        ));
    }

    #[tokio::test]
    async fn disabled_fields_are_cleared() {
        let client = Scripted::new(vec![Ok(
            r#"{"description": "d", "classes": ["A"], "functions": ["f"], "dependencies": ["os"]}"#
                .to_string(),
        )]);
        let analyzer = ChunkAnalyzer::new(
            client,
            ChunkAnalyzerOptions {
                retry: RetryPolicy::immediate(1),
                include_functions: false,
                include_dependencies: false,
                ..ChunkAnalyzerOptions::default()
            },
        );
        let result = analyzer
            .analyze_chunk(&chunk(), context(), &CancelFlag::new())
            .await;
        assert_eq!(result.classes, vec!["A"]);
        assert!(result.functions.is_empty());
        assert!(result.dependencies.is_empty());
    }
}
