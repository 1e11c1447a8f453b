use super::{LlmClient, LlmResult};
use crate::parse::heuristic;
use crate::prompt::PromptHeader;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Offline client that answers every prompt with well-formed JSON.
///
/// The description names the file and line range from the prompt header;
/// classes, functions and dependencies are whatever the line scanner finds
/// in the embedded code block.
#[derive(Debug, Clone, Default)]
pub struct StubClient {
    context_length: Option<usize>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_length(mut self, tokens: usize) -> Self {
        self.context_length = Some(tokens);
        self
    }
}

#[async_trait]
impl LlmClient for StubClient {
    fn name(&self) -> &str {
        "stub"
    }

    fn context_length(&self) -> Option<usize> {
        self.context_length
    }

    async fn analyze(&self, prompt: &str, _timeout: Duration) -> LlmResult<String> {
        let description = match PromptHeader::parse(prompt) {
            Some(header) => format!(
                "Stub analysis of {} lines {}-{}",
                header.file_name, header.start_line, header.end_line
            ),
            None => "Stub analysis".to_string(),
        };

        let code = fenced_code(prompt).unwrap_or_default();
        let found = heuristic::scan_code(code);

        Ok(json!({
            "description": description,
            "classes": found.classes,
            "functions": found.functions,
            "dependencies": found.dependencies,
        })
        .to_string())
    }
}

/// Body of the first fenced block
fn fenced_code(prompt: &str) -> Option<&str> {
    let open = prompt.find("```")?;
    let body_start = open + prompt[open..].find('\n')? + 1;
    let body_len = prompt[body_start..].find("\n```")?;
    Some(&prompt[body_start..body_start + body_len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{build_prompt, PromptRequest};
    use csa_code_chunker::CodeChunk;

    #[tokio::test]
    async fn answers_with_parseable_json() {
        let chunk = CodeChunk {
            file_path: "pkg/app.py".to_string(),
            index: 0,
            start_line: 1,
            end_line: 3,
            content: "import os\nclass App:\n    def run(self): pass\n".to_string(),
            significant_lines: 3,
        };
        let prompt = build_prompt(&PromptRequest {
            chunk: &chunk,
            total_lines: 3,
            structural_only: false,
            include_functions: true,
            include_dependencies: true,
        });

        let text = StubClient::new()
            .analyze(&prompt, Duration::from_secs(1))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["description"], "Stub analysis of app.py lines 1-3");
        assert_eq!(value["classes"], json!(["App"]));
        assert_eq!(value["functions"], json!(["run"]));
        assert_eq!(value["dependencies"], json!(["os"]));
    }
}
