use super::{LlmClient, LlmError, LlmResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5-coder:14b";

/// Model family prefixes and their context windows
const KNOWN_CONTEXT_LENGTHS: &[(&str, usize)] = &[
    ("qwen2.5-coder", 32_768),
    ("qwen2", 32_768),
    ("qwen", 32_768),
    ("llama3", 8_192),
    ("llama2", 4_096),
    ("mixtral", 32_768),
    ("mistral", 8_192),
    ("phi3", 4_096),
    ("gemma", 8_192),
    ("codellama", 16_384),
    ("vicuna", 4_096),
    ("wizardcoder", 16_384),
];

/// Context window for a model name such as `qwen2.5-coder:14b`
pub fn known_context_length(model: &str) -> Option<usize> {
    let base = model.split(':').next().unwrap_or(model).to_lowercase();
    KNOWN_CONTEXT_LENGTHS
        .iter()
        .find(|(prefix, _)| base.starts_with(prefix))
        .map(|(_, len)| *len)
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama-compatible `/api/generate` client
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    context_length: Option<usize>,
}

impl OllamaClient {
    /// `host` may omit the scheme (`localhost:11434`)
    pub fn new(host: &str, model: impl Into<String>) -> LlmResult<Self> {
        let model = model.into();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| LlmError::provider(format!("build HTTP client: {err}")))?;
        let context_length = known_context_length(&model);
        let base_url = normalize_host(host, DEFAULT_OLLAMA_HOST);
        log::info!("Using Ollama at {base_url} with model {model}");
        Ok(Self {
            http,
            base_url,
            model,
            context_length,
        })
    }

    /// Override the context window (for models missing from the table)
    pub fn with_context_length(mut self, tokens: usize) -> Self {
        self.context_length = Some(tokens);
        self
    }

    /// Ask the server for the model's context window (`/api/show`). The
    /// family table value is kept when the server cannot tell.
    pub async fn discover_context_length(mut self, timeout: Duration) -> Self {
        let url = format!("{}/api/show", self.base_url);
        let shown = async {
            let response = self
                .http
                .post(&url)
                .timeout(timeout)
                .json(&serde_json::json!({ "model": self.model }))
                .send()
                .await?
                .error_for_status()?;
            response.json::<serde_json::Value>().await
        }
        .await;

        match shown.as_ref().map(context_length_from_show) {
            Ok(Some(tokens)) => {
                log::info!("Context length for {}: {tokens} tokens", self.model);
                self.context_length = Some(tokens);
            }
            Ok(None) => log::debug!("{url} did not report a context length"),
            Err(err) => log::warn!("Could not query {url}: {err}"),
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn context_length(&self) -> Option<usize> {
        self.context_length
    }

    async fn analyze(&self, prompt: &str, timeout: Duration) -> LlmResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::provider(format!(
                "{url} returned {status}: {}",
                body.trim()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        Ok(body.response)
    }
}

/// `model_info` carries the window under an architecture-prefixed key such
/// as `qwen2.context_length`
fn context_length_from_show(shown: &serde_json::Value) -> Option<usize> {
    shown
        .get("model_info")?
        .as_object()?
        .iter()
        .find(|(key, _)| *key == "context_length" || key.ends_with(".context_length"))
        .and_then(|(_, value)| value.as_u64())
        .and_then(|tokens| usize::try_from(tokens).ok())
}

pub(super) fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(timeout)
    } else {
        LlmError::provider(err.to_string())
    }
}

pub(super) fn normalize_host(host: &str, default: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        default.to_string()
    } else if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_length_by_family() {
        assert_eq!(known_context_length("qwen2.5-coder:14b"), Some(32_768));
        assert_eq!(known_context_length("Llama3:8b"), Some(8_192));
        assert_eq!(known_context_length("mixtral"), Some(32_768));
        assert_eq!(known_context_length("something-new"), None);
    }

    #[test]
    fn host_normalization() {
        assert_eq!(
            normalize_host("localhost:11434", DEFAULT_OLLAMA_HOST),
            "http://localhost:11434"
        );
        assert_eq!(
            normalize_host("https://gpu-box:11434/", DEFAULT_OLLAMA_HOST),
            "https://gpu-box:11434"
        );
        assert_eq!(normalize_host("", DEFAULT_OLLAMA_HOST), DEFAULT_OLLAMA_HOST);
    }

    #[test]
    fn context_length_from_model_info() {
        let shown = serde_json::json!({
            "details": {"family": "qwen2"},
            "model_info": {
                "general.architecture": "qwen2",
                "qwen2.block_count": 48,
                "qwen2.context_length": 32768
            }
        });
        assert_eq!(context_length_from_show(&shown), Some(32_768));
        assert_eq!(
            context_length_from_show(&serde_json::json!({"model_info": {}})),
            None
        );
        assert_eq!(context_length_from_show(&serde_json::json!({})), None);
    }

    #[tokio::test]
    async fn failed_lookup_keeps_table_value() {
        let client = OllamaClient::new("127.0.0.1:9", "phi3:mini")
            .unwrap()
            .discover_context_length(Duration::from_secs(2))
            .await;
        assert_eq!(client.context_length(), Some(4_096));
    }

    #[test]
    fn client_construction() {
        let client = OllamaClient::new("10.0.0.5:11434", "phi3:mini").unwrap();
        assert_eq!(client.base_url(), "http://10.0.0.5:11434");
        assert_eq!(client.model(), "phi3:mini");
        assert_eq!(client.context_length(), Some(4_096));
        assert_eq!(client.with_context_length(2_048).context_length(), Some(2_048));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_provider_error() {
        let client = OllamaClient::new("127.0.0.1:9", DEFAULT_OLLAMA_MODEL).unwrap();
        let err = client
            .analyze("hello", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
