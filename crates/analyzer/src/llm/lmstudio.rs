use super::ollama::{map_reqwest_error, normalize_host};
use super::{LlmClient, LlmError, LlmResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_LMSTUDIO_HOST: &str = "http://localhost:1234";

/// Used when the server does not report the loaded model's window
pub const LMSTUDIO_FALLBACK_CONTEXT_LENGTH: usize = 8_192;

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// LM Studio client speaking the OpenAI-compatible `/v1/chat/completions`
/// API. Without a model name the server answers with whatever is loaded.
pub struct LmStudioClient {
    http: reqwest::Client,
    base_url: String,
    model: Option<String>,
    context_length: Option<usize>,
}

impl LmStudioClient {
    pub fn new(host: &str, model: Option<String>) -> LlmResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| LlmError::provider(format!("build HTTP client: {err}")))?;
        let base_url = normalize_host(host, DEFAULT_LMSTUDIO_HOST);
        match &model {
            Some(model) => log::info!("Using LM Studio at {base_url} with model {model}"),
            None => log::info!("Using LM Studio at {base_url} with the loaded model"),
        }
        Ok(Self {
            http,
            base_url,
            model,
            context_length: None,
        })
    }

    pub fn with_context_length(mut self, tokens: usize) -> Self {
        self.context_length = Some(tokens);
        self
    }

    /// Read the context window from `/api/v0/models`, falling back to
    /// [`LMSTUDIO_FALLBACK_CONTEXT_LENGTH`]
    pub async fn discover_context_length(mut self, timeout: Duration) -> Self {
        let url = format!("{}/api/v0/models", self.base_url);
        let listed = async {
            let response = self
                .http
                .get(&url)
                .timeout(timeout)
                .send()
                .await?
                .error_for_status()?;
            response.json::<serde_json::Value>().await
        }
        .await;

        let tokens = match listed {
            Ok(body) => context_length_from_models(&body, self.model.as_deref()),
            Err(err) => {
                log::warn!("Could not query {url}: {err}");
                None
            }
        };
        let tokens = tokens.unwrap_or_else(|| {
            log::warn!(
                "Context length unknown; assuming {LMSTUDIO_FALLBACK_CONTEXT_LENGTH} tokens"
            );
            LMSTUDIO_FALLBACK_CONTEXT_LENGTH
        });
        self.context_length = Some(tokens);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

#[async_trait]
impl LlmClient for LmStudioClient {
    fn name(&self) -> &str {
        "lmstudio"
    }

    fn context_length(&self) -> Option<usize> {
        self.context_length
    }

    async fn analyze(&self, prompt: &str, timeout: Duration) -> LlmResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.as_deref(),
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
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

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        first_message(body).ok_or_else(|| LlmError::provider(format!("{url} returned no choices")))
    }
}

fn first_message(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.and_then(|m| m.content).unwrap_or_default())
}

/// Pick the named model, or the first loaded one, and prefer the window it
/// was loaded with over its maximum
fn context_length_from_models(body: &serde_json::Value, model: Option<&str>) -> Option<usize> {
    let models = body.get("data")?.as_array()?;
    let entry = match model {
        Some(name) => models
            .iter()
            .find(|m| m.get("id").and_then(|id| id.as_str()) == Some(name))?,
        None => models
            .iter()
            .find(|m| m.get("state").and_then(|s| s.as_str()) == Some("loaded"))?,
    };
    ["loaded_context_length", "max_context_length"]
        .iter()
        .find_map(|key| entry.get(key).and_then(|v| v.as_u64()))
        .and_then(|tokens| usize::try_from(tokens).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn models() -> serde_json::Value {
        serde_json::json!({
            "object": "list",
            "data": [
                {"id": "text-embedding-nomic", "state": "not-loaded", "max_context_length": 2048},
                {"id": "qwen2.5-coder-7b", "state": "loaded",
                 "loaded_context_length": 16384, "max_context_length": 32768},
                {"id": "llama-3.1-8b", "state": "not-loaded", "max_context_length": 131072}
            ]
        })
    }

    #[test]
    fn loaded_model_window_is_used() {
        assert_eq!(context_length_from_models(&models(), None), Some(16_384));
        assert_eq!(
            context_length_from_models(&models(), Some("qwen2.5-coder-7b")),
            Some(16_384)
        );
    }

    #[test]
    fn named_model_falls_back_to_max_window() {
        assert_eq!(
            context_length_from_models(&models(), Some("llama-3.1-8b")),
            Some(131_072)
        );
        assert_eq!(context_length_from_models(&models(), Some("missing")), None);
        assert_eq!(
            context_length_from_models(&serde_json::json!({"data": []}), None),
            None
        );
    }

    #[test]
    fn chat_response_content() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"id":"c1","choices":[{"index":0,"message":{"role":"assistant","content":"{\"classes\":[]}"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(first_message(body).as_deref(), Some(r#"{"classes":[]}"#));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(first_message(empty), None);
    }

    #[test]
    fn request_omits_missing_model() {
        let request = ChatRequest {
            model: None,
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}], "stream": false})
        );
    }

    #[tokio::test]
    async fn unreachable_server_uses_fallback_window() {
        let client = LmStudioClient::new("127.0.0.1:9", None)
            .unwrap()
            .discover_context_length(Duration::from_secs(2))
            .await;
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
        assert_eq!(
            client.context_length(),
            Some(LMSTUDIO_FALLBACK_CONTEXT_LENGTH)
        );

        let err = client
            .analyze("hello", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
