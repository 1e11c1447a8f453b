use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use csa_analyzer::llm::{DEFAULT_LMSTUDIO_HOST, DEFAULT_OLLAMA_HOST, DEFAULT_OLLAMA_MODEL};
use csa_analyzer::{LlmClient, LmStudioClient, OllamaClient, StubClient};
use std::sync::Arc;
use std::time::Duration;

/// Forces the offline stub backend regardless of `--llm-provider`
const MODE_ENV: &str = "CSA_LLM_MODE";

/// Budget for asking the server about the model's context window
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// LM Studio's OpenAI-compatible server
    #[value(name = "lmstudio")]
    LmStudio,
    /// Ollama-compatible HTTP server
    Ollama,
    /// Deterministic offline backend (tests, dry runs)
    Stub,
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Text-generation backend
    #[arg(long, env = "CSA_LLM_PROVIDER", value_enum, default_value_t = Provider::LmStudio)]
    pub llm_provider: Provider,

    /// LM Studio host; the scheme is optional
    #[arg(long, env = "LMSTUDIO_HOST", default_value = DEFAULT_LMSTUDIO_HOST)]
    pub lmstudio_host: String,

    /// Model to request from LM Studio; defaults to whichever is loaded
    #[arg(long, env = "LMSTUDIO_MODEL")]
    pub lmstudio_model: Option<String>,

    /// Ollama host; the scheme is optional
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_HOST)]
    pub ollama_host: String,

    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_OLLAMA_MODEL)]
    pub ollama_model: String,

    /// Context window in tokens; skips asking the server
    #[arg(long, env = "CSA_CONTEXT_LENGTH")]
    pub context_length: Option<usize>,
}

impl BackendArgs {
    fn provider(&self) -> Provider {
        match std::env::var(MODE_ENV) {
            Ok(mode) if mode.eq_ignore_ascii_case("stub") => Provider::Stub,
            _ => self.llm_provider,
        }
    }
}

pub async fn build_client(args: &BackendArgs) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match args.provider() {
        Provider::Stub => {
            log::info!("Using stub backend");
            let mut client = StubClient::new();
            if let Some(tokens) = args.context_length {
                client = client.with_context_length(tokens);
            }
            Arc::new(client)
        }
        Provider::LmStudio => {
            let client = LmStudioClient::new(&args.lmstudio_host, args.lmstudio_model.clone())
                .context("Failed to set up LM Studio client")?;
            let client = match args.context_length {
                Some(tokens) => client.with_context_length(tokens),
                None => client.discover_context_length(DISCOVERY_TIMEOUT).await,
            };
            Arc::new(client)
        }
        Provider::Ollama => {
            let client = OllamaClient::new(&args.ollama_host, args.ollama_model.clone())
                .context("Failed to set up Ollama client")?;
            let client = match args.context_length {
                Some(tokens) => client.with_context_length(tokens),
                None => client.discover_context_length(DISCOVERY_TIMEOUT).await,
            };
            if client.context_length().is_none() {
                log::warn!(
                    "Unknown context length for model {}; oversized files will not be detected",
                    client.model()
                );
            }
            Arc::new(client)
        }
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        backend: BackendArgs,
    }

    #[tokio::test]
    async fn explicit_context_length_skips_discovery() {
        let args = Harness::try_parse_from([
            "csa",
            "--llm-provider",
            "lmstudio",
            "--lmstudio-host",
            "127.0.0.1:9",
            "--context-length",
            "4096",
        ])
        .unwrap()
        .backend;
        assert_eq!(args.llm_provider, Provider::LmStudio);
        assert_eq!(args.lmstudio_host, "127.0.0.1:9");

        if args.provider() == Provider::LmStudio {
            let client = build_client(&args).await.unwrap();
            assert_eq!(client.name(), "lmstudio");
            assert_eq!(client.context_length(), Some(4_096));
        }
    }
}
