use crate::llm::LlmError;
use crate::reporter::ReporterError;
use csa_code_chunker::ChunkerError;
use csa_indexer::IndexerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Discovery failed: {0}")]
    Discovery(IndexerError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(IndexerError),

    #[error("Unknown reporter kind '{kind}' (known: {known})")]
    UnknownReporter { kind: String, known: String },

    #[error("Reporter failed: {0}")]
    Reporter(#[from] ReporterError),

    #[error("Chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("LLM client error: {0}")]
    Llm(#[from] LlmError),
}

impl AnalyzerError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
