//! Reporter port, its registry, and the bundled reporters.

mod jsonl;
mod markdown;

pub use jsonl::JsonlReporter;
pub use markdown::MarkdownReporter;

use crate::error::{AnalyzerError, Result};
use crate::types::FileAnalysis;
use csa_indexer::SourceFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ReporterError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Receives per-file results as a run progresses.
///
/// `initialize` gets every discovered file and, in order, the subset this
/// run will analyse (the rest were completed by an earlier run). `update` is
/// called once per reported file, in discovery order, and `finalize` exactly
/// once at the end of a run that was not aborted. Any error is fatal to the
/// run.
pub trait Reporter: Send {
    fn initialize(
        &mut self,
        files: &[SourceFile],
        pending: &[SourceFile],
        root: &Path,
    ) -> std::result::Result<(), ReporterError>;

    fn update(
        &mut self,
        analysis: &FileAnalysis,
        root: &Path,
        remaining: &[SourceFile],
    ) -> std::result::Result<(), ReporterError>;

    fn finalize(&mut self) -> std::result::Result<(), ReporterError>;
}

/// Which reporter to build and where it writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterSettings {
    pub kind: String,
    pub output: PathBuf,
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            kind: MarkdownReporter::KIND.to_string(),
            output: PathBuf::from("trace_ai.md"),
        }
    }
}

pub type ReporterFactory =
    fn(&ReporterSettings) -> std::result::Result<Box<dyn Reporter>, ReporterError>;

/// Maps reporter kinds to constructors
#[derive(Clone)]
pub struct ReporterRegistry {
    factories: BTreeMap<String, ReporterFactory>,
}

impl Default for ReporterRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(MarkdownReporter::KIND, markdown_reporter);
        registry.register(JsonlReporter::KIND, jsonl_reporter);
        registry
    }
}

fn markdown_reporter(
    settings: &ReporterSettings,
) -> std::result::Result<Box<dyn Reporter>, ReporterError> {
    Ok(Box::new(MarkdownReporter::new(&settings.output)))
}

fn jsonl_reporter(
    settings: &ReporterSettings,
) -> std::result::Result<Box<dyn Reporter>, ReporterError> {
    Ok(Box::new(JsonlReporter::new(&settings.output)))
}

impl ReporterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add or replace a kind
    pub fn register(&mut self, kind: impl Into<String>, factory: ReporterFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn create(&self, settings: &ReporterSettings) -> Result<Box<dyn Reporter>> {
        let factory = self.factories.get(&settings.kind).ok_or_else(|| {
            AnalyzerError::UnknownReporter {
                kind: settings.kind.clone(),
                known: self.kinds().collect::<Vec<_>>().join(", "),
            }
        })?;
        log::debug!(
            "Creating {} reporter writing to {}",
            settings.kind,
            settings.output.display()
        );
        Ok(factory(settings)?)
    }
}

/// Write `contents` next to `path` and rename over it
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kinds() {
        let registry = ReporterRegistry::default();
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["jsonl", "markdown"]);
        assert!(registry.contains("markdown"));
    }

    #[test]
    fn unknown_kind_lists_known_ones() {
        let registry = ReporterRegistry::default();
        let settings = ReporterSettings {
            kind: "chromadb".to_string(),
            ..ReporterSettings::default()
        };
        match registry.create(&settings) {
            Err(AnalyzerError::UnknownReporter { kind, known }) => {
                assert_eq!(kind, "chromadb");
                assert_eq!(known, "jsonl, markdown");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("unknown kind was accepted"),
        }
    }

    #[test]
    fn custom_kinds_can_be_registered() {
        struct Null;
        impl Reporter for Null {
            fn initialize(
                &mut self,
                _: &[SourceFile],
                _: &[SourceFile],
                _: &Path,
            ) -> std::result::Result<(), ReporterError> {
                Ok(())
            }
            fn update(
                &mut self,
                _: &FileAnalysis,
                _: &Path,
                _: &[SourceFile],
            ) -> std::result::Result<(), ReporterError> {
                Ok(())
            }
            fn finalize(&mut self) -> std::result::Result<(), ReporterError> {
                Ok(())
            }
        }

        fn null_reporter(
            _: &ReporterSettings,
        ) -> std::result::Result<Box<dyn Reporter>, ReporterError> {
            Ok(Box::new(Null))
        }

        let mut registry = ReporterRegistry::empty();
        registry.register("null", null_reporter);
        let settings = ReporterSettings {
            kind: "null".to_string(),
            ..ReporterSettings::default()
        };
        assert!(registry.create(&settings).is_ok());
    }
}
