use super::{Reporter, ReporterError};
use crate::types::FileAnalysis;
use csa_indexer::SourceFile;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One serialized [`FileAnalysis`] per line, appended and flushed per update
pub struct JsonlReporter {
    output: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonlReporter {
    pub const KIND: &'static str = "jsonl";

    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            writer: None,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ReporterError> {
        self.writer
            .as_mut()
            .ok_or_else(|| ReporterError::other("jsonl reporter used before initialize"))
    }
}

impl Reporter for JsonlReporter {
    fn initialize(
        &mut self,
        files: &[SourceFile],
        _pending: &[SourceFile],
        root: &Path,
    ) -> Result<(), ReporterError> {
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output)?;
        self.writer = Some(BufWriter::new(file));
        log::debug!(
            "Appending analyses of {} files under {} to {}",
            files.len(),
            root.display(),
            self.output.display()
        );
        Ok(())
    }

    fn update(
        &mut self,
        analysis: &FileAnalysis,
        _root: &Path,
        _remaining: &[SourceFile],
    ) -> Result<(), ReporterError> {
        let writer = self.writer()?;
        serde_json::to_writer(&mut *writer, analysis)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), ReporterError> {
        self.writer()?.flush()?;
        self.writer = None;
        Ok(())
    }
}
