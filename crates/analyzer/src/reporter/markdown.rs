use super::{write_atomic, Reporter, ReporterError};
use crate::types::FileAnalysis;
use csa_indexer::SourceFile;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const BEGIN_MARKER: &str = "<!-- BEGIN_FILE_ANALYSES -->";
const END_MARKER: &str = "<!-- END_FILE_ANALYSES -->";
const SECTION_PREFIX: &str = "### `";

struct Section {
    path: String,
    body: String,
}

#[derive(Default)]
struct Totals {
    files: usize,
    partial: usize,
    lines_analyzed: usize,
    issues: usize,
}

/// Markdown document with one section per file.
///
/// The whole document is rewritten (via a temporary file and rename) after
/// every update. File sections live between marker comments so a resumed
/// run keeps the sections of files an earlier run completed. Sections of
/// files this run analyses again (partial or failed last time, or every
/// file on a fresh run) are dropped until they are reported anew.
pub struct MarkdownReporter {
    output: PathBuf,
    root: String,
    sections: Vec<Section>,
    remaining: Vec<String>,
    totals: Totals,
    finalized: bool,
}

impl MarkdownReporter {
    pub const KIND: &'static str = "markdown";

    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            root: String::new(),
            sections: Vec::new(),
            remaining: Vec::new(),
            totals: Totals::default(),
            finalized: false,
        }
    }

    fn load_existing(&mut self) -> Result<(), ReporterError> {
        if !self.output.exists() {
            return Ok(());
        }
        let existing = std::fs::read_to_string(&self.output)?;
        let Some(body) = between_markers(&existing) else {
            log::warn!(
                "{} has no analysis markers; starting a new document",
                self.output.display()
            );
            return Ok(());
        };
        self.sections = split_sections(body);
        if !self.sections.is_empty() {
            log::info!(
                "Keeping {} file sections from {}",
                self.sections.len(),
                self.output.display()
            );
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), ReporterError> {
        write_atomic(&self.output, self.render().as_bytes())?;
        Ok(())
    }

    fn render(&self) -> String {
        let mut doc = String::from("# Code Structure Analysis\n\n");
        if !self.root.is_empty() {
            let _ = writeln!(doc, "Source directory: `{}`\n", self.root);
        }

        doc.push_str("## Files Analyzed\n\n");
        doc.push_str(BEGIN_MARKER);
        doc.push('\n');
        for section in &self.sections {
            doc.push_str(section.body.trim_end());
            doc.push_str("\n\n");
        }
        doc.push_str(END_MARKER);
        doc.push_str("\n\n");

        if !self.remaining.is_empty() {
            doc.push_str("## Files Remaining to Study\n\n");
            for path in &self.remaining {
                let _ = writeln!(doc, "- `{path}`");
            }
            doc.push('\n');
        }

        if self.finalized {
            let t = &self.totals;
            doc.push_str("## Summary\n\n");
            let _ = writeln!(doc, "- Files reported this run: {}", t.files);
            let _ = writeln!(doc, "- Partial files: {}", t.partial);
            let _ = writeln!(doc, "- Lines analyzed: {}", t.lines_analyzed);
            let _ = writeln!(doc, "- Issues: {}", t.issues);
        }
        doc
    }
}

impl Reporter for MarkdownReporter {
    fn initialize(
        &mut self,
        files: &[SourceFile],
        pending: &[SourceFile],
        root: &Path,
    ) -> Result<(), ReporterError> {
        self.root = root.display().to_string();
        self.load_existing()?;

        let loaded = self.sections.len();
        let is_pending = |path: &str| pending.iter().any(|f| f.relative_path == path);
        self.sections.retain(|section| {
            files.iter().any(|f| f.relative_path == section.path) && !is_pending(&section.path)
        });
        if self.sections.len() < loaded {
            log::debug!(
                "Dropped {} stale sections from {}",
                loaded - self.sections.len(),
                self.output.display()
            );
        }

        self.remaining = pending.iter().map(|f| f.relative_path.clone()).collect();
        self.flush()
    }

    fn update(
        &mut self,
        analysis: &FileAnalysis,
        _root: &Path,
        remaining: &[SourceFile],
    ) -> Result<(), ReporterError> {
        let section = Section {
            path: analysis.path.clone(),
            body: render_section(analysis),
        };
        match self.sections.iter_mut().find(|s| s.path == analysis.path) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
        self.remaining = remaining.iter().map(|f| f.relative_path.clone()).collect();

        self.totals.files += 1;
        self.totals.partial += usize::from(analysis.partial);
        self.totals.lines_analyzed += analysis.lines_analyzed;
        self.totals.issues += analysis.issues.len();
        self.flush()
    }

    fn finalize(&mut self) -> Result<(), ReporterError> {
        self.finalized = true;
        self.flush()?;
        log::info!("Report written to {}", self.output.display());
        Ok(())
    }
}

fn render_section(analysis: &FileAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SECTION_PREFIX}{}`\n", analysis.path);

    let _ = write!(
        out,
        "**Lines analyzed:** {} of {}",
        analysis.lines_analyzed, analysis.total_lines
    );
    if analysis.partial {
        out.push_str(" (partial: run was cancelled)");
    }
    out.push_str("\n\n");

    if !analysis.description.is_empty() {
        let _ = writeln!(out, "**Description:**\n\n{}\n", analysis.description);
    }
    list(&mut out, "Classes", &analysis.classes);
    list(&mut out, "Functions", &analysis.functions);
    list(&mut out, "Dependencies", &analysis.dependencies);

    if analysis.has_issues() {
        out.push_str("**Issues:**\n\n");
        for issue in &analysis.issues {
            let _ = writeln!(out, "- {issue}");
        }
        out.push('\n');
    }
    out
}

fn list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "**{title}:**\n");
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
    out.push('\n');
}

fn between_markers(doc: &str) -> Option<&str> {
    let start = doc.find(BEGIN_MARKER)? + BEGIN_MARKER.len();
    let end = start + doc[start..].find(END_MARKER)?;
    Some(&doc[start..end])
}

fn split_sections(body: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for line in body.split_inclusive('\n') {
        if let Some(rest) = line.strip_prefix(SECTION_PREFIX) {
            let path = rest.split('`').next().unwrap_or_default().to_string();
            sections.push(Section {
                path,
                body: String::new(),
            });
        }
        if let Some(current) = sections.last_mut() {
            current.body.push_str(line);
        }
    }
    sections
}
