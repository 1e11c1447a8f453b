use crate::error::{IndexerError, Result};
use crate::stats::ScanStats;
use csa_code_chunker::{ChunkerError, SourceText};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Directory name holding per-root run state (checkpoint, reports)
pub const STATE_DIR_NAME: &str = ".csa";

/// Options controlling which files a scan yields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Extension allow-list (`.cs` and `cs` are equivalent). Ignored when
    /// `include` is non-empty.
    pub extensions: Vec<String>,

    /// Gitignore-style patterns a file must match to be kept
    pub include: Vec<String>,

    /// Gitignore-style patterns that drop a file
    pub exclude: Vec<String>,

    /// Honour `.gitignore` files under the root
    pub obey_ignore_files: bool,

    /// Descend into sub-directories
    pub recursive: bool,

    /// Directory names skipped at any depth (case-insensitive), in addition
    /// to the built-in list
    pub extra_excluded_dirs: Vec<String>,

    /// Files above this size are skipped
    pub max_file_size_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            include: Vec::new(),
            exclude: Vec::new(),
            obey_ignore_files: false,
            recursive: true,
            extra_excluded_dirs: Vec::new(),
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
        }
    }
}

/// A discovered candidate file. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute (or root-joined) path on disk
    pub path: PathBuf,

    /// Forward-slash path relative to the scan root; the file's identity
    pub relative_path: String,

    /// Line count at discovery time
    pub line_count: usize,

    pub size_bytes: u64,
}

/// Why a candidate was left out of the scan result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    Binary,
    TooLarge { size_bytes: u64, limit_bytes: u64 },
    Unreadable { message: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary => write!(f, "binary content"),
            Self::TooLarge {
                size_bytes,
                limit_bytes,
            } => write!(f, "too large ({size_bytes} bytes > {limit_bytes})"),
            Self::Unreadable { message } => write!(f, "unreadable: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub relative_path: String,
    pub reason: SkipReason,
}

/// Output of a scan: accepted files in lexicographic relative-path order,
/// plus the candidates that were dropped
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
    pub stats: ScanStats,
}

/// Scanner for finding source files under a root
pub struct FileScanner {
    root: PathBuf,
    options: ScanOptions,
    extensions: Vec<String>,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl FileScanner {
    /// Validate the root and compile patterns. Fails with `InvalidRoot` when
    /// the root is missing or not a directory.
    pub fn new(root: impl AsRef<Path>, options: ScanOptions) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(IndexerError::InvalidRoot(format!(
                "Path does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(IndexerError::InvalidRoot(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        let extensions = options
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        let include = build_globset(&options.include)?;
        let exclude = build_globset(&options.exclude)?;

        Ok(Self {
            root,
            options,
            extensions,
            include,
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the root. Output order depends only on the tree's contents.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut result = ScanResult::default();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .parents(false)
            .ignore(false)
            .git_ignore(self.options.obey_ignore_files)
            .git_exclude(self.options.obey_ignore_files)
            .git_global(false)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));
        if !self.options.recursive {
            builder.max_depth(Some(1));
        }

        let root = self.root.clone();
        let extra_excluded: Vec<String> = self
            .options
            .extra_excluded_dirs
            .iter()
            .map(|d| d.to_lowercase())
            .collect();
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && is_excluded_dir(entry.path(), &root, &extra_excluded))
        });

        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            let Some(relative_path) = relative_path(path, &self.root) else {
                continue;
            };
            if !self.is_candidate(&relative_path) {
                continue;
            }

            match self.inspect(path, &relative_path) {
                Ok(file) => result.files.push(file),
                Err(reason) => {
                    log::debug!("Skipping {relative_path}: {reason}");
                    result.skipped.push(SkippedFile {
                        relative_path,
                        reason,
                    });
                }
            }
        }

        result
            .files
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        result
            .files
            .dedup_by(|a, b| a.relative_path == b.relative_path);
        result
            .skipped
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        for file in &result.files {
            result.stats.add_file(&file.relative_path, file.line_count);
        }
        for skipped in &result.skipped {
            result.stats.add_skipped(&skipped.reason);
        }

        log::info!(
            "Found {} source files under {} ({} skipped)",
            result.files.len(),
            self.root.display(),
            result.skipped.len()
        );
        Ok(result)
    }

    /// Extension and pattern filters, applied to the relative path
    fn is_candidate(&self, relative_path: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(relative_path) {
                log::debug!("Skipping {relative_path} due to include patterns");
                return false;
            }
        } else if !self.has_allowed_extension(relative_path) {
            return false;
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(relative_path) {
                log::debug!("Skipping {relative_path} due to exclude patterns");
                return false;
            }
        }

        true
    }

    fn has_allowed_extension(&self, relative_path: &str) -> bool {
        Path::new(relative_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == &ext))
    }

    /// Size, binary and line-count checks for one candidate
    fn inspect(&self, path: &Path, relative_path: &str) -> std::result::Result<SourceFile, SkipReason> {
        let size_bytes = std::fs::metadata(path)
            .map_err(|e| SkipReason::Unreadable {
                message: e.to_string(),
            })?
            .len();
        if size_bytes > self.options.max_file_size_bytes {
            return Err(SkipReason::TooLarge {
                size_bytes,
                limit_bytes: self.options.max_file_size_bytes,
            });
        }

        let text = SourceText::read(path, relative_path).map_err(|e| match e {
            ChunkerError::BinaryContent(_) => SkipReason::Binary,
            other => SkipReason::Unreadable {
                message: other.to_string(),
            },
        })?;

        Ok(SourceFile {
            path: path.to_path_buf(),
            relative_path: relative_path.to_string(),
            line_count: text.line_count(),
            size_bytes,
        })
    }
}

/// Forward-slash relative path, or `None` for paths outside the root
pub fn relative_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn is_excluded_dir(path: &Path, root: &Path, extra: &[String]) -> bool {
    if path == root {
        return false;
    }
    let Some(name) = path.file_name() else {
        return false;
    };
    let lowered = name.to_string_lossy().to_lowercase();
    EXCLUDED_DIRS.iter().any(|excluded| *excluded == lowered)
        || extra.iter().any(|excluded| excluded == &lowered)
}

/// Compile gitignore-flavoured patterns. A pattern without `/` matches at any
/// depth; a trailing `/` restricts it to directories (and their contents).
fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;

    for raw in patterns {
        let pattern = raw.trim();
        if pattern.is_empty() || pattern.starts_with('#') {
            continue;
        }
        for expanded in expand_pattern(pattern) {
            let glob = GlobBuilder::new(&expanded)
                .literal_separator(true)
                .build()
                .map_err(|e| IndexerError::pattern(pattern, e))?;
            builder.add(glob);
        }
        any = true;
    }

    if !any {
        return Ok(None);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| IndexerError::pattern(patterns.join(","), e))
}

fn expand_pattern(pattern: &str) -> Vec<String> {
    let anchored = pattern.starts_with('/');
    let body = pattern.trim_start_matches('/');
    let dir_only = body.ends_with('/');
    let body = body.trim_end_matches('/');

    let base = if anchored || body.contains('/') {
        body.to_string()
    } else {
        format!("**/{body}")
    };

    if dir_only {
        vec![format!("{base}/**")]
    } else {
        vec![format!("{base}/**"), base]
    }
}

/// Build, dependency and VCS directories that never hold analyzable sources
const EXCLUDED_DIRS: &[&str] = &[
    "obj",
    "debug",
    "release",
    "properties",
    "bin",
    "node_modules",
    ".git",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    ".env",
    "dist",
    "build",
    STATE_DIR_NAME,
];

const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

const DEFAULT_EXTENSIONS: &[&str] = &[".cs", ".py", ".js", ".ts", ".html", ".css"];
