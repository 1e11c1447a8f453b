use std::path::Path;

/// Source language, as far as comment syntax and imports are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Swift,
    Kotlin,
    Html,
    Css,
    Shell,
    Sql,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            "html" | "htm" | "xml" | "xaml" | "cshtml" | "razor" => Language::Html,
            "css" | "scss" | "less" => Language::Css,
            "sh" | "bash" | "zsh" => Language::Shell,
            "sql" => Language::Sql,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Html => "html",
            Language::Css => "css",
            Language::Shell => "shell",
            Language::Sql => "sql",
            Language::Unknown => "unknown",
        }
    }

    /// Get typical comment prefixes for this language
    pub fn comment_prefixes(self) -> &'static [&'static str] {
        match self {
            Language::Rust
            | Language::JavaScript
            | Language::TypeScript
            | Language::Go
            | Language::Java
            | Language::C
            | Language::Cpp
            | Language::CSharp
            | Language::Swift
            | Language::Kotlin => &["//", "/*", "*/", "* "],
            Language::Python | Language::Ruby | Language::Shell => &["#"],
            Language::Html => &["<!--", "-->"],
            Language::Css => &["/*", "*/"],
            Language::Sql => &["--"],
            Language::Unknown => &[],
        }
    }

    /// Get import/use statement patterns for this language
    pub fn import_patterns(self) -> &'static [&'static str] {
        match self {
            Language::Rust => &["use ", "extern crate "],
            Language::Python => &["import ", "from "],
            Language::JavaScript | Language::TypeScript => &["import ", "require("],
            Language::Go | Language::Java | Language::Swift | Language::Kotlin => &["import "],
            Language::CSharp => &["using "],
            Language::Ruby => &["require ", "include "],
            Language::C | Language::Cpp => &["#include "],
            Language::Css => &["@import "],
            Language::Html | Language::Shell | Language::Sql | Language::Unknown => &[],
        }
    }

    /// Whether `line` carries code, i.e. is neither blank nor comment-only
    pub fn is_significant_line(self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() || (trimmed == "*" && self.comment_prefixes().contains(&"* ")) {
            return false;
        }
        // `#include` and friends are code even though they start with `#`.
        if self
            .import_patterns()
            .iter()
            .any(|pattern| trimmed.starts_with(pattern))
        {
            return true;
        }
        !self
            .comment_prefixes()
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
    }
}
