use super::{clean_description, clean_item, dedup_in_order, ParsedAnalysis};
use regex::Regex;
use std::sync::OnceLock;

const MAX_DESCRIPTION_CHARS: usize = 500;

struct Patterns {
    class_decl: Regex,
    function_decl: Regex,
    import_from: Regex,
    require_call: Regex,
    import_stmt: Regex,
    prose_class: Regex,
    prose_function: Regex,
    section_heading: Regex,
    bullet: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                class_decl: Regex::new(
                    r"^\s*(?:(?:public|private|protected|internal|export|default|abstract|static|sealed|partial|final|data|pub(?:\([^)]*\))?)\s+)*(?:class|struct|interface|enum|trait|record)\s+([A-Za-z_][A-Za-z0-9_]*)",
                )
                .ok()?,
                function_decl: Regex::new(
                    r"^\s*(?:(?:public|private|protected|internal|export|default|static|async|override|virtual|const|unsafe|extern|pub(?:\([^)]*\))?)\s+)*(?:def|fn|function|func|fun|sub)\s+([A-Za-z_][A-Za-z0-9_]*)",
                )
                .ok()?,
                import_from: Regex::new(r#"^\s*import\s.*?\bfrom\s+['"]([^'"]+)['"]"#).ok()?,
                require_call: Regex::new(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#).ok()?,
                import_stmt: Regex::new(r"^\s*(?:import|from|using|#include)\s+([^\s;,]+)").ok()?,
                prose_class: Regex::new(
                    r"(?i)\b(?:class|struct|interface|enum|trait)\s+`([A-Za-z_][\w.]*)`|`([A-Za-z_][\w.]*)`\s+(?:class|struct|interface|enum|trait)\b",
                )
                .ok()?,
                prose_function: Regex::new(
                    r"(?i)\b(?:function|method|def|fn)\s+`([A-Za-z_][\w.]*)(?:\(\))?`|`([A-Za-z_][\w.]*)(?:\(\))?`\s+(?:function|method)\b|`([A-Za-z_][\w.]*)\([^`]*\)`",
                )
                .ok()?,
                section_heading: Regex::new(
                    r"(?i)^\s*(?:#{1,6}\s*)?\**\s*(classes|functions|methods|dependencies|imports)\s*\**\s*:?\s*\**\s*$",
                )
                .ok()?,
                bullet: Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").ok()?,
            })
        })
        .as_ref()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Classes,
    Functions,
    Dependencies,
}

/// Best-effort scan of free-form text. Accepts any non-blank input.
pub(super) fn parse(text: &str) -> Option<ParsedAnalysis> {
    if text.trim().is_empty() {
        return None;
    }
    let Some(patterns) = patterns() else {
        return Some(ParsedAnalysis::default());
    };

    let mut found = scan_code(text);
    let mut description = None;
    let mut section = None;
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            section = None;
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(caps) = patterns.section_heading.captures(line) {
            section = match caps[1].to_ascii_lowercase().as_str() {
                "classes" => Some(Section::Classes),
                "functions" | "methods" => Some(Section::Functions),
                _ => Some(Section::Dependencies),
            };
            continue;
        }

        if let Some(caps) = patterns.bullet.captures(line) {
            if let (Some(current), Some(item)) = (section, clean_item(&caps[1])) {
                match current {
                    Section::Classes => found.classes.push(item),
                    Section::Functions => found.functions.push(item),
                    Section::Dependencies => found.dependencies.push(item),
                }
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }
        section = None;

        for caps in patterns.prose_class.captures_iter(line) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                found.classes.push(m.as_str().to_string());
            }
        }
        for caps in patterns.prose_function.captures_iter(line) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
                found.functions.push(m.as_str().to_string());
            }
        }

        if description.is_none() && is_prose(trimmed, patterns) {
            description = Some(prose_description(trimmed));
        }
    }

    found.description = description.unwrap_or_default();
    found.classes = dedup_in_order(found.classes);
    found.functions = dedup_in_order(found.functions);
    found.dependencies = dedup_in_order(found.dependencies);
    Some(found)
}

/// Declarations and imports found in source code lines
pub(crate) fn scan_code(code: &str) -> ParsedAnalysis {
    let Some(patterns) = patterns() else {
        return ParsedAnalysis::default();
    };
    let mut found = ParsedAnalysis::default();

    for line in code.lines() {
        if let Some(caps) = patterns.class_decl.captures(line) {
            found.classes.push(caps[1].to_string());
        }
        if let Some(caps) = patterns.function_decl.captures(line) {
            found.functions.push(caps[1].to_string());
        }

        let dependency = patterns
            .import_from
            .captures(line)
            .or_else(|| patterns.require_call.captures(line))
            .or_else(|| patterns.import_stmt.captures(line))
            .map(|caps| caps[1].trim_matches(['<', '>', '"', '\'']).to_string());
        if let Some(dep) = dependency.filter(|d| !d.is_empty() && !d.starts_with(['{', '*', '('])) {
            found.dependencies.push(dep);
        }
    }

    found.classes = dedup_in_order(found.classes);
    found.functions = dedup_in_order(found.functions);
    found.dependencies = dedup_in_order(found.dependencies);
    found
}

fn is_prose(line: &str, patterns: &Patterns) -> bool {
    !line.starts_with(['#', '{', '}', '[', ']', '`', '|', '<'])
        && !patterns.class_decl.is_match(line)
        && !patterns.function_decl.is_match(line)
        && !patterns.import_stmt.is_match(line)
        && line.chars().any(char::is_alphabetic)
}

fn prose_description(line: &str) -> String {
    let line = line
        .strip_prefix("**Description**")
        .or_else(|| line.strip_prefix("Description"))
        .map(|rest| rest.trim_start_matches([':', ' ', '*']))
        .unwrap_or(line);
    clean_description(&line.chars().take(MAX_DESCRIPTION_CHARS).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn markdown_sections() {
        let text = "This module wires the HTTP layer.\n\n## Classes\n- **Server**\n- Router\n\n### Functions:\n1. start(): boots\n2. stop()\n\nDependencies\n* tokio\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.description, "This module wires the HTTP layer.");
        assert_eq!(parsed.classes, vec!["Server", "Router"]);
        assert_eq!(parsed.functions, vec!["start(): boots", "stop()"]);
        assert_eq!(parsed.dependencies, vec!["tokio"]);
    }

    #[test]
    fn code_markers_in_echoed_code() {
        let text = "Here is what I found:\n```\npublic sealed class Repo {\n  private async Task Save() {}\n}\nexport function render(props) {}\nimport { h } from 'preact';\nusing System.Linq;\n#include <stdio.h>\n```";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.description, "Here is what I found:");
        assert_eq!(parsed.classes, vec!["Repo"]);
        assert_eq!(parsed.functions, vec!["render"]);
        assert_eq!(parsed.dependencies, vec!["preact", "System.Linq", "stdio.h"]);
    }

    #[test]
    fn prose_backticks() {
        let parsed =
            parse("Defines class `Cache` and the `evict()` helper, plus the `load` method.")
                .unwrap();
        assert_eq!(parsed.classes, vec!["Cache"]);
        assert_eq!(parsed.functions, vec!["evict", "load"]);
    }

    #[test]
    fn plain_words_after_markers_are_not_names() {
        let parsed = parse("This class handles requests and each function logs.").unwrap();
        assert!(parsed.classes.is_empty());
        assert!(parsed.functions.is_empty());
        assert_eq!(
            parsed.description,
            "This class handles requests and each function logs."
        );
    }

    #[test]
    fn unrecognisable_text_yields_empty_result() {
        let parsed = parse("???").unwrap();
        assert_eq!(parsed, ParsedAnalysis::default());
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn python_and_rust_sources() {
        let found = scan_code(
            "from pathlib import Path\nimport os\n\nclass App:\n    def run(self):\n        pass\n\npub(crate) async fn serve() {}\npub struct Config;\nconst x = require('fs');\n",
        );
        assert_eq!(found.classes, vec!["App", "Config"]);
        assert_eq!(found.functions, vec!["run", "serve"]);
        assert_eq!(found.dependencies, vec!["pathlib", "os", "fs"]);
    }
}
