use super::{clean_description, clean_item, dedup_in_order, ParsedAnalysis};
use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    description_quoted: Regex,
    description_line: Regex,
    item: Regex,
    /// Opening of each array; the body is cut by [`array_body`]
    arrays: [(Field, Regex); 3],
    next_key: Regex,
}

#[derive(Clone, Copy)]
enum Field {
    Classes,
    Functions,
    Dependencies,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let array = |name: &str| {
                Regex::new(&format!(r#"(?i)["']?{name}["']?\s*:\s*\["#))
            };
            Some(Patterns {
                description_quoted: Regex::new(
                    r#"(?is)["']description["']\s*:\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')"#,
                )
                .ok()?,
                description_line: Regex::new(r"(?im)^\W*description\W*\s*[:=]\s*(.+)$").ok()?,
                item: Regex::new(
                    r#"(?s)"((?:[^"\\]|\\.)*)"\s*:\s*"((?:[^"\\]|\\.)*)"|"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'"#,
                )
                .ok()?,
                arrays: [
                    (Field::Classes, array("classes").ok()?),
                    (Field::Functions, array("functions").ok()?),
                    (Field::Dependencies, array("dependencies").ok()?),
                ],
                next_key: Regex::new(r#"\A[ \t\r]*["']?\w+["']?\s*:"#).ok()?,
            })
        })
        .as_ref()
}

/// Field-by-field recovery for responses that are JSON-shaped but not valid
/// JSON. Accepts when a description or at least one array is found.
pub(super) fn parse(text: &str) -> Option<ParsedAnalysis> {
    let patterns = patterns()?;
    let mut parsed = ParsedAnalysis::default();
    let mut found = false;

    if let Some(caps) = patterns.description_quoted.captures(text) {
        let raw = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        parsed.description = clean_description(&unescape(raw));
        found = true;
    } else if let Some(caps) = patterns.description_line.captures(text) {
        let line = caps[1].trim().trim_end_matches(',');
        parsed.description = clean_description(line.trim_matches(['"', '\'']));
        found = true;
    }

    for (field, regex) in &patterns.arrays {
        let Some(open) = regex.find(text) else {
            continue;
        };
        found = true;
        let body = array_body(&text[open.end()..], &patterns.next_key);
        let items = dedup_in_order(
            patterns
                .item
                .captures_iter(body)
                .filter_map(|c| {
                    if let (Some(key), Some(value)) = (c.get(1), c.get(2)) {
                        Some(format!("{}: {}", unescape(key.as_str()), unescape(value.as_str())))
                    } else {
                        c.get(3).or_else(|| c.get(4)).map(|m| unescape(m.as_str()))
                    }
                })
                .filter_map(|item| clean_item(&item)),
        );
        match field {
            Field::Classes => parsed.classes = items,
            Field::Functions => parsed.functions = items,
            Field::Dependencies => parsed.dependencies = items,
        }
    }

    found.then_some(parsed)
}

/// Text up to the `]` closing an array, skipping brackets inside quoted
/// items. An unclosed array ends where the next `key:` line starts. Quotes
/// never span lines.
fn array_body<'a>(rest: &'a str, next_key: &Regex) -> &'a str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev = '[';

    for (idx, c) in rest.char_indices() {
        let last = std::mem::replace(&mut prev, c);
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\n') => {
                quote = None;
                if next_key.is_match(&rest[idx + 1..]) {
                    return &rest[..idx];
                }
            }
            (Some(_), '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"') => quote = Some(c),
            // An apostrophe inside a bare word is not a quote
            (None, '\'') if last == '[' || last == ',' || last.is_whitespace() => {
                quote = Some(c)
            }
            (None, ']') => return &rest[..idx],
            (None, _) => {}
        }
    }
    rest
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_quotes_and_key_value_items() {
        let text = "{'description': 'Handles routing', 'classes': ['Router'], 'functions': [\"route()\": \"dispatches\", \"add(r)\": \"registers\"]}";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.description, "Handles routing");
        assert_eq!(parsed.classes, vec!["Router"]);
        assert_eq!(parsed.functions, vec!["route(): dispatches", "add(r): registers"]);
    }

    #[test]
    fn unterminated_array_stops_at_next_key() {
        let text = "\"description\": \"Cache layer\",\n\"classes\": [\"Cache\", \"Entry\"\n\"dependencies\": [\"std::collections\"]";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.classes, vec!["Cache", "Entry"]);
        assert_eq!(parsed.dependencies, vec!["std::collections"]);
    }

    #[test]
    fn brackets_inside_items_do_not_end_the_array() {
        let text = "{\"description\": \"Batch jobs\",\n\"functions\": [\"process(items: List[str]): handles\", \"save()\"],,\n\"classes\": [\"Job\"]";
        let parsed = parse(text).unwrap();
        assert_eq!(
            parsed.functions,
            vec!["process(items: List[str]): handles", "save()"]
        );
        assert_eq!(parsed.classes, vec!["Job"]);
    }

    #[test]
    fn escaped_quotes_survive() {
        let parsed = parse(r#""description": "Says \"hi\"", "#).unwrap();
        assert_eq!(parsed.description, "Says \"hi\"");
    }

    #[test]
    fn unstructured_prose_is_declined() {
        assert_eq!(parse("The code defines a parser."), None);
    }
}
