use super::{clean_description, clean_item, dedup_in_order, ParsedAnalysis};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    description: Value,
    #[serde(default)]
    classes: Value,
    #[serde(default)]
    functions: Value,
    #[serde(default)]
    dependencies: Value,
}

/// First JSON object in the text that carries `description` or `classes`.
/// Code fences and surrounding prose are ignored.
pub(super) fn parse(text: &str) -> Option<ParsedAnalysis> {
    let object = text
        .match_indices('{')
        .find_map(|(start, _)| first_value_at(&text[start..]))?;

    let raw: RawAnalysis = serde_json::from_value(Value::Object(object)).ok()?;
    Some(ParsedAnalysis {
        description: description_text(&raw.description),
        classes: items(&raw.classes),
        functions: items(&raw.functions),
        dependencies: items(&raw.dependencies),
    })
}

fn first_value_at(text: &str) -> Option<Map<String, Value>> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next()? {
        Ok(Value::Object(map)) if map.contains_key("description") || map.contains_key("classes") => {
            Some(map)
        }
        _ => None,
    }
}

fn description_text(value: &Value) -> String {
    match value {
        Value::String(s) => clean_description(s),
        Value::Array(parts) => parts
            .iter()
            .map(description_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn items(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(entries) => entries.iter().filter_map(item_text).collect(),
        Value::String(s) => s.lines().map(str::to_string).collect(),
        Value::Object(map) => flatten_object(map).into_iter().collect(),
        _ => Vec::new(),
    };
    dedup_in_order(raw.iter().filter_map(|item| clean_item(item)))
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => flatten_object(map),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// `{"name": n, "description": d}` and `{"n": "d"}` both become `n: d`
fn flatten_object(map: &Map<String, Value>) -> Option<String> {
    let as_text = |v: &Value| match v {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };

    if let Some(name) = map.get("name") {
        let name = as_text(name);
        return match map.get("description").map(as_text) {
            Some(desc) if !desc.is_empty() => Some(format!("{name}: {desc}")),
            _ => Some(name),
        };
    }

    let mut pairs = map.iter();
    match (pairs.next(), pairs.next()) {
        (Some((key, value)), None) => {
            let value = as_text(value);
            if value.is_empty() {
                Some(key.clone())
            } else {
                Some(format!("{key}: {value}"))
            }
        }
        _ if map.is_empty() => None,
        _ => Some(
            map.iter()
                .map(|(k, v)| format!("{k}: {}", as_text(v)))
                .collect::<Vec<_>>()
                .join(", "),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_object_from_fenced_prose() {
        let text = "Sure! Here is the analysis:\n```json\n{\n  \"description\": \"**Loads** settings\",\n  \"classes\": [\"Settings\"],\n  \"functions\": [\"load(path): reads file\"],\n  \"dependencies\": []\n}\n```\nLet me know if you need more.";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.description, "Loads settings");
        assert_eq!(parsed.classes, vec!["Settings"]);
        assert_eq!(parsed.functions, vec!["load(path): reads file"]);
        assert!(parsed.dependencies.is_empty());
    }

    #[test]
    fn flattens_object_items() {
        let text = r#"{"description": "x", "classes": [], "functions": [{"name": "run()", "description": "starts"}, {"stop()": "stops"}, {"name": "idle"}]}"#;
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.functions, vec!["run(): starts", "stop(): stops", "idle"]);
    }

    #[test]
    fn skips_unrelated_objects() {
        let text = r#"Example input {"a": 1} then {"description": "real", "classes": ["A", "A"]}"#;
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.description, "real");
        assert_eq!(parsed.classes, vec!["A"]);
    }

    #[test]
    fn declines_invalid_json() {
        assert_eq!(parse(r#"{"description": "x", "classes": [}"#), None);
        assert_eq!(parse("no braces here"), None);
    }
}
