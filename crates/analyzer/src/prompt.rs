use csa_code_chunker::CodeChunk;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Everything needed to render one chunk's analysis request
#[derive(Debug, Clone, Copy)]
pub struct PromptRequest<'a> {
    pub chunk: &'a CodeChunk,
    pub total_lines: usize,
    /// Large-file mode: brief description, structure only
    pub structural_only: bool,
    pub include_functions: bool,
    pub include_dependencies: bool,
}

const ARRAY_FORMAT_RULES: &str = r#"IMPORTANT: All arrays must contain simple strings, not key-value pairs or objects.
For example, when describing functions, use:
  "functions": [
    "function_name(): Description of what it does",
    "another_function(param): Another description"
  ]
NOT:
  "functions": [
    "function_name()": "Description of what it does"
  ]
Respond with the JSON object only, without Markdown formatting or commentary."#;

const STRUCTURAL_ONLY_NOTE: &str = "For this large file chunk, focus ONLY on extracting structural elements (classes, functions, imports).\nKeep the description very brief (1-2 sentences) and concentrate on identifying the code structure accurately.\n";

pub fn build_prompt(request: &PromptRequest<'_>) -> String {
    let chunk = request.chunk;
    let path = Path::new(&chunk.file_path);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| chunk.file_path.clone());
    let fence_tag = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut asks = vec![
        "A short description of what this code chunk does",
        "A list of classes defined in this chunk",
    ];
    let mut keys = vec!["- description (string)", "- classes (array of strings)"];
    if request.include_functions {
        asks.push("A list of functions/methods defined in this chunk");
        keys.push("- functions (array of strings)");
    }
    if request.include_dependencies {
        asks.push("A list of dependencies or imports used in this chunk");
        keys.push("- dependencies (array of strings)");
    }
    let asks = asks
        .iter()
        .enumerate()
        .map(|(i, ask)| format!("{}. {ask}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    let code = chunk.content.trim_end_matches(['\r', '\n']);
    let structural = if request.structural_only {
        STRUCTURAL_ONLY_NOTE
    } else {
        ""
    };

    format!(
        "You are a code structure analyzer. Your task is to analyze a chunk of code and extract key information.\n\
         \n\
         {header}\n\
         \n\
         CODE CHUNK:\n\
         ```{fence_tag}\n\
         {code}\n\
         ```\n\
         \n\
         {structural}Please provide a JSON response with the following information:\n\
         {asks}\n\
         \n\
         Format your response as a valid JSON object with these keys:\n\
         {keys}\n\
         \n\
         {ARRAY_FORMAT_RULES}\n\
         \n\
         RESPONSE (JSON):\n",
        header = PromptHeader::render(&file_name, chunk.start_line, chunk.end_line, request.total_lines),
        keys = keys.join("\n"),
    )
}

/// The `File: name (lines a-b of n)` line at the top of every prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptHeader {
    pub file_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub total_lines: usize,
}

impl PromptHeader {
    fn render(file_name: &str, start: usize, end: usize, total: usize) -> String {
        format!("File: {file_name} (lines {start}-{end} of {total})")
    }

    /// Recover the header from a rendered prompt
    pub fn parse(prompt: &str) -> Option<Self> {
        static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
        let re = HEADER
            .get_or_init(|| Regex::new(r"(?m)^File: (.+) \(lines (\d+)-(\d+) of (\d+)\)$").ok())
            .as_ref()?;
        let caps = re.captures(prompt)?;
        Some(Self {
            file_name: caps[1].to_string(),
            start_line: caps[2].parse().ok()?,
            end_line: caps[3].parse().ok()?,
            total_lines: caps[4].parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunk() -> CodeChunk {
        CodeChunk {
            file_path: "src/Services/OrderService.cs".to_string(),
            index: 1,
            start_line: 201,
            end_line: 400,
            content: "public class OrderService {}\n".to_string(),
            significant_lines: 1,
        }
    }

    #[test]
    fn prompt_names_file_range_and_fields() {
        let chunk = chunk();
        let prompt = build_prompt(&PromptRequest {
            chunk: &chunk,
            total_lines: 450,
            structural_only: false,
            include_functions: true,
            include_dependencies: true,
        });

        assert!(prompt.contains("File: OrderService.cs (lines 201-400 of 450)"));
        assert!(prompt.contains("```cs\npublic class OrderService {}\n```"));
        assert!(prompt.contains("- functions (array of strings)"));
        assert!(prompt.contains("4. A list of dependencies"));
        assert!(!prompt.contains("focus ONLY"));
    }

    #[test]
    fn disabled_fields_and_structural_mode() {
        let chunk = chunk();
        let prompt = build_prompt(&PromptRequest {
            chunk: &chunk,
            total_lines: 450,
            structural_only: true,
            include_functions: false,
            include_dependencies: true,
        });

        assert!(!prompt.contains("- functions"));
        assert!(prompt.contains("3. A list of dependencies"));
        assert!(prompt.contains("focus ONLY on extracting structural elements"));
    }

    #[test]
    fn header_round_trip() {
        let chunk = chunk();
        let prompt = build_prompt(&PromptRequest {
            chunk: &chunk,
            total_lines: 450,
            structural_only: false,
            include_functions: true,
            include_dependencies: true,
        });
        assert_eq!(
            PromptHeader::parse(&prompt),
            Some(PromptHeader {
                file_name: "OrderService.cs".to_string(),
                start_line: 201,
                end_line: 400,
                total_lines: 450,
            })
        );
    }
}
