//! Text search over the project directory via ripgrep's JSON output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use harness::tool_schema::{SearchFilesArgs, ToolName, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use super::{Tool, ToolError};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SearchFilesTool {
    pub working_dir: PathBuf,
}

impl SearchFilesTool {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
        }
    }
}

/// One `rg --json` event; only `match` events carry data we use
#[derive(Deserialize)]
struct RgEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub file: String,
    pub line: u64,
    pub content: String,
}

/// Parse `rg --json` output. Returns matches plus the number of lines that
/// could not be parsed.
pub fn parse_rg_json(stdout: &str) -> (Vec<SearchMatch>, usize) {
    let mut matches = Vec::new();
    let mut skipped = 0;

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let event: RgEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable ripgrep output line");
                skipped += 1;
                continue;
            }
        };
        if event.kind != "match" {
            continue;
        }

        let file = event.data["path"]["text"].as_str();
        let line_number = event.data["line_number"].as_u64();
        let text = event.data["lines"]["text"].as_str();
        match (file, line_number, text) {
            (Some(file), Some(line), Some(text)) => matches.push(SearchMatch {
                file: file.trim_start_matches("./").to_string(),
                line,
                content: text.trim().to_string(),
            }),
            _ => {
                tracing::warn!("skipping ripgrep match without path, line or text");
                skipped += 1;
            }
        }
    }

    (matches, skipped)
}

#[async_trait]
impl Tool for SearchFilesTool {
    const NAME: ToolName = ToolName::SearchFiles;
    type Args = SearchFilesArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        let mut cmd = Command::new("rg");
        cmd.args(["--json", "--context", "2", "--max-count", "10"])
            .arg("--regexp")
            .arg(&args.query);
        if args.file_pattern != "*" {
            cmd.arg("--glob").arg(&args.file_pattern);
        }
        cmd.arg(".")
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(SEARCH_TIMEOUT, cmd.output()).await {
            Err(_) => {
                return Ok(ToolResult::failure("Search timed out")
                    .with_suggestion("Try a more specific search"));
            }
            Ok(Err(e)) => {
                return Ok(ToolResult::failure(format!("Search failed: {e}"))
                    .with_suggestion("Check if ripgrep is installed"));
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (matches, skipped) = parse_rg_json(&stdout);
        let rendered: Vec<Value> = matches
            .iter()
            .map(|m| {
                json!({
                    "file": m.file,
                    "line": m.line,
                    "content": m.content,
                    "context": "available",
                })
            })
            .collect();

        let result = match matches.first() {
            None => ToolResult::success(format!("No matches found for '{}'", args.query))
                .with_suggestions([
                    "Try a different search term",
                    "Check if files exist in project directory",
                ]),
            Some(first) => ToolResult::success(format!(
                "Found {} matches for '{}'",
                matches.len(),
                args.query
            ))
            .with_suggestions([
                format!("Read {} to see full context", first.file),
                "Search for related terms".to_string(),
            ]),
        };

        let mut result = result.with_data("matches", rendered);
        if skipped > 0 {
            result = result.with_data("skipped_lines", skipped);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rg_json() {
        let stdout = r#"{"type":"begin","data":{"path":{"text":"./src/app.py"}}}
{"type":"context","data":{"path":{"text":"./src/app.py"},"lines":{"text":"import os\n"},"line_number":1}}
{"type":"match","data":{"path":{"text":"./src/app.py"},"lines":{"text":"def main():\n"},"line_number":3,"submatches":[]}}
not json at all
{"type":"end","data":{}}
"#;
        let (matches, skipped) = parse_rg_json(stdout);
        assert_eq!(skipped, 1);
        assert_eq!(
            matches,
            vec![SearchMatch {
                file: "src/app.py".into(),
                line: 3,
                content: "def main():".into(),
            }]
        );
    }

    #[test]
    fn test_parse_rg_json_empty() {
        let (matches, skipped) = parse_rg_json("");
        assert!(matches.is_empty());
        assert_eq!(skipped, 0);
    }
}
