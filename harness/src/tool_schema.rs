//! Tool catalog contract
//!
//! The fixed, enumerated tool catalog exposed to the decision collaborator,
//! the typed argument payloads behind it, and the [`ToolResult`] every tool
//! invocation returns.
//!
//! # Catalog
//!
//! ```text
//! search_files          query, file_pattern="*"
//! read_file             file_path, start_line?, end_line?
//! write_file            file_path, content
//! list_files            directory=".", pattern="*"
//! run_command           command, timeout=30
//! get_project_structure max_depth=3
//! update_memory         file_type (goals|progress|decisions|blockers), content
//! complete_goal         summary
//! ```
//!
//! The declared JSON schemas are sent verbatim. Typed handlers are checked
//! against them at registration ([`check_args_schema`]) and incoming arguments
//! are checked before dispatch ([`validate_arguments`]).

use crate::error::{HarnessError, HarnessResult};
use crate::memory::MemoryKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::str::FromStr;

// ── Tool names ────────────────────────────────────────────────────────

/// Every tool the collaborator may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    SearchFiles,
    ReadFile,
    WriteFile,
    ListFiles,
    RunCommand,
    GetProjectStructure,
    UpdateMemory,
    CompleteGoal,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        ToolName::SearchFiles,
        ToolName::ReadFile,
        ToolName::WriteFile,
        ToolName::ListFiles,
        ToolName::RunCommand,
        ToolName::GetProjectStructure,
        ToolName::UpdateMemory,
        ToolName::CompleteGoal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchFiles => "search_files",
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::ListFiles => "list_files",
            Self::RunCommand => "run_command",
            Self::GetProjectStructure => "get_project_structure",
            Self::UpdateMemory => "update_memory",
            Self::CompleteGoal => "complete_goal",
        }
    }

    /// Declared catalog entry for this tool
    pub fn spec(&self) -> ToolSpec {
        let (description, parameters) = match self {
            Self::SearchFiles => (
                "Search for text in project files using ripgrep. Returns matches with file paths and line numbers.",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "The text to search for"},
                        "file_pattern": {
                            "type": "string",
                            "description": "Optional file pattern (e.g., '*.py')",
                            "default": "*"
                        }
                    },
                    "required": ["query"]
                }),
            ),
            Self::ReadFile => (
                "Read the contents of a file. Returns the file content and metadata.",
                json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "Path to the file relative to project directory"
                        },
                        "start_line": {"type": "integer", "description": "Optional starting line number"},
                        "end_line": {"type": "integer", "description": "Optional ending line number"}
                    },
                    "required": ["file_path"]
                }),
            ),
            Self::WriteFile => (
                "Write content to a file (creates or overwrites). Use this to create new files or update existing ones.",
                json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "Path to the file relative to project directory"
                        },
                        "content": {
                            "type": "string",
                            "description": "The complete content to write to the file"
                        }
                    },
                    "required": ["file_path", "content"]
                }),
            ),
            Self::ListFiles => (
                "List files in a directory with metadata.",
                json!({
                    "type": "object",
                    "properties": {
                        "directory": {
                            "type": "string",
                            "description": "Directory path relative to project (default: '.')",
                            "default": "."
                        },
                        "pattern": {
                            "type": "string",
                            "description": "File pattern to match (default: '*')",
                            "default": "*"
                        }
                    }
                }),
            ),
            Self::RunCommand => (
                "Run a shell command in the project directory. Returns structured output with error analysis.",
                json!({
                    "type": "object",
                    "properties": {
                        "command": {"type": "string", "description": "The shell command to execute"},
                        "timeout": {
                            "type": "integer",
                            "description": "Timeout in seconds (default: 30)",
                            "default": 30
                        }
                    },
                    "required": ["command"]
                }),
            ),
            Self::GetProjectStructure => (
                "Get an overview of the project directory structure.",
                json!({
                    "type": "object",
                    "properties": {
                        "max_depth": {
                            "type": "integer",
                            "description": "Maximum depth to traverse (default: 3)",
                            "default": 3
                        }
                    }
                }),
            ),
            Self::UpdateMemory => (
                "Update one of the memory files (goals, progress, decisions, blockers).",
                json!({
                    "type": "object",
                    "properties": {
                        "file_type": {
                            "type": "string",
                            "enum": ["goals", "progress", "decisions", "blockers"],
                            "description": "Which memory file to update"
                        },
                        "content": {
                            "type": "string",
                            "description": "The new content for the memory file"
                        }
                    },
                    "required": ["file_type", "content"]
                }),
            ),
            Self::CompleteGoal => (
                "Mark the current goal as complete and stop the agent.",
                json!({
                    "type": "object",
                    "properties": {
                        "summary": {"type": "string", "description": "Summary of what was accomplished"}
                    },
                    "required": ["summary"]
                }),
            ),
        };

        ToolSpec {
            name: *self,
            description: description.to_string(),
            parameters,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| HarnessError::UnknownTool { name: s.to_string() })
    }
}

/// One catalog entry: name, description and parameter schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: ToolName,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    /// Function-calling envelope (`{"type": "function", "function": {...}}`)
    pub fn to_function_definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name.as_str(),
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    fn properties(&self) -> Option<&Map<String, Value>> {
        self.parameters.get("properties").and_then(Value::as_object)
    }

    fn required(&self) -> BTreeSet<String> {
        string_set(self.parameters.get("required"))
    }
}

/// The full catalog in declaration order
pub fn catalog() -> Vec<ToolSpec> {
    ToolName::ALL.iter().map(ToolName::spec).collect()
}

// ── Tool result ───────────────────────────────────────────────────────

/// Uniform result of every tool invocation, success or failure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub summary: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub next_suggestions: Vec<String>,
}

impl ToolResult {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.next_suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next_suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    /// Result for a tool name missing from the dispatch table
    pub fn unknown_tool(name: &str) -> Self {
        Self::failure(format!("Unknown tool: {name}"))
    }

    /// Result for a handler that returned an error instead of a result
    pub fn execution_failed(error: impl std::fmt::Display) -> Self {
        Self::failure(format!("Tool execution failed: {error}"))
            .with_suggestion("Try a different approach")
    }
}

// ── Typed arguments ───────────────────────────────────────────────────

fn default_glob() -> String {
    "*".to_string()
}

fn default_directory() -> String {
    ".".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_depth() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct SearchFilesArgs {
    #[schemars(description = "The text to search for")]
    pub query: String,
    #[serde(default = "default_glob")]
    #[schemars(description = "Optional file pattern (e.g., '*.py')")]
    pub file_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    #[schemars(description = "Path to the file relative to project directory")]
    pub file_path: String,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct ListFilesArgs {
    #[serde(default = "default_directory")]
    pub directory: String,
    #[serde(default = "default_glob")]
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct RunCommandArgs {
    pub command: String,
    /// Seconds before the command is killed
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct ProjectStructureArgs {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct UpdateMemoryArgs {
    pub file_type: MemoryKind,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
pub struct CompleteGoalArgs {
    pub summary: String,
}

// ── Validation ────────────────────────────────────────────────────────

/// Check that a typed argument struct agrees with the declared catalog schema:
/// same property names, same required set.
pub fn check_args_schema<T: JsonSchema>(tool: ToolName) -> HarnessResult<()> {
    let declared = tool.spec();
    let derived = serde_json::to_value(schemars::schema_for!(T))?;

    let declared_props: BTreeSet<String> = declared
        .properties()
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default();
    let derived_props: BTreeSet<String> = derived
        .get("properties")
        .and_then(Value::as_object)
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default();

    if declared_props != derived_props {
        return Err(HarnessError::schema_mismatch(
            tool.as_str(),
            format!("declared properties {declared_props:?}, handler accepts {derived_props:?}"),
        ));
    }

    let declared_required = declared.required();
    let derived_required = string_set(derived.get("required"));
    if declared_required != derived_required {
        return Err(HarnessError::schema_mismatch(
            tool.as_str(),
            format!("declared required {declared_required:?}, handler requires {derived_required:?}"),
        ));
    }

    Ok(())
}

/// Validate raw arguments against the tool's declared schema.
///
/// Checks the payload is an object, required fields are present and not null,
/// and each known property has the declared JSON type (and enum value).
/// Unknown extra properties are ignored.
pub fn validate_arguments(tool: ToolName, args: &Value) -> HarnessResult<()> {
    let spec = tool.spec();
    let invalid = |message: String| HarnessError::invalid_arguments(tool.as_str(), message);

    let empty = Map::new();
    let object = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => return Err(invalid(format!("expected an object, got {}", type_name(other)))),
    };

    for field in spec.required() {
        match object.get(&field) {
            None | Some(Value::Null) => {
                return Err(invalid(format!("missing required field '{field}'")));
            }
            Some(_) => {}
        }
    }

    let Some(properties) = spec.properties() else {
        return Ok(());
    };

    for (name, value) in object {
        let Some(prop) = properties.get(name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let expected = prop.get("type").and_then(Value::as_str).unwrap_or("string");
        // integers are counts, line numbers and timeouts: never negative
        let type_ok = match expected {
            "string" => value.is_string(),
            "integer" => value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            _ => true,
        };
        if !type_ok {
            return Err(invalid(format!(
                "field '{name}' must be of type {expected}, got {}",
                type_name(value)
            )));
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(invalid(format!("field '{name}' must be one of {allowed:?}")));
            }
        }
    }

    Ok(())
}

fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_and_names() {
        let names: Vec<&str> = catalog().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "search_files",
                "read_file",
                "write_file",
                "list_files",
                "run_command",
                "get_project_structure",
                "update_memory",
                "complete_goal",
            ]
        );
    }

    #[test]
    fn test_tool_name_parse() {
        assert_eq!("run_command".parse::<ToolName>().unwrap(), ToolName::RunCommand);
        let err = "delete_everything".parse::<ToolName>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: delete_everything");
    }

    #[test]
    fn test_typed_args_match_declared_schemas() {
        check_args_schema::<SearchFilesArgs>(ToolName::SearchFiles).unwrap();
        check_args_schema::<ReadFileArgs>(ToolName::ReadFile).unwrap();
        check_args_schema::<WriteFileArgs>(ToolName::WriteFile).unwrap();
        check_args_schema::<ListFilesArgs>(ToolName::ListFiles).unwrap();
        check_args_schema::<RunCommandArgs>(ToolName::RunCommand).unwrap();
        check_args_schema::<ProjectStructureArgs>(ToolName::GetProjectStructure).unwrap();
        check_args_schema::<UpdateMemoryArgs>(ToolName::UpdateMemory).unwrap();
        check_args_schema::<CompleteGoalArgs>(ToolName::CompleteGoal).unwrap();
    }

    #[test]
    fn test_mismatched_args_rejected() {
        let err = check_args_schema::<WriteFileArgs>(ToolName::ReadFile).unwrap_err();
        assert!(matches!(err, HarnessError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(validate_arguments(ToolName::ReadFile, &json!({"file_path": "a.py"})).is_ok());
        let err = validate_arguments(ToolName::ReadFile, &json!({"start_line": 3})).unwrap_err();
        assert!(err.to_string().contains("file_path"));
        // all-optional tools accept an empty payload
        assert!(validate_arguments(ToolName::ListFiles, &json!({})).is_ok());
        assert!(validate_arguments(ToolName::GetProjectStructure, &Value::Null).is_ok());
    }

    #[test]
    fn test_validate_types_and_enums() {
        let err = validate_arguments(
            ToolName::RunCommand,
            &json!({"command": "ls", "timeout": "soon"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout"));

        let err = validate_arguments(
            ToolName::UpdateMemory,
            &json!({"file_type": "notes", "content": "x"}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("file_type"));

        assert!(validate_arguments(ToolName::CompleteGoal, &json!(["done"])).is_err());
    }

    #[test]
    fn test_defaults_fill_optional_fields() {
        let args: RunCommandArgs = serde_json::from_value(json!({"command": "ls"})).unwrap();
        assert_eq!(args.timeout, 30);
        let args: ListFilesArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(args.directory, ".");
        assert_eq!(args.pattern, "*");
        let args: ProjectStructureArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(args.max_depth, 3);
    }

    #[test]
    fn test_tool_result_contract_shape() {
        let result = ToolResult::execution_failed("disk full");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["summary"], json!("Tool execution failed: disk full"));
        assert_eq!(value["data"], json!({}));
        assert_eq!(value["next_suggestions"], json!(["Try a different approach"]));
    }

    #[test]
    fn test_function_definition_is_verbatim() {
        let spec = ToolName::RunCommand.spec();
        let def = spec.to_function_definition();
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "run_command");
        assert_eq!(def["function"]["parameters"], spec.parameters);
        assert_eq!(def["function"]["parameters"]["properties"]["timeout"]["default"], 30);
    }
}
