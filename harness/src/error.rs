//! Harness error types
//!
//! Structured errors for state persistence, memory documents and the tool
//! catalog. Recoverable per-action failures never reach this type: tools report
//! those through [`ToolResult`](crate::tool_schema::ToolResult).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur during harness operations
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Memory document kind outside goals/progress/decisions/blockers
    #[error("Unknown memory document kind: {kind}")]
    UnknownMemoryKind { kind: String },

    /// Tool name not present in the catalog
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// Arguments do not satisfy the tool's declared schema
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    /// A typed handler disagrees with the schema declared in the catalog
    #[error("Schema mismatch for {tool}: {message}")]
    SchemaMismatch { tool: String, message: String },

    /// Two handlers registered under the same tool name
    #[error("Tool already registered: {tool}")]
    DuplicateTool { tool: String },

    /// Persisted document exists but cannot be decoded
    #[error("Corrupt state document at {path}: {message}")]
    CorruptState { path: PathBuf, message: String },

    /// Workspace or configuration value unusable as given
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Create an unknown memory kind error
    pub fn unknown_memory_kind(kind: impl Into<String>) -> Self {
        Self::UnknownMemoryKind { kind: kind.into() }
    }

    /// Create an invalid arguments error
    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarnessError::unknown_memory_kind("notes");
        assert_eq!(err.to_string(), "Unknown memory document kind: notes");

        let err = HarnessError::invalid_arguments("read_file", "missing field file_path");
        assert!(err.to_string().contains("read_file"));
        assert!(err.to_string().contains("file_path"));
    }
}
