//! Tool dispatch.
//!
//! Each tool implements [`Tool`] with a typed argument struct and is
//! registered in a [`ToolRegistry`], a dispatch table keyed by
//! [`ToolName`]. Registration checks the typed arguments against the schema
//! declared in the catalog; dispatch validates raw arguments against the
//! same schema before decoding them. Tools are sandboxed to the project
//! directory.

pub mod exec_tool;
pub mod fs_tools;
pub mod search_tool;
pub mod session_tools;
pub mod structure_tool;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use harness::classifier::{OutputClassifier, RegexOutputClassifier};
use harness::tool_schema::{self, ToolName, ToolResult, ToolSpec};
use harness::{HarnessError, HarnessResult, StateStore};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Errors that can occur during tool execution.
///
/// Handlers report expected failures (missing file, non-zero exit) as failed
/// [`ToolResult`]s; a `ToolError` means the handler could not produce one.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path `{0}` escapes sandbox")]
    Sandbox(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Harness(#[from] HarnessError),
}

/// Validate that a relative path stays within the sandbox root.
///
/// The path must be relative and must not climb out with `..`. It is
/// normalized lexically, then the nearest existing ancestor is canonicalized
/// so symlinks pointing outside the root are rejected too. Returns the
/// resolved path on success; the target itself need not exist.
pub fn sandbox_check(working_dir: &Path, relative_path: &str) -> Result<PathBuf, ToolError> {
    let relative = Path::new(relative_path);
    if relative.is_absolute() {
        return Err(ToolError::Sandbox(relative_path.to_string()));
    }

    let mut normalized = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(ToolError::Sandbox(relative_path.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ToolError::Sandbox(relative_path.to_string()));
            }
        }
    }

    let canon_root = working_dir.canonicalize()?;
    let candidate = canon_root.join(&normalized);

    // Canonicalize the deepest existing ancestor; the rest may not exist yet.
    let mut existing = candidate.as_path();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = existing.canonicalize()?;
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }

    if !resolved.starts_with(&canon_root) {
        return Err(ToolError::Sandbox(relative_path.to_string()));
    }
    Ok(resolved)
}

/// Keep at most `max` characters of `s`
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

// ── Tool trait ────────────────────────────────────────────────────────────────

/// A handler for one catalog entry
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    const NAME: ToolName;
    type Args: DeserializeOwned + JsonSchema + Send + 'static;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError>;
}

/// Object-safe wrapper stored in the dispatch table
#[async_trait]
trait DynTool: Send + Sync {
    async fn call_value(&self, args: Value) -> Result<ToolResult, ToolError>;
}

#[async_trait]
impl<T: Tool> DynTool for T {
    async fn call_value(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        let typed: T::Args =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        self.call(typed).await
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Shared inputs for the built-in tools
#[derive(Clone)]
pub struct ToolContext {
    pub project_dir: PathBuf,
    pub classifier: Arc<dyn OutputClassifier>,
    /// Characters of stdout/stderr kept in command results
    pub output_limit: usize,
}

impl ToolContext {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            classifier: Arc::new(RegexOutputClassifier),
            output_limit: 1000,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn OutputClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Dispatch table from tool name to typed handler
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<ToolName, Box<dyn DynTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every catalog tool
    pub fn with_defaults(ctx: &ToolContext, store: StateStore) -> HarnessResult<Self> {
        let mut registry = Self::new();
        registry.register(search_tool::SearchFilesTool::new(&ctx.project_dir))?;
        registry.register(fs_tools::ReadFileTool::new(&ctx.project_dir))?;
        registry.register(fs_tools::WriteFileTool::new(&ctx.project_dir))?;
        registry.register(fs_tools::ListFilesTool::new(&ctx.project_dir))?;
        registry.register(exec_tool::RunCommandTool::new(ctx))?;
        registry.register(structure_tool::ProjectStructureTool::new(&ctx.project_dir))?;
        registry.register(session_tools::UpdateMemoryTool::new(store))?;
        registry.register(session_tools::CompleteGoalTool)?;
        Ok(registry)
    }

    /// Add a handler. Fails if its arguments disagree with the declared
    /// schema or the name is already taken.
    pub fn register<T: Tool>(&mut self, tool: T) -> HarnessResult<()> {
        tool_schema::check_args_schema::<T::Args>(T::NAME)?;
        if self.handlers.contains_key(&T::NAME) {
            return Err(HarnessError::DuplicateTool {
                tool: T::NAME.to_string(),
            });
        }
        self.handlers.insert(T::NAME, Box::new(tool));
        Ok(())
    }

    pub fn contains(&self, name: ToolName) -> bool {
        self.handlers.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Declared specs of the registered tools, in catalog order
    pub fn specs(&self) -> Vec<ToolSpec> {
        ToolName::ALL
            .iter()
            .filter(|name| self.handlers.contains_key(name))
            .map(ToolName::spec)
            .collect()
    }

    /// Execute a named tool. Always returns a result, never an error.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResult {
        let Ok(tool) = name.parse::<ToolName>() else {
            tracing::warn!(tool = %name, "unknown tool requested");
            return ToolResult::unknown_tool(name);
        };
        let Some(handler) = self.handlers.get(&tool) else {
            tracing::warn!(tool = %name, "tool not registered");
            return ToolResult::unknown_tool(name);
        };

        if let Err(e) = tool_schema::validate_arguments(tool, &args) {
            tracing::warn!(tool = %name, error = %e, "rejected tool arguments");
            return ToolResult::failure(e.to_string())
                .with_suggestion("Check the tool's parameter schema and retry");
        }

        match handler.call_value(args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool execution failed");
                ToolResult::execution_failed(e)
            }
        }
    }
}
