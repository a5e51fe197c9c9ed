//! File system tools: read, write, and list files within the project directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use harness::tool_schema::{ListFilesArgs, ReadFileArgs, ToolName, ToolResult, WriteFileArgs};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use serde_json::json;

use super::{sandbox_check, Tool, ToolError};

/// Most files reported by `list_files`
pub const LIST_FILES_LIMIT: usize = 50;

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// ReadFileTool
// ---------------------------------------------------------------------------

/// Read a file, optionally restricted to a 1-indexed inclusive line range.
pub struct ReadFileTool {
    pub working_dir: PathBuf,
}

impl ReadFileTool {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    const NAME: ToolName = ToolName::ReadFile;
    type Args = ReadFileArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        let full_path = sandbox_check(&self.working_dir, &args.file_path)?;
        if !full_path.exists() {
            return Ok(ToolResult::failure(format!("File not found: {}", args.file_path))
                .with_suggestions(["Check file path spelling", "List directory contents"]));
        }

        let bytes = match std::fs::read(&full_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(
                    ToolResult::failure(format!("Failed to read {}: {e}", args.file_path))
                        .with_suggestion("Check file permissions"),
                );
            }
        };
        let Ok(text) = String::from_utf8(bytes) else {
            return Ok(
                ToolResult::failure(format!("Cannot read {} - binary file", args.file_path))
                    .with_suggestion("Skip binary files"),
            );
        };

        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let total = lines.len();

        let (content, line_range) = if args.start_line.is_some() || args.end_line.is_some() {
            let start = args.start_line.unwrap_or(1).saturating_sub(1).min(total);
            let end = args.end_line.unwrap_or(total).min(total).max(start);
            (
                lines[start..end].concat(),
                format!(
                    "lines {}-{}",
                    args.start_line.unwrap_or(1),
                    args.end_line.unwrap_or(total)
                ),
            )
        } else {
            (text.clone(), "full file".to_string())
        };

        Ok(ToolResult::success(format!(
            "Read {} ({line_range}, {total} total lines)",
            args.file_path
        ))
        .with_data("content", content)
        .with_data("total_lines", total)
        .with_data("extension", extension_of(&full_path))
        .with_data("path", args.file_path.as_str())
        .with_suggestions(["Edit this file if changes needed", "Search for related files"]))
    }
}

// ---------------------------------------------------------------------------
// WriteFileTool
// ---------------------------------------------------------------------------

/// Create or overwrite a file, creating parent directories as needed.
pub struct WriteFileTool {
    pub working_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    const NAME: ToolName = ToolName::WriteFile;
    type Args = WriteFileArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        let full_path = sandbox_check(&self.working_dir, &args.file_path)?;
        let created = !full_path.exists();

        let written = full_path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&full_path, &args.content));
        if let Err(e) = written {
            return Ok(
                ToolResult::failure(format!("Failed to write {}: {e}", args.file_path))
                    .with_suggestion("Check file path and permissions"),
            );
        }

        let lines = args.content.split('\n').count();
        tracing::debug!(path = %args.file_path, lines, created, "file written");

        Ok(
            ToolResult::success(format!("Wrote {} ({lines} lines)", args.file_path))
                .with_data("path", args.file_path.as_str())
                .with_data("lines", lines)
                .with_data("created", created)
                .with_suggestions(["Read the file to verify", "Run tests to check if it works"]),
        )
    }
}

// ---------------------------------------------------------------------------
// ListFilesTool
// ---------------------------------------------------------------------------

/// List files under a directory, newest first. Hidden files are skipped.
pub struct ListFilesTool {
    pub working_dir: PathBuf,
}

impl ListFilesTool {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    const NAME: ToolName = ToolName::ListFiles;
    type Args = ListFilesArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        let dir = sandbox_check(&self.working_dir, &args.directory)?;
        if !dir.is_dir() {
            return Ok(
                ToolResult::failure(format!("Directory not found: {}", args.directory))
                    .with_suggestion("Check directory path"),
            );
        }

        let mut walker = WalkBuilder::new(&dir);
        walker
            .hidden(true)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false);
        if args.pattern != "*" {
            let mut overrides = OverrideBuilder::new(&dir);
            if let Err(e) = overrides.add(&args.pattern) {
                return Ok(ToolResult::failure(format!("Failed to list files: {e}"))
                    .with_suggestion("Check directory path"));
            }
            match overrides.build() {
                Ok(built) => {
                    walker.overrides(built);
                }
                Err(e) => {
                    return Ok(ToolResult::failure(format!("Failed to list files: {e}"))
                        .with_suggestion("Check directory path"));
                }
            }
        }

        let root = self.working_dir.canonicalize()?;
        let mut files: Vec<(PathBuf, u64, SystemTime)> = walker
            .build()
            .flatten()
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Some((entry.into_path(), meta.len(), modified))
            })
            .collect();
        files.sort_by(|a, b| b.2.cmp(&a.2));

        let total = files.len();
        let listed: Vec<_> = files
            .iter()
            .take(LIST_FILES_LIMIT)
            .map(|(path, size, _)| {
                let rel = path.strip_prefix(&root).unwrap_or(path);
                json!({
                    "path": rel.to_string_lossy(),
                    "size": size,
                    "extension": extension_of(path),
                })
            })
            .collect();

        Ok(ToolResult::success(format!(
            "Found {} files in {}",
            listed.len(),
            args.directory
        ))
        .with_data("files", listed)
        .with_data("total", total)
        .with_suggestions([
            "Read specific files to understand structure",
            "Search for specific content",
        ]))
    }
}
