//! Directory tree overview of the project.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use harness::tool_schema::{ProjectStructureArgs, ToolName, ToolResult};

use super::{Tool, ToolError};

/// Entries never shown in the tree
const SKIPPED_NAMES: &[&str] = &["__pycache__", ".git", "node_modules"];
const SKIPPED_SUFFIXES: &[&str] = &[".pyc"];

pub struct ProjectStructureTool {
    pub working_dir: PathBuf,
}

impl ProjectStructureTool {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
        }
    }
}

fn skipped(name: &str) -> bool {
    SKIPPED_NAMES.contains(&name) || SKIPPED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

#[derive(Default)]
struct TreeCounts {
    dirs: usize,
    files: usize,
}

/// Render `dir` as an indented tree, directories first, down to `max_depth` levels
pub fn render_tree(dir: &Path, max_depth: usize) -> std::io::Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "{}", dir.display());
    let mut counts = TreeCounts::default();
    render_level(dir, "", 1, max_depth, &mut out, &mut counts)?;
    let _ = write!(
        out,
        "\n{} directories, {} files\n",
        counts.dirs, counts.files
    );
    Ok(out)
}

fn render_level(
    dir: &Path,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    out: &mut String,
    counts: &mut TreeCounts,
) -> std::io::Result<()> {
    if depth > max_depth {
        return Ok(());
    }

    let mut entries: Vec<(String, PathBuf, bool)> = std::fs::read_dir(dir)?
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if skipped(&name) {
                return None;
            }
            let is_dir = entry.file_type().ok()?.is_dir();
            Some((name, entry.path(), is_dir))
        })
        .collect();
    entries.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

    let last = entries.len().saturating_sub(1);
    for (i, (name, path, is_dir)) in entries.iter().enumerate() {
        let (branch, indent) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        let _ = writeln!(out, "{prefix}{branch}{name}");
        if *is_dir {
            counts.dirs += 1;
            render_level(path, &format!("{prefix}{indent}"), depth + 1, max_depth, out, counts)?;
        } else {
            counts.files += 1;
        }
    }
    Ok(())
}

#[async_trait]
impl Tool for ProjectStructureTool {
    const NAME: ToolName = ToolName::GetProjectStructure;
    type Args = ProjectStructureArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        match render_tree(&self.working_dir, args.max_depth) {
            Ok(structure) => Ok(ToolResult::success("Project structure retrieved")
                .with_data("structure", structure)
                .with_suggestions([
                    "Read key files to understand the project",
                    "Search for specific functionality",
                ])),
            Err(e) => Ok(ToolResult::failure(format!("Failed to get structure: {e}"))
                .with_suggestion("Try listing files instead")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_tree_dirs_first_and_skips() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/__pycache__")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "").unwrap();
        std::fs::write(dir.path().join("src/app.pyc"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();

        let tree = render_tree(dir.path(), 3).unwrap();
        let body: Vec<&str> = tree.lines().skip(1).collect();
        assert_eq!(body[0], "├── src");
        assert_eq!(body[1], "│   └── app.py");
        assert_eq!(body[2], "└── README.md");
        assert!(!tree.contains("__pycache__"));
        assert!(!tree.contains(".git"));
        assert!(tree.contains("1 directories, 2 files"));
    }

    #[test]
    fn test_tree_depth_limit() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::write(dir.path().join("a/b/c/deep.txt"), "").unwrap();

        let tree = render_tree(dir.path(), 2).unwrap();
        assert!(tree.contains("b"));
        assert!(!tree.contains("deep.txt"));
    }

    #[tokio::test]
    async fn test_missing_root_is_failure() {
        let dir = tempdir().unwrap();
        let result = ProjectStructureTool::new(&dir.path().join("gone"))
            .call(ProjectStructureArgs { max_depth: 3 })
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.summary.starts_with("Failed to get structure"));
    }
}
