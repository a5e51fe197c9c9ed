//! Workspace layout
//!
//! Every component receives the same [`WorkspaceLayout`] through its
//! constructor; nothing reads paths from globals.

use crate::error::{HarnessError, HarnessResult};
use std::path::{Path, PathBuf};

/// Name of the persisted state document inside the workspace root
pub const STATE_FILE: &str = ".agent_state.json";
/// Directory holding the four memory documents
pub const MEMORY_DIR: &str = "memory";
/// Directory the tools operate in
pub const PROJECT_DIR: &str = "project";
/// Operation statistics document
pub const STATS_FILE: &str = "operation_stats.json";
/// Persistent operation log
pub const LOG_FILE: &str = "continuous_operation.log";

/// Resolved paths for one agent workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    /// Workspace root
    pub root: PathBuf,
    /// Directory tools are sandboxed to
    pub project_dir: PathBuf,
    /// Persisted [`AgentState`](crate::state::AgentState)
    pub state_path: PathBuf,
    /// Memory documents (`goals.md`, `progress.md`, ...)
    pub memory_dir: PathBuf,
    /// Persisted [`OperationStats`](crate::stats::OperationStats)
    pub stats_path: PathBuf,
    /// Operation log written by the binary's file sink
    pub log_path: PathBuf,
}

impl WorkspaceLayout {
    /// Derive all paths from a workspace root
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            project_dir: root.join(PROJECT_DIR),
            state_path: root.join(STATE_FILE),
            memory_dir: root.join(MEMORY_DIR),
            stats_path: root.join(STATS_FILE),
            log_path: root.join(LOG_FILE),
            root,
        }
    }

    /// Create the workspace, project and memory directories if missing.
    /// Fails fast when one of them exists as something other than a directory.
    pub fn ensure(&self) -> HarnessResult<()> {
        for dir in [&self.root, &self.project_dir, &self.memory_dir] {
            if dir.exists() && !dir.is_dir() {
                return Err(HarnessError::config(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
