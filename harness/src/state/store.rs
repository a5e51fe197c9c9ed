//! State store
//!
//! Load/save of the persisted [`AgentState`] and the memory documents, plus
//! the pure state-transition helpers the control loop applies once per
//! iteration.

use crate::config::WorkspaceLayout;
use crate::error::{HarnessError, HarnessResult};
use crate::memory::{MemoryKind, MemorySnapshot};
use crate::state::types::{ActionRecord, AgentState, MAX_RECENT_ACTIONS, REFLECTION_INTERVAL};
use crate::tool_schema::ToolResult;
use chrono::Utc;
use std::path::Path;

/// Reads and writes one workspace's state document and memory documents
#[derive(Debug, Clone)]
pub struct StateStore {
    layout: WorkspaceLayout,
}

impl StateStore {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Load the persisted state, or a fresh default one if none exists
    pub fn load(&self) -> HarnessResult<AgentState> {
        let path = &self.layout.state_path;
        if !path.exists() {
            return Ok(AgentState::new(&self.layout.project_dir));
        }

        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| HarnessError::CorruptState {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    /// Overwrite the persisted snapshot
    pub fn save(&self, state: &AgentState) -> HarnessResult<()> {
        write_json(&self.layout.state_path, state)
    }

    /// Load whichever memory documents currently exist
    pub fn load_memory(&self) -> HarnessResult<MemorySnapshot> {
        let mut snapshot = MemorySnapshot::new();
        for kind in MemoryKind::ALL {
            let path = self.memory_path(kind);
            if path.exists() {
                snapshot.insert(kind, std::fs::read_to_string(&path)?);
            }
        }
        Ok(snapshot)
    }

    /// Replace one memory document addressed by name.
    ///
    /// Fails with [`HarnessError::UnknownMemoryKind`] for names outside the
    /// fixed four; nothing is written in that case.
    pub fn update_memory_file(&self, kind: &str, content: &str) -> HarnessResult<MemoryKind> {
        let kind: MemoryKind = kind.parse()?;
        self.write_memory(kind, content)?;
        Ok(kind)
    }

    /// Replace one memory document. Full replace, never a merge.
    pub fn write_memory(&self, kind: MemoryKind, content: &str) -> HarnessResult<()> {
        std::fs::create_dir_all(&self.layout.memory_dir)?;
        std::fs::write(self.memory_path(kind), content)?;
        tracing::debug!(kind = %kind, bytes = content.len(), "Memory document updated");
        Ok(())
    }

    fn memory_path(&self, kind: MemoryKind) -> std::path::PathBuf {
        self.layout.memory_dir.join(kind.file_name())
    }
}

/// Serialize `value` as pretty JSON and overwrite `path`
pub(crate) fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> HarnessResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Append an action record, trimming history to [`MAX_RECENT_ACTIONS`]
pub fn record_action(mut state: AgentState, descriptor: &str, result: &ToolResult) -> AgentState {
    state
        .recent_actions
        .push(ActionRecord::new(descriptor, result.success, &result.summary));

    if state.recent_actions.len() > MAX_RECENT_ACTIONS {
        let excess = state.recent_actions.len() - MAX_RECENT_ACTIONS;
        state.recent_actions.drain(..excess);
    }

    state.total_actions += 1;
    state.actions_since_reflection += 1;
    state
}

/// Whether enough actions have accumulated to warrant a reflection
pub fn should_reflect(state: &AgentState) -> bool {
    state.actions_since_reflection >= REFLECTION_INTERVAL
}

/// Stamp the reflection time and reset the reflection counter
pub fn mark_reflected(mut state: AgentState) -> AgentState {
    state.last_reflection = Some(Utc::now());
    state.actions_since_reflection = 0;
    state
}
