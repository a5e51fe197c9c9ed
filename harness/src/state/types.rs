//! Persisted run state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// State document format version
pub const STATE_VERSION: &str = "0.1.0";

/// Maximum number of action records kept in [`AgentState::recent_actions`]
pub const MAX_RECENT_ACTIONS: usize = 20;

/// Number of actions between reflections
pub const REFLECTION_INTERVAL: u32 = 10;

/// Lifecycle phase recorded in the state document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fresh state, no session has run yet
    #[default]
    Initialization,
    /// A session is deciding and executing actions
    Running,
    /// A session is reflecting on recent work
    Reflecting,
    /// The goal was completed; the supervisor stops on this marker
    Complete,
    /// The collaborator asked for human input
    Paused,
    /// The reliability monitor aborted the last session
    ErrorAbort,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::Running => "running",
            Self::Reflecting => "reflecting",
            Self::Complete => "complete",
            Self::Paused => "paused",
            Self::ErrorAbort => "error_abort",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed action. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    /// Action descriptor, e.g. `run_command({"command":"pytest"})`
    pub action: String,
    pub success: bool,
    pub summary: String,
}

impl ActionRecord {
    pub fn new(action: impl Into<String>, success: bool, summary: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            success,
            summary: summary.into(),
        }
    }

    /// Status glyph used in rendered summaries
    pub fn status_mark(&self) -> &'static str {
        if self.success {
            "✓"
        } else {
            "✗"
        }
    }
}

/// Persisted agent state, one document per workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub version: String,
    pub initialized_at: DateTime<Utc>,
    pub session_start: DateTime<Utc>,
    /// Directory the tools operate in
    pub current_working_directory: PathBuf,
    #[serde(default)]
    pub files_in_context: Vec<String>,
    /// Last [`MAX_RECENT_ACTIONS`] actions, oldest first
    #[serde(default)]
    pub recent_actions: Vec<ActionRecord>,
    #[serde(default)]
    pub current_phase: Phase,
    #[serde(default)]
    pub actions_since_reflection: u32,
    #[serde(default)]
    pub last_reflection: Option<DateTime<Utc>>,
    /// Monotonic action counter across all sessions
    #[serde(default)]
    pub total_actions: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AgentState {
    /// Fresh state for a workspace whose tools run in `working_directory`
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        let mut metadata = Map::new();
        metadata.insert("goal_set".into(), Value::Bool(false));
        metadata.insert("project_initialized".into(), Value::Bool(false));

        Self {
            version: STATE_VERSION.to_string(),
            initialized_at: now,
            session_start: now,
            current_working_directory: working_directory.into(),
            files_in_context: Vec::new(),
            recent_actions: Vec::new(),
            current_phase: Phase::Initialization,
            actions_since_reflection: 0,
            last_reflection: None,
            total_actions: 0,
            metadata,
        }
    }

    /// Most recent `n` action records, oldest first
    pub fn last_actions(&self, n: usize) -> &[ActionRecord] {
        let start = self.recent_actions.len().saturating_sub(n);
        &self.recent_actions[start..]
    }

    /// Whether the persisted completion marker is set
    pub fn is_complete(&self) -> bool {
        self.current_phase == Phase::Complete
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::ErrorAbort).unwrap();
        assert_eq!(json, "\"error_abort\"");
        let phase: Phase = serde_json::from_str("\"reflecting\"").unwrap();
        assert_eq!(phase, Phase::Reflecting);
        assert_eq!(Phase::Complete.to_string(), "complete");
    }

    #[test]
    fn test_new_state_defaults() {
        let state = AgentState::new("/ws/project");
        assert_eq!(state.current_phase, Phase::Initialization);
        assert_eq!(state.total_actions, 0);
        assert_eq!(state.actions_since_reflection, 0);
        assert!(state.last_reflection.is_none());
        assert_eq!(state.metadata["goal_set"], Value::Bool(false));
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_last_actions_window() {
        let mut state = AgentState::new("/p");
        for i in 0..3 {
            state
                .recent_actions
                .push(ActionRecord::new(format!("a{i}"), true, "ok"));
        }
        let last = state.last_actions(5);
        assert_eq!(last.len(), 3);
        let last = state.last_actions(2);
        assert_eq!(last[0].action, "a1");
        assert_eq!(last[1].action, "a2");
    }
}
