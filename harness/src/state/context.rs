//! Context summary rendering
//!
//! Output depends only on the state and memory passed in; no clocks, no
//! environment.

use crate::memory::{MemoryKind, MemorySnapshot};
use crate::state::types::AgentState;
use std::fmt::Write;

/// Number of action records included in the context summary
pub const CONTEXT_RECENT_ACTIONS: usize = 5;

/// Render the context packet handed to the decision collaborator
pub fn build_context_summary(state: &AgentState, memory: &MemorySnapshot) -> String {
    let files = if state.files_in_context.is_empty() {
        "None".to_string()
    } else {
        state.files_in_context.join(", ")
    };

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "# Agent Context\n\n\
         ## Current State\n\
         - Working Directory: {}\n\
         - Current Phase: {}\n\
         - Total Actions: {}\n\
         - Actions Since Last Reflection: {}\n\n\
         ## Files in Context\n{}\n\n\
         ## Recent Actions (Last {})\n",
        state.current_working_directory.display(),
        state.current_phase,
        state.total_actions,
        state.actions_since_reflection,
        files,
        CONTEXT_RECENT_ACTIONS,
    );

    for record in state.last_actions(CONTEXT_RECENT_ACTIONS) {
        let _ = writeln!(
            out,
            "{} {}: {}",
            record.status_mark(),
            record.action,
            record.summary
        );
    }

    let _ = write!(
        out,
        "\n## Memory\n\n### Goals\n{}\n\n### Progress\n{}\n\n### Blockers\n{}\n",
        memory.get_or(MemoryKind::Goals, "Not set"),
        memory.get_or(MemoryKind::Progress, "None"),
        memory.get_or(MemoryKind::Blockers, "None"),
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::store::record_action;
    use crate::tool_schema::ToolResult;

    #[test]
    fn test_summary_is_deterministic() {
        let mut state = AgentState::new("/ws/project");
        state = record_action(state, "list_files({})", &ToolResult::success("Found 2 files in ."));
        let mut memory = MemorySnapshot::new();
        memory.insert(MemoryKind::Goals, "ship it");

        let a = build_context_summary(&state, &memory);
        let b = build_context_summary(&state.clone(), &memory.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn test_summary_defaults_for_missing_documents() {
        let state = AgentState::new("/ws/project");
        let summary = build_context_summary(&state, &MemorySnapshot::new());
        assert!(summary.contains("### Goals\nNot set\n"));
        assert!(summary.contains("### Progress\nNone\n"));
        assert!(summary.contains("### Blockers\nNone\n"));
        assert!(summary.contains("## Files in Context\nNone\n"));
        assert!(summary.contains("- Current Phase: initialization"));
    }

    #[test]
    fn test_summary_shows_last_five_actions() {
        let mut state = AgentState::new("/p");
        for i in 0..8 {
            let result = if i % 2 == 0 {
                ToolResult::success(format!("step {i}"))
            } else {
                ToolResult::failure(format!("step {i}"))
            };
            state = record_action(state, &format!("act{i}"), &result);
        }
        let summary = build_context_summary(&state, &MemorySnapshot::new());
        assert!(!summary.contains("act2:"));
        assert!(summary.contains("✗ act3: step 3"));
        assert!(summary.contains("✓ act4: step 4"));
        assert!(summary.contains("✗ act7: step 7"));
        assert!(summary.contains("- Total Actions: 8"));
    }

    #[test]
    fn test_summary_omits_decisions_document() {
        let state = AgentState::new("/p");
        let mut memory = MemorySnapshot::new();
        memory.insert(MemoryKind::Decisions, "use sqlite");
        memory.insert(MemoryKind::Blockers, "no network");
        let summary = build_context_summary(&state, &memory);
        assert!(!summary.contains("use sqlite"));
        assert!(summary.contains("### Blockers\nno network\n"));
    }
}
