//! End-to-end tests for the harness
//!
//! Exercises the persisted model the way a session uses it:
//! - state round-trips through the store unchanged
//! - memory documents are replaced independently
//! - progress signals drive the reliability monitor

use harness::memory::MemoryKind;
use harness::progress::{ProgressTracker, DEFAULT_PROGRESS_WINDOW_SECS};
use harness::reliability::{LoopPattern, ReliabilityMonitor, RestartReason};
use harness::state::{self, build_context_summary, Phase, StateStore};
use harness::stats::{OperationStats, SessionResult};
use harness::tool_schema::ToolResult;
use harness::{HarnessError, WorkspaceLayout};
use std::time::Duration;
use tempfile::tempdir;

/// Setup a workspace with its directories created
fn setup_test_env() -> (tempfile::TempDir, StateStore) {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = WorkspaceLayout::new(dir.path());
    layout.ensure().unwrap();
    (dir, StateStore::new(layout))
}

// ---------------------------------------------------------------------------
// State persistence
// ---------------------------------------------------------------------------

#[test]
fn test_save_load_is_idempotent() {
    let (_dir, store) = setup_test_env();

    let mut agent_state = store.load().unwrap();
    agent_state.current_phase = Phase::Running;
    agent_state.set_metadata("goal_set", true);
    for i in 0..12 {
        agent_state = state::record_action(
            agent_state,
            &format!("write_file({{\"file_path\":\"f{i}.py\"}})"),
            &ToolResult::success(format!("Wrote f{i}.py (1 lines)")),
        );
    }
    agent_state = state::mark_reflected(agent_state);

    store.save(&agent_state).unwrap();
    let first = store.load().unwrap();
    assert_eq!(first, agent_state);

    store.save(&first).unwrap();
    let second = store.load().unwrap();
    assert_eq!(second, first);

    let raw_a = std::fs::read_to_string(&store.layout().state_path).unwrap();
    store.save(&second).unwrap();
    let raw_b = std::fs::read_to_string(&store.layout().state_path).unwrap();
    assert_eq!(raw_a, raw_b);
}

#[test]
fn test_persisted_history_never_exceeds_cap() {
    let (_dir, store) = setup_test_env();
    let mut agent_state = store.load().unwrap();

    for i in 0..60 {
        agent_state = state::record_action(agent_state, &format!("a{i}"), &ToolResult::success("ok"));
        store.save(&agent_state).unwrap();
        let persisted = store.load().unwrap();
        assert!(persisted.recent_actions.len() <= 20);
    }

    let persisted = store.load().unwrap();
    assert_eq!(persisted.total_actions, 60);
    assert_eq!(persisted.recent_actions.last().unwrap().action, "a59");
}

#[test]
fn test_persisted_phase_uses_wire_names() {
    let (_dir, store) = setup_test_env();
    let mut agent_state = store.load().unwrap();
    agent_state.current_phase = Phase::ErrorAbort;
    store.save(&agent_state).unwrap();

    let raw = std::fs::read_to_string(&store.layout().state_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["current_phase"], "error_abort");
    assert_eq!(value["metadata"]["goal_set"], false);
}

// ---------------------------------------------------------------------------
// Memory documents
// ---------------------------------------------------------------------------

#[test]
fn test_update_goals_leaves_others_unchanged() {
    let (_dir, store) = setup_test_env();
    store.update_memory_file("progress", "step 1 done").unwrap();
    store.update_memory_file("blockers", "").unwrap();

    store.update_memory_file("goals", "Build a CLI").unwrap();
    let memory = store.load_memory().unwrap();

    assert_eq!(memory.get(MemoryKind::Goals), Some("Build a CLI"));
    assert_eq!(memory.get(MemoryKind::Progress), Some("step 1 done"));
    assert_eq!(memory.get(MemoryKind::Blockers), Some(""));
    assert_eq!(memory.get(MemoryKind::Decisions), None);
    assert_eq!(memory.len(), 3);
}

#[test]
fn test_memory_update_is_full_replace() {
    let (_dir, store) = setup_test_env();
    store.update_memory_file("decisions", "use sqlite\nuse axum").unwrap();
    store.update_memory_file("decisions", "use postgres").unwrap();
    let memory = store.load_memory().unwrap();
    assert_eq!(memory.get(MemoryKind::Decisions), Some("use postgres"));
}

#[test]
fn test_unknown_memory_kind_fails_fast() {
    let (_dir, store) = setup_test_env();
    let err = store.update_memory_file("scratchpad", "x").unwrap_err();
    assert!(matches!(err, HarnessError::UnknownMemoryKind { .. }));
    assert!(store.load_memory().unwrap().is_empty());
}

#[test]
fn test_context_summary_reflects_persisted_memory() {
    let (_dir, store) = setup_test_env();
    store.update_memory_file("goals", "# Goals\nship v1").unwrap();
    let agent_state = store.load().unwrap();
    let memory = store.load_memory().unwrap();

    let summary = build_context_summary(&agent_state, &memory);
    assert!(summary.contains("# Goals\nship v1"));
    assert!(summary.contains("### Progress\nNone"));
    assert_eq!(summary, build_context_summary(&agent_state, &memory));
}

// ---------------------------------------------------------------------------
// Progress → reliability
// ---------------------------------------------------------------------------

#[test]
fn test_repeated_command_triggers_loop_restart() {
    let mut monitor = ReliabilityMonitor::default();
    for _ in 0..3 {
        monitor.record_action("run_command(pytest)", false, 0);
    }

    let decision = monitor.should_restart();
    assert!(decision.should_restart());
    assert_eq!(decision.code(), "loop_detected");
    assert_eq!(
        decision.reason,
        Some(RestartReason::LoopDetected {
            pattern: LoopPattern::Repeating {
                action: "run_command(pytest)".to_string()
            }
        })
    );
}

#[test]
fn test_tracker_progress_keeps_watchdog_quiet() {
    let mut tracker = ProgressTracker::new();
    let mut monitor = ReliabilityMonitor::default();
    assert!(!tracker.made_progress_recently(DEFAULT_PROGRESS_WINDOW_SECS));

    tracker.record_file_created("hello.py");
    let progressed = tracker.made_progress_recently(DEFAULT_PROGRESS_WINDOW_SECS);
    assert!(progressed);

    monitor.record_action("write_file(hello.py)", progressed, 120_000);
    assert!(!monitor.check_watchdog());
    assert!(!monitor.check_token_waste());
    assert!(!monitor.should_restart().should_restart());
}

// ---------------------------------------------------------------------------
// Operation stats
// ---------------------------------------------------------------------------

#[test]
fn test_stats_written_to_layout_path() {
    let (_dir, store) = setup_test_env();
    let path = &store.layout().stats_path;

    let mut stats = OperationStats::new("goal", 0.0, 5, 60);
    stats.record_session(&SessionResult::failed(Duration::from_millis(10), "panic in session"));
    stats.save(path).unwrap();

    let loaded = OperationStats::load(path).unwrap().unwrap();
    assert_eq!(loaded.sessions_failed, 1);
    assert_eq!(loaded.errors[0].error, "panic in session");
}
