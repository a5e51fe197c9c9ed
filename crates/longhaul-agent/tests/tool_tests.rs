//! Tool dispatch tests: filesystem only, no decision collaborator needed.

use std::fs;

use harness::tool_schema::{catalog, ToolName};
use harness::{MemoryKind, StateStore, WorkspaceLayout};
use longhaul_agent::{ToolContext, ToolRegistry};
use serde_json::json;
use tempfile::TempDir;

fn registry() -> (TempDir, StateStore, ToolRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let layout = WorkspaceLayout::new(dir.path());
    layout.ensure().unwrap();
    let store = StateStore::new(layout.clone());
    let ctx = ToolContext::new(&layout.project_dir);
    let tools = ToolRegistry::with_defaults(&ctx, store.clone()).unwrap();
    (dir, store, tools)
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[test]
fn test_registry_advertises_full_catalog() {
    let (_dir, _store, tools) = registry();
    assert_eq!(tools.len(), ToolName::ALL.len());
    assert_eq!(tools.specs(), catalog());
}

// ---------------------------------------------------------------------------
// Filesystem tools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let (_dir, store, tools) = registry();

    let result = tools
        .dispatch(
            "write_file",
            json!({"file_path": "pkg/main.py", "content": "a = 1\nb = 2\n"}),
        )
        .await;
    assert!(result.success, "{}", result.summary);
    assert_eq!(result.data["created"], json!(true));
    assert!(store.layout().project_dir.join("pkg/main.py").is_file());

    let result = tools
        .dispatch("read_file", json!({"file_path": "pkg/main.py", "start_line": 2}))
        .await;
    assert!(result.success);
    assert_eq!(result.summary, "Read pkg/main.py (lines 2-2, 2 total lines)");
    assert_eq!(result.data["content"], json!("b = 2\n"));
    assert_eq!(result.data["extension"], json!(".py"));
}

#[tokio::test]
async fn test_overwrite_reports_not_created() {
    let (_dir, store, tools) = registry();
    fs::write(store.layout().project_dir.join("notes.txt"), "old").unwrap();

    let result = tools
        .dispatch("write_file", json!({"file_path": "notes.txt", "content": "new"}))
        .await;
    assert!(result.success);
    assert_eq!(result.data["created"], json!(false));
    assert_eq!(
        fs::read_to_string(store.layout().project_dir.join("notes.txt")).unwrap(),
        "new"
    );
}

#[tokio::test]
async fn test_read_missing_file_is_failed_result() {
    let (_dir, _store, tools) = registry();
    let result = tools
        .dispatch("read_file", json!({"file_path": "nope.py"}))
        .await;
    assert!(!result.success);
    assert_eq!(result.summary, "File not found: nope.py");
    assert!(!result.next_suggestions.is_empty());
}

#[tokio::test]
async fn test_sandbox_escape_is_failed_result() {
    let (dir, _store, tools) = registry();
    fs::write(dir.path().join("secret.txt"), "hidden").unwrap();

    let result = tools
        .dispatch("read_file", json!({"file_path": "../secret.txt"}))
        .await;
    assert!(!result.success);
    assert!(result.summary.starts_with("Tool execution failed"));

    let result = tools
        .dispatch("write_file", json!({"file_path": "/tmp/escape.txt", "content": "x"}))
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn test_write_through_parent_of_missing_dir() {
    let (_dir, store, tools) = registry();
    let result = tools
        .dispatch("write_file", json!({"file_path": "src/../main.py", "content": "x = 1\n"}))
        .await;
    assert!(result.success, "{}", result.summary);
    assert!(store.layout().project_dir.join("main.py").is_file());
    assert!(!store.layout().project_dir.join("src").exists());
}

#[tokio::test]
async fn test_list_files_with_pattern() {
    let (_dir, store, tools) = registry();
    let project = &store.layout().project_dir;
    fs::create_dir_all(project.join("src")).unwrap();
    fs::write(project.join("src/a.py"), "").unwrap();
    fs::write(project.join("src/b.rs"), "").unwrap();
    fs::write(project.join("top.py"), "").unwrap();

    let result = tools
        .dispatch("list_files", json!({"pattern": "*.py"}))
        .await;
    assert!(result.success);
    assert_eq!(result.data["total"], json!(2));
    let paths: Vec<&str> = result.data["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"top.py"));
    assert!(paths.contains(&"src/a.py"));
}

#[tokio::test]
async fn test_project_structure() {
    let (_dir, store, tools) = registry();
    let project = &store.layout().project_dir;
    fs::create_dir_all(project.join("src/__pycache__")).unwrap();
    fs::write(project.join("src/app.py"), "").unwrap();

    let result = tools.dispatch("get_project_structure", json!({})).await;
    assert!(result.success);
    let tree = result.data["structure"].as_str().unwrap();
    assert!(tree.contains("app.py"));
    assert!(!tree.contains("__pycache__"));
    assert!(tree.ends_with("1 directories, 1 files\n"));
}

// ---------------------------------------------------------------------------
// Session tools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_update_memory_persists() {
    let (_dir, store, tools) = registry();
    let result = tools
        .dispatch(
            "update_memory",
            json!({"file_type": "decisions", "content": "Use sqlite"}),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.summary, "Updated decisions memory");

    let memory = store.load_memory().unwrap();
    assert_eq!(memory.get(MemoryKind::Decisions), Some("Use sqlite"));
}

#[tokio::test]
async fn test_complete_goal_echoes_summary() {
    let (_dir, _store, tools) = registry();
    let result = tools
        .dispatch("complete_goal", json!({"summary": "all done"}))
        .await;
    assert!(result.success);
    assert_eq!(result.summary, "all done");
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_tool() {
    let (_dir, _store, tools) = registry();
    let result = tools.dispatch("rm_rf", json!({})).await;
    assert!(!result.success);
    assert_eq!(result.summary, "Unknown tool: rm_rf");
}

#[tokio::test]
async fn test_missing_required_argument() {
    let (_dir, _store, tools) = registry();
    let result = tools.dispatch("write_file", json!({"file_path": "a.txt"})).await;
    assert!(!result.success);
    assert!(result.summary.contains("content"), "{}", result.summary);
}

// ---------------------------------------------------------------------------
// run_command
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test]
async fn test_run_command_in_project_dir() {
    let (_dir, store, tools) = registry();
    fs::write(store.layout().project_dir.join("marker.txt"), "").unwrap();

    let result = tools
        .dispatch("run_command", json!({"command": "ls"}))
        .await;
    assert!(result.success);
    assert_eq!(result.data["exit_code"], json!(0));
    assert!(result.data["stdout"].as_str().unwrap().contains("marker.txt"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_run_command_timeout() {
    let (_dir, _store, tools) = registry();
    let result = tools
        .dispatch("run_command", json!({"command": "sleep 5", "timeout": 1}))
        .await;
    assert!(!result.success);
    assert_eq!(result.summary, "Command timed out after 1s: sleep 5");
}
