//! Tools that act on the agent's own session: memory documents and goal completion.

use async_trait::async_trait;
use harness::tool_schema::{CompleteGoalArgs, ToolName, ToolResult, UpdateMemoryArgs};
use harness::StateStore;

use super::{Tool, ToolError};

/// Replace one of the four memory documents
pub struct UpdateMemoryTool {
    store: StateStore,
}

impl UpdateMemoryTool {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateMemoryTool {
    const NAME: ToolName = ToolName::UpdateMemory;
    type Args = UpdateMemoryArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        self.store.write_memory(args.file_type, &args.content)?;
        Ok(
            ToolResult::success(format!("Updated {} memory", args.file_type))
                .with_suggestion("Continue with next task"),
        )
    }
}

/// Signals that the goal is achieved. The control loop acts on the
/// invocation; the handler only acknowledges it.
pub struct CompleteGoalTool;

#[async_trait]
impl Tool for CompleteGoalTool {
    const NAME: ToolName = ToolName::CompleteGoal;
    type Args = CompleteGoalArgs;

    async fn call(&self, args: Self::Args) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::success(args.summary))
    }
}
