//! Prompt text sent to the decision collaborator.

use harness::{AgentState, MemoryKind, MemorySnapshot};

use crate::decision::NEED_INPUT_MARKER;

/// Records embedded in the reflection prompt
pub const REFLECTION_RECENT_ACTIONS: usize = 10;

pub fn system_directive() -> String {
    format!(
        "You are an autonomous coding agent working toward a goal.

Your memory and state are provided in the context. Use them to maintain continuity.

You have tools for:
- Searching files (search_files)
- Reading files (read_file)
- Writing files (write_file)
- Listing files (list_files)
- Running commands (run_command)
- Getting project structure (get_project_structure)
- Updating memory (update_memory)
- Completing goal (complete_goal)

Work step by step:
1. Understand the current goal from memory
2. Check what you've done (recent actions)
3. Decide the next logical action
4. Use tools to make progress
5. Update memory with important findings

When you achieve the goal, call complete_goal with a summary.

Be autonomous - don't ask for permission, just do what's needed.
If you truly cannot continue without a human, reply with a single line starting with `{NEED_INPUT_MARKER}` followed by your question.
Document your decisions in memory files.
Run tests to verify your work.
"
    )
}

/// Leading message: directive followed by the current context summary
pub fn leading_message(context: &str) -> String {
    format!("{}\n{context}", system_directive())
}

/// Goals document written when a run is seeded with a goal
pub fn goal_template(goal: &str) -> String {
    format!(
        "# Goals

## Primary Objective
{goal}

## Success Criteria
- [ ] Goal clearly understood
- [ ] Approach identified
- [ ] Implementation complete
- [ ] Verification done

## Constraints
- Work within the project directory
- Use available tools
- Document decisions

## Current Focus
Starting work on the goal
"
    )
}

pub fn reflection_prompt(state: &AgentState, memory: &MemorySnapshot) -> String {
    let recent = state.last_actions(REFLECTION_RECENT_ACTIONS);
    let recent_json = serde_json::to_string_pretty(recent).unwrap_or_else(|_| "[]".into());

    format!(
        "Time to reflect on your recent work.

## Recent Actions (last {REFLECTION_RECENT_ACTIONS})
{recent_json}

## Current Memory

### Goals
{goals}

### Progress
{progress}

### Blockers
{blockers}

Reflect honestly:
1. Am I making progress toward the goal?
2. What's working well?
3. What's not working?
4. Should I change my approach?
5. What should I update in memory?

Provide a brief reflection and update memory files if needed using the update_memory tool.",
        goals = memory.get_or(MemoryKind::Goals, "Not set"),
        progress = memory.get_or(MemoryKind::Progress, "None"),
        blockers = memory.get_or(MemoryKind::Blockers, "None"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness::state::record_action;
    use harness::ToolResult;

    #[test]
    fn test_directive_names_every_tool() {
        let directive = system_directive();
        for tool in harness::ToolName::ALL {
            assert!(directive.contains(tool.as_str()), "missing {tool}");
        }
        assert!(directive.contains("NEED_INPUT:"));
    }

    #[test]
    fn test_goal_template() {
        let goals = goal_template("Build a CLI todo app");
        assert!(goals.starts_with("# Goals\n\n## Primary Objective\nBuild a CLI todo app\n"));
        assert!(goals.contains("- [ ] Verification done"));
    }

    #[test]
    fn test_reflection_prompt_embeds_last_ten() {
        let mut state = AgentState::new("/tmp/project");
        for i in 0..12 {
            state = record_action(state, &format!("step_{i}()"), &ToolResult::success("ok"));
        }
        let mut memory = MemorySnapshot::new();
        memory.insert(MemoryKind::Progress, "halfway");

        let prompt = reflection_prompt(&state, &memory);
        assert!(!prompt.contains("step_1()"));
        assert!(prompt.contains("step_2()"));
        assert!(prompt.contains("step_11()"));
        assert!(prompt.contains("### Goals\nNot set"));
        assert!(prompt.contains("### Progress\nhalfway"));
        assert!(prompt.contains("5. What should I update in memory?"));
    }
}
