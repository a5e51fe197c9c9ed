//! Autonomous agent runtime
//!
//! - [`decision`]: the decision collaborator seam and its OpenAI-compatible client
//! - [`tools`]: the tool registry and the concrete handlers behind the catalog
//! - [`control_loop`]: the decide → execute → record cycle for one session
//! - [`supervisor`]: back-to-back sessions under a wall-clock budget

pub mod config;
pub mod control_loop;
pub mod decision;
pub mod logging;
pub mod prompts;
pub mod state_machine;
pub mod supervisor;
pub mod tools;

pub use config::AgentConfig;
pub use control_loop::{AgentError, ControlLoop, LoopConfig, LoopOutcome};
pub use decision::{Decision, DecisionClient, DecisionError, OpenAiDecisionClient};
pub use state_machine::{LoopState, LoopStateMachine};
pub use supervisor::{LoopSessionRunner, SessionRunner, SessionSupervisor, SupervisorConfig};
pub use tools::{ToolContext, ToolRegistry};
