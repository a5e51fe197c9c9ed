//! Long-running agent harness
//!
//! The persisted model and supervision primitives behind the `longhaul`
//! control loop:
//!
//! - [`state`]: run state, action history and the [`state::StateStore`]
//! - [`memory`]: the four memory documents
//! - [`progress`]: the progress ledger that decides what counts as progress
//! - [`reliability`]: loop, watchdog and token-waste detection
//! - [`tool_schema`]: the tool catalog contract and [`tool_schema::ToolResult`]
//! - [`classifier`]: pluggable command output classification
//! - [`stats`]: cross-session operation statistics

pub mod classifier;
pub mod config;
pub mod error;
pub mod memory;
pub mod progress;
pub mod reliability;
pub mod state;
pub mod stats;
pub mod tool_schema;

pub use config::WorkspaceLayout;
pub use error::{HarnessError, HarnessResult};
pub use memory::{MemoryKind, MemorySnapshot};
pub use progress::ProgressTracker;
pub use reliability::{ReliabilityConfig, ReliabilityMonitor, RestartDecision, RestartReason};
pub use state::{AgentState, Phase, StateStore};
pub use stats::{OperationStats, SessionResult};
pub use tool_schema::{ToolName, ToolResult, ToolSpec};
