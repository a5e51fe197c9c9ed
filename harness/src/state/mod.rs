//! Persisted run state and the store that owns it

pub mod context;
pub mod store;
pub mod types;

pub use context::build_context_summary;
pub use store::{mark_reflected, record_action, should_reflect, StateStore};
pub use types::{ActionRecord, AgentState, Phase, MAX_RECENT_ACTIONS, REFLECTION_INTERVAL};
