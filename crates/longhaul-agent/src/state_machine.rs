//! Control loop state machine: explicit states and legal transition guards.
//!
//! Every session starts at `Init`, alternates between `Running` and
//! `Reflecting`, and ends in exactly one terminal state. Each transition is
//! validated against the state graph and recorded with its reason so a
//! session's stop can be explained after the fact.

use std::fmt;
use std::time::Instant;

use harness::Phase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Session constructed, no iteration run yet.
    Init,
    /// Deciding and executing actions.
    Running,
    /// Reflecting on recent work; consumes one iteration.
    Reflecting,
    /// The collaborator signalled the goal is achieved.
    Complete,
    /// The collaborator asked for human input.
    Paused,
    /// The per-session iteration cap was reached.
    IterationLimit,
    /// External interrupt honored at an iteration boundary.
    Interrupted,
    /// Per-session wall-clock timeout reached.
    TimedOut,
    /// The reliability monitor asked for a fresh session.
    RestartRequested,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Init | Self::Running | Self::Reflecting)
    }

    /// Phase written to the state document on entering this state, if any
    pub fn persisted_phase(self) -> Option<Phase> {
        match self {
            Self::Running => Some(Phase::Running),
            Self::Reflecting => Some(Phase::Reflecting),
            Self::Complete => Some(Phase::Complete),
            Self::Paused => Some(Phase::Paused),
            Self::RestartRequested => Some(Phase::ErrorAbort),
            Self::Init | Self::IterationLimit | Self::Interrupted | Self::TimedOut => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Reflecting => "reflecting",
            Self::Complete => "complete",
            Self::Paused => "paused",
            Self::IterationLimit => "iteration_limit",
            Self::Interrupted => "interrupted",
            Self::TimedOut => "timed_out",
            Self::RestartRequested => "restart_requested",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal transitions:
/// ```text
/// Init       → Running | <terminal>
/// Running    → Reflecting | <terminal>
/// Reflecting → Running | <terminal>
/// ```
fn is_legal_transition(from: LoopState, to: LoopState) -> bool {
    use LoopState::*;

    if from.is_terminal() {
        return false;
    }
    if to.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Init, Running) | (Running, Reflecting) | (Reflecting, Running)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: LoopState,
    pub to: LoopState,
    /// Iteration number at the time of transition (0 before the first)
    pub iteration: u32,
    /// Milliseconds since the session started
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal loop transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: LoopState,
    pub to: LoopState,
}

/// Current state plus the full transition log for one session.
pub struct LoopStateMachine {
    current: LoopState,
    iteration: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl LoopStateMachine {
    pub fn new() -> Self {
        Self {
            current: LoopState::Init,
            iteration: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> LoopState {
        self.current
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn set_iteration(&mut self, iteration: u32) {
        self.iteration = iteration;
    }

    /// Move to `to`, or fail if the edge is not in the state graph.
    pub fn advance(&mut self, to: LoopState, reason: &str) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::info!(
            from = %self.current,
            to = %to,
            iteration = self.iteration,
            reason,
            "Loop transition"
        );

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            iteration: self.iteration,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: Some(reason.to_string()),
        });
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Reason attached to the transition into the current state
    pub fn last_reason(&self) -> Option<&str> {
        self.transitions.last().and_then(|t| t.reason.as_deref())
    }

    /// One-line history, e.g. `init → running → reflecting → running → complete`
    pub fn summary(&self) -> String {
        let mut states = vec![LoopState::Init.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        format!(
            "{} ({}ms, {} transitions)",
            states.join(" → "),
            self.created_at.elapsed().as_millis(),
            self.transitions.len()
        )
    }
}

impl Default for LoopStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = LoopStateMachine::new();
        assert_eq!(sm.current(), LoopState::Init);
        assert!(!sm.is_terminal());
        assert!(sm.transitions().is_empty());
    }

    #[test]
    fn test_reflection_round_trip() {
        let mut sm = LoopStateMachine::new();
        sm.advance(LoopState::Running, "session started").unwrap();
        sm.set_iteration(11);
        sm.advance(LoopState::Reflecting, "10 actions since reflection")
            .unwrap();
        sm.advance(LoopState::Running, "reflection done").unwrap();
        sm.advance(LoopState::Complete, "goal complete").unwrap();

        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 4);
        assert_eq!(sm.transitions()[1].iteration, 11);
        assert_eq!(sm.last_reason(), Some("goal complete"));
        assert!(sm
            .summary()
            .starts_with("init → running → reflecting → running → complete"));
    }

    #[test]
    fn test_illegal_transitions() {
        let mut sm = LoopStateMachine::new();
        let err = sm.advance(LoopState::Reflecting, "too early").unwrap_err();
        assert_eq!(err.from, LoopState::Init);
        assert_eq!(err.to, LoopState::Reflecting);

        sm.advance(LoopState::Running, "start").unwrap();
        sm.advance(LoopState::Paused, "need input").unwrap();
        // terminal states are final
        assert!(sm.advance(LoopState::Running, "resume").is_err());
        assert!(sm.advance(LoopState::Complete, "done").is_err());
        assert_eq!(sm.current(), LoopState::Paused);
    }

    #[test]
    fn test_terminal_from_init() {
        let mut sm = LoopStateMachine::new();
        sm.advance(LoopState::Interrupted, "interrupt before first iteration")
            .unwrap();
        assert!(sm.is_terminal());
    }

    #[test]
    fn test_phase_mapping() {
        assert_eq!(LoopState::Complete.persisted_phase(), Some(Phase::Complete));
        assert_eq!(LoopState::Paused.persisted_phase(), Some(Phase::Paused));
        assert_eq!(
            LoopState::RestartRequested.persisted_phase(),
            Some(Phase::ErrorAbort)
        );
        assert_eq!(LoopState::IterationLimit.persisted_phase(), None);
        assert_eq!(LoopState::TimedOut.persisted_phase(), None);
        assert_eq!(LoopState::Interrupted.persisted_phase(), None);
    }
}
