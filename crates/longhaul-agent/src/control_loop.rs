//! The decide → execute → record cycle.
//!
//! ## Lifecycle
//!
//! ```text
//! ControlLoop::run(goal)
//!   → load state + memory, seed goal if given      Init → Running
//!   → loop, checking interrupt / timeout / cap at each iteration boundary:
//!       should_reflect?  → reflection prompt        Running → Reflecting → Running
//!       otherwise        → context + directive, decide, dispatch, record
//!       feed tracker + monitor, persist, consult should_restart()
//!   → terminal: Complete | Paused | IterationLimit | Interrupted
//!               | TimedOut | RestartRequested
//! ```
//!
//! Failures while deciding become a failed `"error"` action and the loop
//! continues; tool failures are ordinary failed results. Only persistence
//! errors and illegal transitions escape as [`AgentError`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use harness::progress::ProgressSummary;
use harness::reliability::ReliabilityConfig;
use harness::state::{build_context_summary, mark_reflected, record_action, should_reflect};
use harness::{
    AgentState, HarnessError, MemoryKind, MemorySnapshot, ProgressTracker, ReliabilityMonitor,
    StateStore, ToolName, ToolResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::decision::{
    ChatMessage, ConversationHistory, Decision, DecisionClient, DecisionError, DecisionRequest,
    DecisionResponse, ToolInvocation,
};
use crate::prompts;
use crate::state_machine::{IllegalTransition, LoopState, LoopStateMachine};
use crate::tools::ToolRegistry;

/// Descriptor recorded when a decision round trip fails
pub const ERROR_DESCRIPTOR: &str = "error";

/// Errors that end a session
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

/// Per-session limits and tuning
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_iterations: u32,
    /// Checked at iteration boundaries. None = no limit.
    pub session_timeout: Option<Duration>,
    pub progress_window_secs: u64,
    pub max_history_messages: usize,
    pub keep_recent_messages: usize,
    pub reliability: ReliabilityConfig,
}

impl LoopConfig {
    pub fn new(config: &AgentConfig, max_iterations: u32, session_timeout: Option<Duration>) -> Self {
        Self {
            max_iterations,
            session_timeout,
            progress_window_secs: config.progress_window_secs,
            max_history_messages: config.max_history_messages,
            keep_recent_messages: config.keep_recent_messages,
            reliability: config.reliability.clone(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::new(&AgentConfig::default(), 100, None)
    }
}

/// How a session ended
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub final_state: LoopState,
    pub reason: String,
    pub iterations: u32,
    /// Actions recorded during this session
    pub actions_performed: u64,
    /// Persisted cumulative counter at session end
    pub total_actions: u64,
    pub progress: ProgressSummary,
}

/// What one decide/execute step produced
#[derive(Default)]
struct StepOutcome {
    terminal: Option<(LoopState, String)>,
    recorded_action: bool,
    /// Free-text reply with no tool call attached
    reasoning: Option<String>,
}

impl StepOutcome {
    fn terminal(state: LoopState, reason: impl Into<String>) -> Self {
        Self {
            terminal: Some((state, reason.into())),
            ..Default::default()
        }
    }
}

pub struct ControlLoop {
    store: StateStore,
    client: Arc<dyn DecisionClient>,
    tools: ToolRegistry,
    config: LoopConfig,
    history: ConversationHistory,
    tracker: ProgressTracker,
    monitor: ReliabilityMonitor,
    machine: LoopStateMachine,
    cancel: CancellationToken,
}

impl ControlLoop {
    pub fn new(
        store: StateStore,
        client: Arc<dyn DecisionClient>,
        tools: ToolRegistry,
        config: LoopConfig,
    ) -> Self {
        Self {
            history: ConversationHistory::new(
                config.max_history_messages,
                config.keep_recent_messages,
            ),
            monitor: ReliabilityMonitor::new(config.reliability.clone()),
            tracker: ProgressTracker::new(),
            machine: LoopStateMachine::new(),
            cancel: CancellationToken::new(),
            store,
            client,
            tools,
            config,
        }
    }

    /// Honor `token` at iteration boundaries and while awaiting a decision
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state_machine(&self) -> &LoopStateMachine {
        &self.machine
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn monitor(&self) -> &ReliabilityMonitor {
        &self.monitor
    }

    /// Replace the goals document with the goal template and flag the state
    pub fn seed_goal(&self, state: &mut AgentState, goal: &str) -> Result<(), AgentError> {
        self.store
            .write_memory(MemoryKind::Goals, &prompts::goal_template(goal))?;
        state.set_metadata("goal_set", true);
        info!(goal, "Goal set");
        Ok(())
    }

    /// Run one session to a terminal state
    pub async fn run(&mut self, goal: Option<&str>) -> Result<LoopOutcome, AgentError> {
        let started = Instant::now();
        let mut state = self.store.load()?;
        if let Some(goal) = goal {
            self.seed_goal(&mut state, goal)?;
        }
        let starting_actions = state.total_actions;
        let mut memory = self.store.load_memory()?;

        state.session_start = Utc::now();
        self.transition(&mut state, LoopState::Running, "session started")?;

        let mut iteration: u32 = 0;
        while !self.machine.is_terminal() {
            if let Some((to, reason)) = self.boundary_check(started, iteration) {
                self.transition(&mut state, to, &reason)?;
                break;
            }

            iteration += 1;
            self.machine.set_iteration(iteration);
            debug!(iteration, max = self.config.max_iterations, "Iteration");

            let reflecting = should_reflect(&state);
            let step = if reflecting {
                self.transition(
                    &mut state,
                    LoopState::Reflecting,
                    "reflection interval reached",
                )?;
                let prompt = prompts::reflection_prompt(&state, &memory);
                self.set_leading(&state, &memory);
                self.history.push(ChatMessage::user(prompt));
                self.step(&mut state).await
            } else {
                self.set_leading(&state, &memory);
                self.step(&mut state).await
            };

            if let Some((to, reason)) = step.terminal {
                self.transition(&mut state, to, &reason)?;
                break;
            }

            if step.recorded_action {
                let verdict = self.monitor.should_restart();
                if verdict.should_restart() {
                    warn!(iteration, reason = %verdict.details(), "Reliability monitor requested restart");
                    self.transition(&mut state, LoopState::RestartRequested, &verdict.details())?;
                    break;
                }
            }

            if reflecting {
                state = mark_reflected(state);
                memory = self.store.load_memory()?;
                self.history.reset();
                if let Some(text) = step.reasoning {
                    info!(reflection = %text, "Reflection");
                    self.history
                        .push(ChatMessage::assistant_text(format!("Reflection: {text}")));
                }
                self.transition(&mut state, LoopState::Running, "reflection complete")?;
            } else {
                if let Some(text) = step.reasoning {
                    info!(iteration, "{text}");
                }
                memory = self.store.load_memory()?;
            }

            self.history.compact_if_needed();
            self.store.save(&state)?;
        }

        let outcome = LoopOutcome {
            final_state: self.machine.current(),
            reason: self.machine.last_reason().unwrap_or_default().to_string(),
            iterations: iteration,
            actions_performed: state.total_actions.saturating_sub(starting_actions),
            total_actions: state.total_actions,
            progress: self.tracker.summary(),
        };
        info!(
            final_state = %outcome.final_state,
            reason = %outcome.reason,
            iterations = outcome.iterations,
            actions = outcome.actions_performed,
            history = %self.machine.summary(),
            "Session finished"
        );
        Ok(outcome)
    }

    /// Interrupt, timeout and iteration cap, in that order
    fn boundary_check(&self, started: Instant, iteration: u32) -> Option<(LoopState, String)> {
        if self.cancel.is_cancelled() {
            return Some((LoopState::Interrupted, "interrupted".to_string()));
        }
        if let Some(limit) = self.config.session_timeout {
            if started.elapsed() >= limit {
                return Some((
                    LoopState::TimedOut,
                    format!("session timeout of {}s reached", limit.as_secs()),
                ));
            }
        }
        if iteration >= self.config.max_iterations {
            return Some((
                LoopState::IterationLimit,
                format!("iteration cap of {} reached", self.config.max_iterations),
            ));
        }
        None
    }

    fn set_leading(&mut self, state: &AgentState, memory: &MemorySnapshot) {
        let context = build_context_summary(state, memory);
        self.history
            .set_leading(ChatMessage::system(prompts::leading_message(&context)));
    }

    async fn decide(&self) -> Result<DecisionResponse, DecisionError> {
        let request = DecisionRequest {
            messages: self.history.messages(),
            tools: self.tools.specs(),
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(DecisionError::Cancelled),
            response = self.client.decide(request) => response,
        }
    }

    async fn step(&mut self, state: &mut AgentState) -> StepOutcome {
        let response = match self.decide().await {
            Ok(response) => response,
            Err(DecisionError::Cancelled) => {
                return StepOutcome::terminal(LoopState::Interrupted, "interrupted while deciding");
            }
            Err(e) => {
                warn!(error = %e, "Decision failed");
                let result = ToolResult::failure(format!("Error: {e}"));
                self.tracker.record_error();
                self.record(state, ERROR_DESCRIPTOR, &result, 0);
                return StepOutcome {
                    recorded_action: true,
                    ..Default::default()
                };
            }
        };

        let tokens = response.usage.total_tokens;
        self.history.push(response.message);

        match response.decision {
            Decision::ToolCall(invocation) => {
                let result = self.execute(state, &invocation, tokens).await;
                if invocation.name == ToolName::CompleteGoal.as_str() && result.success {
                    return StepOutcome {
                        terminal: Some((LoopState::Complete, result.summary)),
                        recorded_action: true,
                        reasoning: None,
                    };
                }
                StepOutcome {
                    recorded_action: true,
                    ..Default::default()
                }
            }
            Decision::Complete { summary } => StepOutcome::terminal(LoopState::Complete, summary),
            Decision::NeedInput { question } => {
                info!(%question, "Collaborator needs input");
                StepOutcome::terminal(LoopState::Paused, format!("need input: {question}"))
            }
            Decision::Reasoning { text } => StepOutcome {
                reasoning: Some(text),
                ..Default::default()
            },
        }
    }

    async fn execute(
        &mut self,
        state: &mut AgentState,
        invocation: &ToolInvocation,
        tokens: u64,
    ) -> ToolResult {
        let result = self
            .tools
            .dispatch(&invocation.name, invocation.arguments.clone())
            .await;

        let payload = serde_json::to_string(&result).unwrap_or_else(|_| result.summary.clone());
        self.history
            .push(ChatMessage::tool_result(&invocation.id, payload));

        info!(
            iteration = self.machine.iteration(),
            tool = %invocation.name,
            status = if result.success { "✓" } else { "✗" },
            summary = %result.summary,
            "Action"
        );

        self.track(invocation, &result);
        self.record(state, &invocation.descriptor(), &result, tokens);
        result
    }

    /// Feed a tool result to the progress ledger
    fn track(&mut self, invocation: &ToolInvocation, result: &ToolResult) {
        if !result.success {
            self.tracker.record_error();
            return;
        }
        match invocation.name.parse::<ToolName>() {
            Ok(ToolName::WriteFile) => {
                let path = result
                    .data
                    .get("path")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let created = result
                    .data
                    .get("created")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if created {
                    self.tracker.record_file_created(path);
                } else {
                    self.tracker.record_file_modified(path);
                }
            }
            Ok(ToolName::RunCommand) => {
                let command = invocation.arguments["command"].as_str().unwrap_or_default();
                self.tracker.record_command_success(command);
            }
            _ => {}
        }
    }

    /// Append the action to state and the reliability monitor
    fn record(&mut self, state: &mut AgentState, descriptor: &str, result: &ToolResult, tokens: u64) {
        *state = record_action(state.clone(), descriptor, result);
        let made_progress = self
            .tracker
            .made_progress_recently(self.config.progress_window_secs);
        self.monitor.record_action(descriptor, made_progress, tokens);
    }

    /// Validated transition, mirrored into the persisted phase
    fn transition(
        &mut self,
        state: &mut AgentState,
        to: LoopState,
        reason: &str,
    ) -> Result<(), AgentError> {
        self.machine.advance(to, reason)?;
        if let Some(phase) = to.persisted_phase() {
            state.current_phase = phase;
        }
        self.store.save(state)?;
        Ok(())
    }
}
