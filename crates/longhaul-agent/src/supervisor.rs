//! Long-running supervision: back-to-back sessions under a wall-clock budget.
//!
//! Each session runs on its own tokio task so that a panic inside it is
//! contained and recorded as a failed session. The supervisor stops when the
//! duration budget is spent (checked after each session, so at least one
//! session always runs), when the persisted phase is `complete`, or on
//! interrupt. [`OperationStats`] are persisted after every session.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use harness::{HarnessResult, OperationStats, SessionResult, StateStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::control_loop::{ControlLoop, LoopConfig, LoopOutcome};
use crate::decision::DecisionClient;
use crate::tools::{ToolContext, ToolRegistry};

/// Runs one session against the workspace. `goal` is only passed to the
/// first session of a supervised run.
#[async_trait]
pub trait SessionRunner: Send + Sync + 'static {
    async fn run_session(
        &self,
        goal: Option<String>,
        cancel: CancellationToken,
    ) -> anyhow::Result<LoopOutcome>;
}

/// Production runner: a fresh [`ControlLoop`] per session
pub struct LoopSessionRunner {
    store: StateStore,
    client: Arc<dyn DecisionClient>,
    tool_context: ToolContext,
    loop_config: LoopConfig,
}

impl LoopSessionRunner {
    pub fn new(
        store: StateStore,
        client: Arc<dyn DecisionClient>,
        tool_context: ToolContext,
        loop_config: LoopConfig,
    ) -> Self {
        Self {
            store,
            client,
            tool_context,
            loop_config,
        }
    }
}

#[async_trait]
impl SessionRunner for LoopSessionRunner {
    async fn run_session(
        &self,
        goal: Option<String>,
        cancel: CancellationToken,
    ) -> anyhow::Result<LoopOutcome> {
        let tools = ToolRegistry::with_defaults(&self.tool_context, self.store.clone())?;
        let mut control = ControlLoop::new(
            self.store.clone(),
            Arc::clone(&self.client),
            tools,
            self.loop_config.clone(),
        )
        .with_cancellation(cancel);
        Ok(control.run(goal.as_deref()).await?)
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub goal: String,
    /// Wall-clock budget for the whole run
    pub duration: Duration,
    pub session_iterations: u32,
    pub session_timeout: Duration,
    pub restart_delay: Duration,
}

impl SupervisorConfig {
    /// Negative or NaN budgets become zero; budgets too large to represent
    /// saturate to [`Duration::MAX`].
    pub fn from_hours(goal: impl Into<String>, hours: f64) -> Self {
        let secs = hours.max(0.0) * 3600.0;
        let duration = Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        });
        Self {
            goal: goal.into(),
            duration,
            session_iterations: 50,
            session_timeout: Duration::from_secs(3600),
            restart_delay: Duration::from_secs(10),
        }
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration.as_secs_f64() / 3600.0
    }
}

pub struct SessionSupervisor<R: SessionRunner> {
    runner: Arc<R>,
    store: StateStore,
    config: SupervisorConfig,
    cancel: CancellationToken,
}

impl<R: SessionRunner> SessionSupervisor<R> {
    pub fn new(runner: R, store: StateStore, config: SupervisorConfig) -> Self {
        Self {
            runner: Arc::new(runner),
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run sessions until the budget is spent, the goal completes, or an
    /// interrupt arrives. Only stats persistence errors are returned.
    pub async fn run(&self) -> HarnessResult<OperationStats> {
        let started = Instant::now();
        let stats_path = &self.store.layout().stats_path;
        let mut stats = OperationStats::new(
            &self.config.goal,
            self.config.duration_hours(),
            self.config.session_iterations,
            self.config.session_timeout.as_secs(),
        );
        stats.save(stats_path)?;

        info!(
            goal = %self.config.goal,
            hours = self.config.duration_hours(),
            session_iterations = self.config.session_iterations,
            "Supervised run starting"
        );

        let mut session: u32 = 0;
        loop {
            session += 1;
            let goal = (session == 1 && !self.config.goal.is_empty())
                .then(|| self.config.goal.clone());
            info!(session, elapsed_secs = started.elapsed().as_secs(), "Starting session");

            let span = info_span!("session", session, id = %Uuid::new_v4());
            let result = self.run_one(goal).instrument(span).await;
            match &result.error {
                None => info!(
                    session,
                    actions = result.total_actions,
                    stop_reason = result.stop_reason.as_deref().unwrap_or(""),
                    "Session completed"
                ),
                Some(e) => error!(session, error = %e, "Session failed"),
            }
            stats.record_session(&result);
            stats.save(stats_path)?;

            if self.cancel.is_cancelled() {
                info!("Interrupted; stopping supervised run");
                break;
            }
            if self.goal_complete() {
                info!(session, "Goal complete; stopping supervised run");
                break;
            }
            if started.elapsed() >= self.config.duration {
                info!(session, "Duration budget spent; stopping supervised run");
                break;
            }

            info!(delay_secs = self.config.restart_delay.as_secs(), "Restarting after delay");
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Interrupted during restart delay");
                    break;
                }
                _ = tokio::time::sleep(self.config.restart_delay) => {}
            }
        }

        stats.finalize(started.elapsed());
        stats.save(stats_path)?;
        info!(
            sessions_completed = stats.sessions_completed,
            sessions_failed = stats.sessions_failed,
            total_actions = stats.total_actions,
            "Supervised run finished"
        );
        Ok(stats)
    }

    async fn run_one(&self, goal: Option<String>) -> SessionResult {
        let before = self.persisted_actions();
        let session_started = Instant::now();

        let runner = Arc::clone(&self.runner);
        let cancel = self.cancel.clone();
        let joined = tokio::spawn(
            async move { runner.run_session(goal, cancel).await }.in_current_span(),
        )
        .await;
        let elapsed = session_started.elapsed();

        match joined {
            Ok(Ok(outcome)) => {
                let performed = self.persisted_actions().saturating_sub(before);
                SessionResult::completed(elapsed, performed, outcome.final_state.to_string())
            }
            Ok(Err(e)) => SessionResult::failed(elapsed, format!("{e:#}")),
            Err(join) if join.is_panic() => SessionResult::failed(
                elapsed,
                format!("session panicked: {}", panic_message(join.into_panic())),
            ),
            Err(join) => SessionResult::failed(elapsed, join.to_string()),
        }
    }

    fn persisted_actions(&self) -> u64 {
        match self.store.load() {
            Ok(state) => state.total_actions,
            Err(e) => {
                warn!(error = %e, "Could not read persisted state");
                0
            }
        }
    }

    fn goal_complete(&self) -> bool {
        self.store.load().map(|s| s.is_complete()).unwrap_or(false)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hours() {
        let config = SupervisorConfig::from_hours("goal", 0.5);
        assert_eq!(config.duration, Duration::from_secs(1800));
        assert_eq!(config.duration_hours(), 0.5);
        assert_eq!(SupervisorConfig::from_hours("g", -1.0).duration, Duration::ZERO);
        assert_eq!(SupervisorConfig::from_hours("g", f64::NAN).duration, Duration::ZERO);
        assert_eq!(
            SupervisorConfig::from_hours("g", f64::NEG_INFINITY).duration,
            Duration::ZERO
        );
    }

    #[test]
    fn test_from_hours_saturates() {
        assert_eq!(
            SupervisorConfig::from_hours("g", f64::INFINITY).duration,
            Duration::MAX
        );
        assert_eq!(SupervisorConfig::from_hours("g", 1e16).duration, Duration::MAX);
        assert!(SupervisorConfig::from_hours("g", 1e16).duration_hours() > 1e15);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic payload");
    }
}
