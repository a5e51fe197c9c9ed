use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use harness::{StateStore, WorkspaceLayout};
use longhaul_agent::config::{check_endpoint, AgentConfig};
use longhaul_agent::decision::{DecisionClient, OpenAiDecisionClient};
use longhaul_agent::{
    logging, ControlLoop, LoopConfig, LoopSessionRunner, SessionSupervisor, SupervisorConfig,
    ToolContext, ToolRegistry,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run an autonomous agent toward a goal, restarting sessions until the
/// goal completes or the time budget runs out.
#[derive(Parser, Debug)]
#[command(name = "longhaul", version)]
struct Cli {
    /// Goal for the agent. Omit to resume from the workspace's goals memory.
    goal: Option<String>,

    /// Wall-clock budget in hours
    #[arg(long, default_value_t = 24.0)]
    hours: f64,

    /// Workspace directory (state, memory, project, stats)
    #[arg(long, default_value = "./workspace")]
    workspace: PathBuf,

    /// Iteration cap per session
    #[arg(long, default_value_t = 50)]
    session_iterations: u32,

    /// Per-session timeout in seconds
    #[arg(long, default_value_t = 3600)]
    session_timeout: u64,

    /// Seconds to wait between sessions
    #[arg(long)]
    restart_delay: Option<u64>,

    /// TOML file overriding the environment defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging when RUST_LOG is unset
    #[arg(short, long)]
    verbose: bool,

    /// Run a single session without supervision
    #[arg(long)]
    single: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_file(path)?,
        None => AgentConfig::default(),
    };
    if let Some(delay) = cli.restart_delay {
        config.restart_delay_secs = delay;
    }

    let layout = WorkspaceLayout::new(&cli.workspace);
    layout.ensure()?;
    logging::init(
        cli.verbose,
        config.log_to_file.then_some(layout.log_path.as_path()),
    )?;

    info!(
        workspace = %layout.root.display(),
        model = %config.model,
        api_base = %config.api_base,
        "longhaul starting"
    );
    if !check_endpoint(&config.api_base).await {
        warn!(
            api_base = %config.api_base,
            "Decision endpoint not reachable; actions will fail until it answers"
        );
    }

    let client: Arc<dyn DecisionClient> = Arc::new(OpenAiDecisionClient::new(&config)?);
    let store = StateStore::new(layout.clone());
    let tool_context = ToolContext::new(&layout.project_dir).with_output_limit(config.output_limit);
    let loop_config = LoopConfig::new(
        &config,
        cli.session_iterations,
        Some(Duration::from_secs(cli.session_timeout)),
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping at the next iteration boundary");
            interrupt.cancel();
        }
    });

    if cli.single {
        let tools = ToolRegistry::with_defaults(&tool_context, store.clone())?;
        let mut control =
            ControlLoop::new(store, client, tools, loop_config).with_cancellation(cancel);
        let outcome = control.run(cli.goal.as_deref()).await?;
        info!(
            final_state = %outcome.final_state,
            reason = %outcome.reason,
            total_actions = outcome.total_actions,
            workspace = %layout.root.display(),
            "Agent stopped"
        );
        return Ok(());
    }

    let supervisor_config = SupervisorConfig {
        session_iterations: cli.session_iterations,
        session_timeout: Duration::from_secs(cli.session_timeout),
        restart_delay: Duration::from_secs(config.restart_delay_secs),
        ..SupervisorConfig::from_hours(cli.goal.unwrap_or_default(), cli.hours)
    };
    let runner = LoopSessionRunner::new(store.clone(), client, tool_context, loop_config);
    let stats = SessionSupervisor::new(runner, store, supervisor_config)
        .with_cancellation(cancel)
        .run()
        .await?;

    info!(
        sessions_completed = stats.sessions_completed,
        sessions_failed = stats.sessions_failed,
        total_actions = stats.total_actions,
        stats = %layout.stats_path.display(),
        "Operation complete"
    );
    Ok(())
}
