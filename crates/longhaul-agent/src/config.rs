use anyhow::{Context, Result};
use harness::reliability::ReliabilityConfig;
use serde::Deserialize;
use std::path::Path;

use crate::decision::history::{DEFAULT_KEEP_RECENT, DEFAULT_MAX_MESSAGES};

/// Runtime configuration for the agent.
///
/// Defaults come from `LONGHAUL_*` environment variables; a TOML file may
/// override any field, and CLI flags override both.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// OpenAI-compatible API base, e.g. `https://api.openai.com/v1`
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Client-side timeout for decision requests. None = wait indefinitely.
    pub request_timeout_secs: Option<u64>,
    /// Conversation message cap before compaction
    pub max_history_messages: usize,
    /// Turns retained by compaction
    pub keep_recent_messages: usize,
    /// Trailing window for the progress signal
    pub progress_window_secs: u64,
    /// Characters of stdout/stderr kept in command results
    pub output_limit: usize,
    /// Delay between supervised sessions
    pub restart_delay_secs: u64,
    /// Mirror logs into the workspace operation log
    pub log_to_file: bool,
    pub reliability: ReliabilityConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("LONGHAUL_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            model: std::env::var("LONGHAUL_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".into()),
            api_key: std::env::var("LONGHAUL_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok(),
            temperature: env_parse("LONGHAUL_TEMPERATURE").unwrap_or(0.7),
            request_timeout_secs: env_parse("LONGHAUL_REQUEST_TIMEOUT_SECS"),
            max_history_messages: DEFAULT_MAX_MESSAGES,
            keep_recent_messages: DEFAULT_KEEP_RECENT,
            progress_window_secs: harness::progress::DEFAULT_PROGRESS_WINDOW_SECS,
            output_limit: 1000,
            restart_delay_secs: env_parse("LONGHAUL_RESTART_DELAY_SECS").unwrap_or(10),
            log_to_file: true,
            reliability: ReliabilityConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load overrides from a TOML file on top of the environment defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Check whether the collaborator endpoint answers `GET {api_base}/models`
pub async fn check_endpoint(api_base: &str) -> bool {
    let models_url = format!("{}/models", api_base.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success() || resp.status().as_u16() == 401,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.max_history_messages, 20);
        assert_eq!(config.keep_recent_messages, 15);
        assert_eq!(config.progress_window_secs, 600);
        assert_eq!(config.output_limit, 1000);
        assert_eq!(config.reliability.watchdog_secs, 1800);
        assert_eq!(config.reliability.token_budget, 100_000);
    }

    #[test]
    fn test_toml_overrides_subset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("longhaul.toml");
        std::fs::write(
            &path,
            r#"
model = "local-coder"
api_base = "http://localhost:8080/v1"
restart_delay_secs = 2

[reliability]
watchdog_secs = 60
"#,
        )
        .unwrap();

        let config = AgentConfig::from_file(&path).unwrap();
        assert_eq!(config.model, "local-coder");
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.restart_delay_secs, 2);
        assert_eq!(config.reliability.watchdog_secs, 60);
        // untouched fields keep their defaults
        assert_eq!(config.reliability.token_budget, 100_000);
        assert_eq!(config.max_history_messages, 20);
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "model = [").unwrap();
        let err = AgentConfig::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }
}
