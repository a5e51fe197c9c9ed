//! Cross-session operation statistics

use crate::error::HarnessResult;
use crate::state::store::write_json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Outcome of one supervised session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub success: bool,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Actions performed during this session
    pub total_actions: u64,
    pub error: Option<String>,
    /// Terminal state the session ended in, when it ended normally
    pub stop_reason: Option<String>,
}

impl SessionResult {
    pub fn completed(duration: Duration, total_actions: u64, stop_reason: impl Into<String>) -> Self {
        Self {
            success: true,
            duration,
            total_actions,
            error: None,
            stop_reason: Some(stop_reason.into()),
        }
    }

    pub fn failed(duration: Duration, error: impl Into<String>) -> Self {
        Self {
            success: false,
            duration,
            total_actions: 0,
            error: Some(error.into()),
            stop_reason: None,
        }
    }
}

/// One entry in the ordered error log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

/// Statistics for a supervised run, rewritten after every session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub goal: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_hours: f64,
    pub session_iterations: u32,
    pub session_timeout_secs: u64,
    pub sessions_completed: u32,
    pub sessions_failed: u32,
    pub total_actions: u64,
    /// Sum of session durations
    pub total_runtime_secs: f64,
    /// Supervisor wall-clock time, set when the run is finalized
    pub wall_clock_secs: Option<f64>,
    pub errors: Vec<ErrorLogEntry>,
    pub last_stop_reason: Option<String>,
}

impl OperationStats {
    pub fn new(
        goal: impl Into<String>,
        duration_hours: f64,
        session_iterations: u32,
        session_timeout_secs: u64,
    ) -> Self {
        Self {
            goal: goal.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_hours,
            session_iterations,
            session_timeout_secs,
            sessions_completed: 0,
            sessions_failed: 0,
            total_actions: 0,
            total_runtime_secs: 0.0,
            wall_clock_secs: None,
            errors: Vec::new(),
            last_stop_reason: None,
        }
    }

    /// Fold one session's result into the totals
    pub fn record_session(&mut self, result: &SessionResult) {
        if result.success {
            self.sessions_completed += 1;
            self.total_actions += result.total_actions;
            if result.stop_reason.is_some() {
                self.last_stop_reason = result.stop_reason.clone();
            }
        } else {
            self.sessions_failed += 1;
            self.errors.push(ErrorLogEntry {
                timestamp: Utc::now(),
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown session failure".to_string()),
            });
        }
        self.total_runtime_secs += result.duration.as_secs_f64();
    }

    /// Stamp the end of the run
    pub fn finalize(&mut self, wall_clock: Duration) {
        self.ended_at = Some(Utc::now());
        self.wall_clock_secs = Some(wall_clock.as_secs_f64());
    }

    pub fn sessions_total(&self) -> u32 {
        self.sessions_completed + self.sessions_failed
    }

    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> HarnessResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
