//! Reliability monitor
//!
//! Detects stagnation within a session: repeated or alternating actions, too
//! long without progress, or too many tokens spent since the last progress.
//! Checks are evaluated in a fixed priority order; a detected loop preempts
//! the generic watchdog and token reports.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Thresholds for the monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityConfig {
    /// Ring buffer capacity for recent action descriptors
    pub history_capacity: usize,
    /// Consecutive identical descriptors that count as a loop
    pub loop_window: usize,
    /// Seconds without progress before the watchdog fires
    pub watchdog_secs: u64,
    /// Tokens spent without progress before token waste fires
    pub token_budget: u64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            loop_window: 3,
            watchdog_secs: 1800,
            token_budget: 100_000,
        }
    }
}

/// A repetition pattern found in recent actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum LoopPattern {
    /// The same descriptor repeated
    Repeating { action: String },
    /// Two descriptors alternating (A, B, A, B)
    Alternating { first: String, second: String },
}

impl std::fmt::Display for LoopPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repeating { action } => write!(f, "{action}"),
            Self::Alternating { first, second } => write!(f, "{first} <-> {second}"),
        }
    }
}

/// Why a session should be restarted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RestartReason {
    LoopDetected { pattern: LoopPattern },
    WatchdogTimeout { seconds_since_progress: i64 },
    TokenWaste { tokens_since_progress: u64 },
}

impl RestartReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::LoopDetected { .. } => "loop_detected",
            Self::WatchdogTimeout { .. } => "watchdog_timeout",
            Self::TokenWaste { .. } => "token_waste",
        }
    }
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoopDetected { pattern } => write!(f, "loop_detected: {pattern}"),
            Self::WatchdogTimeout {
                seconds_since_progress,
            } => write!(
                f,
                "watchdog_timeout: no progress for {seconds_since_progress}s"
            ),
            Self::TokenWaste {
                tokens_since_progress,
            } => write!(
                f,
                "token_waste: {tokens_since_progress} tokens without progress"
            ),
        }
    }
}

/// Outcome of [`ReliabilityMonitor::should_restart`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartDecision {
    pub reason: Option<RestartReason>,
}

impl RestartDecision {
    pub fn should_restart(&self) -> bool {
        self.reason.is_some()
    }

    /// Reason code, or `"none"`
    pub fn code(&self) -> &'static str {
        self.reason.as_ref().map_or("none", RestartReason::code)
    }

    /// Human-readable explanation
    pub fn details(&self) -> String {
        match &self.reason {
            Some(reason) => reason.to_string(),
            None => "no restart needed".to_string(),
        }
    }
}

/// Read-only snapshot of the monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub recent_actions: Vec<String>,
    pub seconds_since_progress: i64,
    pub tokens_since_progress: u64,
    pub loop_detected: Option<LoopPattern>,
    pub watchdog_triggered: bool,
    pub token_waste: bool,
}

/// Stagnation detector for one session
#[derive(Debug, Clone)]
pub struct ReliabilityMonitor {
    config: ReliabilityConfig,
    recent: VecDeque<String>,
    last_progress: DateTime<Utc>,
    tokens_since_progress: u64,
}

impl ReliabilityMonitor {
    pub fn new(config: ReliabilityConfig) -> Self {
        Self::new_at(config, Utc::now())
    }

    /// Monitor whose progress clock starts at `now`
    pub fn new_at(config: ReliabilityConfig, now: DateTime<Utc>) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.history_capacity),
            config,
            last_progress: now,
            tokens_since_progress: 0,
        }
    }

    pub fn config(&self) -> &ReliabilityConfig {
        &self.config
    }

    pub fn record_action(&mut self, descriptor: &str, made_progress: bool, tokens_used: u64) {
        self.record_action_at(descriptor, made_progress, tokens_used, Utc::now());
    }

    pub fn record_action_at(
        &mut self,
        descriptor: &str,
        made_progress: bool,
        tokens_used: u64,
        now: DateTime<Utc>,
    ) {
        self.recent.push_back(descriptor.to_string());
        while self.recent.len() > self.config.history_capacity {
            self.recent.pop_front();
        }

        self.tokens_since_progress = self.tokens_since_progress.saturating_add(tokens_used);

        if made_progress {
            self.last_progress = now;
            self.tokens_since_progress = 0;
        }
    }

    /// Repeated descriptor over the loop window, or a 2-cycle over the last four
    pub fn detect_loop(&self) -> Option<LoopPattern> {
        let n = self.recent.len();
        let window = self.config.loop_window.max(1);

        if n >= window {
            let last = &self.recent[n - 1];
            if self.recent.range(n - window..).all(|d| d == last) {
                return Some(LoopPattern::Repeating {
                    action: last.clone(),
                });
            }
        }

        if n >= 4 {
            let (a, b, c, d) = (
                &self.recent[n - 4],
                &self.recent[n - 3],
                &self.recent[n - 2],
                &self.recent[n - 1],
            );
            if d == b && c == a && a != b {
                return Some(LoopPattern::Alternating {
                    first: a.clone(),
                    second: b.clone(),
                });
            }
        }

        None
    }

    pub fn check_watchdog(&self) -> bool {
        self.check_watchdog_at(Utc::now())
    }

    /// Elapsed time since the last progress strictly exceeds the watchdog limit
    pub fn check_watchdog_at(&self, now: DateTime<Utc>) -> bool {
        // A limit too large to represent never fires.
        let Some(limit) = i64::try_from(self.config.watchdog_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
        else {
            return false;
        };
        now - self.last_progress > limit
    }

    /// Tokens spent since the last progress strictly exceed the budget
    pub fn check_token_waste(&self) -> bool {
        self.tokens_since_progress > self.config.token_budget
    }

    pub fn should_restart(&self) -> RestartDecision {
        self.should_restart_at(Utc::now())
    }

    /// Loop detection, then watchdog, then token waste; first positive wins
    pub fn should_restart_at(&self, now: DateTime<Utc>) -> RestartDecision {
        let reason = if let Some(pattern) = self.detect_loop() {
            Some(RestartReason::LoopDetected { pattern })
        } else if self.check_watchdog_at(now) {
            Some(RestartReason::WatchdogTimeout {
                seconds_since_progress: self.seconds_since_progress_at(now),
            })
        } else if self.check_token_waste() {
            Some(RestartReason::TokenWaste {
                tokens_since_progress: self.tokens_since_progress,
            })
        } else {
            None
        };

        RestartDecision { reason }
    }

    pub fn get_status(&self) -> MonitorStatus {
        self.get_status_at(Utc::now())
    }

    pub fn get_status_at(&self, now: DateTime<Utc>) -> MonitorStatus {
        MonitorStatus {
            recent_actions: self.recent.iter().cloned().collect(),
            seconds_since_progress: self.seconds_since_progress_at(now),
            tokens_since_progress: self.tokens_since_progress,
            loop_detected: self.detect_loop(),
            watchdog_triggered: self.check_watchdog_at(now),
            token_waste: self.check_token_waste(),
        }
    }

    fn seconds_since_progress_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_progress).num_seconds()
    }
}

impl Default for ReliabilityMonitor {
    fn default() -> Self {
        Self::new(ReliabilityConfig::default())
    }
}
