//! Progress ledger
//!
//! Decides what counts as forward progress. The reliability monitor consumes
//! [`ProgressTracker::made_progress_recently`] as its progress signal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default trailing window for [`ProgressTracker::made_progress_recently`]
pub const DEFAULT_PROGRESS_WINDOW_SECS: u64 = 600;

/// Command substrings that identify a test runner
pub const TEST_RUNNER_TOKENS: &[&str] = &["pytest", "test", "jest", "vitest", "mocha", "rspec"];

/// Kind of evidence a milestone represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    FileCreated,
    FileModified,
    TestPassed,
    CommandSuccess,
}

impl std::fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileCreated => write!(f, "file_created"),
            Self::FileModified => write!(f, "file_modified"),
            Self::TestPassed => write!(f, "test_passed"),
            Self::CommandSuccess => write!(f, "command_success"),
        }
    }
}

/// One recorded piece of progress evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(rename = "type")]
    pub kind: MilestoneKind,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
}

/// Counters and sets reported by [`ProgressTracker::summary`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub files_created: usize,
    pub files_modified: usize,
    pub commands_run: usize,
    pub tests_passed: u32,
    pub errors_encountered: u32,
    pub milestones: usize,
    pub last_milestone: Option<DateTime<Utc>>,
}

/// In-memory progress ledger for one session
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    files_created: BTreeSet<String>,
    files_modified: BTreeSet<String>,
    commands_run: Vec<String>,
    milestones: Vec<Milestone>,
    tests_passed: u32,
    errors_encountered: u32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file_created(&mut self, path: impl Into<String>) {
        self.record_file_created_at(path, Utc::now());
    }

    pub fn record_file_created_at(&mut self, path: impl Into<String>, at: DateTime<Utc>) {
        let path = path.into();
        self.files_created.insert(path.clone());
        self.push(MilestoneKind::FileCreated, path, at);
    }

    pub fn record_file_modified(&mut self, path: impl Into<String>) {
        self.record_file_modified_at(path, Utc::now());
    }

    pub fn record_file_modified_at(&mut self, path: impl Into<String>, at: DateTime<Utc>) {
        let path = path.into();
        self.files_modified.insert(path.clone());
        self.push(MilestoneKind::FileModified, path, at);
    }

    /// Record a successful command; test runs count as `test_passed`
    pub fn record_command_success(&mut self, command: impl Into<String>) -> MilestoneKind {
        self.record_command_success_at(command, Utc::now())
    }

    pub fn record_command_success_at(
        &mut self,
        command: impl Into<String>,
        at: DateTime<Utc>,
    ) -> MilestoneKind {
        let command = command.into();
        let kind = if is_test_command(&command) {
            self.tests_passed += 1;
            MilestoneKind::TestPassed
        } else {
            MilestoneKind::CommandSuccess
        };
        self.commands_run.push(command.clone());
        self.push(kind, command, at);
        kind
    }

    /// Count a failed action. Errors are not milestones.
    pub fn record_error(&mut self) {
        self.errors_encountered += 1;
    }

    /// At least one milestone lies within the trailing `window_secs`
    pub fn made_progress_recently(&self, window_secs: u64) -> bool {
        self.made_progress_recently_at(window_secs, Utc::now())
    }

    pub fn made_progress_recently_at(&self, window_secs: u64, now: DateTime<Utc>) -> bool {
        // A window too large to represent reaches back past every milestone.
        let cutoff = i64::try_from(window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.milestones.iter().any(|m| m.timestamp >= cutoff)
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn files_created(&self) -> &BTreeSet<String> {
        &self.files_created
    }

    pub fn files_modified(&self) -> &BTreeSet<String> {
        &self.files_modified
    }

    pub fn tests_passed(&self) -> u32 {
        self.tests_passed
    }

    pub fn errors_encountered(&self) -> u32 {
        self.errors_encountered
    }

    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            files_created: self.files_created.len(),
            files_modified: self.files_modified.len(),
            commands_run: self.commands_run.len(),
            tests_passed: self.tests_passed,
            errors_encountered: self.errors_encountered,
            milestones: self.milestones.len(),
            last_milestone: self.milestones.last().map(|m| m.timestamp),
        }
    }

    fn push(&mut self, kind: MilestoneKind, subject: String, timestamp: DateTime<Utc>) {
        tracing::debug!(milestone = %kind, subject = %subject, "Milestone recorded");
        self.milestones.push(Milestone {
            kind,
            subject,
            timestamp,
        });
    }
}

/// Whether a command string invokes a recognized test runner
pub fn is_test_command(command: &str) -> bool {
    let lower = command.to_lowercase();
    TEST_RUNNER_TOKENS.iter().any(|token| lower.contains(token))
}
