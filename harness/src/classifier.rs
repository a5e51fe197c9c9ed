//! Command output classification
//!
//! Heuristic extraction of errors, warnings, test results and file mentions
//! from shell output. Results are hints for the collaborator, nothing more.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Matches kept per pattern
const MAX_MATCHES_PER_PATTERN: usize = 5;
/// File mentions kept per analysis
const MAX_FILES_MENTIONED: usize = 10;

static ERROR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?im)\berror:?\s+(.+)$", r"(?im)\bexception:?\s+(.+)$", r"(?m)^(Traceback.*)$"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static WARNING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(?im)\bwarning:?\s+(.+)$", r"(?im)\bwarn:?\s+(.+)$"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static PYTEST_BOTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) passed.*?(\d+) failed").unwrap());

static PYTEST_FAILED_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) failed.*?(\d+) passed").unwrap());

static PYTEST_PASSED_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) passed").unwrap());

static JEST_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tests:\s+(?:(\d+) failed,\s+)?(\d+) passed,\s+(\d+) total").unwrap()
});

static GENERIC_PASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpass(?:ed)?\b").unwrap());

static GENERIC_FAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfail(?:ed)?\b").unwrap());

static FILE_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w/.-]+\.(?:py|js|ts|rs|go|java|cpp|c|h)\b").unwrap()
});

/// Broad category of a shell command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Test,
    Build,
    Run,
    Install,
    Other,
}

impl CommandKind {
    /// Detect the kind from the command text; earlier categories win
    pub fn detect(command: &str) -> Self {
        let lower = command.to_lowercase();
        let has = |tokens: &[&str]| tokens.iter().any(|t| lower.contains(t));

        if has(&["pytest", "test", "jest", "cargo test"]) {
            Self::Test
        } else if has(&["build", "compile", "make"]) {
            Self::Build
        } else if has(&["run", "execute", "python", "node"]) {
            Self::Run
        } else if has(&["install", "pip", "npm", "cargo"]) {
            Self::Install
        } else {
            Self::Other
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::Test => "Test",
            Self::Build => "Build",
            Self::Run => "Run",
            Self::Install => "Install",
            Self::Other => "Other",
        }
    }
}

/// Parsed test counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResults {
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
}

/// Heuristic view of one command's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAnalysis {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub test_results: Option<TestResults>,
    pub files_mentioned: Vec<String>,
}

/// Pluggable output classifier used by the command tool
pub trait OutputClassifier: Send + Sync {
    fn classify(&self, command: &str, stdout: &str, stderr: &str) -> OutputAnalysis;
}

/// Default regex-based classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexOutputClassifier;

impl OutputClassifier for RegexOutputClassifier {
    fn classify(&self, command: &str, stdout: &str, stderr: &str) -> OutputAnalysis {
        let combined = format!("{stdout}\n{stderr}");
        let kind = CommandKind::detect(command);

        let test_results = (kind == CommandKind::Test).then(|| parse_test_output(&combined));

        OutputAnalysis {
            kind,
            errors: collect_matches(&ERROR_PATTERNS, &combined),
            warnings: collect_matches(&WARNING_PATTERNS, &combined),
            test_results,
            files_mentioned: files_mentioned(&combined),
        }
    }
}

fn collect_matches(patterns: &[Regex], text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for pattern in patterns {
        out.extend(
            pattern
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .take(MAX_MATCHES_PER_PATTERN),
        );
    }
    out
}

fn files_mentioned(text: &str) -> Vec<String> {
    let unique: BTreeSet<&str> = FILE_MENTION.find_iter(text).map(|m| m.as_str()).collect();
    unique
        .into_iter()
        .take(MAX_FILES_MENTIONED)
        .map(String::from)
        .collect()
}

/// Counts past `u32::MAX` saturate
fn number(caps: &regex::Captures<'_>, idx: usize) -> u32 {
    caps.get(idx)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// Parse pytest, jest or generic pass/fail counts from test output
pub fn parse_test_output(output: &str) -> TestResults {
    if let Some(caps) = JEST_SUMMARY.captures(output) {
        return TestResults {
            failed: number(&caps, 1),
            passed: number(&caps, 2),
            total: number(&caps, 3),
        };
    }

    if let Some(caps) = PYTEST_BOTH.captures(output) {
        let (passed, failed) = (number(&caps, 1), number(&caps, 2));
        return TestResults {
            passed,
            failed,
            total: passed.saturating_add(failed),
        };
    }

    if let Some(caps) = PYTEST_FAILED_FIRST.captures(output) {
        let (failed, passed) = (number(&caps, 1), number(&caps, 2));
        return TestResults {
            passed,
            failed,
            total: passed.saturating_add(failed),
        };
    }

    if let Some(caps) = PYTEST_PASSED_ONLY.captures(output) {
        let passed = number(&caps, 1);
        return TestResults {
            passed,
            failed: 0,
            total: passed,
        };
    }

    let passed = GENERIC_PASS.find_iter(output).count() as u32;
    let failed = GENERIC_FAIL.find_iter(output).count() as u32;
    TestResults {
        passed,
        failed,
        total: passed.saturating_add(failed),
    }
}

/// One-line summary for a command result
pub fn summarize(success: bool, analysis: &OutputAnalysis) -> String {
    let title = analysis.kind.title();

    if !success {
        if !analysis.errors.is_empty() {
            return format!("{title} failed with {} error(s)", analysis.errors.len());
        }
        return format!("{title} failed (exit code non-zero)");
    }

    if let Some(results) = analysis.test_results {
        if results.failed > 0 {
            return format!(
                "Tests completed: {} passed, {} failed",
                results.passed, results.failed
            );
        }
        return format!("All tests passed ({} total)", results.passed);
    }

    format!("{title} completed successfully")
}

/// Suggested next steps for a command result
pub fn suggest_next_steps(success: bool, analysis: &OutputAnalysis) -> Vec<String> {
    let mut suggestions = Vec::new();
    let mentioned = || analysis.files_mentioned.iter().take(3).cloned().collect::<Vec<_>>().join(", ");

    if !success {
        if !analysis.errors.is_empty() {
            suggestions.push("Read error messages to understand what failed".to_string());
            if !analysis.files_mentioned.is_empty() {
                suggestions.push(format!("Check files: {}", mentioned()));
            }
        }
        suggestions.push("Fix the errors and try again".to_string());
        return suggestions;
    }

    match analysis.kind {
        CommandKind::Test => match analysis.test_results {
            Some(results) if results.failed > 0 => {
                suggestions.push("Fix failing tests".to_string());
                if !analysis.files_mentioned.is_empty() {
                    suggestions.push(format!("Check test files: {}", mentioned()));
                }
            }
            _ => suggestions.push("Tests passing - continue with next task".to_string()),
        },
        CommandKind::Build => {
            suggestions.push("Build successful - try running the program".to_string());
        }
        CommandKind::Run => {
            suggestions.push("Program ran successfully".to_string());
            if !analysis.warnings.is_empty() {
                suggestions.push(format!("Address {} warning(s)", analysis.warnings.len()));
            }
        }
        CommandKind::Install | CommandKind::Other => {}
    }

    if suggestions.is_empty() {
        suggestions.push("Command completed - continue with next step".to_string());
    }
    suggestions
}
