//! Case results and the run summary

use serde::{Serialize, Serializer};
use shared::TestCase;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::TesterResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseStatus {
    Pass,
    Fail,
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Pass => write!(f, "PASS"),
            CaseStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub status: CaseStatus,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn pass(case: &TestCase, elapsed: Duration) -> Self {
        Self {
            id: case.id.clone(),
            name: case.name.clone(),
            status: CaseStatus::Pass,
            elapsed,
            error: None,
        }
    }

    pub fn fail(case: &TestCase, elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            id: case.id.clone(),
            name: case.name.clone(),
            status: CaseStatus::Fail,
            elapsed,
            error: Some(error.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Pass
    }
}

/// Aggregate of one `run_tests` invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub suite: String,
    pub group: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Sum of per-case elapsed times
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
    pub results: Vec<TestResult>,
}

impl RunSummary {
    pub fn new(
        scenario: impl Into<String>,
        suite: impl Into<String>,
        group: impl Into<String>,
        results: Vec<TestResult>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            scenario: scenario.into(),
            suite: suite.into(),
            group: group.into(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            elapsed: results.iter().map(|r| r.elapsed).sum(),
            results,
        }
    }

    /// True when no case failed. An empty run counts as passed.
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn to_json(&self) -> TesterResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> TesterResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "Test summary: {} / {} [{}]", self.scenario, self.suite, self.group)?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Total: {} | Passed: {} | Failed: {}",
            self.total, self.passed, self.failed
        )?;
        for failure in self.failures() {
            writeln!(
                f,
                "  ✗ [{}] {}: {}",
                failure.id,
                failure.name,
                failure.error.as_deref().unwrap_or("unknown error")
            )?;
        }
        write!(f, "Total time: {:.2}s", self.elapsed.as_secs_f64())
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
