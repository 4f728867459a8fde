//! Run report

use std::fmt;
use std::time::Duration;

/// A failed replica-count check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssertionFailure {
    /// The step that failed, as displayed
    pub step: String,
}

/// How a scenario ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every step passed
    Passed,
    /// All steps ran but some checks failed
    AssertionsFailed(Vec<AssertionFailure>),
    /// A step errored and the rest of the scenario was skipped
    Aborted {
        /// Checks that had already failed
        failures: Vec<AssertionFailure>,
        /// The error that stopped the scenario
        error: String,
    },
    /// Never ran because setup failed
    Skipped,
}

impl Outcome {
    /// Whether the scenario passed
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::AssertionsFailed(_) => "FAILED",
            Self::Aborted { .. } => "ABORTED",
            Self::Skipped => "SKIPPED",
        }
    }
}

/// Result of one scenario
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// How it ended
    pub outcome: Outcome,
    /// Wall-clock time including cleanup
    pub duration: Duration,
    /// Cleanup deletes that failed (logged, never fatal)
    pub cleanup_errors: Vec<String>,
}

/// Result of a whole run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// The setup error that stopped the run, if any
    pub setup_error: Option<String>,
    /// The template error that stopped the remaining scenarios, if any
    pub fatal_error: Option<String>,
    /// Per-scenario results in run order
    pub scenarios: Vec<ScenarioReport>,
    /// Teardown steps that failed
    pub teardown_errors: Vec<String>,
    /// Total wall-clock time
    pub duration: Duration,
}

impl RunReport {
    /// Scenarios that did not pass
    pub fn failed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| !s.outcome.is_passed()).count()
    }

    /// Whether setup, every scenario and teardown succeeded and nothing
    /// stopped the run
    pub fn is_success(&self) -> bool {
        self.setup_error.is_none()
            && self.fatal_error.is_none()
            && self.teardown_errors.is_empty()
            && self.failed_count() == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lagscale run report")?;
        if let Some(error) = &self.setup_error {
            writeln!(f, "  setup: FAILED: {}", error)?;
        }
        for scenario in &self.scenarios {
            writeln!(
                f,
                "  {:<24} {:<8} {:>6.1}s",
                scenario.name,
                scenario.outcome.label(),
                scenario.duration.as_secs_f64()
            )?;
            match &scenario.outcome {
                Outcome::AssertionsFailed(failures) => {
                    for failure in failures {
                        writeln!(f, "      assertion failed: {}", failure.step)?;
                    }
                }
                Outcome::Aborted { failures, error } => {
                    for failure in failures {
                        writeln!(f, "      assertion failed: {}", failure.step)?;
                    }
                    writeln!(f, "      aborted: {}", error)?;
                }
                Outcome::Passed | Outcome::Skipped => {}
            }
            for error in &scenario.cleanup_errors {
                writeln!(f, "      cleanup: {}", error)?;
            }
        }
        if let Some(error) = &self.fatal_error {
            writeln!(f, "  stopped: {}", error)?;
        }
        for error in &self.teardown_errors {
            writeln!(f, "  teardown: {}", error)?;
        }
        write!(
            f,
            "{} passed, {} failed in {:.1}s",
            self.scenarios.len() - self.failed_count(),
            self.failed_count(),
            self.duration.as_secs_f64()
        )
    }
}
