//! Scenario model
//!
//! A scenario is data: its parameters, the templates it applies, commands to
//! run before anything is applied, and an ordered list of steps.

use std::fmt;
use std::time::Duration;

use lagscale_common::poll::{ObserveErrorPolicy, PollOptions};
use lagscale_common::template::ResourceTemplate;

use crate::params::ScenarioParameters;

/// Convergence budget: `max_attempts` evaluations, `interval` apart
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollSpec {
    /// Ready replica count to wait for
    pub target: i32,
    /// Evaluations before giving up
    pub max_attempts: u32,
    /// Time between evaluations
    pub interval: Duration,
}

impl PollSpec {
    /// Wait for `target` with the given budget
    pub const fn new(target: i32, max_attempts: u32, interval: Duration) -> Self {
        Self {
            target,
            max_attempts,
            interval,
        }
    }

    /// Wall-clock budget
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Poll options for this budget
    pub fn options(&self, on_error: ObserveErrorPolicy) -> PollOptions {
        PollOptions::fixed(self.max_attempts, self.interval).on_error(on_error)
    }
}

/// One step of a scenario
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Consume a topic as a group and commit its offsets
    Commit {
        /// Topic to consume
        topic: String,
        /// Consumer group to commit for
        group: String,
    },
    /// Produce `count` messages to a topic
    Publish {
        /// Topic to produce to
        topic: String,
        /// Number of messages
        count: u32,
    },
    /// Replica count must stay at `expected` for the whole window
    AssertStable {
        /// Expected replica count
        expected: i32,
        /// Observation window
        window: Duration,
    },
    /// Ready replica count must reach the target within the budget
    WaitFor(PollSpec),
}

impl Step {
    /// Commit `topic` for `group`
    pub fn commit(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self::Commit {
            topic: topic.into(),
            group: group.into(),
        }
    }

    /// Publish one message
    pub fn publish(topic: impl Into<String>) -> Self {
        Self::publish_n(topic, 1)
    }

    /// Publish `count` messages
    pub fn publish_n(topic: impl Into<String>, count: u32) -> Self {
        Self::Publish {
            topic: topic.into(),
            count,
        }
    }

    /// Stay at `expected` for `window`
    pub fn stable(expected: i32, window: Duration) -> Self {
        Self::AssertStable { expected, window }
    }

    /// Reach `target` within `max_attempts × interval`
    pub fn wait_for(target: i32, max_attempts: u32, interval: Duration) -> Self {
        Self::WaitFor(PollSpec::new(target, max_attempts, interval))
    }

    /// Whether this step drives the workload rather than observing it
    pub fn is_command(&self) -> bool {
        matches!(self, Self::Commit { .. } | Self::Publish { .. })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit { topic, group } => write!(f, "commit {} for group {}", topic, group),
            Self::Publish { topic, count: 1 } => write!(f, "publish 1 message to {}", topic),
            Self::Publish { topic, count } => write!(f, "publish {} messages to {}", count, topic),
            Self::AssertStable { expected, window } => {
                write!(f, "replicas stay at {} for {:?}", expected, window)
            }
            Self::WaitFor(spec) => write!(
                f,
                "ready replicas reach {} within {}x{:?}",
                spec.target, spec.max_attempts, spec.interval
            ),
        }
    }
}

/// A named scenario
#[derive(Clone, Debug)]
pub struct Scenario {
    /// Name used for `--scenario` and in the report
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Parameters for every template of this scenario
    pub params: ScenarioParameters,
    /// Templates applied in order and deleted in reverse
    pub templates: Vec<ResourceTemplate>,
    /// Commands run before the templates are applied
    pub prepare: Vec<Step>,
    /// Steps run once the templates are applied
    pub steps: Vec<Step>,
}
