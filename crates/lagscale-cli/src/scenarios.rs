//! The scenario catalogue
//!
//! Each scenario pins one scaler behavior: activation and scale-out under
//! `earliest` and `latest` reset policies, lag summed across topics of one
//! group, and both answers to a group without a valid offset.

use std::time::Duration;

use crate::manifests::{
    INVALID_OFFSET_SCALED_OBJECT, MULTI_DEPLOYMENT, MULTI_SCALED_OBJECT, SINGLE_DEPLOYMENT,
    SINGLE_SCALED_OBJECT,
};
use crate::params::{
    BaseNames, ScenarioParameters, INVALID_OFFSET_GROUP, MULTI_TOPIC_GROUP,
    ONE_INVALID_OFFSET_TOPIC, TOPIC_1, TOPIC_2, TOPIC_PARTITIONS, ZERO_INVALID_OFFSET_TOPIC,
};
use crate::scenario::{Scenario, Step};

/// Window of every "replicas must not change" check
pub const STABILITY_WINDOW: Duration = Duration::from_secs(60);
/// Attempts of every convergence check
pub const CONVERGENCE_ATTEMPTS: u32 = 60;
/// Interval of scale-up checks
pub const SCALE_UP_INTERVAL: Duration = Duration::from_secs(2);
/// Interval of the scale-down check, which waits out the cooldown
pub const SCALE_DOWN_INTERVAL: Duration = Duration::from_secs(10);

/// Messages published past the partition ceiling
const BURST_MESSAGES: u32 = 5;

/// Names of every scenario, in run order
pub const NAMES: &[&str] = &[
    "earliest-policy",
    "latest-policy",
    "multi-topic",
    "zero-on-invalid-offset",
    "one-on-invalid-offset",
];

/// Build every scenario for a run, in order
pub fn all(names: &BaseNames) -> Vec<Scenario> {
    vec![
        earliest_policy(names),
        latest_policy(names),
        multi_topic(names),
        zero_on_invalid_offset(names),
        one_on_invalid_offset(names),
    ]
}

/// Keep the scenarios named in `filter`, or all of them for an empty filter
pub fn select(scenarios: Vec<Scenario>, filter: &[String]) -> Vec<Scenario> {
    if filter.is_empty() {
        return scenarios;
    }
    scenarios
        .into_iter()
        .filter(|s| filter.iter().any(|f| f == s.name))
        .collect()
}

/// Activation and scale-out shared by both reset policies: one message is
/// below the activation threshold, a second triggers scale-out, and a burst
/// caps at the partition count.
fn activation_and_scale_out() -> Vec<Step> {
    vec![
        Step::stable(0, STABILITY_WINDOW),
        Step::publish(TOPIC_1),
        Step::stable(0, STABILITY_WINDOW),
        Step::publish(TOPIC_1),
        Step::wait_for(2, CONVERGENCE_ATTEMPTS, SCALE_UP_INTERVAL),
        Step::publish_n(TOPIC_1, BURST_MESSAGES),
        Step::wait_for(TOPIC_PARTITIONS as i32, CONVERGENCE_ATTEMPTS, SCALE_UP_INTERVAL),
    ]
}

/// Reset policy `earliest`: lag counts from the start of the topic
pub fn earliest_policy(names: &BaseNames) -> Scenario {
    Scenario {
        name: "earliest-policy",
        description: "scale on lag with offsetResetPolicy earliest",
        params: ScenarioParameters::base(names)
            .consumer_params(format!("--topic {} --group earliest --from-beginning", TOPIC_1))
            .commit(false)
            .topic(TOPIC_1)
            .reset_policy("earliest"),
        templates: vec![SINGLE_DEPLOYMENT, SINGLE_SCALED_OBJECT],
        prepare: Vec::new(),
        steps: activation_and_scale_out(),
    }
}

/// Reset policy `latest`: the group commits first so only new messages lag
pub fn latest_policy(names: &BaseNames) -> Scenario {
    Scenario {
        name: "latest-policy",
        description: "scale on lag with offsetResetPolicy latest",
        params: ScenarioParameters::base(names)
            .consumer_params(format!("--topic {} --group latest", TOPIC_1))
            .commit(false)
            .topic(TOPIC_1)
            .reset_policy("latest"),
        templates: vec![SINGLE_DEPLOYMENT, SINGLE_SCALED_OBJECT],
        prepare: vec![Step::commit(TOPIC_1, "latest")],
        steps: activation_and_scale_out(),
    }
}

/// Two topics in one group: lag on each adds one replica
pub fn multi_topic(names: &BaseNames) -> Scenario {
    Scenario {
        name: "multi-topic",
        description: "sum lag across every topic of a consumer group",
        params: ScenarioParameters::base(names).topics(TOPIC_1, TOPIC_2),
        templates: vec![MULTI_DEPLOYMENT, MULTI_SCALED_OBJECT],
        prepare: vec![
            Step::commit(TOPIC_1, MULTI_TOPIC_GROUP),
            Step::commit(TOPIC_2, MULTI_TOPIC_GROUP),
        ],
        steps: vec![
            Step::stable(0, STABILITY_WINDOW),
            Step::publish(TOPIC_1),
            Step::wait_for(1, CONVERGENCE_ATTEMPTS, SCALE_UP_INTERVAL),
            // total group lag 2 over threshold 1
            Step::publish(TOPIC_2),
            Step::wait_for(2, CONVERGENCE_ATTEMPTS, SCALE_UP_INTERVAL),
        ],
    }
}

/// No valid offset and `scaleToZeroOnInvalidOffset: true`: stays at zero
pub fn zero_on_invalid_offset(names: &BaseNames) -> Scenario {
    Scenario {
        name: "zero-on-invalid-offset",
        description: "stay at zero replicas when the group has no valid offset",
        params: ScenarioParameters::base(names)
            .consumer_params(format!(
                "--topic {} --group {}",
                ZERO_INVALID_OFFSET_TOPIC, INVALID_OFFSET_GROUP
            ))
            .commit(true)
            .topic(ZERO_INVALID_OFFSET_TOPIC)
            .reset_policy(INVALID_OFFSET_GROUP)
            .scale_to_zero_on_invalid(true),
        templates: vec![SINGLE_DEPLOYMENT, INVALID_OFFSET_SCALED_OBJECT],
        prepare: Vec::new(),
        steps: vec![Step::stable(0, STABILITY_WINDOW)],
    }
}

/// No valid offset and `scaleToZeroOnInvalidOffset: false`: one replica
/// until the group commits, then back to zero once lag clears
pub fn one_on_invalid_offset(names: &BaseNames) -> Scenario {
    Scenario {
        name: "one-on-invalid-offset",
        description: "hold one replica while the group has no valid offset",
        params: ScenarioParameters::base(names)
            .consumer_params(format!(
                "--topic {} --group {} --from-beginning",
                ONE_INVALID_OFFSET_TOPIC, INVALID_OFFSET_GROUP
            ))
            .commit(true)
            .topic(ONE_INVALID_OFFSET_TOPIC)
            .reset_policy(INVALID_OFFSET_GROUP)
            .scale_to_zero_on_invalid(false),
        templates: vec![SINGLE_DEPLOYMENT, INVALID_OFFSET_SCALED_OBJECT],
        prepare: Vec::new(),
        steps: vec![
            Step::wait_for(1, CONVERGENCE_ATTEMPTS, SCALE_UP_INTERVAL),
            Step::commit(ONE_INVALID_OFFSET_TOPIC, INVALID_OFFSET_GROUP),
            Step::publish(ONE_INVALID_OFFSET_TOPIC),
            Step::wait_for(0, CONVERGENCE_ATTEMPTS, SCALE_DOWN_INTERVAL),
        ],
    }
}
