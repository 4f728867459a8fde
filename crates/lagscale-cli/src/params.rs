//! Scenario parameters
//!
//! [`BaseNames`] holds the identities shared by the whole run. Each scenario
//! builds its own [`ScenarioParameters`] from them plus a few overrides, so
//! nothing a scenario sets can leak into the next one.

use serde::Serialize;

use lagscale_common::template::{TemplateContext, TemplateError};

/// Base test name every resource name derives from
pub const TEST_NAME: &str = "kafka-test";

/// Plain listener port of the Kafka bootstrap service
pub const BOOTSTRAP_PORT: u16 = 9092;

/// Topic used by the single-topic scenarios
pub const TOPIC_1: &str = "kafka-topic";
/// Second topic of the multi-topic scenario
pub const TOPIC_2: &str = "kafka-topic2";
/// Topic without committed offsets for the scale-to-zero case
pub const ZERO_INVALID_OFFSET_TOPIC: &str = "kafka-topic-zero-invalid-offset";
/// Topic without committed offsets for the scale-to-one case
pub const ONE_INVALID_OFFSET_TOPIC: &str = "kafka-topic-one-invalid-offset";
/// Consumer group of the invalid-offset scenarios
pub const INVALID_OFFSET_GROUP: &str = "invalidOffset";
/// Consumer group of the multi-topic scenario
pub const MULTI_TOPIC_GROUP: &str = "multiTopic";
/// Partitions of the main topics; also the replica ceiling
pub const TOPIC_PARTITIONS: u32 = 3;

/// Resource identities derived from the test name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseNames {
    /// Test name, optionally suffixed
    pub test_name: String,
    /// Namespace everything lives in
    pub namespace: String,
    /// Consumer deployment
    pub deployment_name: String,
    /// KEDA ScaledObject
    pub scaled_object_name: String,
    /// Strimzi Kafka cluster
    pub kafka_name: String,
    /// Pod used to produce and commit messages
    pub kafka_client_name: String,
    /// `host:port` of the bootstrap service
    pub bootstrap_server: String,
}

impl BaseNames {
    /// Derive every name from [`TEST_NAME`], with an optional suffix so
    /// several runs can share a cluster
    pub fn new(suffix: Option<&str>) -> Self {
        let test_name = match suffix.filter(|s| !s.is_empty()) {
            Some(suffix) => format!("{}-{}", TEST_NAME, suffix),
            None => TEST_NAME.to_string(),
        };
        let namespace = format!("{}-ns", test_name);
        let kafka_name = format!("{}-kafka", test_name);
        let bootstrap_server = format!("{}-kafka-bootstrap.{}:{}", kafka_name, namespace, BOOTSTRAP_PORT);

        Self {
            deployment_name: format!("{}-deployment", test_name),
            scaled_object_name: format!("{}-so", test_name),
            kafka_client_name: format!("{}-client", test_name),
            kafka_name,
            bootstrap_server,
            namespace,
            test_name,
        }
    }
}

impl Default for BaseNames {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Everything a template may reference
///
/// Field names are the placeholder names. Fields a scenario does not set
/// keep their base value and are simply unused by its templates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScenarioParameters {
    /// Namespace of all resources
    pub test_namespace: String,
    /// Consumer deployment name
    pub deployment_name: String,
    /// ScaledObject name
    pub scaled_object_name: String,
    /// Kafka cluster name
    pub kafka_name: String,
    /// Client pod name
    pub kafka_client_name: String,
    /// Bootstrap endpoint
    pub bootstrap_server: String,
    /// Topic watched by single-topic scaled objects
    pub topic_name: String,
    /// First topic of the multi-topic consumer
    pub topic1_name: String,
    /// Second topic of the multi-topic consumer
    pub topic2_name: String,
    /// Offset reset policy; doubles as the scaler's consumer group
    pub reset_policy: String,
    /// Extra `kafka-console-consumer` arguments
    pub params: String,
    /// Whether the consumer auto-commits
    pub commit: bool,
    /// `scaleToZeroOnInvalidOffset` of the scaler
    pub scale_to_zero_on_invalid: bool,
    /// Topic to create
    pub kafka_topic_name: String,
    /// Partitions of the topic to create
    pub kafka_topic_partitions: u32,
}

impl ScenarioParameters {
    /// Base parameters: identities set, per-scenario fields at their defaults
    pub fn base(names: &BaseNames) -> Self {
        Self {
            test_namespace: names.namespace.clone(),
            deployment_name: names.deployment_name.clone(),
            scaled_object_name: names.scaled_object_name.clone(),
            kafka_name: names.kafka_name.clone(),
            kafka_client_name: names.kafka_client_name.clone(),
            bootstrap_server: names.bootstrap_server.clone(),
            topic_name: TOPIC_1.to_string(),
            topic1_name: TOPIC_1.to_string(),
            topic2_name: TOPIC_2.to_string(),
            reset_policy: String::new(),
            params: String::new(),
            commit: false,
            scale_to_zero_on_invalid: false,
            kafka_topic_name: String::new(),
            kafka_topic_partitions: 0,
        }
    }

    /// Watch `topic` with a single-topic scaler
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic_name = topic.into();
        self
    }

    /// Consume `topic1` and `topic2` in one group
    pub fn topics(mut self, topic1: impl Into<String>, topic2: impl Into<String>) -> Self {
        self.topic1_name = topic1.into();
        self.topic2_name = topic2.into();
        self
    }

    /// Offset reset policy, also used as the scaler's consumer group
    pub fn reset_policy(mut self, policy: impl Into<String>) -> Self {
        self.reset_policy = policy.into();
        self
    }

    /// Consumer command-line arguments
    pub fn consumer_params(mut self, params: impl Into<String>) -> Self {
        self.params = params.into();
        self
    }

    /// Consumer auto-commit
    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    /// Scale to zero when the group has no valid offset
    pub fn scale_to_zero_on_invalid(mut self, enabled: bool) -> Self {
        self.scale_to_zero_on_invalid = enabled;
        self
    }

    /// Topic to create through the topic template
    pub fn kafka_topic(mut self, name: impl Into<String>, partitions: u32) -> Self {
        self.kafka_topic_name = name.into();
        self.kafka_topic_partitions = partitions;
        self
    }

    /// Flatten into a rendering context
    pub fn to_context(&self) -> Result<TemplateContext, TemplateError> {
        TemplateContext::from_serialize(self)
    }
}
