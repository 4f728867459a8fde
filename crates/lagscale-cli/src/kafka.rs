//! Kafka workload driving and operator install
//!
//! Producers and consumers run inside the client pod through
//! [`CommandRunner::exec`]; the Strimzi operator is installed with `helm` in
//! the local environment.

use std::sync::Arc;

use tracing::info;

use lagscale_common::exec::CommandRunner;
use lagscale_common::Error;

use crate::params::BaseNames;

/// Helm repository the operator chart comes from
pub const STRIMZI_REPO_URL: &str = "https://strimzi.io/charts/";
/// Default operator chart version
pub const DEFAULT_STRIMZI_VERSION: &str = "0.30.0";
/// How long a commit consumer waits for new messages before exiting
pub const COMMIT_CONSUMER_TIMEOUT_MS: u64 = 15_000;

/// Producer command writing one message to `topic`
pub fn publish_command(bootstrap_server: &str, topic: &str) -> String {
    format!(
        r#"echo "{{"text": "foo"}}" | kafka-console-producer --broker-list {} --topic {}"#,
        bootstrap_server, topic
    )
}

/// Consumer command that reads `topic` from the beginning as `group` and
/// commits, so the group has a valid offset afterwards
pub fn commit_command(bootstrap_server: &str, topic: &str, group: &str) -> String {
    format!(
        "kafka-console-consumer --bootstrap-server {} --topic {} --group {} --from-beginning --consumer-property enable.auto.commit=true --timeout-ms {}",
        bootstrap_server, topic, group, COMMIT_CONSUMER_TIMEOUT_MS
    )
}

/// Drives producers and consumers from the client pod
#[derive(Clone)]
pub struct KafkaClient {
    commands: Arc<dyn CommandRunner>,
    pod: String,
    namespace: String,
    bootstrap_server: String,
}

impl KafkaClient {
    /// Client using the pod and bootstrap endpoint of `names`
    pub fn new(commands: Arc<dyn CommandRunner>, names: &BaseNames) -> Self {
        Self {
            commands,
            pod: names.kafka_client_name.clone(),
            namespace: names.namespace.clone(),
            bootstrap_server: names.bootstrap_server.clone(),
        }
    }

    /// Produce one message to `topic`
    pub async fn publish_message(&self, topic: &str) -> Result<(), Error> {
        info!(topic = %topic, "publishing message");
        let command = publish_command(&self.bootstrap_server, topic);
        self.commands.exec(&self.pod, &self.namespace, &command).await?;
        Ok(())
    }

    /// Consume `topic` as `group` and commit the offsets
    pub async fn commit_partition(&self, topic: &str, group: &str) -> Result<(), Error> {
        info!(topic = %topic, group = %group, "committing partition");
        let command = commit_command(&self.bootstrap_server, topic, group);
        self.commands.exec(&self.pod, &self.namespace, &command).await?;
        Ok(())
    }
}

/// Installs and removes the Strimzi operator with helm
#[derive(Clone)]
pub struct StrimziOperator {
    commands: Arc<dyn CommandRunner>,
    namespace: String,
    release: String,
    version: String,
}

impl StrimziOperator {
    /// Operator released as the test name into the test namespace
    pub fn new(commands: Arc<dyn CommandRunner>, names: &BaseNames, version: impl Into<String>) -> Self {
        Self {
            commands,
            namespace: names.namespace.clone(),
            release: names.test_name.clone(),
            version: version.into(),
        }
    }

    fn install_commands(&self) -> [String; 3] {
        [
            format!("helm repo add strimzi {}", STRIMZI_REPO_URL),
            "helm repo update".to_string(),
            format!(
                "helm upgrade --install --namespace {} --wait {} strimzi/strimzi-kafka-operator --version {}",
                self.namespace, self.release, self.version
            ),
        ]
    }

    fn uninstall_command(&self) -> String {
        format!("helm uninstall --namespace {} {}", self.namespace, self.release)
    }

    /// Add the chart repo and install or upgrade the release, waiting for it
    pub async fn install(&self) -> Result<(), Error> {
        info!(release = %self.release, version = %self.version, "installing strimzi operator");
        for command in self.install_commands() {
            self.commands.exec_local(&command).await?;
        }
        Ok(())
    }

    /// Remove the release
    pub async fn uninstall(&self) -> Result<(), Error> {
        info!(release = %self.release, "uninstalling strimzi operator");
        self.commands.exec_local(&self.uninstall_command()).await?;
        Ok(())
    }
}
