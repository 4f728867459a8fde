//! Scenario runner
//!
//! Drives one run through `Setup → Scenario₁ … Scenarioₙ → Teardown`, ending
//! in `Done`, or in `Failed` when setup or teardown could not complete.
//!
//! Failure handling per step:
//! - a failed replica check is recorded and the scenario continues
//! - a command or apply error aborts the scenario, not the run
//! - a template error is a broken scenario definition: its scenario cleans
//!   up, every later scenario is skipped and the run ends `Failed`
//! - a setup error skips every scenario; teardown still runs
//! - every scenario deletes the resources it rendered exactly once, whatever
//!   happened before

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use lagscale_common::exec::CommandRunner;
use lagscale_common::kube_utils::{ClusterClient, ConditionTarget, ReplicaCounts};
use lagscale_common::lifecycle::ResourceManager;
use lagscale_common::poll::{assert_stable, wait_for_count, ObserveErrorPolicy};
use lagscale_common::template::{RenderedResource, ResourceTemplate, TemplateEngine};

use crate::kafka::{KafkaClient, StrimziOperator, DEFAULT_STRIMZI_VERSION};
use crate::manifests::{KAFKA_CLIENT, KAFKA_CLUSTER, KAFKA_TOPIC};
use crate::params::{
    BaseNames, ScenarioParameters, ONE_INVALID_OFFSET_TOPIC, TOPIC_1, TOPIC_2, TOPIC_PARTITIONS,
    ZERO_INVALID_OFFSET_TOPIC,
};
use crate::report::{AssertionFailure, Outcome, RunReport, ScenarioReport};
use crate::scenario::{Scenario, Step};
use crate::{Error, Result};

/// API version of the Strimzi resources
pub const STRIMZI_API_VERSION: &str = "kafka.strimzi.io/v1beta2";

/// Topics created during setup, with their partition counts
pub const BASE_TOPICS: &[(&str, u32)] = &[
    (TOPIC_1, TOPIC_PARTITIONS),
    (TOPIC_2, TOPIC_PARTITIONS),
    (ZERO_INVALID_OFFSET_TOPIC, 1),
    (ONE_INVALID_OFFSET_TOPIC, 1),
];

type ReplicaFuture = Pin<Box<dyn Future<Output = lagscale_common::Result<i32>> + Send>>;

/// Where a run is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Base infrastructure is being created
    Setup,
    /// Running the scenario at this index
    Scenario(usize),
    /// Base infrastructure is being removed
    Teardown,
    /// Finished, setup and teardown succeeded
    Done,
    /// Finished, setup or teardown failed or a template error stopped the run
    Failed,
}

/// Knobs of a run
#[derive(Clone, Debug)]
pub struct RunnerOptions {
    /// Strimzi operator chart version
    pub strimzi_version: String,
    /// Leave the namespace in place after teardown
    pub keep_namespace: bool,
    /// Accounting of failed replica reads
    pub on_error: ObserveErrorPolicy,
    /// Sample interval of stability checks
    pub stability_interval: Duration,
    /// Readiness timeout of the Kafka cluster and topics
    pub readiness_timeout: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            strimzi_version: DEFAULT_STRIMZI_VERSION.to_string(),
            keep_namespace: false,
            on_error: ObserveErrorPolicy::default(),
            stability_interval: Duration::from_secs(1),
            readiness_timeout: Duration::from_secs(300),
        }
    }
}

/// Sequences setup, scenarios and teardown against one cluster
pub struct Runner {
    names: BaseNames,
    options: RunnerOptions,
    engine: TemplateEngine,
    resources: ResourceManager,
    kafka: KafkaClient,
    operator: StrimziOperator,
    operator_installed: bool,
    phase: RunPhase,
}

impl Runner {
    /// Create a runner for the given names and collaborators
    pub fn new(
        names: BaseNames,
        cluster: Arc<dyn ClusterClient>,
        commands: Arc<dyn CommandRunner>,
        options: RunnerOptions,
    ) -> Self {
        let kafka = KafkaClient::new(commands.clone(), &names);
        let operator = StrimziOperator::new(commands, &names, options.strimzi_version.clone());
        Self {
            resources: ResourceManager::new(cluster),
            engine: TemplateEngine::new(),
            kafka,
            operator,
            operator_installed: false,
            phase: RunPhase::Setup,
            names,
            options,
        }
    }

    /// Current phase
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run setup, every scenario in order, and teardown
    pub async fn run(&mut self, scenarios: &[Scenario]) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::default();

        self.phase = RunPhase::Setup;
        info!(namespace = %self.names.namespace, scenarios = scenarios.len(), "--- setting up ---");
        match self.setup().await {
            Ok(()) => {
                for (index, scenario) in scenarios.iter().enumerate() {
                    if report.fatal_error.is_some() {
                        report.scenarios.push(skipped(scenario));
                        continue;
                    }
                    self.phase = RunPhase::Scenario(index);
                    let (scenario_report, fatal) = self.run_scenario(scenario).await;
                    report.scenarios.push(scenario_report);
                    if let Some(e) = fatal {
                        error!(scenario = %scenario.name, error = %e, "template error, skipping remaining scenarios");
                        report.fatal_error = Some(e);
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "setup failed, skipping scenarios");
                report.setup_error = Some(e.to_string());
                report.scenarios = scenarios.iter().map(skipped).collect();
            }
        }

        self.phase = RunPhase::Teardown;
        info!("--- tearing down ---");
        report.teardown_errors = self.teardown().await;

        self.phase = if report.setup_error.is_none()
            && report.fatal_error.is_none()
            && report.teardown_errors.is_empty()
        {
            RunPhase::Done
        } else {
            RunPhase::Failed
        };
        report.duration = start.elapsed();
        info!(
            phase = ?self.phase,
            failed = report.failed_count(),
            duration_secs = report.duration.as_secs(),
            "run finished"
        );
        report
    }

    async fn setup(&mut self) -> Result<()> {
        let namespace = self.names.namespace.clone();
        let base = ScenarioParameters::base(&self.names);

        self.resources
            .cluster()
            .ensure_namespace(&namespace)
            .await
            .map_err(|e| Error::setup("namespace", e.to_string()))?;

        self.apply_base("client pod", KAFKA_CLIENT, &base).await?;

        self.operator_installed = true;
        self.operator
            .install()
            .await
            .map_err(|e| Error::setup("strimzi operator", e.to_string()))?;

        self.apply_base("kafka cluster", KAFKA_CLUSTER, &base).await?;
        self.wait_ready(
            "kafka cluster",
            ConditionTarget::ready(STRIMZI_API_VERSION, "Kafka", &self.names.kafka_name, &namespace),
        )
        .await?;

        for (topic, partitions) in BASE_TOPICS {
            let step = format!("topic {}", topic);
            let params = base.clone().kafka_topic(*topic, *partitions);
            self.apply_base(&step, KAFKA_TOPIC, &params).await?;
            self.wait_ready(
                &step,
                ConditionTarget::ready(STRIMZI_API_VERSION, "KafkaTopic", *topic, &namespace),
            )
            .await?;
        }

        info!("setup complete");
        Ok(())
    }

    async fn apply_base(
        &mut self,
        step: &str,
        template: ResourceTemplate,
        params: &ScenarioParameters,
    ) -> Result<()> {
        let rendered = self
            .render(template, params)
            .map_err(|e| Error::setup(step, e.to_string()))?;
        self.resources
            .apply(&self.names.namespace, &rendered)
            .await
            .map_err(|e| Error::setup(step, e.to_string()))
    }

    async fn wait_ready(&self, step: &str, target: ConditionTarget) -> Result<()> {
        self.resources
            .cluster()
            .wait_for_condition(&target, self.options.readiness_timeout)
            .await
            .map_err(|e| Error::setup(step, e.to_string()))
    }

    fn render(
        &self,
        template: ResourceTemplate,
        params: &ScenarioParameters,
    ) -> lagscale_common::Result<RenderedResource> {
        let ctx = params
            .to_context()
            .map_err(|e| lagscale_common::Error::template(template.name, e))?;
        template.render(&self.engine, &ctx)
    }

    /// Run one scenario and clean up after it. The second value is set when
    /// the error that aborted it must stop the whole run.
    async fn run_scenario(&mut self, scenario: &Scenario) -> (ScenarioReport, Option<String>) {
        let start = Instant::now();
        info!(scenario = %scenario.name, description = %scenario.description, "--- running scenario ---");

        let mut rendered = Vec::with_capacity(scenario.templates.len());
        let mut failures = Vec::new();
        let result = self.execute(scenario, &mut rendered, &mut failures).await;

        let namespace = self.names.namespace.clone();
        let cleanup_errors: Vec<String> = self
            .resources
            .delete_all(&namespace, &rendered)
            .await
            .iter()
            .map(|e| e.to_string())
            .collect();

        let mut fatal = None;
        let outcome = match result {
            Ok(()) if failures.is_empty() => Outcome::Passed,
            Ok(()) => Outcome::AssertionsFailed(failures),
            Err(e) => {
                if matches!(e, lagscale_common::Error::Template { .. }) {
                    fatal = Some(e.to_string());
                }
                error!(
                    scenario = %scenario.name,
                    command = e.is_command_error(),
                    error = %e,
                    "scenario aborted"
                );
                Outcome::Aborted {
                    failures,
                    error: e.to_string(),
                }
            }
        };
        let duration = start.elapsed();
        info!(
            scenario = %scenario.name,
            passed = outcome.is_passed(),
            duration_secs = duration.as_secs(),
            "scenario finished"
        );

        let report = ScenarioReport {
            name: scenario.name.to_string(),
            outcome,
            duration,
            cleanup_errors,
        };
        (report, fatal)
    }

    /// Everything between building parameters and cleanup. Rendered
    /// documents are pushed to `rendered` as soon as they exist so cleanup
    /// sees them even if this returns early.
    async fn execute(
        &mut self,
        scenario: &Scenario,
        rendered: &mut Vec<RenderedResource>,
        failures: &mut Vec<AssertionFailure>,
    ) -> lagscale_common::Result<()> {
        for step in &scenario.prepare {
            self.run_step(scenario, step, failures).await?;
        }

        for template in &scenario.templates {
            rendered.push(self.render(*template, &scenario.params)?);
        }
        let namespace = self.names.namespace.clone();
        self.resources.apply_all(&namespace, rendered.as_slice()).await?;

        for step in &scenario.steps {
            self.run_step(scenario, step, failures).await?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        scenario: &Scenario,
        step: &Step,
        failures: &mut Vec<AssertionFailure>,
    ) -> lagscale_common::Result<()> {
        info!(scenario = %scenario.name, step = %step, command = step.is_command(), "step");
        let passed = match step {
            Step::Commit { topic, group } => {
                self.kafka.commit_partition(topic, group).await?;
                true
            }
            Step::Publish { topic, count } => {
                for _ in 0..*count {
                    self.kafka.publish_message(topic).await?;
                }
                true
            }
            Step::AssertStable { expected, window } => {
                assert_stable(
                    &step.to_string(),
                    self.observe_replicas(|c| c.current),
                    *expected,
                    *window,
                    self.options.stability_interval,
                    self.options.on_error,
                )
                .await
            }
            Step::WaitFor(spec) => {
                wait_for_count(
                    &step.to_string(),
                    self.observe_replicas(|c| c.ready),
                    spec.target,
                    &spec.options(self.options.on_error),
                )
                .await
            }
        };

        if !passed {
            warn!(scenario = %scenario.name, step = %step, "assertion failed");
            failures.push(AssertionFailure {
                step: step.to_string(),
            });
        }
        Ok(())
    }

    /// Observation of the scenario deployment's replicas; stability checks
    /// read `status.replicas`, convergence checks ready replicas
    fn observe_replicas(&self, pick: fn(ReplicaCounts) -> i32) -> impl FnMut() -> ReplicaFuture {
        let cluster = Arc::clone(self.resources.cluster());
        let namespace = self.names.namespace.clone();
        let deployment = self.names.deployment_name.clone();
        move || {
            let cluster = Arc::clone(&cluster);
            let namespace = namespace.clone();
            let deployment = deployment.clone();
            Box::pin(async move {
                cluster
                    .deployment_replicas(&namespace, &deployment)
                    .await
                    .map(pick)
            })
        }
    }

    /// Remove the operator and base resources. Only a failed operator
    /// uninstall is reported; delete failures are logged.
    async fn teardown(&mut self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.operator_installed {
            if let Err(e) = self.operator.uninstall().await {
                error!(error = %e, "operator uninstall failed");
                errors.push(e.to_string());
            }
        }

        for e in self.resources.teardown().await {
            warn!(error = %e, "base resource delete failed");
        }

        if !self.options.keep_namespace {
            if let Err(e) = self.resources.cluster().delete_namespace(&self.names.namespace).await {
                warn!(namespace = %self.names.namespace, error = %e, "namespace delete failed");
            }
        } else {
            info!(namespace = %self.names.namespace, "keeping namespace");
        }

        errors
    }
}

fn skipped(scenario: &Scenario) -> ScenarioReport {
    ScenarioReport {
        name: scenario.name.to_string(),
        outcome: Outcome::Skipped,
        duration: Duration::ZERO,
        cleanup_errors: Vec::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifests::SINGLE_DEPLOYMENT;
    use crate::params::{INVALID_OFFSET_GROUP, MULTI_TOPIC_GROUP};
    use crate::scenarios;
    use async_trait::async_trait;
    use lagscale_common::exec::ExecOutput;
    use lagscale_common::kube_utils::parse_manifest;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// What the fake Kafka has seen: messages per topic and the
    /// (topic, group) pairs that committed
    #[derive(Default)]
    struct Workload {
        published: HashMap<String, u32>,
        committed: HashSet<(String, String)>,
    }

    impl Workload {
        fn published(&self, topic: &str) -> u32 {
            self.published.get(topic).copied().unwrap_or(0)
        }

        fn total_published(&self) -> u32 {
            self.published.values().sum()
        }

        fn committed(&self, topic: &str, group: &str) -> bool {
            self.committed
                .contains(&(topic.to_string(), group.to_string()))
        }
    }

    type SharedWorkload = Arc<Mutex<Workload>>;

    /// Scaler stand-in: replica count as a function of the workload
    type ScaleFn = Box<dyn Fn(&Workload) -> i32 + Send + Sync>;

    /// Cluster fake recording every call as a short string
    struct FakeCluster {
        calls: Mutex<Vec<String>>,
        workload: SharedWorkload,
        scale: ScaleFn,
        fail_apply: Option<&'static str>,
        fail_wait: bool,
    }

    impl FakeCluster {
        fn new(workload: SharedWorkload, scale: ScaleFn) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                workload,
                scale,
                fail_apply: None,
                fail_wait: false,
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }
    }

    fn address(document: &str) -> String {
        let meta = parse_manifest(document).unwrap();
        format!("{}/{}", meta.api_resource.kind, meta.name)
    }

    #[async_trait]
    impl ClusterClient for FakeCluster {
        async fn apply(&self, _namespace: &str, document: &str) -> lagscale_common::Result<()> {
            let target = address(document);
            self.record(format!("apply {}", target));
            if Some(target.as_str()) == self.fail_apply {
                return Err(lagscale_common::Error::apply("ScaledObject", "x", "webhook denied"));
            }
            Ok(())
        }

        async fn delete(&self, _namespace: &str, document: &str) -> lagscale_common::Result<()> {
            self.record(format!("delete {}", address(document)));
            Ok(())
        }

        async fn deployment_replicas(
            &self,
            _namespace: &str,
            _name: &str,
        ) -> lagscale_common::Result<ReplicaCounts> {
            let workload = self.workload.lock().unwrap();
            let replicas = (self.scale)(&*workload);
            Ok(ReplicaCounts {
                ready: replicas,
                current: replicas,
            })
        }

        async fn wait_for_condition(
            &self,
            target: &ConditionTarget,
            timeout: Duration,
        ) -> lagscale_common::Result<()> {
            self.record(format!("wait {}/{}", target.kind, target.name));
            if self.fail_wait {
                return Err(lagscale_common::Error::condition_timeout(target.to_string(), timeout));
            }
            Ok(())
        }

        async fn ensure_namespace(&self, name: &str) -> lagscale_common::Result<()> {
            self.record(format!("ensure_namespace {}", name));
            Ok(())
        }

        async fn delete_namespace(&self, name: &str) -> lagscale_common::Result<()> {
            self.record(format!("delete_namespace {}", name));
            Ok(())
        }
    }

    /// Value following `name` in a command line
    fn flag<'a>(command: &'a str, name: &str) -> Option<&'a str> {
        let mut words = command.split_whitespace();
        while let Some(word) = words.next() {
            if word == name {
                return words.next();
            }
        }
        None
    }

    /// Command fake feeding producer and consumer commands into the workload
    struct FakeCommands {
        log: Mutex<Vec<String>>,
        workload: SharedWorkload,
        fail_publish: bool,
    }

    impl FakeCommands {
        fn new(workload: SharedWorkload) -> Self {
            Self {
                log: Mutex::new(Vec::new()),
                workload,
                fail_publish: false,
            }
        }
    }

    #[async_trait]
    impl CommandRunner for FakeCommands {
        async fn exec(
            &self,
            _pod: &str,
            _namespace: &str,
            command: &str,
        ) -> lagscale_common::Result<ExecOutput> {
            self.log.lock().unwrap().push(command.to_string());
            let topic = flag(command, "--topic").unwrap_or_default().to_string();
            if command.contains("kafka-console-producer") {
                if self.fail_publish {
                    return Err(lagscale_common::Error::command_timeout(
                        "kafka-console-producer",
                        Duration::from_secs(120),
                    ));
                }
                *self.workload.lock().unwrap().published.entry(topic).or_default() += 1;
            } else if command.contains("kafka-console-consumer") {
                let group = flag(command, "--group").unwrap_or_default().to_string();
                self.workload.lock().unwrap().committed.insert((topic, group));
            }
            Ok(ExecOutput::default())
        }

        async fn exec_local(&self, command: &str) -> lagscale_common::Result<String> {
            self.log.lock().unwrap().push(command.to_string());
            Ok(String::new())
        }
    }

    /// Lag on the first topic below 2 does not activate; above, one replica
    /// per message up to the partition count.
    fn single_topic_scaler() -> ScaleFn {
        Box::new(|w: &Workload| {
            let lag = w.published(TOPIC_1);
            if lag < 2 {
                0
            } else {
                lag.min(TOPIC_PARTITIONS) as i32
            }
        })
    }

    fn never_scales() -> ScaleFn {
        Box::new(|_: &Workload| 0)
    }

    fn fakes(scale: ScaleFn) -> (SharedWorkload, FakeCluster, FakeCommands) {
        let workload = SharedWorkload::default();
        let cluster = FakeCluster::new(workload.clone(), scale);
        let commands = FakeCommands::new(workload.clone());
        (workload, cluster, commands)
    }

    fn runner(cluster: Arc<FakeCluster>, commands: Arc<FakeCommands>) -> Runner {
        Runner::new(BaseNames::default(), cluster, commands, RunnerOptions::default())
    }

    // =========================================================================
    // Story: Healthy scaler behavior passes each scenario
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn story_healthy_run_passes_and_cleans_up() {
        let (workload, cluster, commands) = fakes(single_topic_scaler());
        let (cluster, commands) = (Arc::new(cluster), Arc::new(commands));
        let mut runner = runner(cluster.clone(), commands.clone());

        let report = runner
            .run(&[scenarios::earliest_policy(&BaseNames::default())])
            .await;

        assert!(report.is_success(), "{}", report);
        assert_eq!(runner.phase(), RunPhase::Done);
        assert_eq!(workload.lock().unwrap().published(TOPIC_1), 7);

        // Setup order: namespace, client pod, cluster, four topics each waited on
        let calls = cluster.calls();
        assert_eq!(calls[0], "ensure_namespace kafka-test-ns");
        assert_eq!(calls[1], "apply Pod/kafka-test-client");
        assert_eq!(calls[2], "apply Kafka/kafka-test-kafka");
        assert_eq!(calls[3], "wait Kafka/kafka-test-kafka");
        assert_eq!(cluster.count("wait KafkaTopic/kafka-topic-one-invalid-offset"), 1);

        // Scenario resources deleted once; base resources torn down once
        assert_eq!(cluster.count("delete Deployment/kafka-test-deployment"), 1);
        assert_eq!(cluster.count("delete ScaledObject/kafka-test-so"), 1);
        assert_eq!(cluster.count("delete Pod/kafka-test-client"), 1);
        assert_eq!(cluster.count("delete KafkaTopic/kafka-topic2"), 1);
        assert_eq!(calls.last().map(String::as_str), Some("delete_namespace kafka-test-ns"));

        let log = commands.log.lock().unwrap();
        assert!(log[0].starts_with("helm repo add strimzi"));
        assert!(log.last().unwrap().starts_with("helm uninstall"));
    }

    #[tokio::test(start_paused = true)]
    async fn story_multi_topic_sums_lag_across_topics() {
        // group lag is the sum over both topics, once the group has offsets
        let (workload, cluster, commands) = fakes(Box::new(|w: &Workload| {
            if !w.committed(TOPIC_1, MULTI_TOPIC_GROUP) || !w.committed(TOPIC_2, MULTI_TOPIC_GROUP) {
                return 0;
            }
            (w.published(TOPIC_1) + w.published(TOPIC_2)).min(TOPIC_PARTITIONS) as i32
        }));
        let mut runner = runner(Arc::new(cluster), Arc::new(commands));

        let report = runner
            .run(&[scenarios::multi_topic(&BaseNames::default())])
            .await;

        assert!(report.is_success(), "{}", report);
        let workload = workload.lock().unwrap();
        assert_eq!(workload.published(TOPIC_1), 1);
        assert_eq!(workload.published(TOPIC_2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn story_multi_topic_fails_when_second_topic_is_ignored() {
        // a scaler that only sees the first topic never reaches 2
        let (_, cluster, commands) = fakes(Box::new(|w: &Workload| w.published(TOPIC_1) as i32));
        let mut runner = runner(Arc::new(cluster), Arc::new(commands));

        let report = runner
            .run(&[scenarios::multi_topic(&BaseNames::default())])
            .await;

        match &report.scenarios[0].outcome {
            Outcome::AssertionsFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].step.contains("reach 2"));
            }
            other => panic!("Expected AssertionsFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn story_one_on_invalid_offset_holds_one_until_commit() {
        let (workload, cluster, commands) = fakes(Box::new(|w: &Workload| {
            if w.committed(ONE_INVALID_OFFSET_TOPIC, INVALID_OFFSET_GROUP) {
                0
            } else {
                1
            }
        }));
        let mut runner = runner(Arc::new(cluster), Arc::new(commands));

        let report = runner
            .run(&[scenarios::one_on_invalid_offset(&BaseNames::default())])
            .await;

        assert!(report.is_success(), "{}", report);
        let workload = workload.lock().unwrap();
        assert!(workload.committed(ONE_INVALID_OFFSET_TOPIC, INVALID_OFFSET_GROUP));
        assert_eq!(workload.published(ONE_INVALID_OFFSET_TOPIC), 1);
    }

    // =========================================================================
    // Story: A failed assertion is recorded, cleanup still runs exactly once
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn story_failed_assertion_still_deletes_exactly_once() {
        let (_, cluster, commands) = fakes(never_scales());
        let cluster = Arc::new(cluster);
        let mut runner = runner(cluster.clone(), Arc::new(commands));
        let names = BaseNames::default();

        let report = runner
            .run(&[scenarios::earliest_policy(&names), scenarios::zero_on_invalid_offset(&names)])
            .await;

        match &report.scenarios[0].outcome {
            Outcome::AssertionsFailed(failures) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].step.contains("reach 2"));
                assert!(failures[1].step.contains("reach 3"));
            }
            other => panic!("Expected AssertionsFailed, got {other:?}"),
        }
        // the run went on to the next scenario
        assert!(report.scenarios[1].outcome.is_passed());
        assert!(!report.is_success());
        assert_eq!(runner.phase(), RunPhase::Done);

        // one delete per scenario
        assert_eq!(cluster.count("delete Deployment/kafka-test-deployment"), 2);
        assert_eq!(cluster.count("delete ScaledObject/kafka-test-so"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn story_convergence_budget_is_wall_clock_bounded() {
        let (_, cluster, commands) = fakes(never_scales());
        let mut runner = runner(Arc::new(cluster), Arc::new(commands));
        let start = Instant::now();

        let report = runner
            .run(&[scenarios::one_on_invalid_offset(&BaseNames::default())])
            .await;

        // wait for 1 fails (60x2s), wait for 0 passes at once
        match &report.scenarios[0].outcome {
            Outcome::AssertionsFailed(failures) => assert_eq!(failures.len(), 1),
            other => panic!("Expected AssertionsFailed, got {other:?}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(59 * 2));
    }

    // =========================================================================
    // Story: Command and apply errors abort only their scenario
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn story_command_timeout_aborts_scenario_not_run() {
        let (_, cluster, mut commands) = fakes(single_topic_scaler());
        commands.fail_publish = true;
        let cluster = Arc::new(cluster);
        let mut runner = runner(cluster.clone(), Arc::new(commands));
        let names = BaseNames::default();

        let report = runner
            .run(&[scenarios::earliest_policy(&names), scenarios::zero_on_invalid_offset(&names)])
            .await;

        match &report.scenarios[0].outcome {
            Outcome::Aborted { failures, error } => {
                assert!(failures.is_empty());
                assert!(error.contains("timed out"));
            }
            other => panic!("Expected Aborted, got {other:?}"),
        }
        assert!(report.scenarios[1].outcome.is_passed());
        assert_eq!(cluster.count("delete ScaledObject/kafka-test-so"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn story_apply_failure_still_deletes_every_rendered_resource() {
        let (_, mut cluster, commands) = fakes(single_topic_scaler());
        cluster.fail_apply = Some("ScaledObject/kafka-test-so");
        let cluster = Arc::new(cluster);
        let mut runner = runner(cluster.clone(), Arc::new(commands));

        let report = runner
            .run(&[scenarios::multi_topic(&BaseNames::default())])
            .await;

        assert!(matches!(report.scenarios[0].outcome, Outcome::Aborted { .. }));
        assert_eq!(runner.phase(), RunPhase::Done);
        assert_eq!(cluster.count("delete Deployment/kafka-test-deployment"), 1);
        assert_eq!(cluster.count("delete ScaledObject/kafka-test-so"), 1);
    }

    // =========================================================================
    // Story: A template error stops the run after cleanup
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn story_template_error_skips_remaining_scenarios() {
        const BROKEN: ResourceTemplate = ResourceTemplate::new(
            "brokenTemplate",
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ${no_such_field}\n",
        );
        let names = BaseNames::default();
        let mut broken = scenarios::earliest_policy(&names);
        broken.templates = vec![SINGLE_DEPLOYMENT, BROKEN];

        let (workload, cluster, commands) = fakes(single_topic_scaler());
        let cluster = Arc::new(cluster);
        let mut runner = runner(cluster.clone(), Arc::new(commands));

        let report = runner
            .run(&[broken, scenarios::zero_on_invalid_offset(&names)])
            .await;

        match &report.scenarios[0].outcome {
            Outcome::Aborted { error, .. } => assert!(error.contains("brokenTemplate")),
            other => panic!("Expected Aborted, got {other:?}"),
        }
        assert_eq!(report.scenarios[1].outcome, Outcome::Skipped);
        assert!(report.fatal_error.is_some());
        assert!(!report.is_success());
        assert_eq!(runner.phase(), RunPhase::Failed);

        // nothing was applied, the rendered deployment is still deleted once
        assert_eq!(cluster.count("apply Deployment/kafka-test-deployment"), 0);
        assert_eq!(cluster.count("delete Deployment/kafka-test-deployment"), 1);
        assert_eq!(workload.lock().unwrap().total_published(), 0);
        // teardown still ran
        assert_eq!(cluster.count("delete_namespace kafka-test-ns"), 1);
    }

    // =========================================================================
    // Story: Setup failure skips scenarios but tears down
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn story_setup_failure_skips_scenarios_and_tears_down() {
        let (_, mut cluster, commands) = fakes(single_topic_scaler());
        cluster.fail_wait = true;
        let (cluster, commands) = (Arc::new(cluster), Arc::new(commands));
        let mut runner = runner(cluster.clone(), commands.clone());

        let report = runner
            .run(&scenarios::all(&BaseNames::default()))
            .await;

        assert!(report.setup_error.as_deref().unwrap_or("").contains("kafka cluster"));
        assert!(report.scenarios.iter().all(|s| s.outcome == Outcome::Skipped));
        assert_eq!(report.failed_count(), 5);
        assert_eq!(runner.phase(), RunPhase::Failed);

        // nothing from a scenario was applied
        assert_eq!(cluster.count("apply Deployment/kafka-test-deployment"), 0);
        // what setup created is removed
        assert_eq!(cluster.count("delete Kafka/kafka-test-kafka"), 1);
        assert_eq!(cluster.count("delete Pod/kafka-test-client"), 1);
        assert_eq!(cluster.count("delete_namespace kafka-test-ns"), 1);
        assert!(commands
            .log
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with("helm uninstall")));
    }

    #[tokio::test(start_paused = true)]
    async fn story_keep_namespace() {
        let (_, cluster, commands) = fakes(single_topic_scaler());
        let cluster = Arc::new(cluster);
        let options = RunnerOptions {
            keep_namespace: true,
            ..Default::default()
        };
        let mut runner = Runner::new(BaseNames::default(), cluster.clone(), Arc::new(commands), options);

        let report = runner.run(&[]).await;

        assert!(report.is_success());
        assert_eq!(cluster.count("delete_namespace kafka-test-ns"), 0);
        assert_eq!(cluster.count("delete Pod/kafka-test-client"), 1);
    }
}
