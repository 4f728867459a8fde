//! Resource templates
//!
//! Placeholders are the field names of [`crate::params::ScenarioParameters`].

use lagscale_common::template::ResourceTemplate;

/// One consumer container reading the topic named in `params`
pub const SINGLE_DEPLOYMENT: ResourceTemplate = ResourceTemplate::new(
    "singleDeploymentTemplate",
    r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: ${deployment_name}
  namespace: ${test_namespace}
  labels:
    app: ${deployment_name}
spec:
  replicas: 0
  selector:
    matchLabels:
      app: kafka-consumer
  template:
    metadata:
      labels:
        app: kafka-consumer
    spec:
      containers:
      - name: kafka-consumer
        image: confluentinc/cp-kafka:5.2.1
        command:
          - sh
          - -c
          - "kafka-console-consumer --bootstrap-server ${bootstrap_server} ${params} --consumer-property enable.auto.commit=${commit}"
"#,
);

/// Two consumer containers joining the same group, one per topic
///
/// The consumer image predates `--include`, so each topic gets a container.
pub const MULTI_DEPLOYMENT: ResourceTemplate = ResourceTemplate::new(
    "multiDeploymentTemplate",
    r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: ${deployment_name}
  namespace: ${test_namespace}
  labels:
    app: ${deployment_name}
spec:
  replicas: 0
  selector:
    matchLabels:
      app: kafka-consumer
  template:
    metadata:
      labels:
        app: kafka-consumer
    spec:
      containers:
      - name: kafka-consumer
        image: confluentinc/cp-kafka:5.2.1
        command:
          - sh
          - -c
          - "kafka-console-consumer --bootstrap-server ${bootstrap_server} --topic '${topic1_name}' --group multiTopic --from-beginning --consumer-property enable.auto.commit=false"
      - name: kafka-consumer-2
        image: confluentinc/cp-kafka:5.2.1
        command:
          - sh
          - -c
          - "kafka-console-consumer --bootstrap-server ${bootstrap_server} --topic '${topic2_name}' --group multiTopic --from-beginning --consumer-property enable.auto.commit=false"
"#,
);

/// Scaler on one topic with activation threshold 1
pub const SINGLE_SCALED_OBJECT: ResourceTemplate = ResourceTemplate::new(
    "singleScaledObjectTemplate",
    r#"
apiVersion: keda.sh/v1alpha1
kind: ScaledObject
metadata:
  name: ${scaled_object_name}
  namespace: ${test_namespace}
  labels:
    app: ${deployment_name}
spec:
  scaleTargetRef:
    name: ${deployment_name}
  triggers:
  - type: kafka
    metadata:
      topic: ${topic_name}
      bootstrapServers: ${bootstrap_server}
      consumerGroup: ${reset_policy}
      lagThreshold: '1'
      activationLagThreshold: '1'
      offsetResetPolicy: ${reset_policy}
"#,
);

/// Scaler without a topic: lag is summed over every topic of the group
pub const MULTI_SCALED_OBJECT: ResourceTemplate = ResourceTemplate::new(
    "multiScaledObjectTemplate",
    r#"
apiVersion: keda.sh/v1alpha1
kind: ScaledObject
metadata:
  name: ${scaled_object_name}
  namespace: ${test_namespace}
  labels:
    app: ${deployment_name}
spec:
  scaleTargetRef:
    name: ${deployment_name}
  triggers:
  - type: kafka
    metadata:
      bootstrapServers: ${bootstrap_server}
      consumerGroup: multiTopic
      lagThreshold: '1'
      offsetResetPolicy: 'latest'
"#,
);

/// Scaler for a group with no committed offset
pub const INVALID_OFFSET_SCALED_OBJECT: ResourceTemplate = ResourceTemplate::new(
    "invalidOffsetScaledObjectTemplate",
    r#"
apiVersion: keda.sh/v1alpha1
kind: ScaledObject
metadata:
  name: ${scaled_object_name}
  namespace: ${test_namespace}
  labels:
    app: ${deployment_name}
spec:
  scaleTargetRef:
    name: ${deployment_name}
  triggers:
  - type: kafka
    metadata:
      topic: ${topic_name}
      bootstrapServers: ${bootstrap_server}
      consumerGroup: ${reset_policy}
      lagThreshold: '1'
      scaleToZeroOnInvalidOffset: '${scale_to_zero_on_invalid}'
      offsetResetPolicy: 'latest'
"#,
);

/// Single-broker Strimzi cluster with ephemeral storage
pub const KAFKA_CLUSTER: ResourceTemplate = ResourceTemplate::new(
    "kafkaClusterTemplate",
    r#"apiVersion: kafka.strimzi.io/v1beta2
kind: Kafka
metadata:
  name: ${kafka_name}
  namespace: ${test_namespace}
spec:
  kafka:
    version: "3.1.0"
    replicas: 1
    listeners:
      - name: plain
        port: 9092
        type: internal
        tls: false
      - name: tls
        port: 9093
        type: internal
        tls: true
    config:
      offsets.topic.replication.factor: 1
      transaction.state.log.replication.factor: 1
      transaction.state.log.min.isr: 1
      log.message.format.version: "2.5"
    storage:
      type: ephemeral
  zookeeper:
    replicas: 1
    storage:
      type: ephemeral
  entityOperator:
    topicOperator: {}
    userOperator: {}
"#,
);

/// Topic owned by the cluster's topic operator
pub const KAFKA_TOPIC: ResourceTemplate = ResourceTemplate::new(
    "kafkaTopicTemplate",
    r#"apiVersion: kafka.strimzi.io/v1beta2
kind: KafkaTopic
metadata:
  name: ${kafka_topic_name}
  namespace: ${test_namespace}
  labels:
    strimzi.io/cluster: ${kafka_name}
spec:
  partitions: ${kafka_topic_partitions}
  replicas: 1
  config:
    retention.ms: 604800000
    segment.bytes: 1073741824
"#,
);

/// Idle pod that producer and consumer commands are exec'd into
pub const KAFKA_CLIENT: ResourceTemplate = ResourceTemplate::new(
    "kafkaClientTemplate",
    r#"
apiVersion: v1
kind: Pod
metadata:
  name: ${kafka_client_name}
  namespace: ${test_namespace}
spec:
  containers:
  - name: ${kafka_client_name}
    image: confluentinc/cp-kafka:5.2.1
    command:
      - sh
      - -c
      - "exec tail -f /dev/null"
"#,
);

/// Every template
pub const ALL: &[ResourceTemplate] = &[
    SINGLE_DEPLOYMENT,
    MULTI_DEPLOYMENT,
    SINGLE_SCALED_OBJECT,
    MULTI_SCALED_OBJECT,
    INVALID_OFFSET_SCALED_OBJECT,
    KAFKA_CLUSTER,
    KAFKA_TOPIC,
    KAFKA_CLIENT,
];
