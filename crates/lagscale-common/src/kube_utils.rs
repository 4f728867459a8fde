//! Kubernetes access for rendered documents
//!
//! Documents stay opaque until the moment they are sent: [`parse_manifest`]
//! pulls out just enough (apiVersion, kind, name, namespace) to address the
//! resource, and the whole JSON value goes to the API server through
//! server-side apply on a `DynamicObject` API. Apply returns as soon as the
//! API server accepts the document; readiness is a separate wait.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};
use tracing::{debug, info, trace};

#[cfg(test)]
use mockall::automock;

use crate::poll::{poll, PollOptions, PollOutcome, Verdict};
use crate::Error;

/// Field manager recorded on every server-side apply
pub const FIELD_MANAGER: &str = "lagscale";

/// Ready condition type
pub const CONDITION_READY: &str = "Ready";
/// Condition status value for true
pub const STATUS_TRUE: &str = "True";

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between readiness checks in [`ClusterClient::wait_for_condition`]
pub const CONDITION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Kinds that are never namespaced
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleBinding",
    "PersistentVolume",
    "StorageClass",
];

/// Plurals that simple suffix rules get wrong, or that are hot enough to
/// look up directly
const KIND_PLURALS: &[(&str, &str)] = &[
    ("kafka", "kafkas"),
    ("kafkatopic", "kafkatopics"),
    ("scaledobject", "scaledobjects"),
    ("deployment", "deployments"),
    ("pod", "pods"),
    ("namespace", "namespaces"),
    ("endpoints", "endpoints"),
];

/// Replica counts read from a deployment's status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicaCounts {
    /// `status.readyReplicas`
    pub ready: i32,
    /// `status.replicas`
    pub current: i32,
}

/// A resource condition to wait for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConditionTarget {
    /// API version of the resource (e.g. `kafka.strimzi.io/v1beta2`)
    pub api_version: String,
    /// Resource kind
    pub kind: String,
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Condition type that must be `True`
    pub condition: String,
}

impl ConditionTarget {
    /// Wait for the `Ready` condition of a resource
    pub fn ready(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            condition: CONDITION_READY.to_string(),
        }
    }
}

impl fmt::Display for ConditionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} in {} to be {}",
            self.kind.to_lowercase(),
            self.name,
            self.namespace,
            self.condition
        )
    }
}

/// Trait abstracting the cluster operations the orchestrator needs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Server-side apply a rendered document into `namespace`
    ///
    /// A namespace set in the document itself wins.
    async fn apply(&self, namespace: &str, document: &str) -> Result<(), Error>;

    /// Delete the resource a rendered document describes
    ///
    /// A resource that is already gone counts as deleted.
    async fn delete(&self, namespace: &str, document: &str) -> Result<(), Error>;

    /// Read the replica counts of a deployment
    async fn deployment_replicas(&self, namespace: &str, name: &str)
        -> Result<ReplicaCounts, Error>;

    /// Block until a condition is `True` or `timeout` expires
    async fn wait_for_condition(
        &self,
        target: &ConditionTarget,
        timeout: Duration,
    ) -> Result<(), Error>;

    /// Create a namespace if it does not exist
    async fn ensure_namespace(&self, name: &str) -> Result<(), Error>;

    /// Delete a namespace, succeeding if it is already gone
    async fn delete_namespace(&self, name: &str) -> Result<(), Error>;
}

/// [`ClusterClient`] backed by a kube-rs client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, metadata: &ManifestMetadata, namespace: &str) -> Api<DynamicObject> {
        if is_cluster_scoped(&metadata.api_resource.kind) {
            Api::all_with(self.client.clone(), &metadata.api_resource)
        } else {
            let ns = metadata.namespace.as_deref().unwrap_or(namespace);
            Api::namespaced_with(self.client.clone(), ns, &metadata.api_resource)
        }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn apply(&self, namespace: &str, document: &str) -> Result<(), Error> {
        let metadata = parse_manifest(document)?;
        let api = self.dynamic_api(&metadata, namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();

        api.patch(&metadata.name, &params, &Patch::Apply(&metadata.value))
            .await
            .map_err(|e| Error::apply(&metadata.api_resource.kind, &metadata.name, e.to_string()))?;

        info!(
            kind = %metadata.api_resource.kind,
            name = %metadata.name,
            namespace = %metadata.namespace.as_deref().unwrap_or(namespace),
            "applied resource"
        );
        Ok(())
    }

    async fn delete(&self, namespace: &str, document: &str) -> Result<(), Error> {
        let metadata = parse_manifest(document)?;
        let api = self.dynamic_api(&metadata, namespace);

        match api.delete(&metadata.name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(kind = %metadata.api_resource.kind, name = %metadata.name, "deleted resource");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!(kind = %metadata.api_resource.kind, name = %metadata.name, "resource already gone");
                Ok(())
            }
            Err(e) => Err(Error::delete(
                &metadata.api_resource.kind,
                &metadata.name,
                e.to_string(),
            )),
        }
    }

    async fn deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReplicaCounts, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployment = api.get(name).await?;
        let status = deployment.status.unwrap_or_default();
        let counts = ReplicaCounts {
            ready: status.ready_replicas.unwrap_or(0),
            current: status.replicas.unwrap_or(0),
        };
        trace!(deployment = %name, ready = counts.ready, current = counts.current, "read replicas");
        Ok(counts)
    }

    async fn wait_for_condition(
        &self,
        target: &ConditionTarget,
        timeout: Duration,
    ) -> Result<(), Error> {
        let ar = build_api_resource(&target.api_version, &target.kind);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &target.namespace, &ar);

        await_condition(&target.to_string(), &target.condition, timeout, || {
            let api = api.clone();
            let name = target.name.clone();
            async move { Ok(api.get_opt(&name).await?.map(|obj| obj.data)) }
        })
        .await
    }

    async fn ensure_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": name }
        });
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&ns))
            .await?;
        info!(namespace = %name, "namespace ensured");
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                info!(namespace = %name, "namespace deleted");
                Ok(())
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(Error::delete("Namespace", name, e.to_string())),
        }
    }
}

/// Poll `fetch` until the fetched object carries `condition`.
///
/// `timeout` bounds wall-clock time, slow reads included.
async fn await_condition<F, Fut>(
    description: &str,
    condition: &str,
    timeout: Duration,
    fetch: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<serde_json::Value>, Error>>,
{
    let options = PollOptions::fixed(condition_attempts(timeout), CONDITION_POLL_INTERVAL);
    info!(target = %description, timeout = ?timeout, "waiting for condition");

    let polled = tokio::time::timeout(
        timeout,
        poll(&options, description, fetch, |object: &Option<serde_json::Value>| {
            match object {
                Some(data) if has_condition(data, condition) => Verdict::Satisfied,
                _ => Verdict::Pending,
            }
        }),
    )
    .await;

    match polled {
        Ok(PollOutcome::Satisfied { .. }) => {
            info!(target = %description, "condition met");
            Ok(())
        }
        _ => Err(Error::condition_timeout(description, timeout)),
    }
}

/// Reads that fit in `timeout`: one up front, then one per poll interval
fn condition_attempts(timeout: Duration) -> u32 {
    let intervals = (timeout.as_millis() / CONDITION_POLL_INTERVAL.as_millis()).max(1);
    u32::try_from(intervals).unwrap_or(u32::MAX).saturating_add(1)
}

/// Create a kube client from optional kubeconfig path with default timeouts
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, Error> {
    create_client_with_timeout(kubeconfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).await
}

/// Create a kube client from optional kubeconfig path with custom timeouts
///
/// Without a path the config is inferred (`KUBECONFIG`, `~/.kube/config` or
/// in-cluster).
pub async fn create_client_with_timeout(
    kubeconfig: Option<&Path>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::internal_with_context(
                    "create_client",
                    format!("failed to read kubeconfig {}: {}", path.display(), e),
                )
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| {
                    Error::internal_with_context(
                        "create_client",
                        format!("failed to load kubeconfig: {}", e),
                    )
                })?
        }
        None => Config::infer().await.map_err(|e| {
            Error::internal_with_context("create_client", format!("failed to infer config: {}", e))
        })?,
    };
    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("create_client", format!("failed to create client: {}", e))
    })
}

/// Parsed manifest metadata for addressing a resource
#[derive(Debug, Clone)]
pub struct ManifestMetadata {
    /// The parsed JSON value
    pub value: serde_json::Value,
    /// Resource name
    pub name: String,
    /// Namespace from the document, if any
    pub namespace: Option<String>,
    /// API resource definition
    pub api_resource: ApiResource,
}

/// Parse a rendered document and extract what is needed to address it
pub fn parse_manifest(manifest: &str) -> Result<ManifestMetadata, Error> {
    let value: serde_json::Value = if manifest.trim_start().starts_with('{') {
        serde_json::from_str(manifest).map_err(|e| Error::yaml(format!("invalid JSON: {}", e)))?
    } else {
        crate::yaml::parse_document(manifest)?
    };

    let api_version = value
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::yaml("manifest missing apiVersion"))?
        .to_string();

    let kind = value
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::yaml("manifest missing kind"))?
        .to_string();

    let name = value
        .pointer("/metadata/name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::yaml(format!("{} manifest missing metadata.name", kind)))?
        .to_string();

    let namespace = value
        .pointer("/metadata/namespace")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let api_resource = build_api_resource(&api_version, &kind);

    Ok(ManifestMetadata {
        value,
        name,
        namespace,
        api_resource,
    })
}

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use lagscale_common::kube_utils::parse_api_version;
///
/// assert_eq!(parse_api_version("keda.sh/v1alpha1"), ("keda.sh".to_string(), "v1alpha1".to_string()));
/// assert_eq!(parse_api_version("v1"), ("".to_string(), "v1".to_string()));
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from apiVersion and kind without discovery
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Pluralize a Kubernetes resource kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();

    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }

    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Whether a resource body has `status.conditions[type=condition].status == "True"`
pub fn has_condition(data: &serde_json::Value, condition: &str) -> bool {
    data.pointer("/status/conditions")
        .and_then(|c| c.as_array())
        .map(|conditions| {
            conditions.iter().any(|c| {
                c.get("type").and_then(|t| t.as_str()) == Some(condition)
                    && c.get("status").and_then(|s| s.as_str()) == Some(STATUS_TRUE)
            })
        })
        .unwrap_or(false)
}
