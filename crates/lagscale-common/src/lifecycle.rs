//! Resource lifecycle management
//!
//! [`ResourceManager`] applies and deletes rendered documents through a
//! [`ClusterClient`] and keeps a ledger of what is live, so teardown can
//! remove whatever is still applied even after a step failed halfway.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::kube_utils::{parse_manifest, ClusterClient};
use crate::template::RenderedResource;
use crate::Error;

/// A resource the manager applied and has not deleted yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveResource {
    /// Name of the template the document came from
    pub template: &'static str,
    /// Namespace it was applied into
    pub namespace: String,
    /// Resource kind
    pub kind: String,
    /// Resource name
    pub name: String,
    /// The applied document
    pub document: String,
}

impl LiveResource {
    fn is(&self, namespace: &str, kind: &str, name: &str) -> bool {
        self.namespace == namespace && self.kind == kind && self.name == name
    }
}

/// Applies rendered resources and tracks which are live
pub struct ResourceManager {
    cluster: Arc<dyn ClusterClient>,
    live: Vec<LiveResource>,
}

impl ResourceManager {
    /// Create a manager with an empty ledger
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            live: Vec::new(),
        }
    }

    /// The underlying cluster client
    pub fn cluster(&self) -> &Arc<dyn ClusterClient> {
        &self.cluster
    }

    /// Resources currently applied, oldest first
    pub fn live(&self) -> &[LiveResource] {
        &self.live
    }

    /// Apply one resource and record it as live
    ///
    /// Re-applying the same kind and name replaces the ledger entry.
    pub async fn apply(&mut self, namespace: &str, resource: &RenderedResource) -> Result<(), Error> {
        let meta = parse_manifest(&resource.document)?;
        let kind = meta.api_resource.kind;
        debug!(template = %resource.template, kind = %kind, name = %meta.name, "applying");

        self.cluster.apply(namespace, &resource.document).await?;
        self.live.retain(|r| !r.is(namespace, &kind, &meta.name));
        self.live.push(LiveResource {
            template: resource.template,
            namespace: namespace.to_string(),
            kind,
            name: meta.name,
            document: resource.document.clone(),
        });
        Ok(())
    }

    /// Apply resources in order, stopping at the first failure
    pub async fn apply_all(
        &mut self,
        namespace: &str,
        resources: &[RenderedResource],
    ) -> Result<(), Error> {
        for resource in resources {
            self.apply(namespace, resource).await?;
        }
        Ok(())
    }

    /// Delete one resource and drop it from the ledger
    ///
    /// The ledger entry goes even if the delete fails; nothing retries it.
    pub async fn delete(&mut self, namespace: &str, resource: &RenderedResource) -> Result<(), Error> {
        let meta = parse_manifest(&resource.document)?;
        debug!(template = %resource.template, kind = %meta.api_resource.kind, name = %meta.name, "deleting");

        self.live.retain(|r| !r.is(namespace, &meta.api_resource.kind, &meta.name));
        self.cluster.delete(namespace, &resource.document).await
    }

    /// Delete every resource, newest first, issuing each delete exactly once.
    ///
    /// Failures are logged and returned, never short-circuit.
    pub async fn delete_all(
        &mut self,
        namespace: &str,
        resources: &[RenderedResource],
    ) -> Vec<Error> {
        let mut errors = Vec::new();
        for resource in resources.iter().rev() {
            if let Err(e) = self.delete(namespace, resource).await {
                warn!(template = %resource.template, error = %e, "delete failed");
                errors.push(e);
            }
        }
        errors
    }

    /// Delete everything still in the ledger, newest first
    pub async fn teardown(&mut self) -> Vec<Error> {
        let mut errors = Vec::new();
        while let Some(resource) = self.live.pop() {
            debug!(kind = %resource.kind, name = %resource.name, "tearing down");
            if let Err(e) = self.cluster.delete(&resource.namespace, &resource.document).await {
                warn!(template = %resource.template, error = %e, "teardown delete failed");
                errors.push(e);
            }
        }
        errors
    }
}
