//! Pod lifecycle operations backed by remote container groups.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Pod, PodStatus};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cdsapi::{ApiClient, CloudRequest};
use crate::config::NodeConfig;
use crate::eci::status::{container_group_to_pod, INSTANCE_ID_ANNOTATION};
use crate::eci::translate::{self, group_name, pod_name, pod_namespace};
use crate::eci::types::{
    ContainerGroup, ContainerGroupList, DeleteContainerGroup, DescribeContainerGroups,
    CREATE_CONTAINER_GROUP, DELETE_CONTAINER_GROUP, DESCRIBE_CONTAINER_GROUPS,
};
use crate::resources::ResourceManager;
use crate::{Error, Result};

pub const CLUSTER_ID_ANNOTATION: &str = "cluster-id";
pub const NODE_ID_ANNOTATION: &str = "virtual-node-id";
pub const PRIVATE_ID_ANNOTATION: &str = "eci-private_id";
pub const TASK_ID_ANNOTATION: &str = "eci-task-id";
pub const INSTANCE_CPU_ANNOTATION: &str = "eci-instance-cpu";
pub const INSTANCE_MEM_ANNOTATION: &str = "eci-instance-mem";

/// Business codes that fail a create outright.
const MAX_POD_ERROR: &str = "MaxPodError";
const CREATE_TASK_ERROR: &str = "CreateEciTaskError";

/// Storage plugin pods that are never scheduled remotely.
const IGNORED_POD_MARKERS: [&str; 3] = ["disk-csi-cds-node", "nas-csi-cds-node", "oss-csi-cds-node"];

/// Outcome of resolving a pod to its remote container group.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ContainerGroup),
    /// Created here but not yet reported by the remote listing.
    NotYetVisible,
    Absent,
    /// More than one group claims the name; none is picked.
    Ambiguous(usize),
}

impl Lookup {
    pub fn found(self) -> Option<ContainerGroup> {
        match self {
            Lookup::Found(group) => Some(group),
            _ => None,
        }
    }
}

pub struct EciProvider {
    client: ApiClient,
    node: NodeConfig,
    resources: Arc<dyn ResourceManager>,
    recently_created: RwLock<HashSet<String>>,
}

impl EciProvider {
    pub fn new(client: ApiClient, node: NodeConfig, resources: Arc<dyn ResourceManager>) -> Self {
        Self {
            client,
            node,
            resources,
            recently_created: RwLock::new(HashSet::new()),
        }
    }

    pub fn node_config(&self) -> &NodeConfig {
        &self.node
    }

    /// Submit a pod as a new container group.
    ///
    /// There is no idempotency key: calling this twice for the same pod
    /// creates two groups.
    pub async fn create_pod(&self, pod: &Pod, cancel: &CancellationToken) -> Result<()> {
        let namespace = pod_namespace(pod);
        let name = pod_name(pod);
        admit(pod)?;

        debug!(namespace, name, "Creating pod");
        let payload = translate::create_request(pod, &self.node, self.resources.as_ref()).await?;
        let request = CloudRequest::cck(
            self.client.config(),
            CREATE_CONTAINER_GROUP,
            "POST",
            None,
            &payload,
        )?;
        let envelope = self
            .client
            .call::<Value>(&request, Duration::ZERO, cancel)
            .await?;

        if envelope.code == MAX_POD_ERROR || envelope.code == CREATE_TASK_ERROR {
            error!(namespace, name, code = %envelope.code, message = %envelope.message, "Create rejected");
            return Err(Error::Business {
                code: envelope.code,
                message: envelope.message,
            });
        }

        self.recently_created
            .write()
            .await
            .insert(payload.container_group_name);
        info!(namespace, name, "Pod submitted");
        Ok(())
    }

    /// Stamp node identity annotations and, while the instance id is
    /// unknown, the remote instance details.
    pub async fn update_pod(&self, pod: &mut Pod, cancel: &CancellationToken) -> Result<()> {
        let namespace = pod_namespace(pod).to_string();
        let name = pod_name(pod).to_string();
        debug!(namespace = %namespace, name = %name, "Updating pod annotations");

        let known = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(INSTANCE_ID_ANNOTATION))
            .is_some_and(|id| !id.is_empty());
        let instance = if known {
            None
        } else {
            Some(self.lookup(&namespace, &name, cancel).await?.found())
        };

        let annotations = pod.metadata.annotations.get_or_insert_with(BTreeMap::new);
        annotations.insert(CLUSTER_ID_ANNOTATION.to_string(), self.node.cluster_id.clone());
        annotations.insert(NODE_ID_ANNOTATION.to_string(), self.node.node_id.clone());
        annotations.insert(PRIVATE_ID_ANNOTATION.to_string(), self.node.private_id.clone());

        if let Some(group) = instance {
            let (id, task, cpu, memory) = match group {
                Some(g) => (
                    g.container_group_id,
                    g.task_id,
                    format!("{:.1}", g.cpu),
                    format!("{:.1}", g.memory),
                ),
                None => Default::default(),
            };
            annotations.insert(INSTANCE_ID_ANNOTATION.to_string(), id);
            annotations.insert(TASK_ID_ANNOTATION.to_string(), task);
            annotations.insert(INSTANCE_CPU_ANNOTATION.to_string(), cpu);
            annotations.insert(INSTANCE_MEM_ANNOTATION.to_string(), memory);
        }
        Ok(())
    }

    /// Delete the pod's container group. A group the remote side no longer
    /// knows about counts as deleted.
    pub async fn delete_pod(&self, pod: &Pod, cancel: &CancellationToken) -> Result<()> {
        let namespace = pod_namespace(pod);
        let name = pod_name(pod);
        let composite = group_name(namespace, name);

        let annotated = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(INSTANCE_ID_ANNOTATION))
            .filter(|id| !id.is_empty())
            .cloned();
        let instance_id = match annotated {
            Some(id) => id,
            None => match self.lookup(namespace, name, cancel).await?.found() {
                Some(group) => group.container_group_id,
                None => {
                    debug!(namespace, name, "No container group to delete");
                    return Err(Error::NotFound(format!("can't find Pod {}", name)));
                }
            },
        };

        let request = CloudRequest::cck(
            self.client.config(),
            DELETE_CONTAINER_GROUP,
            "POST",
            None,
            &DeleteContainerGroup {
                container_group_id: instance_id.clone(),
            },
        )?;
        let response = self.client.send(&request, Duration::ZERO, cancel).await?;
        match self.client.decode::<Value>(DELETE_CONTAINER_GROUP, response) {
            Ok(envelope) => {
                debug!(namespace, name, instance_id = %instance_id, code = %envelope.code, "Delete accepted");
            }
            Err(e) if e.is_client_error() => {
                info!(namespace, name, instance_id = %instance_id, "Container group already gone: {}", e);
            }
            Err(e) => return Err(e),
        }

        self.recently_created.write().await.remove(&composite);
        Ok(())
    }

    /// Resolve `namespace/name` to exactly one remote group.
    pub async fn lookup(
        &self,
        namespace: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Lookup> {
        let composite = group_name(namespace, name);
        let mut groups = self.describe(namespace, name, cancel).await?;
        groups.retain(|g| g.container_group_name.is_empty() || g.container_group_name == composite);

        match groups.len() {
            1 => {
                self.recently_created.write().await.remove(&composite);
                Ok(Lookup::Found(groups.remove(0)))
            }
            0 if self.recently_created.read().await.contains(&composite) => {
                warn!(namespace, name, "Created pod is not visible remotely yet");
                Ok(Lookup::NotYetVisible)
            }
            0 => Ok(Lookup::Absent),
            n => {
                warn!(namespace, name, matches = n, "Container group name is not unique");
                Ok(Lookup::Ambiguous(n))
            }
        }
    }

    pub async fn get_pod(
        &self,
        namespace: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Pod>> {
        if IGNORED_POD_MARKERS.iter().any(|marker| name.contains(marker)) {
            return Ok(None);
        }
        debug!(namespace, name, "Getting pod");
        Ok(self
            .lookup(namespace, name, cancel)
            .await?
            .found()
            .map(|group| container_group_to_pod(&group, &self.node.node_name)))
    }

    pub async fn get_pod_status(
        &self,
        namespace: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<PodStatus>> {
        Ok(self
            .get_pod(namespace, name, cancel)
            .await?
            .and_then(|pod| pod.status))
    }

    /// Every group on this node, translated to pods.
    pub async fn list_pods(&self, cancel: &CancellationToken) -> Result<Vec<Pod>> {
        let groups = self.describe("", "", cancel).await?;
        let mut pods = Vec::with_capacity(groups.len());
        for group in groups {
            if group.pod_name.is_empty() || group.namespace.is_empty() {
                error!(
                    container_group_id = %group.container_group_id,
                    "Error converting container group to pod: missing pod name or namespace"
                );
                continue;
            }
            pods.push(container_group_to_pod(&group, &self.node.node_name));
        }
        Ok(pods)
    }

    async fn describe(
        &self,
        namespace: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerGroup>> {
        let container_group_name = if namespace.is_empty() || name.is_empty() {
            String::new()
        } else {
            group_name(namespace, name)
        };
        let filter = DescribeContainerGroups {
            site_id: self.node.site_id.clone(),
            node_id: self.node.node_id.clone(),
            namespace: namespace.to_string(),
            container_group_name,
            ..Default::default()
        };
        let request = CloudRequest::cck(
            self.client.config(),
            DESCRIBE_CONTAINER_GROUPS,
            "POST",
            None,
            &filter,
        )?;
        let jitter = self.client.config().describe_jitter;
        let envelope = self
            .client
            .call::<ContainerGroupList>(&request, jitter, cancel)
            .await?;
        Ok(envelope.data.map(|list| list.eci).unwrap_or_default())
    }
}

/// Workloads this provider refuses before any translation.
fn admit(pod: &Pod) -> Result<()> {
    let name = pod_name(pod);
    let owner_kind = pod
        .metadata
        .owner_references
        .as_ref()
        .and_then(|owners| owners.first())
        .map(|owner| owner.kind.as_str());
    if owner_kind == Some("DaemonSet") {
        return Err(Error::Unsupported(format!("{} DaemonSet unsupported", name)));
    }

    if let Some(status) = &pod.status {
        if status.reason.as_deref() == Some("ProviderFailed") {
            return Err(Error::Unsupported(status.message.clone().unwrap_or_default()));
        }
    }
    Ok(())
}
