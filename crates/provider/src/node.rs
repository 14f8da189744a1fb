//! Static description of the virtual node the provider registers as.

use std::collections::BTreeMap;

use chrono::Utc;
use k8s_openapi::api::core::v1::{
    DaemonEndpoint, Node, NodeAddress, NodeCondition, NodeDaemonEndpoints, NodeSpec, NodeStatus,
    NodeSystemInfo,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

use crate::config::NodeConfig;
use crate::provider::EciProvider;

const NODE_CPU: &str = "1000";
const NODE_MEMORY: &str = "4Ti";

pub fn capacity(node: &NodeConfig) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(NODE_CPU.to_string())),
        ("memory".to_string(), Quantity(NODE_MEMORY.to_string())),
        ("pods".to_string(), Quantity(node.max_pods.clone())),
    ])
}

/// Kubelet-style conditions: always ready and never under pressure.
pub fn conditions() -> Vec<NodeCondition> {
    let now = Time(Utc::now());
    let condition = |kind: &str, status: &str, reason: &str, message: &str| NodeCondition {
        type_: kind.to_string(),
        status: status.to_string(),
        last_heartbeat_time: Some(now.clone()),
        last_transition_time: Some(now.clone()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
    };

    vec![
        condition("Ready", "True", "KubeletReady", "kubelet is ready."),
        condition(
            "OutOfDisk",
            "False",
            "KubeletHasSufficientDisk",
            "kubelet has sufficient disk space available",
        ),
        condition(
            "MemoryPressure",
            "False",
            "KubeletHasSufficientMemory",
            "kubelet has sufficient memory available",
        ),
        condition(
            "DiskPressure",
            "False",
            "KubeletHasNoDiskPressure",
            "kubelet has no disk pressure",
        ),
        condition(
            "NetworkUnavailable",
            "False",
            "RouteCreated",
            "RouteController created a route",
        ),
    ]
}

pub fn addresses(node: &NodeConfig) -> Vec<NodeAddress> {
    vec![NodeAddress {
        type_: "InternalIP".to_string(),
        address: node.internal_ip.clone(),
    }]
}

pub fn daemon_endpoints(node: &NodeConfig) -> NodeDaemonEndpoints {
    NodeDaemonEndpoints {
        kubelet_endpoint: Some(DaemonEndpoint {
            port: node.daemon_port,
        }),
    }
}

pub fn labels(node: &NodeConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("type".to_string(), "virtual-kubelet".to_string()),
        ("kubernetes.io/role".to_string(), "agent".to_string()),
        (
            "kubernetes.io/os".to_string(),
            node.operating_system.to_lowercase(),
        ),
        ("kubernetes.io/hostname".to_string(), node.node_name.clone()),
        (
            "alpha.service-controller.kubernetes.io/exclude-balancer".to_string(),
            "true".to_string(),
        ),
    ])
}

/// The full node object as it would be registered with the API server.
pub fn node(config: &NodeConfig) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(config.node_name.clone()),
            labels: Some(labels(config)),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        status: Some(NodeStatus {
            capacity: Some(capacity(config)),
            allocatable: Some(capacity(config)),
            conditions: Some(conditions()),
            addresses: Some(addresses(config)),
            daemon_endpoints: Some(daemon_endpoints(config)),
            node_info: Some(NodeSystemInfo {
                operating_system: config.operating_system.clone(),
                architecture: "amd64".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
    }
}

impl EciProvider {
    pub fn capacity(&self) -> BTreeMap<String, Quantity> {
        capacity(self.node_config())
    }

    pub fn node_conditions(&self) -> Vec<NodeCondition> {
        conditions()
    }

    pub fn node_addresses(&self) -> Vec<NodeAddress> {
        addresses(self.node_config())
    }

    pub fn node_daemon_endpoints(&self) -> NodeDaemonEndpoints {
        daemon_endpoints(self.node_config())
    }

    pub fn operating_system(&self) -> &str {
        &self.node_config().operating_system
    }

    pub fn node(&self) -> Node {
        node(self.node_config())
    }
}
