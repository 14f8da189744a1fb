#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cds_eci_provider::{
    cdsapi::ApiClient,
    config::{ApiConfig, NodeConfig},
    provider::EciProvider,
    resources::ResourceManager,
    Result,
};
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Secret};
use serde_json::{json, Value};
use wiremock::{MockServer, ResponseTemplate};

/// Secrets and config maps held in memory, keyed by `namespace/name`.
#[derive(Default)]
pub struct InMemoryResources {
    secrets: Mutex<HashMap<String, Secret>>,
    config_maps: Mutex<HashMap<String, ConfigMap>>,
}

impl InMemoryResources {
    pub fn with_config_map(self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let config_map = ConfigMap {
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        };
        self.config_maps
            .lock()
            .unwrap()
            .insert(format!("{}/{}", namespace, name), config_map);
        self
    }

    pub fn with_secret(self, namespace: &str, name: &str, secret: Secret) -> Self {
        self.secrets
            .lock()
            .unwrap()
            .insert(format!("{}/{}", namespace, name), secret);
        self
    }
}

#[async_trait]
impl ResourceManager for InMemoryResources {
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&format!("{}/{}", namespace, name))
            .cloned())
    }

    async fn get_config_map(&self, name: &str, namespace: &str) -> Result<Option<ConfigMap>> {
        Ok(self
            .config_maps
            .lock()
            .unwrap()
            .get(&format!("{}/{}", namespace, name))
            .cloned())
    }
}

pub fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        host: server.uri(),
        access_key_id: "AKID".to_string(),
        access_key_secret: "secret".to_string(),
        retry_backoff: Duration::from_millis(10),
        describe_jitter: Duration::ZERO,
        ..Default::default()
    }
}

pub fn node_config() -> NodeConfig {
    NodeConfig {
        site_id: "site-1".to_string(),
        cluster_id: "cluster-1".to_string(),
        node_id: "node-1".to_string(),
        node_name: "vk-test".to_string(),
        private_id: "pipe-1".to_string(),
        internal_ip: "10.0.0.2".to_string(),
        ..Default::default()
    }
}

pub fn provider(server: &MockServer, resources: InMemoryResources) -> Arc<EciProvider> {
    let client = ApiClient::new(Arc::new(api_config(server))).unwrap();
    Arc::new(EciProvider::new(client, node_config(), Arc::new(resources)))
}

pub fn pod(value: Value) -> Pod {
    serde_json::from_value(value).unwrap()
}

pub fn web_pod() -> Pod {
    pod(json!({
        "metadata": {"name": "web", "namespace": "ns"},
        "spec": {"containers": [{
            "name": "nginx",
            "image": "nginx:1.21",
            "resources": {"limits": {"cpu": "500m", "memory": "256Mi"}}
        }]}
    }))
}

pub fn group(id: &str, namespace: &str, name: &str, status: &str) -> Value {
    json!({
        "container_group_id": id,
        "container_group_name": format!("{}-{}", namespace, name),
        "pod_name": name,
        "namespace": namespace,
        "status": status,
        "intranet_ip": "172.16.0.4",
        "creation_time": "2024-03-04T05-06-07Z",
        "cpu": 0.5,
        "memory": 0.25,
        "containers": [{
            "id": format!("{}-c0", id),
            "name": "nginx",
            "image": "nginx",
            "cpu": 0.5,
            "memory": 0.25,
            "current_state": {"state": status, "start_time": "2024-03-04T05:07:00Z"}
        }]
    })
}

pub fn envelope(code: &str, data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "Code": code,
        "Message": "",
        "Data": data,
    }))
}
