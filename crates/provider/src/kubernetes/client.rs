use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};
use tracing::debug;

use crate::resources::ResourceManager;
use crate::{Error, Result};

/// Resolves pod references straight from the API server.
#[derive(Clone)]
pub struct KubeResourceManager {
    client: Client,
}

impl KubeResourceManager {
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;
        Ok(Self::new(client))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceManager for KubeResourceManager {
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>> {
        debug!(namespace, name, "Fetching secret");
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        secrets
            .get_opt(name)
            .await
            .map_err(|e| Error::Kubernetes(format!("get secret {}/{}: {}", namespace, name, e)))
    }

    async fn get_config_map(&self, name: &str, namespace: &str) -> Result<Option<ConfigMap>> {
        debug!(namespace, name, "Fetching config map");
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        config_maps
            .get_opt(name)
            .await
            .map_err(|e| Error::Kubernetes(format!("get configmap {}/{}: {}", namespace, name, e)))
    }
}
