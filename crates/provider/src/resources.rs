use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};

use crate::Result;

/// Read access to the secrets and config maps a pod references.
///
/// `Ok(None)` means the object does not exist, which callers must keep
/// distinct from an object that exists but carries no data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<Secret>>;
    async fn get_config_map(&self, name: &str, namespace: &str) -> Result<Option<ConfigMap>>;
}
