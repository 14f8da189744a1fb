//! Image pull secrets flattened into registry credentials.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;

use super::types::ImageRegistryCredential;
use crate::{Error, Result};

pub const DOCKERCFG_TYPE: &str = "kubernetes.io/dockercfg";
pub const DOCKERCONFIGJSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
const DOCKERCFG_KEY: &str = ".dockercfg";
const DOCKERCONFIGJSON_KEY: &str = ".dockerconfigjson";

/// Registry auth layouts accepted in image pull secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryAuthFormat {
    /// `{registry: auth}` under `.dockercfg`.
    DockerCfg,
    /// `{"auths": {registry: auth}}` under `.dockerconfigjson`.
    DockerConfigJson,
}

impl RegistryAuthFormat {
    pub fn of(secret: &Secret) -> Result<Self> {
        match secret.type_.as_deref() {
            Some(DOCKERCFG_TYPE) => Ok(RegistryAuthFormat::DockerCfg),
            Some(DOCKERCONFIGJSON_TYPE) => Ok(RegistryAuthFormat::DockerConfigJson),
            other => Err(Error::UnsupportedCredential {
                secret: secret.metadata.name.clone().unwrap_or_default(),
                kind: other.unwrap_or("Opaque").to_string(),
            }),
        }
    }

    fn data_key(&self) -> &'static str {
        match self {
            RegistryAuthFormat::DockerCfg => DOCKERCFG_KEY,
            RegistryAuthFormat::DockerConfigJson => DOCKERCONFIGJSON_KEY,
        }
    }

    /// Decode the secret payload into credentials, one per registry, in
    /// registry name order.
    pub fn read(&self, secret: &Secret) -> Result<Vec<ImageRegistryCredential>> {
        let name = secret.metadata.name.as_deref().unwrap_or_default();
        let raw = secret
            .data
            .as_ref()
            .and_then(|data| data.get(self.data_key()))
            .ok_or_else(|| {
                Error::MalformedCredential(format!("no {} present in secret {}", self.data_key(), name))
            })?;

        let auths: BTreeMap<String, AuthEntry> = match self {
            RegistryAuthFormat::DockerCfg => serde_json::from_slice(&raw.0).map_err(|e| {
                Error::MalformedCredential(format!("failed to parse {} in secret {}: {}", DOCKERCFG_KEY, name, e))
            })?,
            RegistryAuthFormat::DockerConfigJson => {
                let config: DockerConfigJson = serde_json::from_slice(&raw.0).map_err(|e| {
                    Error::MalformedCredential(format!(
                        "failed to parse {} in secret {}: {}",
                        DOCKERCONFIGJSON_KEY, name, e
                    ))
                })?;
                config.auths.ok_or_else(|| {
                    Error::MalformedCredential(format!("malformed dockerconfigjson in secret {}", name))
                })?
            }
        };

        auths
            .into_iter()
            .map(|(server, entry)| entry.into_credential(server))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct DockerConfigJson {
    auths: Option<BTreeMap<String, AuthEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthEntry {
    username: String,
    password: String,
    auth: String,
}

impl AuthEntry {
    /// Explicit username/password win; otherwise fall back to the
    /// base64 `user:password` form in `auth`.
    fn into_credential(self, server: String) -> Result<ImageRegistryCredential> {
        if !self.username.is_empty() || !self.password.is_empty() || self.auth.is_empty() {
            return Ok(ImageRegistryCredential {
                server,
                username: self.username,
                password: self.password,
            });
        }

        let decoded = STANDARD
            .decode(self.auth.trim())
            .map_err(|e| Error::MalformedCredential(format!("invalid auth for {}: {}", server, e)))?;
        let decoded = String::from_utf8_lossy(&decoded);
        let (username, password) = decoded.split_once(':').ok_or_else(|| {
            Error::MalformedCredential(format!("auth for {} is not user:password", server))
        })?;
        Ok(ImageRegistryCredential {
            username: username.to_string(),
            password: password.to_string(),
            server,
        })
    }
}
