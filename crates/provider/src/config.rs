use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::cdsapi::EnvelopeSchema;

pub const DEFAULT_NODE_NAME: &str = "cds-virtual-node";
pub const DEFAULT_PRODUCT: &str = "cck";
pub const DEFAULT_API_VERSION: &str = "2019-08-08";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub node: NodeConfig,
    pub server: ServerConfig,
}

/// Credentials, endpoint and call policy for the CDS open API.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub access_key_secret: String,
    pub product: String,
    pub version: String,
    #[serde(default)]
    pub envelope: EnvelopeSchema,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    /// Upper bound for the random delay applied before describe calls.
    pub describe_jitter: Duration,
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host", &self.host)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("product", &self.product)
            .field("version", &self.version)
            .field("envelope", &self.envelope)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("request_timeout", &self.request_timeout)
            .field("describe_jitter", &self.describe_jitter)
            .field("customer_id", &self.customer_id)
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl ApiConfig {
    pub fn has_credentials(&self) -> bool {
        !self.access_key_id.is_empty() && !self.access_key_secret.is_empty()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
            product: DEFAULT_PRODUCT.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            envelope: EnvelopeSchema::default(),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            describe_jitter: Duration::from_millis(3000),
            customer_id: None,
            user_id: None,
        }
    }
}

/// Identity of the virtual node inside the remote site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub site_id: String,
    pub cluster_id: String,
    pub node_id: String,
    pub node_name: String,
    pub private_id: String,
    pub max_pods: String,
    pub internal_ip: String,
    pub daemon_port: i32,
    pub operating_system: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            site_id: String::new(),
            cluster_id: String::new(),
            node_id: String::new(),
            node_name: DEFAULT_NODE_NAME.to_string(),
            private_id: String::new(),
            max_pods: "100".to_string(),
            internal_ip: String::new(),
            daemon_port: 10250,
            operating_system: "Linux".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:10255".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let api_defaults = ApiConfig::default();
        let node_defaults = NodeConfig::default();

        let config = Config {
            api: ApiConfig {
                host: env_or("OPENAPI_HOST", ""),
                access_key_id: env_or("CDS_ACCESS_KEY_ID", ""),
                access_key_secret: env_or("CDS_ACCESS_KEY_SECRET", ""),
                envelope: match std::env::var("CDS_RESPONSE_SCHEMA") {
                    Ok(value) => value.parse()?,
                    Err(_) => EnvelopeSchema::default(),
                },
                max_attempts: parse_env("CDS_MAX_ATTEMPTS", api_defaults.max_attempts)?,
                retry_backoff: Duration::from_secs(parse_env(
                    "CDS_RETRY_BACKOFF_SECS",
                    api_defaults.retry_backoff.as_secs(),
                )?),
                request_timeout: Duration::from_secs(parse_env(
                    "CDS_REQUEST_TIMEOUT_SECS",
                    api_defaults.request_timeout.as_secs(),
                )?),
                describe_jitter: Duration::from_millis(parse_env(
                    "CDS_DESCRIBE_JITTER_MS",
                    api_defaults.describe_jitter.as_millis() as u64,
                )?),
                customer_id: non_empty_env("CUSTOMER_ID"),
                user_id: non_empty_env("USER_ID"),
                ..api_defaults
            },
            node: NodeConfig {
                site_id: env_or("SITE_ID", ""),
                cluster_id: env_or("CLUSTER_ID", ""),
                node_id: env_or("DEFAULT_NODE_ID", ""),
                node_name: non_empty_env("DEFAULT_NODE_NAME")
                    .unwrap_or_else(|| DEFAULT_NODE_NAME.to_string()),
                private_id: env_or("PRIVATE_ID", ""),
                max_pods: non_empty_env("MAX_PODS").unwrap_or(node_defaults.max_pods),
                internal_ip: env_or("VKUBELET_POD_IP", ""),
                daemon_port: parse_env("KUBELET_PORT", node_defaults.daemon_port)?,
                operating_system: node_defaults.operating_system,
            },
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR")
                    .unwrap_or_else(|_| ServerConfig::default().addr),
            },
        };

        if !config.api.has_credentials() {
            tracing::warn!(
                "CDS_ACCESS_KEY_ID or CDS_ACCESS_KEY_SECRET is not set. Remote calls will be rejected."
            );
        }
        if config.api.host.is_empty() {
            tracing::warn!("OPENAPI_HOST is not set.");
        }
        if config.api.max_attempts == 0 {
            return Err(crate::Error::Config(
                "CDS_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            node: NodeConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> crate::Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| crate::Error::Config(format!("{} has an invalid value: {:?}", key, raw))),
        _ => Ok(default),
    }
}
