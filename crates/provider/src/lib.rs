pub mod cdsapi;
pub mod config;
pub mod eci;
pub mod kubernetes;
pub mod metrics;
pub mod node;
pub mod provider;
pub mod resources;
pub mod server;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Backend unavailable: {action} returned {status} after retries")]
    BackendUnavailable { action: String, status: u16 },
    #[error("HTTP error: {action} returned {status}: {body}")]
    Http {
        action: String,
        status: u16,
        body: String,
    },
    #[error("Business error {code}: {message}")]
    Business { code: String, message: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("{kind} {name} is required by Pod {pod} and does not exist")]
    MissingResource {
        kind: &'static str,
        name: String,
        pod: String,
    },
    #[error("Pod {pod} requires volume {volume} which is of an unsupported type")]
    UnsupportedVolume { volume: String, pod: String },
    #[error("image pull secret {secret} has type {kind:?}, expected kubernetes.io/dockercfg or kubernetes.io/dockerconfigjson")]
    UnsupportedCredential { secret: String, kind: String },
    #[error("Malformed registry credential: {0}")]
    MalformedCredential(String),
    #[error("Invalid {resource} quantity {value:?} on container {container}")]
    InvalidQuantity {
        resource: &'static str,
        value: String,
        container: String,
    },
    #[error("Unsupported workload: {0}")]
    Unsupported(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Kubernetes error: {0}")]
    Kubernetes(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    /// 4xx responses from the remote endpoint.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Http { status, .. } if (400..500).contains(status))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_only_covers_4xx() {
        let not_found = Error::Http {
            action: "DeleteContainerGroup".to_string(),
            status: 404,
            body: String::new(),
        };
        assert!(not_found.is_client_error());

        let unavailable = Error::BackendUnavailable {
            action: "DeleteContainerGroup".to_string(),
            status: 503,
        };
        assert!(!unavailable.is_client_error());
    }

    #[test]
    fn translation_errors_name_the_workload() {
        let err = Error::UnsupportedVolume {
            volume: "scratch".to_string(),
            pod: "web".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Pod web requires volume scratch which is of an unsupported type"
        );
    }
}
