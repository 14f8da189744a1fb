use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{CloudRequest, Envelope, Signer};
use crate::config::ApiConfig;
use crate::metrics;
use crate::{Error, Result};

/// Raw transport response handed back by [`ApiClient::send`].
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

enum Failure {
    Transport(reqwest::Error),
    Status(u16),
}

/// Signed HTTP client for the CDS open API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: Arc<ApiConfig>,
    signer: Signer,
}

impl ApiClient {
    pub fn new(config: Arc<ApiConfig>) -> Result<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        let signer = Signer::new(&config);
        Ok(Self {
            http,
            config,
            signer,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Send a request with an optional random start delay in `[0, jitter)`.
    ///
    /// Transport failures and 5xx responses are retried up to the configured
    /// number of attempts with a fixed backoff between them. Anything below
    /// 500 is returned as-is for the caller to decode.
    pub async fn send(
        &self,
        request: &CloudRequest,
        jitter: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        if !self.config.has_credentials() {
            return Err(Error::Config(
                "AccessKeyID or AccessKeySecret is empty".to_string(),
            ));
        }

        let action = request.action();
        let start_delay = random_delay(jitter);
        if !start_delay.is_zero() {
            pause(start_delay, cancel).await?;
        }

        let body = serde_json::to_vec(request.body())?;
        debug!(action, body = %String::from_utf8_lossy(&body), "Sending request");

        let mut last_failure = None;
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                metrics::record_retry(action);
                pause(self.config.retry_backoff, cancel).await?;
            }

            let url = self.signer.signed_url(&self.config.host, request);
            let pending = self
                .http
                .request(request.method().clone(), &url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    metrics::record_attempt(action, "cancelled");
                    return Err(Error::Cancelled);
                }
                outcome = pending => outcome,
            };

            match outcome {
                Ok(response) if response.status().is_server_error() => {
                    let status = response.status().as_u16();
                    metrics::record_attempt(action, "server_error");
                    warn!(action, attempt, status, "Server error from open API");
                    last_failure = Some(Failure::Status(status));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        body = response.bytes() => body?,
                    };
                    let outcome = if status >= 400 { "client_error" } else { "ok" };
                    metrics::record_attempt(action, outcome);
                    return Ok(RawResponse {
                        status,
                        body: body.to_vec(),
                    });
                }
                Err(e) => {
                    metrics::record_attempt(action, "transport_error");
                    warn!(action, attempt, "Transport error from open API: {}", e);
                    last_failure = Some(Failure::Transport(e));
                }
            }
        }

        match last_failure {
            Some(Failure::Status(status)) => {
                error!(action, status, "Open API still failing after retries");
                Err(Error::BackendUnavailable {
                    action: action.to_string(),
                    status,
                })
            }
            Some(Failure::Transport(e)) => {
                error!(action, "Open API unreachable after retries: {}", e);
                Err(Error::Transport(e))
            }
            None => Err(Error::Config(
                "max_attempts must be at least 1".to_string(),
            )),
        }
    }

    /// Unwrap the vendor envelope, failing on any 4xx/5xx transport status.
    pub fn decode<T: DeserializeOwned>(
        &self,
        action: &str,
        response: RawResponse,
    ) -> Result<Envelope<T>> {
        let body = String::from_utf8_lossy(&response.body);
        debug!(action, status = response.status, body = %body, "Received response");

        if response.status >= 400 {
            return Err(Error::Http {
                action: action.to_string(),
                status: response.status,
                body: body.into_owned(),
            });
        }
        self.config.envelope.decode(&response.body)
    }

    /// `send` followed by `decode`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: &CloudRequest,
        jitter: Duration,
        cancel: &CancellationToken,
    ) -> Result<Envelope<T>> {
        let response = self.send(request, jitter, cancel).await?;
        self.decode(request.action(), response)
    }
}

fn random_delay(bound: Duration) -> Duration {
    let bound_ms = bound.as_millis() as u64;
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..bound_ms))
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
