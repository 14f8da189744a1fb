use std::collections::BTreeMap;

use reqwest::Method;
use serde::Serialize;

use crate::config::ApiConfig;
use crate::{Error, Result};

/// A single open-API call, ready to be signed.
///
/// Built per call and never persisted; the signature is computed at send time
/// so every retry carries a fresh nonce and timestamp.
#[derive(Debug, Clone)]
pub struct CloudRequest {
    action: String,
    method: Method,
    params: BTreeMap<String, String>,
    product: String,
    body: serde_json::Value,
}

impl CloudRequest {
    pub fn new<B: Serialize>(
        action: &str,
        method: &str,
        params: Option<BTreeMap<String, String>>,
        product: &str,
        body: &B,
    ) -> Result<Self> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| Error::Config(format!("invalid HTTP method {:?}", method)))?;

        Ok(Self {
            action: action.to_string(),
            method,
            params: params.unwrap_or_default(),
            product: product.to_string(),
            body: serde_json::to_value(body)?,
        })
    }

    /// Request against the container product, tagged with the configured
    /// customer and user identifiers.
    pub fn cck<B: Serialize>(
        api: &ApiConfig,
        action: &str,
        method: &str,
        params: Option<BTreeMap<String, String>>,
        body: &B,
    ) -> Result<Self> {
        let mut request = Self::new(action, method, params, &api.product, body)?;
        if let Some(customer_id) = &api.customer_id {
            request
                .params
                .insert("CustomerId".to_string(), customer_id.clone());
        }
        if let Some(user_id) = &api.user_id {
            request.params.insert("UserId".to_string(), user_id.clone());
        }
        Ok(request)
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn body(&self) -> &serde_json::Value {
        &self.body
    }
}
