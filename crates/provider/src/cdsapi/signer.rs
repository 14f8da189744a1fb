//! Canonical request signing for the CDS open API.
//!
//! Parameters are merged with the fixed signing parameters, sorted byte-wise,
//! query-escaped and joined; the HMAC-SHA1 of
//! `METHOD&%2F&<escaped canonical query>` becomes the `Signature` parameter.

use std::collections::BTreeMap;

use base64::{prelude::BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;
use uuid::Uuid;

use super::CloudRequest;
use crate::config::ApiConfig;

pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const SIGNATURE_VERSION: &str = "1.0";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Bytes left untouched by URL query escaping.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone)]
pub struct Signer {
    access_key_id: String,
    access_key_secret: String,
    version: String,
}

impl Signer {
    pub fn new(api: &ApiConfig) -> Self {
        Self {
            access_key_id: api.access_key_id.clone(),
            access_key_secret: api.access_key_secret.clone(),
            version: api.version.clone(),
        }
    }

    /// Signed URL with a fresh nonce and the current time.
    pub fn signed_url(&self, host: &str, request: &CloudRequest) -> String {
        self.signed_url_at(host, request, &Uuid::new_v4().to_string(), Utc::now())
    }

    pub fn signed_url_at(
        &self,
        host: &str,
        request: &CloudRequest,
        nonce: &str,
        timestamp: DateTime<Utc>,
    ) -> String {
        let mut params = self.signing_params(request, nonce, timestamp);
        let to_sign = string_to_sign(request.method().as_str(), &canonical_query(&params));
        params.insert("Signature".to_string(), sign(&self.access_key_secret, &to_sign));

        format!(
            "{}/{}?{}",
            host.trim_end_matches('/'),
            request.product(),
            canonical_query(&params)
        )
    }

    fn signing_params(
        &self,
        request: &CloudRequest,
        nonce: &str,
        timestamp: DateTime<Utc>,
    ) -> BTreeMap<String, String> {
        let mut params = BTreeMap::from([
            ("Action".to_string(), request.action().to_string()),
            ("AccessKeyId".to_string(), self.access_key_id.clone()),
            ("SignatureMethod".to_string(), SIGNATURE_METHOD.to_string()),
            ("SignatureNonce".to_string(), nonce.to_string()),
            ("SignatureVersion".to_string(), SIGNATURE_VERSION.to_string()),
            (
                "Timestamp".to_string(),
                timestamp.format(TIMESTAMP_FORMAT).to_string(),
            ),
            ("Version".to_string(), self.version.clone()),
        ]);
        // Caller parameters win over the fixed ones on key collision.
        params.extend(
            request
                .params()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        params
    }
}

/// URL query escaping: unreserved bytes kept, space as `+`, the rest `%XX`.
pub fn percent_encode(value: &str) -> String {
    // A literal '%' is always escaped to "%25", so "%20" can only come from a space.
    utf8_percent_encode(value, QUERY_ESCAPE)
        .to_string()
        .replace("%20", "+")
}

/// `k1=v1&k2=v2...` in byte-wise key order.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn string_to_sign(method: &str, canonical_query: &str) -> String {
    format!("{}&%2F&{}", method, percent_encode(canonical_query))
}

pub fn sign(secret: &str, string_to_sign: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(string_to_sign.as_bytes());
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}
