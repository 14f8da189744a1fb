use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Field naming used by the vendor response envelope.
///
/// Two shapes have been served over time: `{Code, Message, Data}` and
/// `{code, msg, data}`. The schema is chosen by configuration so call sites
/// never branch on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeSchema {
    #[default]
    Legacy,
    Compact,
}

impl EnvelopeSchema {
    fn code_fields(&self) -> &'static [&'static str] {
        match self {
            EnvelopeSchema::Legacy => &["Code"],
            EnvelopeSchema::Compact => &["code"],
        }
    }

    fn message_fields(&self) -> &'static [&'static str] {
        match self {
            EnvelopeSchema::Legacy => &["Message"],
            EnvelopeSchema::Compact => &["msg", "message"],
        }
    }

    fn data_fields(&self) -> &'static [&'static str] {
        match self {
            EnvelopeSchema::Legacy => &["Data"],
            EnvelopeSchema::Compact => &["data"],
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<Envelope<T>> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::Decode(format!("response is not JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::Decode("response envelope is not an object".to_string()))?;

        let lookup = |fields: &[&str]| fields.iter().find_map(|f| object.get(*f));

        let code = match lookup(self.code_fields()) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(Error::Decode(format!("unexpected envelope code {}", other)));
            }
        };
        let message = lookup(self.message_fields())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = match lookup(self.data_fields()) {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value(raw.clone())
                    .map_err(|e| Error::Decode(format!("unexpected envelope data: {}", e)))?,
            ),
        };

        Ok(Envelope {
            code,
            message,
            data,
        })
    }
}

impl FromStr for EnvelopeSchema {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "legacy" | "" => Ok(EnvelopeSchema::Legacy),
            "compact" => Ok(EnvelopeSchema::Compact),
            other => Err(Error::Config(format!(
                "unknown response schema {:?}, expected legacy or compact",
                other
            ))),
        }
    }
}

/// Decoded vendor envelope: business code, message and typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub code: String,
    pub message: String,
    pub data: Option<T>,
}
