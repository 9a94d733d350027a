//! The `{code, msg, data}` wrapper the backend puts around every payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::HttpResponse;

/// Wire-level response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Envelope<T = serde_json::Value> {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub msg: String,

    #[serde(default)]
    pub data: Option<T>,
}

impl Envelope<serde_json::Value> {
    /// Read the envelope out of a response body.
    ///
    /// Bodies that are not JSON objects produce an empty envelope. A `data`
    /// field that is explicitly `null` is treated as absent.
    pub fn from_response(response: &HttpResponse) -> Self {
        let Some(object) = response.body.as_object() else {
            return Self::default();
        };

        let text = |key: &str| {
            object
                .get(key)
                .map(|value| match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };

        Self {
            code: text("code"),
            msg: text("msg"),
            data: object.get("data").filter(|value| !value.is_null()).cloned(),
        }
    }

    /// Decode the raw `data` payload into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Envelope<T>, serde_json::Error> {
        let data = self.data.map(serde_json::from_value).transpose()?;
        Ok(Envelope {
            code: self.code,
            msg: self.msg,
            data,
        })
    }
}

impl<T> Envelope<T> {
    /// The server message, or `fallback` when the server sent none.
    pub fn message_or(&self, fallback: &str) -> String {
        if self.msg.is_empty() {
            fallback.to_string()
        } else {
            self.msg.clone()
        }
    }
}
