//! Inbound requests.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::RequestCode;

/// A decoded inbound message: a code plus an opaque body.
///
/// The body is kept as the exact JSON text the client sent. Handlers decode
/// it on demand with [`Request::parse_body`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    code: RequestCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<Box<RawValue>>,
}

impl Request {
    pub fn new(code: impl Into<RequestCode>, body: Option<Box<RawValue>>) -> Self {
        Self {
            code: code.into(),
            body,
        }
    }

    /// Decode one wire frame.
    pub fn from_slice(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }

    pub fn code(&self) -> &RequestCode {
        &self.code
    }

    /// Raw body, if the client sent one.
    pub fn body(&self) -> Option<&RawValue> {
        self.body.as_deref()
    }

    /// Body as raw bytes; empty when absent.
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().map(|raw| raw.get().as_bytes()).unwrap_or_default()
    }

    /// Decode the body into a typed value. An absent body decodes as `null`.
    pub fn parse_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self.body.as_deref() {
            Some(raw) => serde_json::from_str(raw.get()),
            None => serde_json::from_str("null"),
        }
    }
}
