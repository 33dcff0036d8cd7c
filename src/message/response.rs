//! Outbound responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RequestCode;

/// A response built by a handler and queued on a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub code: RequestCode,
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl Response {
    /// Successful response carrying `content`.
    pub fn ok(code: impl Into<RequestCode>, content: impl Into<Value>) -> Self {
        Self {
            code: code.into(),
            error: false,
            message: None,
            content: Some(content.into()),
        }
    }

    /// Error response with a human-readable message.
    pub fn failure(code: impl Into<RequestCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error: true,
            message: Some(message.into()),
            content: None,
        }
    }

    /// Default reply for codes nobody handles: blank code, no error, no payload.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_omits_message() {
        let json = Response::ok("PING", "Pong").to_json().unwrap();
        assert_eq!(json, r#"{"code":"PING","error":false,"content":"Pong"}"#);
    }

    #[test]
    fn empty_omits_content() {
        let json = Response::empty().to_json().unwrap();
        assert_eq!(json, r#"{"code":"","error":false}"#);
    }

    #[test]
    fn failure_carries_message() {
        let resp = Response::failure("PICK_USER", "no such user");
        let value: Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"code": "PICK_USER", "error": true, "message": "no such user"}));
    }

    #[test]
    fn structured_content() {
        let resp = Response::ok("PICK_USER", json!({"id": 7})).with_message("picked");
        let value: Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
        assert_eq!(value["content"]["id"], 7);
        assert_eq!(value["message"], "picked");
    }
}
