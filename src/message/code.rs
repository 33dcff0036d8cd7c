//! Message codes.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier selecting which handler processes a message.
///
/// Codes are compared exactly (case-sensitive). The empty code is used by
/// the default response sent for unknown codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestCode(String);

impl RequestCode {
    /// Create a code from anything string-like.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RequestCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestCode {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl From<String> for RequestCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl Borrow<str> for RequestCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RequestCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
