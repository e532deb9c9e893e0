//! Content signatures for generated artifacts
//!
//! A signature hashes an artifact's declarative definition, not its rendered
//! text, so template whitespace never forces a rewrite on its own.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::Result;

/// SHA256 signature of an artifact definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Compute a signature from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute a signature from any serializable definition.
    ///
    /// The value goes through `serde_json::Value` first; its object maps are
    /// ordered by key, which makes the encoding canonical.
    pub fn of<T: Serialize + ?Sized>(definition: &T) -> Result<Self> {
        let value = serde_json::to_value(definition)?;
        let canonical = serde_json::to_string(&value)?;
        Ok(Self::from_bytes(canonical.as_bytes()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a cached hex string matches this signature
    pub fn matches(&self, cached: Option<&str>) -> bool {
        cached == Some(self.0.as_str())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Signature {
    fn from(s: String) -> Self {
        Self(s)
    }
}
