//! Checksum utilities for schema documents

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum of a raw schema document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum of document text
    pub fn of_document(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines and listings
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }

    /// Verify that document text matches this checksum
    pub fn verify(&self, content: &str) -> bool {
        Self::of_document(content) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"type": "object", "properties": {}}"#;
        assert_eq!(Checksum::of_document(content), Checksum::of_document(content));
    }

    #[test]
    fn test_checksum_verification() {
        let content = r#"{"type": "object"}"#;
        let checksum = Checksum::of_document(content);
        assert!(checksum.verify(content));
        assert!(!checksum.verify(r#"{"type": "array"}"#));
        assert_eq!(checksum.as_str().len(), 64);
        assert_eq!(checksum.short().len(), 12);
    }
}
