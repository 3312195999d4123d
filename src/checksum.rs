//! Checksum utilities for component version integrity

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum over a component version's payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum over template, script and style.
    ///
    /// Each part is length-prefixed so moving text between parts changes the sum.
    pub fn from_payload(template: &str, script: Option<&str>, style: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        for part in [Some(template), script, style] {
            match part {
                Some(text) => {
                    hasher.update((text.len() as u64).to_le_bytes());
                    hasher.update(text.as_bytes());
                }
                None => hasher.update(u64::MAX.to_le_bytes()),
            }
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a payload matches this checksum
    pub fn verify_payload(&self, template: &str, script: Option<&str>, style: Option<&str>) -> bool {
        *self == Self::from_payload(template, script, style)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
