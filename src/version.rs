//! Package/version keys
//!
//! Every package version carries its own schema document, so the pair
//! (package name, semantic version) is the unit of lookup and caching.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SchemaError};

/// Identifies one schema document: a package name plus its version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    /// Package name (e.g., "dbt-media-player")
    pub package: String,
    /// Semantic version of the package
    pub version: Version,
}

impl PackageKey {
    /// Create a key from an already parsed version
    pub fn new(package: impl Into<String>, version: Version) -> Self {
        Self {
            package: package.into(),
            version,
        }
    }

    /// Create from a package name and a version string.
    ///
    /// A leading `v` is accepted (`v0.6.1` and `0.6.1` are the same key).
    /// Package names must be a single path segment.
    pub fn parse(package: &str, version_str: &str) -> Result<Self> {
        let package = package.trim();
        if package.is_empty() {
            return Err(SchemaError::InvalidPackage(format!(
                "empty package name for version '{}'",
                version_str
            )));
        }
        if package.contains(['/', '\\']) || package.contains("..") {
            return Err(SchemaError::InvalidPackage(format!(
                "'{}' is not a single path segment",
                package
            )));
        }
        let version_str = version_str.trim();
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        let version = Version::parse(version_str)?;
        Ok(Self::new(package, version))
    }

    /// Get the version string (e.g., "0.6.1")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// File name of the schema document for this key (e.g., "0.6.1.json")
    pub fn file_name(&self) -> String {
        format!("{}.json", self.version)
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.version)
    }
}
