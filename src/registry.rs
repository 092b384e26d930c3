//! Schema Registry
//!
//! Maps a (package, version) key to its [`PackageSchema`]. Documents are
//! fetched and parsed on first use and cached for the lifetime of the
//! registry; cached entries are never replaced or invalidated. A new package
//! version is a new key, never a mutation of an existing entry.
//!
//! The registry is owned by the caller (typically built once at startup) and
//! shared by reference; `&SchemaRegistry` can be used from many threads.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{Result, SchemaError};
use crate::schema::PackageSchema;
use crate::source::{EmbeddedSource, SchemaSource};
use crate::version::PackageKey;

/// Lazily populated, append-only cache of package schemas
pub struct SchemaRegistry {
    source: Box<dyn SchemaSource>,
    cache: RwLock<HashMap<PackageKey, Arc<PackageSchema>>>,
}

impl SchemaRegistry {
    /// Create a registry over any document source
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Registry over the schemas bundled with this crate
    pub fn embedded() -> Self {
        Self::new(EmbeddedSource::new())
    }

    /// Get a schema by package name and version string.
    ///
    /// A version string that is not semver names no document, so it is
    /// reported as [`SchemaError::NotFound`] like any other missing key.
    pub fn get(&self, package: &str, version: &str) -> Result<Arc<PackageSchema>> {
        let key = PackageKey::parse(package, version).map_err(|e| {
            debug!(package, version, error = %e, "unparseable package key");
            SchemaError::NotFound {
                package: package.to_string(),
                version: version.to_string(),
            }
        })?;
        self.get_key(&key)
    }

    /// Get a schema by key, loading it on first use.
    ///
    /// Returns [`SchemaError::NotFound`] when the source has no document and
    /// [`SchemaError::Malformed`] when the document cannot be loaded. Neither
    /// failure leaves anything in the cache.
    pub fn get_key(&self, key: &PackageKey) -> Result<Arc<PackageSchema>> {
        if let Some(schema) = self.cached(key) {
            debug!(key = %key, "schema cache hit");
            return Ok(schema);
        }

        let content = self.source.fetch(key)?.ok_or_else(|| SchemaError::NotFound {
            package: key.package.clone(),
            version: key.version_string(),
        })?;
        let parsed = Arc::new(PackageSchema::from_document(key.clone(), &content)?);

        let mut cache = self.cache.write();
        let entry = cache.entry(key.clone()).or_insert_with(|| {
            info!(
                key = %key,
                checksum = %parsed.checksum.short(),
                properties = parsed.properties().len(),
                "loaded package schema"
            );
            Arc::clone(&parsed)
        });
        if !Arc::ptr_eq(entry, &parsed) {
            debug!(key = %key, "concurrent load lost the race; using cached schema");
        }
        Ok(Arc::clone(entry))
    }

    /// Whether `key` is already loaded
    pub fn is_cached(&self, key: &PackageKey) -> bool {
        self.cached(key).is_some()
    }

    /// Keys currently loaded, sorted
    pub fn cached_keys(&self) -> Vec<PackageKey> {
        let cache = self.cache.read();
        let mut keys: Vec<PackageKey> = cache.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every key the underlying source can serve
    pub fn available(&self) -> Result<Vec<PackageKey>> {
        self.source.available()
    }

    /// Newest available version of `package`
    pub fn latest(&self, package: &str) -> Result<Option<PackageKey>> {
        Ok(self
            .available()?
            .into_iter()
            .filter(|k| k.package == package)
            .max())
    }

    fn cached(&self, key: &PackageKey) -> Option<Arc<PackageSchema>> {
        let cache = self.cache.read();
        cache.get(key).cloned()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::embedded()
    }
}
