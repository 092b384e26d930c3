//! Schema document sources
//!
//! The registry does not know where schema documents live. It asks a
//! [`SchemaSource`] for the raw text of a `(package, version)` key:
//!
//! ```text
//! schemas/
//! ├── dbt-ecommerce/
//! │   └── 0.5.4.json
//! ├── dbt-fractribution/
//! │   └── 0.3.6.json
//! ├── dbt-media-player/
//! │   └── 0.6.1.json
//! └── dbt-utils/
//!     └── 0.16.2.json
//! ```
//!
//! The same layout is used on disk ([`DirectorySource`]) and for the bundle
//! compiled into the crate ([`EmbeddedSource`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::version::PackageKey;

/// Schema documents bundled with the crate
static BUNDLED_SCHEMAS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// Supplies raw schema documents by key
pub trait SchemaSource: Send + Sync {
    /// Raw document text for `key`, or `None` when no document exists.
    fn fetch(&self, key: &PackageKey) -> Result<Option<String>>;

    /// Every key this source can serve, sorted.
    fn available(&self) -> Result<Vec<PackageKey>>;
}

// =============================================================================
// Directory
// =============================================================================

/// Documents stored as `<root>/<package>/<version>.json`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &PackageKey) -> PathBuf {
        self.root.join(&key.package).join(key.file_name())
    }
}

impl SchemaSource for DirectorySource {
    fn fetch(&self, key: &PackageKey) -> Result<Option<String>> {
        let path = self.document_path(key);
        if !path.is_file() {
            debug!(path = %path.display(), "no schema document on disk");
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    fn available(&self) -> Result<Vec<PackageKey>> {
        let mut keys = Vec::new();
        if !self.root.is_dir() {
            return Ok(keys);
        }

        for entry in WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if let Some(key) = key_from_path(path.strip_prefix(&self.root).unwrap_or(path)) {
                keys.push(key);
            } else {
                warn!(path = %path.display(), "ignoring schema file with unparseable version");
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// `<package>/<version>.json` -> key
fn key_from_path(relative: &Path) -> Option<PackageKey> {
    let package = relative.parent()?.file_name()?.to_str()?;
    let version = relative.file_stem()?.to_str()?;
    PackageKey::parse(package, version).ok()
}

// =============================================================================
// Embedded
// =============================================================================

/// The package schemas compiled into this crate
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSource;

impl EmbeddedSource {
    pub fn new() -> Self {
        Self
    }
}

impl SchemaSource for EmbeddedSource {
    fn fetch(&self, key: &PackageKey) -> Result<Option<String>> {
        let path = Path::new(&key.package).join(key.file_name());
        Ok(BUNDLED_SCHEMAS
            .get_file(&path)
            .and_then(|file| file.contents_utf8())
            .map(str::to_string))
    }

    fn available(&self) -> Result<Vec<PackageKey>> {
        let mut keys: Vec<PackageKey> = BUNDLED_SCHEMAS
            .dirs()
            .flat_map(|dir| dir.files())
            .filter_map(|file| key_from_path(file.path()))
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Documents held in memory, keyed by package and version
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: BTreeMap<PackageKey, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the document for `key`
    pub fn insert(&mut self, key: PackageKey, document: impl Into<String>) {
        self.documents.insert(key, document.into());
    }

    /// Builder-style insert
    pub fn with_document(mut self, key: PackageKey, document: impl Into<String>) -> Self {
        self.insert(key, document);
        self
    }
}

impl SchemaSource for MemorySource {
    fn fetch(&self, key: &PackageKey) -> Result<Option<String>> {
        Ok(self.documents.get(key).cloned())
    }

    fn available(&self) -> Result<Vec<PackageKey>> {
        Ok(self.documents.keys().cloned().collect())
    }
}

/// Adapts a lookup function into a source.
///
/// The function cannot enumerate its keys, so `available` is always empty.
pub struct FnSource<F> {
    lookup: F,
}

impl<F> FnSource<F>
where
    F: Fn(&PackageKey) -> Option<String> + Send + Sync,
{
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

impl<F> SchemaSource for FnSource<F>
where
    F: Fn(&PackageKey) -> Option<String> + Send + Sync,
{
    fn fetch(&self, key: &PackageKey) -> Result<Option<String>> {
        Ok((self.lookup)(key))
    }

    fn available(&self) -> Result<Vec<PackageKey>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(package: &str, version: &str) -> PackageKey {
        PackageKey::parse(package, version).unwrap()
    }

    #[test]
    fn test_embedded_bundle_lists_all_packages() {
        let keys = EmbeddedSource::new().available().unwrap();
        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "dbt-ecommerce@0.5.4",
                "dbt-fractribution@0.3.6",
                "dbt-media-player@0.6.1",
                "dbt-utils@0.16.2",
            ]
        );
    }

    #[test]
    fn test_embedded_fetch() {
        let source = EmbeddedSource::new();
        let doc = source.fetch(&key("dbt-utils", "0.16.2")).unwrap().unwrap();
        assert!(doc.contains("snowplow__session_identifiers"));
        assert!(source.fetch(&key("dbt-utils", "9.9.9")).unwrap().is_none());
    }

    #[test]
    fn test_directory_source() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dbt-web")).unwrap();
        fs::write(
            dir.path().join("dbt-web").join("1.0.0.json"),
            r#"{"type": "object", "properties": {}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("dbt-web").join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("dbt-web").join("latest.json"), "{}").unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.available().unwrap(), vec![key("dbt-web", "1.0.0")]);
        assert!(source.fetch(&key("dbt-web", "1.0.0")).unwrap().is_some());
        assert!(source.fetch(&key("dbt-web", "2.0.0")).unwrap().is_none());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let source = DirectorySource::new(dir.path().join("nope"));
        assert!(source.available().unwrap().is_empty());
    }

    #[test]
    fn test_memory_and_fn_sources() {
        let memory = MemorySource::new().with_document(key("a", "1.0.0"), "{}");
        assert_eq!(memory.fetch(&key("a", "1.0.0")).unwrap().as_deref(), Some("{}"));
        assert_eq!(memory.available().unwrap().len(), 1);

        let lookup = FnSource::new(|k: &PackageKey| {
            (k.package == "a").then(|| String::from("{}"))
        });
        assert!(lookup.fetch(&key("a", "1.0.0")).unwrap().is_some());
        assert!(lookup.fetch(&key("b", "1.0.0")).unwrap().is_none());
        assert!(lookup.available().unwrap().is_empty());
    }
}
