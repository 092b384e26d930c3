//! Pipeline Package Schemas
//!
//! Schema-driven validation and resolution for the user-editable configuration
//! of versioned data-pipeline packages (`dbt-utils`, `dbt-media-player`, ...).
//! Every package version declares its own schema of options; this crate
//! checks a user document against it, layers the document over the declared
//! defaults and extracts the metadata a form renderer needs.
//!
//! ## Features
//!
//! - **Closed Schema Model**: a fixed subset of JSON Schema parsed into a tagged node type
//! - **Lazy Registry**: each `(package, version)` loaded once and shared immutably
//! - **Full-Pass Validation**: every violation reported with its field path
//! - **Typed Defaults**: string-encoded `packageDefault` literals parsed per declared type
//! - **Field Catalogs**: ordered, grouped descriptors with warehouse applicability
//!
//! ## Architecture
//!
//! ```text
//! (package, version, document)
//!        │
//!        ▼
//!  SchemaRegistry ──► PackageSchema
//!        │
//!        ├──► validate_document ──► ValidatedDocument ──► resolve_effective
//!        │
//!        └──► build_catalog ──► Vec<FieldDescriptor>
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pipeline_schemas::{evaluate, SchemaRegistry};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::embedded();
//! let evaluation = evaluate(
//!     &registry,
//!     "dbt-media-player",
//!     "0.6.1",
//!     &json!({"snowplow__complete_play_rate": 0.9}),
//!     None,
//! )?;
//! assert!(evaluation.is_valid());
//! # Ok::<(), pipeline_schemas::SchemaError>(())
//! ```

pub mod catalog;
pub mod checksum;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod lint;
pub mod node;
pub mod registry;
pub mod schema;
pub mod source;
pub mod validator;
pub mod version;

pub use catalog::{build_catalog, group_catalog, FieldDescriptor, FieldGroup, WarehouseId};
pub use checksum::Checksum;
pub use config::{ConfigError, EngineConfig};
pub use defaults::{declared_defaults, parse_default_literal, resolve_effective, EffectiveConfiguration};
pub use engine::{evaluate, evaluate_schema, Evaluation};
pub use error::{Result, SchemaError};
pub use lint::{LintResult, SchemaLinter};
pub use node::{NodeKind, NodeMeta, SchemaNode};
pub use registry::SchemaRegistry;
pub use schema::PackageSchema;
pub use source::{DirectorySource, EmbeddedSource, FnSource, MemorySource, SchemaSource};
pub use validator::{
    validate, validate_document, FieldPath, ValidatedDocument, ValidationError,
    ValidationErrorKind, ValidationResult,
};
pub use version::PackageKey;
