//! End-to-end evaluation of a configuration request
//!
//! `(package, version, document)` goes through the registry, the validator
//! and, when the document is valid, the default resolver. The field catalog is
//! built either way so a form can highlight the fields that failed.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::catalog::{build_catalog, FieldDescriptor, WarehouseId};
use crate::defaults::{resolve_effective, EffectiveConfiguration};
use crate::error::Result;
use crate::registry::SchemaRegistry;
use crate::schema::PackageSchema;
use crate::validator::{validate_document, ValidationError};
use crate::version::PackageKey;

/// Everything a caller needs to render and apply one configuration document
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub key: PackageKey,
    /// Present only when `errors` is empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective: Option<EffectiveConfiguration>,
    pub errors: Vec<ValidationError>,
    pub catalog: Vec<FieldDescriptor>,
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Evaluate a document against an already loaded schema
pub fn evaluate_schema(
    schema: &PackageSchema,
    document: &Value,
    target: Option<&WarehouseId>,
) -> Evaluation {
    let (effective, errors) = match validate_document(schema, document) {
        Ok(validated) => (Some(resolve_effective(&validated)), Vec::new()),
        Err(errors) => (None, errors),
    };

    info!(
        key = %schema.key,
        valid = errors.is_empty(),
        errors = errors.len(),
        "evaluated configuration"
    );

    Evaluation {
        key: schema.key.clone(),
        effective,
        errors,
        catalog: build_catalog(schema, target),
    }
}

/// Look up `package@version` and evaluate `document` against it.
///
/// Load-time failures (`NotFound`, `Malformed`) abort with `Err`; problems in
/// the document are reported in [`Evaluation::errors`].
pub fn evaluate(
    registry: &SchemaRegistry,
    package: &str,
    version: &str,
    document: &Value,
    target: Option<&WarehouseId>,
) -> Result<Evaluation> {
    let schema: Arc<PackageSchema> = registry.get(package, version)?;
    Ok(evaluate_schema(&schema, document, target))
}
