//! Package schemas
//!
//! A [`PackageSchema`] is the parsed, reference-resolved form of one package
//! version's schema document. Loading checks that every `$ref` names a
//! definition (and that definitions do not reference each other in a cycle),
//! then substitutes the definitions in place, so consumers only ever see a
//! reference-free tree.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};
use crate::node::{NodeKind, ObjectNode, Property, SchemaNode};
use crate::version::PackageKey;

/// A loaded, immutable package schema
#[derive(Debug, Clone, Serialize)]
pub struct PackageSchema {
    pub key: PackageKey,
    /// Root node; always an object node
    root: SchemaNode,
    /// Named definitions, already resolved
    pub definitions: BTreeMap<String, SchemaNode>,
    /// Checksum of the raw document text
    pub checksum: Checksum,
}

impl PackageSchema {
    /// Parse a raw schema document for `key`.
    ///
    /// Any shape outside the supported subset, or any unresolved definition
    /// reference, is reported as [`SchemaError::Malformed`].
    pub fn from_document(key: PackageKey, content: &str) -> Result<Self> {
        let checksum = Checksum::of_document(content);
        let value: Value = serde_json::from_str(content)
            .map_err(|e| malformed(&key, format!("document is not valid JSON: {}", e)))?;
        let mut map = match value {
            Value::Object(map) => map,
            _ => return Err(malformed(&key, "document must be a JSON object")),
        };

        let mut raw_definitions = BTreeMap::new();
        match map.remove("definitions") {
            None => {}
            Some(Value::Object(defs)) => {
                for (name, raw) in defs {
                    let node = SchemaNode::from_value(&raw).map_err(|e| {
                        malformed(&key, format!("definition '{}': {}", name, e))
                    })?;
                    raw_definitions.insert(name, node);
                }
            }
            Some(_) => return Err(malformed(&key, "'definitions' must be an object")),
        }

        let root = SchemaNode::from_value(&Value::Object(map))
            .map_err(|e| malformed(&key, e.to_string()))?;
        if root.as_object().is_none() {
            return Err(malformed(
                &key,
                format!("root must be an object node, found {}", root.type_name()),
            ));
        }

        let mut resolver = Resolver {
            raw: &raw_definitions,
            resolved: BTreeMap::new(),
            stack: Vec::new(),
        };
        let mut definitions = BTreeMap::new();
        for name in raw_definitions.keys() {
            let node = resolver
                .definition(name)
                .map_err(|reason| malformed(&key, reason))?;
            definitions.insert(name.clone(), node);
        }
        let root = resolver
            .resolve(&root)
            .map_err(|reason| malformed(&key, reason))?;

        Ok(Self {
            key,
            root,
            definitions,
            checksum,
        })
    }

    /// The root node, as passed to the validator
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The root object node; always `Some` for a loaded schema
    pub fn root_object(&self) -> Option<&ObjectNode> {
        self.root.as_object()
    }

    /// Top-level properties, in declaration order
    pub fn properties(&self) -> &[Property] {
        self.root_object()
            .map(|obj| obj.properties.as_slice())
            .unwrap_or(&[])
    }

    /// Look up a top-level property
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.root_object().and_then(|obj| obj.property(name))
    }

    pub fn package(&self) -> &str {
        &self.key.package
    }
}

fn malformed(key: &PackageKey, reason: impl Into<String>) -> SchemaError {
    SchemaError::Malformed {
        package: key.package.clone(),
        version: key.version_string(),
        reason: reason.into(),
    }
}

/// Substitutes definition references, memoising resolved definitions.
struct Resolver<'a> {
    raw: &'a BTreeMap<String, SchemaNode>,
    resolved: BTreeMap<String, SchemaNode>,
    /// Definitions currently being resolved, for cycle detection
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn definition(&mut self, name: &str) -> std::result::Result<SchemaNode, String> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(done.clone());
        }
        if self.stack.iter().any(|n| n == name) {
            let mut cycle = self.stack.clone();
            cycle.push(name.to_string());
            return Err(format!("definition reference cycle: {}", cycle.join(" -> ")));
        }
        let raw_definitions = self.raw;
        let raw = raw_definitions
            .get(name)
            .ok_or_else(|| format!("reference to undefined definition '{}'", name))?;

        self.stack.push(name.to_string());
        let result = self.resolve(raw);
        self.stack.pop();

        let node = result?;
        self.resolved.insert(name.to_string(), node.clone());
        Ok(node)
    }

    fn resolve(&mut self, node: &SchemaNode) -> std::result::Result<SchemaNode, String> {
        let kind = match &node.kind {
            NodeKind::Ref { name } => {
                let target = self.definition(name)?;
                return Ok(SchemaNode {
                    meta: target.meta.overlay(&node.meta),
                    kind: target.kind,
                });
            }
            NodeKind::Array {
                items,
                min_items,
                unique_items,
            } => NodeKind::Array {
                items: Box::new(self.resolve(items)?),
                min_items: *min_items,
                unique_items: *unique_items,
            },
            NodeKind::Object(obj) => NodeKind::Object(ObjectNode {
                properties: obj
                    .properties
                    .iter()
                    .map(|p| {
                        Ok(Property {
                            name: p.name.clone(),
                            node: self.resolve(&p.node)?,
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, String>>()?,
                required: obj.required.clone(),
                additional_properties: obj.additional_properties,
            }),
            NodeKind::OneOf { variants } => NodeKind::OneOf {
                variants: variants
                    .iter()
                    .map(|v| self.resolve(v))
                    .collect::<std::result::Result<Vec<_>, String>>()?,
            },
            other => other.clone(),
        };
        Ok(SchemaNode {
            meta: node.meta.clone(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> PackageKey {
        PackageKey::parse("dbt-test", "1.0.0").unwrap()
    }

    fn load(doc: Value) -> Result<PackageSchema> {
        PackageSchema::from_document(key(), &doc.to_string())
    }

    #[test]
    fn test_references_are_substituted() {
        let schema = load(json!({
            "definitions": {
                "passthrough_vars": {
                    "type": "array",
                    "minItems": 0,
                    "uniqueItems": true,
                    "items": {"type": "string"},
                    "group": "Contexts, Filters, and Logs"
                }
            },
            "type": "object",
            "properties": {
                "snowplow__page_view_passthroughs": {
                    "$ref": "#/definitions/passthrough_vars",
                    "title": "Page View Passthroughs"
                }
            }
        }))
        .unwrap();

        let node = schema.property("snowplow__page_view_passthroughs").unwrap();
        assert_eq!(node.type_name(), "array");
        assert_eq!(node.meta.title.as_deref(), Some("Page View Passthroughs"));
        assert_eq!(node.meta.group.as_deref(), Some("Contexts, Filters, and Logs"));
        assert!(schema.definitions.contains_key("passthrough_vars"));
    }

    #[test]
    fn test_nested_definition_references() {
        let schema = load(json!({
            "definitions": {
                "column": {"type": "string"},
                "columns": {"type": "array", "items": {"$ref": "#/definitions/column"}}
            },
            "type": "object",
            "properties": {"cols": {"$ref": "#/definitions/columns"}}
        }))
        .unwrap();

        match &schema.property("cols").unwrap().kind {
            NodeKind::Array { items, .. } => assert_eq!(items.type_name(), "string"),
            other => panic!("Expected Array, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_reference_is_malformed() {
        let err = load(json!({
            "type": "object",
            "properties": {"x": {"$ref": "#/definitions/missing"}}
        }))
        .unwrap_err();
        match err {
            SchemaError::Malformed { reason, .. } => assert!(reason.contains("missing")),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_unused_unresolved_definition_is_still_malformed() {
        let err = load(json!({
            "definitions": {"a": {"$ref": "#/definitions/nowhere"}},
            "type": "object",
            "properties": {}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { .. }));
    }

    #[test]
    fn test_reference_cycle_is_malformed() {
        let err = load(json!({
            "definitions": {
                "a": {"type": "array", "items": {"$ref": "#/definitions/b"}},
                "b": {"type": "array", "items": {"$ref": "#/definitions/a"}}
            },
            "type": "object",
            "properties": {"x": {"$ref": "#/definitions/a"}}
        }))
        .unwrap_err();
        match err {
            SchemaError::Malformed { reason, .. } => assert!(reason.contains("cycle")),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            load(json!({"type": "array", "items": {"type": "string"}})),
            Err(SchemaError::Malformed { .. })
        ));
        assert!(matches!(
            PackageSchema::from_document(key(), "not json"),
            Err(SchemaError::Malformed { .. })
        ));
    }

    #[test]
    fn test_checksum_recorded() {
        let doc = json!({"type": "object", "properties": {}}).to_string();
        let schema = PackageSchema::from_document(key(), &doc).unwrap();
        assert!(schema.checksum.verify(&doc));
        assert!(schema.properties().is_empty());
        assert_eq!(schema.package(), "dbt-test");
    }
}
