//! Field catalog
//!
//! Flattens a package schema's top-level properties into descriptors a form
//! renderer can lay out: title, descriptions, group and warehouse
//! applicability. The catalog is built from the schema alone and never looks
//! at user data.

use std::fmt;

use serde::Serialize;

use crate::node::SchemaNode;
use crate::schema::PackageSchema;

/// Group name used for properties that declare none
pub const UNGROUPED: &str = "Ungrouped";

/// Target platform identifier (e.g. "Snowflake", "BigQuery").
///
/// Comparison ignores ASCII case, so `Bigquery` and `BigQuery` are the same
/// warehouse.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct WarehouseId(String);

impl WarehouseId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a node's `warehouse` tag names this warehouse
    pub fn matches(&self, tag: &str) -> bool {
        self.0.trim().eq_ignore_ascii_case(tag.trim())
    }
}

impl PartialEq for WarehouseId {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for WarehouseId {}

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WarehouseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Rendering metadata for one top-level configuration option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Declared title, or the property name when none is declared
    pub title: String,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub group: Option<String>,
    pub warehouse: Option<String>,
    /// The authored `packageDefault` text, unparsed
    pub default_literal: Option<String>,
    /// False only when a target warehouse was given and the field is tagged
    /// for a different one
    pub applicable: bool,
    pub schema: SchemaNode,
}

impl FieldDescriptor {
    /// Group for display, with untagged fields under [`UNGROUPED`]
    pub fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or(UNGROUPED)
    }
}

/// Descriptors sharing one group, in declaration order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroup {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

/// One descriptor per top-level property, in declaration order.
///
/// Fields tagged for another warehouse are kept and marked
/// `applicable = false`; applicability is advisory, never a filter.
pub fn build_catalog(schema: &PackageSchema, target: Option<&WarehouseId>) -> Vec<FieldDescriptor> {
    schema
        .properties()
        .iter()
        .map(|prop| {
            let meta = &prop.node.meta;
            let applicable = match (target, meta.warehouse.as_deref()) {
                (Some(target), Some(tag)) => target.matches(tag),
                _ => true,
            };
            FieldDescriptor {
                name: prop.name.clone(),
                title: meta.title.clone().unwrap_or_else(|| prop.name.clone()),
                description: meta.description.clone(),
                long_description: meta.long_description.clone(),
                group: meta.group.clone(),
                warehouse: meta.warehouse.clone(),
                default_literal: meta.package_default.clone(),
                applicable,
                schema: prop.node.clone(),
            }
        })
        .collect()
}

/// Group descriptors for presentation. Groups appear in order of their first
/// field; fields keep their relative order.
pub fn group_catalog(descriptors: Vec<FieldDescriptor>) -> Vec<FieldGroup> {
    let mut groups: Vec<FieldGroup> = Vec::new();
    for descriptor in descriptors {
        let name = descriptor.group_name().to_string();
        match groups.iter_mut().find(|g| g.name == name) {
            Some(group) => group.fields.push(descriptor),
            None => groups.push(FieldGroup {
                name,
                fields: vec![descriptor],
            }),
        }
    }
    groups
}
