//! Default resolution
//!
//! Package defaults are authored as display strings (`"30"`, `"false"`,
//! `"[ ] (no filter applied)"`). This module turns them into typed values
//! according to the property's declared node, and layers a validated user
//! document over them to produce the [`EffectiveConfiguration`].
//!
//! A literal that does not parse as its declared type is treated as prose and
//! resolves to the type's zero value: `[]` for arrays, `""` for everything else.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::node::{NodeKind, SchemaNode};
use crate::schema::PackageSchema;
use crate::validator::{accepts, ValidatedDocument};

/// Fully resolved configuration: one value per declared top-level property,
/// in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EffectiveConfiguration {
    values: Map<String, Value>,
}

impl EffectiveConfiguration {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

/// Zero value of a node's type
pub fn zero_value(node: &SchemaNode) -> Value {
    match node.kind {
        NodeKind::Array { .. } => Value::Array(Vec::new()),
        _ => Value::String(String::new()),
    }
}

/// Interpret a default literal as the node's declared type.
///
/// Returns `None` when the literal is prose rather than a parseable value.
pub fn interpret_literal(node: &SchemaNode, literal: &str) -> Option<Value> {
    match &node.kind {
        NodeKind::String { .. } => Some(Value::String(literal.to_string())),
        NodeKind::Number { .. } => parse_number(literal),
        NodeKind::Boolean => {
            let trimmed = literal.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        NodeKind::Array { .. } => {
            parse_structured(literal).filter(|v| v.is_array() && accepts(node, v))
        }
        NodeKind::Object(_) => {
            parse_structured(literal).filter(|v| v.is_object() && accepts(node, v))
        }
        // First variant, in declaration order, whose reading of the literal validates.
        NodeKind::OneOf { variants } => variants
            .iter()
            .find_map(|variant| interpret_literal(variant, literal).filter(|v| accepts(variant, v))),
        NodeKind::Ref { .. } => None,
    }
}

/// Parse a default literal, falling back to the zero value for prose.
pub fn parse_default_literal(node: &SchemaNode, literal: &str) -> Value {
    interpret_literal(node, literal).unwrap_or_else(|| zero_value(node))
}

/// The declared default of a node: its parsed `packageDefault`, or the zero
/// value when none is declared.
pub fn default_for(node: &SchemaNode) -> Value {
    match node.meta.package_default.as_deref() {
        Some(literal) => parse_default_literal(node, literal),
        None => zero_value(node),
    }
}

/// The configuration that results from an empty user document.
pub fn declared_defaults(schema: &PackageSchema) -> EffectiveConfiguration {
    let values = schema
        .properties()
        .iter()
        .map(|prop| (prop.name.clone(), default_for(&prop.node)))
        .collect();
    EffectiveConfiguration { values }
}

/// Layer a validated user document over the schema's declared defaults.
///
/// User values are taken verbatim. Keys that the schema does not declare at
/// the top level are dropped.
pub fn resolve_effective(document: &ValidatedDocument<'_>) -> EffectiveConfiguration {
    let schema = document.schema();
    let user = document.values();

    let mut values = Map::new();
    let mut overridden = 0usize;
    for prop in schema.properties() {
        let value = match user.get(&prop.name) {
            Some(value) => {
                overridden += 1;
                value.clone()
            }
            None => default_for(&prop.node),
        };
        values.insert(prop.name.clone(), value);
    }

    debug!(
        key = %schema.key,
        overridden,
        defaulted = values.len() - overridden,
        dropped = user.len() - overridden,
        "resolved effective configuration"
    );
    EffectiveConfiguration { values }
}

fn parse_number(literal: &str) -> Option<Value> {
    let trimmed = literal.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// JSON, or JSON written with single quotes (`['a', 'b']`)
fn parse_structured(literal: &str) -> Option<Value> {
    let trimmed = literal.trim();
    serde_json::from_str(trimmed)
        .ok()
        .or_else(|| serde_json::from_str(&trimmed.replace('\'', "\"")).ok())
}
