//! Schema node model
//!
//! A package schema is a small, closed subset of JSON Schema plus a handful of
//! display keywords (`title`, `description`, `longDescription`, `group`,
//! `warehouse`, `packageDefault`). Raw JSON is parsed once into [`SchemaNode`];
//! any keyword outside the subset, or a keyword that does not belong to the
//! node's type, is rejected here rather than ignored at validation time.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// Metadata
// =============================================================================

/// Display metadata that may ride on any node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Target platform this node applies to (advisory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    /// Human-authored default literal, e.g. `"30"` or `"[ ] (no filter applied)"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_default: Option<String>,
}

impl NodeMeta {
    /// Metadata with every field of `over` that is set replacing ours
    pub fn overlay(&self, over: &NodeMeta) -> NodeMeta {
        NodeMeta {
            title: over.title.clone().or_else(|| self.title.clone()),
            description: over.description.clone().or_else(|| self.description.clone()),
            long_description: over
                .long_description
                .clone()
                .or_else(|| self.long_description.clone()),
            group: over.group.clone().or_else(|| self.group.clone()),
            warehouse: over.warehouse.clone().or_else(|| self.warehouse.clone()),
            package_default: over
                .package_default
                .clone()
                .or_else(|| self.package_default.clone()),
        }
    }
}

// =============================================================================
// Node Kinds
// =============================================================================

/// Supported values of the `format` keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    /// ISO calendar date, `YYYY-MM-DD`
    Date,
}

/// One declared property of an object node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub node: SchemaNode,
}

/// An object node: ordered properties plus closure rules
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectNode {
    /// Properties in declaration order
    pub properties: Vec<Property>,
    pub required: Vec<String>,
    pub additional_properties: bool,
}

impl ObjectNode {
    /// Look up a declared property by name
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.node)
    }

    /// Declared property names, in order
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

/// The closed set of node shapes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<StringFormat>,
    },
    Number {
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Boolean,
    #[serde(rename_all = "camelCase")]
    Array {
        items: Box<SchemaNode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        unique_items: bool,
    },
    Object(ObjectNode),
    OneOf {
        variants: Vec<SchemaNode>,
    },
    /// Reference to a named definition; replaced during schema loading
    Ref {
        name: String,
    },
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::String { .. } => "string",
            NodeKind::Number { .. } => "number",
            NodeKind::Boolean => "boolean",
            NodeKind::Array { .. } => "array",
            NodeKind::Object(_) => "object",
            NodeKind::OneOf { .. } => "oneOf",
            NodeKind::Ref { .. } => "$ref",
        }
    }
}

/// A schema node: its shape plus display metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    #[serde(flatten)]
    pub meta: NodeMeta,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl SchemaNode {
    /// Short type name used in messages ("string", "array", "oneOf", ...)
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match &self.kind {
            NodeKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Parse a raw JSON node.
    pub fn from_value(value: &Value) -> Result<Self, NodeParseError> {
        parse_node(value, "")
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Error raised when a raw node falls outside the supported subset
#[derive(Error, Debug, Clone, PartialEq)]
#[error("at '{at}': {reason}")]
pub struct NodeParseError {
    /// Location within the schema document (e.g. `properties.foo.items`)
    pub at: String,
    pub reason: String,
}

impl NodeParseError {
    fn new(at: &str, reason: impl Into<String>) -> Self {
        Self {
            at: if at.is_empty() { "<root>".to_string() } else { at.to_string() },
            reason: reason.into(),
        }
    }
}

const DEFINITION_PREFIX: &str = "#/definitions/";

const REF_KEYWORDS: &[&str] = &["$ref"];
const ONE_OF_KEYWORDS: &[&str] = &["oneOf"];
const STRING_KEYWORDS: &[&str] = &["type", "format"];
const NUMBER_KEYWORDS: &[&str] = &["type", "minimum", "maximum"];
const BOOLEAN_KEYWORDS: &[&str] = &["type"];
const ARRAY_KEYWORDS: &[&str] = &["type", "items", "minItems", "uniqueItems"];
const OBJECT_KEYWORDS: &[&str] = &["type", "properties", "required", "additionalProperties"];

const META_KEYWORDS: [&str; 6] = [
    "title",
    "description",
    "longDescription",
    "group",
    "warehouse",
    "packageDefault",
];

fn child_path(at: &str, key: &str) -> String {
    if at.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", at, key)
    }
}

fn parse_node(value: &Value, at: &str) -> Result<SchemaNode, NodeParseError> {
    let map = value
        .as_object()
        .ok_or_else(|| NodeParseError::new(at, "schema node must be an object"))?;

    let meta = parse_meta(map, at)?;

    let (kind, allowed): (NodeKind, &[&str]) = if let Some(target) = map.get("$ref") {
        if map.contains_key("type") || map.contains_key("oneOf") {
            return Err(NodeParseError::new(at, "'$ref' cannot be combined with 'type' or 'oneOf'"));
        }
        (parse_ref(target, at)?, REF_KEYWORDS)
    } else if let Some(variants) = map.get("oneOf") {
        if map.contains_key("type") {
            return Err(NodeParseError::new(at, "'oneOf' cannot be combined with 'type'"));
        }
        (parse_one_of(variants, at)?, ONE_OF_KEYWORDS)
    } else {
        match map.get("type") {
            Some(Value::String(t)) => match t.as_str() {
                "string" => (parse_string(map, at)?, STRING_KEYWORDS),
                "number" => (parse_number(map, at)?, NUMBER_KEYWORDS),
                "boolean" => (NodeKind::Boolean, BOOLEAN_KEYWORDS),
                "array" => (parse_array(map, at)?, ARRAY_KEYWORDS),
                "object" => (NodeKind::Object(parse_object(map, at)?), OBJECT_KEYWORDS),
                other => {
                    return Err(NodeParseError::new(at, format!("unsupported type '{}'", other)))
                }
            },
            Some(_) => return Err(NodeParseError::new(at, "'type' must be a single type name")),
            None => {
                return Err(NodeParseError::new(at, "node needs one of 'type', 'oneOf' or '$ref'"))
            }
        }
    };

    for key in map.keys() {
        if !allowed.contains(&key.as_str()) && !META_KEYWORDS.contains(&key.as_str()) {
            return Err(NodeParseError::new(
                at,
                format!("keyword '{}' is not supported on a {} node", key, kind.type_name()),
            ));
        }
    }

    Ok(SchemaNode { meta, kind })
}

fn parse_meta(map: &Map<String, Value>, at: &str) -> Result<NodeMeta, NodeParseError> {
    let text = |key: &str| -> Result<Option<String>, NodeParseError> {
        match map.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(NodeParseError::new(at, format!("'{}' must be a string", key))),
        }
    };

    Ok(NodeMeta {
        title: text("title")?,
        description: text("description")?,
        long_description: text("longDescription")?,
        group: text("group")?,
        warehouse: text("warehouse")?,
        package_default: text("packageDefault")?,
    })
}

fn parse_ref(target: &Value, at: &str) -> Result<NodeKind, NodeParseError> {
    let target = target
        .as_str()
        .ok_or_else(|| NodeParseError::new(at, "'$ref' must be a string"))?;
    match target.strip_prefix(DEFINITION_PREFIX) {
        Some(name) if !name.is_empty() && !name.contains('/') => Ok(NodeKind::Ref {
            name: name.to_string(),
        }),
        _ => Err(NodeParseError::new(
            at,
            format!("only local '{}<name>' references are supported, got '{}'", DEFINITION_PREFIX, target),
        )),
    }
}

fn parse_one_of(variants: &Value, at: &str) -> Result<NodeKind, NodeParseError> {
    let list = variants
        .as_array()
        .ok_or_else(|| NodeParseError::new(at, "'oneOf' must be an array"))?;
    if list.is_empty() {
        return Err(NodeParseError::new(at, "'oneOf' needs at least one variant"));
    }
    let variants = list
        .iter()
        .enumerate()
        .map(|(i, v)| parse_node(v, &format!("{}[{}]", child_path(at, "oneOf"), i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NodeKind::OneOf { variants })
}

fn parse_string(map: &Map<String, Value>, at: &str) -> Result<NodeKind, NodeParseError> {
    let format = match map.get("format") {
        None => None,
        Some(Value::String(f)) if f == "date" => Some(StringFormat::Date),
        Some(other) => {
            return Err(NodeParseError::new(at, format!("unsupported format {}", other)))
        }
    };
    Ok(NodeKind::String { format })
}

fn parse_number(map: &Map<String, Value>, at: &str) -> Result<NodeKind, NodeParseError> {
    let bound = |key: &str| -> Result<Option<f64>, NodeParseError> {
        match map.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| NodeParseError::new(at, format!("'{}' must be a number", key))),
        }
    };
    let minimum = bound("minimum")?;
    let maximum = bound("maximum")?;
    if let (Some(min), Some(max)) = (minimum, maximum) {
        if min > max {
            return Err(NodeParseError::new(
                at,
                format!("minimum {} is greater than maximum {}", min, max),
            ));
        }
    }
    Ok(NodeKind::Number { minimum, maximum })
}

fn parse_array(map: &Map<String, Value>, at: &str) -> Result<NodeKind, NodeParseError> {
    let items = map
        .get("items")
        .ok_or_else(|| NodeParseError::new(at, "array node requires 'items'"))?;
    let items = parse_node(items, &child_path(at, "items"))?;

    let min_items = match map.get("minItems") {
        None => None,
        Some(v) => Some(
            v.as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| NodeParseError::new(at, "'minItems' must be a non-negative integer"))?,
        ),
    };

    let unique_items = match map.get("uniqueItems") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(NodeParseError::new(at, "'uniqueItems' must be a boolean")),
    };

    Ok(NodeKind::Array {
        items: Box::new(items),
        min_items,
        unique_items,
    })
}

fn parse_object(map: &Map<String, Value>, at: &str) -> Result<ObjectNode, NodeParseError> {
    let properties = match map.get("properties") {
        None => Vec::new(),
        Some(Value::Object(props)) => {
            let props_at = child_path(at, "properties");
            props
                .iter()
                .map(|(name, node)| {
                    parse_node(node, &child_path(&props_at, name)).map(|node| Property {
                        name: name.clone(),
                        node,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        Some(_) => return Err(NodeParseError::new(at, "'properties' must be an object")),
    };

    let mut required: Vec<String> = Vec::new();
    match map.get("required") {
        None => {}
        Some(Value::Array(names)) => {
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| NodeParseError::new(at, "'required' entries must be strings"))?;
                if !required.iter().any(|r| r == name) {
                    required.push(name.to_string());
                }
            }
        }
        Some(_) => return Err(NodeParseError::new(at, "'required' must be an array")),
    }

    let additional_properties = match map.get("additionalProperties") {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(NodeParseError::new(at, "'additionalProperties' must be a boolean"))
        }
    };

    Ok(ObjectNode {
        properties,
        required,
        additional_properties,
    })
}
