//! Configuration validation
//!
//! [`validate`] checks a user-supplied value against a [`SchemaNode`] and
//! reports every structural violation it finds in one pass. Malformed user
//! input is never an `Err`; it is always a [`ValidationError`] in the result.
//!
//! `oneOf` uses first-match selection: a value must satisfy at least one
//! variant, and when several variants accept it the earliest declared one is
//! authoritative (see [`select_variant`]).

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::node::{NodeKind, ObjectNode, SchemaNode, StringFormat};
use crate::schema::PackageSchema;

// =============================================================================
// Field Paths
// =============================================================================

/// One step from a parent value to a child value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A key in a mapping
    Key(String),
    /// An index in a sequence
    Index(usize),
}

/// Location of a value inside a configuration document, e.g. `items[2].sql`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The document root (renders as the empty string)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path to `key` below this one
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    /// Path to element `index` below this one
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Top-level field name this path starts with, if any
    pub fn top_level_field(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSegment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Human-friendly rendering; the root is shown as `<root>`
    pub fn display_name(&self) -> String {
        if self.is_root() {
            String::from("<root>")
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(k) if i == 0 => write!(f, "{}", k)?,
                PathSegment::Key(k) => write!(f, ".{}", k)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Errors and Results
// =============================================================================

/// Category of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorKind {
    MissingRequiredField,
    UnexpectedField,
    OutOfRange,
    InvalidFormat,
    DuplicateItem,
    NoMatchingVariant,
    /// The value has the wrong JSON type for its node
    TypeMismatch,
}

impl ValidationErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::UnexpectedField => "UNEXPECTED_FIELD",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::DuplicateItem => "DUPLICATE_ITEM",
            Self::NoMatchingVariant => "NO_MATCHING_VARIANT",
            Self::TypeMismatch => "TYPE_MISMATCH",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single problem with a configuration document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub path: FieldPath,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    fn new(path: &FieldPath, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path.display_name(), self.kind, self.message)
    }
}

/// Outcome of validating a value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "errors", rename_all = "lowercase")]
pub enum ValidationResult {
    Valid,
    /// Every violation found, in traversal order; never empty
    Invalid(Vec<ValidationError>),
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(errors)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Self::Valid => &[],
            Self::Invalid(errors) => errors,
        }
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(errors) => Err(errors),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Validate `value` against `node`, reporting paths below `path`.
pub fn validate(node: &SchemaNode, value: &Value, path: &FieldPath) -> ValidationResult {
    let mut errors = Vec::new();
    check_node(node, value, path, &mut errors);
    ValidationResult::from_errors(errors)
}

/// The variant of a `oneOf` node that governs `value`: the first one, in
/// declaration order, that accepts it.
///
/// For any other node kind, returns the node itself if it accepts `value`.
pub fn select_variant<'a>(node: &'a SchemaNode, value: &Value) -> Option<&'a SchemaNode> {
    match &node.kind {
        NodeKind::OneOf { variants } => variants.iter().find(|v| accepts(v, value)),
        _ => accepts(node, value).then_some(node),
    }
}

/// Deep structural equality: mapping keys/values regardless of key order,
/// sequence elements in order, numbers by value (`25` equals `25.0`).
pub fn structurally_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|w| structurally_equal(v, w)).unwrap_or(false))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(v, w)| structurally_equal(v, w))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether `value` validates against `node` without any error
pub fn accepts(node: &SchemaNode, value: &Value) -> bool {
    let mut errors = Vec::new();
    check_node(node, value, &FieldPath::root(), &mut errors);
    errors.is_empty()
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(node: &SchemaNode, value: &Value, path: &FieldPath) -> ValidationError {
    ValidationError::new(
        path,
        ValidationErrorKind::TypeMismatch,
        format!("expected {}, found {}", node.type_name(), describe(value)),
    )
}

fn check_node(node: &SchemaNode, value: &Value, path: &FieldPath, errors: &mut Vec<ValidationError>) {
    match &node.kind {
        NodeKind::String { format } => match value {
            Value::String(s) => {
                if let Some(StringFormat::Date) = format {
                    if !is_iso_date(s) {
                        errors.push(ValidationError::new(
                            path,
                            ValidationErrorKind::InvalidFormat,
                            format!("'{}' is not a calendar date (YYYY-MM-DD)", s),
                        ));
                    }
                }
            }
            _ => errors.push(mismatch(node, value, path)),
        },

        NodeKind::Number { minimum, maximum } => match value.as_f64() {
            Some(n) => {
                if let Some(min) = minimum {
                    if n < *min {
                        errors.push(ValidationError::new(
                            path,
                            ValidationErrorKind::OutOfRange,
                            format!("{} is below the minimum of {}", n, min),
                        ));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        errors.push(ValidationError::new(
                            path,
                            ValidationErrorKind::OutOfRange,
                            format!("{} is above the maximum of {}", n, max),
                        ));
                    }
                }
            }
            _ => errors.push(mismatch(node, value, path)),
        },

        NodeKind::Boolean => {
            if !value.is_boolean() {
                errors.push(mismatch(node, value, path));
            }
        }

        NodeKind::Array {
            items,
            min_items,
            unique_items,
        } => match value {
            Value::Array(elements) => {
                check_array(items, *min_items, *unique_items, elements, path, errors)
            }
            _ => errors.push(mismatch(node, value, path)),
        },

        NodeKind::Object(obj) => match value {
            Value::Object(map) => check_object(obj, map, path, errors),
            _ => errors.push(mismatch(node, value, path)),
        },

        NodeKind::OneOf { variants } => {
            // Per-variant errors are not reported, only the failed match.
            if !variants.iter().any(|v| accepts(v, value)) {
                errors.push(ValidationError::new(
                    path,
                    ValidationErrorKind::NoMatchingVariant,
                    format!("value matches none of the {} allowed shapes", variants.len()),
                ));
            }
        }

        // References are substituted when a PackageSchema is loaded; a bare
        // node that still carries one cannot accept anything.
        NodeKind::Ref { name } => errors.push(ValidationError::new(
            path,
            ValidationErrorKind::NoMatchingVariant,
            format!("unresolved reference to definition '{}'", name),
        )),
    }
}

fn check_array(
    items: &SchemaNode,
    min_items: Option<usize>,
    unique_items: bool,
    elements: &[Value],
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(min) = min_items {
        if elements.len() < min {
            errors.push(ValidationError::new(
                path,
                ValidationErrorKind::OutOfRange,
                format!("expected at least {} items, found {}", min, elements.len()),
            ));
        }
    }

    for (i, element) in elements.iter().enumerate() {
        check_node(items, element, &path.index(i), errors);
    }

    if unique_items {
        for (j, later) in elements.iter().enumerate().skip(1) {
            if let Some(i) = elements[..j]
                .iter()
                .position(|earlier| structurally_equal(earlier, later))
            {
                errors.push(ValidationError::new(
                    &path.index(j),
                    ValidationErrorKind::DuplicateItem,
                    format!("duplicates item {}", i),
                ));
            }
        }
    }
}

fn check_object(
    obj: &ObjectNode,
    map: &Map<String, Value>,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    for (key, value) in map {
        match obj.property(key) {
            Some(child) => check_node(child, value, &path.key(key.as_str()), errors),
            None if obj.additional_properties => {}
            None => errors.push(ValidationError::new(
                &path.key(key.as_str()),
                ValidationErrorKind::UnexpectedField,
                format!("'{}' is not a recognised field", key),
            )),
        }
    }

    for name in &obj.required {
        if !map.contains_key(name) {
            errors.push(ValidationError::new(
                &path.key(name.as_str()),
                ValidationErrorKind::MissingRequiredField,
                format!("required field '{}' is missing", name),
            ));
        }
    }
}

/// Strict `YYYY-MM-DD`: chrono alone accepts padded and signed fields
fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    shaped && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

// =============================================================================
// Validated Documents
// =============================================================================

/// A configuration document that has passed validation against a schema.
///
/// Only [`validate_document`] creates one, which is what lets the default
/// resolver trust user-supplied values without re-checking them.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedDocument<'a> {
    schema: &'a PackageSchema,
    values: &'a Map<String, Value>,
}

impl<'a> ValidatedDocument<'a> {
    pub fn schema(&self) -> &'a PackageSchema {
        self.schema
    }

    pub fn values(&self) -> &'a Map<String, Value> {
        self.values
    }
}

/// Validate a whole configuration document against a package schema's root.
pub fn validate_document<'a>(
    schema: &'a PackageSchema,
    document: &'a Value,
) -> Result<ValidatedDocument<'a>, Vec<ValidationError>> {
    validate(schema.root(), document, &FieldPath::root()).into_result()?;
    match document.as_object() {
        Some(values) => Ok(ValidatedDocument { schema, values }),
        None => Err(vec![mismatch(schema.root(), document, &FieldPath::root())]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(raw: Value) -> SchemaNode {
        SchemaNode::from_value(&raw).unwrap()
    }

    fn passthrough_vars() -> SchemaNode {
        node(json!({
            "type": "array",
            "minItems": 0,
            "uniqueItems": true,
            "items": {
                "title": "Type",
                "oneOf": [
                    {"type": "string", "title": "Column Name"},
                    {
                        "type": "object",
                        "title": "SQL & Alias",
                        "properties": {"sql": {"type": "string"}, "alias": {"type": "string"}},
                        "required": ["sql", "alias"],
                        "additionalProperties": false
                    }
                ]
            }
        }))
    }

    fn run(node: &SchemaNode, value: Value) -> ValidationResult {
        validate(node, &value, &FieldPath::root())
    }

    #[test]
    fn test_field_path_rendering() {
        let path = FieldPath::root().key("items").index(2).key("sql");
        assert_eq!(path.to_string(), "items[2].sql");
        assert_eq!(path.top_level_field(), Some("items"));
        assert_eq!(FieldPath::root().to_string(), "");
        assert_eq!(FieldPath::root().display_name(), "<root>");
    }

    #[test]
    fn test_scalar_type_mismatches() {
        let string = node(json!({"type": "string"}));
        let number = node(json!({"type": "number"}));
        let boolean = node(json!({"type": "boolean"}));

        assert!(run(&string, json!("atomic")).is_valid());
        assert!(run(&number, json!(30)).is_valid());
        assert!(run(&boolean, json!(false)).is_valid());

        for (n, v) in [(&string, json!(1)), (&number, json!("30")), (&boolean, json!("false"))] {
            let result = run(n, v);
            assert_eq!(result.errors().len(), 1);
            assert_eq!(result.errors()[0].kind, ValidationErrorKind::TypeMismatch);
        }
        assert_eq!(run(&string, Value::Null).errors()[0].message, "expected string, found null");
    }

    #[test]
    fn test_date_format() {
        let date = node(json!({"type": "string", "format": "date"}));
        assert!(run(&date, json!("2020-01-01")).is_valid());

        for bad in [
            "2020-13-01",
            "2020-02-30",
            "01/01/2020",
            "2020-1-1",
            "",
            "2020-01- 1",
            "2020- 1-01",
            " 020-01-01",
            "+020-01-01",
        ] {
            let result = run(&date, json!(bad));
            assert_eq!(result.errors()[0].kind, ValidationErrorKind::InvalidFormat, "{}", bad);
        }
    }

    #[test]
    fn test_numeric_bounds() {
        let rate = node(json!({"type": "number", "minimum": 0, "maximum": 1}));
        assert!(run(&rate, json!(0.99)).is_valid());
        assert!(run(&rate, json!(0)).is_valid());
        assert!(run(&rate, json!(1)).is_valid());

        let above = run(&rate, json!(1.5));
        assert_eq!(above.errors().len(), 1);
        assert_eq!(above.errors()[0].kind, ValidationErrorKind::OutOfRange);

        let below = run(&rate, json!(-0.1));
        assert_eq!(below.errors()[0].kind, ValidationErrorKind::OutOfRange);
    }

    #[test]
    fn test_one_of_resolution() {
        let items = match passthrough_vars().kind {
            NodeKind::Array { items, .. } => *items,
            _ => unreachable!(),
        };

        assert!(run(&items, json!("revenue")).is_valid());
        assert_eq!(
            select_variant(&items, &json!("revenue")).and_then(|v| v.meta.title.as_deref()),
            Some("Column Name")
        );

        let sql = json!({"sql": "1+1", "alias": "x"});
        assert!(run(&items, sql.clone()).is_valid());
        assert_eq!(
            select_variant(&items, &sql).and_then(|v| v.meta.title.as_deref()),
            Some("SQL & Alias")
        );

        let missing_alias = run(&items, json!({"sql": "1+1"}));
        assert_eq!(missing_alias.errors().len(), 1);
        assert_eq!(missing_alias.errors()[0].kind, ValidationErrorKind::NoMatchingVariant);
        assert!(missing_alias.errors()[0].path.is_root());
        assert!(select_variant(&items, &json!({"sql": "1+1"})).is_none());
    }

    #[test]
    fn test_one_of_ambiguity_takes_first_variant() {
        let either = node(json!({
            "oneOf": [
                {"type": "string", "title": "first"},
                {"type": "string", "format": "date", "title": "second"}
            ]
        }));
        assert!(run(&either, json!("2020-01-01")).is_valid());
        assert_eq!(
            select_variant(&either, &json!("2020-01-01")).and_then(|v| v.meta.title.as_deref()),
            Some("first")
        );
    }

    #[test]
    fn test_closed_object_reports_only_the_extra_field() {
        let obj = node(json!({
            "type": "object",
            "properties": {"sql": {"type": "string"}, "alias": {"type": "string"}},
            "required": ["sql", "alias"],
            "additionalProperties": false
        }));

        let result = run(&obj, json!({"sql": "a", "alias": "b", "extra": "c"}));
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].kind, ValidationErrorKind::UnexpectedField);
        assert_eq!(result.errors()[0].path.to_string(), "extra");
    }

    #[test]
    fn test_missing_required_fields() {
        let obj = node(json!({
            "type": "object",
            "properties": {"schema": {"type": "string"}, "field": {"type": "string"}},
            "required": ["schema", "field"]
        }));
        let result = run(&obj, json!({}));
        let paths: Vec<String> = result.errors().iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["schema", "field"]);
        assert!(result
            .errors()
            .iter()
            .all(|e| e.kind == ValidationErrorKind::MissingRequiredField));
    }

    #[test]
    fn test_open_object_allows_unknown_keys() {
        let obj = node(json!({"type": "object", "properties": {"a": {"type": "string"}}}));
        assert!(run(&obj, json!({"a": "x", "anything": [1, 2]})).is_valid());
    }

    #[test]
    fn test_errors_accumulate_with_paths() {
        let obj = node(json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"sql": {"type": "string"}},
                        "additionalProperties": false
                    }
                },
                "days": {"type": "number", "minimum": 0}
            }
        }));

        let result = run(
            &obj,
            json!({
                "items": [{"sql": "a"}, {"sql": "b"}, {"sql": 3, "x": 1}],
                "days": -1
            }),
        );
        let rendered: Vec<String> = result
            .errors()
            .iter()
            .map(|e| format!("{} {}", e.path, e.kind))
            .collect();
        assert_eq!(
            rendered,
            vec![
                "items[2].sql TYPE_MISMATCH",
                "items[2].x UNEXPECTED_FIELD",
                "days OUT_OF_RANGE",
            ]
        );
    }

    #[test]
    fn test_duplicate_items_regardless_of_key_order() {
        let vars = passthrough_vars();
        let result = run(
            &vars,
            json!([
                {"sql": "1+1", "alias": "x"},
                "revenue",
                {"alias": "x", "sql": "1+1"}
            ]),
        );
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].kind, ValidationErrorKind::DuplicateItem);
        assert_eq!(result.errors()[0].path.to_string(), "[2]");
    }

    #[test]
    fn test_uniqueness_only_when_declared() {
        let list = node(json!({"type": "array", "items": {"type": "string"}}));
        assert!(run(&list, json!(["a", "a"])).is_valid());
    }

    #[test]
    fn test_min_items() {
        let list = node(json!({"type": "array", "minItems": 1, "items": {"type": "number"}}));
        assert!(run(&list, json!([10])).is_valid());
        assert_eq!(run(&list, json!([])).errors()[0].kind, ValidationErrorKind::OutOfRange);
        assert_eq!(
            run(&list, json!("10, 25")).errors()[0].kind,
            ValidationErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_structural_equality() {
        assert!(structurally_equal(&json!({"a": [1, {"b": 2}]}), &json!({"a": [1, {"b": 2}]})));
        assert!(!structurally_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!structurally_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!structurally_equal(&json!("1"), &json!(1)));
        assert!(structurally_equal(&json!(25), &json!(25.0)));
        assert!(!structurally_equal(&json!(25), &json!(25.5)));
        assert!(structurally_equal(&json!([{"n": -3}]), &json!([{"n": -3.0}])));
    }

    #[test]
    fn test_integer_and_float_duplicates() {
        let boundaries = node(json!({
            "type": "array",
            "uniqueItems": true,
            "items": {"type": "number"}
        }));
        let result = run(&boundaries, json!([25, 25.0]));
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].kind, ValidationErrorKind::DuplicateItem);
        assert_eq!(result.errors()[0].path.to_string(), "[1]");
        assert!(run(&boundaries, json!([10, 25, 50.5])).is_valid());
    }

    #[test]
    fn test_result_serialization() {
        let rate = node(json!({"type": "number", "maximum": 1}));
        let rendered = serde_json::to_value(run(&rate, json!(2))).unwrap();
        assert_eq!(rendered["status"], "invalid");
        assert_eq!(rendered["errors"][0]["kind"], "OUT_OF_RANGE");
        assert_eq!(serde_json::to_value(ValidationResult::Valid).unwrap()["status"], "valid");
    }
}
