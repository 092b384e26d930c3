//! Schema Authoring Lints
//!
//! Advisory checks on a loaded package schema. Nothing here affects
//! validation or default resolution; findings only tell a schema author where
//! the document will behave differently from how it reads.
//!
//! ## Lints
//! 1. **Defaults**: prose where a typed value is expected, template
//!    expressions, numeric defaults outside their own bounds
//! 2. **Warehouses**: `warehouse` tags naming an unsupported platform
//! 3. **Presentation**: top-level properties without a title or group

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::defaults::interpret_literal;
use crate::error::Result;
use crate::node::{NodeKind, SchemaNode};
use crate::registry::SchemaRegistry;
use crate::schema::PackageSchema;
use crate::version::PackageKey;

/// Platforms a `warehouse` tag may name
pub const KNOWN_WAREHOUSES: &[&str] = &["Snowflake", "BigQuery", "Databricks", "Redshift", "Postgres"];

/// Result of linting a schema
#[derive(Debug, Serialize)]
pub struct LintResult {
    pub key: PackageKey,
    pub errors: Vec<LintError>,
    pub warnings: Vec<LintWarning>,
}

impl LintResult {
    fn new(key: PackageKey) -> Self {
        Self {
            key,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LintError {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LintWarning {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

/// The schema authoring linter
pub struct SchemaLinter {
    /// `{{ ... }}` template expressions in default literals
    template_pattern: Regex,
}

impl Default for SchemaLinter {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaLinter {
    pub fn new() -> Self {
        Self {
            template_pattern: Regex::new(r"\{\{.*\}\}").expect("template pattern is a valid regex"),
        }
    }

    /// Lint every node of a schema
    pub fn lint(&self, schema: &PackageSchema) -> LintResult {
        let mut result = LintResult::new(schema.key.clone());

        for prop in schema.properties() {
            let meta = &prop.node.meta;
            if meta.title.is_none() {
                result.warnings.push(LintWarning {
                    code: "MISSING_TITLE",
                    message: format!("Property '{}' has no title; its name will be shown", prop.name),
                    path: prop.name.clone(),
                });
            }
            if meta.group.is_none() {
                result.warnings.push(LintWarning {
                    code: "MISSING_GROUP",
                    message: format!("Property '{}' has no group", prop.name),
                    path: prop.name.clone(),
                });
            }
            self.lint_node(&prop.node, &prop.name, &mut result);
        }

        debug!(
            key = %result.key,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "linted schema"
        );
        result
    }

    fn lint_node(&self, node: &SchemaNode, path: &str, result: &mut LintResult) {
        if let Some(warehouse) = node.meta.warehouse.as_deref() {
            if !KNOWN_WAREHOUSES.iter().any(|w| w.eq_ignore_ascii_case(warehouse.trim())) {
                result.errors.push(LintError {
                    code: "UNKNOWN_WAREHOUSE",
                    message: format!(
                        "Unknown warehouse '{}'. Must be one of: {:?}",
                        warehouse, KNOWN_WAREHOUSES
                    ),
                    path: path.to_string(),
                });
            }
        }

        if let Some(literal) = node.meta.package_default.as_deref() {
            self.lint_default(node, literal, path, result);
        }

        match &node.kind {
            NodeKind::Object(obj) => {
                for prop in &obj.properties {
                    let child_path = format!("{}.{}", path, prop.name);
                    self.lint_node(&prop.node, &child_path, result);
                }
            }
            NodeKind::Array { items, .. } => {
                self.lint_node(items, &format!("{}[]", path), result);
            }
            NodeKind::OneOf { variants } => {
                for (i, variant) in variants.iter().enumerate() {
                    let child_path = format!("{}<oneOf {}>", path, i);
                    self.lint_node(variant, &child_path, result);
                }
            }
            _ => {}
        }
    }

    fn lint_default(&self, node: &SchemaNode, literal: &str, path: &str, result: &mut LintResult) {
        if self.template_pattern.is_match(literal) {
            result.warnings.push(LintWarning {
                code: "TEMPLATED_DEFAULT",
                message: format!("Default '{}' is a template expression and is kept as text", literal),
                path: path.to_string(),
            });
        }

        let Some(value) = interpret_literal(node, literal) else {
            result.warnings.push(LintWarning {
                code: "PROSE_DEFAULT",
                message: format!(
                    "Default '{}' is not a {} value; it resolves to the empty value",
                    literal,
                    node.type_name()
                ),
                path: path.to_string(),
            });
            return;
        };

        if let (NodeKind::Number { minimum, maximum }, Some(n)) = (&node.kind, value.as_f64()) {
            let below = minimum.map(|min| n < min).unwrap_or(false);
            let above = maximum.map(|max| n > max).unwrap_or(false);
            if below || above {
                result.errors.push(LintError {
                    code: "DEFAULT_OUT_OF_RANGE",
                    message: format!(
                        "Default {} is outside the declared bounds [{}, {}]",
                        n,
                        minimum.map(|m| m.to_string()).unwrap_or_else(|| "-inf".into()),
                        maximum.map(|m| m.to_string()).unwrap_or_else(|| "inf".into()),
                    ),
                    path: path.to_string(),
                });
            }
        }
    }
}

/// Lint every schema a registry can serve
pub fn lint_registry(registry: &SchemaRegistry) -> Result<Vec<LintResult>> {
    let linter = SchemaLinter::new();
    let mut results = Vec::new();
    for key in registry.available()? {
        let schema = registry.get_key(&key)?;
        results.push(linter.lint(&schema));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lint(doc: serde_json::Value) -> LintResult {
        let schema = PackageSchema::from_document(
            PackageKey::parse("dbt-test", "1.0.0").unwrap(),
            &doc.to_string(),
        )
        .unwrap();
        SchemaLinter::new().lint(&schema)
    }

    fn described(extra: serde_json::Value) -> serde_json::Value {
        let mut prop = json!({"title": "Field", "group": "Contexts"});
        for (k, v) in extra.as_object().unwrap() {
            prop[k] = v.clone();
        }
        json!({"type": "object", "properties": {"field": prop}})
    }

    #[test]
    fn test_prose_default() {
        let result = lint(described(json!({
            "type": "number", "minimum": 0, "packageDefault": "0 (unlimited)"
        })));
        assert!(result.is_clean());
        assert!(result.warnings.iter().any(|w| w.code == "PROSE_DEFAULT"));
    }

    #[test]
    fn test_templated_default() {
        let result = lint(described(json!({
            "type": "string", "packageDefault": "{{ source('atomic', 'events') }}"
        })));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, "TEMPLATED_DEFAULT");
    }

    #[test]
    fn test_unknown_warehouse() {
        let result = lint(described(json!({"type": "boolean", "warehouse": "Oracle"})));
        assert!(result.errors.iter().any(|e| e.code == "UNKNOWN_WAREHOUSE"));

        let result = lint(described(json!({"type": "boolean", "warehouse": "Bigquery"})));
        assert!(result.is_clean());
    }

    #[test]
    fn test_default_out_of_range() {
        let result = lint(described(json!({
            "type": "number", "minimum": 0, "maximum": 1, "packageDefault": "1.5"
        })));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "DEFAULT_OUT_OF_RANGE");
        assert_eq!(result.errors[0].path, "field");
    }

    #[test]
    fn test_missing_presentation() {
        let result = lint(json!({
            "type": "object",
            "properties": {"bare": {"type": "string"}}
        }));
        let codes: Vec<&str> = result.warnings.iter().map(|w| w.code).collect();
        assert_eq!(codes, vec!["MISSING_TITLE", "MISSING_GROUP"]);
    }

    #[test]
    fn test_nested_paths() {
        let result = lint(described(json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {"days": {"type": "number", "packageDefault": "soon"}}
            }
        })));
        let prose = result.warnings.iter().find(|w| w.code == "PROSE_DEFAULT").unwrap();
        assert_eq!(prose.path, "field[].days");
    }

    #[test]
    fn test_clean_schema() {
        let result = lint(described(json!({
            "type": "number", "minimum": 0, "packageDefault": "30"
        })));
        assert!(result.is_clean());
        assert!(!result.has_warnings());
    }
}
