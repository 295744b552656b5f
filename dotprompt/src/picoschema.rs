//! Picoschema compiler
//!
//! Picoschema is a compact, YAML-friendly schema shorthand that compiles to
//! JSON Schema:
//!
//! ```yaml
//! product:
//!   id: string, Unique identifier
//!   description?: string
//!   category(enum, Main category): [ELECTRONICS, CLOTHING, BOOKS]
//!   tags(array, Tags for search): string
//!   attributes(object):
//!     (*): any
//! ```
//!
//! - Fields are required unless suffixed with `?`; optional fields become nullable.
//! - `name(array)`, `name(object)` and `name(enum)` select the container kind,
//!   with an optional description after a comma.
//! - `(*)` types the object's additional properties.
//! - Objects reject additional properties unless `(*)` is present.
//! - The `any` type compiles to an empty schema.
//!
//! Input that already looks like JSON Schema (a top-level `type` or
//! `properties`) passes through untouched. Names that are not scalar types
//! are looked up through a [`SchemaResolver`].

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{BoxError, DotpromptError, Result};
use crate::types::JsonSchema;

/// Scalar type tags understood by the shorthand
pub const JSON_SCHEMA_SCALAR_TYPES: [&str; 6] = ["string", "boolean", "null", "number", "integer", "any"];

/// Field name that types an object's additional properties
pub const WILDCARD_PROPERTY_NAME: &str = "(*)";

/// Looks up a named schema referenced from Picoschema
pub trait SchemaResolver: Send + Sync {
    fn resolve_schema(&self, name: &str) -> std::result::Result<Option<JsonSchema>, BoxError>;
}

impl<F> SchemaResolver for F
where
    F: Fn(&str) -> std::result::Result<Option<JsonSchema>, BoxError> + Send + Sync,
{
    fn resolve_schema(&self, name: &str) -> std::result::Result<Option<JsonSchema>, BoxError> {
        self(name)
    }
}

/// Compile a Picoschema (or pass-through JSON Schema) value.
///
/// Returns `Ok(None)` when there is no schema.
pub fn picoschema(schema: Option<&Value>, resolver: Option<&dyn SchemaResolver>) -> Result<Option<JsonSchema>> {
    debug!(has_schema = schema.is_some(), has_resolver = resolver.is_some(), "picoschema: called");
    match schema {
        Some(schema) => PicoschemaParser::new(resolver).parse(schema),
        None => Ok(None),
    }
}

/// Recursive Picoschema to JSON Schema compiler
pub struct PicoschemaParser<'a> {
    resolver: Option<&'a dyn SchemaResolver>,
}

impl<'a> PicoschemaParser<'a> {
    pub fn new(resolver: Option<&'a dyn SchemaResolver>) -> Self {
        Self { resolver }
    }

    /// Compile a top-level schema value
    pub fn parse(&self, schema: &Value) -> Result<Option<JsonSchema>> {
        debug!("PicoschemaParser::parse: called");
        match schema {
            Value::Null => {
                debug!("PicoschemaParser::parse: null schema");
                Ok(None)
            }
            Value::String(shorthand) => {
                debug!(%shorthand, "PicoschemaParser::parse: top-level string");
                self.parse_type_string(shorthand).map(Some)
            }
            Value::Object(map) if looks_like_json_schema(map) => {
                debug!("PicoschemaParser::parse: already JSON Schema, passing through");
                Ok(Some(map.clone()))
            }
            Value::Object(map) if map.get("properties").is_some_and(Value::is_object) => {
                debug!("PicoschemaParser::parse: properties without type, injecting object type");
                let mut out = map.clone();
                out.insert("type".to_string(), Value::String("object".to_string()));
                Ok(Some(out))
            }
            other => self.parse_pico(other, &[]).map(Some),
        }
    }

    fn must_resolve_schema(&self, name: &str) -> Result<JsonSchema> {
        debug!(%name, "PicoschemaParser::must_resolve_schema: called");
        let Some(resolver) = self.resolver else {
            debug!(%name, "PicoschemaParser::must_resolve_schema: no resolver configured");
            return Err(DotpromptError::UnsupportedType { name: name.to_string() });
        };

        match resolver
            .resolve_schema(name)
            .map_err(|e| DotpromptError::resolver("schema", name, e))?
        {
            Some(schema) => Ok(schema),
            None => {
                debug!(%name, "PicoschemaParser::must_resolve_schema: resolver returned nothing");
                Err(DotpromptError::SchemaNotFound { name: name.to_string() })
            }
        }
    }

    /// Compile a `"type[, description]"` string
    fn parse_type_string(&self, shorthand: &str) -> Result<JsonSchema> {
        let (type_name, description) = extract_description(shorthand);

        let mut out = if !JSON_SCHEMA_SCALAR_TYPES.contains(&type_name) {
            // The resolver hands back an owned copy, so attaching a description
            // never touches the registry entry.
            self.must_resolve_schema(type_name)?
        } else if type_name == "any" {
            JsonSchema::new()
        } else {
            let mut out = JsonSchema::new();
            out.insert("type".to_string(), Value::String(type_name.to_string()));
            out
        };

        if let Some(description) = description {
            out.insert("description".to_string(), Value::String(description.to_string()));
        }
        Ok(out)
    }

    fn parse_pico(&self, obj: &Value, path: &[&str]) -> Result<JsonSchema> {
        debug!(path = %path.join("."), "PicoschemaParser::parse_pico: called");
        let fields = match obj {
            Value::String(shorthand) => return self.parse_type_string(shorthand),
            Value::Object(fields) => fields,
            other => {
                return Err(DotpromptError::InvalidSchema(format!(
                    "only consists of objects and strings. Got: {}{}",
                    other,
                    describe_path(path)
                )));
            }
        };

        let mut properties = Map::new();
        let mut required: Vec<Value> = Vec::new();
        let mut additional_properties = Value::Bool(false);

        for (key, value) in fields {
            let mut child_path = path.to_vec();
            child_path.push(key);

            if key == WILDCARD_PROPERTY_NAME {
                debug!("PicoschemaParser::parse_pico: wildcard property");
                additional_properties = Value::Object(self.parse_pico(value, &child_path)?);
                continue;
            }

            let (name, type_info) = match key.split_once('(') {
                Some((name, rest)) => (name, Some(rest.strip_suffix(')').unwrap_or(rest))),
                None => (key.as_str(), None),
            };
            let is_optional = name.ends_with('?');
            let property_name = name.strip_suffix('?').unwrap_or(name);

            if !is_optional {
                required.push(Value::String(property_name.to_string()));
            }

            let Some(type_info) = type_info else {
                let mut prop = self.parse_pico(value, &child_path)?;
                if is_optional {
                    make_nullable(&mut prop);
                }
                properties.insert(property_name.to_string(), Value::Object(prop));
                continue;
            };

            let (kind, description) = extract_description(type_info);
            let mut prop = match kind {
                "array" => {
                    let items = self.parse_pico(value, &child_path)?;
                    let mut types = vec![Value::String("array".to_string())];
                    if is_optional {
                        types.push(Value::String("null".to_string()));
                    }
                    let mut prop = JsonSchema::new();
                    prop.insert("type".to_string(), Value::Array(types));
                    prop.insert("items".to_string(), Value::Object(items));
                    prop
                }
                "object" => {
                    let mut prop = self.parse_pico(value, &child_path)?;
                    if is_optional {
                        make_nullable(&mut prop);
                    }
                    prop
                }
                "enum" => {
                    let Value::Array(members) = value else {
                        return Err(DotpromptError::InvalidSchema(format!(
                            "enum values must be a list. Got: {}{}",
                            value,
                            describe_path(&child_path)
                        )));
                    };
                    let mut members = members.clone();
                    if is_optional && !members.contains(&Value::Null) {
                        members.push(Value::Null);
                    }
                    let mut prop = JsonSchema::new();
                    prop.insert("enum".to_string(), Value::Array(members));
                    prop
                }
                other => {
                    debug!(kind = %other, "PicoschemaParser::parse_pico: unknown parenthetical");
                    return Err(DotpromptError::InvalidParenthetical { kind: other.to_string() });
                }
            };

            if let Some(description) = description {
                prop.insert("description".to_string(), Value::String(description.to_string()));
            }
            properties.insert(property_name.to_string(), Value::Object(prop));
        }

        let mut schema = JsonSchema::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        schema.insert("additionalProperties".to_string(), additional_properties);
        Ok(schema)
    }
}

/// Split `"type, description"` at the first comma
fn extract_description(input: &str) -> (&str, Option<&str>) {
    match input.split_once(',') {
        Some((type_name, description)) => {
            let description = description.trim();
            (type_name.trim(), (!description.is_empty()).then_some(description))
        }
        None => (input.trim(), None),
    }
}

fn looks_like_json_schema(map: &Map<String, Value>) -> bool {
    map.get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| JSON_SCHEMA_SCALAR_TYPES.contains(&t) || t == "object" || t == "array")
}

/// `type: T` becomes `type: [T, "null"]`; schemas without a string type are left alone
fn make_nullable(prop: &mut JsonSchema) {
    if let Some(Value::String(type_name)) = prop.get("type") {
        let types = Value::Array(vec![Value::String(type_name.clone()), Value::String("null".to_string())]);
        prop.insert("type".to_string(), types);
    }
}

fn describe_path(path: &[&str]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at '{}'", path.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn compile(schema: Value) -> Value {
        Value::Object(picoschema(Some(&schema), None).unwrap().unwrap())
    }

    fn compile_with(schema: Value, resolver: &dyn SchemaResolver) -> Result<Option<JsonSchema>> {
        picoschema(Some(&schema), Some(resolver))
    }

    proptest! {
        #[test]
        fn prop_scalar_types_compile_to_type(idx in 0usize..5) {
            let scalar = JSON_SCHEMA_SCALAR_TYPES[idx];
            prop_assert_eq!(compile(json!(scalar)), json!({"type": scalar}));
        }

        #[test]
        fn prop_description_is_attached(idx in 0usize..6, desc in "[A-Za-z][A-Za-z0-9 ]{0,20}[A-Za-z0-9]") {
            let scalar = JSON_SCHEMA_SCALAR_TYPES[idx];
            let out = compile(json!(format!("{}, {}", scalar, desc)));
            prop_assert_eq!(out.get("description"), Some(&json!(desc)));
        }
    }

    #[test]
    fn test_none_and_null_compile_to_none() {
        assert!(picoschema(None, None).unwrap().is_none());
        assert!(picoschema(Some(&Value::Null), None).unwrap().is_none());
    }

    #[test]
    fn test_any_is_empty_schema() {
        assert_eq!(compile(json!("any")), json!({}));
        assert_eq!(compile(json!("any, whatever")), json!({"description": "whatever"}));
    }

    #[test]
    fn test_simple_object() {
        assert_eq!(
            compile(json!({"name": "string"})),
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_array_field() {
        assert_eq!(
            compile(json!({"names(array)": "string"})),
            json!({
                "type": "object",
                "properties": {"names": {"type": ["array"], "items": {"type": "string"}}},
                "required": ["names"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_optional_array_with_description() {
        let out = compile(json!({"tags?(array, list of tags)": "string"}));
        assert_eq!(
            out["properties"]["tags"],
            json!({"type": ["array", "null"], "items": {"type": "string"}, "description": "list of tags"})
        );
        assert!(out.get("required").is_none());
    }

    #[test]
    fn test_enum_field() {
        let out = compile(json!({"status(enum)": ["active", "inactive"]}));
        assert_eq!(out["properties"]["status"], json!({"enum": ["active", "inactive"]}));
        assert_eq!(out["required"], json!(["status"]));
    }

    #[test]
    fn test_optional_enum_appends_null_once() {
        let out = compile(json!({"status?(enum)": ["a", "b"]}));
        assert_eq!(out["properties"]["status"], json!({"enum": ["a", "b", null]}));

        let out = compile(json!({"status?(enum)": ["a", null]}));
        assert_eq!(out["properties"]["status"], json!({"enum": ["a", null]}));
    }

    #[test]
    fn test_enum_requires_list() {
        let err = picoschema(Some(&json!({"status(enum)": "active"})), None).unwrap_err();
        assert!(matches!(err, DotpromptError::InvalidSchema(_)));
    }

    #[test]
    fn test_optional_scalar_is_nullable() {
        let out = compile(json!({"nick?": "string"}));
        assert_eq!(out["properties"]["nick"], json!({"type": ["string", "null"]}));
        assert!(out.get("required").is_none());
    }

    #[test]
    fn test_optional_any_has_no_type() {
        let out = compile(json!({"blob?": "any"}));
        assert_eq!(out["properties"]["blob"], json!({}));
    }

    #[test]
    fn test_nested_object_with_description() {
        let out = compile(json!({
            "address(object, the address)": {
                "city": "string",
                "zip?": "string, postal code"
            }
        }));
        assert_eq!(
            out["properties"]["address"],
            json!({
                "type": "object",
                "description": "the address",
                "properties": {
                    "city": {"type": "string"},
                    "zip": {"type": ["string", "null"], "description": "postal code"}
                },
                "required": ["city"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn test_optional_object_is_nullable() {
        let out = compile(json!({"meta?(object)": {"k": "string"}}));
        assert_eq!(out["properties"]["meta"]["type"], json!(["object", "null"]));
    }

    #[test]
    fn test_wildcard_sets_additional_properties() {
        let out = compile(json!({"(*)": "string"}));
        assert_eq!(
            out,
            json!({"type": "object", "properties": {}, "additionalProperties": {"type": "string"}})
        );
    }

    #[test]
    fn test_json_schema_passes_through() {
        let schema = json!({"type": "object", "properties": {"x": {"type": "string"}}, "required": []});
        assert_eq!(compile(schema.clone()), schema);

        let schema = json!({"type": "array", "items": {"type": "number"}});
        assert_eq!(compile(schema.clone()), schema);
    }

    #[test]
    fn test_properties_without_type_gets_object_type() {
        let out = compile(json!({"properties": {"x": {"type": "string"}}}));
        assert_eq!(out, json!({"type": "object", "properties": {"x": {"type": "string"}}}));
    }

    #[test]
    fn test_unknown_parenthetical_fails() {
        let err = picoschema(Some(&json!({"x(tuple)": "string"})), None).unwrap_err();
        match err {
            DotpromptError::InvalidParenthetical { kind } => assert_eq!(kind, "tuple"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_string_leaf_fails() {
        let err = picoschema(Some(&json!({"count": 5})), None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("only consists of objects and strings"));
        assert!(msg.contains("count"));
    }

    #[test]
    fn test_unresolvable_named_type_without_resolver() {
        let err = picoschema(Some(&json!("FooType")), None).unwrap_err();
        assert!(matches!(err, DotpromptError::UnsupportedType { .. }));
        assert!(err.to_string().contains("FooType"));
    }

    #[test]
    fn test_named_type_resolver_returns_nothing() {
        let resolver = |_: &str| -> std::result::Result<Option<JsonSchema>, BoxError> { Ok(None) };
        let err = compile_with(json!({"foo": "FooType"}), &resolver).unwrap_err();
        match err {
            DotpromptError::SchemaNotFound { name } => assert_eq!(name, "FooType"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_named_type_resolves_with_description() {
        let resolver = |name: &str| -> std::result::Result<Option<JsonSchema>, BoxError> {
            assert_eq!(name, "Address");
            Ok(json!({"type": "object", "properties": {"city": {"type": "string"}}})
                .as_object()
                .cloned())
        };

        let out = compile_with(json!({"home": "Address, where they live"}), &resolver)
            .unwrap()
            .unwrap();
        assert_eq!(
            out["properties"]["home"],
            json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "description": "where they live"
            })
        );
    }

    #[test]
    fn test_resolver_error_propagates() {
        let resolver = |_: &str| -> std::result::Result<Option<JsonSchema>, BoxError> { Err("offline".into()) };
        let err = compile_with(json!("Remote"), &resolver).unwrap_err();
        assert!(matches!(err, DotpromptError::Resolver { kind: "schema", .. }));
    }

    #[test]
    fn test_extract_description() {
        assert_eq!(extract_description("string"), ("string", None));
        assert_eq!(extract_description("string, a name"), ("string", Some("a name")));
        assert_eq!(extract_description("string,  a, b"), ("string", Some("a, b")));
        assert_eq!(extract_description("string,"), ("string", None));
    }
}
