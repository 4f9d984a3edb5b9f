//! Recursive schema and example construction.
//!
//! The heart of the engine: turns a lowered expression into a JSON-schema
//! shaped [`Schema`] plus a representative example value. Struct fields are
//! shaped by their serialization attributes, recursion through
//! self-referential types is cut by a visited set, and every unresolvable
//! corner degrades to a generic schema instead of failing.

use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::catalog::{FieldDecl, StructDecl, TypeCatalog};
use crate::expr::{Expr, Lit};
use crate::resolver::Scope;

const EXAMPLE_DATE_TIME: &str = "2024-01-01T00:00:00Z";
const EXAMPLE_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// A JSON-schema shaped descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<Schema>>,
}

impl Schema {
    pub fn of(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            format: None,
            description: None,
            properties: None,
            required: None,
            items: None,
            additional_properties: None,
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    fn object() -> Self {
        Self::of("object")
    }
}

/// Builds schemas and examples against one directory's type catalog and
/// one handler body's scope.
pub struct SchemaBuilder<'a> {
    catalog: &'a TypeCatalog,
    scope: &'a Scope,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(catalog: &'a TypeCatalog, scope: &'a Scope) -> Self {
        Self { catalog, scope }
    }

    /// Builds schema and example for an expression, returning `None` when
    /// nothing resolvable remains.
    pub fn build(&self, expr: &Expr) -> Option<(Schema, Value)> {
        let mut visited = HashSet::new();
        let (schema, example) = self.build_inner(expr, &mut visited)?;
        let example = normalize_example(&schema, example);
        Some((schema, example))
    }

    fn build_inner(&self, expr: &Expr, visited: &mut HashSet<String>) -> Option<(Schema, Value)> {
        match expr {
            Expr::Literal(lit) => Some(literal_schema(lit)),
            Expr::Pointer(inner) => self.build_inner(inner, visited),
            Expr::Ident(name) => self.build_ident(name, visited),
            Expr::Selector(segments) => self.build_selector(segments, visited),
            Expr::Array(elem) => {
                let mut schema = Schema::of("array");
                match self.build_inner(elem, visited) {
                    Some((items, item_example)) => {
                        schema.items = Some(Box::new(items));
                        Some((schema, json!([item_example])))
                    }
                    // Unresolvable element type: empty example, no items.
                    None => Some((schema, json!([]))),
                }
            }
            Expr::Map(_, value) => {
                let (value_schema, value_example) = self
                    .build_inner(value, visited)
                    .unwrap_or((Schema::object(), json!({})));
                let mut schema = Schema::object();
                schema.additional_properties = Some(Box::new(value_schema));
                Some((schema, json!({ "key": value_example })))
            }
            Expr::Any => Some((Schema::object(), json!({}))),
            Expr::Composite {
                type_path,
                fields,
                elements,
            } => self.build_composite(type_path.as_deref(), fields, elements, visited),
            Expr::Call { .. } => match self.scope.lookup_call_result(expr, self.catalog) {
                Some(result) => self.build_inner(&result, visited),
                None => {
                    trace!("Unresolved call degrades to object: {}", expr.render());
                    Some((Schema::object(), json!({})))
                }
            },
            Expr::Opaque => None,
        }
    }

    fn build_ident(&self, name: &str, visited: &mut HashSet<String>) -> Option<(Schema, Value)> {
        // Origin value first: a literal-carrying variable beats its
        // declared type for example fidelity.
        if let Some(origin) = self.scope.origin_value(name) {
            let self_reference = matches!(origin, Expr::Ident(other) if other == name);
            if !self_reference {
                if let Some(built) = self.build_inner(&origin.clone(), visited) {
                    return Some(built);
                }
            }
        }

        if let Some(ty) = self.scope.variable_type(name) {
            if ty.terminal_name() != Some(name) {
                return self.build_inner(&ty.clone(), visited);
            }
        }

        if let Some(primitive) = primitive_schema(name) {
            return Some(primitive);
        }

        if let Some(decl) = self.catalog.struct_decl(name) {
            return Some(self.build_struct(&decl.clone(), visited));
        }

        // Unresolvable names degrade to a generic string.
        Some((Schema::of("string"), json!("string")))
    }

    fn build_selector(
        &self,
        segments: &[String],
        visited: &mut HashSet<String>,
    ) -> Option<(Schema, Value)> {
        let last = segments.last().map(String::as_str)?;
        match last {
            "DateTime" | "NaiveDateTime" => Some((
                Schema::of("string").with_format("date-time"),
                json!(EXAMPLE_DATE_TIME),
            )),
            "Uuid" => Some((Schema::of("string").with_format("uuid"), json!(EXAMPLE_UUID))),
            _ => {
                if let Some(decl) = self.catalog.struct_decl(last) {
                    return Some(self.build_struct(&decl.clone(), visited));
                }
                Some((Schema::of("string"), json!("string")))
            }
        }
    }

    fn build_composite(
        &self,
        type_path: Option<&Expr>,
        fields: &[(String, Expr)],
        elements: &[Expr],
        visited: &mut HashSet<String>,
    ) -> Option<(Schema, Value)> {
        if let Some(path) = type_path {
            if let Some(decl) = path
                .terminal_name()
                .and_then(|name| self.catalog.struct_decl(name))
            {
                let decl = decl.clone();
                let (schema, mut example) = self.build_struct(&decl, visited);
                // Literal field values override the synthesized example.
                if let Value::Object(map) = &mut example {
                    for (field_name, value_expr) in fields {
                        let field_decl = decl.fields.iter().find(|f| &f.name == field_name);
                        // Skipped fields stay out; a tag-supplied example
                        // outranks the literal value.
                        if matches!(field_decl, Some(f) if f.attrs.skip || f.attrs.example.is_some())
                        {
                            continue;
                        }
                        let serialized = field_decl
                            .map(serialized_field_name)
                            .unwrap_or_else(|| lower_first(field_name));
                        if let Some((_, value)) = self.build_inner(value_expr, visited) {
                            map.insert(serialized, value);
                        }
                    }
                }
                return Some((schema, example));
            }
        }

        if !fields.is_empty() {
            // Literal with visible keys but no catalog entry: closed object.
            let mut properties = BTreeMap::new();
            let mut example = Map::new();
            for (field_name, value_expr) in fields {
                if let Some((field_schema, field_example)) =
                    self.build_inner(value_expr, visited)
                {
                    properties.insert(field_name.clone(), field_schema);
                    example.insert(field_name.clone(), field_example);
                }
            }
            let mut schema = Schema::object();
            schema.properties = Some(properties);
            return Some((schema, Value::Object(example)));
        }

        if !elements.is_empty() {
            let (items, _) = self
                .build_inner(&elements[0], visited)
                .unwrap_or((Schema::object(), json!({})));
            let examples: Vec<Value> = elements
                .iter()
                .filter_map(|elem| self.build_inner(elem, visited).map(|(_, ex)| ex))
                .collect();
            let mut schema = Schema::of("array");
            schema.items = Some(Box::new(items));
            return Some((schema, Value::Array(examples)));
        }

        Some((Schema::object(), json!({})))
    }

    /// Builds a struct's schema and a fully synthesized example.
    ///
    /// Revisiting a struct already on the recursion path yields a plain
    /// object schema, which is what terminates self-referential types. The
    /// mark is removed on return so the same struct may appear again in
    /// unrelated subtrees.
    fn build_struct(&self, decl: &StructDecl, visited: &mut HashSet<String>) -> (Schema, Value) {
        if visited.contains(&decl.name) {
            return (Schema::object(), json!({}));
        }
        visited.insert(decl.name.clone());

        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        let mut example = Map::new();

        for field in &decl.fields {
            if field.attrs.skip {
                continue;
            }

            if field.attrs.flatten {
                if let Some((flattened, flattened_example)) =
                    self.build_inner(&field.ty, visited)
                {
                    if let Some(props) = flattened.properties {
                        properties.extend(props);
                    }
                    if let Some(req) = flattened.required {
                        required.extend(req);
                    }
                    if let Value::Object(map) = flattened_example {
                        example.extend(map);
                    }
                }
                continue;
            }

            let serialized = serialized_field_name(field);

            let (mut field_schema, field_example) = self
                .build_inner(&field.ty, visited)
                .unwrap_or((Schema::of("string"), json!("string")));
            if let Some(doc) = &field.doc {
                field_schema.description = Some(doc.clone());
            }

            if field.attrs.required && !field.attrs.omit_empty {
                required.push(serialized.clone());
            }

            let example_value = match &field.attrs.example {
                Some(text) => parse_example_override(text, &field_schema),
                None => field_example,
            };
            example.insert(serialized.clone(), example_value);
            properties.insert(serialized, field_schema);
        }

        visited.remove(&decl.name);

        let mut schema = Schema::object();
        schema.properties = Some(properties);
        if !required.is_empty() {
            schema.required = Some(required);
        }
        (schema, Value::Object(example))
    }
}

/// The name a field serializes under: the `rename` attribute when present,
/// else the declared name with its first letter lowercased.
pub fn serialized_field_name(field: &FieldDecl) -> String {
    match &field.attrs.rename {
        Some(rename) => rename.clone(),
        None => lower_first(&field.name),
    }
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn literal_schema(lit: &Lit) -> (Schema, Value) {
    match lit {
        Lit::Str(s) => (Schema::of("string"), json!(s)),
        Lit::Int(n) => (Schema::of("integer").with_format("int64"), json!(n)),
        Lit::Float(n) => (Schema::of("number").with_format("double"), json!(n)),
        Lit::Bool(b) => (Schema::of("boolean"), json!(b)),
        Lit::Char(c) => (Schema::of("string"), json!(c.to_string())),
    }
}

fn primitive_schema(name: &str) -> Option<(Schema, Value)> {
    let built = match name {
        "String" | "str" | "char" => (Schema::of("string"), json!("string")),
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => {
            (Schema::of("integer").with_format("int32"), json!(0))
        }
        "i64" | "u64" | "i128" | "u128" | "isize" | "usize" => {
            (Schema::of("integer").with_format("int64"), json!(0))
        }
        "f32" => (Schema::of("number").with_format("float"), json!(0.0)),
        "f64" => (Schema::of("number").with_format("double"), json!(0.0)),
        "bool" => (Schema::of("boolean"), json!(false)),
        _ => return None,
    };
    Some(built)
}

/// Coerces a tag-supplied example to the field's schema kind. Object- and
/// array-shaped text parses as JSON; everything else coerces to the
/// primitive kind, falling back to the zero value.
fn parse_example_override(text: &str, schema: &Schema) -> Value {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return value;
        }
    }
    match schema.schema_type.as_str() {
        "integer" => trimmed.parse::<i64>().map(|n| json!(n)).unwrap_or(json!(0)),
        "number" => trimmed
            .parse::<f64>()
            .map(|n| json!(n))
            .unwrap_or(json!(0.0)),
        "boolean" => trimmed
            .parse::<bool>()
            .map(|b| json!(b))
            .unwrap_or(json!(false)),
        _ => json!(trimmed),
    }
}

/// Re-keys an example to its schema, case-insensitively, filling gaps by
/// default synthesis and recursing into arrays against the items schema.
pub fn normalize_example(schema: &Schema, example: Value) -> Value {
    match schema.schema_type.as_str() {
        "object" => match &schema.properties {
            Some(properties) => {
                let source = match example {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                let mut normalized = Map::new();
                for (prop_name, prop_schema) in properties {
                    let matched = source.iter().find_map(|(key, value)| {
                        if key.eq_ignore_ascii_case(prop_name) {
                            Some(value.clone())
                        } else {
                            None
                        }
                    });
                    let value = match matched {
                        Some(value) => normalize_example(prop_schema, value),
                        None => default_example(prop_schema),
                    };
                    normalized.insert(prop_name.clone(), value);
                }
                Value::Object(normalized)
            }
            None => example,
        },
        "array" => match (&schema.items, example) {
            (Some(items), Value::Array(elements)) => Value::Array(
                elements
                    .into_iter()
                    .map(|elem| normalize_example(items, elem))
                    .collect(),
            ),
            (_, other) => other,
        },
        _ => example,
    }
}

/// Synthesizes an example purely from a schema's shape.
pub fn default_example(schema: &Schema) -> Value {
    match schema.schema_type.as_str() {
        "string" => match schema.format.as_deref() {
            Some("date-time") => json!(EXAMPLE_DATE_TIME),
            Some("uuid") => json!(EXAMPLE_UUID),
            _ => json!("string"),
        },
        "integer" => json!(0),
        "number" => json!(0.0),
        "boolean" => json!(false),
        "array" => match &schema.items {
            Some(items) => json!([default_example(items)]),
            None => json!([]),
        },
        "object" => match &schema.properties {
            Some(properties) => {
                let map: Map<String, Value> = properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), default_example(prop)))
                    .collect();
                Value::Object(map)
            }
            None => match &schema.additional_properties {
                Some(value_schema) => json!({ "key": default_example(value_schema) }),
                None => json!({}),
            },
        },
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn catalog_from_code(code: &str) -> TypeCatalog {
        let parsed = ParsedFile {
            path: PathBuf::from("test.rs"),
            syntax_tree: syn::parse_file(code).unwrap(),
        };
        TypeCatalog::build(std::slice::from_ref(&parsed))
    }

    fn build(catalog: &TypeCatalog, expr_code: &str) -> (Schema, Value) {
        let scope = Scope::new();
        let builder = SchemaBuilder::new(catalog, &scope);
        let expr = crate::expr::lower_expr(&syn::parse_str(expr_code).unwrap());
        builder.build(&expr).unwrap()
    }

    #[test]
    fn test_struct_schema_with_attributes() {
        let catalog = catalog_from_code(
            r#"
            pub struct User {
                /// Unique identifier
                pub id: u32,
                #[serde(rename = "userName")]
                #[validate(required)]
                pub name: String,
                #[serde(skip)]
                pub secret: String,
                #[serde(skip_serializing_if = "Option::is_none")]
                #[validate(required)]
                pub nickname: Option<String>,
            }
            "#,
        );

        let scope = Scope::new();
        let builder = SchemaBuilder::new(&catalog, &scope);
        let (schema, example) = builder.build(&Expr::Ident("User".to_string())).unwrap();

        let properties = schema.properties.as_ref().unwrap();
        assert!(properties.contains_key("id"));
        assert!(properties.contains_key("userName"));
        assert!(properties.contains_key("nickname"));
        assert!(!properties.contains_key("secret"));
        assert_eq!(
            properties["id"].description.as_deref(),
            Some("Unique identifier")
        );

        // Required needs the explicit marker and no omit-if-empty escape.
        assert_eq!(schema.required, Some(vec!["userName".to_string()]));

        assert_eq!(example["id"], json!(0));
        assert_eq!(example["userName"], json!("string"));
    }

    #[test]
    fn test_self_referential_struct_terminates() {
        let catalog = catalog_from_code(
            r#"
            pub struct Node {
                pub value: i64,
                pub next: Option<Box<Node>>,
                pub children: Vec<Node>,
            }
            "#,
        );

        let (schema, example) = build(&catalog, "Node { value: 1 }");
        let properties = schema.properties.unwrap();
        // The nested occurrence collapses to a plain object.
        assert_eq!(properties["next"].schema_type, "object");
        assert!(properties["next"].properties.is_none());
        assert_eq!(properties["children"].schema_type, "array");
        assert_eq!(example["value"], json!(1));
    }

    #[test]
    fn test_literal_example_overlay() {
        let catalog = catalog_from_code(
            r#"
            pub struct User {
                pub id: u32,
                pub name: String,
            }
            "#,
        );

        let (_, example) = build(&catalog, r#"User { id: 123, name: "bob" }"#);
        assert_eq!(example["id"], json!(123));
        assert_eq!(example["name"], json!("bob"));
    }

    #[test]
    fn test_tag_example_override_beats_literal_default() {
        let catalog = catalog_from_code(
            r#"
            pub struct Item {
                #[schema(example = "42")]
                pub count: u32,
                #[schema(example = "{\"a\": 1}")]
                pub meta: Meta,
            }
            pub struct Meta { pub a: i64 }
            "#,
        );

        let scope = Scope::new();
        let builder = SchemaBuilder::new(&catalog, &scope);
        let (_, example) = builder.build(&Expr::Ident("Item".to_string())).unwrap();
        assert_eq!(example["count"], json!(42));
        assert_eq!(example["meta"]["a"], json!(1));

        // The override also outranks a literal value at the literal site.
        let (_, example) = build(&catalog, "Item { count: 7 }");
        assert_eq!(example["count"], json!(42));
    }

    #[test]
    fn test_flatten_merges_into_parent() {
        let catalog = catalog_from_code(
            r#"
            pub struct Envelope {
                pub kind: String,
                #[serde(flatten)]
                pub payload: Inner,
            }
            pub struct Inner {
                #[validate(required)]
                pub body: String,
            }
            "#,
        );

        let scope = Scope::new();
        let builder = SchemaBuilder::new(&catalog, &scope);
        let (schema, example) = builder.build(&Expr::Ident("Envelope".to_string())).unwrap();

        let properties = schema.properties.unwrap();
        assert!(properties.contains_key("kind"));
        assert!(properties.contains_key("body"));
        assert!(!properties.contains_key("payload"));
        assert_eq!(schema.required, Some(vec!["body".to_string()]));
        assert_eq!(example["body"], json!("string"));
    }

    #[test]
    fn test_collection_and_map_schemas() {
        let catalog = TypeCatalog::default();
        let scope = Scope::new();
        let builder = SchemaBuilder::new(&catalog, &scope);

        let (schema, example) = builder
            .build(&Expr::Array(Box::new(Expr::Ident("u32".to_string()))))
            .unwrap();
        assert_eq!(schema.schema_type, "array");
        assert_eq!(schema.items.unwrap().schema_type, "integer");
        assert_eq!(example, json!([0]));

        let (schema, example) = builder
            .build(&Expr::Map(
                Box::new(Expr::Ident("String".to_string())),
                Box::new(Expr::Ident("bool".to_string())),
            ))
            .unwrap();
        assert_eq!(schema.schema_type, "object");
        assert_eq!(
            schema.additional_properties.unwrap().schema_type,
            "boolean"
        );
        assert_eq!(example, json!({ "key": false }));
    }

    #[test]
    fn test_array_of_unresolvable_element_has_empty_example() {
        let catalog = TypeCatalog::default();
        let scope = Scope::new();
        let builder = SchemaBuilder::new(&catalog, &scope);

        let (schema, example) = builder
            .build(&Expr::Array(Box::new(Expr::Opaque)))
            .unwrap();
        assert_eq!(schema.schema_type, "array");
        assert!(schema.items.is_none());
        assert_eq!(example, json!([]));
    }

    #[test]
    fn test_well_known_external_types() {
        let catalog = TypeCatalog::default();
        let scope = Scope::new();
        let builder = SchemaBuilder::new(&catalog, &scope);

        let (schema, example) = builder
            .build(&Expr::Selector(vec![
                "chrono".to_string(),
                "DateTime".to_string(),
            ]))
            .unwrap();
        assert_eq!(schema.format.as_deref(), Some("date-time"));
        assert_eq!(example, json!(EXAMPLE_DATE_TIME));

        let (schema, _) = builder
            .build(&Expr::Selector(vec!["uuid".to_string(), "Uuid".to_string()]))
            .unwrap();
        assert_eq!(schema.format.as_deref(), Some("uuid"));
    }

    #[test]
    fn test_normalize_rekeys_case_insensitively() {
        let mut schema = Schema::object();
        let mut properties = BTreeMap::new();
        properties.insert("userName".to_string(), Schema::of("string"));
        properties.insert("age".to_string(), Schema::of("integer"));
        schema.properties = Some(properties);

        let normalized = normalize_example(&schema, json!({ "username": "bob" }));
        assert_eq!(normalized, json!({ "userName": "bob", "age": 0 }));
    }

    #[test]
    fn test_default_example_synthesis() {
        let mut array = Schema::of("array");
        array.items = Some(Box::new(Schema::of("integer")));
        assert_eq!(default_example(&array), json!([0]));

        assert_eq!(
            default_example(&Schema::of("string").with_format("uuid")),
            json!(EXAMPLE_UUID)
        );
        assert_eq!(default_example(&Schema::of("boolean")), json!(false));
    }
}
