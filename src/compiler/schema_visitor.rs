//! Compiles an OpenAPI schema, optionally merged with an example value,
//! into a [`PayloadTree`].
//!
//! References are resolved before dispatch and `allOf` subschemas are
//! inlined into the surrounding object. Example values pin leaves to
//! constants (or seed fuzzables, depending on configuration); properties a
//! JSON-object example does not mention are omitted. Recursive schemas are
//! cut off with an empty string leaf, and a configurable property depth cap
//! truncates the tree.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    sync::Mutex,
};

use oas3::spec::{ObjectOrReference, ObjectSchema, Schema, SchemaType, SchemaTypeSet};
use serde_json::Value;

use crate::{
    dictionary::MutationsDictionary,
    payload::{
        format_example_value, FuzzingPayload, InnerProperty, LeafProperty, NestedType,
        PayloadTree, PrimitiveType,
    },
};

/// How the visitor treats examples and how deep it descends.
#[derive(Clone, Copy, Debug, Default)]
pub struct VisitorConfig {
    /// Emit fuzzable payloads seeded with the example instead of pinning
    /// constants.
    pub generate_fuzzable_payloads_for_examples: bool,
    /// Record the parameter name on every fuzzable leaf.
    pub track_fuzzed_parameter_names: bool,
    /// Nested properties beyond this depth are dropped.
    pub json_property_max_depth: Option<usize>,
}

/// Caches subtrees produced for `$ref` schemas visited without an example.
/// Shared across the parallel collection phases; inserts serialize behind
/// the lock.
#[derive(Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<CacheKey, Option<PayloadTree>>>,
}

type CacheKey = (String, usize, bool);

impl SchemaCache {
    fn get(&self, key: &CacheKey) -> Option<Option<PayloadTree>> {
        self.entries.lock().expect("schema cache poisoned").get(key).cloned()
    }

    fn insert(&self, key: CacheKey, value: Option<PayloadTree>) {
        self.entries
            .lock()
            .expect("schema cache poisoned")
            .insert(key, value);
    }
}

#[derive(Debug)]
pub enum VisitError {
    /// The schema's base type cannot be fuzzed.
    UnsupportedType(String),
    /// The recursion guard triggered while an example value was active.
    UnsupportedRecursiveExample(String),
}

impl Display for VisitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitError::UnsupportedType(detail) => write!(f, "unsupported type: {detail}"),
            VisitError::UnsupportedRecursiveExample(detail) => {
                write!(f, "example value for recursive schema {detail} is not supported")
            }
        }
    }
}

impl std::error::Error for VisitError {}

/// The maximum number of example elements expanded for an array schema.
const MAX_ARRAY_EXAMPLE_ELEMENTS: usize = 5;

pub struct SchemaVisitor<'a> {
    spec: &'a oas3::Spec,
    dictionary: &'a MutationsDictionary,
    config: VisitorConfig,
    cache: &'a SchemaCache,
}

impl<'a> SchemaVisitor<'a> {
    pub fn new(
        spec: &'a oas3::Spec,
        dictionary: &'a MutationsDictionary,
        config: VisitorConfig,
        cache: &'a SchemaCache,
    ) -> Self {
        Self {
            spec,
            dictionary,
            config,
            cache,
        }
    }

    /// Visits a schema as the root of a payload tree. Returns `None` when
    /// the whole tree was truncated away.
    pub fn visit(
        &self,
        schema: &ObjectOrReference<ObjectSchema>,
        example: Option<&Value>,
    ) -> Result<Option<PayloadTree>, VisitError> {
        self.visit_node(schema, example, "", true, &mut Vec::new(), 0)
    }

    fn visit_node(
        &self,
        schema: &ObjectOrReference<ObjectSchema>,
        example: Option<&Value>,
        name: &str,
        required: bool,
        ancestors: &mut Vec<String>,
        depth: usize,
    ) -> Result<Option<PayloadTree>, VisitError> {
        if let Some(max_depth) = self.config.json_property_max_depth
            && depth > max_depth
        {
            return Ok(None);
        }

        let ref_path = match schema {
            ObjectOrReference::Ref { ref_path, .. } => Some(ref_path.clone()),
            ObjectOrReference::Object(_) => None,
        };

        // Recursion guard: a schema that contains itself is cut off with an
        // empty string leaf. With an example active the cut-off loses
        // information, which is logged.
        if let Some(ref_path) = &ref_path
            && ancestors.contains(ref_path)
        {
            if example.is_some() {
                log::warn!(
                    "{}",
                    VisitError::UnsupportedRecursiveExample(ref_path.clone())
                );
            }
            return Ok(Some(self.empty_string_leaf(name, required)));
        }

        let cache_key = ref_path.as_ref().map(|ref_path| {
            (
                ref_path.clone(),
                self.config
                    .json_property_max_depth
                    .map(|max| max.saturating_sub(depth))
                    .unwrap_or(usize::MAX),
                self.config.generate_fuzzable_payloads_for_examples,
            )
        });
        if example.is_none()
            && name.is_empty()
            && let Some(key) = &cache_key
            && let Some(cached) = self.cache.get(key)
        {
            return Ok(cached);
        }

        let resolved = schema.resolve(self.spec).map_err(|err| {
            VisitError::UnsupportedType(format!("unresolvable schema reference: {err}"))
        })?;

        if let Some(ref_path) = &ref_path {
            ancestors.push(ref_path.clone());
        }
        let result = self.visit_resolved(&resolved, example, name, required, ancestors, depth);
        if ref_path.is_some() {
            ancestors.pop();
        }

        if example.is_none()
            && name.is_empty()
            && let (Some(key), Ok(tree)) = (cache_key, &result)
        {
            self.cache.insert(key, tree.clone());
        }
        result
    }

    fn visit_resolved(
        &self,
        schema: &ObjectSchema,
        example: Option<&Value>,
        name: &str,
        required: bool,
        ancestors: &mut Vec<String>,
        depth: usize,
    ) -> Result<Option<PayloadTree>, VisitError> {
        let read_only = schema.read_only.unwrap_or(false);
        match declared_type(schema) {
            Some(SchemaType::Object) | None if !schema.all_of.is_empty() || is_object_like(schema) => {
                self.visit_object(schema, example, name, required, read_only, ancestors, depth)
            }
            Some(SchemaType::Array) => {
                self.visit_array(schema, example, name, required, read_only, ancestors, depth)
            }
            Some(SchemaType::Object) | None => {
                // A typeless or property-less object schema compiles to a
                // single fuzzable object leaf.
                Ok(Some(self.leaf(
                    name,
                    PrimitiveType::Object,
                    schema,
                    example,
                    required,
                    read_only,
                )))
            }
            Some(SchemaType::String) => Ok(Some(self.primitive_leaf(
                "string", schema, example, name, required, read_only,
            )?)),
            Some(SchemaType::Number) => Ok(Some(self.primitive_leaf(
                "number", schema, example, name, required, read_only,
            )?)),
            Some(SchemaType::Integer) => Ok(Some(self.primitive_leaf(
                "integer", schema, example, name, required, read_only,
            )?)),
            Some(SchemaType::Boolean) => Ok(Some(self.primitive_leaf(
                "boolean", schema, example, name, required, read_only,
            )?)),
            Some(SchemaType::Null) => Err(VisitError::UnsupportedType(format!(
                "schema {name:?} declares type null, which cannot be fuzzed"
            ))),
        }
    }

    fn visit_object(
        &self,
        schema: &ObjectSchema,
        example: Option<&Value>,
        name: &str,
        required: bool,
        read_only: bool,
        ancestors: &mut Vec<String>,
        depth: usize,
    ) -> Result<Option<PayloadTree>, VisitError> {
        let example_object = match example {
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                log::warn!(
                    "example for object property {name:?} is not a JSON object, dropping it: {other}"
                );
                None
            }
            None => None,
        };

        let mut children = Vec::new();
        // Declared properties come first, then allOf contributions, in
        // document order.
        self.collect_object_children(schema, example_object, ancestors, depth, &mut children)?;

        Ok(Some(PayloadTree::Inner(InnerProperty {
            name: name.to_owned(),
            payload: None,
            kind: NestedType::Object,
            is_required: required,
            is_read_only: read_only,
            children,
        })))
    }

    fn collect_object_children(
        &self,
        schema: &ObjectSchema,
        example_object: Option<&serde_json::Map<String, Value>>,
        ancestors: &mut Vec<String>,
        depth: usize,
        children: &mut Vec<PayloadTree>,
    ) -> Result<(), VisitError> {
        for (property_name, property_schema) in &schema.properties {
            let property_example = match example_object {
                Some(map) => match map.get(property_name) {
                    Some(value) => Some(value),
                    // Properties the example does not mention are omitted.
                    None => continue,
                },
                None => None,
            };
            let property_required = schema.required.contains(property_name);
            if let Some(child) = self.visit_node(
                property_schema,
                property_example,
                property_name,
                property_required,
                ancestors,
                depth + 1,
            )? {
                children.push(child);
            }
        }
        for subschema in &schema.all_of {
            let resolved = subschema.resolve(self.spec).map_err(|err| {
                VisitError::UnsupportedType(format!("unresolvable allOf reference: {err}"))
            })?;
            if let ObjectOrReference::Ref { ref_path, .. } = subschema {
                if ancestors.contains(ref_path) {
                    continue;
                }
                ancestors.push(ref_path.clone());
                let result =
                    self.collect_object_children(&resolved, example_object, ancestors, depth, children);
                ancestors.pop();
                result?;
            } else {
                self.collect_object_children(&resolved, example_object, ancestors, depth, children)?;
            }
        }
        Ok(())
    }

    fn visit_array(
        &self,
        schema: &ObjectSchema,
        example: Option<&Value>,
        name: &str,
        required: bool,
        read_only: bool,
        ancestors: &mut Vec<String>,
        depth: usize,
    ) -> Result<Option<PayloadTree>, VisitError> {
        let items = schema.items.as_deref();

        let mut children = Vec::new();
        if let Some(Value::Array(elements)) = example {
            for element in elements.iter().take(MAX_ARRAY_EXAMPLE_ELEMENTS) {
                match self.visit_items(items, Some(element), ancestors, depth) {
                    Ok(Some(child)) => children.push(child),
                    Ok(None) => {}
                    Err(err) => {
                        // An element that does not fit the item schema voids
                        // the example; fall back to the plain single-child
                        // form.
                        log::warn!("array example element dropped for {name:?}: {err}");
                        children.clear();
                        break;
                    }
                }
            }
        }
        if children.is_empty()
            && let Some(child) = self.visit_items(items, None, ancestors, depth)?
        {
            children.push(child);
        }

        Ok(Some(PayloadTree::Inner(InnerProperty {
            name: name.to_owned(),
            payload: None,
            kind: NestedType::Array,
            is_required: required,
            is_read_only: read_only,
            children,
        })))
    }

    fn visit_items(
        &self,
        items: Option<&Schema>,
        example: Option<&Value>,
        ancestors: &mut Vec<String>,
        depth: usize,
    ) -> Result<Option<PayloadTree>, VisitError> {
        match items {
            Some(Schema::Object(ref_or_schema)) => {
                self.visit_node(ref_or_schema, example, "", true, ancestors, depth + 1)
            }
            // A boolean item schema carries no structure; `true` admits
            // anything, `false` admits nothing. Both become a plain leaf.
            Some(Schema::Boolean(_)) | None => {
                Ok(Some(self.empty_string_leaf("", true)))
            }
        }
    }

    fn primitive_leaf(
        &self,
        base_type: &str,
        schema: &ObjectSchema,
        example: Option<&Value>,
        name: &str,
        required: bool,
        read_only: bool,
    ) -> Result<PayloadTree, VisitError> {
        let primitive_type = PrimitiveType::from_type_and_format(base_type, schema.format.as_deref())
            .ok_or_else(|| {
                VisitError::UnsupportedType(format!("type {base_type:?} of {name:?}"))
            })?;
        let primitive_type = if schema.enum_values.is_empty() {
            primitive_type
        } else {
            PrimitiveType::Enum {
                underlying_type: Box::new(primitive_type),
                values: schema.enum_values.iter().map(format_example_value).collect(),
                default: schema.default.as_ref().map(format_example_value),
            }
        };
        Ok(self.leaf(name, primitive_type, schema, example, required, read_only))
    }

    fn leaf(
        &self,
        name: &str,
        primitive_type: PrimitiveType,
        schema: &ObjectSchema,
        example: Option<&Value>,
        required: bool,
        read_only: bool,
    ) -> PayloadTree {
        let payload = match example {
            Some(value) if !self.config.generate_fuzzable_payloads_for_examples => {
                FuzzingPayload::Constant {
                    primitive_type,
                    value: format_example_value(value),
                }
            }
            _ => {
                let default_value = match (example, &primitive_type) {
                    (Some(value), _) => format_example_value(value),
                    // Enums are seeded with their first value; the schema
                    // default travels inside the enum type.
                    (None, PrimitiveType::Enum { values, .. }) => {
                        values.first().cloned().unwrap_or_default()
                    }
                    (None, _) => match &schema.default {
                        Some(default) => format_example_value(default),
                        None => self.dictionary.default_value(&primitive_type),
                    },
                };
                FuzzingPayload::Fuzzable {
                    primitive_type,
                    default_value,
                    example_value: example.map(format_example_value),
                    parameter_name: self
                        .config
                        .track_fuzzed_parameter_names
                        .then(|| name.to_owned())
                        .filter(|tracked| !tracked.is_empty()),
                    dynamic_object: None,
                }
            }
        };
        PayloadTree::Leaf(LeafProperty {
            name: name.to_owned(),
            payload,
            is_required: required,
            is_read_only: read_only,
        })
    }

    fn empty_string_leaf(&self, name: &str, required: bool) -> PayloadTree {
        PayloadTree::Leaf(LeafProperty {
            name: name.to_owned(),
            payload: FuzzingPayload::Fuzzable {
                primitive_type: PrimitiveType::String,
                default_value: String::new(),
                example_value: None,
                parameter_name: None,
                dynamic_object: None,
            },
            is_required: required,
            is_read_only: false,
        })
    }
}

fn declared_type(schema: &ObjectSchema) -> Option<SchemaType> {
    match &schema.schema_type {
        Some(SchemaTypeSet::Single(single)) => Some(*single),
        Some(SchemaTypeSet::Multiple(types)) => types
            .iter()
            .copied()
            .find(|schema_type| *schema_type != SchemaType::Null)
            .or(Some(SchemaType::Null)),
        None => None,
    }
}

fn is_object_like(schema: &ObjectSchema) -> bool {
    !schema.properties.is_empty()
}
