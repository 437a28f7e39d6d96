//! Collects the declared parameters of one operation into payload lists,
//! one per payload source: the schema-derived list, plus one list per
//! applicable example payload.
//!
//! Path parameters keep only names that actually appear in the endpoint
//! template, and array-valued path parameters are dropped. Query and header
//! parameters accept only form and simple serialization. The body comes
//! from the first JSON-like content entry; `Content-Type` declared as a
//! parameter is never honored.

use oas3::spec::{
    MediaTypeExamples, ObjectOrReference, ObjectSchema, Parameter, ParameterIn, ParameterStyle,
};
use serde_json::Value;

use crate::{
    compiler::schema_visitor::{SchemaCache, SchemaVisitor, VisitorConfig},
    dictionary::MutationsDictionary,
    grammar::{
        ParameterPayload, ParameterPayloadSource, ParameterSerialization, RequestParameter,
        RequestParameters,
    },
    openapi::{JsonContent, QualifiedOperation},
    payload::{FuzzingPayload, PayloadTree, PrimitiveType},
    payload_examples::NamedExample,
};

pub const BODY_EXAMPLE_KEY: &str = "__body__";

/// Which example payloads are merged per parameter kind, and how optional
/// parameters are treated.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollectorOptions {
    pub use_path_examples: bool,
    pub use_query_examples: bool,
    pub use_header_examples: bool,
    pub use_body_examples: bool,
    pub use_all_example_payloads: bool,
    pub data_fuzzing: bool,
    pub include_optional_parameters: bool,
    pub read_only_fuzz: bool,
}

pub struct ParameterCollector<'a> {
    spec: &'a oas3::Spec,
    dictionary: &'a MutationsDictionary,
    visitor_config: VisitorConfig,
    options: CollectorOptions,
    cache: &'a SchemaCache,
}

impl<'a> ParameterCollector<'a> {
    pub fn new(
        spec: &'a oas3::Spec,
        dictionary: &'a MutationsDictionary,
        visitor_config: VisitorConfig,
        options: CollectorOptions,
        cache: &'a SchemaCache,
    ) -> Self {
        Self {
            spec,
            dictionary,
            visitor_config,
            options,
            cache,
        }
    }

    fn visitor(&self) -> SchemaVisitor<'a> {
        SchemaVisitor::new(self.spec, self.dictionary, self.visitor_config, self.cache)
    }

    /// Collects all four parameter categories of one operation.
    pub fn collect(
        &self,
        qualified: &QualifiedOperation<'_>,
        user_examples: &[NamedExample],
    ) -> RequestParameters {
        let parameters: Vec<Parameter> = qualified
            .operation
            .parameters
            .iter()
            .filter_map(|ref_or_param| ref_or_param.resolve(self.spec).ok())
            .collect();

        RequestParameters {
            path: self.collect_path(qualified, &parameters),
            query: self.collect_named_kind(
                qualified,
                &parameters,
                ParameterIn::Query,
                self.options.use_query_examples,
                user_examples,
            ),
            header: self.collect_named_kind(
                qualified,
                &parameters,
                ParameterIn::Header,
                self.options.use_header_examples,
                user_examples,
            ),
            body: self.collect_body(qualified, user_examples),
        }
    }

    /// The single schema-derived path parameter list.
    fn collect_path(
        &self,
        qualified: &QualifiedOperation<'_>,
        parameters: &[Parameter],
    ) -> Vec<RequestParameter> {
        let declared_in_template = template_parameter_names(qualified.id.rendered_endpoint());
        let mut list = Vec::new();
        for parameter in parameters {
            if parameter.location != ParameterIn::Path {
                continue;
            }
            if !declared_in_template.iter().any(|name| name == &parameter.name) {
                log::warn!(
                    "path parameter {} of {} does not appear in the endpoint, dropping it",
                    parameter.name,
                    qualified.id
                );
                continue;
            }
            let example = self
                .options
                .use_path_examples
                .then(|| spec_parameter_example(self.spec, parameter))
                .flatten();
            match self.parameter_payload(parameter, example.as_ref()) {
                Some(request_parameter) => {
                    if matches!(&request_parameter.payload, PayloadTree::Inner(inner)
                        if inner.kind == crate::payload::NestedType::Array)
                    {
                        log::warn!(
                            "path parameter {} of {} is array-valued, dropping it",
                            parameter.name,
                            qualified.id
                        );
                        continue;
                    }
                    list.push(request_parameter);
                }
                None => continue,
            }
        }
        list
    }

    /// Query or header parameters: the schema list plus example lists.
    fn collect_named_kind(
        &self,
        qualified: &QualifiedOperation<'_>,
        parameters: &[Parameter],
        location: ParameterIn,
        use_examples: bool,
        user_examples: &[NamedExample],
    ) -> Vec<(ParameterPayloadSource, Vec<RequestParameter>)> {
        let declared: Vec<&Parameter> = parameters
            .iter()
            .filter(|parameter| parameter.location == location)
            .filter(|parameter| {
                // Content-Type is always synthesized during assembly.
                location != ParameterIn::Header
                    || !parameter.name.eq_ignore_ascii_case("content-type")
            })
            .filter(|parameter| {
                self.options.include_optional_parameters || parameter.required.unwrap_or(false)
            })
            .collect();

        let schema_list: Vec<RequestParameter> = declared
            .iter()
            .filter_map(|parameter| {
                let example = use_examples
                    .then(|| spec_parameter_example(self.spec, parameter))
                    .flatten();
                self.parameter_payload(parameter, example.as_ref())
            })
            .collect();

        let mut example_lists = Vec::new();
        if use_examples {
            for named in user_examples {
                let mut list = Vec::new();
                for parameter in &declared {
                    // Names the example does not mention are left out of the
                    // example-derived list; undeclared names in the example
                    // are silently dropped.
                    if let Some(value) = named.parameters.get(&parameter.name)
                        && let Some(request_parameter) =
                            self.parameter_payload(parameter, Some(value))
                    {
                        list.push(request_parameter);
                    }
                }
                if !list.is_empty() {
                    example_lists.push(list);
                }
            }
        }

        log::debug!(
            "collected {} declared {:?} parameters for {}",
            declared.len(),
            location,
            qualified.id
        );
        assemble_sources(
            schema_list,
            example_lists,
            self.options.data_fuzzing,
            self.options.use_all_example_payloads,
        )
    }

    /// One declared parameter compiled to a payload tree.
    fn parameter_payload(
        &self,
        parameter: &Parameter,
        example: Option<&Value>,
    ) -> Option<RequestParameter> {
        let serialization = match parameter_serialization(parameter) {
            Ok(serialization) => serialization,
            Err(style) => {
                log::warn!(
                    "parameter {} uses unsupported serialization {style:?}, dropping it",
                    parameter.name
                );
                return None;
            }
        };
        let schema = parameter_schema(parameter);
        let tree = match &schema {
            Some(ref_or_schema) => match self.visitor().visit(ref_or_schema, example) {
                Ok(Some(mut tree)) => {
                    rename_root(&mut tree, &parameter.name);
                    set_required(&mut tree, parameter.required.unwrap_or(false));
                    tree
                }
                Ok(None) => return None,
                Err(err) => {
                    log::warn!("parameter {} dropped: {err}", parameter.name);
                    return None;
                }
            },
            // A parameter without schema or content is an untyped string.
            None => PayloadTree::Leaf(crate::payload::LeafProperty {
                name: parameter.name.clone(),
                payload: FuzzingPayload::Fuzzable {
                    primitive_type: PrimitiveType::String,
                    default_value: self.dictionary.default_value(&PrimitiveType::String),
                    example_value: None,
                    parameter_name: None,
                    dynamic_object: None,
                },
                is_required: parameter.required.unwrap_or(false),
                is_read_only: false,
            }),
        };
        Some(RequestParameter {
            name: parameter.name.clone(),
            payload: tree,
            serialization,
        })
    }

    /// The body lists: a schema entry from the first JSON content plus
    /// example entries.
    fn collect_body(
        &self,
        qualified: &QualifiedOperation<'_>,
        user_examples: &[NamedExample],
    ) -> Vec<(ParameterPayloadSource, ParameterPayload)> {
        let Some(body) = qualified
            .operation
            .request_body
            .as_ref()
            .and_then(|ref_or_body| ref_or_body.resolve(self.spec).ok())
        else {
            return Vec::new();
        };
        let Some(media_type) = body.content.get_json_content() else {
            if !body.content.is_empty() {
                log::warn!("request body of {} has no JSON content, skipping it", qualified.id);
            }
            return Vec::new();
        };
        let Some(schema) = media_type.schema.as_ref() else {
            return Vec::new();
        };
        let required = body.required.unwrap_or(false);

        let schema_entry = match self.visitor().visit(schema, None) {
            Ok(Some(mut tree)) => {
                if !self.options.read_only_fuzz {
                    prune_read_only(&mut tree);
                }
                set_required(&mut tree, required);
                Some(ParameterPayload::List(vec![RequestParameter {
                    name: String::new(),
                    payload: tree,
                    serialization: None,
                }]))
            }
            Ok(None) => None,
            Err(err) => {
                log::warn!("request body of {} dropped: {err}", qualified.id);
                None
            }
        };

        let mut example_entries: Vec<ParameterPayload> = Vec::new();
        if self.options.use_body_examples {
            for named in user_examples {
                let Some(value) = named.parameters.get(BODY_EXAMPLE_KEY) else {
                    continue;
                };
                if named.exact_copy {
                    // A verbatim example is carried as-is, not re-derived
                    // from the schema.
                    example_entries.push(ParameterPayload::Example(FuzzingPayload::Constant {
                        primitive_type: PrimitiveType::Object,
                        value: value.to_string(),
                    }));
                    continue;
                }
                match self.visitor().visit(schema, Some(value)) {
                    Ok(Some(mut tree)) => {
                        set_required(&mut tree, required);
                        example_entries.push(ParameterPayload::List(vec![RequestParameter {
                            name: String::new(),
                            payload: tree,
                            serialization: None,
                        }]));
                    }
                    Ok(None) => {}
                    Err(err) => {
                        log::warn!("body example {} of {} dropped: {err}", named.name, qualified.id)
                    }
                }
            }
            // Spec-embedded media type examples come after user examples.
            for value in media_type_examples(self.spec, media_type) {
                if let Ok(Some(mut tree)) = self.visitor().visit(schema, Some(&value)) {
                    set_required(&mut tree, required);
                    example_entries.push(ParameterPayload::List(vec![RequestParameter {
                        name: String::new(),
                        payload: tree,
                        serialization: None,
                    }]));
                }
            }
        }

        let mut result = Vec::new();
        let emit_schema = self.options.data_fuzzing
            || example_entries.is_empty()
            || self.options.use_all_example_payloads;
        if emit_schema && let Some(entry) = schema_entry {
            result.push((ParameterPayloadSource::Schema, entry));
        }
        if !example_entries.is_empty() && (!self.options.data_fuzzing || self.options.use_all_example_payloads) {
            for entry in example_entries {
                result.push((ParameterPayloadSource::Examples, entry));
            }
        }
        result
    }
}

/// Applies the example-or-schema decision matrix to one category.
fn assemble_sources(
    schema_list: Vec<RequestParameter>,
    example_lists: Vec<Vec<RequestParameter>>,
    data_fuzzing: bool,
    use_all_example_payloads: bool,
) -> Vec<(ParameterPayloadSource, Vec<RequestParameter>)> {
    let mut result = Vec::new();
    let emit_schema = data_fuzzing || example_lists.is_empty() || use_all_example_payloads;
    if emit_schema {
        result.push((ParameterPayloadSource::Schema, schema_list));
    }
    if !example_lists.is_empty() && (!data_fuzzing || use_all_example_payloads) {
        for list in example_lists {
            result.push((ParameterPayloadSource::Examples, list));
        }
    }
    result
}

/// The names inside `{…}` braces of an endpoint template.
pub fn template_parameter_names(endpoint: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = endpoint;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        names.push(rest[open + 1..open + close].to_owned());
        rest = &rest[open + close + 1..];
    }
    names
}

fn parameter_schema(parameter: &Parameter) -> Option<ObjectOrReference<ObjectSchema>> {
    if let Some(schema) = &parameter.schema {
        return Some(schema.clone());
    }
    parameter
        .content
        .as_ref()
        .and_then(|content| content.get_json_content())
        .and_then(|media_type| media_type.schema.clone())
}

/// Accepts only form (query) and simple (path, header) styles.
fn parameter_serialization(
    parameter: &Parameter,
) -> Result<Option<ParameterSerialization>, ParameterStyle> {
    match (&parameter.style, &parameter.location) {
        (None, ParameterIn::Query) => Ok(Some(ParameterSerialization::Form {
            explode: parameter.explode.unwrap_or(true),
        })),
        (None, _) => Ok(None),
        (Some(ParameterStyle::Form), _) => Ok(Some(ParameterSerialization::Form {
            explode: parameter.explode.unwrap_or(true),
        })),
        (Some(ParameterStyle::Simple), _) => Ok(Some(ParameterSerialization::Simple)),
        (Some(style), _) => Err(style.clone()),
    }
}

/// The example value the specification itself declares for a parameter.
fn spec_parameter_example(spec: &oas3::Spec, parameter: &Parameter) -> Option<Value> {
    if let Some(example) = &parameter.example {
        return Some(example.clone());
    }
    parameter
        .examples
        .values()
        .filter_map(|ref_or_example| ref_or_example.resolve(spec).ok())
        .find_map(|example| example.value)
}

fn media_type_examples(spec: &oas3::Spec, media_type: &oas3::spec::MediaType) -> Vec<Value> {
    match &media_type.examples {
        None => Vec::new(),
        Some(MediaTypeExamples::Example { example }) => vec![example.clone()],
        Some(MediaTypeExamples::Examples { examples }) => examples
            .values()
            .filter_map(|ref_or_example| ref_or_example.resolve(spec).ok())
            .filter_map(|example| example.value)
            .collect(),
    }
}

fn rename_root(tree: &mut PayloadTree, name: &str) {
    match tree {
        PayloadTree::Leaf(leaf) => leaf.name = name.to_owned(),
        PayloadTree::Inner(inner) => inner.name = name.to_owned(),
    }
}

fn set_required(tree: &mut PayloadTree, required: bool) {
    match tree {
        PayloadTree::Leaf(leaf) => leaf.is_required = required,
        PayloadTree::Inner(inner) => inner.is_required = required,
    }
}

/// Removes read-only subtrees from a request body.
fn prune_read_only(tree: &mut PayloadTree) {
    if let PayloadTree::Inner(inner) = tree {
        inner.children.retain(|child| !child.is_read_only());
        for child in &mut inner.children {
            prune_read_only(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{grammar::RequestId, method::Method};
    use indexmap::IndexMap;
    use serde_json::json;

    fn spec_from(json: serde_json::Value) -> oas3::Spec {
        serde_json::from_value(json).unwrap()
    }

    fn collect_with(
        spec: &oas3::Spec,
        endpoint: &str,
        method: Method,
        options: CollectorOptions,
        user_examples: &[NamedExample],
    ) -> RequestParameters {
        let document = crate::openapi::ApiDocument::new(spec.clone());
        let operations = document.operations();
        let qualified = operations
            .iter()
            .find(|qualified| {
                qualified.id.endpoint == endpoint && qualified.id.method == method
            })
            .expect("operation not found");
        let dictionary = MutationsDictionary::default_dictionary();
        let cache = SchemaCache::default();
        let collector = ParameterCollector::new(
            document.spec(),
            &dictionary,
            VisitorConfig::default(),
            options,
            &cache,
        );
        collector.collect(qualified, user_examples)
    }

    fn default_options() -> CollectorOptions {
        CollectorOptions {
            include_optional_parameters: true,
            ..Default::default()
        }
    }

    #[test]
    fn template_names_are_extracted() {
        assert_eq!(
            template_parameter_names("/stores/{storeId}/orders/{orderId}"),
            ["storeId", "orderId"]
        );
        assert!(template_parameter_names("/stores").is_empty());
    }

    #[test]
    fn path_parameters_follow_the_template() {
        let spec = spec_from(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items/{itemId}": {
                    "get": {
                        "parameters": [
                            {"name": "itemId", "in": "path", "required": true,
                             "schema": {"type": "string"}},
                            {"name": "ghost", "in": "path", "required": true,
                             "schema": {"type": "string"}},
                            {"name": "arrayish", "in": "path", "required": true,
                             "schema": {"type": "array", "items": {"type": "string"}}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        let collected = collect_with(
            &spec,
            "/items/{itemId}",
            Method::Get,
            default_options(),
            &[],
        );
        // The undeclared-in-template and array parameters are dropped.
        assert_eq!(collected.path.len(), 1);
        assert_eq!(collected.path[0].name, "itemId");
    }

    #[test]
    fn query_schema_entry_and_optional_filtering() {
        let spec = spec_from(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items": {
                    "get": {
                        "parameters": [
                            {"name": "limit", "in": "query", "required": false,
                             "schema": {"type": "integer"}},
                            {"name": "kind", "in": "query", "required": true,
                             "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        let collected = collect_with(&spec, "/items", Method::Get, default_options(), &[]);
        assert_eq!(collected.query.len(), 1);
        let (source, list) = &collected.query[0];
        assert_eq!(*source, ParameterPayloadSource::Schema);
        assert_eq!(list.len(), 2);

        let without_optional = collect_with(
            &spec,
            "/items",
            Method::Get,
            CollectorOptions {
                include_optional_parameters: false,
                ..default_options()
            },
            &[],
        );
        let (_, list) = &without_optional.query[0];
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "kind");
    }

    #[test]
    fn example_replaces_schema_unless_all_requested(){
        let spec = spec_from(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items": {
                    "get": {
                        "parameters": [
                            {"name": "kind", "in": "query", "required": true,
                             "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        let mut parameters = IndexMap::new();
        parameters.insert("kind".to_owned(), json!("book"));
        parameters.insert("undeclared".to_owned(), json!("x"));
        let example = NamedExample {
            name: "first".to_owned(),
            parameters,
            exact_copy: false,
        };
        let options = CollectorOptions {
            use_query_examples: true,
            ..default_options()
        };
        let collected = collect_with(&spec, "/items", Method::Get, options, &[example.clone()]);
        assert_eq!(collected.query.len(), 1);
        let (source, list) = &collected.query[0];
        assert_eq!(*source, ParameterPayloadSource::Examples);
        assert_eq!(list.len(), 1);

        let options = CollectorOptions {
            use_query_examples: true,
            use_all_example_payloads: true,
            ..default_options()
        };
        let collected = collect_with(&spec, "/items", Method::Get, options, &[example]);
        assert_eq!(collected.query.len(), 2);
        assert_eq!(collected.query[0].0, ParameterPayloadSource::Schema);
        assert_eq!(collected.query[1].0, ParameterPayloadSource::Examples);
    }

    #[test]
    fn body_from_first_json_content() {
        let spec = spec_from(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items": {
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "name": {"type": "string"},
                                            "etag": {"type": "string", "readOnly": true}
                                        }
                                    }
                                }
                            }
                        },
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        let collected = collect_with(&spec, "/items", Method::Post, default_options(), &[]);
        assert_eq!(collected.body.len(), 1);
        let (source, ParameterPayload::List(list)) = &collected.body[0] else {
            panic!("expected schema body list")
        };
        assert_eq!(*source, ParameterPayloadSource::Schema);
        let PayloadTree::Inner(inner) = &list[0].payload else {
            panic!("expected object tree")
        };
        // The read-only property is pruned from the request body.
        let names: Vec<_> = inner.children.iter().map(PayloadTree::name).collect();
        assert_eq!(names, ["name"]);
    }

    #[test]
    fn exact_copy_body_example_is_inlined() {
        let spec = spec_from(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"type": "object",
                                               "properties": {"name": {"type": "string"}}}
                                }
                            }
                        },
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));
        let mut parameters = IndexMap::new();
        parameters.insert(BODY_EXAMPLE_KEY.to_owned(), json!({"name": "x", "extra": 1}));
        let example = NamedExample {
            name: "inline".to_owned(),
            parameters,
            exact_copy: true,
        };
        let options = CollectorOptions {
            use_body_examples: true,
            ..default_options()
        };
        let collected = collect_with(&spec, "/items", Method::Post, options, &[example]);
        let example_entry = collected
            .body
            .iter()
            .find(|(source, _)| *source == ParameterPayloadSource::Examples)
            .unwrap();
        let ParameterPayload::Example(FuzzingPayload::Constant { value, .. }) = &example_entry.1
        else {
            panic!("expected inlined constant body")
        };
        assert_eq!(value, "{\"name\":\"x\",\"extra\":1}");
    }
}
