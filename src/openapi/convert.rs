//! Converts upgraded Swagger v2 / OpenAPI 3.0 documents into the `oas3`
//! document model.
//!
//! The conversion keeps exactly what the grammar compiler consumes: schema
//! types with their formats, defaults, examples and readOnly flags,
//! parameter schemas and styles, request/response content, and the
//! specification extensions that carry `x-ms-paths` and inline annotations.
//! Response links and response headers of converted documents are not
//! carried over; documents that rely on them should be provided as
//! OpenAPI 3.1.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Number;

/// Converts an upgraded document. The result goes through the same
/// preprocessing as a natively parsed 3.1 document.
pub fn convert_openapi(value: openapiv3::OpenAPI) -> oas3::Spec {
    oas3::Spec {
        openapi: String::from("3.1.0"),
        info: convert_info(value.info),
        servers: convert_servers(value.servers),
        paths: convert_paths(value.paths),
        components: convert_components(value.components),
        security: Default::default(),
        tags: Default::default(),
        webhooks: Default::default(),
        external_docs: Default::default(),
        extensions: convert_extensions(value.extensions),
    }
}

fn convert_extensions(
    extensions: IndexMap<String, serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
    extensions.into_iter().collect()
}

/// Converts the "info" key of the API spec. Only the title and version are
/// retained.
fn convert_info(info: openapiv3::Info) -> oas3::spec::Info {
    oas3::spec::Info {
        title: info.title,
        version: info.version,
        summary: Default::default(),
        description: Default::default(),
        terms_of_service: Default::default(),
        contact: Default::default(),
        license: Default::default(),
        extensions: Default::default(),
    }
}

/// Converts the "servers" key of the API spec. Only the URL is retained;
/// it supplies the Host header and base path of every request.
fn convert_servers(servers: Vec<openapiv3::Server>) -> Vec<oas3::spec::Server> {
    servers
        .into_iter()
        .map(|s| oas3::spec::Server {
            url: s.url,
            description: Default::default(),
            variables: Default::default(),
            extensions: Default::default(),
        })
        .collect()
}

fn convert_paths(
    paths: openapiv3::Paths,
) -> Option<BTreeMap<String, oas3::spec::PathItem>> {
    if paths.is_empty() {
        return None;
    }
    Some(
        paths
            .paths
            .into_iter()
            .map(|(key, value)| {
                (
                    key,
                    match value {
                        openapiv3::Ref::Reference { reference } => oas3::spec::PathItem {
                            reference: Some(reference),
                            ..Default::default()
                        },
                        openapiv3::Ref::Item(path_item) => convert_path_item(path_item),
                    },
                )
            })
            .collect(),
    )
}

fn convert_path_item(path_item: openapiv3::PathItem) -> oas3::spec::PathItem {
    oas3::spec::PathItem {
        get: path_item.get.map(convert_operation),
        put: path_item.put.map(convert_operation),
        post: path_item.post.map(convert_operation),
        delete: path_item.delete.map(convert_operation),
        options: path_item.options.map(convert_operation),
        head: path_item.head.map(convert_operation),
        patch: path_item.patch.map(convert_operation),
        trace: path_item.trace.map(convert_operation),
        parameters: convert_parameters(path_item.parameters),
        ..Default::default()
    }
}

fn convert_components(components: openapiv3::Components) -> Option<oas3::spec::Components> {
    Some(oas3::spec::Components {
        schemas: convert_ref_map(components.schemas, &convert_schema),
        responses: convert_ref_map(components.responses, &convert_response),
        parameters: convert_ref_map(components.parameters, &convert_parameter),
        examples: convert_ref_map(components.examples, &convert_example),
        request_bodies: convert_ref_map(components.request_bodies, &convert_request_body),
        ..Default::default()
    })
}

fn convert_operation(operation: openapiv3::Operation) -> oas3::spec::Operation {
    oas3::spec::Operation {
        operation_id: operation.operation_id,
        parameters: convert_parameters(operation.parameters),
        request_body: operation
            .request_body
            .map(|ref_or| convert_reference(ref_or, convert_request_body)),
        responses: convert_responses(operation.responses),
        extensions: convert_extensions(operation.extensions),
        ..Default::default()
    }
}

fn convert_parameters(
    parameters: Vec<openapiv3::RefOr<openapiv3::Parameter>>,
) -> Vec<oas3::spec::ObjectOrReference<oas3::spec::Parameter>> {
    convert_vec_ref(parameters, &convert_parameter)
}

fn convert_parameter(parameter: openapiv3::Parameter) -> oas3::spec::Parameter {
    let openapiv3::Parameter { data, kind } = parameter;
    // Upgraded documents keep their default serialization per location:
    // form for query parameters, simple everywhere else.
    let (location, style) = match kind {
        openapiv3::ParameterKind::Query { .. } => (
            oas3::spec::ParameterIn::Query,
            Some(oas3::spec::ParameterStyle::Form),
        ),
        openapiv3::ParameterKind::Header { .. } => (
            oas3::spec::ParameterIn::Header,
            Some(oas3::spec::ParameterStyle::Simple),
        ),
        openapiv3::ParameterKind::Path { .. } => (
            oas3::spec::ParameterIn::Path,
            Some(oas3::spec::ParameterStyle::Simple),
        ),
        openapiv3::ParameterKind::Cookie { .. } => (oas3::spec::ParameterIn::Cookie, None),
    };
    let mut new_parameter = oas3::spec::Parameter {
        name: data.name,
        location,
        required: Some(data.required),
        schema: None,  // To be set later
        content: None, // To be set later
        example: data.example,
        examples: convert_ref_map(data.examples.into(), &convert_example),

        description: None,
        deprecated: None,
        allow_empty_value: None,
        style,
        explode: None,
        allow_reserved: None,
        extensions: Default::default(),
    };
    match data.format {
        openapiv3::ParameterSchemaOrContent::Schema(ref_schema) => {
            new_parameter.schema = Some(convert_ref_schema(ref_schema))
        }
        openapiv3::ParameterSchemaOrContent::Content(content) => {
            new_parameter.content = Some(convert_map_media_type(content))
        }
    };
    new_parameter
}

fn convert_request_body(body: openapiv3::RequestBody) -> oas3::spec::RequestBody {
    oas3::spec::RequestBody {
        description: body.description,
        content: convert_map_media_type(body.content),
        required: Some(body.required),
    }
}

fn convert_responses(
    responses: openapiv3::Responses,
) -> Option<BTreeMap<String, oas3::spec::ObjectOrReference<oas3::spec::Response>>> {
    let mut new_responses: BTreeMap<String, oas3::spec::ObjectOrReference<oas3::spec::Response>> =
        responses
            .responses
            .into_iter()
            .map(|(key, value)| (key.to_string(), convert_reference(value, convert_response)))
            .collect();
    if let Some(default_response) = responses.default {
        new_responses.insert(
            String::from("default"),
            convert_reference(default_response, convert_response),
        );
    }
    if new_responses.is_empty() {
        return None;
    }
    Some(new_responses)
}

fn convert_response(response: openapiv3::Response) -> oas3::spec::Response {
    oas3::spec::Response {
        content: convert_map_media_type(response.content),
        ..Default::default()
    }
}

fn convert_map_media_type(
    map_media: IndexMap<String, openapiv3::MediaType>,
) -> BTreeMap<String, oas3::spec::MediaType> {
    map_media
        .into_iter()
        .map(|(key, value)| (key, convert_media_type(value)))
        .collect()
}

fn convert_media_type(media_type: openapiv3::MediaType) -> oas3::spec::MediaType {
    let openapiv3::MediaType {
        schema,
        example,
        examples,
        ..
    } = media_type;
    oas3::spec::MediaType {
        schema: schema.map(convert_ref_schema),
        examples: convert_examples(example, examples),
        ..Default::default()
    }
}

fn convert_ref_schema(
    ref_schema: openapiv3::RefOr<openapiv3::Schema>,
) -> oas3::spec::ObjectOrReference<oas3::spec::ObjectSchema> {
    convert_reference(ref_schema, convert_schema)
}

fn convert_schema(schema: openapiv3::Schema) -> oas3::spec::ObjectSchema {
    let openapiv3::Schema { data, kind } = schema;
    let mut converted = match kind {
        openapiv3::SchemaKind::Type(r#type) => convert_elementary_type(r#type, data.nullable),
        openapiv3::SchemaKind::OneOf { one_of } => oas3::spec::ObjectSchema {
            one_of: convert_vec_ref(one_of, &convert_schema),
            ..Default::default()
        },
        openapiv3::SchemaKind::AllOf { all_of } => oas3::spec::ObjectSchema {
            all_of: convert_vec_ref(all_of, &convert_schema),
            ..Default::default()
        },
        openapiv3::SchemaKind::AnyOf { any_of } => oas3::spec::ObjectSchema {
            any_of: convert_vec_ref(any_of, &convert_schema),
            ..Default::default()
        },
        openapiv3::SchemaKind::Not { not: _ } => oas3::spec::ObjectSchema::default(),
        openapiv3::SchemaKind::Any(any_schema) => oas3::spec::ObjectSchema {
            all_of: convert_vec_ref(any_schema.all_of, &convert_schema),
            any_of: convert_vec_ref(any_schema.any_of, &convert_schema),
            one_of: convert_vec_ref(any_schema.one_of, &convert_schema),
            properties: any_schema
                .properties
                .into_iter()
                .map(|(name, ref_or_schema)| (name, convert_ref_schema(ref_or_schema)))
                .collect(),
            schema_type: convert_type_name(any_schema.typ, data.nullable),
            enum_values: any_schema.enumeration,
            required: any_schema.required,
            format: any_schema.format,
            ..Default::default()
        },
    };
    // The surrounding schema data applies regardless of the kind.
    converted.title = data.title;
    converted.description = data.description;
    converted.default = data.default;
    converted.read_only = Some(data.read_only);
    converted.write_only = Some(data.write_only);
    converted.deprecated = Some(data.deprecated);
    if let Some(example) = data.example {
        converted.example = Some(example);
    }
    converted
}

fn convert_elementary_type(r#type: openapiv3::Type, nullable: bool) -> oas3::spec::ObjectSchema {
    use oas3::spec::{ObjectSchema, SchemaType};
    match r#type {
        openapiv3::Type::String(string_type) => ObjectSchema {
            schema_type: type_set(SchemaType::String, nullable),
            format: convert_string_format(string_type.format),
            pattern: string_type.pattern,
            enum_values: string_type
                .enumeration
                .into_iter()
                .map(serde_json::Value::String)
                .collect(),
            min_length: string_type.min_length.map(|v| v as u64),
            max_length: string_type.max_length.map(|v| v as u64),
            ..Default::default()
        },
        openapiv3::Type::Number(number_type) => ObjectSchema {
            schema_type: type_set(SchemaType::Number, nullable),
            format: convert_number_format(number_type.format),
            enum_values: number_type
                .enumeration
                .into_iter()
                .flat_map(|of| of.and_then(Number::from_f64))
                .map(serde_json::Value::Number)
                .collect(),
            ..Default::default()
        },
        openapiv3::Type::Integer(integer_type) => ObjectSchema {
            schema_type: type_set(SchemaType::Integer, nullable),
            format: convert_integer_format(integer_type.format),
            enum_values: integer_type
                .enumeration
                .into_iter()
                .flat_map(|oi| oi.map(Number::from))
                .map(serde_json::Value::Number)
                .collect(),
            ..Default::default()
        },
        openapiv3::Type::Object(object_type) => ObjectSchema {
            schema_type: type_set(SchemaType::Object, nullable),
            properties: convert_ref_map(object_type.properties, &convert_schema),
            required: object_type.required,
            ..Default::default()
        },
        openapiv3::Type::Array(array_type) => ObjectSchema {
            schema_type: type_set(SchemaType::Array, nullable),
            items: array_type.items.map(|boxed_ref_schema| {
                Box::new(oas3::spec::Schema::Object(Box::new(convert_ref_schema(
                    *boxed_ref_schema,
                ))))
            }),
            min_items: array_type.min_items.map(|v| v as u64),
            max_items: array_type.max_items.map(|v| v as u64),
            ..Default::default()
        },
        openapiv3::Type::Boolean {} => ObjectSchema {
            schema_type: type_set(SchemaType::Boolean, nullable),
            ..Default::default()
        },
    }
}

fn type_set(
    schema_type: oas3::spec::SchemaType,
    nullable: bool,
) -> Option<oas3::spec::SchemaTypeSet> {
    if nullable {
        Some(oas3::spec::SchemaTypeSet::Multiple(vec![
            schema_type,
            oas3::spec::SchemaType::Null,
        ]))
    } else {
        Some(oas3::spec::SchemaTypeSet::Single(schema_type))
    }
}

fn convert_type_name(typ: Option<String>, nullable: bool) -> Option<oas3::spec::SchemaTypeSet> {
    let schema_type = match typ.as_deref() {
        None => return None,
        Some("boolean") => oas3::spec::SchemaType::Boolean,
        Some("integer") => oas3::spec::SchemaType::Integer,
        Some("number") => oas3::spec::SchemaType::Number,
        Some("string") => oas3::spec::SchemaType::String,
        Some("array") => oas3::spec::SchemaType::Array,
        Some("object") => oas3::spec::SchemaType::Object,
        Some(_) => oas3::spec::SchemaType::Null,
    };
    type_set(schema_type, nullable)
}

fn convert_string_format(
    format: openapiv3::VariantOrUnknownOrEmpty<openapiv3::StringFormat>,
) -> Option<String> {
    match format {
        openapiv3::VariantOrUnknownOrEmpty::Item(item) => Some(
            match item {
                openapiv3::StringFormat::Date => "date",
                openapiv3::StringFormat::DateTime => "date-time",
                openapiv3::StringFormat::Password => "password",
                openapiv3::StringFormat::Byte => "byte",
                openapiv3::StringFormat::Binary => "binary",
            }
            .to_owned(),
        ),
        openapiv3::VariantOrUnknownOrEmpty::Unknown(name) => Some(name),
        openapiv3::VariantOrUnknownOrEmpty::Empty => None,
    }
}

fn convert_number_format(
    format: openapiv3::VariantOrUnknownOrEmpty<openapiv3::NumberFormat>,
) -> Option<String> {
    match format {
        openapiv3::VariantOrUnknownOrEmpty::Item(item) => Some(
            match item {
                openapiv3::NumberFormat::Float => "float",
                openapiv3::NumberFormat::Double => "double",
            }
            .to_owned(),
        ),
        openapiv3::VariantOrUnknownOrEmpty::Unknown(name) => Some(name),
        openapiv3::VariantOrUnknownOrEmpty::Empty => None,
    }
}

fn convert_integer_format(
    format: openapiv3::VariantOrUnknownOrEmpty<openapiv3::IntegerFormat>,
) -> Option<String> {
    match format {
        openapiv3::VariantOrUnknownOrEmpty::Item(item) => Some(
            match item {
                openapiv3::IntegerFormat::Int32 => "int32",
                openapiv3::IntegerFormat::Int64 => "int64",
            }
            .to_owned(),
        ),
        openapiv3::VariantOrUnknownOrEmpty::Unknown(name) => Some(name),
        openapiv3::VariantOrUnknownOrEmpty::Empty => None,
    }
}

fn convert_examples(
    example: Option<serde_json::Value>,
    examples: IndexMap<String, openapiv3::RefOr<openapiv3::Example>>,
) -> Option<oas3::spec::MediaTypeExamples> {
    if let Some(value) = example {
        return Some(oas3::spec::MediaTypeExamples::Example { example: value });
    }
    if examples.is_empty() {
        return None;
    }
    Some(oas3::spec::MediaTypeExamples::Examples {
        examples: examples
            .into_iter()
            .map(|(key, value)| (key, convert_reference(value, convert_example)))
            .collect(),
    })
}

fn convert_example(example: openapiv3::Example) -> oas3::spec::Example {
    oas3::spec::Example {
        value: example.value,
        ..Default::default()
    }
}

fn convert_reference<T, U>(
    reference: openapiv3::RefOr<T>,
    converter: impl FnOnce(T) -> U,
) -> oas3::spec::ObjectOrReference<U> {
    match reference {
        openapiv3::Ref::Item(item) => oas3::spec::ObjectOrReference::Object(converter(item)),
        openapiv3::Ref::Reference { reference } => oas3::spec::ObjectOrReference::Ref {
            ref_path: reference,
            summary: None,
            description: None,
        },
    }
}

fn convert_vec_ref<T, U>(
    vec_ref: Vec<openapiv3::RefOr<T>>,
    converter: &impl Fn(T) -> U,
) -> Vec<oas3::spec::ObjectOrReference<U>> {
    vec_ref
        .into_iter()
        .map(move |value| convert_reference(value, converter))
        .collect()
}

fn convert_ref_map<T, U>(
    ref_map: openapiv3::RefMap<T>,
    converter: &impl Fn(T) -> U,
) -> BTreeMap<String, oas3::spec::ObjectOrReference<U>> {
    ref_map
        .into_iter()
        .map(|(key, value)| (key, convert_reference(value, converter)))
        .collect()
}

#[cfg(test)]
mod tests {
    use openapiv3::VersionedOpenAPI;

    use super::*;

    fn convert(contents: &str) -> oas3::Spec {
        let versioned: VersionedOpenAPI = serde_json::from_str(contents).unwrap();
        convert_openapi(versioned.upgrade())
    }

    #[test]
    fn keeps_string_formats_and_read_only() {
        let spec = convert(
            r#"{
                "swagger": "2.0",
                "info": {"title": "t", "version": "1"},
                "paths": {
                    "/items": {
                        "post": {
                            "parameters": [{
                                "name": "body", "in": "body",
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "id": {"type": "string", "format": "uuid", "readOnly": true},
                                        "when": {"type": "string", "format": "date-time"}
                                    }
                                }
                            }],
                            "responses": {"200": {"description": "ok"}}
                        }
                    }
                }
            }"#,
        );
        let paths = spec.paths.as_ref().unwrap();
        let operation = paths["/items"].post.as_ref().unwrap();
        let body = operation.request_body.as_ref().unwrap().resolve(&spec).unwrap();
        let media = body.content.values().next().unwrap();
        let schema = media.schema.as_ref().unwrap().resolve(&spec).unwrap();
        let id = schema.properties["id"].resolve(&spec).unwrap();
        assert_eq!(id.format.as_deref(), Some("uuid"));
        assert_eq!(id.read_only, Some(true));
        let when = schema.properties["when"].resolve(&spec).unwrap();
        assert_eq!(when.format.as_deref(), Some("date-time"));
    }

    #[test]
    fn keeps_root_extensions() {
        let spec = convert(
            r#"{
                "swagger": "2.0",
                "info": {"title": "t", "version": "1"},
                "paths": {},
                "x-ms-paths": {"/X&op={o}": {}}
            }"#,
        );
        assert!(spec.extensions.contains_key("x-ms-paths"));
    }
}
