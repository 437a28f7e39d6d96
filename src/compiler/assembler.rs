//! Assembles resolved requests into the final grammar: the path compiled
//! to payload slots, dictionary payloads substituted into headers, queries
//! and bodies, dynamic-object readers spliced in where dependencies
//! resolved, and the per-request dependency data (parsers and writer
//! variables) attached.

use crate::{
    compiler::{
        api_resource::{ApiResource, Producer, ResourceReference},
        dependencies::DependencyIndex,
        naming,
    },
    dictionary::{MutationsDictionary, ParameterKind},
    grammar::{
        ParameterPayload, ParameterPayloadSource, Request, RequestDependencyData, RequestId,
        RequestMetadata, RequestParameter, RequestParameters, RequestToken, ResponseParser,
    },
    method::Method,
    openapi::x_ms_query_pairs,
    payload::{
        CustomPayloadType, DynamicObject, FuzzingPayload, LeafProperty, PayloadTree,
        PrimitiveType,
    },
};

const HTTP_VERSION: &str = "1.1";

pub struct GrammarAssembler<'a> {
    dependencies: &'a DependencyIndex,
    host: String,
    base_path: String,
    use_refreshable_token: bool,
}

impl<'a> GrammarAssembler<'a> {
    pub fn new(
        dependencies: &'a DependencyIndex,
        host: String,
        base_path: String,
        use_refreshable_token: bool,
    ) -> Self {
        Self {
            dependencies,
            host,
            base_path,
            use_refreshable_token,
        }
    }

    pub fn assemble_request(
        &self,
        id: &RequestId,
        mut parameters: RequestParameters,
        dictionary: &mut MutationsDictionary,
        is_long_running: bool,
    ) -> Request {
        let path = self.assemble_path(id, &parameters);
        let header_parameters = self.assemble_headers(id, &mut parameters, dictionary);
        let query_parameters = self.assemble_queries(id, &mut parameters, dictionary);
        let body_parameters = self.assemble_body(id, parameters.body, dictionary);

        let mut headers = vec![
            ("Accept".to_owned(), "application/json".to_owned()),
            ("Host".to_owned(), self.host.clone()),
        ];
        if !body_parameters.is_empty() {
            let content_type = dictionary
                .content_type_override(id)
                .unwrap_or_else(|| "application/json".to_owned());
            headers.push(("Content-Type".to_owned(), content_type));
        }

        let dependency_data = self.dependency_data(id);

        Request {
            id: id.clone(),
            method: id.method,
            base_path: self.base_path.clone(),
            path,
            query_parameters,
            header_parameters,
            body_parameters,
            token: if self.use_refreshable_token {
                RequestToken::Refreshable
            } else {
                RequestToken::Static(String::new())
            },
            http_version: HTTP_VERSION.to_owned(),
            headers,
            dependency_data,
            metadata: RequestMetadata {
                is_long_running_operation: is_long_running,
            },
        }
    }

    /// Compiles the endpoint template into payload slots. Parameters fall
    /// back to query declarations when the endpoint was rewritten from
    /// `x-ms-paths`; names nothing declares stay visible as `{name}`
    /// literals. The original query fragment of an `x-ms-paths` template
    /// is reconstructed verbatim behind the path.
    fn assemble_path(&self, id: &RequestId, parameters: &RequestParameters) -> Vec<FuzzingPayload> {
        let mut payloads = Vec::new();
        for token in tokenize_template(&id.endpoint) {
            match token {
                TemplateToken::Literal(text) => payloads.push(FuzzingPayload::Constant {
                    primitive_type: PrimitiveType::String,
                    value: text,
                }),
                TemplateToken::Parameter(name) => {
                    payloads.push(self.path_parameter_payload(id, parameters, &name));
                }
            }
        }
        if let Some(template) = &id.x_ms_path {
            self.reconstruct_x_ms_query(id, parameters, template, &mut payloads);
        }
        payloads
    }

    fn path_parameter_payload(
        &self,
        id: &RequestId,
        parameters: &RequestParameters,
        name: &str,
    ) -> FuzzingPayload {
        let declared_path = parameters
            .path
            .iter()
            .find(|parameter| parameter.name == name)
            .map(|parameter| (ParameterKind::Path, parameter));
        // Parameters of a rewritten query-bearing template are declared as
        // query parameters.
        let declared = declared_path.or_else(|| {
            id.x_ms_path.as_ref()?;
            schema_list(&parameters.query)
                .iter()
                .find(|parameter| parameter.name == name)
                .map(|parameter| (ParameterKind::Query, parameter))
        });

        let Some((kind, parameter)) = declared else {
            log::warn!("endpoint {} names undeclared parameter {name}", id);
            return FuzzingPayload::Constant {
                primitive_type: PrimitiveType::String,
                value: format!("{{{name}}}"),
            };
        };

        if let Some(dependency) = self.dependencies.lookup(id, kind, name)
            && let Some(producer) = &dependency.producer
        {
            return self.producer_payload(producer, flatten_to_payload(&parameter.payload, name));
        }
        flatten_to_payload(&parameter.payload, name)
    }

    fn reconstruct_x_ms_query(
        &self,
        id: &RequestId,
        parameters: &RequestParameters,
        template: &str,
        payloads: &mut Vec<FuzzingPayload>,
    ) {
        let pairs = x_ms_query_pairs(template);
        if pairs.is_empty() {
            return;
        }
        let separator = template
            .find(['?', '&'])
            .map(|position| &template[position..position + 1])
            .unwrap_or("?");
        let mut text_run = separator.to_owned();
        for (index, (key, value)) in pairs.iter().enumerate() {
            if index > 0 {
                text_run.push('&');
            }
            text_run.push_str(key);
            text_run.push('=');
            match value.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
                Some(parameter_name) => {
                    payloads.push(FuzzingPayload::Constant {
                        primitive_type: PrimitiveType::String,
                        value: std::mem::take(&mut text_run),
                    });
                    payloads.push(self.path_parameter_payload(id, parameters, parameter_name));
                }
                None => text_run.push_str(value),
            }
        }
        if !text_run.is_empty() {
            payloads.push(FuzzingPayload::Constant {
                primitive_type: PrimitiveType::String,
                value: text_run,
            });
        }
    }

    /// Headers: spec-declared Content-Length is dropped, dictionary header
    /// payloads replace declared parameters, and headers only the
    /// dictionary knows are injected.
    fn assemble_headers(
        &self,
        id: &RequestId,
        parameters: &mut RequestParameters,
        dictionary: &MutationsDictionary,
    ) -> Vec<(ParameterPayloadSource, Vec<RequestParameter>)> {
        let mut lists = std::mem::take(&mut parameters.header);
        let spec_had_content_length = lists.iter().any(|(_, list)| {
            list.iter()
                .any(|parameter| parameter.name.eq_ignore_ascii_case("content-length"))
        });
        let mut declared_names = Vec::new();
        for (_, list) in &mut lists {
            list.retain(|parameter| !parameter.name.eq_ignore_ascii_case("content-length"));
            for parameter in list.iter_mut() {
                declared_names.push(parameter.name.clone());
                if let Some(payload) = dictionary.find_custom_payload(
                    ParameterKind::Header,
                    None,
                    &parameter.name,
                ) {
                    parameter.payload = custom_leaf(&parameter.name, &payload);
                }
                self.substitute_tree(id, ParameterKind::Header, &mut parameter.payload);
            }
        }

        let mut injected = Vec::new();
        for name in dictionary.custom_header_names() {
            if name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            let already_declared = declared_names.iter().any(|declared| declared == name);
            let inject_content_length =
                name.eq_ignore_ascii_case("content-length") && spec_had_content_length;
            if already_declared && !inject_content_length {
                continue;
            }
            if let Some(payload) =
                dictionary.find_custom_payload(ParameterKind::Header, None, name)
            {
                injected.push(RequestParameter {
                    name: name.clone(),
                    payload: custom_leaf(name, &payload),
                    serialization: None,
                });
            }
        }
        if !injected.is_empty() {
            lists.push((ParameterPayloadSource::DictionaryCustomPayload, injected));
        }
        lists
    }

    /// Queries: parameters spliced into a rewritten path are removed,
    /// dictionary query payloads replace declared parameters, the rest of
    /// the dictionary's query payloads are injected.
    fn assemble_queries(
        &self,
        id: &RequestId,
        parameters: &mut RequestParameters,
        dictionary: &MutationsDictionary,
    ) -> Vec<(ParameterPayloadSource, Vec<RequestParameter>)> {
        let mut lists = std::mem::take(&mut parameters.query);
        let in_path: Vec<String> = id
            .x_ms_path
            .as_deref()
            .map(|template| {
                x_ms_query_pairs(template)
                    .into_iter()
                    .filter_map(|(_, value)| {
                        value
                            .strip_prefix('{')
                            .and_then(|rest| rest.strip_suffix('}'))
                            .map(str::to_owned)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut declared_names = Vec::new();
        for (_, list) in &mut lists {
            list.retain(|parameter| !in_path.contains(&parameter.name));
            for parameter in list.iter_mut() {
                declared_names.push(parameter.name.clone());
                if let Some(payload) =
                    dictionary.find_custom_payload(ParameterKind::Query, None, &parameter.name)
                {
                    parameter.payload = custom_leaf(&parameter.name, &payload);
                }
                self.substitute_tree(id, ParameterKind::Query, &mut parameter.payload);
            }
        }

        let mut injected = Vec::new();
        for name in dictionary.custom_query_names() {
            if declared_names.iter().any(|declared| declared == name) {
                continue;
            }
            if let Some(payload) = dictionary.find_custom_payload(ParameterKind::Query, None, name)
            {
                injected.push(RequestParameter {
                    name: name.clone(),
                    payload: custom_leaf(name, &payload),
                    serialization: None,
                });
            }
        }
        if !injected.is_empty() {
            lists.push((ParameterPayloadSource::DictionaryCustomPayload, injected));
        }
        lists
    }

    /// The body: replaced wholesale by a dictionary `__body__` payload when
    /// one exists, otherwise the schema trees with dependency readers
    /// substituted in.
    fn assemble_body(
        &self,
        id: &RequestId,
        body: Vec<(ParameterPayloadSource, ParameterPayload)>,
        dictionary: &MutationsDictionary,
    ) -> Vec<(ParameterPayloadSource, ParameterPayload)> {
        if let Some(key) = dictionary.whole_body_key(id) {
            return vec![(
                ParameterPayloadSource::DictionaryCustomPayload,
                ParameterPayload::Example(FuzzingPayload::Custom {
                    payload_type: CustomPayloadType::String,
                    primitive_type: PrimitiveType::String,
                    value: key,
                    is_object: true,
                    dynamic_object: None,
                }),
            )];
        }
        body.into_iter()
            .map(|(source, payload)| {
                let payload = match payload {
                    ParameterPayload::List(mut list) => {
                        for parameter in &mut list {
                            self.substitute_tree(id, ParameterKind::Body, &mut parameter.payload);
                        }
                        ParameterPayload::List(list)
                    }
                    example => example,
                };
                (source, payload)
            })
            .collect()
    }

    /// Replaces leaf payloads with dependency readers wherever resolution
    /// bound a producer to the leaf's position.
    fn substitute_tree(&self, id: &RequestId, kind: ParameterKind, tree: &mut PayloadTree) {
        tree.map_leaves(&mut |path, leaf| {
            let access_path = match kind {
                ParameterKind::Body => path.to_string(),
                _ => leaf.name.clone(),
            };
            if let Some(dependency) = self.dependencies.lookup(id, kind, &access_path)
                && let Some(producer) = &dependency.producer
            {
                leaf.payload = self.producer_payload(producer, leaf.payload.clone());
            }
        });
    }

    /// The payload a consumer slot renders once a producer is bound.
    fn producer_payload(
        &self,
        producer: &Producer,
        original: FuzzingPayload,
    ) -> FuzzingPayload {
        match producer {
            Producer::ResponseObject { resource } => {
                FuzzingPayload::DynamicObject(reader_variable(resource))
            }
            Producer::InputParameter {
                resource,
                dictionary_payload,
                is_writer,
            } => {
                let variable = DynamicObject {
                    primitive_type: resource.primitive_type.clone(),
                    variable_name: naming::dynamic_object_variable_name(
                        &resource.request_id,
                        &resource.access_path(),
                    ),
                    is_writer: *is_writer,
                };
                if !is_writer {
                    return FuzzingPayload::DynamicObject(variable);
                }
                // The writer slot emits its payload and records the value.
                match dictionary_payload {
                    Some(payload) => FuzzingPayload::Custom {
                        payload_type: payload.payload_type,
                        primitive_type: payload.primitive_type.clone(),
                        value: payload.name.clone(),
                        is_object: payload.is_object,
                        dynamic_object: Some(variable),
                    },
                    None => match original {
                        FuzzingPayload::Fuzzable {
                            primitive_type,
                            default_value,
                            example_value,
                            parameter_name,
                            ..
                        } => FuzzingPayload::Fuzzable {
                            primitive_type,
                            default_value,
                            example_value,
                            parameter_name,
                            dynamic_object: Some(variable),
                        },
                        other => other,
                    },
                }
            }
            Producer::DictionaryPayload(payload) => FuzzingPayload::Custom {
                payload_type: payload.payload_type,
                primitive_type: payload.primitive_type.clone(),
                value: payload.name.clone(),
                is_object: payload.is_object,
                dynamic_object: None,
            },
            Producer::SameBodyPayload { resource } => {
                let key = format!(
                    "{}_{}",
                    resource.body_container_name().unwrap_or_default(),
                    resource.name()
                );
                FuzzingPayload::Custom {
                    payload_type: CustomPayloadType::UuidSuffix,
                    primitive_type: PrimitiveType::String,
                    value: key,
                    is_object: false,
                    dynamic_object: None,
                }
            }
            // Ordering constraints never render as payloads.
            Producer::OrderingConstraint { .. } => original,
        }
    }

    /// Writer variables and ordering edges of one request; `None` when the
    /// request neither produces nor orders anything.
    fn dependency_data(&self, id: &RequestId) -> Option<RequestDependencyData> {
        let (body_writers, header_writers) = self.dependencies.consumed_response_producers(id);
        let response_parser = if body_writers.is_empty() && header_writers.is_empty() {
            None
        } else {
            Some(ResponseParser {
                writer_variables: body_writers.iter().map(writer_variable).collect(),
                header_writer_variables: header_writers.iter().map(writer_variable).collect(),
            })
        };

        let input_writer_variables = self
            .dependencies
            .input_writers(id)
            .iter()
            .map(writer_variable)
            .collect();

        let mut ordering_constraint_writer_variables = Vec::new();
        let mut ordering_constraint_reader_variables = Vec::new();
        for (source, target) in self.dependencies.ordering_constraints() {
            let variable = DynamicObject {
                primitive_type: PrimitiveType::String,
                variable_name: naming::ordering_constraint_variable_name(source, target),
                is_writer: true,
            };
            if source == id {
                ordering_constraint_writer_variables.push(variable);
            } else if target == id {
                ordering_constraint_reader_variables.push(DynamicObject {
                    is_writer: false,
                    ..variable
                });
            }
        }

        let data = RequestDependencyData {
            response_parser,
            input_writer_variables,
            ordering_constraint_writer_variables,
            ordering_constraint_reader_variables,
        };
        (!data.is_empty()).then_some(data)
    }
}

fn schema_list(
    entries: &[(ParameterPayloadSource, Vec<RequestParameter>)],
) -> &[RequestParameter] {
    entries
        .iter()
        .find(|(source, _)| *source == ParameterPayloadSource::Schema)
        .map(|(_, list)| list.as_slice())
        .unwrap_or_default()
}

/// The variable a consumer reads for a resolved response producer.
fn reader_variable(resource: &ApiResource) -> DynamicObject {
    DynamicObject {
        is_writer: false,
        ..writer_variable(resource)
    }
}

fn writer_variable(resource: &ApiResource) -> DynamicObject {
    let variable_name = match &resource.reference {
        ResourceReference::Header { name } => {
            naming::header_variable_name(&resource.request_id, name)
        }
        _ => naming::dynamic_object_variable_name(&resource.request_id, &resource.access_path()),
    };
    DynamicObject {
        primitive_type: resource.primitive_type.clone(),
        variable_name,
        is_writer: true,
    }
}

fn custom_leaf(name: &str, payload: &crate::dictionary::DictionaryPayload) -> PayloadTree {
    PayloadTree::Leaf(LeafProperty {
        name: name.to_owned(),
        payload: FuzzingPayload::Custom {
            payload_type: payload.payload_type,
            primitive_type: payload.primitive_type.clone(),
            value: payload.name.clone(),
            is_object: payload.is_object,
            dynamic_object: None,
        },
        is_required: true,
        is_read_only: false,
    })
}

/// Collapses a parameter tree to a single payload for path rendering.
fn flatten_to_payload(tree: &PayloadTree, name: &str) -> FuzzingPayload {
    match tree {
        PayloadTree::Leaf(leaf) => leaf.payload.clone(),
        PayloadTree::Inner(inner) => {
            if let Some(payload) = &inner.payload {
                return payload.clone();
            }
            if let Some(PayloadTree::Leaf(leaf)) = inner.children.first() {
                return leaf.payload.clone();
            }
            log::warn!("path parameter {name} has a complex value, emitting its name");
            FuzzingPayload::Constant {
                primitive_type: PrimitiveType::String,
                value: format!("{{{name}}}"),
            }
        }
    }
}

enum TemplateToken {
    Literal(String),
    Parameter(String),
}

/// Splits an endpoint template into literal runs and `{name}` parameters.
fn tokenize_template(endpoint: &str) -> Vec<TemplateToken> {
    let mut tokens = Vec::new();
    let mut rest = endpoint;
    while !rest.is_empty() {
        match rest.find('{') {
            None => {
                tokens.push(TemplateToken::Literal(rest.to_owned()));
                break;
            }
            Some(open) => {
                if open > 0 {
                    tokens.push(TemplateToken::Literal(rest[..open].to_owned()));
                }
                match rest[open..].find('}') {
                    None => {
                        tokens.push(TemplateToken::Literal(rest[open..].to_owned()));
                        break;
                    }
                    Some(close) => {
                        tokens.push(TemplateToken::Parameter(
                            rest[open + 1..open + close].to_owned(),
                        ));
                        rest = &rest[open + close + 1..];
                    }
                }
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access_path::AccessPath,
        compiler::api_resource::Consumer,
        grammar::RequestParameters,
    };

    fn fuzzable_leaf(name: &str) -> PayloadTree {
        PayloadTree::Leaf(LeafProperty {
            name: name.to_owned(),
            payload: FuzzingPayload::Fuzzable {
                primitive_type: PrimitiveType::String,
                default_value: "fuzzstring".to_owned(),
                example_value: None,
                parameter_name: None,
                dynamic_object: None,
            },
            is_required: true,
            is_read_only: false,
        })
    }

    fn parameter(name: &str) -> RequestParameter {
        RequestParameter {
            name: name.to_owned(),
            payload: fuzzable_leaf(name),
            serialization: None,
        }
    }

    fn assembler(dependencies: &DependencyIndex) -> GrammarAssembler<'_> {
        GrammarAssembler::new(dependencies, "localhost".to_owned(), String::new(), true)
    }

    #[test]
    fn undeclared_path_parameter_stays_visible() {
        let dependencies = DependencyIndex::default();
        let assembler = assembler(&dependencies);
        let id = RequestId::new("/items/{itemId}", Method::Get);
        let request = assembler.assemble_request(
            &id,
            RequestParameters::default(),
            &mut MutationsDictionary::default_dictionary(),
            false,
        );
        assert_eq!(
            request.path,
            vec![
                FuzzingPayload::Constant {
                    primitive_type: PrimitiveType::String,
                    value: "/items/".to_owned(),
                },
                FuzzingPayload::Constant {
                    primitive_type: PrimitiveType::String,
                    value: "{itemId}".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn resolved_path_parameter_reads_dynamic_object() {
        let mut dependencies = DependencyIndex::default();
        let id = RequestId::new("/items/{itemId}", Method::Get);
        let consumer = Consumer {
            resource: ApiResource::path_parameter(
                id.clone(),
                "itemId",
                PrimitiveType::String,
                None,
            ),
            kind: ParameterKind::Path,
            annotation: None,
        };
        let producer = Producer::ResponseObject {
            resource: ApiResource::body(
                RequestId::new("/items", Method::Post),
                AccessPath::from_segments(["id"]),
                PrimitiveType::String,
                None,
            ),
        };
        dependencies.record(consumer, Some(producer)).unwrap();

        let assembler = assembler(&dependencies);
        let mut parameters = RequestParameters::default();
        parameters.path.push(parameter("itemId"));
        let request = assembler.assemble_request(
            &id,
            parameters,
            &mut MutationsDictionary::default_dictionary(),
            false,
        );
        assert_eq!(
            request.path[1],
            FuzzingPayload::DynamicObject(DynamicObject {
                primitive_type: PrimitiveType::String,
                variable_name: "items_post_id".to_owned(),
                is_writer: false,
            })
        );

        // Invariant: the producing request carries the matching parser.
        let producer_id = RequestId::new("/items", Method::Post);
        let producer_request = assembler.assemble_request(
            &producer_id,
            RequestParameters::default(),
            &mut MutationsDictionary::default_dictionary(),
            false,
        );
        let parser = producer_request
            .dependency_data
            .unwrap()
            .response_parser
            .unwrap();
        assert_eq!(parser.writer_variables.len(), 1);
        assert_eq!(parser.writer_variables[0].variable_name, "items_post_id");
        assert!(parser.writer_variables[0].is_writer);
    }

    #[test]
    fn whole_body_dictionary_payload_replaces_schema() {
        // S3: a custom payload keyed "<endpoint>/<method>/__body__".
        let dependencies = DependencyIndex::default();
        let assembler = assembler(&dependencies);
        let id = RequestId::new("/subnets/{subnetName}", Method::Get);
        let mut dictionary = MutationsDictionary::default_dictionary();
        dictionary.restler_custom_payload.insert(
            "/subnets/{subnetName}/get/__body__".to_owned(),
            vec!["abc".to_owned()],
        );
        let mut parameters = RequestParameters::default();
        parameters.body.push((
            ParameterPayloadSource::Schema,
            ParameterPayload::List(vec![parameter("")]),
        ));
        let request = assembler.assemble_request(&id, parameters, &mut dictionary, false);
        assert_eq!(request.body_parameters.len(), 1);
        let (source, ParameterPayload::Example(payload)) = &request.body_parameters[0] else {
            panic!("expected example body")
        };
        assert_eq!(*source, ParameterPayloadSource::DictionaryCustomPayload);
        assert_eq!(
            payload,
            &FuzzingPayload::Custom {
                payload_type: CustomPayloadType::String,
                primitive_type: PrimitiveType::String,
                value: "/subnets/{subnetName}/get/__body__".to_owned(),
                is_object: true,
                dynamic_object: None,
            }
        );
    }

    #[test]
    fn x_ms_query_parameters_move_into_path() {
        // S5: template /X&op={opName} declared via x-ms-paths.
        let dependencies = DependencyIndex::default();
        let assembler = assembler(&dependencies);
        let mut id = RequestId::new("/X", Method::Get);
        id.x_ms_path = Some("/X&op={opName}".to_owned());
        let mut parameters = RequestParameters::default();
        parameters
            .query
            .push((ParameterPayloadSource::Schema, vec![parameter("opName")]));
        let request = assembler.assemble_request(
            &id,
            parameters,
            &mut MutationsDictionary::default_dictionary(),
            false,
        );
        // opName is gone from the query list and appears in the path.
        let (_, query_list) = &request.query_parameters[0];
        assert!(query_list.is_empty());
        assert_eq!(
            request.path,
            vec![
                FuzzingPayload::Constant {
                    primitive_type: PrimitiveType::String,
                    value: "/X".to_owned(),
                },
                FuzzingPayload::Constant {
                    primitive_type: PrimitiveType::String,
                    value: "&op=".to_owned(),
                },
                FuzzingPayload::Fuzzable {
                    primitive_type: PrimitiveType::String,
                    default_value: "fuzzstring".to_owned(),
                    example_value: None,
                    parameter_name: None,
                    dynamic_object: None,
                },
            ]
        );
    }

    #[test]
    fn dictionary_headers_replace_and_inject() {
        let dependencies = DependencyIndex::default();
        let assembler = assembler(&dependencies);
        let id = RequestId::new("/items", Method::Get);
        let mut dictionary = MutationsDictionary::default_dictionary();
        dictionary
            .restler_custom_payload_header
            .insert("Authorization-Extra".to_owned(), vec!["token".to_owned()]);
        dictionary
            .restler_custom_payload_header
            .insert("X-Declared".to_owned(), vec!["v".to_owned()]);
        let mut parameters = RequestParameters::default();
        parameters.header.push((
            ParameterPayloadSource::Schema,
            vec![parameter("X-Declared"), parameter("Content-Length")],
        ));
        let request = assembler.assemble_request(&id, parameters, &mut dictionary, false);

        // Content-Length is stripped, X-Declared replaced in place.
        let (_, declared) = &request.header_parameters[0];
        assert_eq!(declared.len(), 1);
        assert!(matches!(
            declared[0].payload,
            PayloadTree::Leaf(LeafProperty {
                payload: FuzzingPayload::Custom { .. },
                ..
            })
        ));

        // The undeclared dictionary header is injected.
        let (source, injected) = &request.header_parameters[1];
        assert_eq!(*source, ParameterPayloadSource::DictionaryCustomPayload);
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].name, "Authorization-Extra");
    }

    #[test]
    fn content_type_override_applies() {
        let dependencies = DependencyIndex::default();
        let assembler = assembler(&dependencies);
        let id = RequestId::new("/items", Method::Post);
        let mut dictionary = MutationsDictionary::default_dictionary();
        dictionary.restler_custom_payload.insert(
            "/items/post/Content-Type".to_owned(),
            vec!["application/merge-patch+json".to_owned()],
        );
        let mut parameters = RequestParameters::default();
        parameters.body.push((
            ParameterPayloadSource::Schema,
            ParameterPayload::List(vec![parameter("")]),
        ));
        let request = assembler.assemble_request(&id, parameters, &mut dictionary, false);
        assert!(request
            .headers
            .contains(&("Content-Type".to_owned(), "application/merge-patch+json".to_owned())));
    }
}
