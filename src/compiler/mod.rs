//! The grammar compiler pipeline.
//!
//! Compilation runs in phases. Parameter sets, consumers and response
//! producers are collected with a parallel pass over the operations; the
//! results are deposited into the shared indices in specification order so
//! equal-quality producers always resolve identically. Dependency
//! resolution and grammar assembly then run sequentially in specification
//! order, threading the possibly-extended mutations dictionary through the
//! requests. A fatal error aborts the whole compile.

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde_json::Value;

use crate::{
    annotations::{
        self, ProducerConsumerAnnotation, GLOBAL_ANNOTATIONS_KEY, OPERATION_ANNOTATIONS_KEY,
    },
    configuration::{CompilerConfiguration, SwaggerSpecConfig},
    dictionary::MutationsDictionary,
    grammar::Grammar,
    openapi::{load::load_api_document, ApiDocument, QualifiedOperation},
    payload_examples::ExampleIndex,
};

pub mod api_resource;
pub mod assembler;
pub mod dependencies;
pub mod naming;
pub mod parameters;
pub mod producers;
pub mod resolver;
pub mod schema_visitor;

use api_resource::ApiResource;
use assembler::GrammarAssembler;
use dependencies::DependencyIndex;
use parameters::{CollectorOptions, ParameterCollector};
use producers::ProducerIndex;
use resolver::{collect_consumers, DependencyResolver, ResolverOptions};
use schema_visitor::{SchemaCache, VisitorConfig};

/// The typed fatal error kinds of a compile.
#[derive(Debug)]
pub enum CompileError {
    InvalidSpecFile(String),
    InvalidDictionary(String),
    InconsistentProducer(String),
    DuplicateEndpointAcrossSpecs(String),
    MissingOutputDirectory,
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::InvalidSpecFile(detail) => {
                write!(f, "invalid specification file: {detail}")
            }
            CompileError::InvalidDictionary(detail) => {
                write!(f, "invalid mutations dictionary: {detail}")
            }
            CompileError::InconsistentProducer(detail) => {
                write!(f, "inconsistent producer resolution: {detail}")
            }
            CompileError::DuplicateEndpointAcrossSpecs(endpoint) => write!(
                f,
                "endpoint {endpoint} appears under two different per-spec dictionaries"
            ),
            CompileError::MissingOutputDirectory => {
                write!(f, "grammarOutputDirectoryPath is required")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Everything a compile produces; the emit phase serializes it.
pub struct CompilerOutput {
    pub grammar: Grammar,
    /// The global dictionary, possibly extended with uuid-suffix entries.
    pub dictionary: MutationsDictionary,
    /// Per-spec dictionaries by name, with the endpoints they cover.
    pub per_resource_dictionaries: IndexMap<String, (MutationsDictionary, Vec<String>)>,
    pub dependencies: DependencyIndex,
    /// The discovered example listing, when discovery ran.
    pub example_listing: Option<Value>,
}

struct LoadedSpec {
    document: ApiDocument,
    dictionary_name: Option<String>,
    annotations: Vec<ProducerConsumerAnnotation>,
}

pub fn compile(configuration: &CompilerConfiguration) -> anyhow::Result<CompilerOutput> {
    let spec_configs = configuration.spec_configs();
    if spec_configs.is_empty() {
        return Err(CompileError::InvalidSpecFile(
            "no specification files were given".to_owned(),
        )
        .into());
    }

    let global_dictionary = match &configuration.custom_dictionary_file_path {
        Some(path) => MutationsDictionary::from_file(path)
            .map_err(|err| CompileError::InvalidDictionary(format!("{err:#}")))?,
        None => MutationsDictionary::default_dictionary(),
    };

    let mut global_annotations = Vec::new();
    if let Some(path) = &configuration.annotation_file_path {
        global_annotations.extend(annotations::parse_annotation_file(path)?);
    }

    // Load every specification with its own dictionary and annotations.
    let mut specs = Vec::new();
    let mut per_spec_dictionaries: Vec<Option<MutationsDictionary>> = Vec::new();
    for spec_config in &spec_configs {
        let (spec, dictionary) = load_spec(spec_config)?;
        per_spec_dictionaries.push(dictionary);
        specs.push(spec);
    }

    // One request list in specification order, deduplicated, with the
    // per-spec dictionary ownership checked.
    let mut endpoint_owner: IndexMap<String, usize> = IndexMap::new();
    let mut seen_requests = Vec::new();
    for (spec_index, spec) in specs.iter().enumerate() {
        for qualified in spec.document.operations() {
            if seen_requests.contains(&qualified.id) {
                log::warn!("duplicate request {} ignored", qualified.id);
                continue;
            }
            seen_requests.push(qualified.id.clone());
            match endpoint_owner.get(&qualified.id.endpoint) {
                Some(&owner) if owner != spec_index => {
                    let owner_has_dictionary = per_spec_dictionaries[owner].is_some();
                    let this_has_dictionary = per_spec_dictionaries[spec_index].is_some();
                    if owner_has_dictionary || this_has_dictionary {
                        return Err(CompileError::DuplicateEndpointAcrossSpecs(
                            qualified.id.endpoint.clone(),
                        )
                        .into());
                    }
                }
                Some(_) => {}
                None => {
                    endpoint_owner.insert(qualified.id.endpoint.clone(), spec_index);
                }
            }
        }
    }

    // Examples: configured files first, then directory discovery.
    let mut examples = ExampleIndex::default();
    if let Some(path) = &configuration.example_config_file_path {
        examples.load_config_file(path)?;
    }
    for path in &configuration.example_config_files {
        examples.load_config_file(path)?;
    }
    if configuration.discover_examples
        && let Some(directory) = &configuration.examples_directory
    {
        examples.discover(directory, &seen_requests)?;
    }

    let visitor_config = VisitorConfig {
        generate_fuzzable_payloads_for_examples: configuration.data_fuzzing,
        track_fuzzed_parameter_names: configuration.track_fuzzed_parameter_names,
        json_property_max_depth: configuration.json_property_max_depth,
    };
    let collector_options = CollectorOptions {
        use_path_examples: configuration.use_path_examples,
        use_query_examples: configuration.use_query_examples,
        use_header_examples: configuration.use_header_examples,
        use_body_examples: configuration.use_body_examples,
        use_all_example_payloads: configuration.use_all_example_payloads,
        data_fuzzing: configuration.data_fuzzing,
        include_optional_parameters: configuration.include_optional_parameters,
        read_only_fuzz: configuration.read_only_fuzz,
    };
    let resolver_options = ResolverOptions {
        allow_get_producers: configuration.allow_get_producers,
        resolve_query_dependencies: configuration.resolve_query_dependencies,
        resolve_body_dependencies: configuration.resolve_body_dependencies,
        resolve_header_dependencies: configuration.resolve_header_dependencies,
        naming_convention: configuration.api_naming_convention,
    };

    let cache = SchemaCache::default();

    // Per-operation views, in specification order, deduplicated.
    struct OperationView<'a> {
        spec_index: usize,
        qualified: QualifiedOperation<'a>,
    }
    let mut operations: Vec<OperationView<'_>> = Vec::new();
    for (spec_index, spec) in specs.iter().enumerate() {
        for qualified in spec.document.operations() {
            if operations.iter().any(|view| view.qualified.id == qualified.id) {
                continue;
            }
            operations.push(OperationView {
                spec_index,
                qualified,
            });
        }
    }

    // Parallel phase: parameter sets per operation.
    let parameter_sets: Vec<_> = operations
        .par_iter()
        .map(|view| {
            let spec = &specs[view.spec_index];
            let dictionary = per_spec_dictionaries[view.spec_index]
                .as_ref()
                .unwrap_or(&global_dictionary);
            let collector = ParameterCollector::new(
                spec.document.spec(),
                dictionary,
                visitor_config,
                collector_options,
                &cache,
            );
            collector.collect(&view.qualified, examples.for_request(&view.qualified.id))
        })
        .collect();

    // Parallel phase: consumers and same-body producers per request.
    let consumer_sets: Vec<_> = operations
        .par_iter()
        .zip(parameter_sets.par_iter())
        .map(|(view, parameters)| {
            collect_consumers(
                &view.qualified.id,
                parameters,
                configuration.api_naming_convention,
            )
        })
        .collect();

    // Parallel phase: response producers per request.
    let producer_sets: Vec<Vec<ApiResource>> = operations
        .par_iter()
        .map(|view| {
            let spec = &specs[view.spec_index];
            let dictionary = per_spec_dictionaries[view.spec_index]
                .as_ref()
                .unwrap_or(&global_dictionary);
            producers::collect_response_producers(
                spec.document.spec(),
                dictionary,
                &cache,
                &view.qualified,
                configuration.api_naming_convention,
            )
        })
        .collect();

    // Deposit into the shared index in specification order, so insertion
    // indices (the stable tie-break) are reproducible.
    let mut producer_index = ProducerIndex::default();
    for resources in producer_sets {
        for resource in resources {
            producer_index.add_response_producer(resource);
        }
    }
    for (_, same_body) in &consumer_sets {
        for resource in same_body {
            producer_index.add_same_body_producer(resource.clone());
        }
    }
    producer_index.finalize();

    // OpenAPI links participate as the lowest-precedence annotations.
    let mut link_annotations = Vec::new();
    for spec in &specs {
        link_annotations.extend(link_annotations_of(&spec.document));
    }
    for spec in &specs {
        global_annotations.extend(spec.annotations.iter().cloned());
    }

    // Sequential resolution in specification order.
    let resolver = DependencyResolver::new(
        &producer_index,
        resolver_options,
        &global_annotations,
        &link_annotations,
    );
    let mut dependency_index = DependencyIndex::default();
    let mut global_dictionary = global_dictionary;
    for (view, (consumers, _)) in operations.iter().zip(consumer_sets.iter()) {
        let local_annotations = operation_annotations(&view.qualified);
        let dictionary = per_spec_dictionaries[view.spec_index]
            .as_mut()
            .unwrap_or(&mut global_dictionary);
        for consumer in consumers {
            let producer =
                resolver.resolve(consumer, &local_annotations, &dependency_index, dictionary);
            dependency_index
                .record(consumer.clone(), producer)
                .map_err(|err| CompileError::InconsistentProducer(err.to_string()))?;
        }
    }

    // Ordering-only annotations, then input-producer chains.
    for annotation in global_annotations.iter().chain(link_annotations.iter()) {
        if annotation.producer_parameter.is_none()
            && annotation.consumer_parameter.is_none()
            && let Some(consumer_id) = &annotation.consumer_id
        {
            dependency_index
                .add_ordering_constraint(annotation.producer_id.clone(), consumer_id.clone());
        }
    }
    dependency_index.convert_input_producer_chains();

    // Assembly, threading the dictionaries through in request order.
    let (host, base_path) = specs[0].document.host_and_base_path();
    let assembler = GrammarAssembler::new(
        &dependency_index,
        host,
        base_path,
        configuration.use_refreshable_token,
    );
    let mut grammar = Grammar::default();
    for (view, parameters) in operations.iter().zip(parameter_sets.into_iter()) {
        let dictionary = per_spec_dictionaries[view.spec_index]
            .as_mut()
            .unwrap_or(&mut global_dictionary);
        grammar.requests.push(assembler.assemble_request(
            &view.qualified.id,
            parameters,
            dictionary,
            is_long_running(&view.qualified),
        ));
    }

    let mut per_resource_dictionaries = IndexMap::new();
    for (spec_index, spec) in specs.iter().enumerate() {
        if let (Some(name), Some(dictionary)) = (
            &spec.dictionary_name,
            per_spec_dictionaries[spec_index].take(),
        ) {
            let endpoints = spec
                .document
                .operations()
                .into_iter()
                .map(|qualified| qualified.id.endpoint)
                .collect::<indexmap::IndexSet<_>>()
                .into_iter()
                .collect();
            per_resource_dictionaries.insert(name.clone(), (dictionary, endpoints));
        }
    }

    Ok(CompilerOutput {
        grammar,
        dictionary: global_dictionary,
        per_resource_dictionaries,
        dependencies: dependency_index,
        example_listing: configuration
            .discover_examples
            .then(|| examples.discovery_listing()),
    })
}

fn load_spec(
    spec_config: &SwaggerSpecConfig,
) -> anyhow::Result<(LoadedSpec, Option<MutationsDictionary>)> {
    let document = load_api_document(&spec_config.spec_file_path)
        .map_err(|err| CompileError::InvalidSpecFile(format!("{err:#}")))?;

    let dictionary = match (&spec_config.dictionary, &spec_config.dictionary_file_path) {
        (Some(inline), _) => Some(inline.clone()),
        (None, Some(path)) => Some(
            MutationsDictionary::from_file(path)
                .map_err(|err| CompileError::InvalidDictionary(format!("{err:#}")))?,
        ),
        (None, None) => None,
    };
    let dictionary_name = dictionary.as_ref().map(|_| {
        spec_config
            .dictionary_file_path
            .as_ref()
            .and_then(|path| path.file_stem())
            .and_then(|stem| stem.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| {
                spec_config
                    .spec_file_path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("spec")
                    .to_owned()
            })
    });

    let mut spec_annotations = Vec::new();
    if let Some(path) = &spec_config.annotation_file_path {
        spec_annotations.extend(annotations::parse_annotation_file(path)?);
    }
    if let Some(value) = document.spec().extensions.get(GLOBAL_ANNOTATIONS_KEY) {
        spec_annotations.extend(annotations::annotations_from_value(value));
    }

    Ok((
        LoadedSpec {
            document,
            dictionary_name,
            annotations: spec_annotations,
        },
        dictionary,
    ))
}

fn operation_annotations(qualified: &QualifiedOperation<'_>) -> Vec<ProducerConsumerAnnotation> {
    qualified
        .operation
        .extensions
        .get(OPERATION_ANNOTATIONS_KEY)
        .map(|value| annotations::operation_annotations_from_value(value, &qualified.id))
        .unwrap_or_default()
}

/// A 201/202 response marks an operation as long-running: resource
/// creation may complete after the response arrives.
fn is_long_running(qualified: &QualifiedOperation<'_>) -> bool {
    qualified
        .operation
        .responses
        .as_ref()
        .is_some_and(|responses| {
            responses
                .keys()
                .any(|status| status == "201" || status == "202")
        })
}

/// Extracts OpenAPI links as annotations: a link on a response declares
/// that a response field of this operation feeds a parameter of the
/// linked operation.
fn link_annotations_of(document: &ApiDocument) -> Vec<ProducerConsumerAnnotation> {
    let operation_ids = document.operation_ids();
    let mut result = Vec::new();
    for qualified in document.operations() {
        let Some(responses) = qualified.operation.responses.as_ref() else {
            continue;
        };
        for ref_or_response in responses.values() {
            let Ok(response) = ref_or_response.resolve(document.spec()) else {
                continue;
            };
            for ref_or_link in response.links.values() {
                let oas3::spec::ObjectOrReference::Object(link) = ref_or_link else {
                    continue;
                };
                // Read the link generically; only operationId links with
                // $response.body expressions are usable.
                let Ok(link_value) = serde_json::to_value(link) else {
                    continue;
                };
                let Some(consumer_id) = link_value
                    .get("operationId")
                    .and_then(Value::as_str)
                    .and_then(|operation_id| operation_ids.get(operation_id))
                else {
                    continue;
                };
                let Some(parameters) = link_value.get("parameters").and_then(Value::as_object)
                else {
                    continue;
                };
                for (parameter_name, expression) in parameters {
                    let Some(pointer) = expression
                        .as_str()
                        .and_then(|text| text.strip_prefix("$response.body#"))
                    else {
                        continue;
                    };
                    let Some(path) = crate::access_path::AccessPath::from_json_pointer(pointer)
                    else {
                        continue;
                    };
                    result.push(ProducerConsumerAnnotation {
                        producer_id: qualified.id.clone(),
                        producer_parameter: Some(
                            crate::annotations::AnnotationResourceReference::Path(path),
                        ),
                        consumer_parameter: Some(
                            crate::annotations::AnnotationResourceReference::Name(
                                parameter_name.clone(),
                            ),
                        ),
                        consumer_id: Some(consumer_id.clone()),
                        except: Vec::new(),
                    });
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::{ParameterPayload, RequestToken},
        method::Method,
        payload::{CustomPayloadType, FuzzingPayload},
    };

    fn write_spec(directory: &std::path::Path, contents: serde_json::Value) -> std::path::PathBuf {
        let path = directory.join("api.json");
        std::fs::write(&path, contents.to_string()).unwrap();
        path
    }

    fn store_spec() -> serde_json::Value {
        serde_json::json!({
            "openapi": "3.1.0",
            "info": {"title": "stores", "version": "1"},
            "servers": [{"url": "http://example.org:8888/api"}],
            "paths": {
                "/stores/{storeId}/orders/{orderId}": {
                    "put": {
                        "parameters": [
                            {"name": "storeId", "in": "path", "required": true,
                             "schema": {"type": "string"}},
                            {"name": "orderId", "in": "path", "required": true,
                             "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        })
    }

    fn compile_spec(spec: serde_json::Value) -> CompilerOutput {
        let directory = tempfile::tempdir().unwrap();
        let path = write_spec(directory.path(), spec);
        let configuration = CompilerConfiguration {
            swagger_spec_file_path: Some(vec![path]),
            ..Default::default()
        };
        compile(&configuration).unwrap()
    }

    #[test]
    fn put_parameters_get_uuid_suffix_payloads() {
        // S1: both path parameters end up as uuid-suffix payloads, and the
        // dictionary carries the generated entries.
        let output = compile_spec(store_spec());
        assert!(output
            .dictionary
            .restler_custom_payload_uuid4_suffix
            .contains_key("storeId"));
        assert!(output
            .dictionary
            .restler_custom_payload_uuid4_suffix
            .contains_key("orderId"));

        let request = &output.grammar.requests[0];
        let custom_count = request
            .path
            .iter()
            .filter(|payload| {
                matches!(
                    payload,
                    FuzzingPayload::Custom {
                        payload_type: CustomPayloadType::UuidSuffix,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(custom_count, 2);
        assert!(!request
            .path
            .iter()
            .any(|payload| matches!(payload, FuzzingPayload::Fuzzable { .. })));
        assert_eq!(request.token, RequestToken::Refreshable);
        assert_eq!(request.base_path, "/api");
        assert!(request
            .headers
            .contains(&("Host".to_owned(), "example.org:8888".to_owned())));
    }

    #[test]
    fn path_dependency_from_post_response() {
        let output = compile_spec(serde_json::json!({
            "openapi": "3.1.0",
            "info": {"title": "items", "version": "1"},
            "paths": {
                "/items": {
                    "post": {
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": {"type": "object",
                                                   "properties": {"id": {"type": "string"}}}
                                    }
                                }
                            }
                        }
                    }
                },
                "/items/{itemId}": {
                    "get": {
                        "parameters": [
                            {"name": "itemId", "in": "path", "required": true,
                             "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }));

        // The GET's path reads the variable the POST writes.
        let get_request = output
            .grammar
            .requests
            .iter()
            .find(|request| request.method == Method::Get)
            .unwrap();
        let reader = get_request
            .path
            .iter()
            .find_map(|payload| match payload {
                FuzzingPayload::DynamicObject(variable) => Some(variable),
                _ => None,
            })
            .unwrap();
        assert_eq!(reader.variable_name, "items_post_id");
        assert!(!reader.is_writer);

        let post_request = output
            .grammar
            .requests
            .iter()
            .find(|request| request.method == Method::Post)
            .unwrap();
        let parser = post_request
            .dependency_data
            .as_ref()
            .unwrap()
            .response_parser
            .as_ref()
            .unwrap();
        assert_eq!(parser.writer_variables[0].variable_name, "items_post_id");
    }

    #[test]
    fn every_consumed_variable_has_exactly_one_writer() {
        let output = compile_spec(serde_json::json!({
            "openapi": "3.1.0",
            "info": {"title": "items", "version": "1"},
            "paths": {
                "/items": {
                    "post": {
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": {"type": "object",
                                                   "properties": {"id": {"type": "string"}}}
                                    }
                                }
                            }
                        }
                    }
                },
                "/items/{itemId}": {
                    "get": {
                        "parameters": [
                            {"name": "itemId", "in": "path", "required": true,
                             "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    },
                    "delete": {
                        "parameters": [
                            {"name": "itemId", "in": "path", "required": true,
                             "schema": {"type": "string"}}
                        ],
                        "responses": {"204": {"description": "gone"}}
                    }
                }
            }
        }));
        let grammar = &output.grammar;
        let consumed = grammar.consumed_variables();
        assert!(!consumed.is_empty());
        for variable in consumed {
            let writers = grammar
                .requests
                .iter()
                .filter_map(|request| request.dependency_data.as_ref())
                .flat_map(|data| {
                    data.response_parser
                        .iter()
                        .flat_map(|parser| {
                            parser
                                .writer_variables
                                .iter()
                                .chain(parser.header_writer_variables.iter())
                        })
                        .chain(data.input_writer_variables.iter())
                        .chain(data.ordering_constraint_writer_variables.iter())
                })
                .filter(|writer| {
                    writer.variable_name == variable.variable_name && writer.is_writer
                })
                .count();
            assert_eq!(writers, 1, "variable {} needs one writer", variable.variable_name);
        }
    }

    #[test]
    fn compilation_is_deterministic() {
        let first = compile_spec(store_spec());
        let second = compile_spec(store_spec());
        assert_eq!(
            serde_json::to_string_pretty(&first.grammar).unwrap(),
            serde_json::to_string_pretty(&second.grammar).unwrap()
        );
        assert_eq!(first.dictionary, second.dictionary);
    }

    #[test]
    fn whole_body_payload_via_spec_config_dictionary() {
        // S3 through the pipeline: a per-spec dictionary replaces a body.
        let directory = tempfile::tempdir().unwrap();
        let path = write_spec(
            directory.path(),
            serde_json::json!({
                "openapi": "3.1.0",
                "info": {"title": "subnets", "version": "1"},
                "paths": {
                    "/subnets/{subnetName}": {
                        "get": {
                            "parameters": [
                                {"name": "subnetName", "in": "path", "required": true,
                                 "schema": {"type": "string"}}
                            ],
                            "requestBody": {
                                "content": {
                                    "application/json": {
                                        "schema": {"type": "object",
                                                   "properties": {"a": {"type": "string"}}}
                                    }
                                }
                            },
                            "responses": {"200": {"description": "ok"}}
                        }
                    }
                }
            }),
        );
        let mut dictionary = MutationsDictionary::default_dictionary();
        dictionary.restler_custom_payload.insert(
            "/subnets/{subnetName}/get/__body__".to_owned(),
            vec!["abc".to_owned()],
        );
        let configuration = CompilerConfiguration {
            swagger_spec_config: Some(vec![crate::configuration::SwaggerSpecConfig {
                spec_file_path: path,
                dictionary_file_path: None,
                dictionary: Some(dictionary),
                annotation_file_path: None,
            }]),
            ..Default::default()
        };
        let output = compile(&configuration).unwrap();
        let request = &output.grammar.requests[0];
        let (_, ParameterPayload::Example(FuzzingPayload::Custom { value, is_object, .. })) =
            &request.body_parameters[0]
        else {
            panic!("expected custom body payload")
        };
        assert_eq!(value, "/subnets/{subnetName}/get/__body__");
        assert!(*is_object);
    }

    #[test]
    fn input_writer_annotation_round_trip() {
        // S6: annotation-declared input producer with writer and reader.
        let directory = tempfile::tempdir().unwrap();
        let spec_path = write_spec(
            directory.path(),
            serde_json::json!({
                "openapi": "3.1.0",
                "info": {"title": "files", "version": "1"},
                "x-restler-global-annotations": [{
                    "producer_endpoint": "/file/{fileId}",
                    "producer_method": "POST",
                    "producer_resource_name": "fileId",
                    "consumer_param": "fileId"
                }],
                "paths": {
                    "/file/{fileId}": {
                        "post": {
                            "parameters": [
                                {"name": "fileId", "in": "path", "required": true,
                                 "schema": {"type": "string"}}
                            ],
                            "responses": {"201": {"description": "created"}}
                        }
                    },
                    "/file/{fileId}/content": {
                        "put": {
                            "parameters": [
                                {"name": "fileId", "in": "path", "required": true,
                                 "schema": {"type": "string"}}
                            ],
                            "responses": {"200": {"description": "ok"}}
                        }
                    }
                }
            }),
        );
        let configuration = CompilerConfiguration {
            swagger_spec_file_path: Some(vec![spec_path]),
            ..Default::default()
        };
        let output = compile(&configuration).unwrap();

        let post_request = output
            .grammar
            .requests
            .iter()
            .find(|request| request.method == Method::Post)
            .unwrap();
        let dependency_data = post_request.dependency_data.as_ref().unwrap();
        assert_eq!(dependency_data.input_writer_variables.len(), 1);
        let writer_name = &dependency_data.input_writer_variables[0].variable_name;
        assert!(post_request.metadata.is_long_running_operation);

        let put_request = output
            .grammar
            .requests
            .iter()
            .find(|request| request.method == Method::Put)
            .unwrap();
        let reader = put_request
            .path
            .iter()
            .find_map(|payload| match payload {
                FuzzingPayload::DynamicObject(variable) => Some(variable),
                _ => None,
            })
            .unwrap();
        assert_eq!(&reader.variable_name, writer_name);
        assert!(!reader.is_writer);
    }
}
