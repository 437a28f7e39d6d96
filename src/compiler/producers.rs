//! The producer index: every value-producing position of every response,
//! indexed for the lookups dependency resolution performs.
//!
//! Producers are collected in parallel per request and deposited into one
//! shared index; all inserts serialize behind the compiler's lock. The
//! sort orders are built once, after the last insert, so equal-quality
//! producers always resolve identically across runs.

use indexmap::IndexMap;
use oas3::spec::Response;

use crate::{
    compiler::{
        api_resource::{ApiResource, NamingConvention},
        schema_visitor::{SchemaCache, SchemaVisitor, VisitorConfig},
    },
    dictionary::MutationsDictionary,
    grammar::RequestId,
    method::Method,
    openapi::{JsonContent, QualifiedOperation},
    payload::{FuzzingPayload, PayloadTree, PrimitiveType},
};

/// Response status codes whose payloads count as producers.
const PRODUCING_STATUS_RANGE: std::ops::RangeInclusive<u16> = 200..=206;

#[derive(Default)]
pub struct ProducerIndex {
    producers: Vec<ApiResource>,
    by_request: IndexMap<RequestId, Vec<usize>>,
    by_endpoint_method: IndexMap<(String, Method), Vec<usize>>,
    by_type_name: IndexMap<String, Vec<usize>>,
    sorted: Vec<usize>,
    sorted_non_nested: Vec<usize>,
    same_body: IndexMap<RequestId, Vec<ApiResource>>,
}

impl ProducerIndex {
    pub fn add_response_producer(&mut self, resource: ApiResource) {
        let index = self.producers.len();
        self.by_request
            .entry(resource.request_id.clone())
            .or_default()
            .push(index);
        self.by_endpoint_method
            .entry((
                resource.request_id.endpoint.clone(),
                resource.request_id.method,
            ))
            .or_default()
            .push(index);
        for type_name in resource.candidate_type_names() {
            self.by_type_name.entry(type_name).or_default().push(index);
        }
        self.producers.push(resource);
    }

    pub fn add_same_body_producer(&mut self, resource: ApiResource) {
        self.same_body
            .entry(resource.request_id.clone())
            .or_default()
            .push(resource);
    }

    /// Builds the match orderings. Must run after the last insert.
    pub fn finalize(&mut self) {
        let mut order: Vec<usize> = (0..self.producers.len()).collect();
        order.sort_by_key(|&index| self.sort_key(index));
        self.sorted_non_nested = order
            .iter()
            .copied()
            .filter(|&index| {
                self.producers[index]
                    .access_path()
                    .property_names()
                    .count()
                    <= 1
            })
            .collect();
        self.sorted = order;
    }

    /// The stability key: creating methods first, then endpoints that end
    /// in a parameter, then shallow access paths, then insertion order.
    fn sort_key(&self, index: usize) -> (u8, u8, usize, usize) {
        let resource = &self.producers[index];
        (
            resource.request_id.method.producer_preference(),
            u8::from(!resource.request_id.endpoint.ends_with('}')),
            resource.access_path().len(),
            index,
        )
    }

    /// Producers registered on an endpoint for any of the given methods,
    /// filtered by resource name, in method-then-insertion order.
    pub fn find_named_producers(
        &self,
        endpoint: &str,
        methods: &[Method],
        name: &str,
    ) -> Vec<&ApiResource> {
        let mut result = Vec::new();
        for method in methods {
            if let Some(indices) = self
                .by_endpoint_method
                .get(&(endpoint.to_owned(), *method))
            {
                result.extend(
                    indices
                        .iter()
                        .map(|&index| &self.producers[index])
                        .filter(|resource| resource.name() == name),
                );
            }
        }
        result
    }

    pub fn producers_for_request(&self, id: &RequestId) -> Vec<&ApiResource> {
        self.by_request
            .get(id)
            .map(|indices| indices.iter().map(|&index| &self.producers[index]).collect())
            .unwrap_or_default()
    }

    /// All producers on an endpoint and method, regardless of any
    /// `x-ms-paths` disambiguation, in insertion order.
    pub fn find_producers_at(&self, endpoint: &str, method: Method) -> Vec<&ApiResource> {
        self.by_endpoint_method
            .get(&(endpoint.to_owned(), method))
            .map(|indices| indices.iter().map(|&index| &self.producers[index]).collect())
            .unwrap_or_default()
    }

    /// Producers registered under a candidate type name, in match order.
    pub fn producers_for_type_name(&self, type_name: &str) -> Vec<&ApiResource> {
        let Some(indices) = self.by_type_name.get(type_name) else {
            return Vec::new();
        };
        self.sorted
            .iter()
            .copied()
            .filter(|index| indices.contains(index))
            .map(|index| &self.producers[index])
            .collect()
    }

    /// Producers with top-level access paths only, in match order.
    pub fn sorted_non_nested_producers(&self) -> impl Iterator<Item = &ApiResource> {
        self.sorted_non_nested
            .iter()
            .map(|&index| &self.producers[index])
    }

    pub fn same_body_producers(&self, id: &RequestId) -> &[ApiResource] {
        self.same_body
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Walks one request's response and returns its producers. Only creating
/// and reading methods produce; the first 2xx response is used, preferring
/// one that declares both a body schema and headers.
pub fn collect_response_producers(
    spec: &oas3::Spec,
    dictionary: &MutationsDictionary,
    cache: &SchemaCache,
    qualified: &QualifiedOperation<'_>,
    naming_convention: Option<NamingConvention>,
) -> Vec<ApiResource> {
    if !qualified.id.method.is_producer() {
        return Vec::new();
    }
    let Some(response) = producing_response(spec, qualified) else {
        return Vec::new();
    };

    let mut producers = Vec::new();

    if let Some(schema) = response
        .content
        .get_json_content()
        .and_then(|media_type| media_type.schema.as_ref())
    {
        let visitor = SchemaVisitor::new(spec, dictionary, VisitorConfig::default(), cache);
        match visitor.visit(schema, None) {
            Ok(Some(tree)) => collect_body_producers(&tree, qualified, naming_convention, &mut producers),
            Ok(None) => {}
            Err(err) => {
                log::warn!("response of {} not walked for producers: {err}", qualified.id)
            }
        }
    }

    for header_name in response.headers.keys() {
        producers.push(ApiResource::header(
            qualified.id.clone(),
            header_name.clone(),
            PrimitiveType::String,
            naming_convention,
        ));
    }

    producers
}

/// Picks the response whose payload produces values.
fn producing_response<'a>(
    spec: &oas3::Spec,
    qualified: &'a QualifiedOperation<'_>,
) -> Option<Response> {
    let responses = qualified.operation.responses.as_ref()?;
    let candidates: Vec<Response> = responses
        .iter()
        .filter(|(status, _)| {
            status
                .parse::<u16>()
                .is_ok_and(|code| PRODUCING_STATUS_RANGE.contains(&code))
        })
        .filter_map(|(_, ref_or_response)| ref_or_response.resolve(spec).ok())
        .collect();
    candidates
        .iter()
        .find(|response| {
            !response.headers.is_empty() && response.content.get_json_content().is_some()
        })
        .cloned()
        .or_else(|| candidates.into_iter().next())
}

fn collect_body_producers(
    tree: &PayloadTree,
    qualified: &QualifiedOperation<'_>,
    naming_convention: Option<NamingConvention>,
    producers: &mut Vec<ApiResource>,
) {
    tree.visit_leaves(|path, leaf| {
        let primitive_type = leaf_primitive_type(&leaf.payload);
        if !leaf.name.is_empty() {
            producers.push(ApiResource::body(
                qualified.id.clone(),
                path.clone(),
                primitive_type.clone(),
                naming_convention,
            ));
        }
        // An array of values also produces the array itself.
        if path.ends_in_array_index()
            && let Some(parent) = path.parent()
            && !parent.is_empty()
        {
            producers.push(ApiResource::body(
                qualified.id.clone(),
                parent,
                primitive_type,
                naming_convention,
            ));
        }
    });
}

pub fn leaf_primitive_type(payload: &FuzzingPayload) -> PrimitiveType {
    match payload {
        FuzzingPayload::Constant { primitive_type, .. }
        | FuzzingPayload::Fuzzable { primitive_type, .. }
        | FuzzingPayload::Custom { primitive_type, .. } => primitive_type.clone(),
        FuzzingPayload::DynamicObject(variable) => variable.primitive_type.clone(),
        FuzzingPayload::PayloadParts(_) => PrimitiveType::Object,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_path::AccessPath;
    use serde_json::json;

    fn producers_for(spec_json: serde_json::Value) -> (ProducerIndex, Vec<RequestId>) {
        let spec: oas3::Spec = serde_json::from_value(spec_json).unwrap();
        let document = crate::openapi::ApiDocument::new(spec);
        let dictionary = MutationsDictionary::default_dictionary();
        let cache = SchemaCache::default();
        let mut index = ProducerIndex::default();
        let mut requests = Vec::new();
        for qualified in document.operations() {
            requests.push(qualified.id.clone());
            for resource in
                collect_response_producers(document.spec(), &dictionary, &cache, &qualified, None)
            {
                index.add_response_producer(resource);
            }
        }
        index.finalize();
        (index, requests)
    }

    #[test]
    fn array_response_registers_element_and_array() {
        let (index, requests) = producers_for(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": {
                                                "type": "object",
                                                "properties": {"id": {"type": "string"}}
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }));
        let producers = index.producers_for_request(&requests[0]);
        let paths: Vec<String> = producers
            .iter()
            .map(|resource| resource.access_path().to_string())
            .collect();
        assert_eq!(paths, ["[0]/id"]);
        assert_eq!(
            producers[0].access_path(),
            AccessPath::from_segments(["[0]", "id"])
        );
    }

    #[test]
    fn delete_responses_produce_nothing() {
        let (index, requests) = producers_for(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items/{itemId}": {
                    "delete": {
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": {"id": {"type": "string"}}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }));
        assert!(index.producers_for_request(&requests[0]).is_empty());
    }

    #[test]
    fn response_headers_become_producers() {
        let (index, requests) = producers_for(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/files": {
                    "post": {
                        "responses": {
                            "201": {
                                "description": "created",
                                "headers": {
                                    "Location": {"schema": {"type": "string"}}
                                }
                            }
                        }
                    }
                }
            }
        }));
        let producers = index.producers_for_request(&requests[0]);
        assert_eq!(producers.len(), 1);
        assert_eq!(producers[0].name(), "Location");
    }

    #[test]
    fn named_lookup_prefers_method_order() {
        let (index, _) = producers_for(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/items": {
                    "get": {
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
                    },
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
                }
            }
        }));
        let found = index.find_named_producers("/items", &[Method::Post, Method::Get], "id");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].request_id.method, Method::Post);
    }

    #[test]
    fn type_name_index_covers_containers() {
        let (index, _) = producers_for(json!({
            "openapi": "3.1.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/stores": {
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
                }
            }
        }));
        assert_eq!(index.producers_for_type_name("store").len(), 1);
        assert_eq!(index.producers_for_type_name("stores").len(), 1);
        assert!(index.producers_for_type_name("order").is_empty());
    }
}
