//! Dependency resolution: picking, for every consumer, the producer that
//! supplies its value.
//!
//! Resolution walks a fixed priority chain; once a rung fires, the chain
//! stops. Annotations outrank everything, the mutations dictionary
//! outranks inference, exact endpoint matches outrank approximate ones,
//! and the body-local heuristics come last. Consumers nothing matches stay
//! in the index unresolved; they are reported, not fatal.

use itertools::Itertools;

use crate::{
    annotations::{AnnotationResourceReference, ProducerConsumerAnnotation},
    compiler::{
        api_resource::{
            candidate_type_names, ApiResource, Consumer, NamingConvention, Producer,
            ResourceReference,
        },
        dependencies::DependencyIndex,
        naming,
        producers::{leaf_primitive_type, ProducerIndex},
    },
    dictionary::{MutationsDictionary, ParameterKind},
    grammar::{ParameterPayload, ParameterPayloadSource, RequestId, RequestParameters},
    method::Method,
    payload::PayloadTree,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct ResolverOptions {
    pub allow_get_producers: bool,
    pub resolve_query_dependencies: bool,
    pub resolve_body_dependencies: bool,
    pub resolve_header_dependencies: bool,
    pub naming_convention: Option<NamingConvention>,
}

/// The consumers of one request, plus the same-body producers its body
/// declares. Collected per request, in parallel.
pub fn collect_consumers(
    id: &RequestId,
    parameters: &RequestParameters,
    naming_convention: Option<NamingConvention>,
) -> (Vec<Consumer>, Vec<ApiResource>) {
    let mut consumers = Vec::new();
    let mut same_body_producers = Vec::new();

    for parameter in &parameters.path {
        consumers.push(Consumer {
            resource: ApiResource::path_parameter(
                id.clone(),
                parameter.name.clone(),
                root_primitive_type(&parameter.payload),
                naming_convention,
            ),
            kind: ParameterKind::Path,
            annotation: None,
        });
    }
    if let Some((_, list)) = schema_entry(&parameters.query) {
        for parameter in list {
            consumers.push(Consumer {
                resource: ApiResource::query_parameter(
                    id.clone(),
                    parameter.name.clone(),
                    root_primitive_type(&parameter.payload),
                    naming_convention,
                ),
                kind: ParameterKind::Query,
                annotation: None,
            });
        }
    }
    if let Some((_, list)) = schema_entry(&parameters.header) {
        for parameter in list {
            consumers.push(Consumer {
                resource: ApiResource::header(
                    id.clone(),
                    parameter.name.clone(),
                    root_primitive_type(&parameter.payload),
                    naming_convention,
                ),
                kind: ParameterKind::Header,
                annotation: None,
            });
        }
    }
    for (source, body) in &parameters.body {
        if *source != ParameterPayloadSource::Schema {
            continue;
        }
        let ParameterPayload::List(list) = body else {
            continue;
        };
        for parameter in list {
            parameter.payload.visit_leaves(|path, leaf| {
                if leaf.name.is_empty() {
                    return;
                }
                let resource = ApiResource::body(
                    id.clone(),
                    path.clone(),
                    leaf_primitive_type(&leaf.payload),
                    naming_convention,
                );
                // A client-chosen name inside an identified container can
                // seed sibling properties of the same body.
                if leaf.name == "name" && path.container().is_some() {
                    same_body_producers.push(resource.clone());
                }
                consumers.push(Consumer {
                    resource,
                    kind: ParameterKind::Body,
                    annotation: None,
                });
            });
        }
        break;
    }

    (consumers, same_body_producers)
}

fn schema_entry<T>(entries: &[(ParameterPayloadSource, T)]) -> Option<&(ParameterPayloadSource, T)> {
    entries
        .iter()
        .find(|(source, _)| *source == ParameterPayloadSource::Schema)
}

fn root_primitive_type(tree: &PayloadTree) -> crate::payload::PrimitiveType {
    match tree {
        PayloadTree::Leaf(leaf) => leaf_primitive_type(&leaf.payload),
        PayloadTree::Inner(_) => crate::payload::PrimitiveType::Object,
    }
}

pub struct DependencyResolver<'a> {
    producers: &'a ProducerIndex,
    options: ResolverOptions,
    global_annotations: &'a [ProducerConsumerAnnotation],
    link_annotations: &'a [ProducerConsumerAnnotation],
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        producers: &'a ProducerIndex,
        options: ResolverOptions,
        global_annotations: &'a [ProducerConsumerAnnotation],
        link_annotations: &'a [ProducerConsumerAnnotation],
    ) -> Self {
        Self {
            producers,
            options,
            global_annotations,
            link_annotations,
        }
    }

    /// Resolves one consumer. `local_annotations` are the consumer
    /// request's own; `index` provides already-recorded resolutions for
    /// equality constraints; `dictionary` may gain uuid-suffix entries.
    pub fn resolve(
        &self,
        consumer: &Consumer,
        local_annotations: &[ProducerConsumerAnnotation],
        index: &DependencyIndex,
        dictionary: &mut MutationsDictionary,
    ) -> Option<Producer> {
        if let Some(producer) =
            self.annotation_producer(consumer, local_annotations, index, dictionary)
        {
            return Some(producer);
        }
        if let Some(producer) = self.input_writer_producer(consumer, local_annotations, dictionary)
        {
            return Some(producer);
        }
        if let Some(payload) = dictionary.find_custom_payload(
            consumer.kind,
            consumer.resource.json_pointer().as_deref(),
            consumer.resource.name(),
        ) {
            return Some(Producer::DictionaryPayload(payload));
        }
        if let Some(payload) = dictionary.find_uuid_suffix(
            consumer.resource.json_pointer().as_deref(),
            consumer.resource.name(),
        ) {
            return Some(Producer::DictionaryPayload(payload));
        }
        match consumer.kind {
            ParameterKind::Path => self
                .exact_path_match(consumer)
                .or_else(|| self.create_or_update_put(consumer, dictionary))
                .or_else(|| self.approximate_match(consumer)),
            ParameterKind::Query if self.options.resolve_query_dependencies => {
                self.approximate_match(consumer)
            }
            ParameterKind::Header if self.options.resolve_header_dependencies => {
                self.approximate_match(consumer)
            }
            ParameterKind::Body if self.options.resolve_body_dependencies => self
                .nested_object_match(consumer)
                .or_else(|| self.same_body_match(consumer, dictionary)),
            _ => None,
        }
    }

    /// Priority 1: an annotation that pins this consumer.
    fn annotation_producer(
        &self,
        consumer: &Consumer,
        local_annotations: &[ProducerConsumerAnnotation],
        index: &DependencyIndex,
        dictionary: &MutationsDictionary,
    ) -> Option<Producer> {
        let full_path = body_full_path(&consumer.resource);
        let annotation = local_annotations
            .iter()
            .chain(self.global_annotations)
            .chain(self.link_annotations)
            .filter(|annotation| annotation.producer_parameter.is_some())
            .filter(|annotation| {
                // The producer side of an annotation is the writer, not a
                // reader of itself; priority 2 handles it.
                annotation.is_equality_constraint()
                    || annotation.producer_id.endpoint != consumer.resource.request_id.endpoint
                    || annotation.producer_id.method != consumer.resource.request_id.method
                    || !annotation
                        .producer_parameter
                        .as_ref()
                        .is_some_and(|reference| {
                            reference.matches(consumer.resource.name(), full_path)
                        })
            })
            .find(|annotation| {
                annotation.applies_to(
                    &consumer.resource.request_id,
                    consumer.resource.name(),
                    full_path,
                )
            })?;

        if annotation.is_equality_constraint() {
            return self.equality_constraint_producer(consumer, annotation, index);
        }

        let reference = annotation.producer_parameter.as_ref()?;
        // A response field of the producer request takes precedence.
        if let Some(resource) = self.find_annotated_response_producer(annotation, reference) {
            return Some(Producer::ResponseObject { resource });
        }

        // Otherwise the annotation names an input of the producer request:
        // the consumer reads the writer variable that request assigns.
        let resource = self.input_resource(&annotation.producer_id, reference);
        let dictionary_payload = reference.name().and_then(|name| {
            dictionary
                .find_custom_payload(ParameterKind::Body, None, name)
                .or_else(|| dictionary.find_uuid_suffix(None, name))
        });
        Some(Producer::InputParameter {
            resource,
            dictionary_payload,
            is_writer: false,
        })
    }

    fn find_annotated_response_producer(
        &self,
        annotation: &ProducerConsumerAnnotation,
        reference: &AnnotationResourceReference,
    ) -> Option<ApiResource> {
        self.producers
            .find_producers_at(
                &annotation.producer_id.endpoint,
                annotation.producer_id.method,
            )
            .into_iter()
            .find(|resource| {
                reference.matches(resource.name(), body_full_path(resource))
            })
            .cloned()
    }

    /// An annotation whose producer and consumer coincide equates two
    /// parameters of one request: reuse whatever the producer side already
    /// resolved to.
    fn equality_constraint_producer(
        &self,
        consumer: &Consumer,
        annotation: &ProducerConsumerAnnotation,
        index: &DependencyIndex,
    ) -> Option<Producer> {
        let reference = annotation.producer_parameter.as_ref()?;
        let name = reference.name()?;
        for kind in [
            ParameterKind::Path,
            ParameterKind::Query,
            ParameterKind::Header,
            ParameterKind::Body,
        ] {
            let access_path = match reference {
                AnnotationResourceReference::Path(path) => path.to_string(),
                AnnotationResourceReference::Name(name) => name.clone(),
            };
            if let Some(dependency) =
                index.lookup(&consumer.resource.request_id, kind, &access_path)
                && let Some(producer) = &dependency.producer
            {
                return Some(producer.clone());
            }
        }
        log::warn!(
            "cannot apply equality constraint for {} on {}: {name} has no resolved producer",
            consumer.resource.name(),
            consumer.resource.request_id,
        );
        None
    }

    /// Priority 2: the consumer is itself the writer of an input-only
    /// producer some annotation declares.
    fn input_writer_producer(
        &self,
        consumer: &Consumer,
        local_annotations: &[ProducerConsumerAnnotation],
        dictionary: &mut MutationsDictionary,
    ) -> Option<Producer> {
        let full_path = body_full_path(&consumer.resource);
        let declares_this_writer = local_annotations
            .iter()
            .chain(self.global_annotations)
            .chain(self.link_annotations)
            .any(|annotation| {
                annotation.producer_id.endpoint == consumer.resource.request_id.endpoint
                    && annotation.producer_id.method == consumer.resource.request_id.method
                    && annotation
                        .producer_parameter
                        .as_ref()
                        .is_some_and(|reference| {
                            reference.matches(consumer.resource.name(), full_path)
                        })
            });
        if !declares_this_writer {
            return None;
        }
        // A value the response also carries is not input-only.
        let produced_in_response = self
            .producers
            .find_producers_at(
                &consumer.resource.request_id.endpoint,
                consumer.resource.request_id.method,
            )
            .into_iter()
            .any(|resource| resource.name() == consumer.resource.name());
        if produced_in_response {
            return None;
        }

        let mut dictionary_payload = dictionary
            .find_custom_payload(
                consumer.kind,
                consumer.resource.json_pointer().as_deref(),
                consumer.resource.name(),
            )
            .or_else(|| {
                dictionary.find_uuid_suffix(
                    consumer.resource.json_pointer().as_deref(),
                    consumer.resource.name(),
                )
            });
        if dictionary_payload.is_none()
            && consumer.resource.primitive_type == crate::payload::PrimitiveType::String
        {
            dictionary_payload = Some(dictionary.add_uuid_suffix(
                consumer.resource.name(),
                naming::uuid_suffix_prefix(consumer.resource.name()),
            ));
        }
        Some(Producer::InputParameter {
            resource: consumer.resource.clone(),
            dictionary_payload,
            is_writer: true,
        })
    }

    /// Priority 5: a producer at exactly the endpoint prefix the path
    /// parameter names.
    fn exact_path_match(&self, consumer: &Consumer) -> Option<Producer> {
        let endpoint = consumer.resource.producer_endpoint()?;
        let mut methods = vec![Method::Post, Method::Put];
        if self.options.allow_get_producers {
            methods.push(Method::Get);
        }
        let inferred = consumer.resource.inferred_resource_name();
        let mut names = vec![inferred];
        if !names.contains(&consumer.resource.name().to_owned()) {
            names.push(consumer.resource.name().to_owned());
        }
        for name in names {
            let candidates: Vec<&ApiResource> = self
                .producers
                .find_named_producers(&endpoint, &methods, &name)
                .into_iter()
                .filter(|producer| self.is_valid_producer(producer, consumer))
                .collect();
            if let Some(best) = self.best_candidate(candidates) {
                return Some(Producer::ResponseObject {
                    resource: best.clone(),
                });
            }
        }
        None
    }

    /// Priority 6: a PUT request creates the resource its trailing path
    /// parameter names, so the name is generated: a uuid-suffix payload.
    /// Earlier parameters look for the parent's PUT producer first.
    fn create_or_update_put(
        &self,
        consumer: &Consumer,
        dictionary: &mut MutationsDictionary,
    ) -> Option<Producer> {
        if consumer.resource.request_id.method != Method::Put {
            return None;
        }
        let name = consumer.resource.name().to_owned();
        let endpoint = &consumer.resource.request_id.endpoint;
        if !endpoint.ends_with(&format!("{{{name}}}")) {
            let prefix = consumer.resource.producer_endpoint()?;
            let mut candidate_names = vec![consumer.resource.inferred_resource_name()];
            for common in ["id", "name"] {
                if !candidate_names.iter().any(|existing| existing == common) {
                    candidate_names.push(common.to_owned());
                }
            }
            for candidate_name in candidate_names {
                let found: Vec<&ApiResource> = self
                    .producers
                    .find_named_producers(&prefix, &[Method::Put], &candidate_name)
                    .into_iter()
                    .filter(|producer| self.is_valid_producer(producer, consumer))
                    .collect();
                if let Some(best) = self.best_candidate(found) {
                    return Some(Producer::ResponseObject {
                        resource: best.clone(),
                    });
                }
            }
        }
        let payload = dictionary.add_uuid_suffix(&name, naming::uuid_suffix_prefix(&name));
        Some(Producer::DictionaryPayload(payload))
    }

    /// Priority 7: match a body property through the type name of its
    /// enclosing container. Only an unambiguous (single-endpoint) match
    /// binds.
    fn nested_object_match(&self, consumer: &Consumer) -> Option<Producer> {
        let container = consumer.resource.body_container_name()?;
        let candidates = candidate_type_names(container, self.options.naming_convention);
        let inferred = consumer.resource.inferred_resource_name();
        let mut names = vec![inferred];
        if !names.contains(&consumer.resource.name().to_owned()) {
            names.push(consumer.resource.name().to_owned());
        }

        let mut candidate_names = candidates.iter();
        let primary = candidate_names.next()?;
        let primary_matches = self.type_name_matches(primary, consumer, &names);
        if let Some(producer) = self.single_endpoint_choice(&primary_matches) {
            return Some(producer);
        }
        if !primary_matches.is_empty() {
            // Several endpoints matched the most specific name; anything
            // less specific would only be more ambiguous.
            return None;
        }
        for candidate in candidate_names {
            let matches = self.type_name_matches(candidate, consumer, &names);
            if let Some(producer) = self.single_endpoint_choice(&matches) {
                return Some(producer);
            }
            if !matches.is_empty() {
                return None;
            }
        }
        None
    }

    fn type_name_matches(
        &self,
        type_name: &str,
        consumer: &Consumer,
        names: &[String],
    ) -> Vec<ApiResource> {
        self.producers
            .producers_for_type_name(type_name)
            .into_iter()
            .filter(|producer| producer.request_id != consumer.resource.request_id)
            .filter(|producer| names.iter().any(|name| producer.name() == name))
            .filter(|producer| self.producer_method_allowed(producer))
            .cloned()
            .collect()
    }

    fn single_endpoint_choice(&self, matches: &[ApiResource]) -> Option<Producer> {
        let endpoints: Vec<&str> = matches
            .iter()
            .map(|resource| resource.request_id.endpoint.as_str())
            .unique()
            .collect();
        if endpoints.len() == 1 {
            return Some(Producer::ResponseObject {
                resource: matches[0].clone(),
            });
        }
        None
    }

    /// Priority 8: walk the match ordering and accept a producer whose
    /// endpoint is a prefix of the inferred producer endpoint with only
    /// literal segments in between. Only top-level response fields
    /// participate in approximate matching.
    fn approximate_match(&self, consumer: &Consumer) -> Option<Producer> {
        let inferred_endpoint = match consumer.kind {
            ParameterKind::Path => consumer.resource.producer_endpoint()?,
            _ => consumer.resource.request_id.endpoint.clone(),
        };
        let container = consumer.resource.container_name()?;
        let producer_name = consumer.resource.inferred_resource_name();
        for producer in self.producers.sorted_non_nested_producers() {
            if !self.is_valid_producer(producer, consumer) {
                continue;
            }
            let producer_endpoint = &producer.request_id.endpoint;
            let matches_endpoint = if producer_endpoint == &inferred_endpoint {
                producer
                    .request_id
                    .method
                    .may_feed_same_endpoint(consumer.resource.request_id.method)
            } else if let Some(between) = inferred_endpoint.strip_prefix(producer_endpoint.as_str())
            {
                !between.contains('{')
            } else {
                false
            };
            if !matches_endpoint {
                continue;
            }
            if producer.container_name().as_deref() == Some(container.as_str())
                && producer.name() == producer_name
            {
                return Some(Producer::ResponseObject {
                    resource: producer.clone(),
                });
            }
        }
        None
    }

    /// Priority 9: an `id` body property fed from a `name` elsewhere in
    /// the same body. Creates the uuid-suffix entry the engine fills the
    /// name slot from.
    fn same_body_match(
        &self,
        consumer: &Consumer,
        dictionary: &mut MutationsDictionary,
    ) -> Option<Producer> {
        if consumer.resource.name() != "id" {
            return None;
        }
        let consumer_candidates =
            candidate_type_names(&consumer.resource.container_name()?, self.options.naming_convention);
        let consumer_path = consumer.resource.access_path();

        let mut best: Option<(usize, &ApiResource)> = None;
        for producer in self
            .producers
            .same_body_producers(&consumer.resource.request_id)
        {
            let producer_path = producer.access_path();
            if producer_path == consumer_path || producer_path.starts_with(&consumer_path) {
                continue;
            }
            let Some(producer_container) = producer.body_container_name() else {
                continue;
            };
            let producer_candidates =
                candidate_type_names(producer_container, self.options.naming_convention);
            let score = consumer_candidates
                .iter()
                .filter(|&candidate| producer_candidates.contains(candidate))
                .map(|candidate| candidate.len())
                .max();
            if let Some(score) = score
                && best.as_ref().is_none_or(|(best_score, _)| score > *best_score)
            {
                best = Some((score, producer));
            }
        }

        let (_, producer) = best?;
        let key = format!(
            "{}_{}",
            producer.body_container_name().unwrap_or_default(),
            producer.name()
        );
        dictionary.add_uuid_suffix(&key, naming::uuid_suffix_prefix(&key));
        Some(Producer::SameBodyPayload {
            resource: producer.clone(),
        })
    }

    fn producer_method_allowed(&self, producer: &ApiResource) -> bool {
        match producer.request_id.method {
            Method::Post | Method::Put | Method::Patch => true,
            Method::Get => self.options.allow_get_producers,
            _ => false,
        }
    }

    /// Shared validity filter: method allowed, endpoint not extending
    /// beyond the consumer's, same-endpoint pairs gated by the method
    /// transition matrix.
    fn is_valid_producer(&self, producer: &ApiResource, consumer: &Consumer) -> bool {
        if !self.producer_method_allowed(producer) {
            return false;
        }
        let producer_endpoint = &producer.request_id.endpoint;
        let consumer_endpoint = &consumer.resource.request_id.endpoint;
        if producer_endpoint == consumer_endpoint {
            return producer
                .request_id
                .method
                .may_feed_same_endpoint(consumer.resource.request_id.method);
        }
        consumer_endpoint.starts_with(producer_endpoint.as_str())
    }

    /// Orders equally-named candidates: shortest access path, then method
    /// preference, then stable collection order.
    fn best_candidate<'b>(&self, mut candidates: Vec<&'b ApiResource>) -> Option<&'b ApiResource> {
        candidates.sort_by_key(|resource| {
            (
                resource.access_path().len(),
                resource.request_id.method.producer_preference(),
            )
        });
        candidates.first().copied()
    }

    fn input_resource(
        &self,
        producer_id: &RequestId,
        reference: &AnnotationResourceReference,
    ) -> ApiResource {
        match reference {
            AnnotationResourceReference::Path(path) => ApiResource::body(
                producer_id.clone(),
                path.clone(),
                crate::payload::PrimitiveType::String,
                self.options.naming_convention,
            ),
            AnnotationResourceReference::Name(name) => {
                if producer_id.endpoint.contains(&format!("{{{name}}}")) {
                    ApiResource::path_parameter(
                        producer_id.clone(),
                        name.clone(),
                        crate::payload::PrimitiveType::String,
                        self.options.naming_convention,
                    )
                } else {
                    ApiResource::query_parameter(
                        producer_id.clone(),
                        name.clone(),
                        crate::payload::PrimitiveType::String,
                        self.options.naming_convention,
                    )
                }
            }
        }
    }
}

fn body_full_path(resource: &ApiResource) -> Option<&crate::access_path::AccessPath> {
    match &resource.reference {
        ResourceReference::Body { full_path, .. } => Some(full_path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access_path::AccessPath,
        payload::{CustomPayloadType, PrimitiveType},
    };

    fn path_consumer(endpoint: &str, method: Method, name: &str) -> Consumer {
        Consumer {
            resource: ApiResource::path_parameter(
                RequestId::new(endpoint, method),
                name,
                PrimitiveType::String,
                None,
            ),
            kind: ParameterKind::Path,
            annotation: None,
        }
    }

    fn body_producer(endpoint: &str, method: Method, segments: &[&str]) -> ApiResource {
        ApiResource::body(
            RequestId::new(endpoint, method),
            AccessPath::from_segments(segments.iter().copied()),
            PrimitiveType::String,
            None,
        )
    }

    fn index_with(producers: Vec<ApiResource>) -> ProducerIndex {
        let mut index = ProducerIndex::default();
        for producer in producers {
            index.add_response_producer(producer);
        }
        index.finalize();
        index
    }

    fn resolver<'a>(
        index: &'a ProducerIndex,
        options: ResolverOptions,
    ) -> DependencyResolver<'a> {
        DependencyResolver::new(index, options, &[], &[])
    }

    #[test]
    fn put_path_parameters_materialize_uuid_suffixes() {
        // S1: PUT /stores/{storeId}/orders/{orderId} with no producers.
        let index = index_with(vec![]);
        let resolver = resolver(&index, ResolverOptions::default());
        let mut dictionary = MutationsDictionary::default_dictionary();
        let dependency_index = DependencyIndex::default();

        let order = path_consumer("/stores/{storeId}/orders/{orderId}", Method::Put, "orderId");
        let producer = resolver
            .resolve(&order, &[], &dependency_index, &mut dictionary)
            .unwrap();
        let Producer::DictionaryPayload(payload) = producer else {
            panic!("expected dictionary payload")
        };
        assert_eq!(payload.payload_type, CustomPayloadType::UuidSuffix);
        assert_eq!(payload.name, "orderId");

        let store = path_consumer("/stores/{storeId}/orders/{orderId}", Method::Put, "storeId");
        resolver
            .resolve(&store, &[], &dependency_index, &mut dictionary)
            .unwrap();
        assert!(dictionary
            .restler_custom_payload_uuid4_suffix
            .contains_key("storeId"));
        assert!(dictionary
            .restler_custom_payload_uuid4_suffix
            .contains_key("orderId"));
    }

    #[test]
    fn get_producer_needs_opt_in() {
        // S2: GET /items/{itemId} with only GET /items returning [{id}].
        let index = index_with(vec![body_producer("/items", Method::Get, &["[0]", "id"])]);
        let consumer = path_consumer("/items/{itemId}", Method::Get, "itemId");
        let dependency_index = DependencyIndex::default();

        let strict = resolver(&index, ResolverOptions::default());
        let mut dictionary = MutationsDictionary::default_dictionary();
        assert_eq!(
            strict.resolve(&consumer, &[], &dependency_index, &mut dictionary),
            None
        );

        let permissive = resolver(
            &index,
            ResolverOptions {
                allow_get_producers: true,
                ..Default::default()
            },
        );
        let producer = permissive
            .resolve(&consumer, &[], &dependency_index, &mut dictionary)
            .unwrap();
        let Producer::ResponseObject { resource } = producer else {
            panic!("expected response producer")
        };
        assert_eq!(resource.request_id, RequestId::new("/items", Method::Get));
        assert_eq!(resource.access_path(), AccessPath::from_segments(["[0]", "id"]));
    }

    #[test]
    fn post_is_preferred_over_get() {
        let index = index_with(vec![
            body_producer("/items", Method::Get, &["[0]", "id"]),
            body_producer("/items", Method::Post, &["id"]),
        ]);
        let consumer = path_consumer("/items/{itemId}", Method::Get, "itemId");
        let permissive = resolver(
            &index,
            ResolverOptions {
                allow_get_producers: true,
                ..Default::default()
            },
        );
        let mut dictionary = MutationsDictionary::default_dictionary();
        let producer = permissive
            .resolve(&consumer, &[], &DependencyIndex::default(), &mut dictionary)
            .unwrap();
        let Producer::ResponseObject { resource } = producer else {
            panic!("expected response producer")
        };
        assert_eq!(resource.request_id.method, Method::Post);
    }

    #[test]
    fn dictionary_payload_outranks_inference() {
        let index = index_with(vec![body_producer("/items", Method::Post, &["id"])]);
        let consumer = path_consumer("/items/{itemId}", Method::Get, "itemId");
        let resolver = resolver(&index, ResolverOptions::default());
        let mut dictionary = MutationsDictionary::default_dictionary();
        dictionary
            .restler_custom_payload
            .insert("itemId".to_owned(), vec!["fixed-id".to_owned()]);
        let producer = resolver
            .resolve(&consumer, &[], &DependencyIndex::default(), &mut dictionary)
            .unwrap();
        assert!(matches!(producer, Producer::DictionaryPayload(_)));
    }

    #[test]
    fn same_body_name_feeds_root_id() {
        // S4: POST /archive with body { archives: [{name}], id }.
        let request = RequestId::new("/archive", Method::Post);
        let mut index = ProducerIndex::default();
        index.add_same_body_producer(ApiResource::body(
            request.clone(),
            AccessPath::from_segments(["archives", "[0]", "name"]),
            PrimitiveType::String,
            None,
        ));
        index.finalize();
        let resolver = DependencyResolver::new(
            &index,
            ResolverOptions {
                resolve_body_dependencies: true,
                ..Default::default()
            },
            &[],
            &[],
        );
        let consumer = Consumer {
            resource: ApiResource::body(
                request,
                AccessPath::from_segments(["id"]),
                PrimitiveType::String,
                None,
            ),
            kind: ParameterKind::Body,
            annotation: None,
        };
        let mut dictionary = MutationsDictionary::default_dictionary();
        let producer = resolver
            .resolve(&consumer, &[], &DependencyIndex::default(), &mut dictionary)
            .unwrap();
        let Producer::SameBodyPayload { resource } = producer else {
            panic!("expected same-body producer")
        };
        assert_eq!(
            resource.access_path(),
            AccessPath::from_segments(["archives", "[0]", "name"])
        );
        assert!(dictionary
            .restler_custom_payload_uuid4_suffix
            .contains_key("archives_name"));
    }

    #[test]
    fn annotation_reader_binds_input_writer() {
        // S6: POST /file/{fileId} produces fileId, PUT consumes it.
        let annotations = crate::annotations::annotations_from_value(&serde_json::json!([{
            "producer_endpoint": "/file/{fileId}",
            "producer_method": "POST",
            "producer_resource_name": "fileId",
            "consumer_param": "fileId"
        }]));
        let index = index_with(vec![]);
        let resolver = DependencyResolver::new(
            &index,
            ResolverOptions::default(),
            &annotations,
            &[],
        );
        let mut dictionary = MutationsDictionary::default_dictionary();
        let dependency_index = DependencyIndex::default();

        // The writer side: the POST's own fileId parameter.
        let writer_consumer = path_consumer("/file/{fileId}", Method::Post, "fileId");
        let writer = resolver
            .resolve(&writer_consumer, &[], &dependency_index, &mut dictionary)
            .unwrap();
        let Producer::InputParameter {
            is_writer: true,
            dictionary_payload: Some(payload),
            ..
        } = &writer
        else {
            panic!("expected input writer, got {writer:?}")
        };
        assert_eq!(payload.payload_type, CustomPayloadType::UuidSuffix);

        // The reader side: the PUT's fileId parameter.
        let reader_consumer = path_consumer("/file/{fileId}/content", Method::Put, "fileId");
        let reader = resolver
            .resolve(&reader_consumer, &[], &dependency_index, &mut dictionary)
            .unwrap();
        let Producer::InputParameter {
            is_writer: false,
            resource,
            ..
        } = &reader
        else {
            panic!("expected input reader, got {reader:?}")
        };
        assert_eq!(resource.request_id, RequestId::new("/file/{fileId}", Method::Post));
        assert_eq!(resource.name(), "fileId");
    }

    #[test]
    fn query_inference_is_gated() {
        let index = index_with(vec![body_producer("/stores", Method::Post, &["id"])]);
        let consumer = Consumer {
            resource: ApiResource::query_parameter(
                RequestId::new("/stores", Method::Get),
                "storeId",
                PrimitiveType::String,
                None,
            ),
            kind: ParameterKind::Query,
            annotation: None,
        };
        let mut dictionary = MutationsDictionary::default_dictionary();

        let disabled = resolver(&index, ResolverOptions::default());
        assert_eq!(
            disabled.resolve(&consumer, &[], &DependencyIndex::default(), &mut dictionary),
            None
        );

        let enabled = resolver(
            &index,
            ResolverOptions {
                resolve_query_dependencies: true,
                ..Default::default()
            },
        );
        let producer = enabled
            .resolve(&consumer, &[], &DependencyIndex::default(), &mut dictionary)
            .unwrap();
        assert!(matches!(producer, Producer::ResponseObject { .. }));
    }
}
