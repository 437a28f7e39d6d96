//! The dependency index: one entry per consumer, resolved or not.
//!
//! The index is keyed by consumer identity (request, parameter kind,
//! access path), which makes duplicate resolutions from different call
//! sites coalesce naturally. Two *different* producers for one consumer
//! mean the resolution logic contradicted itself, which is fatal.

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    compiler::api_resource::{ApiResource, Consumer, Producer, ResourceReference},
    dictionary::ParameterKind,
    grammar::RequestId,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dependency {
    pub consumer: Consumer,
    pub producer: Option<Producer>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct DependencyKey {
    request: RequestId,
    kind: ParameterKind,
    access_path: String,
}

impl DependencyKey {
    fn of(consumer: &Consumer) -> Self {
        Self {
            request: consumer.resource.request_id.clone(),
            kind: consumer.kind,
            access_path: consumer.resource.access_path().to_string(),
        }
    }
}

/// Raised when two different producers are recorded for one consumer.
#[derive(Debug)]
pub struct InconsistentProducerError {
    request: RequestId,
    access_path: String,
}

impl Display for InconsistentProducerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "conflicting producers for consumer {} of {}",
            self.access_path, self.request
        )
    }
}

impl std::error::Error for InconsistentProducerError {}

#[derive(Default)]
pub struct DependencyIndex {
    entries: IndexMap<DependencyKey, Dependency>,
    /// Execute-before edges: (producer request, consumer request).
    ordering_constraints: Vec<(RequestId, RequestId)>,
}

impl DependencyIndex {
    /// Records a resolution. Duplicate identical producers coalesce;
    /// `None` never downgrades an existing resolution.
    pub fn record(
        &mut self,
        consumer: Consumer,
        producer: Option<Producer>,
    ) -> Result<(), InconsistentProducerError> {
        let key = DependencyKey::of(&consumer);
        match self.entries.entry(key) {
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(Dependency { consumer, producer });
                Ok(())
            }
            indexmap::map::Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                match (&existing.producer, producer) {
                    (_, None) => Ok(()),
                    (None, Some(producer)) => {
                        existing.producer = Some(producer);
                        Ok(())
                    }
                    (Some(current), Some(new)) if *current == new => Ok(()),
                    (Some(_), Some(_)) => Err(InconsistentProducerError {
                        request: existing.consumer.resource.request_id.clone(),
                        access_path: existing.consumer.resource.access_path().to_string(),
                    }),
                }
            }
        }
    }

    pub fn lookup(
        &self,
        request: &RequestId,
        kind: ParameterKind,
        access_path: &str,
    ) -> Option<&Dependency> {
        self.entries.get(&DependencyKey {
            request: request.clone(),
            kind,
            access_path: access_path.to_owned(),
        })
    }

    pub fn add_ordering_constraint(&mut self, producer: RequestId, consumer: RequestId) {
        if producer != consumer
            && !self
                .ordering_constraints
                .contains(&(producer.clone(), consumer.clone()))
        {
            self.ordering_constraints.push((producer, consumer));
        }
    }

    pub fn ordering_constraints(&self) -> &[(RequestId, RequestId)] {
        &self.ordering_constraints
    }

    /// Rewrites consumers of input-parameter producers whose own value
    /// comes from a response: the consumer reads the response variable
    /// directly, and an execute-before edge keeps the input's request
    /// ahead of the consumer's.
    pub fn convert_input_producer_chains(&mut self) {
        let keys: Vec<DependencyKey> = self.entries.keys().cloned().collect();
        for key in keys {
            let Some(dependency) = self.entries.get(&key) else {
                continue;
            };
            let Some(Producer::InputParameter {
                resource,
                is_writer: false,
                ..
            }) = &dependency.producer
            else {
                continue;
            };
            // Does the input parameter itself consume a response value?
            let input_key = DependencyKey {
                request: resource.request_id.clone(),
                kind: input_parameter_kind(resource),
                access_path: resource.access_path().to_string(),
            };
            let Some(Dependency {
                producer: Some(Producer::ResponseObject { resource: upstream }),
                ..
            }) = self.entries.get(&input_key)
            else {
                continue;
            };
            let upstream = upstream.clone();
            let input_request = resource.request_id.clone();
            let consumer_request = key.request.clone();
            if let Some(dependency) = self.entries.get_mut(&key) {
                dependency.producer = Some(Producer::ResponseObject { resource: upstream });
            }
            self.add_ordering_constraint(input_request, consumer_request);
        }
    }

    /// All dependencies sorted by consumer request and access path.
    pub fn sorted_dependencies(&self) -> Vec<&Dependency> {
        self.entries
            .iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, dependency)| dependency)
            .collect()
    }

    pub fn unresolved(&self) -> Vec<&Dependency> {
        self.sorted_dependencies()
            .into_iter()
            .filter(|dependency| dependency.producer.is_none())
            .collect()
    }

    /// The response producers of `request` that some other consumer reads,
    /// deduplicated, split into body and header producers.
    pub fn consumed_response_producers(
        &self,
        request: &RequestId,
    ) -> (Vec<ApiResource>, Vec<ApiResource>) {
        let mut body = Vec::new();
        let mut headers = Vec::new();
        for dependency in self.sorted_dependencies() {
            let Some(Producer::ResponseObject { resource }) = &dependency.producer else {
                continue;
            };
            if resource.request_id != *request {
                continue;
            }
            let bucket = match &resource.reference {
                ResourceReference::Header { .. } => &mut headers,
                _ => &mut body,
            };
            if !bucket.contains(resource) {
                bucket.push(resource.clone());
            }
        }
        (body, headers)
    }

    /// The input-parameter writers of `request`: values the engine assigns
    /// when invoking it and exposes as variables.
    pub fn input_writers(&self, request: &RequestId) -> Vec<ApiResource> {
        let mut writers = Vec::new();
        for dependency in self.sorted_dependencies() {
            let Some(Producer::InputParameter {
                resource,
                is_writer: true,
                ..
            }) = &dependency.producer
            else {
                continue;
            };
            if resource.request_id == *request && !writers.contains(resource) {
                writers.push(resource.clone());
            }
        }
        writers
    }

}

fn input_parameter_kind(resource: &ApiResource) -> ParameterKind {
    match &resource.reference {
        ResourceReference::Path { .. } => ParameterKind::Path,
        ResourceReference::Query { .. } => ParameterKind::Query,
        ResourceReference::Header { .. } => ParameterKind::Header,
        ResourceReference::Body { .. } => ParameterKind::Body,
    }
}

/// The annotation-shaped form written to `dependencies.json` and
/// `unresolved_dependencies.json`.
#[derive(Debug, Serialize)]
pub struct AnnotationShapedDependency {
    pub producer_endpoint: Option<String>,
    pub producer_method: Option<String>,
    pub producer_resource_name: Option<String>,
    pub consumer_param: String,
}

impl AnnotationShapedDependency {
    pub fn from_dependency(dependency: &Dependency) -> Self {
        let (producer_endpoint, producer_method, producer_resource_name) =
            match &dependency.producer {
                Some(
                    Producer::ResponseObject { resource }
                    | Producer::InputParameter { resource, .. }
                    | Producer::SameBodyPayload { resource },
                ) => (
                    Some(resource.request_id.endpoint.clone()),
                    Some(resource.request_id.method.to_string()),
                    Some(producer_resource_label(resource)),
                ),
                Some(Producer::DictionaryPayload(payload)) => {
                    (None, None, Some(payload.name.clone()))
                }
                Some(Producer::OrderingConstraint { request_id }) => (
                    Some(request_id.endpoint.clone()),
                    Some(request_id.method.to_string()),
                    None,
                ),
                None => (None, None, None),
            };
        Self {
            producer_endpoint,
            producer_method,
            producer_resource_name,
            consumer_param: consumer_resource_label(&dependency.consumer.resource),
        }
    }
}

fn producer_resource_label(resource: &ApiResource) -> String {
    match &resource.reference {
        ResourceReference::Body { full_path, .. } => full_path.to_json_pointer(),
        _ => resource.name().to_owned(),
    }
}

fn consumer_resource_label(resource: &ApiResource) -> String {
    match &resource.reference {
        ResourceReference::Body { full_path, .. } => full_path.to_json_pointer(),
        _ => resource.name().to_owned(),
    }
}

/// Groups dependencies by consumer endpoint, method and parameter kind for
/// the grouped artifacts.
pub fn group_dependencies(
    dependencies: &[&Dependency],
) -> IndexMap<String, IndexMap<String, IndexMap<String, Vec<AnnotationShapedDependency>>>> {
    let mut grouped: IndexMap<String, IndexMap<String, IndexMap<String, Vec<AnnotationShapedDependency>>>> =
        IndexMap::new();
    for dependency in dependencies {
        let id = &dependency.consumer.resource.request_id;
        grouped
            .entry(id.endpoint.clone())
            .or_default()
            .entry(id.method.as_str().to_lowercase())
            .or_default()
            .entry(format!("{:?}", dependency.consumer.kind))
            .or_default()
            .push(AnnotationShapedDependency::from_dependency(dependency));
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access_path::AccessPath, method::Method, payload::PrimitiveType,
    };

    fn consumer(endpoint: &str, method: Method, name: &str) -> Consumer {
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

    fn response_producer(endpoint: &str, method: Method, path: &[&str]) -> Producer {
        Producer::ResponseObject {
            resource: ApiResource::body(
                RequestId::new(endpoint, method),
                AccessPath::from_segments(path.iter().copied()),
                PrimitiveType::String,
                None,
            ),
        }
    }

    #[test]
    fn identical_producers_coalesce() {
        let mut index = DependencyIndex::default();
        let consumer = consumer("/items/{itemId}", Method::Get, "itemId");
        let producer = response_producer("/items", Method::Post, &["id"]);
        index
            .record(consumer.clone(), Some(producer.clone()))
            .unwrap();
        index.record(consumer.clone(), Some(producer)).unwrap();
        assert_eq!(index.sorted_dependencies().len(), 1);

        let conflicting = response_producer("/others", Method::Post, &["id"]);
        assert!(index.record(consumer, Some(conflicting)).is_err());
    }

    #[test]
    fn none_does_not_downgrade() {
        let mut index = DependencyIndex::default();
        let consumer = consumer("/items/{itemId}", Method::Get, "itemId");
        let producer = response_producer("/items", Method::Post, &["id"]);
        index.record(consumer.clone(), Some(producer)).unwrap();
        index.record(consumer, None).unwrap();
        assert!(index.unresolved().is_empty());
    }

    #[test]
    fn input_chains_become_ordering_constraints() {
        let mut index = DependencyIndex::default();

        // The POST's fileId path parameter reads a response value.
        let post_consumer = consumer("/file/{fileId}", Method::Post, "fileId");
        let upstream = response_producer("/file", Method::Post, &["id"]);
        index.record(post_consumer, Some(upstream.clone())).unwrap();

        // The PUT's fileId consumer reads the POST's input parameter.
        let put_consumer = consumer("/file/{fileId}/content", Method::Put, "fileId");
        let input_producer = Producer::InputParameter {
            resource: ApiResource::path_parameter(
                RequestId::new("/file/{fileId}", Method::Post),
                "fileId",
                PrimitiveType::String,
                None,
            ),
            dictionary_payload: None,
            is_writer: false,
        };
        index.record(put_consumer.clone(), Some(input_producer)).unwrap();

        index.convert_input_producer_chains();

        let rewritten = index
            .lookup(
                &RequestId::new("/file/{fileId}/content", Method::Put),
                ParameterKind::Path,
                "fileId",
            )
            .unwrap();
        assert_eq!(rewritten.producer, Some(upstream));
        assert_eq!(
            index.ordering_constraints(),
            &[(
                RequestId::new("/file/{fileId}", Method::Post),
                RequestId::new("/file/{fileId}/content", Method::Put)
            )]
        );
    }

    #[test]
    fn consumed_producers_deduplicate() {
        let mut index = DependencyIndex::default();
        let producer = response_producer("/items", Method::Post, &["id"]);
        index
            .record(consumer("/items/{itemId}", Method::Get, "itemId"), Some(producer.clone()))
            .unwrap();
        index
            .record(
                consumer("/items/{itemId}", Method::Delete, "itemId"),
                Some(producer),
            )
            .unwrap();
        let (body, headers) =
            index.consumed_response_producers(&RequestId::new("/items", Method::Post));
        assert_eq!(body.len(), 1);
        assert!(headers.is_empty());
    }
}
