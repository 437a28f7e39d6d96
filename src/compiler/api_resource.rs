//! Resources: the nameable value slots of an API.
//!
//! A [`Consumer`] is a parameter position that needs a value; a
//! [`Producer`] is a place a value can come from. Both sides are described
//! by an [`ApiResource`]: the owning request, where in the request or
//! response the resource sits, and its primitive type. Matching between the
//! two sides happens through names, which is where naming conventions and
//! candidate type names come in.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    access_path::AccessPath,
    annotations::ProducerConsumerAnnotation,
    dictionary::{DictionaryPayload, ParameterKind},
    grammar::RequestId,
    payload::PrimitiveType,
};

/// The identifier convention an API uses for multi-word names. When the
/// user does not choose one, it is inferred per name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
pub enum NamingConvention {
    CamelCase,
    PascalCase,
    HyphenSeparator,
    UnderscoreSeparator,
}

/// Splits a name into lowercased words following the given convention, or
/// a per-name inferred one.
pub fn split_words(name: &str, convention: Option<NamingConvention>) -> Vec<String> {
    let convention = convention.unwrap_or_else(|| infer_convention(name));
    let words: Vec<String> = match convention {
        NamingConvention::HyphenSeparator => {
            name.split('-').map(|word| word.to_lowercase()).collect()
        }
        NamingConvention::UnderscoreSeparator => {
            name.split('_').map(|word| word.to_lowercase()).collect()
        }
        NamingConvention::CamelCase | NamingConvention::PascalCase => {
            let mut words = Vec::new();
            let mut current = String::new();
            for c in name.chars() {
                if c.is_uppercase() && !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                current.extend(c.to_lowercase());
            }
            if !current.is_empty() {
                words.push(current);
            }
            words
        }
    };
    words.into_iter().filter(|word| !word.is_empty()).collect()
}

fn infer_convention(name: &str) -> NamingConvention {
    if name.contains('-') {
        NamingConvention::HyphenSeparator
    } else if name.contains('_') {
        NamingConvention::UnderscoreSeparator
    } else if name.chars().next().is_some_and(char::is_uppercase) {
        NamingConvention::PascalCase
    } else {
        NamingConvention::CamelCase
    }
}

/// Drops a plural `s`, conservatively: `ss` endings and one-letter words
/// stay untouched.
pub fn singularize(word: &str) -> String {
    if word.len() > 1 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_owned()
    } else {
        word.to_owned()
    }
}

/// The type names a container may be registered under, most specific
/// first: every suffix of its word sequence joined with `__`, then the
/// singular of its last word.
pub fn candidate_type_names(
    container: &str,
    convention: Option<NamingConvention>,
) -> Vec<String> {
    let words = split_words(container, convention);
    let mut candidates = Vec::new();
    for start in 0..words.len() {
        candidates.push(words[start..].join("__"));
    }
    if let Some(last) = words.last() {
        let singular = singularize(last);
        if !candidates.contains(&singular) {
            candidates.push(singular);
        }
    }
    candidates
}

/// Where a resource lives inside its request or response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceReference {
    Path {
        name: String,
        /// Literal endpoint segments up to the parameter.
        path_to_parameter: Vec<String>,
        /// Where the value is expected in a producing response.
        response_path: AccessPath,
    },
    Query {
        name: String,
    },
    Header {
        name: String,
    },
    Body {
        name: String,
        full_path: AccessPath,
    },
}

/// A nameable value slot of one request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiResource {
    pub request_id: RequestId,
    pub reference: ResourceReference,
    pub primitive_type: PrimitiveType,
    #[serde(skip)]
    pub naming_convention: Option<NamingConvention>,
}

impl ApiResource {
    /// A path parameter of the given endpoint.
    pub fn path_parameter(
        request_id: RequestId,
        name: impl Into<String>,
        primitive_type: PrimitiveType,
        naming_convention: Option<NamingConvention>,
    ) -> Self {
        let name = name.into();
        let marker = format!("{{{name}}}");
        let path_to_parameter = request_id
            .endpoint
            .split('/')
            .filter(|segment| !segment.is_empty())
            .take_while(|segment| *segment != marker)
            .filter(|segment| !segment.starts_with('{'))
            .map(str::to_owned)
            .collect();
        Self {
            request_id,
            reference: ResourceReference::Path {
                name,
                path_to_parameter,
                response_path: AccessPath::new(),
            },
            primitive_type,
            naming_convention,
        }
    }

    pub fn query_parameter(
        request_id: RequestId,
        name: impl Into<String>,
        primitive_type: PrimitiveType,
        naming_convention: Option<NamingConvention>,
    ) -> Self {
        Self {
            request_id,
            reference: ResourceReference::Query { name: name.into() },
            primitive_type,
            naming_convention,
        }
    }

    pub fn header(
        request_id: RequestId,
        name: impl Into<String>,
        primitive_type: PrimitiveType,
        naming_convention: Option<NamingConvention>,
    ) -> Self {
        Self {
            request_id,
            reference: ResourceReference::Header { name: name.into() },
            primitive_type,
            naming_convention,
        }
    }

    /// A property inside a request or response body.
    pub fn body(
        request_id: RequestId,
        full_path: AccessPath,
        primitive_type: PrimitiveType,
        naming_convention: Option<NamingConvention>,
    ) -> Self {
        let name = full_path
            .property_names()
            .last()
            .unwrap_or_default()
            .to_owned();
        Self {
            request_id,
            reference: ResourceReference::Body { name, full_path },
            primitive_type,
            naming_convention,
        }
    }

    pub fn name(&self) -> &str {
        match &self.reference {
            ResourceReference::Path { name, .. }
            | ResourceReference::Query { name }
            | ResourceReference::Header { name }
            | ResourceReference::Body { name, .. } => name,
        }
    }

    /// The access path a dynamic variable is named from. Non-body
    /// resources are addressed by their bare name.
    pub fn access_path(&self) -> AccessPath {
        match &self.reference {
            ResourceReference::Body { full_path, .. } => full_path.clone(),
            ResourceReference::Path { name, .. }
            | ResourceReference::Query { name }
            | ResourceReference::Header { name } => AccessPath::from_segments([name.clone()]),
        }
    }

    /// The JSON pointer a dictionary entry may address this resource by.
    /// Only body resources have one.
    pub fn json_pointer(&self) -> Option<String> {
        match &self.reference {
            ResourceReference::Body { full_path, .. } => Some(full_path.to_json_pointer()),
            _ => None,
        }
    }

    /// The name of the container the resource belongs to. For a path
    /// parameter that is the last literal segment before it; for a body
    /// property the innermost enclosing property, falling back to the
    /// endpoint; for query and header parameters the endpoint.
    pub fn container_name(&self) -> Option<String> {
        match &self.reference {
            ResourceReference::Path {
                path_to_parameter, ..
            } => path_to_parameter.last().cloned(),
            ResourceReference::Body { full_path, .. } => full_path
                .container()
                .map(str::to_owned)
                .or_else(|| last_literal_segment(&self.request_id.endpoint)),
            ResourceReference::Query { .. } | ResourceReference::Header { .. } => {
                last_literal_segment(&self.request_id.endpoint)
            }
        }
    }

    /// The container inside the body only, ignoring the endpoint fallback.
    pub fn body_container_name(&self) -> Option<&str> {
        match &self.reference {
            ResourceReference::Body { full_path, .. } => full_path.container(),
            _ => None,
        }
    }

    /// Candidate type names of this resource's container, most specific
    /// first, used for type-directed producer matching.
    pub fn candidate_type_names(&self) -> Vec<String> {
        self.container_name()
            .map(|container| candidate_type_names(&container, self.naming_convention))
            .unwrap_or_default()
    }

    /// For a path parameter: the endpoint prefix a producing request is
    /// expected to live at (everything before the parameter).
    pub fn producer_endpoint(&self) -> Option<String> {
        match &self.reference {
            ResourceReference::Path { name, .. } => {
                let marker = format!("/{{{name}}}");
                self.request_id
                    .endpoint
                    .find(&marker)
                    .map(|position| self.request_id.endpoint[..position].to_owned())
            }
            _ => None,
        }
    }

    /// The resource name a producer of this consumer is expected to carry:
    /// the consumer name with its container prefix stripped. `orderId`
    /// inside `orders` is produced as plain `id`.
    pub fn inferred_resource_name(&self) -> String {
        let name = self.name();
        let Some(container) = self.container_name() else {
            return name.to_owned();
        };
        let container_words: Vec<String> = split_words(&container, self.naming_convention)
            .iter()
            .map(|word| singularize(word))
            .collect();
        let name_words = split_words(name, self.naming_convention);
        if name_words.len() > container_words.len() {
            let prefix: Vec<String> = name_words[..container_words.len()]
                .iter()
                .map(|word| singularize(word))
                .collect();
            if prefix == container_words {
                return name_words[container_words.len()..].join("");
            }
        }
        name.to_owned()
    }
}

/// The last endpoint segment that is not a `{param}`.
pub fn last_literal_segment(endpoint: &str) -> Option<String> {
    endpoint
        .rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .map(str::to_owned)
}

/// A parameter position that needs a value when invoking a request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Consumer {
    pub resource: ApiResource,
    pub kind: ParameterKind,
    #[serde(skip)]
    pub annotation: Option<ProducerConsumerAnnotation>,
}

/// A source of a value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Producer {
    /// A field or header of another request's response.
    ResponseObject { resource: ApiResource },
    /// A value chosen by the client when invoking another request, reused
    /// here through a writer variable.
    InputParameter {
        resource: ApiResource,
        dictionary_payload: Option<DictionaryPayload>,
        is_writer: bool,
    },
    /// A value taken from the mutations dictionary.
    DictionaryPayload(DictionaryPayload),
    /// A value that appears elsewhere in the same request body.
    SameBodyPayload { resource: ApiResource },
    /// A pure execute-before edge with no data flow.
    OrderingConstraint { request_id: RequestId },
}

impl Producer {
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Producer::ResponseObject { resource }
            | Producer::InputParameter { resource, .. }
            | Producer::SameBodyPayload { resource } => Some(&resource.request_id),
            Producer::OrderingConstraint { request_id } => Some(request_id),
            Producer::DictionaryPayload(_) => None,
        }
    }

    pub fn access_path(&self) -> Option<AccessPath> {
        match self {
            Producer::ResponseObject { resource }
            | Producer::InputParameter { resource, .. }
            | Producer::SameBodyPayload { resource } => Some(resource.access_path()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[test]
    fn word_splitting_per_convention() {
        assert_eq!(split_words("storeOrderItems", None), ["store", "order", "items"]);
        assert_eq!(split_words("StoreOrder", None), ["store", "order"]);
        assert_eq!(split_words("store-order", None), ["store", "order"]);
        assert_eq!(split_words("store_order", None), ["store", "order"]);
        assert_eq!(
            split_words("storeOrder", Some(NamingConvention::UnderscoreSeparator)),
            ["storeorder"]
        );
    }

    #[test]
    fn candidate_names_most_specific_first() {
        assert_eq!(
            candidate_type_names("storeOrderItems", None),
            ["store__order__items", "order__items", "items", "item"]
        );
        assert_eq!(candidate_type_names("archives", None), ["archives", "archive"]);
    }

    #[test]
    fn path_parameter_container_and_producer_endpoint() {
        let resource = ApiResource::path_parameter(
            RequestId::new("/stores/{storeId}/orders/{orderId}", Method::Put),
            "orderId",
            PrimitiveType::String,
            None,
        );
        assert_eq!(resource.container_name().as_deref(), Some("orders"));
        assert_eq!(
            resource.producer_endpoint().as_deref(),
            Some("/stores/{storeId}/orders")
        );
        assert_eq!(resource.inferred_resource_name(), "id");
    }

    #[test]
    fn body_resource_paths() {
        let resource = ApiResource::body(
            RequestId::new("/archive", Method::Post),
            AccessPath::from_segments(["archives", "[0]", "name"]),
            PrimitiveType::String,
            None,
        );
        assert_eq!(resource.name(), "name");
        assert_eq!(resource.body_container_name(), Some("archives"));
        assert_eq!(resource.json_pointer().as_deref(), Some("/archives/0/name"));
    }

    #[test]
    fn inferred_name_keeps_unrelated_parameters() {
        let resource = ApiResource::path_parameter(
            RequestId::new("/stores/{limit}", Method::Get),
            "limit",
            PrimitiveType::Int,
            None,
        );
        assert_eq!(resource.inferred_resource_name(), "limit");
    }
}
