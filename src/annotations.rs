//! User annotations pin dependencies the compiler would otherwise have to
//! infer: "this request's response field feeds that request's parameter".
//! Annotations appear in a standalone file under the
//! `x-restler-global-annotations` key, inside the specification document
//! under the same key, or per operation under `x-restler-annotations`.
//! Malformed entries are logged and dropped; they never abort a compile.

use std::{convert::TryFrom, path::Path};

use anyhow::Context;
use serde::Deserialize;

use crate::{access_path::AccessPath, grammar::RequestId, method::Method};

pub const GLOBAL_ANNOTATIONS_KEY: &str = "x-restler-global-annotations";
pub const OPERATION_ANNOTATIONS_KEY: &str = "x-restler-annotations";

/// How an annotation names a resource: by JSON pointer into a body, or by
/// bare parameter/property name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AnnotationResourceReference {
    Path(AccessPath),
    Name(String),
}

impl AnnotationResourceReference {
    /// A string that parses as a JSON pointer becomes a path reference.
    pub fn parse(text: &str) -> Self {
        match AccessPath::from_json_pointer(text) {
            Some(path) if !path.is_empty() => Self::Path(path),
            _ => Self::Name(text.to_owned()),
        }
    }

    /// Whether this reference picks out a resource with the given name and,
    /// for body resources, full path.
    pub fn matches(&self, name: &str, full_path: Option<&AccessPath>) -> bool {
        match self {
            Self::Name(reference) => reference == name,
            Self::Path(reference) => full_path.is_some_and(|path| path == reference),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Path(path) => path.last(),
        }
    }
}

/// One pinned producer-consumer edge.
#[derive(Clone, Debug, PartialEq)]
pub struct ProducerConsumerAnnotation {
    pub producer_id: RequestId,
    pub producer_parameter: Option<AnnotationResourceReference>,
    pub consumer_parameter: Option<AnnotationResourceReference>,
    /// When absent the annotation applies to every request that consumes a
    /// matching parameter.
    pub consumer_id: Option<RequestId>,
    /// Requests the global annotation explicitly does not apply to.
    pub except: Vec<RequestId>,
}

impl ProducerConsumerAnnotation {
    /// Whether this annotation binds the given consumer.
    pub fn applies_to(
        &self,
        consumer_request: &RequestId,
        name: &str,
        full_path: Option<&AccessPath>,
    ) -> bool {
        if let Some(consumer_id) = &self.consumer_id
            && (consumer_id.endpoint != consumer_request.endpoint
                || consumer_id.method != consumer_request.method)
        {
            return false;
        }
        if self
            .except
            .iter()
            .any(|excluded| excluded.endpoint == consumer_request.endpoint
                && excluded.method == consumer_request.method)
        {
            return false;
        }
        match &self.consumer_parameter {
            Some(parameter) => parameter.matches(name, full_path),
            // Without a consumer_param the annotation matches consumers
            // named like its producer resource.
            None => self
                .producer_parameter
                .as_ref()
                .and_then(AnnotationResourceReference::name)
                .is_some_and(|producer_name| producer_name == name),
        }
    }

    /// An annotation whose producer and consumer request coincide is an
    /// equality constraint between two parameters of one request.
    pub fn is_equality_constraint(&self) -> bool {
        self.consumer_id
            .as_ref()
            .is_some_and(|consumer| *consumer == self.producer_id)
    }
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    producer_endpoint: Option<String>,
    producer_method: Option<String>,
    producer_resource_name: Option<String>,
    consumer_endpoint: Option<String>,
    consumer_method: Option<String>,
    consumer_param: Option<String>,
    #[serde(default)]
    except: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawExcept {
    consumer_endpoint: String,
    consumer_method: String,
}

/// Reads a standalone annotation file.
pub fn parse_annotation_file(path: &Path) -> anyhow::Result<Vec<ProducerConsumerAnnotation>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read annotation file {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("annotation file {} is not JSON", path.display()))?;
    Ok(document
        .get(GLOBAL_ANNOTATIONS_KEY)
        .map(annotations_from_value)
        .unwrap_or_default())
}

/// Parses a list of annotation entries, dropping malformed ones with a
/// warning.
pub fn annotations_from_value(value: &serde_json::Value) -> Vec<ProducerConsumerAnnotation> {
    let Some(entries) = value.as_array() else {
        log::warn!("annotation list is not a JSON array, ignoring it");
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match annotation_from_entry(entry) {
            Ok(annotation) => Some(annotation),
            Err(reason) => {
                log::warn!("dropping malformed annotation: {reason}: {entry}");
                None
            }
        })
        .collect()
}

/// Parses per-operation annotations; the consumer request is implied.
pub fn operation_annotations_from_value(
    value: &serde_json::Value,
    consumer: &RequestId,
) -> Vec<ProducerConsumerAnnotation> {
    annotations_from_value(value)
        .into_iter()
        .map(|mut annotation| {
            if annotation.consumer_id.is_none() {
                annotation.consumer_id = Some(consumer.clone());
            }
            annotation
        })
        .collect()
}

fn annotation_from_entry(entry: &serde_json::Value) -> Result<ProducerConsumerAnnotation, String> {
    let raw: RawAnnotation =
        serde_json::from_value(entry.clone()).map_err(|err| err.to_string())?;
    let producer_endpoint = raw
        .producer_endpoint
        .ok_or("missing producer_endpoint")?;
    let producer_method = raw.producer_method.ok_or("missing producer_method")?;
    let method =
        Method::try_from(producer_method.as_str()).map_err(|err| err.to_string())?;
    let consumer_id = match (raw.consumer_endpoint, raw.consumer_method) {
        (Some(endpoint), Some(method_name)) => Some(RequestId::new(
            endpoint,
            Method::try_from(method_name.as_str()).map_err(|err| err.to_string())?,
        )),
        (Some(_), None) | (None, Some(_)) => {
            return Err("consumer_endpoint and consumer_method must appear together".to_owned());
        }
        (None, None) => None,
    };
    let except = match raw.except {
        None => Vec::new(),
        Some(value) => parse_except(value)?,
    };
    Ok(ProducerConsumerAnnotation {
        producer_id: RequestId::new(producer_endpoint, method),
        producer_parameter: raw
            .producer_resource_name
            .as_deref()
            .map(AnnotationResourceReference::parse),
        consumer_parameter: raw
            .consumer_param
            .as_deref()
            .map(AnnotationResourceReference::parse),
        consumer_id,
        except,
    })
}

fn parse_except(value: serde_json::Value) -> Result<Vec<RequestId>, String> {
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        object @ serde_json::Value::Object(_) => vec![object],
        _ => return Err("except must be an object or a list of objects".to_owned()),
    };
    entries
        .into_iter()
        .map(|entry| {
            let raw: RawExcept =
                serde_json::from_value(entry).map_err(|err| err.to_string())?;
            Ok(RequestId::new(
                raw.consumer_endpoint,
                Method::try_from(raw.consumer_method.as_str()).map_err(|err| err.to_string())?,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_list(text: &str) -> Vec<ProducerConsumerAnnotation> {
        annotations_from_value(&serde_json::from_str(text).unwrap())
    }

    #[test]
    fn parses_global_annotation() {
        let annotations = parse_list(
            r#"[{
                "producer_endpoint": "/file/{fileId}",
                "producer_method": "POST",
                "producer_resource_name": "fileId",
                "consumer_param": "fileId"
            }]"#,
        );
        assert_eq!(annotations.len(), 1);
        let annotation = &annotations[0];
        assert_eq!(annotation.producer_id.endpoint, "/file/{fileId}");
        assert_eq!(annotation.producer_id.method, Method::Post);
        assert_eq!(
            annotation.consumer_parameter,
            Some(AnnotationResourceReference::Name("fileId".to_owned()))
        );
        assert!(annotation.consumer_id.is_none());
    }

    #[test]
    fn pointer_consumer_param_becomes_path() {
        let annotations = parse_list(
            r#"[{
                "producer_endpoint": "/a",
                "producer_method": "POST",
                "producer_resource_name": "id",
                "consumer_param": "/settings/id"
            }]"#,
        );
        assert_eq!(
            annotations[0].consumer_parameter,
            Some(AnnotationResourceReference::Path(
                AccessPath::from_segments(["settings", "id"])
            ))
        );
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let annotations = parse_list(
            r#"[
                {"producer_method": "POST", "producer_resource_name": "id"},
                {"producer_endpoint": "/a", "producer_method": "FETCH"},
                {"producer_endpoint": "/a", "producer_method": "POST",
                 "producer_resource_name": "id", "consumer_endpoint": "/b"}
            ]"#,
        );
        assert!(annotations.is_empty());
    }

    #[test]
    fn except_excludes_consumers() {
        let annotations = parse_list(
            r#"[{
                "producer_endpoint": "/a",
                "producer_method": "POST",
                "producer_resource_name": "id",
                "consumer_param": "id",
                "except": {"consumer_endpoint": "/b", "consumer_method": "GET"}
            }]"#,
        );
        let annotation = &annotations[0];
        let excluded = RequestId::new("/b", Method::Get);
        let included = RequestId::new("/c", Method::Get);
        assert!(!annotation.applies_to(&excluded, "id", None));
        assert!(annotation.applies_to(&included, "id", None));
    }

    #[test]
    fn equality_constraint_detection() {
        let annotations = parse_list(
            r#"[{
                "producer_endpoint": "/a",
                "producer_method": "PUT",
                "producer_resource_name": "name",
                "consumer_endpoint": "/a",
                "consumer_method": "PUT",
                "consumer_param": "other"
            }]"#,
        );
        assert!(annotations[0].is_equality_constraint());
    }
}
