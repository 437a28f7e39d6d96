//! The compiler's view of an OpenAPI document.
//!
//! Internally the `oas3` document model is used throughout. Swagger v2 and
//! OpenAPI 3.0 inputs are upgraded and converted at load time (see
//! [`convert`]), so the middle end only ever sees one representation.
//!
//! Two preprocessing steps happen here: path-item-level shared parameters
//! are copied down into their operations, and `x-ms-paths` entries (paths
//! disambiguated by a query fragment) are rewritten to plain paths while
//! remembering the original template for later reconstruction.

use std::collections::BTreeMap;

use oas3::spec::{MediaType, ObjectOrReference, Operation, Parameter, PathItem};
use url::Url;

use crate::{grammar::RequestId, method::Method};

pub mod convert;
pub mod load;

pub const X_MS_PATHS_KEY: &str = "x-ms-paths";

/// An operation together with the request identity it compiles to.
#[derive(Debug, Clone)]
pub struct QualifiedOperation<'a> {
    pub id: RequestId,
    pub operation: &'a Operation,
}

/// The parsed document plus the rewritten `x-ms-paths` entries.
#[derive(Debug, Clone)]
pub struct ApiDocument {
    spec: oas3::Spec,
    x_ms_paths: BTreeMap<String, PathItem>,
}

impl ApiDocument {
    pub fn new(mut spec: oas3::Spec) -> Self {
        let mut x_ms_paths = spec
            .extensions
            .get(X_MS_PATHS_KEY)
            .and_then(|value| {
                serde_json::from_value::<BTreeMap<String, PathItem>>(value.clone())
                    .map_err(|err| {
                        log::warn!("ignoring malformed {X_MS_PATHS_KEY} extension: {err}")
                    })
                    .ok()
            })
            .unwrap_or_default();
        push_down_shared_parameters(&mut spec, &mut x_ms_paths);
        Self { spec, x_ms_paths }
    }

    pub fn spec(&self) -> &oas3::Spec {
        &self.spec
    }

    /// All operations in compilation order: plain paths in the document
    /// model's canonical order, then `x-ms-paths` entries, methods in a
    /// fixed order within each path.
    pub fn operations(&self) -> Vec<QualifiedOperation<'_>> {
        let mut result = Vec::new();
        if let Some(paths) = &self.spec.paths {
            for (endpoint, path_item) in paths {
                for (method, operation) in operations_of(path_item) {
                    result.push(QualifiedOperation {
                        id: RequestId::new(endpoint.clone(), method),
                        operation,
                    });
                }
            }
        }
        for (template, path_item) in &self.x_ms_paths {
            let endpoint = plain_path(template);
            for (method, operation) in operations_of(path_item) {
                let mut id = RequestId::new(endpoint.clone(), method);
                id.x_ms_path = Some(template.clone());
                result.push(QualifiedOperation { id, operation });
            }
        }
        result
    }

    /// Maps operationIds onto request identities, for resolving OpenAPI
    /// links into annotations.
    pub fn operation_ids(&self) -> BTreeMap<String, RequestId> {
        self.operations()
            .into_iter()
            .filter_map(|qualified| {
                qualified
                    .operation
                    .operation_id
                    .clone()
                    .map(|operation_id| (operation_id, qualified.id))
            })
            .collect()
    }

    /// The Host header value and base path taken from the first server.
    pub fn host_and_base_path(&self) -> (String, String) {
        for server in &self.spec.servers {
            if let Ok(url) = Url::parse(&server.url) {
                let mut host = url.host_str().unwrap_or("localhost").to_owned();
                if let Some(port) = url.port() {
                    host = format!("{host}:{port}");
                }
                let base_path = url.path().trim_end_matches('/').to_owned();
                return (host, base_path);
            }
            // A relative server URL only carries the base path.
            return (
                "localhost".to_owned(),
                server.url.trim_end_matches('/').to_owned(),
            );
        }
        ("localhost".to_owned(), String::new())
    }
}

/// The operations declared on a path item, in compilation order.
pub fn operations_of(path_item: &PathItem) -> Vec<(Method, &Operation)> {
    Method::DOCUMENT_ORDER
        .iter()
        .filter_map(|&method| {
            let operation = match method {
                Method::Get => &path_item.get,
                Method::Put => &path_item.put,
                Method::Post => &path_item.post,
                Method::Delete => &path_item.delete,
                Method::Options => &path_item.options,
                Method::Head => &path_item.head,
                Method::Patch => &path_item.patch,
                Method::Trace => &path_item.trace,
            };
            operation.as_ref().map(|operation| (method, operation))
        })
        .collect()
}

/// Strips the query fragment of an `x-ms-paths` template, leaving the path
/// the grammar analyzes. Both `?` and a bare `&` introduce the fragment.
pub fn plain_path(template: &str) -> String {
    match template.find(['?', '&']) {
        Some(position) => template[..position].to_owned(),
        None => template.to_owned(),
    }
}

/// The `name=value` pairs of an `x-ms-paths` template's query fragment, in
/// template order. Values of the form `{param}` reference declared
/// parameters.
pub fn x_ms_query_pairs(template: &str) -> Vec<(String, String)> {
    let Some(position) = template.find(['?', '&']) else {
        return Vec::new();
    };
    template[position + 1..]
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.to_owned(), value.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}

/// Copies path-item-level shared parameters into each operation that does
/// not override them, so the rest of the compiler only reads
/// operation-level parameters.
fn push_down_shared_parameters(spec: &mut oas3::Spec, x_ms_paths: &mut BTreeMap<String, PathItem>) {
    let resolved = spec.clone();
    let mut paths = spec.paths.take();
    for (_, path_item) in paths.iter_mut().flatten().chain(x_ms_paths.iter_mut()) {
        let shared = path_item.parameters.clone();
        for operation in [
            &mut path_item.get,
            &mut path_item.put,
            &mut path_item.post,
            &mut path_item.delete,
            &mut path_item.options,
            &mut path_item.head,
            &mut path_item.patch,
            &mut path_item.trace,
        ]
        .into_iter()
        .flatten()
        {
            add_shared_parameters_to_operation(&resolved, &shared, operation);
        }
    }
    spec.paths = paths;
}

fn add_shared_parameters_to_operation(
    spec: &oas3::Spec,
    parameters: &[ObjectOrReference<Parameter>],
    operation: &mut Operation,
) {
    let existing_parameter_names: Vec<String> = operation
        .parameters
        .iter()
        .filter_map(|ref_or_param| ref_or_param.resolve(spec).ok())
        .map(|param| param.name)
        .collect();
    for ref_or_param in parameters {
        if let Ok(parameter) = ref_or_param.resolve(spec)
            && !existing_parameter_names.contains(&parameter.name)
        {
            operation.parameters.push(ref_or_param.clone());
        }
    }
}

/// Content-type helper over a media-type map. The compiler only consumes
/// JSON bodies; a `*/*` entry counts as JSON.
pub trait JsonContent {
    fn get_json_content(&self) -> Option<&MediaType>;
}

impl JsonContent for BTreeMap<String, MediaType> {
    fn get_json_content(&self) -> Option<&MediaType> {
        self.iter().find_map(|(key, value)| {
            (key.starts_with("application/json") || key == "*/*").then_some(value)
        })
    }
}
