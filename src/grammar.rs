//! The compiled grammar: an ordered list of request templates with every
//! parameter position bound to a payload. `grammar.json` is the serialized
//! form of [`Grammar`] and is the compiler's primary artifact; serialization
//! and deserialization are exact inverses so the file can be fed back
//! through the emit phase unchanged.

use serde::{Deserialize, Serialize};

use crate::{
    method::Method,
    payload::{DynamicObject, FuzzingPayload, PayloadTree},
};

/// Identifies a request: the endpoint template plus the method. When the
/// endpoint was rewritten from an `x-ms-paths` key (a path disambiguated by
/// a query fragment), `x_ms_path` holds the original template so path
/// assembly can reconstruct it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId {
    pub endpoint: String,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub x_ms_path: Option<String>,
}

impl RequestId {
    pub fn new(endpoint: impl Into<String>, method: Method) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            x_ms_path: None,
        }
    }

    /// The endpoint the grammar renders: the original query-bearing
    /// template when one exists, the plain endpoint otherwise.
    pub fn rendered_endpoint(&self) -> &str {
        self.x_ms_path.as_deref().unwrap_or(&self.endpoint)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)
    }
}

/// Where a parameter list came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterPayloadSource {
    Schema,
    Examples,
    DictionaryCustomPayload,
}

/// How a query or header parameter serializes its value.
/// Only form and simple styles are accepted; everything else is rejected
/// when parameters are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSerialization {
    Form { explode: bool },
    Simple,
}

/// One named parameter bound to a payload tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestParameter {
    pub name: String,
    pub payload: PayloadTree,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serialization: Option<ParameterSerialization>,
}

/// A parameter list of one source, or a whole-payload replacement for the
/// body (an inlined example or a dictionary payload).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterPayload {
    List(Vec<RequestParameter>),
    Example(FuzzingPayload),
}

/// The declared parameters of one request, one entry per payload source.
/// Paths always carry exactly one schema-derived list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParameters {
    pub path: Vec<RequestParameter>,
    pub query: Vec<(ParameterPayloadSource, Vec<RequestParameter>)>,
    pub header: Vec<(ParameterPayloadSource, Vec<RequestParameter>)>,
    pub body: Vec<(ParameterPayloadSource, ParameterPayload)>,
}

/// The authentication token slot of a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestToken {
    Refreshable,
    Static(String),
}

/// The response parser of a request: which body and header variables the
/// engine extracts after executing it. Only present when some other request
/// actually reads one of the variables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseParser {
    pub writer_variables: Vec<DynamicObject>,
    pub header_writer_variables: Vec<DynamicObject>,
}

/// Everything the engine needs to thread values through this request:
/// the response parser, variables written from the request's own inputs,
/// and ordering-constraint edges.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDependencyData {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response_parser: Option<ResponseParser>,
    pub input_writer_variables: Vec<DynamicObject>,
    pub ordering_constraint_writer_variables: Vec<DynamicObject>,
    pub ordering_constraint_reader_variables: Vec<DynamicObject>,
}

impl RequestDependencyData {
    pub fn is_empty(&self) -> bool {
        self.response_parser.is_none()
            && self.input_writer_variables.is_empty()
            && self.ordering_constraint_writer_variables.is_empty()
            && self.ordering_constraint_reader_variables.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Set when the operation responds with 201/202: resource creation may
    /// complete asynchronously and consumers need a timing delay.
    pub is_long_running_operation: bool,
}

/// One compiled request template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub method: Method,
    pub base_path: String,
    /// The endpoint template compiled to payload slots: literals for fixed
    /// segments, resolved payloads for `{param}` positions.
    pub path: Vec<FuzzingPayload>,
    pub query_parameters: Vec<(ParameterPayloadSource, Vec<RequestParameter>)>,
    pub header_parameters: Vec<(ParameterPayloadSource, Vec<RequestParameter>)>,
    pub body_parameters: Vec<(ParameterPayloadSource, ParameterPayload)>,
    pub token: RequestToken,
    pub http_version: String,
    /// Fixed headers (Accept, Host, Content-Type) emitted on every call.
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dependency_data: Option<RequestDependencyData>,
    pub metadata: RequestMetadata,
}

/// The full compiled grammar, requests in specification order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    pub requests: Vec<Request>,
}

impl Grammar {
    /// Every dynamic object read anywhere in the grammar, in request order.
    pub fn consumed_variables(&self) -> Vec<&DynamicObject> {
        let mut variables = Vec::new();
        for request in &self.requests {
            for payload in &request.path {
                collect_readers(payload, &mut variables);
            }
            for (_, list) in request
                .query_parameters
                .iter()
                .chain(request.header_parameters.iter())
            {
                for parameter in list {
                    parameter.payload.visit_leaves(|_, leaf| {
                        collect_readers(&leaf.payload, &mut variables)
                    });
                }
            }
            for (_, body) in &request.body_parameters {
                match body {
                    ParameterPayload::List(list) => {
                        for parameter in list {
                            parameter.payload.visit_leaves(|_, leaf| {
                                collect_readers(&leaf.payload, &mut variables)
                            });
                        }
                    }
                    ParameterPayload::Example(payload) => collect_readers(payload, &mut variables),
                }
            }
        }
        variables
    }
}

fn collect_readers<'a>(payload: &'a FuzzingPayload, out: &mut Vec<&'a DynamicObject>) {
    match payload {
        FuzzingPayload::PayloadParts(parts) => {
            for part in parts {
                collect_readers(part, out);
            }
        }
        other => {
            if let Some(variable) = other.dynamic_object()
                && !variable.is_writer
            {
                out.push(variable);
            }
        }
    }
}
