//! The payload model: the typed value slots a request grammar is made of.
//!
//! Every parameter position in a compiled request is bound to a
//! [`FuzzingPayload`]: a constant pinned by an example, a fuzzable primitive
//! the engine may mutate, a custom payload supplied by the mutations
//! dictionary, or a dynamic object that reads a value another request wrote
//! at runtime. Body schemas compile to a [`PayloadTree`], which keeps the
//! object/array structure around the leaves.

use serde::{Deserialize, Serialize};

use crate::access_path::AccessPath;

/// The primitive type of a payload slot, as derived from the schema's
/// `type` and `format` fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PrimitiveType {
    String,
    Object,
    Number,
    Int,
    Uuid,
    Bool,
    DateTime,
    Date,
    Enum {
        underlying_type: Box<PrimitiveType>,
        values: Vec<String>,
        default: Option<String>,
    },
}

impl PrimitiveType {
    /// Maps a schema `type`/`format` pair onto a primitive type.
    /// Unrecognized formats fall back to the base type.
    pub fn from_type_and_format(base: &str, format: Option<&str>) -> Option<Self> {
        match base {
            "string" => Some(match format {
                Some("uuid") | Some("guid") => PrimitiveType::Uuid,
                Some("date-time") => PrimitiveType::DateTime,
                Some("date") => PrimitiveType::Date,
                _ => PrimitiveType::String,
            }),
            "number" => Some(match format {
                Some("double") => PrimitiveType::Number,
                _ => PrimitiveType::Number,
            }),
            "integer" => Some(PrimitiveType::Int),
            "boolean" => Some(PrimitiveType::Bool),
            "object" => Some(PrimitiveType::Object),
            // Swagger v2 file parameters are sent as opaque strings.
            "file" => Some(PrimitiveType::String),
            _ => None,
        }
    }
}

/// The dictionary category a custom payload was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomPayloadType {
    String,
    UuidSuffix,
    Header,
    Query,
}

/// A named runtime variable: one request writes it, others read it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicObject {
    pub primitive_type: PrimitiveType,
    pub variable_name: String,
    /// Writers produce the value (response parser or input assignment),
    /// readers substitute it into an outgoing request.
    pub is_writer: bool,
}

/// A single payload slot in the compiled grammar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload", content = "contents", rename_all = "snake_case")]
pub enum FuzzingPayload {
    /// A literal pinned at compile time, typically from an example value.
    Constant {
        primitive_type: PrimitiveType,
        value: String,
    },
    /// A typed slot the engine mutates, seeded with a default.
    Fuzzable {
        primitive_type: PrimitiveType,
        default_value: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        example_value: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        parameter_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        dynamic_object: Option<DynamicObject>,
    },
    /// A value taken from the mutations dictionary.
    Custom {
        payload_type: CustomPayloadType,
        primitive_type: PrimitiveType,
        value: String,
        is_object: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        dynamic_object: Option<DynamicObject>,
    },
    /// A read of a variable produced by another request.
    DynamicObject(DynamicObject),
    /// An ordered concatenation of payloads, used for assembled paths and
    /// query fragments.
    PayloadParts(Vec<FuzzingPayload>),
}

impl FuzzingPayload {
    /// The dynamic object read or written through this payload, if any.
    pub fn dynamic_object(&self) -> Option<&DynamicObject> {
        match self {
            FuzzingPayload::DynamicObject(variable) => Some(variable),
            FuzzingPayload::Fuzzable { dynamic_object, .. }
            | FuzzingPayload::Custom { dynamic_object, .. } => dynamic_object.as_ref(),
            FuzzingPayload::Constant { .. } => None,
            FuzzingPayload::PayloadParts(_) => None,
        }
    }

}

/// Renders an example value into the literal carried by a constant or used
/// as a fuzzable seed. Strings stay raw; everything else keeps its JSON
/// spelling (`null` included, which never becomes a fuzzable type).
pub fn format_example_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The structural kind of an inner payload-tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NestedType {
    Object,
    Array,
    Property,
}

/// A leaf of a payload tree: a named slot holding one payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafProperty {
    pub name: String,
    pub payload: FuzzingPayload,
    pub is_required: bool,
    pub is_read_only: bool,
}

/// An inner node of a payload tree. When `payload` is set, the whole
/// subtree has been replaced by that payload (a dictionary object payload
/// or a dynamic object), and `children` is ignored downstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InnerProperty {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<FuzzingPayload>,
    pub kind: NestedType,
    pub is_required: bool,
    pub is_read_only: bool,
    pub children: Vec<PayloadTree>,
}

/// A schema compiled into a tree of payload slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadTree {
    Leaf(LeafProperty),
    Inner(InnerProperty),
}

impl PayloadTree {
    pub fn name(&self) -> &str {
        match self {
            PayloadTree::Leaf(leaf) => &leaf.name,
            PayloadTree::Inner(inner) => &inner.name,
        }
    }

    pub fn is_read_only(&self) -> bool {
        match self {
            PayloadTree::Leaf(leaf) => leaf.is_read_only,
            PayloadTree::Inner(inner) => inner.is_read_only,
        }
    }

    /// Visits every leaf together with its access path from this node.
    /// A node's own name contributes a segment when non-empty; children of
    /// an array node are visited behind `[index]` hops.
    pub fn visit_leaves<'a>(&'a self, mut visit: impl FnMut(&AccessPath, &'a LeafProperty)) {
        self.visit_leaves_inner(&AccessPath::new(), &mut visit);
    }

    fn visit_leaves_inner<'a>(
        &'a self,
        prefix: &AccessPath,
        visit: &mut impl FnMut(&AccessPath, &'a LeafProperty),
    ) {
        match self {
            PayloadTree::Leaf(leaf) => {
                let path = if leaf.name.is_empty() {
                    prefix.clone()
                } else {
                    prefix.with_segment(&leaf.name)
                };
                visit(&path, leaf);
            }
            PayloadTree::Inner(inner) => {
                let base = if inner.name.is_empty() {
                    prefix.clone()
                } else {
                    prefix.with_segment(&inner.name)
                };
                for (index, child) in inner.children.iter().enumerate() {
                    match inner.kind {
                        NestedType::Array => {
                            child.visit_leaves_inner(&base.with_index(index), visit)
                        }
                        NestedType::Object | NestedType::Property => {
                            child.visit_leaves_inner(&base, visit)
                        }
                    }
                }
            }
        }
    }

    /// Rewrites every leaf payload in place. The callback receives the leaf
    /// access path, so dependency substitution can match resolved consumers.
    pub fn map_leaves(&mut self, map: &mut impl FnMut(&AccessPath, &mut LeafProperty)) {
        self.map_leaves_inner(&AccessPath::new(), map);
    }

    fn map_leaves_inner(
        &mut self,
        prefix: &AccessPath,
        map: &mut impl FnMut(&AccessPath, &mut LeafProperty),
    ) {
        match self {
            PayloadTree::Leaf(leaf) => {
                let path = if leaf.name.is_empty() {
                    prefix.clone()
                } else {
                    prefix.with_segment(&leaf.name)
                };
                map(&path, leaf);
            }
            PayloadTree::Inner(inner) => {
                let base = if inner.name.is_empty() {
                    prefix.clone()
                } else {
                    prefix.with_segment(&inner.name)
                };
                for (index, child) in inner.children.iter_mut().enumerate() {
                    match inner.kind {
                        NestedType::Array => {
                            child.map_leaves_inner(&base.with_index(index), map)
                        }
                        NestedType::Object | NestedType::Property => {
                            child.map_leaves_inner(&base, map)
                        }
                    }
                }
            }
        }
    }
}
