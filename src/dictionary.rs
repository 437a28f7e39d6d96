//! The mutations dictionary: user-supplied payload defaults and custom
//! payloads, in the `restler_*` key format. The dictionary participates in
//! dependency resolution (custom payloads win over inference) and is
//! extended during compilation with generated uuid-suffix entries; the
//! extended dictionary is written back as `dict.json`.

use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::{
    grammar::RequestId,
    payload::{CustomPayloadType, PrimitiveType},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationsDictionary {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_string: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_string_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_int: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_int_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_number: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_number_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_bool: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_bool_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_datetime: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_datetime_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_date: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_date_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_object: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_object_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_uuid4: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restler_fuzzable_uuid4_unquoted: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub restler_custom_payload: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub restler_custom_payload_unquoted: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub restler_custom_payload_uuid4_suffix: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub restler_custom_payload_header: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub restler_custom_payload_header_unquoted: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub restler_custom_payload_query: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_values: Option<serde_json::Value>,
}

/// Where a consumer sits, for category filtering during lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterKind {
    Path,
    Query,
    Header,
    Body,
}

/// A custom payload found in the dictionary. `name` is the dictionary key;
/// the engine resolves the key to its values at runtime.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DictionaryPayload {
    pub payload_type: CustomPayloadType,
    pub primitive_type: PrimitiveType,
    pub name: String,
    pub is_object: bool,
}

impl MutationsDictionary {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read dictionary {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid mutations dictionary {}", path.display()))
    }

    /// The dictionary used when the user supplies none: one default per
    /// fuzzable primitive, no custom payloads.
    pub fn default_dictionary() -> Self {
        Self {
            restler_fuzzable_string: vec!["fuzzstring".to_owned()],
            restler_fuzzable_int: vec!["1".to_owned()],
            restler_fuzzable_number: vec!["1.23".to_owned()],
            restler_fuzzable_bool: vec!["true".to_owned()],
            restler_fuzzable_datetime: vec!["2019-06-26T20:20:39+00:00".to_owned()],
            restler_fuzzable_date: vec!["2019-06-26".to_owned()],
            restler_fuzzable_object: vec!["{ \"fuzz\": false }".to_owned()],
            ..Default::default()
        }
    }

    /// The seed value used for a fuzzable slot of the given type.
    pub fn default_value(&self, primitive_type: &PrimitiveType) -> String {
        lazy_static! {
            static ref DEFAULTS: MutationsDictionary = MutationsDictionary::default_dictionary();
        }
        let defaults: &MutationsDictionary = &DEFAULTS;
        let pick = |own: &[String], fallback: &[String]| {
            own.first()
                .or_else(|| fallback.first())
                .cloned()
                .unwrap_or_default()
        };
        match primitive_type {
            PrimitiveType::String | PrimitiveType::Uuid => pick(
                &self.restler_fuzzable_string,
                &defaults.restler_fuzzable_string,
            ),
            PrimitiveType::Int => pick(&self.restler_fuzzable_int, &defaults.restler_fuzzable_int),
            PrimitiveType::Number => pick(
                &self.restler_fuzzable_number,
                &defaults.restler_fuzzable_number,
            ),
            PrimitiveType::Bool => {
                pick(&self.restler_fuzzable_bool, &defaults.restler_fuzzable_bool)
            }
            PrimitiveType::DateTime => pick(
                &self.restler_fuzzable_datetime,
                &defaults.restler_fuzzable_datetime,
            ),
            PrimitiveType::Date => {
                pick(&self.restler_fuzzable_date, &defaults.restler_fuzzable_date)
            }
            PrimitiveType::Object => pick(
                &self.restler_fuzzable_object,
                &defaults.restler_fuzzable_object,
            ),
            PrimitiveType::Enum { default, values, .. } => default
                .clone()
                .or_else(|| values.first().cloned())
                .unwrap_or_default(),
        }
    }

    /// Looks up a custom payload for a consumer. The JSON pointer form of
    /// the consumer's location is tried before its bare name, and the
    /// categories are tried in a fixed order: query-specific and
    /// header-specific payloads first (only for consumers of that kind),
    /// then the general quoted and unquoted payloads.
    pub fn find_custom_payload(
        &self,
        kind: ParameterKind,
        pointer: Option<&str>,
        name: &str,
    ) -> Option<DictionaryPayload> {
        let categories: [(&IndexMap<String, Vec<String>>, CustomPayloadType, bool); 4] = [
            (
                &self.restler_custom_payload_query,
                CustomPayloadType::Query,
                kind == ParameterKind::Query,
            ),
            (
                &self.restler_custom_payload_header,
                CustomPayloadType::Header,
                kind == ParameterKind::Header,
            ),
            (&self.restler_custom_payload, CustomPayloadType::String, true),
            (
                &self.restler_custom_payload_unquoted,
                CustomPayloadType::String,
                true,
            ),
        ];
        for (map, payload_type, applicable) in categories {
            if !applicable {
                continue;
            }
            let Some(key) = pointer
                .filter(|pointer| map.contains_key(*pointer))
                .or_else(|| map.contains_key(name).then_some(name))
                .map(str::to_owned)
            else {
                continue;
            };
            let is_object = map
                .get(&key)
                .and_then(|values| values.first())
                .is_some_and(|value| value_is_object(value));
            return Some(DictionaryPayload {
                payload_type,
                primitive_type: PrimitiveType::String,
                name: key,
                is_object,
            });
        }
        None
    }

    /// Looks up a uuid-suffix payload, pointer form first, name second.
    pub fn find_uuid_suffix(&self, pointer: Option<&str>, name: &str) -> Option<DictionaryPayload> {
        let map = &self.restler_custom_payload_uuid4_suffix;
        let key = pointer
            .filter(|pointer| map.contains_key(*pointer))
            .or_else(|| map.contains_key(name).then_some(name))?;
        Some(DictionaryPayload {
            payload_type: CustomPayloadType::UuidSuffix,
            primitive_type: PrimitiveType::String,
            name: key.to_owned(),
            is_object: false,
        })
    }

    /// Registers a generated uuid-suffix entry, keeping an existing prefix
    /// if the user already supplied one.
    pub fn add_uuid_suffix(&mut self, name: &str, prefix: String) -> DictionaryPayload {
        self.restler_custom_payload_uuid4_suffix
            .entry(name.to_owned())
            .or_insert(prefix);
        DictionaryPayload {
            payload_type: CustomPayloadType::UuidSuffix,
            primitive_type: PrimitiveType::String,
            name: name.to_owned(),
            is_object: false,
        }
    }

    /// The dictionary key replacing an entire request body, when present:
    /// `<endpoint>/<method>/__body__` in `restler_custom_payload`.
    pub fn whole_body_key(&self, request: &RequestId) -> Option<String> {
        let key = format!(
            "{}/{}/__body__",
            request.endpoint,
            request.method.as_str().to_lowercase()
        );
        self.restler_custom_payload.contains_key(&key).then_some(key)
    }

    /// Header names the dictionary injects into every request.
    pub fn custom_header_names(&self) -> impl Iterator<Item = &String> {
        self.restler_custom_payload_header
            .keys()
            .chain(self.restler_custom_payload_header_unquoted.keys())
    }

    pub fn custom_query_names(&self) -> impl Iterator<Item = &String> {
        self.restler_custom_payload_query.keys()
    }

    /// A `Content-Type` request-type custom payload, keyed
    /// `<endpoint>/<method>/Content-Type`, overriding the default.
    pub fn content_type_override(&self, request: &RequestId) -> Option<String> {
        let key = format!(
            "{}/{}/Content-Type",
            request.endpoint,
            request.method.as_str().to_lowercase()
        );
        self.restler_custom_payload
            .get(&key)
            .and_then(|values| values.first())
            .cloned()
    }
}

fn value_is_object(value: &str) -> bool {
    let trimmed = value.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}
