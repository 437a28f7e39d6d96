//! User-supplied example payloads.
//!
//! Examples come from an example configuration file (mapping endpoint and
//! method to named example payloads, inline or in files) or are discovered
//! by scanning a directory. An example payload is a JSON object mapping
//! parameter names to values; the request body travels under the special
//! `__body__` key. The loaded index is written back as `examples.json` so a
//! discovery run can be replayed exactly.

use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;
use serde_json::Value;
use walkdir::WalkDir;

use crate::{grammar::RequestId, method::Method};

/// One example payload for one operation.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedExample {
    pub name: String,
    pub parameters: IndexMap<String, Value>,
    /// Use the body value verbatim instead of merging it into the schema.
    pub exact_copy: bool,
}

/// All examples known for a compilation, keyed by endpoint and method.
#[derive(Clone, Debug, Default)]
pub struct ExampleIndex {
    examples: IndexMap<(String, Method), Vec<NamedExample>>,
    /// The config-shaped listing written to `examples.json`.
    listing: IndexMap<String, IndexMap<String, IndexMap<String, Value>>>,
}

impl ExampleIndex {
    pub fn for_request(&self, id: &RequestId) -> &[NamedExample] {
        self.examples
            .get(&(id.endpoint.clone(), id.method))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Merges an example configuration file into the index. Entry values
    /// are either inline objects or paths to payload files, resolved
    /// relative to the configuration file.
    pub fn load_config_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read example config {}", path.display()))?;
        let document: Value = serde_json::from_str(&contents)
            .with_context(|| format!("example config {} is not JSON", path.display()))?;
        let exact_copy = document
            .get("exactCopy")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let Some(paths) = document.get("paths").and_then(Value::as_object) else {
            log::warn!("example config {} has no paths key", path.display());
            return Ok(());
        };
        let base_directory = path.parent().unwrap_or_else(|| Path::new("."));
        for (endpoint, methods) in paths {
            let Some(methods) = methods.as_object() else {
                log::warn!("dropping malformed example entry for {endpoint}");
                continue;
            };
            for (method_name, entries) in methods {
                let Ok(method) = Method::try_from(method_name.as_str()) else {
                    log::warn!("dropping example entry with invalid method {method_name}");
                    continue;
                };
                let Some(entries) = entries.as_object() else {
                    log::warn!("dropping malformed example entry for {endpoint}/{method_name}");
                    continue;
                };
                for (example_name, source) in entries {
                    match self.load_example(base_directory, source) {
                        Some(parameters) => {
                            self.insert(
                                endpoint.clone(),
                                method,
                                NamedExample {
                                    name: example_name.clone(),
                                    parameters,
                                    exact_copy,
                                },
                                source.clone(),
                            );
                        }
                        None => log::warn!(
                            "dropping malformed example {example_name} for {endpoint}/{method_name}"
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    /// Scans a directory for example payload files named
    /// `<method>_<endpoint with separators flattened to '_'>.json`.
    pub fn discover(&mut self, directory: &Path, requests: &[RequestId]) -> anyhow::Result<()> {
        let mut files: Vec<PathBuf> = WalkDir::new(directory)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|extension| extension == "json"))
            .collect();
        files.sort();
        for file in files {
            let Some(stem) = file.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let Some(request) = requests
                .iter()
                .find(|request| discovered_file_stem(request) == stem)
            else {
                continue;
            };
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read example file {}", file.display()))?;
            match serde_json::from_str::<Value>(&contents)
                .ok()
                .and_then(|value| example_parameters(&value))
            {
                Some(parameters) => {
                    self.insert(
                        request.endpoint.clone(),
                        request.method,
                        NamedExample {
                            name: stem.to_owned(),
                            parameters,
                            exact_copy: false,
                        },
                        Value::String(file.display().to_string()),
                    );
                }
                None => log::warn!("dropping malformed example file {}", file.display()),
            }
        }
        Ok(())
    }

    /// The `examples.json` artifact: what was loaded, config-shaped.
    pub fn discovery_listing(&self) -> Value {
        serde_json::json!({ "paths": self.listing })
    }

    fn insert(&mut self, endpoint: String, method: Method, example: NamedExample, source: Value) {
        self.listing
            .entry(endpoint.clone())
            .or_default()
            .entry(method.as_str().to_lowercase())
            .or_default()
            .insert(example.name.clone(), source);
        self.examples
            .entry((endpoint, method))
            .or_default()
            .push(example);
    }

    fn load_example(
        &self,
        base_directory: &Path,
        source: &Value,
    ) -> Option<IndexMap<String, Value>> {
        match source {
            Value::String(file_name) => {
                let path = base_directory.join(file_name);
                let contents = std::fs::read_to_string(&path)
                    .map_err(|err| log::warn!("cannot read example {}: {err}", path.display()))
                    .ok()?;
                example_parameters(&serde_json::from_str(&contents).ok()?)
            }
            inline => example_parameters(inline),
        }
    }
}

/// The file stem a discovered example must carry for a request:
/// the method, then the endpoint with separators and braces flattened.
fn discovered_file_stem(request: &RequestId) -> String {
    let flattened: String = request
        .endpoint
        .chars()
        .map(|c| if matches!(c, '/' | '{' | '}' | '.') { '_' } else { c })
        .collect();
    format!(
        "{}_{}",
        request.method.as_str().to_lowercase(),
        flattened.trim_matches('_')
    )
}

/// Extracts the parameter map of an example payload. Payloads either wrap
/// their parameters under a `parameters` key or are the bare map.
fn example_parameters(value: &Value) -> Option<IndexMap<String, Value>> {
    let object = match value.get("parameters") {
        Some(parameters) => parameters.as_object()?,
        None => value.as_object()?,
    };
    Some(
        object
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}
