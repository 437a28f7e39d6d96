//! Updates an engine settings file with compiler results: which endpoints
//! carry their own mutations dictionary, and default timing delays for
//! long-running resource creation. Settings the compiler does not manage
//! pass through untouched.

use std::path::Path;

use anyhow::Context;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

const PER_RESOURCE_SETTINGS_KEY: &str = "per_resource_settings";
const PRODUCER_TIMING_DELAY_KEY: &str = "global_producer_timing_delay";
const ASYNC_CREATION_TIME_KEY: &str = "max_async_resource_creation_time";

/// The default seconds waited for a long-running creation to finish.
const DEFAULT_PRODUCER_TIMING_DELAY: u64 = 10;
const DEFAULT_ASYNC_CREATION_TIME: u64 = 20;

pub fn load_engine_settings(path: &Path) -> anyhow::Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read engine settings {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("engine settings {} is not JSON", path.display()))
}

/// Applies the compiler's updates on top of existing settings.
///
/// `per_resource_dictionary_files` maps an endpoint to the file name of
/// the dictionary that covers it; `long_running_endpoints` lists endpoints
/// whose creation responds asynchronously.
pub fn update_engine_settings(
    settings: Value,
    per_resource_dictionary_files: &IndexMap<String, String>,
    long_running_endpoints: &[String],
) -> Value {
    let mut settings = match settings {
        Value::Object(map) => map,
        other => {
            if !other.is_null() {
                log::warn!("engine settings are not a JSON object, starting fresh");
            }
            Map::new()
        }
    };

    let per_resource = settings
        .entry(PER_RESOURCE_SETTINGS_KEY.to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(per_resource) = per_resource {
        for (endpoint, dictionary_file) in per_resource_dictionary_files {
            let entry = per_resource
                .entry(endpoint.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(entry) = entry {
                entry.insert(
                    "custom_dictionary".to_owned(),
                    Value::String(dictionary_file.clone()),
                );
            }
        }
        for endpoint in long_running_endpoints {
            let entry = per_resource
                .entry(endpoint.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(entry) = entry {
                entry
                    .entry("producer_timing_delay".to_owned())
                    .or_insert(json!(DEFAULT_PRODUCER_TIMING_DELAY));
            }
        }
    }

    if !long_running_endpoints.is_empty() {
        settings
            .entry(PRODUCER_TIMING_DELAY_KEY.to_owned())
            .or_insert(json!(DEFAULT_PRODUCER_TIMING_DELAY));
        settings
            .entry(ASYNC_CREATION_TIME_KEY.to_owned())
            .or_insert(json!(DEFAULT_ASYNC_CREATION_TIME));
    }

    Value::Object(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrelated_settings_pass_through() {
        let settings = json!({"max_combinations": 5});
        let updated = update_engine_settings(settings, &IndexMap::new(), &[]);
        assert_eq!(updated["max_combinations"], 5);
        assert!(updated[PER_RESOURCE_SETTINGS_KEY].is_object());
        assert!(updated.get(PRODUCER_TIMING_DELAY_KEY).is_none());
    }

    #[test]
    fn per_resource_dictionaries_and_delays() {
        let mut files = IndexMap::new();
        files.insert("/stores".to_owned(), "stores_dict.json".to_owned());
        let updated = update_engine_settings(
            json!({}),
            &files,
            &["/stores".to_owned(), "/orders".to_owned()],
        );
        assert_eq!(
            updated[PER_RESOURCE_SETTINGS_KEY]["/stores"]["custom_dictionary"],
            "stores_dict.json"
        );
        assert_eq!(
            updated[PER_RESOURCE_SETTINGS_KEY]["/orders"]["producer_timing_delay"],
            json!(DEFAULT_PRODUCER_TIMING_DELAY)
        );
        assert_eq!(
            updated[PRODUCER_TIMING_DELAY_KEY],
            json!(DEFAULT_PRODUCER_TIMING_DELAY)
        );
        assert_eq!(
            updated[ASYNC_CREATION_TIME_KEY],
            json!(DEFAULT_ASYNC_CREATION_TIME)
        );
    }

    #[test]
    fn existing_delays_are_kept() {
        let updated = update_engine_settings(
            json!({"global_producer_timing_delay": 60}),
            &IndexMap::new(),
            &["/x".to_owned()],
        );
        assert_eq!(updated[PRODUCER_TIMING_DELAY_KEY], 60);
    }
}
