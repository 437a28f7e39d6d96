//! Writes the output artifacts. All serialization is pretty-printed JSON
//! with stable key order, so re-running a compile over unchanged inputs
//! reproduces every file byte for byte.

use std::path::{Path, PathBuf};

use anyhow::Context;
use indexmap::IndexMap;

use crate::{
    compiler::{dependencies::group_dependencies, CompilerOutput},
    engine_settings,
    grammar::Grammar,
};

pub const GRAMMAR_FILE: &str = "grammar.json";
pub const DICTIONARY_FILE: &str = "dict.json";
pub const DEPENDENCIES_FILE: &str = "dependencies.json";
pub const UNRESOLVED_DEPENDENCIES_FILE: &str = "unresolved_dependencies.json";
pub const DEPENDENCIES_DEBUG_FILE: &str = "dependencies_debug.json";
pub const EXAMPLES_FILE: &str = "examples.json";
pub const ENGINE_SETTINGS_FILE: &str = "engine_settings.json";

fn write_json(path: &Path, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .with_context(|| format!("cannot serialize {}", path.display()))?;
    std::fs::write(path, rendered).with_context(|| format!("cannot write {}", path.display()))
}

/// Writes every artifact of a compile into the output directory.
pub fn write_artifacts(
    output_directory: &Path,
    output: &CompilerOutput,
    engine_settings_path: Option<&Path>,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(output_directory).with_context(|| {
        format!(
            "cannot create output directory {}",
            output_directory.display()
        )
    })?;

    write_json(&output_directory.join(GRAMMAR_FILE), &output.grammar)?;
    write_json(&output_directory.join(DICTIONARY_FILE), &output.dictionary)?;

    let mut per_resource_files: IndexMap<String, String> = IndexMap::new();
    for (name, (dictionary, endpoints)) in &output.per_resource_dictionaries {
        let file_name = format!("{name}_dict.json");
        write_json(&output_directory.join(&file_name), dictionary)?;
        for endpoint in endpoints {
            per_resource_files.insert(endpoint.clone(), file_name.clone());
        }
    }

    let sorted = output.dependencies.sorted_dependencies();
    write_json(
        &output_directory.join(DEPENDENCIES_FILE),
        &group_dependencies(&sorted),
    )?;
    write_json(
        &output_directory.join(UNRESOLVED_DEPENDENCIES_FILE),
        &group_dependencies(&output.dependencies.unresolved()),
    )?;
    write_json(&output_directory.join(DEPENDENCIES_DEBUG_FILE), &sorted)?;

    if let Some(listing) = &output.example_listing {
        write_json(&output_directory.join(EXAMPLES_FILE), listing)?;
    }

    if engine_settings_path.is_some() || !per_resource_files.is_empty() {
        let existing = match engine_settings_path {
            Some(path) => engine_settings::load_engine_settings(path)?,
            None => serde_json::Value::Null,
        };
        let long_running: Vec<String> = output
            .grammar
            .requests
            .iter()
            .filter(|request| request.metadata.is_long_running_operation)
            .map(|request| request.id.endpoint.clone())
            .collect();
        let updated =
            engine_settings::update_engine_settings(existing, &per_resource_files, &long_running);
        write_json(&output_directory.join(ENGINE_SETTINGS_FILE), &updated)?;
    }

    log::info!(
        "grammar artifacts written to {}",
        output_directory.display()
    );
    Ok(())
}

/// Reads back a previously emitted grammar for the bypass mode.
pub fn read_grammar(path: &PathBuf) -> anyhow::Result<Grammar> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read grammar {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("grammar {} cannot be deserialized", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compiler::dependencies::DependencyIndex, dictionary::MutationsDictionary};

    fn empty_output() -> CompilerOutput {
        CompilerOutput {
            grammar: Grammar::default(),
            dictionary: MutationsDictionary::default_dictionary(),
            per_resource_dictionaries: IndexMap::new(),
            dependencies: DependencyIndex::default(),
            example_listing: None,
        }
    }

    #[test]
    fn grammar_file_round_trips_byte_identically() {
        let directory = tempfile::tempdir().unwrap();
        let output = empty_output();
        write_artifacts(directory.path(), &output, None).unwrap();

        let grammar_path = directory.path().join(GRAMMAR_FILE);
        let first = std::fs::read(&grammar_path).unwrap();
        let grammar = read_grammar(&grammar_path).unwrap();
        let second = serde_json::to_string_pretty(&grammar).unwrap();
        assert_eq!(first, second.into_bytes());
    }

    #[test]
    fn engine_settings_only_written_when_relevant() {
        let directory = tempfile::tempdir().unwrap();
        write_artifacts(directory.path(), &empty_output(), None).unwrap();
        assert!(!directory.path().join(ENGINE_SETTINGS_FILE).exists());

        let mut output = empty_output();
        output.per_resource_dictionaries.insert(
            "stores".to_owned(),
            (
                MutationsDictionary::default_dictionary(),
                vec!["/stores".to_owned()],
            ),
        );
        write_artifacts(directory.path(), &output, None).unwrap();
        assert!(directory.path().join(ENGINE_SETTINGS_FILE).exists());
        assert!(directory.path().join("stores_dict.json").exists());
    }
}
