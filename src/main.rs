//! Command-line entry point: parse arguments, set up logging, run the
//! compile, write the artifacts. A fatal compile error surfaces here and
//! exits non-zero.

use clap::Parser;

mod access_path;
mod annotations;
mod compiler;
mod configuration;
mod dictionary;
mod emit;
mod engine_settings;
mod grammar;
mod method;
mod openapi;
mod payload;
mod payload_examples;

use compiler::{CompileError, CompilerOutput};
use configuration::{Cli, Commands, CompilerConfiguration};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("restgram {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Compile {
            config,
            api_specs,
            grammar_output_directory,
            dictionary,
            annotations,
            engine_settings,
            log_level,
        } => {
            configuration::init_logging(log_level);
            let configuration = CompilerConfiguration::from_compile_command(
                config.as_deref(),
                &api_specs,
                grammar_output_directory,
                dictionary,
                annotations,
                engine_settings,
            )?;
            run_compile(&configuration)
        }
    }
}

fn run_compile(configuration: &CompilerConfiguration) -> anyhow::Result<()> {
    let output_directory = configuration
        .grammar_output_directory_path
        .clone()
        .ok_or(CompileError::MissingOutputDirectory)?;

    let output = match &configuration.grammar_input_file_path {
        // Bypass mode: re-emit a previously compiled grammar unchanged.
        Some(grammar_path) => {
            log::info!("re-emitting grammar from {}", grammar_path.display());
            let dictionary = match &configuration.custom_dictionary_file_path {
                Some(path) => dictionary::MutationsDictionary::from_file(path)?,
                None => dictionary::MutationsDictionary::default_dictionary(),
            };
            CompilerOutput {
                grammar: emit::read_grammar(grammar_path)?,
                dictionary,
                per_resource_dictionaries: indexmap::IndexMap::new(),
                dependencies: compiler::dependencies::DependencyIndex::default(),
                example_listing: None,
            }
        }
        None => compiler::compile(configuration)?,
    };

    for dependency in output.dependencies.unresolved() {
        log::warn!(
            "no producer found for {} parameter {} of {}",
            format!("{:?}", dependency.consumer.kind).to_lowercase(),
            dependency.consumer.resource.name(),
            dependency.consumer.resource.request_id,
        );
    }

    emit::write_artifacts(
        &output_directory,
        &output,
        configuration.engine_settings_file_path.as_deref(),
    )
}
