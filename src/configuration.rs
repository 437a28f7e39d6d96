use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::{compiler::api_resource::NamingConvention, dictionary::MutationsDictionary};

const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

/// Compiles OpenAPI specifications into stateful REST API fuzzing grammars.
#[derive(Parser)]
#[command(about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// The list of supported subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print the version and exit
    Version,
    /// Compile one or more API specifications into a fuzzing grammar
    Compile {
        /// The path to a compiler configuration file. Arguments given on
        /// the command line take precedence over the configuration file.
        #[arg(long, value_parser, value_name = "CONFIG_FILE.JSON")]
        config: Option<PathBuf>,
        /// OpenAPI specifications to compile. May be given multiple times.
        #[arg(long = "api-spec", value_parser, value_name = "OPENAPI_SPEC")]
        api_specs: Vec<PathBuf>,
        /// The directory the grammar artifacts are written to.
        #[arg(long, value_parser, value_name = "OUTPUT_DIR")]
        grammar_output_directory: Option<PathBuf>,
        /// A mutations dictionary with custom payloads.
        #[arg(long, value_parser, value_name = "DICT.JSON")]
        dictionary: Option<PathBuf>,
        /// A file with producer-consumer annotations.
        #[arg(long, value_parser, value_name = "ANNOTATIONS.JSON")]
        annotations: Option<PathBuf>,
        /// Engine settings to update with compiler results.
        #[arg(long, value_parser, value_name = "ENGINE_SETTINGS.JSON")]
        engine_settings: Option<PathBuf>,
        // Manually added possible values below, since automatically showing possible values of an external (remote) enum
        // such as log::LevelFilter is not well supported.
        /// Log level to output. This flag takes precedence over the environment variable. [possible values: off, error, warn, debug, info, trace]
        #[arg(value_parser = clap::value_parser!(log::LevelFilter), long, value_enum, env = "LOG_LEVEL", ignore_case = true)]
        log_level: Option<log::LevelFilter>,
    },
}

pub fn init_logging(log_level: Option<log::LevelFilter>) {
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level.unwrap_or(DEFAULT_LOG_LEVEL))
        .init();
}

/// One specification with its own dictionary and annotations.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerSpecConfig {
    pub spec_file_path: PathBuf,
    #[serde(default)]
    pub dictionary_file_path: Option<PathBuf>,
    #[serde(default)]
    pub dictionary: Option<MutationsDictionary>,
    #[serde(default)]
    pub annotation_file_path: Option<PathBuf>,
}

/// The full option set of a compilation, deserialized from the
/// configuration file with command-line overrides applied on top.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct CompilerConfiguration {
    // Specification inputs.
    pub swagger_spec_file_path: Option<Vec<PathBuf>>,
    pub swagger_spec_config: Option<Vec<SwaggerSpecConfig>>,
    /// Bypass compilation and re-emit a previously produced grammar.
    pub grammar_input_file_path: Option<PathBuf>,
    pub grammar_output_directory_path: Option<PathBuf>,

    // Dictionary, annotations, engine settings.
    pub custom_dictionary_file_path: Option<PathBuf>,
    pub annotation_file_path: Option<PathBuf>,
    pub engine_settings_file_path: Option<PathBuf>,

    // Example handling.
    pub use_header_examples: bool,
    pub use_path_examples: bool,
    pub use_query_examples: bool,
    pub use_body_examples: bool,
    pub use_all_example_payloads: bool,
    pub discover_examples: bool,
    pub examples_directory: Option<PathBuf>,
    pub example_config_file_path: Option<PathBuf>,
    pub example_config_files: Vec<PathBuf>,

    // Dependency resolution.
    pub resolve_query_dependencies: bool,
    pub resolve_body_dependencies: bool,
    pub resolve_header_dependencies: bool,
    pub allow_get_producers: bool,
    pub api_naming_convention: Option<NamingConvention>,
    pub include_optional_parameters: bool,
    pub data_fuzzing: bool,
    pub read_only_fuzz: bool,
    pub track_fuzzed_parameter_names: bool,
    pub json_property_max_depth: Option<usize>,
    pub use_refreshable_token: bool,
}

impl Default for CompilerConfiguration {
    fn default() -> Self {
        Self {
            swagger_spec_file_path: None,
            swagger_spec_config: None,
            grammar_input_file_path: None,
            grammar_output_directory_path: None,
            custom_dictionary_file_path: None,
            annotation_file_path: None,
            engine_settings_file_path: None,
            use_header_examples: false,
            use_path_examples: false,
            use_query_examples: false,
            use_body_examples: false,
            use_all_example_payloads: false,
            discover_examples: false,
            examples_directory: None,
            example_config_file_path: None,
            example_config_files: Vec::new(),
            resolve_query_dependencies: true,
            resolve_body_dependencies: true,
            resolve_header_dependencies: false,
            allow_get_producers: false,
            api_naming_convention: None,
            include_optional_parameters: true,
            data_fuzzing: false,
            read_only_fuzz: false,
            track_fuzzed_parameter_names: false,
            json_property_max_depth: None,
            use_refreshable_token: true,
        }
    }
}

impl CompilerConfiguration {
    /// Reads a configuration file. JSON parses as a YAML subset, so one
    /// reader covers both formats.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("invalid configuration file {}", path.display()))
    }

    /// Builds the effective configuration from the compile subcommand.
    pub fn from_compile_command(
        config: Option<&Path>,
        api_specs: &[PathBuf],
        grammar_output_directory: Option<PathBuf>,
        dictionary: Option<PathBuf>,
        annotations: Option<PathBuf>,
        engine_settings: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut configuration = match config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if !api_specs.is_empty() {
            configuration.swagger_spec_file_path = Some(api_specs.to_vec());
        }
        if grammar_output_directory.is_some() {
            configuration.grammar_output_directory_path = grammar_output_directory;
        }
        if dictionary.is_some() {
            configuration.custom_dictionary_file_path = dictionary;
        }
        if annotations.is_some() {
            configuration.annotation_file_path = annotations;
        }
        if engine_settings.is_some() {
            configuration.engine_settings_file_path = engine_settings;
        }
        Ok(configuration)
    }

    /// The per-spec entries, synthesized from the flat path list when no
    /// detailed configuration was given.
    pub fn spec_configs(&self) -> Vec<SwaggerSpecConfig> {
        if let Some(configs) = &self.swagger_spec_config {
            return configs.clone();
        }
        self.swagger_spec_file_path
            .iter()
            .flatten()
            .map(|path| SwaggerSpecConfig {
                spec_file_path: path.clone(),
                dictionary_file_path: None,
                dictionary: None,
                annotation_file_path: None,
            })
            .collect()
    }
}
