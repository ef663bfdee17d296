use std::io;
use std::path::{Path, PathBuf};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory holding the configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for every configuration layer.
const LAYER_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Stem of the layer loaded in every environment.
const BASE_LAYER: &str = "base";

/// Environment variables overriding file values look like `APP_MATCHING__RADIUS_ARCSEC`.
const ENV_PREFIX: &str = "APP";
const ENV_PREFIX_SEPARATOR: &str = "_";
const ENV_KEY_SEPARATOR: &str = "__";
const ENV_LIST_SEPARATOR: &str = ",";

/// Implemented by top-level configuration structures loadable with [`load_config`].
pub trait Config {
    /// Keys whose environment variable values are comma-separated lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors raised while reading the configuration layers.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingDirectory(PathBuf),

    /// No file with a supported extension exists for a layer.
    #[error("no `{layer}` configuration file in `{directory}`, tried {tried:?}")]
    LayerNotFound {
        layer: String,
        directory: PathBuf,
        tried: Vec<PathBuf>,
    },

    /// A layer file exists but cannot be parsed.
    #[error("invalid configuration file `{path}`: {source}")]
    InvalidLayer {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    #[error("failed to merge configuration layers: {0}")]
    Build(#[source] config::ConfigError),

    #[error("configuration does not match the expected structure: {0}")]
    Deserialize(#[source] config::ConfigError),
}

/// Loads the configuration of type `T` from the `configuration` directory of the working
/// directory, for the environment named by `APP_ENVIRONMENT`.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = std::env::current_dir()
        .map_err(LoadConfigError::CurrentDir)?
        .join(CONFIGURATION_DIR);
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&directory, environment)
}

/// Loads the configuration of type `T` from `directory`.
///
/// `base.{yaml,yml,json}` is read first, `{environment}.{yaml,yml,json}` is layered on top of
/// it and `APP_`-prefixed environment variables win over both. Each file is parsed as soon as
/// it is added so that syntax errors name the file holding them.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingDirectory(directory.to_path_buf()));
    }

    let mut builder = config::Config::builder();
    for layer in [BASE_LAYER, environment.as_str()] {
        let path = layer_file(directory, layer)?;
        builder = builder.add_source(config::File::from(path.as_path()));
        check_layer(&builder, path)?;
    }

    builder
        .add_source(env_overrides(T::LIST_PARSE_KEYS))
        .build()
        .map_err(LoadConfigError::Build)?
        .try_deserialize()
        .map_err(LoadConfigError::Deserialize)
}

/// Returns the first existing file of `layer` in `directory`.
fn layer_file(directory: &Path, layer: &str) -> Result<PathBuf, LoadConfigError> {
    let tried: Vec<PathBuf> = LAYER_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{layer}.{extension}")))
        .collect();

    match tried.iter().find(|path| path.is_file()) {
        Some(path) => Ok(path.clone()),
        None => Err(LoadConfigError::LayerNotFound {
            layer: layer.to_string(),
            directory: directory.to_path_buf(),
            tried,
        }),
    }
}

fn check_layer(builder: &ConfigBuilder<DefaultState>, path: PathBuf) -> Result<(), LoadConfigError> {
    match builder.build_cloned() {
        Ok(_) => Ok(()),
        Err(source) => Err(LoadConfigError::InvalidLayer { path, source }),
    }
}

fn env_overrides(list_keys: &[&str]) -> config::Environment {
    let overrides = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_KEY_SEPARATOR);

    if list_keys.is_empty() {
        return overrides;
    }

    list_keys.iter().fold(
        overrides.try_parsing(true).list_separator(ENV_LIST_SEPARATOR),
        |overrides, key| overrides.with_list_parse_key(key),
    )
}
