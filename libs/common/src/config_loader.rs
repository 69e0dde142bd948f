//! Configuration loading helper functions
//! Provides utilities for loading configuration with fallback logic

use std::path::Path;

use errors::{AsaError, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

/// Get string configuration value with priority: explicit > ENV > Default
pub fn get_string_config(
    explicit: Option<String>,
    is_default: bool,
    env_var: &str,
    default: String,
) -> String {
    if let Some(val) = explicit {
        if !val.is_empty() && !is_default {
            debug!("Using {} from configuration", env_var);
            return val;
        }
    }

    if let Ok(env_val) = std::env::var(env_var) {
        if !env_val.is_empty() {
            info!("Using {} from environment", env_var);
            return env_val;
        }
    }

    debug!("Using default value for {}", env_var);
    default
}

/// Load a configuration struct from defaults, an optional YAML file and
/// prefixed environment variables, in increasing priority.
///
/// Nested keys are addressed with a double underscore, e.g.
/// `ASA_CONVERSION__MAX_CONCURRENCY=4`.
///
/// An explicit `path` that does not exist is an error; callers that only want
/// "use the file if present" should check existence first.
pub fn load_layered<T>(path: Option<&Path>, env_prefix: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(AsaError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        info!("Loading configuration from {}", path.display());
        figment = figment.merge(Yaml::file(path));
    }

    let config = figment
        .merge(Env::prefixed(env_prefix).split("__"))
        .extract()?;

    Ok(config)
}
