//! Configuration handling for proxy templates.
//! Loads the configuration file, expands environment variable references and
//! merges the result with the process environment.

use crate::constants::REQUIRED_CONFIG_KEYS;
use crate::error::{Error, Result};
use crate::renderer::{DirectiveSyntax, TemplateRenderer};
use indexmap::{IndexMap, IndexSet};
use log::debug;
use regex::Regex;
use std::path::Path;

/// Snapshot of environment variables, keyed by name.
pub type EnvVars = IndexMap<String, String>;

/// Fully merged template configuration.
pub type Config = serde_json::Map<String, serde_json::Value>;

/// Captures the environment of the current process.
/// Variables whose name or value is not valid unicode are ignored.
pub fn env_from_process() -> EnvVars {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Returns the distinct environment variables referenced by interpolation
/// directives (`{{= env.NAME }}` or `{{- env.NAME }}`), in order of first use.
///
/// # Errors
/// * `Error::DirectiveSyntaxError` if the delimiters do not form a valid pattern
pub fn referenced_env_vars(syntax: &DirectiveSyntax, content: &str) -> Result<Vec<String>> {
    let pattern = format!(
        r"{}[{}{}]\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*{}",
        regex::escape(&syntax.open),
        regex::escape(&syntax.interpolate.to_string()),
        regex::escape(&syntax.escape.to_string()),
        regex::escape(&syntax.close),
    );
    let re = Regex::new(&pattern)?;
    let names: IndexSet<String> =
        re.captures_iter(content).map(|caps| caps[1].to_string()).collect();
    Ok(names.into_iter().collect())
}

/// Fails with every referenced variable that is unset or empty in `env`.
pub fn check_env_vars(names: &[String], env: &EnvVars) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .filter(|name| env.get(name.as_str()).map_or(true, |value| value.is_empty()))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingEnvironmentVariable { names: missing })
    }
}

/// Parses rendered configuration text, JSON first with a YAML fallback.
///
/// # Errors
/// * `Error::ConfigParseError` if the content is neither, or is not a mapping
pub fn parse_config(path: &Path, content: &str) -> Result<Config> {
    let value: serde_json::Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(json_err) => serde_yaml::from_str(content).map_err(|_| Error::ConfigParseError {
            path: path.display().to_string(),
            message: json_err.to_string(),
        })?,
    };

    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::ConfigParseError {
            path: path.display().to_string(),
            message: format!("expected an object, found {}", json_type_name(&other)),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Loads the template configuration.
///
/// # Arguments
/// * `path` - Configuration file
/// * `engine` - Renderer used to expand `env` references; its directive
///   syntax is also used to find them
/// * `env` - Environment the configuration is evaluated against
///
/// # Returns
/// * `Result<Config>` - Parsed configuration overlaid with `env`
///
/// # Errors
/// * `Error::ConfigNotFound` if the file does not exist
/// * `Error::DirectiveSyntaxError` if the reference scan cannot be built
/// * `Error::MissingEnvironmentVariable` listing every unset reference
/// * `Error::TemplateRenderError` if evaluating the file fails
/// * `Error::ConfigParseError` if the result is not a JSON/YAML object
pub fn load_config<P: AsRef<Path>>(
    path: P,
    engine: &dyn TemplateRenderer,
    env: &EnvVars,
) -> Result<Config> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::ConfigNotFound { path: path.display().to_string() });
    }
    debug!("Loading configuration from {}", path.display());
    let raw = std::fs::read_to_string(path)?;

    check_env_vars(&referenced_env_vars(engine.syntax(), &raw)?, env)?;

    let context = serde_json::json!({ "env": env });
    let rendered = engine.render(&raw, &context, path)?;
    let mut config = parse_config(path, &rendered)?;

    for (key, value) in env {
        config.insert(key.clone(), serde_json::Value::String(value.clone()));
    }

    Ok(config)
}

/// Ensures the configuration defines every required key.
///
/// Null and empty string values count as missing.
pub fn require_keys(config: &Config) -> Result<()> {
    let missing: Vec<String> = REQUIRED_CONFIG_KEYS
        .iter()
        .filter(|key| match config.get(**key) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
        .map(|key| key.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingRequiredConfigKey { keys: missing })
    }
}

/// Returns a configuration value rendered as a plain string.
pub fn config_str(config: &Config, key: &str) -> Option<String> {
    match config.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
