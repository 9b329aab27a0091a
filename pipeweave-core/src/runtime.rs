//! Runtime config materialization
//!
//! Runs inside a unit before the framework does: stores the run parameters
//! under `run.params` of the framework's YAML config file.

use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::config::ConfigError;

/// Write `params_json` into the `run.params` section of `output`
///
/// The payload may be wrapped in single quotes as it arrives from the shell.
/// An existing file keeps every other key. An empty payload does nothing.
pub fn store_parameters(params_json: &str, output: impl AsRef<Path>) -> Result<(), ConfigError> {
    let output = output.as_ref();
    let payload = params_json.trim().trim_matches('\'');
    if payload.is_empty() {
        tracing::debug!("No params to serialize");
        return Ok(());
    }

    let params: Value = serde_json::from_str(payload)?;

    let mut config = load_mapping(output)?;
    let run = config
        .entry(Value::from("run"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    let Value::Mapping(run) = run else {
        return Err(ConfigError::Invalid("`run` section must be a mapping".into()));
    };
    run.insert(Value::from("params"), params);

    write_mapping(output, &config)?;
    tracing::info!(path = %output.display(), "Stored run parameters");
    Ok(())
}

/// YAML mapping stored at `path`, empty when the file is missing or blank
pub(crate) fn load_mapping(path: &Path) -> Result<Mapping, ConfigError> {
    if !path.exists() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(&std::fs::read_to_string(path)?)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(ConfigError::Invalid(format!(
            "{} does not contain a mapping",
            path.display()
        ))),
    }
}

/// Write `mapping` to `path`, creating missing parent directories
pub(crate) fn write_mapping(path: &Path, mapping: &Mapping) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_yaml::to_string(mapping)?)?;
    Ok(())
}
