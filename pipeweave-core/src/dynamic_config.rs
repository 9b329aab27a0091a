//! Dynamic runtime configuration
//!
//! Config providers generate framework configuration that only exists once a
//! unit runs, such as credentials taken from the unit's environment. Each
//! provider writes one file, `conf/<target_env>/<target_config_file>`, merged
//! over whatever that file already holds.
//!
//! Providers are listed under `run_config.dynamic_config_providers` and looked
//! up by identifier in a [`ProviderRegistry`], the same way grouping
//! strategies are.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, PluginConfig};
use crate::grouping::registry::check_params;
use crate::runtime::{load_mapping, write_mapping};

const PROVIDER_KIND: &str = "config provider";

/// Environment the generated files land in unless a provider says otherwise
pub const DEFAULT_TARGET_ENV: &str = "base";

/// Provider parameters as written in configuration
pub type ProviderParams = BTreeMap<String, JsonValue>;

/// Entry of `run_config.dynamic_config_providers`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub cls: String,
    #[serde(default)]
    pub params: ProviderParams,
}

/// Generator of one framework config file
pub trait DynamicConfigProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Config environment directory the file is written to
    fn target_env(&self) -> &str {
        DEFAULT_TARGET_ENV
    }

    /// File name inside the environment directory
    fn target_config_file(&self) -> &str;

    fn generate_config(&self) -> Result<Mapping, ConfigError>;

    /// Top-level keys of `generated` replace the same keys of `existing`
    fn merge_with_existing(&self, mut existing: Mapping, generated: Mapping) -> Mapping {
        for (key, value) in generated {
            existing.insert(key, value);
        }
        existing
    }
}

/// Constructor for a config provider
pub type ProviderBuildFn =
    fn(&PluginConfig, &ProviderParams) -> Result<Box<dyn DynamicConfigProvider>, ConfigError>;

/// Registered provider constructor and its parameter contract
#[derive(Clone, Copy)]
pub struct ProviderFactory {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub build: ProviderBuildFn,
}

/// Registry of config providers keyed by identifier
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `static` and `env` providers
    pub fn with_builtins() -> Self {
        let fixed = ProviderFactory {
            required: &["file", "values"],
            optional: &["env"],
            build: build_static,
        };
        let env = ProviderFactory {
            required: &["variables"],
            optional: &["file", "section", "env"],
            build: build_env,
        };

        let mut registry = Self::new();
        registry.register(StaticConfigProvider::NAME, fixed);
        registry.register("StaticConfigProvider", fixed);
        registry.register(EnvConfigProvider::NAME, env);
        registry.register("EnvConfigProvider", env);
        registry
    }

    /// Register (or replace) a provider
    pub fn register(&mut self, id: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the provider named in `provider`
    pub fn build(
        &self,
        config: &PluginConfig,
        provider: &ProviderConfig,
    ) -> Result<Box<dyn DynamicConfigProvider>, ConfigError> {
        let factory = self
            .factories
            .get(&provider.cls)
            .ok_or_else(|| ConfigError::UnknownStrategy {
                kind: PROVIDER_KIND,
                name: provider.cls.clone(),
                known: self.names().map(str::to_string).collect(),
            })?;

        check_params(
            PROVIDER_KIND,
            &provider.cls,
            factory.required,
            factory.optional,
            &provider.params,
        )?;

        let built = (factory.build)(config, &provider.params)?;
        tracing::info!(provider = built.name(), "Initialized config provider");
        Ok(built)
    }
}

/// Write the file of every configured provider under `conf_root`
///
/// Returns the paths written, in configuration order.
pub fn materialize(
    config: &PluginConfig,
    registry: &ProviderRegistry,
    conf_root: &Path,
) -> Result<Vec<PathBuf>, ConfigError> {
    config
        .run_config
        .dynamic_config_providers
        .iter()
        .map(|entry| {
            let provider = registry.build(config, entry)?;
            write_provider_config(provider.as_ref(), conf_root)
        })
        .collect()
}

/// Generate the file of `provider` and merge it into `conf_root`
pub fn write_provider_config(
    provider: &dyn DynamicConfigProvider,
    conf_root: &Path,
) -> Result<PathBuf, ConfigError> {
    let path = conf_root
        .join(provider.target_env())
        .join(provider.target_config_file());

    let generated = provider.generate_config()?;
    let merged = provider.merge_with_existing(load_mapping(&path)?, generated);
    write_mapping(&path, &merged)?;

    tracing::info!(
        provider = provider.name(),
        path = %path.display(),
        "Materialized dynamic configuration"
    );
    Ok(path)
}

/// Writes the values given in configuration
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    file: String,
    env: String,
    values: Mapping,
}

impl StaticConfigProvider {
    pub const NAME: &'static str = "static";
}

impl DynamicConfigProvider for StaticConfigProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn target_env(&self) -> &str {
        &self.env
    }

    fn target_config_file(&self) -> &str {
        &self.file
    }

    fn generate_config(&self) -> Result<Mapping, ConfigError> {
        Ok(self.values.clone())
    }
}

/// Copies environment variables of the unit into one config section
///
/// Unset variables are skipped.
#[derive(Debug, Clone)]
pub struct EnvConfigProvider {
    file: String,
    env: String,
    section: String,
    variables: Vec<String>,
}

impl EnvConfigProvider {
    pub const NAME: &'static str = "env";
    pub const DEFAULT_FILE: &'static str = "credentials.yml";
    pub const DEFAULT_SECTION: &'static str = "env_credentials";
}

impl DynamicConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn target_env(&self) -> &str {
        &self.env
    }

    fn target_config_file(&self) -> &str {
        &self.file
    }

    fn generate_config(&self) -> Result<Mapping, ConfigError> {
        let mut section = Mapping::new();
        for variable in &self.variables {
            match std::env::var(variable) {
                Ok(value) => {
                    section.insert(Value::from(variable.as_str()), Value::from(value));
                }
                Err(_) => tracing::warn!(variable = %variable, "Environment variable is not set, skipping"),
            }
        }

        let mut config = Mapping::new();
        config.insert(Value::from(self.section.as_str()), Value::Mapping(section));
        Ok(config)
    }
}

fn build_static(
    _config: &PluginConfig,
    params: &ProviderParams,
) -> Result<Box<dyn DynamicConfigProvider>, ConfigError> {
    let values = match params.get("values") {
        Some(values @ JsonValue::Object(_)) => match serde_yaml::to_value(values)? {
            Value::Mapping(mapping) => mapping,
            _ => Mapping::new(),
        },
        other => {
            return Err(invalid(
                StaticConfigProvider::NAME,
                "values",
                format!("expected a mapping, got {}", other.unwrap_or(&JsonValue::Null)),
            ));
        }
    };

    Ok(Box::new(StaticConfigProvider {
        file: string_param(StaticConfigProvider::NAME, params, "file")?.unwrap_or_default(),
        env: string_param(StaticConfigProvider::NAME, params, "env")?
            .unwrap_or_else(|| DEFAULT_TARGET_ENV.to_string()),
        values,
    }))
}

fn build_env(
    _config: &PluginConfig,
    params: &ProviderParams,
) -> Result<Box<dyn DynamicConfigProvider>, ConfigError> {
    let variables = match params.get("variables") {
        Some(JsonValue::Array(items)) => items
            .iter()
            .map(|item| match item {
                JsonValue::String(name) if !name.is_empty() => Ok(name.clone()),
                other => Err(invalid(
                    EnvConfigProvider::NAME,
                    "variables",
                    format!("expected variable names, got {other}"),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(invalid(
                EnvConfigProvider::NAME,
                "variables",
                format!("expected a list, got {}", other.unwrap_or(&JsonValue::Null)),
            ));
        }
    };

    Ok(Box::new(EnvConfigProvider {
        file: string_param(EnvConfigProvider::NAME, params, "file")?
            .unwrap_or_else(|| EnvConfigProvider::DEFAULT_FILE.to_string()),
        env: string_param(EnvConfigProvider::NAME, params, "env")?
            .unwrap_or_else(|| DEFAULT_TARGET_ENV.to_string()),
        section: string_param(EnvConfigProvider::NAME, params, "section")?
            .unwrap_or_else(|| EnvConfigProvider::DEFAULT_SECTION.to_string()),
        variables,
    }))
}

/// Optional non-empty string parameter
fn string_param(
    provider: &str,
    params: &ProviderParams,
    key: &str,
) -> Result<Option<String>, ConfigError> {
    match params.get(key) {
        None => Ok(None),
        Some(JsonValue::String(value)) if !value.is_empty() => Ok(Some(value.clone())),
        Some(other) => Err(invalid(
            provider,
            key,
            format!("expected a non-empty string, got {other}"),
        )),
    }
}

fn invalid(provider: &str, param: &str, reason: String) -> ConfigError {
    ConfigError::InvalidParam {
        kind: PROVIDER_KIND,
        strategy: provider.to_string(),
        param: param.to_string(),
        reason,
    }
}
