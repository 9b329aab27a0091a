//! Configuration module
//!
//! Global CLI settings and loading of the plugin configuration and the
//! pipeline manifest they point to.

use anyhow::{Context, Result};
use pipeweave_client::{EnvTokenProvider, OrchestratorClient, PipelinesClient};
use pipeweave_core::config::PluginConfig;
use pipeweave_core::source::ManifestSource;
use std::path::{Path, PathBuf};

/// Framework configuration directory, one subdirectory per environment
pub const CONF_DIR: &str = "conf";

/// Configuration file name inside `conf/<env>/`
pub const CONFIG_FILE_NAME: &str = "pipeweave.yaml";

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
    /// Configuration environment
    pub env: String,
    /// Plugin configuration file
    pub config_path: PathBuf,
    /// Pipeline manifest file
    pub manifest_path: PathBuf,
}

impl Config {
    pub fn new(
        orchestrator_url: String,
        env: String,
        config_path: Option<PathBuf>,
        manifest_path: PathBuf,
    ) -> Self {
        let config_path = config_path.unwrap_or_else(|| default_config_path(&env));
        Self {
            orchestrator_url,
            env,
            config_path,
            manifest_path,
        }
    }

    pub fn plugin_config(&self) -> Result<PluginConfig> {
        let config = PluginConfig::from_path(&self.config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn manifest(&self) -> Result<ManifestSource> {
        ManifestSource::from_path(&self.manifest_path).with_context(|| {
            format!(
                "Failed to load pipeline manifest from {}",
                self.manifest_path.display()
            )
        })
    }

    /// Facade over the orchestrator for the current project
    pub fn pipelines_client(&self) -> Result<PipelinesClient> {
        let plugin_config = self.plugin_config()?;
        let source = self.manifest()?;

        Ok(PipelinesClient::new(
            OrchestratorClient::new(&self.orchestrator_url),
            plugin_config,
            Box::new(source),
            &project_name(),
            &self.env,
            Box::new(EnvTokenProvider),
        )?)
    }
}

/// `conf/<env>/pipeweave.yaml`
pub fn default_config_path(env: &str) -> PathBuf {
    Path::new(CONF_DIR).join(env).join(CONFIG_FILE_NAME)
}

/// Name of the project directory
pub fn project_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|dir| dir.file_name().map(|name| name.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "pipeline".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_follows_env() {
        let config = Config::new(
            "http://localhost:8080".into(),
            "dev".into(),
            None,
            "pipelines.yaml".into(),
        );
        assert_eq!(config.config_path, Path::new("conf/dev/pipeweave.yaml"));
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let config = Config::new(
            "http://localhost:8080".into(),
            "dev".into(),
            Some("custom.json".into()),
            "pipelines.yaml".into(),
        );
        assert_eq!(config.config_path, Path::new("custom.json"));
    }
}
