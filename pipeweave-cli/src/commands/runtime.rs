//! Commands run inside generated units

use anyhow::{Context, Result};
use pipeweave_core::dynamic_config::{self, ProviderRegistry};
use std::fs;
use std::path::Path;

use crate::config::Config;

/// Store run parameters in the runtime config, then write the files of the
/// configured config providers under `conf_root`
///
/// Providers are skipped when the plugin configuration file is absent.
pub fn initialize_job(config: &Config, params: &str, output: &Path, conf_root: &Path) -> Result<()> {
    pipeweave_core::runtime::store_parameters(params, output)
        .with_context(|| format!("Failed to store parameters in {}", output.display()))?;

    if !config.config_path.exists() {
        tracing::debug!(path = %config.config_path.display(), "No plugin configuration, skipping config providers");
        return Ok(());
    }

    let plugin_config = config.plugin_config()?;
    let written = dynamic_config::materialize(&plugin_config, &ProviderRegistry::with_builtins(), conf_root)
        .context("Failed to materialize dynamic configuration")?;
    for path in written {
        println!("Generated {}", path.display());
    }
    Ok(())
}

/// Allocate a tracking run id for `run_name` and write it to `output`
///
/// The id is a fresh random uuid. No tracking server is contacted.
pub fn mlflow_start(run_name: &str, output: &Path) -> Result<()> {
    let run_id = uuid::Uuid::new_v4().simple().to_string();

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::write(output, &run_id)
        .with_context(|| format!("Failed to write run id to {}", output.display()))?;

    tracing::info!(run_id = %run_id, run_name, "Allocated tracking run id");
    println!("Run id: {}", run_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(path: &Path) -> Config {
        Config::new(
            "http://localhost:8080".into(),
            "base".into(),
            Some(path.to_path_buf()),
            "pipelines.yaml".into(),
        )
    }

    #[test]
    fn test_initialize_job_stores_params_and_runs_providers() {
        let dir = std::env::temp_dir().join(format!("pipeweave-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("pipeweave.yaml");
        fs::write(
            &config_path,
            "project_id: p\nregion: r\nrun_config:\n  image: img\n  experiment_name: exp\n  \
             dynamic_config_providers:\n    - cls: static\n      params:\n        file: extra.yml\n        \
             values: {answer: 42}\n",
        )
        .unwrap();
        let output = dir.join("config.yaml");
        let conf_root = dir.join("conf");

        initialize_job(&config_at(&config_path), "{\"lr\": 1}", &output, &conf_root).unwrap();

        assert!(fs::read_to_string(&output).unwrap().contains("lr: 1"));
        let extra = fs::read_to_string(conf_root.join("base").join("extra.yml")).unwrap();
        assert_eq!(extra.trim(), "answer: 42");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_initialize_job_without_plugin_config() {
        let dir = std::env::temp_dir().join(format!("pipeweave-{}", uuid::Uuid::new_v4()));
        let output = dir.join("config.yaml");

        initialize_job(&config_at(&dir.join("missing.yaml")), "{\"lr\": 1}", &output, &dir.join("conf"))
            .unwrap();

        assert!(output.exists());
        assert!(!dir.join("conf").exists());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_mlflow_start_writes_run_id() {
        let output = std::env::temp_dir()
            .join(format!("pipeweave-{}", uuid::Uuid::new_v4()))
            .join("run_id");

        mlflow_start("exp-20240101000000", &output).unwrap();

        let run_id = fs::read_to_string(&output).unwrap();
        assert_eq!(run_id.len(), 32);
        fs::remove_dir_all(output.parent().unwrap()).ok();
    }
}
