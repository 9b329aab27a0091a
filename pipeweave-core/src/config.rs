//! Plugin configuration
//!
//! The per-project configuration file (`conf/<env>/pipeweave.yaml` by
//! convention) describing where and how pipelines run: the image, resources
//! per node or tag, node selectors, networking and the grouping strategy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

use crate::dynamic_config::ProviderConfig;
use crate::grouping::GroupingConfig;
use crate::resources::{self, DEFAULT_KEY, NodeSelectorSpec, ResourceSpec};

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unknown {kind} '{name}' (known: {})", .known.join(", "))]
    UnknownStrategy {
        kind: &'static str,
        name: String,
        known: Vec<String>,
    },

    #[error("The {kind} '{strategy}' requires parameter '{param}'")]
    MissingParam {
        kind: &'static str,
        strategy: String,
        param: String,
    },

    #[error("The {kind} '{strategy}' does not accept parameter '{param}'")]
    UnexpectedParam {
        kind: &'static str,
        strategy: String,
        param: String,
    },

    #[error("Invalid parameter '{param}' for {kind} '{strategy}': {reason}")]
    InvalidParam {
        kind: &'static str,
        strategy: String,
        param: String,
        reason: String,
    },
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub project_id: String,
    pub region: String,
    pub run_config: RunConfig,
}

/// Settings applied to every generated pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Image every unit runs in
    pub image: String,

    #[serde(default = "default_pull_policy")]
    pub image_pull_policy: String,

    /// Storage root for pipeline artifacts, without the scheme
    #[serde(default)]
    pub root: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    pub experiment_name: String,

    #[serde(default)]
    pub scheduled_run_name: Option<String>,

    #[serde(default)]
    pub service_account: Option<String>,

    /// Seconds to keep finished runs around
    #[serde(default = "default_ttl")]
    pub ttl: u64,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default = "default_resources")]
    pub resources: BTreeMap<String, ResourceSpec>,

    #[serde(default)]
    pub node_selectors: BTreeMap<String, NodeSelectorSpec>,

    #[serde(default)]
    pub grouping: GroupingConfig,

    #[serde(default)]
    pub mlflow: MlflowConfig,

    /// Config files generated inside units before the framework runs
    #[serde(default)]
    pub dynamic_config_providers: Vec<ProviderConfig>,

    /// Command of the pipeline framework invoked inside each unit
    #[serde(default = "default_framework_command")]
    pub framework_command: String,
}

/// Networking of the pipeline units
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub vpc: Option<String>,
    #[serde(default)]
    pub host_aliases: Vec<HostAlias>,
}

/// Extra `/etc/hosts` entry added to every unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAlias {
    pub ip: String,
    pub hostnames: Vec<String>,
}

/// Run tracking linkage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlflowConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_pull_policy() -> String {
    "IfNotPresent".to_string()
}

fn default_ttl() -> u64 {
    3600 * 24 * 7
}

fn default_resources() -> BTreeMap<String, ResourceSpec> {
    BTreeMap::from([(DEFAULT_KEY.to_string(), ResourceSpec::builtin_default())])
}

fn default_framework_command() -> String {
    "kedro".to_string()
}

impl PluginConfig {
    /// Load configuration from a YAML or JSON file, chosen by extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        let config = match extension.as_str() {
            "json" => serde_json::from_str(&content)?,
            _ => Self::from_yaml_str(&content)?,
        };

        tracing::debug!(path = %path.display(), "Loaded plugin configuration");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid("project_id cannot be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region cannot be empty".into()));
        }
        if self.run_config.image.trim().is_empty() {
            return Err(ConfigError::Invalid("run_config.image cannot be empty".into()));
        }
        if self.run_config.experiment_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "run_config.experiment_name cannot be empty".into(),
            ));
        }
        if self.run_config.ttl == 0 {
            return Err(ConfigError::Invalid("run_config.ttl must be greater than 0".into()));
        }
        Ok(())
    }

    /// Starter configuration written by `pipeweave init`
    pub fn sample_config(
        project_id: &str,
        region: &str,
        image: &str,
        project: &str,
        run_name: &str,
    ) -> String {
        SAMPLE_CONFIG_TEMPLATE
            .replace("{project_id}", project_id)
            .replace("{region}", region)
            .replace("{image}", image)
            .replace("{project}", project)
            .replace("{run_name}", run_name)
    }
}

impl RunConfig {
    /// Resources for a unit named `name` whose nodes carry `tags`
    pub fn resources_for(&self, name: &str, tags: &BTreeSet<String>) -> ResourceSpec {
        let builtin = ResourceSpec::builtin_default();
        let default = self.resources.get(DEFAULT_KEY).unwrap_or(&builtin);
        resources::resolve(name, tags, &self.resources, Some(default))
    }

    /// Node-selector constraints for a unit named `name` whose nodes carry `tags`
    pub fn node_selectors_for(&self, name: &str, tags: &BTreeSet<String>) -> BTreeMap<String, String> {
        resources::resolve(name, tags, &self.node_selectors, None).constraints()
    }

    /// Pipeline root as a storage URI
    pub fn pipeline_root(&self) -> String {
        format!("gs://{}", self.root.as_deref().unwrap_or_default())
    }
}

const SAMPLE_CONFIG_TEMPLATE: &str = r#"# Configuration used to run the pipeline
project_id: {project_id}
region: {region}
run_config:
  # Name of the image to run as the pipeline steps
  image: {image}

  # Pull policy to be used for the steps. Use Always if you push the images
  # on the same tag, or Never if you use only local images
  image_pull_policy: IfNotPresent

  # Location of the pipeline storage root
  root: bucket_name/gcs_suffix

  # Name of the experiment to be created
  experiment_name: {project}

  # Name of the scheduled run, templated with the schedule parameters
  scheduled_run_name: {run_name}

  # Optional pipeline description
  #description: "Very Important Pipeline"

  # How long to keep finished runs [in seconds]. Default: 1 week
  ttl: 604800

  # How nodes are merged into execution units. Use `tag` to merge nodes
  # tagged with `group.<name>` into a unit called <name>
  grouping:
    cls: identity
    #cls: tag
    #params:
    #  tag_prefix: "group."

  # Optional section allowing adjustment of the resources
  # reservations and limits for the nodes, groups or tags
  resources:

    # For nodes that require more RAM you can increase the "memory"
    data_import_step:
      memory: 2Gi

    # Training nodes can utilize more than one CPU if the algorithm
    # supports it
    model_training:
      cpu: 8
      memory: 1Gi

    # GPU-capable nodes can request 1 GPU slot
    tensorflow_step:
      gpu: 1

    # Default settings for the nodes
    __default__:
      cpu: 200m
      memory: 64Mi

  # Config files generated inside every unit before the pipeline runs,
  # written to conf/<env>/<file> and merged over the existing content
  #dynamic_config_providers:
  #  - cls: env
  #    params:
  #      variables: [MLFLOW_TRACKING_TOKEN]
  #      section: mlflow_credentials

  # Optional node selectors, resolved like resources but with no default
  #node_selectors:
  #  tensorflow_step:
  #    cloud.google.com/gke-accelerator: NVIDIA_TESLA_T4
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG_FULL: &str = r#"
project_id: test-project-id
region: some-region
run_config:
  image: "gcr.io/project-image/test"
  image_pull_policy: "Always"
  experiment_name: "Test Experiment"
  scheduled_run_name: "scheduled run"
  description: "My awesome pipeline"
  ttl: 300
"#;

    const CONFIG_MINIMAL: &str = r#"
project_id: some-project
region: some-region
run_config:
    image: test
    experiment_name: test
"#;

    fn no_tags() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn test_full_config() {
        let cfg = PluginConfig::from_yaml_str(CONFIG_FULL).unwrap();
        assert_eq!(cfg.run_config.image, "gcr.io/project-image/test");
        assert_eq!(cfg.run_config.image_pull_policy, "Always");
        assert_eq!(cfg.run_config.experiment_name, "Test Experiment");
        assert_eq!(cfg.run_config.scheduled_run_name.as_deref(), Some("scheduled run"));
        assert_eq!(cfg.run_config.ttl, 300);
        assert_eq!(
            cfg.run_config.resources_for("node1", &no_tags()),
            ResourceSpec::new(Some("500m"), None, Some("1024Mi"))
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let cfg = PluginConfig::from_yaml_str(CONFIG_MINIMAL).unwrap();
        assert_eq!(cfg.run_config.image_pull_policy, "IfNotPresent");
        assert_eq!(cfg.run_config.description, None);
        assert_eq!(cfg.run_config.ttl, 3600 * 24 * 7);
        assert_eq!(cfg.run_config.grouping.cls, "identity");
        assert!(!cfg.run_config.mlflow.enabled);
        assert_eq!(cfg.run_config.framework_command, "kedro");
        assert!(cfg.run_config.network.vpc.is_none());
        assert!(cfg.run_config.network.host_aliases.is_empty());
        assert!(cfg.run_config.dynamic_config_providers.is_empty());
    }

    #[test]
    fn test_missing_required_config() {
        assert!(PluginConfig::from_yaml_str("{}").is_err());
    }

    #[test]
    fn test_resources_no_default() {
        let cfg = PluginConfig::from_yaml_str(&format!(
            "{CONFIG_MINIMAL}    resources:\n      __default__:\n        cpu: null\n        memory: null\n"
        ))
        .unwrap();

        assert!(cfg.run_config.resources_for("node2", &no_tags()).is_empty());
    }

    #[test]
    fn test_resources_default_and_node_specific() {
        let cfg = PluginConfig::from_yaml_str(&format!(
            "{CONFIG_MINIMAL}    resources:\n      __default__:\n        cpu: 200m\n        memory: 64Mi\n      node2:\n        cpu: 100m\n"
        ))
        .unwrap();

        assert_eq!(
            cfg.run_config.resources_for("node2", &no_tags()),
            ResourceSpec::new(Some("100m"), None, Some("64Mi"))
        );
        assert_eq!(
            cfg.run_config.resources_for("node3", &no_tags()),
            ResourceSpec::new(Some("200m"), None, Some("64Mi"))
        );
    }

    #[test]
    fn test_resources_without_default_entry_use_builtin() {
        let cfg = PluginConfig::from_yaml_str(&format!(
            "{CONFIG_MINIMAL}    resources:\n      node2:\n        gpu: 1\n"
        ))
        .unwrap();

        assert_eq!(
            cfg.run_config.resources_for("node2", &no_tags()),
            ResourceSpec::new(Some("500m"), Some("1"), Some("1024Mi"))
        );
    }

    #[test]
    fn test_parse_network_config() {
        let cfg = PluginConfig::from_yaml_str(&format!(
            "{CONFIG_MINIMAL}    network:\n      vpc: projects/p/global/networks/v\n      host_aliases:\n        - ip: 10.10.10.10\n          hostnames: [mlflow.internal]\n"
        ))
        .unwrap();

        assert_eq!(
            cfg.run_config.network.vpc.as_deref(),
            Some("projects/p/global/networks/v")
        );
        assert_eq!(cfg.run_config.network.host_aliases[0].ip, "10.10.10.10");
        assert_eq!(
            cfg.run_config.network.host_aliases[0].hostnames,
            vec!["mlflow.internal"]
        );
    }

    #[test]
    fn test_node_selectors_by_tag() {
        let cfg = PluginConfig::from_yaml_str(&format!(
            "{CONFIG_MINIMAL}    node_selectors:\n      gpu:\n        cloud.google.com/gke-accelerator: NVIDIA_TESLA_K80\n"
        ))
        .unwrap();

        let tags = BTreeSet::from(["gpu".to_string()]);
        let selectors = cfg.run_config.node_selectors_for("train", &tags);
        assert_eq!(selectors["cloud.google.com/gke-accelerator"], "NVIDIA_TESLA_K80");
        assert!(cfg.run_config.node_selectors_for("train", &no_tags()).is_empty());
    }

    #[test]
    fn test_validation() {
        let mut cfg = PluginConfig::from_yaml_str(CONFIG_MINIMAL).unwrap();
        assert!(cfg.validate().is_ok());

        cfg.run_config.image = String::new();
        assert!(cfg.validate().is_err());

        cfg.run_config.image = "image".to_string();
        cfg.run_config.ttl = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_sample_config_round_trips() {
        let sample = PluginConfig::sample_config("proj", "europe-west1", "img:latest", "demo", "demo-run");
        let cfg = PluginConfig::from_yaml_str(&sample).unwrap();

        assert_eq!(cfg.project_id, "proj");
        assert_eq!(cfg.run_config.image, "img:latest");
        assert_eq!(
            cfg.run_config.resources_for("model_training", &no_tags()),
            ResourceSpec::new(Some("8"), None, Some("1Gi"))
        );
        assert_eq!(
            cfg.run_config.resources_for("tensorflow_step", &no_tags()).gpu.as_deref(),
            Some("1")
        );
    }
}
