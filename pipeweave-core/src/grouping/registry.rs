//! Grouping strategy registry
//!
//! Maps a strategy identifier from configuration to a constructor. Each entry
//! declares which parameters it requires and accepts, and the registry checks
//! the supplied parameters against that declaration before building.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{IdentityNodeGrouper, NodeGrouper, TagNodeGrouper};
use crate::config::ConfigError;

const STRATEGY_KIND: &str = "grouping strategy";

/// Strategy parameters as written in configuration
pub type GroupingParams = BTreeMap<String, Value>;

/// Constructor for a grouping strategy
pub type BuildFn = fn(&GroupingParams) -> Result<Box<dyn NodeGrouper>, ConfigError>;

/// `grouping` section of the run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
    #[serde(default = "default_strategy")]
    pub cls: String,
    #[serde(default)]
    pub params: GroupingParams,
}

fn default_strategy() -> String {
    IdentityNodeGrouper::NAME.to_string()
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            cls: default_strategy(),
            params: GroupingParams::new(),
        }
    }
}

/// Registered strategy constructor and its parameter contract
#[derive(Clone, Copy)]
pub struct GrouperFactory {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
    pub build: BuildFn,
}

/// Registry of grouping strategies keyed by identifier
#[derive(Clone, Default)]
pub struct GrouperRegistry {
    factories: BTreeMap<String, GrouperFactory>,
}

impl GrouperRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `identity` and `tag` strategies
    ///
    /// The class names `IdentityNodeGrouper` and `TagNodeGrouper` are accepted
    /// as aliases.
    pub fn with_builtins() -> Self {
        let identity = GrouperFactory {
            required: &[],
            optional: &[],
            build: build_identity,
        };
        let tag = GrouperFactory {
            required: &[],
            optional: &["tag_prefix"],
            build: build_tag,
        };

        let mut registry = Self::new();
        registry.register(IdentityNodeGrouper::NAME, identity);
        registry.register("IdentityNodeGrouper", identity);
        registry.register(TagNodeGrouper::NAME, tag);
        registry.register("TagNodeGrouper", tag);
        registry
    }

    /// Register (or replace) a strategy
    pub fn register(&mut self, id: impl Into<String>, factory: GrouperFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the strategy named in `config`
    ///
    /// # Errors
    /// Returns an error if the strategy is unknown, a required parameter is
    /// missing, an undeclared parameter is supplied, or the constructor
    /// rejects a parameter value.
    pub fn build(&self, config: &GroupingConfig) -> Result<Box<dyn NodeGrouper>, ConfigError> {
        let factory = self
            .factories
            .get(&config.cls)
            .ok_or_else(|| ConfigError::UnknownStrategy {
                kind: STRATEGY_KIND,
                name: config.cls.clone(),
                known: self.names().map(str::to_string).collect(),
            })?;

        check_params(
            STRATEGY_KIND,
            &config.cls,
            factory.required,
            factory.optional,
            &config.params,
        )?;

        let grouper = (factory.build)(&config.params)?;
        tracing::info!(strategy = grouper.name(), "Initialized node grouping strategy");
        Ok(grouper)
    }
}

/// Check `params` against a declared parameter contract
pub(crate) fn check_params(
    kind: &'static str,
    id: &str,
    required: &[&str],
    optional: &[&str],
    params: &BTreeMap<String, Value>,
) -> Result<(), ConfigError> {
    if let Some(missing) = required.iter().find(|param| !params.contains_key(**param)) {
        return Err(ConfigError::MissingParam {
            kind,
            strategy: id.to_string(),
            param: missing.to_string(),
        });
    }

    if let Some(unexpected) = params
        .keys()
        .find(|key| !required.contains(&key.as_str()) && !optional.contains(&key.as_str()))
    {
        return Err(ConfigError::UnexpectedParam {
            kind,
            strategy: id.to_string(),
            param: unexpected.clone(),
        });
    }

    Ok(())
}

fn build_identity(_params: &GroupingParams) -> Result<Box<dyn NodeGrouper>, ConfigError> {
    Ok(Box::new(IdentityNodeGrouper))
}

fn build_tag(params: &GroupingParams) -> Result<Box<dyn NodeGrouper>, ConfigError> {
    match params.get("tag_prefix") {
        None => Ok(Box::new(TagNodeGrouper::default())),
        Some(Value::String(prefix)) if !prefix.is_empty() => {
            Ok(Box::new(TagNodeGrouper::new(prefix.clone())))
        }
        Some(other) => Err(ConfigError::InvalidParam {
            kind: STRATEGY_KIND,
            strategy: TagNodeGrouper::NAME.to_string(),
            param: "tag_prefix".to_string(),
            reason: format!("expected a non-empty string, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Node, PipelineDependencyGraph};

    fn config(cls: &str, params: &[(&str, Value)]) -> GroupingConfig {
        GroupingConfig {
            cls: cls.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_default_config_builds_identity() {
        let grouper = GrouperRegistry::with_builtins()
            .build(&GroupingConfig::default())
            .unwrap();
        assert_eq!(grouper.name(), "identity");
    }

    #[test]
    fn test_tag_strategy_with_custom_prefix() {
        let grouper = GrouperRegistry::with_builtins()
            .build(&config("TagNodeGrouper", &[("tag_prefix", Value::from("unit:"))]))
            .unwrap();
        assert_eq!(grouper.name(), "tag");

        let graph = PipelineDependencyGraph::try_from_parts(vec![
            (Node::new("a").with_tags(["unit:x"]), Vec::<String>::new()),
            (Node::new("b").with_tags(["unit:x"]), vec![]),
        ])
        .unwrap();
        let grouping = grouper.group(&graph).unwrap();
        assert_eq!(grouping.nodes_mapping()["x"].len(), 2);
    }

    #[test]
    fn test_unknown_strategy() {
        let result = GrouperRegistry::with_builtins().build(&config("fancy", &[]));
        match result {
            Err(ConfigError::UnknownStrategy { name, known, .. }) => {
                assert_eq!(name, "fancy");
                assert!(known.contains(&"tag".to_string()));
            }
            _ => panic!("expected unknown strategy error"),
        }
    }

    #[test]
    fn test_unexpected_param_rejected() {
        let result = GrouperRegistry::with_builtins()
            .build(&config("identity", &[("tag_prefix", Value::from("group."))]));
        assert!(matches!(result, Err(ConfigError::UnexpectedParam { .. })));
    }

    #[test]
    fn test_invalid_param_type_rejected() {
        let result =
            GrouperRegistry::with_builtins().build(&config("tag", &[("tag_prefix", Value::from(3))]));
        assert!(matches!(result, Err(ConfigError::InvalidParam { .. })));
    }

    #[test]
    fn test_required_param_checked() {
        let mut registry = GrouperRegistry::new();
        registry.register(
            "strict",
            GrouperFactory {
                required: &["level"],
                optional: &[],
                build: build_identity,
            },
        );

        let result = registry.build(&config("strict", &[]));
        assert!(matches!(
            result,
            Err(ConfigError::MissingParam { ref param, .. }) if param == "level"
        ));
        assert!(registry.build(&config("strict", &[("level", Value::from(1))])).is_ok());
    }
}
