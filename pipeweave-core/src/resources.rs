//! Resource and node-selector resolution
//!
//! Per-group compute requests and scheduling constraints are configured as a
//! map keyed by node name, group name or tag. Resolution layers every matching
//! entry on top of an optional default: tag entries first, in sorted order,
//! then the entry named after the target itself, so name entries win on
//! conflicting keys. `None` values in an entry never clear an earlier value.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Configuration key holding the default entry
pub const DEFAULT_KEY: &str = "__default__";

/// Compute resources requested by one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default, deserialize_with = "string_or_number")]
    pub cpu: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub gpu: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub memory: Option<String>,
}

impl ResourceSpec {
    pub fn new(cpu: Option<&str>, gpu: Option<&str>, memory: Option<&str>) -> Self {
        Self {
            cpu: cpu.map(str::to_string),
            gpu: gpu.map(str::to_string),
            memory: memory.map(str::to_string),
        }
    }

    /// Built-in default applied when configuration has no `__default__`
    pub fn builtin_default() -> Self {
        Self::new(Some("500m"), None, Some("1024Mi"))
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.gpu.is_none() && self.memory.is_none()
    }
}

/// Node-selector constraints for one unit, e.g. accelerator type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeSelectorSpec(pub BTreeMap<String, Option<String>>);

impl NodeSelectorSpec {
    /// Constraints with a value, dropping keys explicitly set to null
    pub fn constraints(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NodeSelectorSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        )
    }
}

/// A spec that can be layered over another
pub trait Overlay: Clone + Default {
    /// Copy every set field of `other` onto `self`
    fn overlay(&mut self, other: &Self);
}

impl Overlay for ResourceSpec {
    fn overlay(&mut self, other: &Self) {
        if other.cpu.is_some() {
            self.cpu.clone_from(&other.cpu);
        }
        if other.gpu.is_some() {
            self.gpu.clone_from(&other.gpu);
        }
        if other.memory.is_some() {
            self.memory.clone_from(&other.memory);
        }
    }
}

impl Overlay for NodeSelectorSpec {
    fn overlay(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            if value.is_some() {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Resolve the spec for `target_name` carrying `tags`
///
/// Starts from `default` (or an empty spec) and overlays the entries of
/// `specs` named by each tag and finally by `target_name`.
pub fn resolve<S: Overlay>(
    target_name: &str,
    tags: &BTreeSet<String>,
    specs: &BTreeMap<String, S>,
    default: Option<&S>,
) -> S {
    let mut result = default.cloned().unwrap_or_default();

    let candidates = tags
        .iter()
        .map(String::as_str)
        .filter(|tag| *tag != target_name)
        .chain(std::iter::once(target_name));

    for candidate in candidates {
        if let Some(spec) = specs.get(candidate) {
            result.overlay(spec);
        }
    }

    result
}

/// Accept `"500m"`, `8` or `0.5` for a quantity
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(
        Option::<Quantity>::deserialize(deserializer)?.map(|q| match q {
            Quantity::Text(s) => s,
            Quantity::Int(i) => i.to_string(),
            Quantity::Float(f) => f.to_string(),
        }),
    )
}
