//! Pipeweave Core
//!
//! Groups the nodes of a pipeline into execution units and compiles the
//! result into a graph an orchestrator can run.
//!
//! This crate contains:
//! - Domain types: nodes, dependency graphs, jobs and schedules
//! - DTOs: payloads sent to the orchestrator
//! - Grouping: strategies partitioning a graph into groups, and their registry
//! - Resources: per-group resource and node-selector resolution
//! - Generator: grouping → compiled graph
//! - Source: pipeline graphs read from a manifest
//! - Runtime: config materialization inside a running unit
//! - Dynamic config: provider-generated config files, written inside units

pub mod config;
pub mod domain;
pub mod dto;
pub mod dynamic_config;
pub mod error;
pub mod generator;
pub mod grouping;
pub mod resources;
pub mod runtime;
pub mod source;

pub use error::{Error, Result};
