//! Core domain types
//!
//! This module contains the domain structures shared between the generator
//! (which consumes pipeline graphs) and the client (which tracks submitted jobs).

pub mod graph;
pub mod job;
pub mod node;

pub use graph::{GraphError, PipelineDependencyGraph};
pub use node::Node;
