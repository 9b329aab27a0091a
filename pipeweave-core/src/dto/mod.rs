//! Data Transfer Objects for orchestrator communication
//!
//! Payloads sent to the orchestration service. Each carries a fully compiled
//! graph; the orchestrator never sees the source pipeline or the grouping.

pub mod job;
pub mod schedule;
