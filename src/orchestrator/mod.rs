//! Pipeline coordinator.
//!
//! Sequences one lint run: `started`, clone, resolve, change set, file pulls,
//! the external lint engine, `report`, `finish`. A fatal error at any stage
//! is broadcast via `failed` and returned; observer failures are collected
//! on the outcome.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineConfig, RunOutcome};
