//! Shared types for the stepwise flow engine.
//!
//! This crate holds the data model used across the workspace: step
//! configuration, engine state snapshots, progress reports, the `FlowData`
//! field-access trait, declarative flow definitions, and error types.
//!
//! Dependencies are limited to serde, serde_json, toml and thiserror.

pub mod config;
pub mod data;
pub mod definition;
pub mod error;
pub mod state;
pub mod step;

pub use data::{FlowData, truthy};
pub use error::{DefinitionError, EngineError};
pub use state::{EngineState, FlowPhase, ProgressInfo};
pub use step::{Matcher, StepConfig};
