//! CLI command definitions for the `stepwise` binary.
//!
//! Uses clap derive macros for argument parsing. Every command takes a flow
//! file (TOML or JSON, chosen by extension) and application data as JSON.

pub mod replay;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use serde_json::Value;
use stepwise_types::config::ObserveConfig;
use stepwise_types::definition::FlowDefinition;

/// Inspect and replay multi-step wizard flows.
#[derive(Parser)]
#[command(name = "stepwise", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current step and progress for a data snapshot.
    Status {
        /// Flow file (.toml or .json).
        flow: PathBuf,

        /// Application data as a JSON object.
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Run the engine over a sequence of data snapshots.
    Replay {
        /// Flow file (.toml or .json).
        flow: PathBuf,

        /// JSON array of data snapshots, synced in order.
        #[arg(long)]
        data: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Cli {
    /// Logging adjustments requested on the command line.
    pub fn log_overrides(&self) -> LogOverrides {
        let filter = match self.verbose {
            0 if self.quiet => Some("error"),
            0 => None,
            1 => Some("info,stepwise=debug"),
            _ => Some("trace"),
        };
        LogOverrides {
            filter,
            otel: self.otel,
        }
    }
}

/// Command-line flags layered over a flow file's `[observe]` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOverrides {
    pub filter: Option<&'static str>,
    pub otel: bool,
}

impl LogOverrides {
    pub fn apply(&self, base: &ObserveConfig) -> ObserveConfig {
        let mut config = base.clone();
        if let Some(filter) = self.filter {
            config.filter = filter.to_string();
        }
        config.otel |= self.otel;
        config
    }
}

/// Read and parse a flow file.
pub fn load_flow(path: &Path) -> anyhow::Result<FlowDefinition> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read flow file {}", path.display()))?;
    FlowDefinition::parse_for_path(path, &contents)
        .with_context(|| format!("failed to parse flow file {}", path.display()))
}

/// Parse the `--data` argument.
pub fn parse_data(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).context("--data is not valid JSON")
}
