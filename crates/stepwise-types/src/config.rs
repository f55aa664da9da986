//! Observability configuration.
//!
//! `ObserveConfig` is the `[observe]` table of a flow file and controls how
//! `stepwise-observe` installs its tracing subscriber.

use serde::{Deserialize, Serialize};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging and trace export settings. All fields have sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveConfig {
    /// Output format of the `fmt` layer.
    #[serde(default)]
    pub log_format: LogFormat,

    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_filter() -> String {
    "warn".to_string()
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            filter: default_filter(),
            otel: false,
        }
    }
}
