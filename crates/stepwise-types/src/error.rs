use thiserror::Error;

/// Recoverable errors surfaced through `EngineState::error`.
///
/// These never escape `sync` as a `Result`; the engine publishes them in the
/// next snapshot and halts at the current step until the caller re-triggers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no loader registered for type: \"{step_type}\"")]
    NoLoader { step_type: String },

    /// The message is the loader's own error message, unchanged.
    #[error("{message}")]
    LoadFailed { step_type: String, message: String },

    #[error("no async runtime available to load type: \"{step_type}\"")]
    RuntimeUnavailable { step_type: String },
}

impl EngineError {
    /// The step type whose module could not be produced.
    pub fn step_type(&self) -> &str {
        match self {
            EngineError::NoLoader { step_type }
            | EngineError::LoadFailed { step_type, .. }
            | EngineError::RuntimeUnavailable { step_type } => step_type,
        }
    }

    /// Human-readable message, identical to `Display`.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Errors from loading a declarative flow definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("invalid TOML flow definition: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON flow definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported flow file extension: '{0}'")]
    UnsupportedFormat(String),
}
