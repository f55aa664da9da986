//! Declarative flow definitions.
//!
//! A flow file lists steps in evaluation order using key-based completion
//! rules only (closures cannot be serialized). Both TOML and JSON are
//! accepted:
//!
//! ```toml
//! [[steps]]
//! id = "login"
//! type = "LoginStep"
//! check_key = "loggedIn"
//! props = { title = "Log in" }
//!
//! [[steps]]
//! id = "survey"
//! type = "OptionalSurveyStep"
//! check_key = "surveyDone"
//! required = false
//! skip_key = "surveySkipped"
//! meta = { trackEvent = "survey_expose" }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ObserveConfig;
use crate::error::DefinitionError;
use crate::step::StepConfig;

/// A serializable flow: ordered steps plus optional observability settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub steps: Vec<StepDefinition>,

    #[serde(default)]
    pub observe: ObserveConfig,
}

/// Serializable form of a `StepConfig` without a matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub props: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_key: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl FlowDefinition {
    /// Parse a TOML flow definition.
    pub fn from_toml(s: &str) -> Result<Self, DefinitionError> {
        Ok(toml::from_str(s)?)
    }

    /// Parse a JSON flow definition.
    pub fn from_json(s: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Parse `contents` according to the extension of `path`.
    pub fn parse_for_path(path: &Path, contents: &str) -> Result<Self, DefinitionError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(contents),
            Some("json") => Self::from_json(contents),
            other => Err(DefinitionError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Build engine step configs, preserving declaration order.
    pub fn into_steps<D>(self) -> Vec<StepConfig<D>> {
        self.steps.into_iter().map(StepDefinition::into_step).collect()
    }
}

impl StepDefinition {
    /// Convert into an engine `StepConfig` with no matcher.
    pub fn into_step<D>(self) -> StepConfig<D> {
        StepConfig {
            id: self.id,
            step_type: self.step_type,
            props: self.props,
            matcher: None,
            check_key: self.check_key,
            required: self.required,
            skip_key: self.skip_key,
            meta: self.meta,
        }
    }
}
