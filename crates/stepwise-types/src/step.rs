//! Step configuration.
//!
//! A `StepConfig` is authored once by the caller and never mutated by the
//! engine. The order of steps in the list handed to the engine defines
//! evaluation order.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// Custom completion predicate for a step.
pub type Matcher<D> = Arc<dyn Fn(&D) -> bool + Send + Sync>;

/// Static configuration for one wizard step.
///
/// `D` is the application data type the step's completion rules read.
pub struct StepConfig<D> {
    /// Unique identifier within the step list (e.g. `"kyc"`).
    pub id: String,
    /// Module type used to look up a loader in the registry (e.g. `"FormPage"`).
    pub step_type: String,
    /// Static props passed through to the rendered module.
    pub props: Map<String, Value>,
    /// Custom completion predicate. Takes precedence over `check_key`.
    pub matcher: Option<Matcher<D>>,
    /// Field whose truthiness marks the step complete. Ignored when a matcher is set.
    pub check_key: Option<String>,
    /// Whether the step must be completed. `None` means required.
    pub required: Option<bool>,
    /// Field that, when truthy on an optional step, marks the step as skipped.
    pub skip_key: Option<String>,
    /// Metadata for side-effect consumers (page titles, tracking events).
    pub meta: Map<String, Value>,
}

impl<D> StepConfig<D> {
    /// Create a step with no completion rule.
    pub fn new(id: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_type: step_type.into(),
            props: Map::new(),
            matcher: None,
            check_key: None,
            required: None,
            skip_key: None,
            meta: Map::new(),
        }
    }

    /// Set a custom completion predicate.
    pub fn matcher(mut self, matcher: impl Fn(&D) -> bool + Send + Sync + 'static) -> Self {
        self.matcher = Some(Arc::new(matcher));
        self
    }

    /// Complete the step when `key` is truthy in the data.
    pub fn check_key(mut self, key: impl Into<String>) -> Self {
        self.check_key = Some(key.into());
        self
    }

    /// Mark the step optional, skippable through `skip_key`.
    pub fn optional(mut self, skip_key: impl Into<String>) -> Self {
        self.required = Some(false);
        self.skip_key = Some(skip_key.into());
        self
    }

    /// Set `required` explicitly.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Set the skip field without changing `required`.
    pub fn skip_key(mut self, key: impl Into<String>) -> Self {
        self.skip_key = Some(key.into());
        self
    }

    /// Add a prop passed through to the rendered module.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry for interceptors.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Whether the step is required. Defaults to `true`.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(true)
    }

    /// Display title: `meta.pageTitle`, then `props.title`.
    pub fn title(&self) -> Option<&str> {
        self.meta
            .get("pageTitle")
            .or_else(|| self.props.get("title"))
            .and_then(Value::as_str)
    }
}

impl<D> Clone for StepConfig<D> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            step_type: self.step_type.clone(),
            props: self.props.clone(),
            matcher: self.matcher.clone(),
            check_key: self.check_key.clone(),
            required: self.required,
            skip_key: self.skip_key.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl<D> fmt::Debug for StepConfig<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepConfig")
            .field("id", &self.id)
            .field("step_type", &self.step_type)
            .field("props", &self.props)
            .field("matcher", &self.matcher.as_ref().map(|_| "<fn>"))
            .field("check_key", &self.check_key)
            .field("required", &self.required)
            .field("skip_key", &self.skip_key)
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_step_has_no_rules() {
        let step: StepConfig<Value> = StepConfig::new("login", "LoginStep");
        assert_eq!(step.id, "login");
        assert_eq!(step.step_type, "LoginStep");
        assert!(step.matcher.is_none());
        assert!(step.check_key.is_none());
        assert!(step.is_required());
    }

    #[test]
    fn test_optional_sets_skip_key() {
        let step: StepConfig<Value> = StepConfig::new("survey", "Survey").optional("surveySkipped");
        assert!(!step.is_required());
        assert_eq!(step.skip_key.as_deref(), Some("surveySkipped"));
    }

    #[test]
    fn test_title_prefers_meta_page_title() {
        let step: StepConfig<Value> = StepConfig::new("risk", "RiskStep")
            .prop("title", "Risk")
            .meta("pageTitle", "Risk disclosure");
        assert_eq!(step.title(), Some("Risk disclosure"));

        let plain: StepConfig<Value> = StepConfig::new("risk", "RiskStep").prop("title", "Risk");
        assert_eq!(plain.title(), Some("Risk"));
    }

    #[test]
    fn test_debug_hides_matcher_body() {
        let step = StepConfig::<Value>::new("a", "A").matcher(|d| d["x"] == json!(1));
        let debug = format!("{step:?}");
        assert!(debug.contains("<fn>"));
        assert!(debug.contains("StepConfig"));
    }
}
