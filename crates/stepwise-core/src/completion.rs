//! Completion strategy: decides whether a step can be passed over.
//!
//! Rules short-circuit in priority order:
//! 1. skip override (`required == Some(false)` and `skip_key` truthy)
//! 2. custom matcher
//! 3. `check_key` truthiness
//! 4. default: not complete
//!
//! A step with no completion rule is never auto-completed.

use stepwise_types::{FlowData, StepConfig};

/// Whether `step` is complete for `data`.
///
/// Panics raised by a matcher are not caught; they propagate to the caller.
pub fn is_step_complete<D: FlowData>(step: &StepConfig<D>, data: &D) -> bool {
    if step.required == Some(false)
        && step
            .skip_key
            .as_deref()
            .is_some_and(|key| data.field_truthy(key))
    {
        return true;
    }

    if let Some(matcher) = &step.matcher {
        return matcher(data);
    }

    if let Some(check_key) = &step.check_key {
        return data.field_truthy(check_key);
    }

    false
}

/// The first step, in declared order, that is not complete.
///
/// The flow is strictly sequential: a later step that is already complete
/// does not let the flow skip past an earlier incomplete one.
pub fn find_next_step<'a, D: FlowData>(
    steps: &'a [StepConfig<D>],
    data: &D,
) -> Option<&'a StepConfig<D>> {
    steps.iter().find(|step| !is_step_complete(step, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    type Step = StepConfig<Value>;

    fn mock_data() -> Value {
        json!({
            "hasName": true,
            "hasId": false,
            "score": 100,
            "obj": { "nested": true },
            "skipped": true,
            "done": false,
        })
    }

    #[test]
    fn test_matcher_decides_completion() {
        let done = Step::new("1", "any").matcher(|d| d["score"].as_i64().unwrap_or(0) > 50);
        assert!(is_step_complete(&done, &mock_data()));

        let todo = Step::new("2", "any").matcher(|d| d["score"].as_i64().unwrap_or(0) > 200);
        assert!(!is_step_complete(&todo, &mock_data()));
    }

    #[test]
    fn test_check_key_uses_truthiness() {
        let done = Step::new("3", "any").check_key("hasName");
        assert!(is_step_complete(&done, &mock_data()));

        let todo = Step::new("4", "any").check_key("hasId");
        assert!(!is_step_complete(&todo, &mock_data()));

        let nested = Step::new("4b", "any").check_key("obj");
        assert!(is_step_complete(&nested, &mock_data()));
    }

    #[test]
    fn test_matcher_overrides_check_key() {
        let step = Step::new("5", "any")
            .check_key("hasName")
            .matcher(|_| false);
        assert!(!is_step_complete(&step, &mock_data()));
    }

    #[test]
    fn test_no_rule_is_never_complete() {
        let step = Step::new("6", "any");
        assert!(!is_step_complete(&step, &mock_data()));
    }

    #[test]
    fn test_skip_key_overrides_matcher_and_check_key_on_optional_step() {
        let step = Step::new("7", "any")
            .optional("skipped")
            .check_key("done")
            .matcher(|_| false);
        assert!(is_step_complete(&step, &mock_data()));
    }

    #[test]
    fn test_skip_key_is_inert_when_required_defaults_to_true() {
        let step = Step::new("8", "any")
            .skip_key("skipped")
            .check_key("done");
        assert!(!is_step_complete(&step, &mock_data()));

        let explicit = Step::new("8b", "any")
            .required(true)
            .skip_key("skipped")
            .check_key("done");
        assert!(!is_step_complete(&explicit, &mock_data()));
    }

    #[test]
    fn test_falsy_skip_key_falls_through_to_check_key() {
        let mut data = mock_data();
        data["skipped"] = json!(false);
        data["done"] = json!(true);

        let step = Step::new("9", "any")
            .optional("skipped")
            .check_key("done");
        assert!(is_step_complete(&step, &data));
    }

    #[test]
    #[should_panic(expected = "matcher exploded")]
    fn test_matcher_panic_propagates() {
        let step = Step::new("10", "any").matcher(|_| panic!("matcher exploded"));
        is_step_complete(&step, &mock_data());
    }

    #[test]
    fn test_find_next_step_halts_at_first_incomplete() {
        let steps: Vec<Step> = vec![
            Step::new("s1", "t").check_key("a"),
            Step::new("s2", "t").check_key("b"),
            Step::new("s3", "t").check_key("c"),
        ];

        let data = json!({ "a": false, "b": false, "c": true });
        assert_eq!(find_next_step(&steps, &data).map(|s| s.id.as_str()), Some("s1"));

        let data = json!({ "a": true, "b": false, "c": true });
        assert_eq!(find_next_step(&steps, &data).map(|s| s.id.as_str()), Some("s2"));

        let data = json!({ "a": true, "b": true, "c": true });
        assert!(find_next_step(&steps, &data).is_none());
    }
}
