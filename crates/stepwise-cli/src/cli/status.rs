//! `stepwise status`: where a data snapshot sits in the flow.

use anyhow::Result;
use console::style;
use serde::Serialize;
use serde_json::Value;

use stepwise_core::{find_next_step, progress};
use stepwise_types::definition::FlowDefinition;
use stepwise_types::{ProgressInfo, StepConfig};

use super::parse_data;

/// The step a snapshot resolves to, with its progress.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub current_step: Option<StepSummary>,
    pub completed: bool,
    pub progress: ProgressInfo,
}

#[derive(Debug, Serialize)]
pub struct StepSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub title: Option<String>,
    pub required: bool,
}

pub fn summarize(steps: &[StepConfig<Value>], data: &Value) -> StatusReport {
    let current_step = find_next_step(steps, data).map(|step| StepSummary {
        id: step.id.clone(),
        step_type: step.step_type.clone(),
        title: step.title().map(str::to_string),
        required: step.is_required(),
    });
    StatusReport {
        completed: current_step.is_none(),
        current_step,
        progress: progress(steps, data),
    }
}

/// Print the current step, its title and overall progress.
pub fn status(definition: FlowDefinition, raw_data: &str, json: bool) -> Result<()> {
    let data = parse_data(raw_data)?;
    let steps = definition.into_steps::<Value>();
    let report = summarize(&steps, &data);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    match &report.current_step {
        Some(step) => {
            println!(
                "  {} Current step: {} ({})",
                style("▶").bold(),
                style(&step.id).cyan().bold(),
                style(&step.step_type).dim()
            );
            if let Some(title) = &step.title {
                println!("  Title:    {title}");
            }
            if !step.required {
                println!("  {}", style("optional").yellow());
            }
        }
        None => {
            println!("  {} Flow completed", style("✓").green().bold());
        }
    }
    println!();

    let p = report.progress;
    println!("  {}", style("── Progress ──").dim());
    println!(
        "  Steps:    {}/{} ({}%)",
        style(p.completed).bold(),
        p.total,
        p.percent
    );
    println!("  Required: {}/{}", p.completed_required, p.required);
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> FlowDefinition {
        FlowDefinition::from_json(
            r#"{
                "steps": [
                    { "id": "login", "type": "LoginStep", "check_key": "loggedIn",
                      "props": { "title": "Log in" } },
                    { "id": "survey", "type": "SurveyStep", "check_key": "surveyDone",
                      "required": false, "skip_key": "surveySkipped",
                      "meta": { "pageTitle": "Quick survey" } },
                    { "id": "kyc", "type": "KycStep", "check_key": "kycDone" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_summarize_reports_current_step_and_title() {
        let steps = definition().into_steps::<Value>();
        let report = summarize(&steps, &json!({ "loggedIn": true }));

        let step = report.current_step.unwrap();
        assert_eq!(step.id, "survey");
        assert_eq!(step.title.as_deref(), Some("Quick survey"));
        assert!(!step.required);
        assert!(!report.completed);
        assert_eq!(report.progress.completed, 1);
    }

    #[test]
    fn test_summarize_skipped_optional_step() {
        let steps = definition().into_steps::<Value>();
        let report = summarize(&steps, &json!({ "loggedIn": true, "surveySkipped": true }));
        assert_eq!(report.current_step.unwrap().id, "kyc");
        assert_eq!(report.progress.percent, 67);
    }

    #[test]
    fn test_summarize_completed_flow_serializes() {
        let steps = definition().into_steps::<Value>();
        let report = summarize(
            &steps,
            &json!({ "loggedIn": true, "surveyDone": true, "kycDone": true }),
        );
        assert!(report.completed);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["current_step"], Value::Null);
        assert_eq!(value["progress"]["percent"], 100);
    }

    #[test]
    fn test_status_rejects_bad_data() {
        assert!(status(definition(), "[", true).is_err());
    }
}
