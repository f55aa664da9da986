//! Stateless progress reporting over a step list.

use stepwise_types::{FlowData, ProgressInfo, StepConfig};

use crate::completion::is_step_complete;

/// Completion statistics for `steps` against `data`.
///
/// Optional steps count toward `completed` and `total` but not toward
/// `required`. Matcher panics propagate.
pub fn progress<D: FlowData>(steps: &[StepConfig<D>], data: &D) -> ProgressInfo {
    let mut completed = 0;
    let mut required = 0;
    let mut completed_required = 0;

    for step in steps {
        let done = is_step_complete(step, data);
        if done {
            completed += 1;
        }
        if step.is_required() {
            required += 1;
            if done {
                completed_required += 1;
            }
        }
    }

    let total = steps.len();
    let percent = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u8
    };

    ProgressInfo {
        total,
        completed,
        required,
        completed_required,
        percent,
    }
}
