//! Side-effect hooks fired on step transitions.
//!
//! Interceptors see the step about to become current together with the
//! previous step id and the data that triggered the change. They run before
//! the new state is published. Failures (errors or panics) are logged and
//! isolated: they never abort the transition and never stop other
//! interceptors from running.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use stepwise_types::StepConfig;
use tracing::warn;

use crate::notify::panic_reason;

/// Context handed to interceptors alongside the step.
#[derive(Debug)]
pub struct TransitionContext<'a, D> {
    /// The step that was current before this transition, if any.
    pub previous_step_id: Option<&'a str>,
    /// The data snapshot passed to `sync`.
    pub data: &'a D,
}

impl<D> Clone for TransitionContext<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for TransitionContext<'_, D> {}

/// A transition side effect (logging, telemetry, page titles).
pub trait Interceptor<D>: Send + Sync {
    /// Called when `step` is about to become the current step.
    fn before_step(&self, step: &StepConfig<D>, ctx: TransitionContext<'_, D>) -> anyhow::Result<()>;

    /// Called when the flow is about to complete.
    fn on_complete(&self, ctx: TransitionContext<'_, D>) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }
}

impl<D, F> Interceptor<D> for F
where
    F: Fn(&StepConfig<D>, TransitionContext<'_, D>) -> anyhow::Result<()> + Send + Sync,
{
    fn before_step(&self, step: &StepConfig<D>, ctx: TransitionContext<'_, D>) -> anyhow::Result<()> {
        self(step, ctx)
    }
}

/// Shared, type-erased interceptor.
pub type BoxInterceptor<D> = Arc<dyn Interceptor<D>>;

/// Run `before_step` on every interceptor, isolating failures.
pub(crate) fn run_before_step<D>(
    interceptors: &[BoxInterceptor<D>],
    step: &StepConfig<D>,
    ctx: TransitionContext<'_, D>,
) {
    for interceptor in interceptors {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| interceptor.before_step(step, ctx)));
        report(outcome, Some(step.id.as_str()));
    }
}

/// Run `on_complete` on every interceptor, isolating failures.
pub(crate) fn run_on_complete<D>(interceptors: &[BoxInterceptor<D>], ctx: TransitionContext<'_, D>) {
    for interceptor in interceptors {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| interceptor.on_complete(ctx)));
        report(outcome, None);
    }
}

fn report(outcome: std::thread::Result<anyhow::Result<()>>, step_id: Option<&str>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(step_id, error = %e, "interceptor failed"),
        Err(payload) => {
            let reason = panic_reason(&*payload);
            warn!(step_id, %reason, "interceptor panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Interceptor<Value> for Recorder {
        fn before_step(&self, step: &StepConfig<Value>, ctx: TransitionContext<'_, Value>) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(format!(
                "{} <- {}",
                step.id,
                ctx.previous_step_id.unwrap_or("-")
            ));
            Ok(())
        }

        fn on_complete(&self, ctx: TransitionContext<'_, Value>) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("done <- {}", ctx.previous_step_id.unwrap_or("-")));
            Ok(())
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let failing: BoxInterceptor<Value> =
            Arc::new(|_: &StepConfig<Value>, _: TransitionContext<'_, Value>| -> anyhow::Result<()> {
                anyhow::bail!("boom")
            });
        let panicking: BoxInterceptor<Value> =
            Arc::new(|_: &StepConfig<Value>, _: TransitionContext<'_, Value>| -> anyhow::Result<()> {
                panic!("interceptor panic")
            });
        let recording: BoxInterceptor<Value> = recorder.clone();
        let interceptors = vec![failing, panicking, recording];

        let step = StepConfig::<Value>::new("s2", "t");
        let data = json!({});
        run_before_step(
            &interceptors,
            &step,
            TransitionContext {
                previous_step_id: Some("s1"),
                data: &data,
            },
        );

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["s2 <- s1"]);
    }

    #[test]
    fn test_closure_interceptor_defaults_on_complete_to_noop() {
        let closure =
            |_: &StepConfig<Value>, _: TransitionContext<'_, Value>| -> anyhow::Result<()> { Ok(()) };
        let data = json!({});
        let ctx = TransitionContext {
            previous_step_id: None,
            data: &data,
        };
        assert!(closure.on_complete(ctx).is_ok());
    }

    #[test]
    fn test_on_complete_runs_for_every_interceptor() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let recording: BoxInterceptor<Value> = recorder.clone();
        let interceptors = vec![recording.clone(), recording];
        let data = json!({});
        run_on_complete(
            &interceptors,
            TransitionContext {
                previous_step_id: Some("s2"),
                data: &data,
            },
        );
        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    }
}
