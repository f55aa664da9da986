//! Telemetry interceptor: logs step transitions and forwards tracking events.
//!
//! A step opts into tracking through its metadata:
//!
//! ```toml
//! [[steps]]
//! id = "risk"
//! type = "RiskStep"
//! meta = { trackEvent = "view_risk_disclosure" }
//! ```
//!
//! When that step becomes current, [`TelemetryInterceptor`] records a
//! [`TelemetryEvent`] named `view_risk_disclosure` to its sink. Completing the
//! flow records `flow_completed`.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use stepwise_core::{Interceptor, TransitionContext};
use stepwise_types::StepConfig;
use tracing::info;

use crate::attrs::{EVENT_FLOW_COMPLETED, META_TRACK_EVENT, META_TRACK_EVENT_SNAKE, TELEMETRY_TARGET};

/// A tracking event derived from a flow transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryEvent {
    pub name: String,
    /// The step that became current. `None` for completion events.
    pub step_id: Option<String>,
    pub previous_step_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl TelemetryEvent {
    fn now(name: &str, step_id: Option<&str>, previous_step_id: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            step_id: step_id.map(str::to_string),
            previous_step_id: previous_step_id.map(str::to_string),
            at: Utc::now(),
        }
    }
}

/// Destination for tracking events (analytics client, log, test buffer).
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent) -> anyhow::Result<()>;
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    fn record(&self, event: TelemetryEvent) -> anyhow::Result<()> {
        (**self).record(event)
    }
}

/// Writes events to the `stepwise::telemetry` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: TelemetryEvent) -> anyhow::Result<()> {
        info!(
            target: TELEMETRY_TARGET,
            event = %event.name,
            step_id = event.step_id.as_deref(),
            previous_step_id = event.previous_step_id.as_deref(),
            at = %event.at.to_rfc3339(),
            "tracking event"
        );
        Ok(())
    }
}

/// Buffers events in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Names of the recorded events, oldest first.
    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, event: TelemetryEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Logs every transition and forwards `meta.trackEvent` to a sink.
///
/// Install it with `FlowEngine::add_interceptor` or
/// `FlowEngine::with_interceptors`. Sink errors are returned to the engine,
/// which logs them without interrupting the transition.
#[derive(Debug, Clone, Default)]
pub struct TelemetryInterceptor<S> {
    sink: S,
}

impl<S: TelemetrySink> TelemetryInterceptor<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl TelemetryInterceptor<TracingSink> {
    /// Interceptor that reports events through `tracing` only.
    pub fn tracing() -> Self {
        Self::new(TracingSink)
    }
}

/// The tracking event name configured on `step`, if any.
pub fn track_event<D>(step: &StepConfig<D>) -> Option<&str> {
    step.meta
        .get(META_TRACK_EVENT)
        .or_else(|| step.meta.get(META_TRACK_EVENT_SNAKE))
        .and_then(|value| value.as_str())
}

impl<D, S: TelemetrySink> Interceptor<D> for TelemetryInterceptor<S> {
    fn before_step(&self, step: &StepConfig<D>, ctx: TransitionContext<'_, D>) -> anyhow::Result<()> {
        info!(
            step_id = %step.id,
            step_type = %step.step_type,
            previous_step_id = ctx.previous_step_id,
            "step transition"
        );

        if let Some(name) = track_event(step) {
            self.sink
                .record(TelemetryEvent::now(name, Some(&step.id), ctx.previous_step_id))?;
        }
        Ok(())
    }

    fn on_complete(&self, ctx: TransitionContext<'_, D>) -> anyhow::Result<()> {
        info!(previous_step_id = ctx.previous_step_id, "flow completed");
        self.sink
            .record(TelemetryEvent::now(EVENT_FLOW_COMPLETED, None, ctx.previous_step_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use stepwise_core::FlowEngine;

    struct FailingSink;

    impl TelemetrySink for FailingSink {
        fn record(&self, _event: TelemetryEvent) -> anyhow::Result<()> {
            anyhow::bail!("analytics endpoint unreachable")
        }
    }

    fn steps() -> Vec<StepConfig<Value>> {
        vec![
            StepConfig::new("login", "LoginStep").check_key("loggedIn"),
            StepConfig::new("risk", "RiskStep")
                .check_key("riskAgreed")
                .meta("trackEvent", "view_risk_disclosure"),
            StepConfig::new("kyc", "KycStep")
                .check_key("kycDone")
                .meta("track_event", "view_kyc"),
        ]
    }

    #[test]
    fn test_track_event_reads_either_spelling() {
        let steps = steps();
        assert_eq!(track_event(&steps[0]), None);
        assert_eq!(track_event(&steps[1]), Some("view_risk_disclosure"));
        assert_eq!(track_event(&steps[2]), Some("view_kyc"));

        let numeric = StepConfig::<Value>::new("x", "X").meta("trackEvent", 42);
        assert_eq!(track_event(&numeric), None);
    }

    #[test]
    fn test_tracked_step_records_event() {
        let sink = MemorySink::new();
        let interceptor = TelemetryInterceptor::new(sink.clone());
        let data = json!({});
        let ctx = TransitionContext {
            previous_step_id: Some("login"),
            data: &data,
        };

        interceptor.before_step(&steps()[0], ctx).unwrap();
        assert!(sink.events().is_empty());

        interceptor.before_step(&steps()[1], ctx).unwrap();
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "view_risk_disclosure");
        assert_eq!(events[0].step_id.as_deref(), Some("risk"));
        assert_eq!(events[0].previous_step_id.as_deref(), Some("login"));
    }

    #[test]
    fn test_completion_records_flow_completed() {
        let sink = MemorySink::new();
        let interceptor = TelemetryInterceptor::new(sink.clone());
        let data = json!({});
        Interceptor::<Value>::on_complete(
            &interceptor,
            TransitionContext {
                previous_step_id: Some("kyc"),
                data: &data,
            },
        )
        .unwrap();

        let events = sink.events();
        assert_eq!(events[0].name, EVENT_FLOW_COMPLETED);
        assert!(events[0].step_id.is_none());

        sink.clear();
        assert!(sink.names().is_empty());
    }

    #[test]
    fn test_sink_errors_surface_to_caller() {
        let interceptor = TelemetryInterceptor::new(FailingSink);
        let data = json!({});
        let ctx = TransitionContext {
            previous_step_id: None,
            data: &data,
        };
        let err = interceptor.before_step(&steps()[1], ctx).unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn test_event_serializes_with_timestamp() {
        let event = TelemetryEvent::now("view_kyc", Some("kyc"), None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "view_kyc");
        assert!(json["at"].is_string());
    }

    #[tokio::test]
    async fn test_engine_drives_interceptor_through_flow() {
        let sink = MemorySink::new();
        let engine: FlowEngine<Value, String> = FlowEngine::new(steps());
        engine.add_interceptor(TelemetryInterceptor::new(sink.clone()));
        engine.add_interceptor(TelemetryInterceptor::new(FailingSink));
        for ty in ["LoginStep", "RiskStep", "KycStep"] {
            engine.register_loader(ty, move || async move { Ok(ty.to_string()) });
        }

        engine.sync(&json!({}));
        engine.sync(&json!({ "loggedIn": true }));
        engine.sync(&json!({ "loggedIn": true, "riskAgreed": true }));
        engine.sync(&json!({ "loggedIn": true, "riskAgreed": true, "kycDone": true }));

        assert!(engine.state().is_completed);
        assert_eq!(
            sink.names(),
            vec!["view_risk_disclosure", "view_kyc", EVENT_FLOW_COMPLETED]
        );
    }
}
