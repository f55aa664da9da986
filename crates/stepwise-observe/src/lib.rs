//! Observability for stepwise: tracing subscriber setup and the telemetry
//! interceptor that turns step transitions into tracking events.

pub mod attrs;
pub mod telemetry;
pub mod tracing_setup;

pub use telemetry::{MemorySink, TelemetryEvent, TelemetryInterceptor, TelemetrySink, TracingSink};
pub use tracing_setup::{init_tracing, shutdown_tracing};
