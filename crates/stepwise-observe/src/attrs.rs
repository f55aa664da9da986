//! Well-known names shared by the telemetry interceptor and its sinks.

// --- Step metadata keys ---

/// `meta` key naming the tracking event fired when a step becomes current.
pub const META_TRACK_EVENT: &str = "trackEvent";

/// Snake-case spelling of [`META_TRACK_EVENT`], accepted from TOML flow files.
pub const META_TRACK_EVENT_SNAKE: &str = "track_event";

// --- Event names ---

/// Emitted once when every step of the flow is complete.
pub const EVENT_FLOW_COMPLETED: &str = "flow_completed";

// --- Tracing ---

/// Target used for telemetry log lines, filterable via `RUST_LOG`.
pub const TELEMETRY_TARGET: &str = "stepwise::telemetry";

/// Instrumentation name registered with the OpenTelemetry tracer provider.
pub const TRACER_NAME: &str = "stepwise";
