//! Flow engine for multi-step wizards.
//!
//! Given the current application data, the engine decides which step is
//! active, lazily loads the module for that step through the registry, and
//! publishes immutable state snapshots to subscribers. Rendering and
//! telemetry live with the caller.

pub mod completion;
pub mod engine;
pub mod interceptor;
pub mod notify;
pub mod progress;
pub mod registry;

pub use completion::{find_next_step, is_step_complete};
pub use engine::{FlowEngine, StateSnapshot};
pub use interceptor::{BoxInterceptor, Interceptor, TransitionContext};
pub use notify::{Notifier, Subscription};
pub use progress::progress;
pub use registry::{BoxModuleLoader, LoadedModule, ModuleLoader, ModuleRegistry};
