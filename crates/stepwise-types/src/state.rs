//! Engine state snapshots and derived views.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Immutable snapshot of the engine's state.
///
/// The engine replaces its snapshot on every transition and hands out
/// `Arc<EngineState<M>>`; subscribers cannot mutate engine-internal state.
pub struct EngineState<M> {
    /// The step awaiting completion. `None` when finished or not yet started.
    pub current_step_id: Option<String>,
    /// The module loaded for `current_step_id`, once available.
    pub active_module: Option<Arc<M>>,
    /// Whether a module load for the current step is in flight.
    pub is_loading: bool,
    /// The last registry or load error for the current step.
    pub error: Option<EngineError>,
    /// Whether every step is complete.
    pub is_completed: bool,
}

impl<M> EngineState<M> {
    /// The at-rest state created alongside the engine.
    pub fn initial() -> Self {
        Self {
            current_step_id: None,
            active_module: None,
            is_loading: false,
            error: None,
            is_completed: false,
        }
    }

    /// The state-machine phase this snapshot represents.
    pub fn phase(&self) -> FlowPhase {
        if self.is_completed {
            return FlowPhase::Completed;
        }
        let Some(id) = self.current_step_id.clone() else {
            return FlowPhase::NotStarted;
        };
        if self.is_loading {
            FlowPhase::Loading(id)
        } else if self.error.is_some() {
            FlowPhase::Failed(id)
        } else if self.active_module.is_some() {
            FlowPhase::Ready(id)
        } else {
            FlowPhase::Active(id)
        }
    }
}

impl<M> Default for EngineState<M> {
    fn default() -> Self {
        Self::initial()
    }
}

impl<M> Clone for EngineState<M> {
    fn clone(&self) -> Self {
        Self {
            current_step_id: self.current_step_id.clone(),
            active_module: self.active_module.clone(),
            is_loading: self.is_loading,
            error: self.error.clone(),
            is_completed: self.is_completed,
        }
    }
}

impl<M> fmt::Debug for EngineState<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("current_step_id", &self.current_step_id)
            .field("has_active_module", &self.active_module.is_some())
            .field("is_loading", &self.is_loading)
            .field("error", &self.error)
            .field("is_completed", &self.is_completed)
            .finish()
    }
}

/// Lifecycle phase of the flow, derived from an `EngineState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowPhase {
    /// No step has been evaluated yet.
    NotStarted,
    /// A step became current; its load has not started.
    Active(String),
    /// The module for the step is being loaded.
    Loading(String),
    /// The module for the step is loaded.
    Ready(String),
    /// The module for the step could not be loaded.
    Failed(String),
    /// No step is outstanding.
    Completed,
}

impl FlowPhase {
    /// The step this phase refers to, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            FlowPhase::Active(id)
            | FlowPhase::Loading(id)
            | FlowPhase::Ready(id)
            | FlowPhase::Failed(id) => Some(id),
            FlowPhase::NotStarted | FlowPhase::Completed => None,
        }
    }
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowPhase::NotStarted => write!(f, "not started"),
            FlowPhase::Active(id) => write!(f, "active ({id})"),
            FlowPhase::Loading(id) => write!(f, "loading ({id})"),
            FlowPhase::Ready(id) => write!(f, "ready ({id})"),
            FlowPhase::Failed(id) => write!(f, "failed ({id})"),
            FlowPhase::Completed => write!(f, "completed"),
        }
    }
}

/// Completion statistics for a step list against one data snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Number of configured steps.
    pub total: usize,
    /// Steps currently complete, optional ones included.
    pub completed: usize,
    /// Number of required steps.
    pub required: usize,
    /// Required steps currently complete.
    pub completed_required: usize,
    /// `completed / total` as a rounded percentage. 0 for an empty list.
    pub percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_at_rest() {
        let state: EngineState<()> = EngineState::initial();
        assert!(state.current_step_id.is_none());
        assert!(state.active_module.is_none());
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        assert!(!state.is_completed);
        assert_eq!(state.phase(), FlowPhase::NotStarted);
    }

    #[test]
    fn test_phase_derivation() {
        let mut state: EngineState<&str> = EngineState::initial();
        state.current_step_id = Some("s1".to_string());
        assert_eq!(state.phase(), FlowPhase::Active("s1".to_string()));

        state.is_loading = true;
        assert_eq!(state.phase(), FlowPhase::Loading("s1".to_string()));

        state.is_loading = false;
        state.active_module = Some(Arc::new("Comp1"));
        assert_eq!(state.phase(), FlowPhase::Ready("s1".to_string()));

        state.active_module = None;
        state.error = Some(EngineError::NoLoader {
            step_type: "type1".to_string(),
        });
        assert_eq!(state.phase(), FlowPhase::Failed("s1".to_string()));
        assert_eq!(state.phase().step_id(), Some("s1"));

        let done = EngineState::<&str> {
            is_completed: true,
            ..EngineState::initial()
        };
        assert_eq!(done.phase(), FlowPhase::Completed);
        assert_eq!(done.phase().step_id(), None);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(FlowPhase::Loading("kyc".to_string()).to_string(), "loading (kyc)");
        assert_eq!(FlowPhase::Completed.to_string(), "completed");
    }

    #[test]
    fn test_progress_info_serializes() {
        let info = ProgressInfo {
            total: 4,
            completed: 1,
            required: 3,
            completed_required: 1,
            percent: 25,
        };
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["percent"], 25);
        assert_eq!(json["completed_required"], 1);
    }
}
