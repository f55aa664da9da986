//! `stepwise replay`: feed a sequence of data snapshots through the engine.
//!
//! Each step type resolves to a demo module named after the type, so a flow
//! can be exercised without any real screens.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Result, bail};
use console::style;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use stepwise_core::{FlowEngine, StateSnapshot};
use stepwise_observe::TelemetryInterceptor;
use stepwise_types::definition::FlowDefinition;

use super::parse_data;

/// One published engine state, tagged with the snapshot that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayFrame {
    /// Zero-based index into the snapshot list.
    pub snapshot: usize,
    pub phase: String,
    pub step_id: Option<String>,
    pub module: Option<String>,
    pub error: Option<String>,
    pub completed: bool,
}

impl ReplayFrame {
    fn new(snapshot: usize, state: &StateSnapshot<String>) -> Self {
        Self {
            snapshot,
            phase: state.phase().to_string(),
            step_id: state.current_step_id.clone(),
            module: state.active_module.as_deref().cloned(),
            error: state.error.as_ref().map(|e| e.to_string()),
            completed: state.is_completed,
        }
    }
}

/// Sync every snapshot in order and collect each published state.
///
/// Waits for the module load started by a snapshot to settle before syncing
/// the next one.
pub async fn run(definition: FlowDefinition, snapshots: &[Value]) -> Vec<ReplayFrame> {
    let engine: FlowEngine<Value, String> = FlowEngine::new(definition.into_steps());
    engine.add_interceptor(TelemetryInterceptor::tracing());

    let step_types: BTreeSet<String> = engine
        .steps()
        .iter()
        .map(|step| step.step_type.clone())
        .collect();
    for step_type in step_types {
        let module = step_type.clone();
        engine.register_loader(step_type, move || {
            let module = module.clone();
            async move { Ok(module) }
        });
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = engine.subscribe(move |state| {
        let _ = tx.send(Arc::clone(state));
    });

    let mut frames = Vec::new();
    for (index, data) in snapshots.iter().enumerate() {
        engine.sync(data);

        // Step and loading states reach listeners before `sync` returns.
        let mut loading = false;
        while let Ok(state) = rx.try_recv() {
            loading = state.is_loading;
            frames.push(ReplayFrame::new(index, &state));
        }
        while loading {
            let Some(state) = rx.recv().await else {
                break;
            };
            loading = state.is_loading;
            frames.push(ReplayFrame::new(index, &state));
        }
    }

    subscription.unsubscribe();
    frames
}

/// Replay `raw_data` (a JSON array) and print every published state.
pub async fn replay(definition: FlowDefinition, raw_data: &str, json: bool) -> Result<()> {
    let Value::Array(snapshots) = parse_data(raw_data)? else {
        bail!("--data must be a JSON array of data snapshots");
    };

    let frames = run(definition, &snapshots).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&frames)?);
        return Ok(());
    }

    println!();
    for (index, data) in snapshots.iter().enumerate() {
        println!("  {} {}", style(format!("#{}", index + 1)).bold(), style(data).dim());
        let mut published = frames.iter().filter(|f| f.snapshot == index).peekable();
        if published.peek().is_none() {
            println!("     {}", style("(no change)").dim());
        }
        for frame in published {
            let mut line = format!("     {}", frame.phase);
            if let Some(module) = &frame.module {
                line.push_str(&format!("  module={}", style(module).cyan()));
            }
            if let Some(error) = &frame.error {
                line.push_str(&format!("  error={}", style(error).red()));
            }
            if frame.completed {
                println!("{}", style(line).green());
            } else {
                println!("{line}");
            }
        }
    }
    println!();

    Ok(())
}
