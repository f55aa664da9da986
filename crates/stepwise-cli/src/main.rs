//! stepwise CLI entry point.
//!
//! Binary name: `stepwise`
//!
//! Loads a flow file, initializes tracing from its `[observe]` table and the
//! verbosity flags, then dispatches to the command handler.

mod cli;

use std::path::Path;

use clap::Parser;
use clap_complete::generate;
use stepwise_types::definition::FlowDefinition;

use cli::{Cli, Commands, LogOverrides};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let overrides = cli.log_overrides();

    let result = match cli.command {
        // Shell completions don't need a flow file
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "stepwise", &mut std::io::stdout());
            return Ok(());
        }

        Commands::Status { flow, data } => {
            let definition = start(&flow, overrides)?;
            cli::status::status(definition, &data, cli.json)
        }

        Commands::Replay { flow, data } => {
            let definition = start(&flow, overrides)?;
            cli::replay::replay(definition, &data, cli.json).await
        }
    };

    stepwise_observe::shutdown_tracing();
    result
}

/// Load the flow file and install the tracing subscriber it configures.
fn start(flow: &Path, overrides: LogOverrides) -> anyhow::Result<FlowDefinition> {
    let definition = cli::load_flow(flow)?;

    let observe = overrides.apply(&definition.observe);
    if let Err(e) = stepwise_observe::init_tracing(&observe) {
        anyhow::bail!("failed to initialize tracing: {e}");
    }
    tracing::debug!(flow = %flow.display(), steps = definition.steps.len(), "loaded flow");

    Ok(definition)
}
