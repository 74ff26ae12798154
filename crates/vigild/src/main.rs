//! vigild — the Vigil daemon and operator tool.
//!
//! `vigild run` hosts the health engine: it persists the application state
//! to the state directory and follows the operator files. The remaining
//! subcommands are the operator side of that file protocol.
//!
//! # Usage
//!
//! ```text
//! vigild run --config /etc/vigil.toml
//! vigild override FAULTY
//! vigild override --clear
//! vigild drain
//! vigild status
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use vigil_core::{AppState, VigilConfig};

mod commands;

#[derive(Parser)]
#[command(name = "vigild", about = "Vigil health engine daemon", version)]
struct Cli {
    /// Path to vigil.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// State directory, overriding the config file.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the engine until interrupted.
    Run {
        /// Emit logs as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the persisted state report and heartbeat age.
    Status,
    /// Force the application state, or clear a forced state.
    Override {
        /// State to force (READY, WARNING, INITIALIZING, FAULTY).
        #[arg(required_unless_present = "clear", conflicts_with = "clear")]
        state: Option<AppState>,
        /// Clear the override.
        #[arg(long)]
        clear: bool,
    },
    /// Ask the instance to drain.
    Drain,
    /// Withdraw a drain request.
    Undrain,
    /// Read the HA role file and print the resolved role.
    Role,
}

fn load_config(cli: &Cli) -> Result<VigilConfig> {
    let mut config = match &cli.config {
        Some(path) => VigilConfig::from_file(path)?,
        None => VigilConfig::default(),
    };
    if let Some(dir) = &cli.state_dir {
        config.state.dir = dir.clone();
    }
    Ok(config)
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,vigil=debug"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = matches!(cli.command, Command::Run { json: true });
    init_tracing(json)?;

    let config = load_config(&cli)?;

    match cli.command {
        Command::Run { .. } => commands::run::run(&config).await,
        Command::Status => commands::operator::status(&config),
        Command::Override { state, clear } => {
            commands::operator::set_override(&config, if clear { None } else { state })
        }
        Command::Drain => commands::operator::drain(&config, true),
        Command::Undrain => commands::operator::drain(&config, false),
        Command::Role => commands::operator::role(&config),
    }
}
