mod breakers;
mod health;
mod quote;

use std::path::Path;

use serde_json::Value;
use stockfeed_core::{FeedSettings, QuoteOrchestrator};
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let settings = load_settings(cli.config.as_deref())?;
    let orchestrator = QuoteOrchestrator::builder(settings).build()?;
    debug!(providers = ?orchestrator.providers(), "orchestrator ready");

    match &cli.command {
        Command::Quote(args) => quote::run(args, &orchestrator).await,
        Command::Health => health::run(&orchestrator).await,
        Command::Breakers(args) => breakers::run(args, &orchestrator),
    }
}

pub const fn name(command: &Command) -> &'static str {
    match command {
        Command::Quote(_) => "quote",
        Command::Health => "health",
        Command::Breakers(_) => "breakers",
    }
}

fn load_settings(path: Option<&Path>) -> Result<FeedSettings, CliError> {
    let settings = match path {
        Some(path) => FeedSettings::load(path)?,
        None => FeedSettings::from_env()?,
    };
    Ok(settings)
}
