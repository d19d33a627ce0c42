mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use stockfeed_core::UtcDateTime;
use uuid::Uuid;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output::{Envelope, Meta};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::setup_logging(&cli.log_level, cli.log_json);

    match run(&cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let started = Instant::now();
    let result = commands::run(cli).await;
    let meta = Meta {
        request_id: Uuid::new_v4(),
        command: commands::name(&cli.command),
        generated_at: UtcDateTime::now(),
        latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    match result {
        Ok(data) => {
            output::render(&Envelope::ok(meta, data), cli.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            output::render(&Envelope::failed(meta, &error), cli.pretty)?;
            Err(error)
        }
    }
}
