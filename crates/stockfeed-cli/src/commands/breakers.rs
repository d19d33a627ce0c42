use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use stockfeed_core::{CircuitSnapshot, QuoteOrchestrator};
use tracing::info;

use crate::cli::BreakersArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct BreakersResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    reset: Option<String>,
    breakers: BTreeMap<String, CircuitSnapshot>,
}

pub fn run(args: &BreakersArgs, orchestrator: &QuoteOrchestrator) -> Result<Value, CliError> {
    if let Some(provider) = &args.reset {
        if !orchestrator.reset_circuit_breaker(provider) {
            return Err(CliError::UnknownProvider(provider.clone()));
        }
        info!(provider = %provider, "circuit breaker reset");
    }

    let data = BreakersResponseData {
        reset: args.reset.clone(),
        breakers: orchestrator.circuit_breaker_status(),
    };
    Ok(serde_json::to_value(data)?)
}
