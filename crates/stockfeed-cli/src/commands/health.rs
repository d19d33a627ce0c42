use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use stockfeed_core::QuoteOrchestrator;

use crate::error::CliError;

#[derive(Debug, Serialize)]
struct HealthResponseData {
    providers: BTreeMap<String, bool>,
    healthy: usize,
}

pub async fn run(orchestrator: &QuoteOrchestrator) -> Result<Value, CliError> {
    let providers = orchestrator.provider_health().await;
    let healthy = providers.values().filter(|healthy| **healthy).count();

    Ok(serde_json::to_value(HealthResponseData { providers, healthy })?)
}
