use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use stockfeed_core::{Quote, QuoteOrchestrator, Symbol};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::QuoteArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct QuoteResponseData {
    quotes: Vec<Quote>,
    /// Requested symbols no provider knew about.
    missing: Vec<Symbol>,
}

pub async fn run(args: &QuoteArgs, orchestrator: &QuoteOrchestrator) -> Result<Value, CliError> {
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling in-flight requests");
                cancel.cancel();
            }
        }
    });

    let result = orchestrator
        .get_quotes_with_cancel(args.symbols.as_slice(), &cancel)
        .await;
    interrupt.abort();

    let mut quotes = result?;
    quotes.sort_by(|left, right| left.symbol.cmp(&right.symbol));
    let missing = missing_symbols(orchestrator, &args.symbols, &quotes);

    Ok(serde_json::to_value(QuoteResponseData { quotes, missing })?)
}

fn missing_symbols(orchestrator: &QuoteOrchestrator, requested: &[String], quotes: &[Quote]) -> Vec<Symbol> {
    let format = orchestrator.symbol_format();
    let served = quotes
        .iter()
        .map(|quote| &quote.symbol)
        .collect::<BTreeSet<_>>();

    requested
        .iter()
        .filter_map(|raw| format.normalize(raw).ok())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|symbol| !served.contains(symbol))
        .collect()
}
