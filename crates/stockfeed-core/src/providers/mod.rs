//! Concrete vendor integrations.
//!
//! | Provider | Role | Endpoint |
//! |----------|------|----------|
//! | [`AlphaVantageProvider`] | primary, keyed | `GLOBAL_QUOTE` |
//! | [`YahooProvider`] | secondary, keyless | `v8/finance/chart` |

mod alphavantage;
mod yahoo;

use std::future::Future;

use tracing::debug;

pub use alphavantage::AlphaVantageProvider;
pub use yahoo::YahooProvider;

use crate::provider::{SourceError, SourceErrorKind};
use crate::transport::TransportConfig;
use crate::{Quote, Symbol, SymbolFormat, ValidationError};

/// Construction options shared by the vendor providers.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderOptions {
    pub base_url: String,
    pub api_key: Option<String>,
    pub format: SymbolFormat,
    pub health_check_symbol: Symbol,
    pub transport: TransportConfig,
}

impl ProviderOptions {
    pub fn new(base_url: impl Into<String>, health_check_symbol: Symbol) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            format: SymbolFormat::default(),
            health_check_symbol,
            transport: TransportConfig::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_format(mut self, format: SymbolFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Fetches symbols one at a time. `NotFound` drops that symbol; any other
/// error fails the batch.
async fn collect_quotes<'a, F, Fut>(
    provider: &str,
    symbols: &'a [Symbol],
    mut fetch_one: F,
) -> Result<Vec<Quote>, SourceError>
where
    F: FnMut(&'a Symbol) -> Fut,
    Fut: Future<Output = Result<Quote, SourceError>>,
{
    let mut quotes = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match fetch_one(symbol).await {
            Ok(quote) => quotes.push(quote),
            Err(error) if error.kind() == SourceErrorKind::NotFound => {
                debug!(provider, symbol = %symbol, "symbol unknown to vendor, omitted");
            }
            Err(error) => return Err(error),
        }
    }
    Ok(quotes)
}

/// Display symbol for a vendor reply. The requested symbol wins when the
/// vendor echoes something else.
fn resolve_symbol(format: SymbolFormat, requested: &Symbol, echoed: Option<&str>) -> Symbol {
    if let Some(Ok(echoed)) = echoed.map(|raw| format.from_vendor(raw)) {
        if echoed != *requested {
            debug!(requested = %requested, echoed = %echoed, "vendor echoed a different symbol");
        }
    }
    requested.clone()
}

fn invalid_quote(provider: &str, symbol: &Symbol, error: ValidationError) -> SourceError {
    SourceError::data_parsing(format!("{provider} quote for {symbol} is invalid: {error}"))
}
