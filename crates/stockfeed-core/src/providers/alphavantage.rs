use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{collect_quotes, invalid_quote, resolve_symbol, ProviderOptions};
use crate::http_client::HttpClient;
use crate::provider::{ProviderFuture, QuoteProvider, SourceError};
use crate::transport::Transport;
use crate::{Quote, Symbol, SymbolFormat};

/// Alpha Vantage `GLOBAL_QUOTE` integration. One request per symbol.
#[derive(Clone)]
pub struct AlphaVantageProvider {
    transport: Transport,
    base_url: String,
    api_key: String,
    format: SymbolFormat,
    health_check_symbol: Symbol,
}

impl AlphaVantageProvider {
    pub const NAME: &'static str = "alphavantage";
    pub const DEFAULT_BASE_URL: &'static str = "https://www.alphavantage.co";

    pub fn new(http_client: Arc<dyn HttpClient>, options: ProviderOptions) -> Self {
        Self {
            transport: Transport::new(Self::NAME, http_client, options.transport.clone()),
            base_url: options.trimmed_base_url().to_owned(),
            api_key: options.api_key.clone().unwrap_or_default(),
            format: options.format,
            health_check_symbol: options.health_check_symbol,
        }
    }

    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    fn quote_url(&self, symbol: &Symbol) -> String {
        format!(
            "{}/query?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.base_url,
            urlencoding::encode(&self.format.to_vendor(symbol)),
            urlencoding::encode(&self.api_key)
        )
    }

    async fn fetch_one(
        &self,
        symbol: &Symbol,
        cancel: &CancellationToken,
    ) -> Result<Quote, SourceError> {
        if self.api_key.is_empty() {
            return Err(SourceError::authentication(
                "alphavantage API key is not configured",
            ));
        }

        let response: GlobalQuoteResponse =
            self.transport.get_json(&self.quote_url(symbol), cancel).await?;
        if let Some(error) = response.vendor_error() {
            return Err(error);
        }

        let quote = response
            .quote
            .filter(|quote| quote.price.is_some())
            .ok_or_else(|| {
                SourceError::not_found(format!("alphavantage has no quote for {symbol}"))
            })?;
        self.to_quote(symbol, quote)
    }

    fn to_quote(&self, requested: &Symbol, raw: GlobalQuote) -> Result<Quote, SourceError> {
        let symbol = resolve_symbol(self.format, requested, raw.symbol.as_deref());
        let price = parse_decimal("price", raw.price.as_deref())?.ok_or_else(|| {
            SourceError::data_parsing(format!("alphavantage quote for {symbol} has no price"))
        })?;

        Quote::new(
            symbol.clone(),
            price,
            parse_decimal("open", raw.open.as_deref())?,
            parse_decimal("high", raw.high.as_deref())?,
            parse_decimal("low", raw.low.as_deref())?,
            parse_decimal("previous close", raw.previous_close.as_deref())?,
            parse_volume(raw.volume.as_deref())?,
            Self::NAME,
        )
        .map_err(|error| invalid_quote(Self::NAME, &symbol, error))
    }
}

impl QuoteProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch_quotes<'a>(
        &'a self,
        symbols: &'a [Symbol],
        cancel: &'a CancellationToken,
    ) -> ProviderFuture<'a, Result<Vec<Quote>, SourceError>> {
        Box::pin(collect_quotes(Self::NAME, symbols, move |symbol| {
            self.fetch_one(symbol, cancel)
        }))
    }

    fn is_healthy<'a>(&'a self) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            let cancel = CancellationToken::new();
            match self.fetch_one(&self.health_check_symbol, &cancel).await {
                Ok(_) => true,
                Err(error) => {
                    debug!(provider = Self::NAME, error = %error, "health probe failed");
                    false
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote", default)]
    quote: Option<GlobalQuote>,
    #[serde(rename = "Note", default)]
    note: Option<String>,
    #[serde(rename = "Information", default)]
    information: Option<String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
}

impl GlobalQuoteResponse {
    /// Alpha Vantage reports throttling and key problems in 200 bodies.
    fn vendor_error(&self) -> Option<SourceError> {
        if let Some(message) = &self.error_message {
            return Some(if mentions_bad_api_key(message) {
                SourceError::authentication(format!("alphavantage: {message}"))
            } else {
                SourceError::invalid_request(format!("alphavantage: {message}"))
            });
        }

        let message = self.note.as_ref().or(self.information.as_ref())?;
        Some(if mentions_bad_api_key(message) {
            SourceError::authentication(format!("alphavantage: {message}"))
        } else {
            SourceError::rate_limited(format!("alphavantage: {message}"), None)
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol", default)]
    symbol: Option<String>,
    #[serde(rename = "02. open", default)]
    open: Option<String>,
    #[serde(rename = "03. high", default)]
    high: Option<String>,
    #[serde(rename = "04. low", default)]
    low: Option<String>,
    #[serde(rename = "05. price", default)]
    price: Option<String>,
    #[serde(rename = "06. volume", default)]
    volume: Option<String>,
    #[serde(rename = "08. previous close", default)]
    previous_close: Option<String>,
}

fn mentions_bad_api_key(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    (lower.contains("apikey") || lower.contains("api key"))
        && (lower.contains("invalid") || lower.contains("missing"))
}

fn parse_decimal(field: &str, raw: Option<&str>) -> Result<Option<f64>, SourceError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<f64>().map(Some).map_err(|_| {
            SourceError::data_parsing(format!("alphavantage {field} '{value}' is not a number"))
        }),
    }
}

fn parse_volume(raw: Option<&str>) -> Result<Option<u64>, SourceError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<u64>().map(Some).map_err(|_| {
            SourceError::data_parsing(format!("alphavantage volume '{value}' is not an integer"))
        }),
    }
}
