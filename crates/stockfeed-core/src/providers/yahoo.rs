use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{collect_quotes, invalid_quote, resolve_symbol, ProviderOptions};
use crate::http_client::HttpClient;
use crate::provider::{ProviderFuture, QuoteProvider, SourceError};
use crate::transport::Transport;
use crate::{Quote, Symbol, SymbolFormat};

/// Yahoo Finance v8 chart integration. Keyless; one request per symbol.
#[derive(Clone)]
pub struct YahooProvider {
    transport: Transport,
    base_url: String,
    format: SymbolFormat,
    health_check_symbol: Symbol,
}

impl YahooProvider {
    pub const NAME: &'static str = "yahoo";
    pub const DEFAULT_BASE_URL: &'static str = "https://query1.finance.yahoo.com";

    pub fn new(http_client: Arc<dyn HttpClient>, options: ProviderOptions) -> Self {
        Self {
            transport: Transport::new(Self::NAME, http_client, options.transport.clone())
                .with_header("referer", "https://finance.yahoo.com/"),
            base_url: options.trimmed_base_url().to_owned(),
            format: options.format,
            health_check_symbol: options.health_check_symbol,
        }
    }

    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    fn chart_url(&self, symbol: &Symbol) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url,
            urlencoding::encode(&self.format.to_vendor(symbol))
        )
    }

    async fn fetch_one(
        &self,
        symbol: &Symbol,
        cancel: &CancellationToken,
    ) -> Result<Quote, SourceError> {
        let response: ChartResponse = self
            .transport
            .get_json(&self.chart_url(symbol), cancel)
            .await?;

        if let Some(error) = response.chart.error {
            return Err(if error.code.eq_ignore_ascii_case("Not Found") {
                SourceError::not_found(format!("yahoo has no chart for {symbol}"))
            } else {
                SourceError::invalid_request(format!(
                    "yahoo rejected {symbol}: {} {}",
                    error.code,
                    error.description.unwrap_or_default()
                ))
            });
        }

        let result = response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::not_found(format!("yahoo has no chart for {symbol}")))?;
        self.to_quote(symbol, result)
    }

    fn to_quote(&self, requested: &Symbol, result: ChartResult) -> Result<Quote, SourceError> {
        let meta = result.meta;
        let symbol = resolve_symbol(self.format, requested, meta.symbol.as_deref());
        let price = meta.regular_market_price.ok_or_else(|| {
            SourceError::data_parsing(format!("yahoo chart for {symbol} has no market price"))
        })?;
        let open = result
            .indicators
            .and_then(|indicators| indicators.quote.into_iter().next())
            .and_then(|bar| bar.open.into_iter().flatten().next());

        Quote::new(
            symbol.clone(),
            price,
            open,
            meta.regular_market_day_high,
            meta.regular_market_day_low,
            meta.chart_previous_close.or(meta.previous_close),
            meta.regular_market_volume,
            Self::NAME,
        )
        .map_err(|error| invalid_quote(Self::NAME, &symbol, error))
    }
}

impl QuoteProvider for YahooProvider {
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
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    regular_market_day_high: Option<f64>,
    #[serde(default)]
    regular_market_day_low: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<u64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<IndicatorBar>,
}

#[derive(Debug, Deserialize)]
struct IndicatorBar {
    #[serde(default)]
    open: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpResponse;
    use crate::provider::SourceErrorKind;
    use crate::providers::testing::ScriptedHttpClient;
    use crate::retry::RetryPolicy;
    use crate::throttling::RateLimitConfig;
    use crate::transport::TransportConfig;
    use crate::Market;

    const AAPL_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "regularMarketPrice": 189.84,
                    "regularMarketDayHigh": 191.05,
                    "regularMarketDayLow": 187.45,
                    "regularMarketVolume": 51234567,
                    "chartPreviousClose": 187.5
                },
                "timestamp": [1714761000],
                "indicators": {
                    "quote": [{ "open": [null, 188.1], "close": [189.84] }]
                }
            }],
            "error": null
        }
    }"#;

    const NOT_FOUND_CHART: &str = r#"{
        "chart": {
            "result": null,
            "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
        }
    }"#;

    fn provider(client: Arc<ScriptedHttpClient>, market: Market) -> YahooProvider {
        let options = ProviderOptions::new(
            "https://yahoo.test",
            Symbol::parse("AAPL").expect("valid"),
        )
        .with_format(SymbolFormat::new(market))
        .with_transport(TransportConfig {
            retry: RetryPolicy::no_retry(),
            rate_limit: RateLimitConfig::disabled(),
            ..TransportConfig::default()
        });
        YahooProvider::new(client, options)
    }

    fn symbols(raw: &[&str]) -> Vec<Symbol> {
        raw.iter()
            .map(|value| Symbol::parse(value).expect("valid"))
            .collect()
    }

    #[tokio::test]
    async fn maps_chart_meta_and_first_open() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(AAPL_CHART))]));
        let provider = provider(Arc::clone(&client), Market::Us);

        let quotes = provider
            .fetch_quotes(&symbols(&["aapl"]), &CancellationToken::new())
            .await
            .expect("chart parses");

        let quote = &quotes[0];
        assert_eq!(quote.symbol.as_str(), "AAPL");
        assert_eq!(quote.price, 189.84);
        assert_eq!(quote.open, Some(188.1));
        assert_eq!(quote.day_high, Some(191.05));
        assert_eq!(quote.day_low, Some(187.45));
        assert_eq!(quote.previous_close, Some(187.5));
        assert_eq!(quote.volume, Some(51_234_567));
        assert_eq!(quote.source, "yahoo");
        assert_eq!(
            client.urls(),
            vec!["https://yahoo.test/v8/finance/chart/AAPL?interval=1d&range=1d"]
        );
    }

    #[tokio::test]
    async fn bse_symbols_use_bo_suffix_outbound() {
        let body = AAPL_CHART.replace("\"AAPL\"", "\"TCS.BO\"");
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(body))]));
        let provider = provider(Arc::clone(&client), Market::Bse);

        let quotes = provider
            .fetch_quotes(&symbols(&["TCS"]), &CancellationToken::new())
            .await
            .expect("chart parses");

        assert_eq!(quotes[0].symbol.as_str(), "TCS");
        assert!(client.urls()[0].contains("/chart/TCS.BO?"));
    }

    #[tokio::test]
    async fn unknown_symbols_are_omitted_from_batch() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::new(404, NOT_FOUND_CHART)),
            Ok(HttpResponse::ok_json(NOT_FOUND_CHART)),
            Ok(HttpResponse::ok_json(AAPL_CHART)),
        ]));
        let provider = provider(client, Market::Us);

        let quotes = provider
            .fetch_quotes(&symbols(&["GONE", "DELISTED", "AAPL"]), &CancellationToken::new())
            .await
            .expect("not found is not a batch failure");

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol.as_str(), "AAPL");
    }

    #[tokio::test]
    async fn server_error_fails_whole_batch() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::ok_json(AAPL_CHART)),
            Ok(HttpResponse::new(502, "bad gateway")),
        ]));

        let error = provider(client, Market::Us)
            .fetch_quotes(&symbols(&["AAPL", "MSFT"]), &CancellationToken::new())
            .await
            .expect_err("batch fails");

        assert_eq!(error.kind(), SourceErrorKind::ServerError);
    }

    #[tokio::test]
    async fn missing_price_is_parsing_error() {
        let body = AAPL_CHART.replace("\"regularMarketPrice\": 189.84,", "");
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(body))]));

        let error = provider(client, Market::Us)
            .fetch_quotes(&symbols(&["AAPL"]), &CancellationToken::new())
            .await
            .expect_err("no price");

        assert_eq!(error.kind(), SourceErrorKind::DataParsing);
    }

    #[tokio::test]
    async fn health_probe_uses_configured_symbol() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::ok_json(AAPL_CHART)),
            Ok(HttpResponse::new(503, "")),
        ]));
        let provider = provider(Arc::clone(&client), Market::Us);

        assert!(provider.is_healthy().await);
        assert!(!provider.is_healthy().await);
        assert!(client.urls().iter().all(|url| url.contains("/chart/AAPL?")));
    }

    #[tokio::test]
    async fn requests_carry_json_accept_and_finance_referer() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(AAPL_CHART))]));
        let provider = provider(Arc::clone(&client), Market::Us);

        provider
            .fetch_quotes(&symbols(&["AAPL"]), &CancellationToken::new())
            .await
            .expect("quote parses");

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].headers.get("referer").map(String::as_str),
            Some("https://finance.yahoo.com/")
        );
        assert_eq!(
            requests[0].headers.get("accept").map(String::as_str),
            Some("application/json")
        );
    }
}
