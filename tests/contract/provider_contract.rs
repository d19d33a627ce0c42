//! Contract checks every vendor provider must honor, driven by scripted HTTP.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use stockfeed_core::{
    AlphaVantageProvider, HttpResponse, Market, ProviderOptions, QuoteProvider, RateLimitConfig,
    RetryPolicy, SourceErrorKind, Symbol, SymbolFormat, TransportConfig, YahooProvider,
};
use support::ScriptedHttpClient;
use tokio_util::sync::CancellationToken;

type Build = fn(Arc<ScriptedHttpClient>, Market) -> Arc<dyn QuoteProvider>;

#[derive(Clone, Copy)]
struct ProviderCase {
    name: &'static str,
    build: Build,
    /// Successful body for AAPL priced at 189.84.
    quote_body: &'static str,
    not_found_body: &'static str,
    /// Path fragment that carries the vendor symbol in the request URL.
    symbol_marker: fn(&str) -> String,
}

const ALPHAVANTAGE_AAPL: &str = r#"{
    "Global Quote": {
        "01. symbol": "AAPL",
        "02. open": "188.1000",
        "03. high": "191.0500",
        "04. low": "187.4500",
        "05. price": "189.8400",
        "06. volume": "51234567",
        "08. previous close": "187.5000"
    }
}"#;

const YAHOO_AAPL: &str = r#"{
    "chart": {
        "result": [{
            "meta": {
                "symbol": "AAPL",
                "regularMarketPrice": 189.84,
                "regularMarketDayHigh": 191.05,
                "regularMarketDayLow": 187.45,
                "regularMarketVolume": 51234567,
                "chartPreviousClose": 187.5
            },
            "indicators": { "quote": [{ "open": [188.1] }] }
        }],
        "error": null
    }
}"#;

fn options(base_url: &str, market: Market) -> ProviderOptions {
    ProviderOptions::new(base_url, Symbol::parse("AAPL").expect("valid symbol"))
        .with_format(SymbolFormat::new(market))
        .with_transport(TransportConfig {
            retry: RetryPolicy::no_retry(),
            rate_limit: RateLimitConfig::disabled(),
            ..TransportConfig::default()
        })
}

fn provider_cases() -> Vec<ProviderCase> {
    vec![
        ProviderCase {
            name: AlphaVantageProvider::NAME,
            build: |client, market| {
                Arc::new(AlphaVantageProvider::new(
                    client,
                    options("https://av.test", market).with_api_key("demo"),
                ))
            },
            quote_body: ALPHAVANTAGE_AAPL,
            not_found_body: r#"{ "Global Quote": {} }"#,
            symbol_marker: |symbol| format!("symbol={symbol}&"),
        },
        ProviderCase {
            name: YahooProvider::NAME,
            build: |client, market| {
                Arc::new(YahooProvider::new(client, options("https://yahoo.test", market)))
            },
            quote_body: YAHOO_AAPL,
            not_found_body: r#"{ "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found" } } }"#,
            symbol_marker: |symbol| format!("/chart/{symbol}?"),
        },
    ]
}

fn symbols(raw: &[&str]) -> Vec<Symbol> {
    raw.iter()
        .map(|value| Symbol::parse(value).expect("valid symbol"))
        .collect()
}

#[tokio::test]
async fn quote_returns_valid_structure_for_all_providers() {
    for case in provider_cases() {
        let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(
            case.quote_body,
        ))]));
        let provider = (case.build)(Arc::clone(&client), Market::Us);

        let quotes = provider
            .fetch_quotes(&symbols(&["AAPL"]), &CancellationToken::new())
            .await
            .unwrap_or_else(|error| panic!("provider '{}' quote failed: {error}", case.name));

        assert_eq!(provider.name(), case.name);
        assert_eq!(quotes.len(), 1, "provider '{}': quote count", case.name);
        let quote = &quotes[0];
        assert_eq!(quote.symbol.as_str(), "AAPL", "provider '{}': symbol", case.name);
        assert!((quote.price - 189.84).abs() < 1e-9, "provider '{}': price", case.name);
        assert_eq!(quote.open, Some(188.1), "provider '{}': open", case.name);
        assert_eq!(quote.day_high, Some(191.05), "provider '{}': high", case.name);
        assert_eq!(quote.day_low, Some(187.45), "provider '{}': low", case.name);
        assert_eq!(quote.previous_close, Some(187.5), "provider '{}': close", case.name);
        assert_eq!(quote.volume, Some(51_234_567), "provider '{}': volume", case.name);
        assert_eq!(quote.source, case.name, "provider '{}': source", case.name);
    }
}

#[tokio::test]
async fn unknown_symbols_are_omitted_for_all_providers() {
    for case in provider_cases() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::ok_json(case.quote_body)),
            Ok(HttpResponse::ok_json(case.not_found_body)),
        ]));
        let provider = (case.build)(Arc::clone(&client), Market::Us);

        let quotes = provider
            .fetch_quotes(&symbols(&["AAPL", "NOPE"]), &CancellationToken::new())
            .await
            .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", case.name));

        assert_eq!(quotes.len(), 1, "provider '{}'", case.name);
        assert_eq!(quotes[0].symbol.as_str(), "AAPL", "provider '{}'", case.name);
    }
}

#[tokio::test]
async fn server_errors_fail_the_whole_batch_for_all_providers() {
    for case in provider_cases() {
        let client = Arc::new(ScriptedHttpClient::new([
            Ok(HttpResponse::ok_json(case.quote_body)),
            Ok(HttpResponse::new(502, "bad gateway")),
        ]));
        let provider = (case.build)(Arc::clone(&client), Market::Us);

        let error = provider
            .fetch_quotes(&symbols(&["AAPL", "MSFT"]), &CancellationToken::new())
            .await
            .expect_err("batch must fail");

        assert_eq!(
            error.kind(),
            SourceErrorKind::ServerError,
            "provider '{}'",
            case.name
        );
    }
}

#[tokio::test]
async fn outbound_symbols_carry_the_market_suffix() {
    for (market, vendor_symbol) in [(Market::Nse, "RELIANCE.NS"), (Market::Bse, "RELIANCE.BO")] {
        for case in provider_cases() {
            let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(
                case.not_found_body,
            ))]));
            let provider = (case.build)(Arc::clone(&client), market);

            provider
                .fetch_quotes(&symbols(&["RELIANCE"]), &CancellationToken::new())
                .await
                .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", case.name));

            let urls = client.urls();
            assert_eq!(urls.len(), 1);
            assert!(
                urls[0].contains(&(case.symbol_marker)(vendor_symbol)),
                "provider '{}': {} lacks {vendor_symbol}",
                case.name,
                urls[0]
            );
        }
    }
}

#[tokio::test]
async fn health_reflects_the_probe_outcome_for_all_providers() {
    for case in provider_cases() {
        let up = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(
            case.quote_body,
        ))]));
        let down = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::new(500, "boom"))]));

        assert!(
            (case.build)(up, Market::Us).is_healthy().await,
            "provider '{}' should be healthy",
            case.name
        );
        assert!(
            !(case.build)(down, Market::Us).is_healthy().await,
            "provider '{}' should be unhealthy",
            case.name
        );
    }
}
