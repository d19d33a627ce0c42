//! # Stockfeed Core
//!
//! Multi-provider stock quote orchestration.
//!
//! ## Overview
//!
//! - **Provider fallback** in a static priority order, first success wins
//! - **Per-provider circuit breakers** that skip failing vendors during a cooldown
//! - **Quote cache** with an absolute TTL
//! - **Rate limiting** per provider (per-minute cap plus minimum spacing)
//! - **HTTP transport** with bounded exponential-backoff retries
//! - **Symbol normalization** between suffix-free display symbols and vendor symbols
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Quote cache with TTL |
//! | [`circuit_breaker`] | Circuit breaker registry keyed by provider |
//! | [`domain`] | Domain models (Quote, Symbol, Market) |
//! | [`error`] | Feed, validation and settings errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`orchestrator`] | Quote orchestrator and builder |
//! | [`provider`] | Provider trait and provider error taxonomy |
//! | [`providers`] | Alpha Vantage and Yahoo integrations |
//! | [`retry`] | Retry policy and backoff |
//! | [`settings`] | File and environment configuration |
//! | [`throttling`] | Rate limiter |
//! | [`transport`] | Throttled, retrying JSON transport |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stockfeed_core::{FeedSettings, QuoteOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = FeedSettings::from_env()?;
//!     let orchestrator = QuoteOrchestrator::builder(settings).build()?;
//!
//!     for quote in orchestrator.get_quotes(&["AAPL", "MSFT"]).await? {
//!         println!("{} {:.2} via {}", quote.symbol, quote.price, quote.source);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Orchestrator  │────▶│   Quote Cache    │
//! └────────┬────────┘     └──────────────────┘
//!          │              ┌──────────────────┐
//!          ├─────────────▶│ Circuit Breakers │
//!          ▼              └──────────────────┘
//! ┌─────────────────┐
//! │ Quote Provider  │  (priority order)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Transport     │────▶│  Rate Limiter    │
//! │ (retry/backoff) │     └──────────────────┘
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │  HTTP Client    │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use stockfeed_core::{FeedError, SourceErrorKind};
//!
//! fn describe(error: &FeedError) -> &'static str {
//!     match error.last_source_error().map(|source| source.kind()) {
//!         Some(SourceErrorKind::Authentication) => "check the API key",
//!         Some(SourceErrorKind::RateLimitExceeded) => "slow down",
//!         Some(_) => "upstream trouble",
//!         None => "no upstream error",
//!     }
//! }
//! ```

pub mod cache;
pub mod circuit_breaker;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod settings;
pub mod throttling;
pub mod transport;

// Caching
pub use cache::QuoteCache;

// Circuit breaker
pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitPermit, CircuitSnapshot, CircuitState,
};

// Domain models
pub use domain::{Market, Quote, Symbol, SymbolFormat, UtcDateTime};

// Error types
pub use error::{ConfigError, FeedError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Orchestration
pub use orchestrator::{OrchestratorConfig, QuoteOrchestrator, QuoteOrchestratorBuilder};

// Provider contract
pub use provider::{
    ErrorClass, ProviderFuture, ProviderPriorities, QuoteProvider, SourceError, SourceErrorKind,
};
pub use providers::{AlphaVantageProvider, ProviderOptions, YahooProvider};

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Settings
pub use settings::{FeedSettings, ProviderSettings, ProvidersSettings};

// Throttling
pub use throttling::{RateLimitConfig, RateLimiter};

// Transport
pub use transport::{Transport, TransportConfig};
