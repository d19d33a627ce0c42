//! Quote provider contract and provider-level error classification.
//!
//! Every upstream vendor integration implements [`QuoteProvider`]. The
//! orchestrator only sees this trait, so test doubles and real vendors are
//! interchangeable.
//!
//! # Example
//!
//! ```rust,ignore
//! use stockfeed_core::{QuoteProvider, Symbol};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn fetch(provider: &dyn QuoteProvider) -> Result<(), stockfeed_core::SourceError> {
//!     let symbols = vec![Symbol::parse("AAPL")?];
//!     for quote in provider.fetch_quotes(&symbols, &CancellationToken::new()).await? {
//!         println!("{}: {:.2}", quote.symbol, quote.price);
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{Quote, Symbol};

/// Boxed future returned by provider trait methods.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Network,
    Timeout,
    Authentication,
    RateLimitExceeded,
    InvalidRequest,
    NotFound,
    ServerError,
    ServiceUnavailable,
    DataParsing,
    Cancelled,
}

/// Coarse classification reported once retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Network,
    Timeout,
    Client,
    Server,
    Unknown,
}

/// Structured provider error used by the transport retry loop and orchestrator fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retry_after: Option<Duration>,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Authentication, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(SourceErrorKind::RateLimitExceeded, message)
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::ServerError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::ServiceUnavailable, message)
    }

    pub fn data_parsing(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::DataParsing, message)
    }

    pub fn cancelled() -> Self {
        Self::new(SourceErrorKind::Cancelled, "request cancelled")
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Vendor-supplied hint for how long to wait after a 429.
    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Transient failures the transport retries locally.
    pub const fn retryable(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Network
                | SourceErrorKind::Timeout
                | SourceErrorKind::ServerError
                | SourceErrorKind::ServiceUnavailable
                | SourceErrorKind::RateLimitExceeded
        )
    }

    /// Failures that retrying can never fix.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Authentication | SourceErrorKind::InvalidRequest
        )
    }

    pub const fn class(&self) -> ErrorClass {
        match self.kind {
            SourceErrorKind::Network => ErrorClass::Network,
            SourceErrorKind::Timeout => ErrorClass::Timeout,
            SourceErrorKind::Authentication
            | SourceErrorKind::RateLimitExceeded
            | SourceErrorKind::InvalidRequest
            | SourceErrorKind::NotFound => ErrorClass::Client,
            SourceErrorKind::ServerError | SourceErrorKind::ServiceUnavailable => {
                ErrorClass::Server
            }
            SourceErrorKind::DataParsing | SourceErrorKind::Cancelled => ErrorClass::Unknown,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Network => "source.network",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Authentication => "source.authentication",
            SourceErrorKind::RateLimitExceeded => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::ServerError => "source.server_error",
            SourceErrorKind::ServiceUnavailable => "source.service_unavailable",
            SourceErrorKind::DataParsing => "source.data_parsing",
            SourceErrorKind::Cancelled => "source.cancelled",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Upstream quote vendor contract.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`name`](QuoteProvider::name) | Stable identifier for priority lookup, logging and breaker keying |
/// | [`fetch_quotes`](QuoteProvider::fetch_quotes) | Batch quote fetch |
/// | [`is_healthy`](QuoteProvider::is_healthy) | Lightweight liveness probe |
///
/// Implementations must be `Send + Sync`; one instance serves concurrent callers.
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetches quotes for display symbols.
    ///
    /// Symbols the vendor does not know are left out of the result. Any other
    /// failure fails the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the vendor rejects credentials, every
    /// request fails, a response cannot be decoded, or `cancel` fires.
    fn fetch_quotes<'a>(
        &'a self,
        symbols: &'a [Symbol],
        cancel: &'a CancellationToken,
    ) -> ProviderFuture<'a, Result<Vec<Quote>, SourceError>>;

    /// Probes one well-known symbol. Independent of circuit breaker state.
    fn is_healthy<'a>(&'a self) -> ProviderFuture<'a, bool>;
}

/// Static priority table keyed by provider name. Lower values are tried first
/// and names missing from the table sort last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderPriorities {
    table: HashMap<String, u32>,
}

impl ProviderPriorities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, priority: u32) -> Self {
        self.table.insert(name.into(), priority);
        self
    }

    pub fn priority_of(&self, name: &str) -> u32 {
        self.table.get(name).copied().unwrap_or(u32::MAX)
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for ProviderPriorities {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        Self {
            table: iter
                .into_iter()
                .map(|(name, priority)| (name.into(), priority))
                .collect(),
        }
    }
}
