use thiserror::Error;

use crate::provider::SourceError;

/// Validation errors for symbols, prices and timestamps.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid market '{value}', expected one of us, nse, bse")]
    InvalidMarket { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}

/// Failure surfaced by the quote orchestrator to its host.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid symbol '{input}': {reason}")]
    InvalidSymbol {
        input: String,
        #[source]
        reason: ValidationError,
    },

    /// Returned when fallback is disabled and the first attempted provider fails.
    #[error("provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: SourceError,
    },

    #[error("all providers unavailable (attempted: [{}])", attempted.join(", "))]
    AllProvidersUnavailable {
        attempted: Vec<String>,
        #[source]
        last: Option<SourceError>,
    },

    #[error("quote request was cancelled")]
    Cancelled,
}

impl FeedError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSymbol { .. } => "feed.invalid_symbol",
            Self::Provider { .. } => "feed.provider_failed",
            Self::AllProvidersUnavailable { .. } => "feed.all_providers_unavailable",
            Self::Cancelled => "feed.cancelled",
        }
    }

    /// Most recent underlying provider error, when one exists.
    pub fn last_source_error(&self) -> Option<&SourceError> {
        match self {
            Self::Provider { source, .. } => Some(source),
            Self::AllProvidersUnavailable { last, .. } => last.as_ref(),
            Self::InvalidSymbol { .. } | Self::Cancelled => None,
        }
    }
}

/// Settings loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("setting '{field}' is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}
