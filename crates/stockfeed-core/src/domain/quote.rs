use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Symbol, UtcDateTime, ValidationError};

/// Latest known price snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub previous_close: Option<f64>,
    pub volume: Option<u64>,
    pub fetched_at: UtcDateTime,
    /// Name of the provider that produced this snapshot.
    pub source: String,
    /// Derived on read from `fetched_at` and the freshness window.
    pub stale: bool,
}

impl Quote {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        price: f64,
        open: Option<f64>,
        day_high: Option<f64>,
        day_low: Option<f64>,
        previous_close: Option<f64>,
        volume: Option<u64>,
        source: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_optional_non_negative("open", open)?;
        validate_optional_non_negative("day_high", day_high)?;
        validate_optional_non_negative("day_low", day_low)?;
        validate_optional_non_negative("previous_close", previous_close)?;

        Ok(Self {
            symbol,
            price,
            open,
            day_high,
            day_low,
            previous_close,
            volume,
            fetched_at: UtcDateTime::now(),
            source: source.into(),
            stale: false,
        })
    }

    /// Absolute move against the previous close.
    pub fn change(&self) -> Option<f64> {
        self.previous_close.map(|close| self.price - close)
    }

    /// Percentage move against the previous close; `None` when the close is zero or unknown.
    pub fn change_percent(&self) -> Option<f64> {
        let close = self.previous_close?;
        if close == 0.0 {
            return None;
        }
        Some((self.price - close) / close * 100.0)
    }

    pub fn is_stale_at(&self, now: UtcDateTime, freshness_window: Duration) -> bool {
        self.fetched_at.elapsed_until(now) > freshness_window
    }

    /// Re-stamps provenance after a successful fetch.
    pub(crate) fn stamp(&mut self, source: &str, fetched_at: UtcDateTime) {
        source.clone_into(&mut self.source);
        self.fetched_at = fetched_at;
        self.stale = false;
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
