use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 15;

/// Normalized display ticker. Never carries a vendor exchange suffix once it
/// has passed through [`SymbolFormat`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize a symbol to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        if let Some(first) = normalized.chars().next() {
            if !first.is_ascii_alphabetic() {
                return Err(ValidationError::SymbolInvalidStart { ch: first });
            }
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '&';
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

/// Exchange whose listing convention decides the vendor-side suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    #[default]
    Us,
    Nse,
    Bse,
}

impl Market {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Nse => "nse",
            Self::Bse => "bse",
        }
    }

    pub const fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Us => None,
            Self::Nse => Some(".NS"),
            Self::Bse => Some(".BO"),
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Self::Us),
            "nse" => Ok(Self::Nse),
            "bse" => Ok(Self::Bse),
            other => Err(ValidationError::InvalidMarket {
                value: other.to_owned(),
            }),
        }
    }
}

/// Pure translation between display symbols and vendor symbols.
///
/// `normalize(to_vendor(s)) == normalize(s)` holds for every valid symbol, and
/// applying either direction twice is the same as applying it once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolFormat {
    market: Market,
}

impl SymbolFormat {
    pub const fn new(market: Market) -> Self {
        Self { market }
    }

    pub const fn market(self) -> Market {
        self.market
    }

    /// Parses raw user or vendor input into a suffix-free display symbol.
    pub fn normalize(self, raw: &str) -> Result<Symbol, ValidationError> {
        let Some(suffix) = self.market.suffix() else {
            return Symbol::parse(raw);
        };

        let upper = raw.trim().to_ascii_uppercase();
        let mut display = upper.as_str();
        while let Some(stripped) = display.strip_suffix(suffix) {
            if stripped.is_empty() {
                break;
            }
            display = stripped;
        }
        Symbol::parse(display)
    }

    /// Symbol as sent to the vendor, with the market suffix appended when missing.
    pub fn to_vendor(self, symbol: &Symbol) -> String {
        match self.market.suffix() {
            Some(suffix) if !symbol.as_str().ends_with(suffix) => {
                format!("{}{suffix}", symbol.as_str())
            }
            _ => symbol.as_str().to_owned(),
        }
    }

    /// Vendor symbol translated back to display form.
    pub fn from_vendor(self, raw: &str) -> Result<Symbol, ValidationError> {
        self.normalize(raw)
    }
}
