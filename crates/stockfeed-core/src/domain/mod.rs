//! # Domain Models
//!
//! Canonical quote-feed types.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Quote`] | Price snapshot with provenance and staleness |
//! | [`Symbol`] | Validated, suffix-free display ticker |
//! | [`Market`] | Listing venue deciding the vendor suffix |
//! | [`SymbolFormat`] | Display ⇄ vendor symbol translation |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Construction validates invariants, so a `Quote` with a negative or
//! non-finite price cannot exist.

mod quote;
mod symbol;
mod timestamp;

pub use quote::Quote;
pub use symbol::{Market, Symbol, SymbolFormat};
pub use timestamp::UtcDateTime;
