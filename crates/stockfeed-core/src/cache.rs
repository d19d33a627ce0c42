//! In-memory quote cache with absolute TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::{Quote, Symbol};

#[derive(Debug, Clone)]
struct CacheEntry {
    quote: Quote,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.inserted_at) <= ttl
    }
}

/// Thread-safe quote cache keyed by display symbol.
///
/// Entries expire `ttl` after insertion regardless of reads. Expired entries
/// are evicted lazily on `get`. A zero TTL disables the cache entirely.
#[derive(Debug, Clone)]
pub struct QuoteCache {
    entries: Arc<RwLock<HashMap<Symbol, CacheEntry>>>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_disabled(&self) -> bool {
        self.ttl.is_zero()
    }

    /// Fresh quote for `symbol`, if any.
    pub async fn get(&self, symbol: &Symbol) -> Option<Quote> {
        if self.is_disabled() {
            return None;
        }

        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(symbol) {
                None => return None,
                Some(entry) if entry.is_fresh(now, self.ttl) => {
                    debug!(symbol = %symbol, "quote cache hit");
                    return Some(entry.quote.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Another writer may have refreshed the entry between the two locks.
        if let Some(entry) = entries.get(symbol) {
            if entry.is_fresh(now, self.ttl) {
                return Some(entry.quote.clone());
            }
            entries.remove(symbol);
            debug!(symbol = %symbol, "evicted expired quote");
        }
        None
    }

    /// Stores `quote` under its symbol, restarting its TTL. No-op when disabled.
    pub async fn put(&self, quote: Quote) {
        if self.is_disabled() {
            return;
        }

        let entry = CacheEntry {
            inserted_at: Instant::now(),
            quote,
        };
        self.entries
            .write()
            .await
            .insert(entry.quote.symbol.clone(), entry);
    }

    pub async fn put_all(&self, quotes: impl IntoIterator<Item = Quote>) {
        if self.is_disabled() {
            return;
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        for quote in quotes {
            entries.insert(
                quote.symbol.clone(),
                CacheEntry {
                    quote,
                    inserted_at: now,
                },
            );
        }
    }

    /// Drops every entry. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub async fn clear_expired(&self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.entries
            .write()
            .await
            .retain(|_, entry| entry.is_fresh(now, ttl));
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
