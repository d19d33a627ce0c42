use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::QuoteCache;
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot};
use crate::error::{ConfigError, FeedError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider::{ProviderPriorities, QuoteProvider, SourceError, SourceErrorKind};
use crate::providers::{AlphaVantageProvider, ProviderOptions, YahooProvider};
use crate::settings::FeedSettings;
use crate::{Market, Quote, Symbol, SymbolFormat, UtcDateTime};

/// Orchestrator policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub enable_fallback: bool,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Zero disables caching.
    pub cache_ttl: Duration,
    pub market: Market,
    pub health_check_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enable_fallback: true,
            circuit_breaker: CircuitBreakerConfig::default(),
            cache_ttl: Duration::from_secs(300),
            market: Market::Us,
            health_check_timeout: Duration::from_secs(10),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &FeedSettings) -> Self {
        Self {
            enable_fallback: settings.enable_fallback,
            circuit_breaker: settings.circuit_breaker(),
            cache_ttl: settings.cache_ttl(),
            market: settings.market,
            health_check_timeout: settings.health_check_timeout(),
        }
    }
}

/// Multi-provider quote fetcher with caching, circuit breaking and fallback.
///
/// Providers are ordered once at construction by a static priority table and
/// tried in that order. The first provider that succeeds supplies every
/// uncached symbol; results are never merged across providers.
///
/// The orchestrator is `Send + Sync`; share it behind an `Arc`.
pub struct QuoteOrchestrator {
    providers: Vec<Arc<dyn QuoteProvider>>,
    breakers: CircuitBreakerRegistry,
    cache: QuoteCache,
    format: SymbolFormat,
    enable_fallback: bool,
    health_check_timeout: Duration,
}

impl QuoteOrchestrator {
    pub fn new(
        mut providers: Vec<Arc<dyn QuoteProvider>>,
        priorities: &ProviderPriorities,
        config: OrchestratorConfig,
    ) -> Self {
        providers.sort_by_key(|provider| priorities.priority_of(provider.name()));

        let breakers = CircuitBreakerRegistry::new(config.circuit_breaker);
        for provider in &providers {
            breakers.register(provider.name());
        }

        Self {
            providers,
            breakers,
            cache: QuoteCache::new(config.cache_ttl),
            format: SymbolFormat::new(config.market),
            enable_fallback: config.enable_fallback,
            health_check_timeout: config.health_check_timeout,
        }
    }

    pub fn builder(settings: FeedSettings) -> QuoteOrchestratorBuilder {
        QuoteOrchestratorBuilder::new(settings)
    }

    /// Provider names in the order they are tried.
    pub fn providers(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Display/vendor symbol translation for the configured market.
    pub const fn symbol_format(&self) -> SymbolFormat {
        self.format
    }

    pub const fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub async fn get_quotes<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<Quote>, FeedError> {
        self.get_quotes_with_cancel(symbols, &CancellationToken::new())
            .await
    }

    /// Quotes for `symbols` in display form, served from cache where fresh.
    ///
    /// Unknown symbols are absent from the result rather than failing the call.
    /// Result order is unspecified.
    ///
    /// # Errors
    ///
    /// - [`FeedError::InvalidSymbol`] before any provider is contacted.
    /// - [`FeedError::Provider`] when fallback is disabled and the first
    ///   attempted provider fails.
    /// - [`FeedError::AllProvidersUnavailable`] when every provider failed or
    ///   was skipped by its circuit breaker.
    /// - [`FeedError::Cancelled`] once `cancel` fires.
    pub async fn get_quotes_with_cancel<S: AsRef<str>>(
        &self,
        symbols: &[S],
        cancel: &CancellationToken,
    ) -> Result<Vec<Quote>, FeedError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let requested = self.normalize(symbols)?;
        if cancel.is_cancelled() {
            return Err(FeedError::Cancelled);
        }

        let mut quotes = Vec::with_capacity(requested.len());
        let mut misses = Vec::new();
        for symbol in requested {
            match self.cache.get(&symbol).await {
                Some(quote) => quotes.push(quote),
                None => misses.push(symbol),
            }
        }

        if misses.is_empty() {
            debug!(count = quotes.len(), "all quotes served from cache");
            return Ok(quotes);
        }

        let fetched = self.fetch_from_providers(&misses, cancel).await?;
        self.cache.put_all(fetched.iter().cloned()).await;
        quotes.extend(fetched);
        Ok(quotes)
    }

    async fn fetch_from_providers(
        &self,
        symbols: &[Symbol],
        cancel: &CancellationToken,
    ) -> Result<Vec<Quote>, FeedError> {
        let mut attempted = Vec::new();
        let mut last_error: Option<SourceError> = None;

        for provider in &self.providers {
            let name = provider.name();
            let Some(permit) = self.breakers.try_acquire(name) else {
                continue;
            };
            attempted.push(name.to_owned());

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(FeedError::Cancelled),
                outcome = provider.fetch_quotes(symbols, cancel) => outcome,
            };

            match outcome {
                Ok(mut quotes) => {
                    permit.succeed();
                    let fetched_at = UtcDateTime::now();
                    for quote in &mut quotes {
                        quote.stamp(name, fetched_at);
                    }
                    info!(
                        provider = name,
                        requested = symbols.len(),
                        returned = quotes.len(),
                        "quotes fetched"
                    );
                    return Ok(quotes);
                }
                Err(error) if error.kind() == SourceErrorKind::Cancelled => {
                    return Err(FeedError::Cancelled);
                }
                Err(error) => {
                    permit.fail();
                    if error.is_terminal() {
                        warn!(
                            provider = name,
                            code = error.code(),
                            error = %error,
                            "provider rejected request, not retryable"
                        );
                    } else {
                        warn!(
                            provider = name,
                            code = error.code(),
                            class = ?error.class(),
                            error = %error,
                            "provider failed"
                        );
                    }

                    if !self.enable_fallback {
                        return Err(FeedError::Provider {
                            provider: name.to_owned(),
                            source: error,
                        });
                    }
                    last_error = Some(error);
                }
            }
        }

        warn!(attempted = ?attempted, "all providers unavailable");
        Err(FeedError::AllProvidersUnavailable {
            attempted,
            last: last_error,
        })
    }

    fn normalize<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<Symbol>, FeedError> {
        let mut seen = HashSet::with_capacity(symbols.len());
        let mut normalized = Vec::with_capacity(symbols.len());
        for raw in symbols {
            let raw = raw.as_ref();
            let symbol = self
                .format
                .normalize(raw)
                .map_err(|reason| FeedError::InvalidSymbol {
                    input: raw.to_owned(),
                    reason,
                })?;
            if seen.insert(symbol.clone()) {
                normalized.push(symbol);
            }
        }
        Ok(normalized)
    }

    /// Probes every provider concurrently. Failures, panics and probes that
    /// outlive the health-check timeout all report `false`.
    pub async fn provider_health(&self) -> BTreeMap<String, bool> {
        let timeout = self.health_check_timeout;
        let probes = self.providers.iter().map(|provider| {
            let name = provider.name().to_owned();
            let provider = Arc::clone(provider);
            let probe = tokio::spawn(async move {
                tokio::time::timeout(timeout, provider.is_healthy()).await
            });
            async move {
                let healthy = match probe.await {
                    Ok(Ok(healthy)) => healthy,
                    Ok(Err(_)) => {
                        warn!(provider = %name, timeout_secs = timeout.as_secs(), "health probe timed out");
                        false
                    }
                    Err(error) => {
                        warn!(provider = %name, error = %error, "health probe task failed");
                        false
                    }
                };
                (name, healthy)
            }
        });

        join_all(probes).await.into_iter().collect()
    }

    pub fn circuit_breaker_status(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.breakers.snapshot()
    }

    /// Forces the named breaker Closed. Returns `false` for unknown providers.
    pub fn reset_circuit_breaker(&self, provider: &str) -> bool {
        self.breakers.reset(provider)
    }

    /// Drops every cached quote. Returns how many were removed.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.cache.clear().await;
        info!(removed, "quote cache cleared");
        removed
    }
}

/// Builds a [`QuoteOrchestrator`] with the vendor providers enabled in
/// [`FeedSettings`].
///
/// # Example
///
/// ```rust,ignore
/// use stockfeed_core::{FeedSettings, QuoteOrchestrator};
///
/// let settings = FeedSettings::from_env()?;
/// let orchestrator = QuoteOrchestrator::builder(settings).build()?;
/// let quotes = orchestrator.get_quotes(&["AAPL", "MSFT"]).await?;
/// ```
pub struct QuoteOrchestratorBuilder {
    settings: FeedSettings,
    http_client: Option<Arc<dyn HttpClient>>,
    extra_providers: Vec<Arc<dyn QuoteProvider>>,
}

impl QuoteOrchestratorBuilder {
    pub fn new(settings: FeedSettings) -> Self {
        Self {
            settings,
            http_client: None,
            extra_providers: Vec::new(),
        }
    }

    /// Replaces the reqwest client shared by the vendor providers.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Registers an additional provider. Its priority comes from the same table.
    pub fn with_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.extra_providers.push(provider);
        self
    }

    pub fn build(self) -> Result<QuoteOrchestrator, ConfigError> {
        let settings = self.settings;
        settings.validate()?;

        let health_check_symbol =
            Symbol::parse(&settings.health_check_symbol).map_err(|error| ConfigError::Invalid {
                field: "health_check_symbol",
                reason: error.to_string(),
            })?;
        let http_client = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let options = |base_url: Option<&str>, default_base_url: &str| {
            ProviderOptions::new(
                base_url.unwrap_or(default_base_url),
                health_check_symbol.clone(),
            )
            .with_format(SymbolFormat::new(settings.market))
            .with_transport(settings.transport())
        };

        let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::new();

        let alphavantage = &settings.providers.alphavantage;
        if alphavantage.enabled {
            match alphavantage
                .api_key
                .as_deref()
                .filter(|key| !key.trim().is_empty())
            {
                Some(api_key) => providers.push(Arc::new(AlphaVantageProvider::new(
                    Arc::clone(&http_client),
                    options(
                        alphavantage.base_url.as_deref(),
                        AlphaVantageProvider::DEFAULT_BASE_URL,
                    )
                    .with_api_key(api_key),
                ))),
                None => warn!("alphavantage is enabled but has no API key, skipping it"),
            }
        }

        let yahoo = &settings.providers.yahoo;
        if yahoo.enabled {
            providers.push(Arc::new(YahooProvider::new(
                Arc::clone(&http_client),
                options(yahoo.base_url.as_deref(), YahooProvider::DEFAULT_BASE_URL),
            )));
        }

        providers.extend(self.extra_providers);
        if providers.is_empty() {
            return Err(ConfigError::Invalid {
                field: "providers",
                reason: String::from("no provider could be constructed"),
            });
        }

        let orchestrator = QuoteOrchestrator::new(
            providers,
            &settings.priorities(),
            OrchestratorConfig::from_settings(&settings),
        );
        info!(providers = ?orchestrator.providers(), "quote orchestrator ready");
        Ok(orchestrator)
    }
}
