//! Shared fakes for the behavior suites.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stockfeed_core::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};
use stockfeed_core::{
    OrchestratorConfig, ProviderFuture, ProviderPriorities, Quote, QuoteOrchestrator,
    QuoteProvider, SourceError, Symbol,
};
use tokio_util::sync::CancellationToken;

/// How a [`FakeProvider`] answers one fetch.
#[derive(Debug, Clone)]
pub enum Reply {
    Quotes,
    Fail(SourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Up,
    Down,
    Hang,
}

/// In-memory provider with scripted replies and a call counter.
#[derive(Debug)]
pub struct FakeProvider {
    name: String,
    price: f64,
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    unknown: HashSet<String>,
    delay: Option<Duration>,
    health: Health,
    calls: AtomicUsize,
    requested: Mutex<Vec<Vec<Symbol>>>,
}

impl FakeProvider {
    pub fn healthy(name: &str, price: f64) -> Self {
        Self {
            name: name.to_owned(),
            price,
            script: Mutex::new(VecDeque::new()),
            fallback: Reply::Quotes,
            unknown: HashSet::new(),
            delay: None,
            health: Health::Up,
            calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str, error: SourceError) -> Self {
        Self {
            fallback: Reply::Fail(error),
            health: Health::Down,
            ..Self::healthy(name, 0.0)
        }
    }

    /// Replies consumed in order before the default behavior applies.
    pub fn with_script(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..self
        }
    }

    pub fn with_unknown(mut self, symbols: &[&str]) -> Self {
        self.unknown = symbols.iter().map(|symbol| (*symbol).to_owned()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_health(mut self, health: Health) -> Self {
        self.health = health;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<Vec<Symbol>> {
        self.requested.lock().expect("request log").clone()
    }

    fn next_reply(&self) -> Reply {
        self.script
            .lock()
            .expect("script")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl QuoteProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_quotes<'a>(
        &'a self,
        symbols: &'a [Symbol],
        cancel: &'a CancellationToken,
    ) -> ProviderFuture<'a, Result<Vec<Quote>, SourceError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested
                .lock()
                .expect("request log")
                .push(symbols.to_vec());

            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SourceError::cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.next_reply() {
                Reply::Fail(error) => Err(error),
                Reply::Quotes => Ok(symbols
                    .iter()
                    .filter(|symbol| !self.unknown.contains(symbol.as_str()))
                    .map(|symbol| {
                        Quote::new(symbol.clone(), self.price, None, None, None, None, None, "")
                            .expect("valid quote")
                    })
                    .collect()),
            }
        })
    }

    fn is_healthy<'a>(&'a self) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            match self.health {
                Health::Up => true,
                Health::Down => false,
                Health::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    true
                }
            }
        })
    }
}

/// Orchestrator over `providers`, prioritized in the order given.
pub fn orchestrator(
    providers: &[Arc<FakeProvider>],
    config: OrchestratorConfig,
) -> QuoteOrchestrator {
    let priorities = providers
        .iter()
        .enumerate()
        .map(|(index, provider)| (provider.name().to_owned(), index as u32 + 1))
        .collect::<ProviderPriorities>();
    let providers = providers
        .iter()
        .map(|provider| Arc::clone(provider) as Arc<dyn QuoteProvider>)
        .collect();
    QuoteOrchestrator::new(providers, &priorities, config)
}

/// Replays canned HTTP responses in order and records every request URL.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedHttpClient {
    pub fn new(responses: impl IntoIterator<Item = Result<HttpResponse, HttpError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("url log").clone()
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().expect("url log").len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> ProviderFuture<'a, Result<HttpResponse, HttpError>> {
        self.urls.lock().expect("url log").push(request.url);
        let next = self
            .responses
            .lock()
            .expect("script")
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(500, "script exhausted")));
        Box::pin(async move { next })
    }
}

pub fn symbols(quotes: &[Quote]) -> Vec<String> {
    let mut symbols = quotes
        .iter()
        .map(|quote| quote.symbol.as_str().to_owned())
        .collect::<Vec<_>>();
    symbols.sort();
    symbols
}
